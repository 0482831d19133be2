//! Ephemeral state of one simulated scan session.
//!
//! The session owns everything the dashboard shows: the capped log buffer,
//! the deduplicated finding list, counters and the crawl map. It is reset on
//! every [`ScanSession::start`] and never persisted.

use crate::config::SessionConfig;
use crate::crawl::CrawlMap;
use crate::generator::GeneratedBatch;
use crate::types::{
    CrawlNode, LogEntry, LogLevel, ModuleTag, ScanStats, SessionStatus, Vulnerability,
};
use crate::{Result, ScanError};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

/// Log lines substituted for a tick whose generator call failed
pub const FALLBACK_LOGS: [(LogLevel, ModuleTag, &str); 3] = [
    (LogLevel::Warn, ModuleTag::Core, "Analysis uplink unavailable, continuing with cached heuristics"),
    (LogLevel::Info, ModuleTag::Crawler, "Re-queueing pending paths for the next cycle"),
    (LogLevel::Error, ModuleTag::Dast, "Payload batch skipped for this cycle"),
];

/// What a single merge changed
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub logs: Vec<LogEntry>,
    pub findings: Vec<Vulnerability>,
    pub nodes: Vec<CrawlNode>,
    pub duplicates_dropped: usize,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.findings.is_empty() && self.nodes.is_empty()
    }
}

/// Serializable view of a session, used for reports and the runner's return value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub target: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stats: ScanStats,
    pub findings: Vec<Vulnerability>,
    pub crawl_nodes: Vec<CrawlNode>,
    pub logs: Vec<LogEntry>,
}

impl SessionSnapshot {
    pub fn count_by_severity(&self, severity: crate::types::Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

pub struct ScanSession {
    config: SessionConfig,
    session_id: String,
    target: String,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    logs: VecDeque<LogEntry>,
    findings: Vec<Vulnerability>,
    seen_types: HashSet<String>,
    stats: ScanStats,
    crawl: CrawlMap,
}

/// Accepts `example.com`, `http://host:8080/app` and similar; a missing
/// scheme is taken to be `https`.
pub fn normalize_target(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidTarget("target must not be empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ScanError::InvalidTarget(format!("{}: {}", trimmed, e)))?;

    if !url.has_host() {
        return Err(ScanError::InvalidTarget(format!("{}: missing host", trimmed)));
    }
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ScanError::InvalidTarget(format!("unsupported scheme: {}", other))),
    }
}

impl ScanSession {
    pub fn new(config: SessionConfig) -> Self {
        let capacity = config.log_capacity.max(1);
        Self {
            config,
            session_id: String::new(),
            target: String::new(),
            status: SessionStatus::Idle,
            started_at: None,
            completed_at: None,
            logs: VecDeque::with_capacity(capacity),
            findings: Vec::new(),
            seen_types: HashSet::new(),
            stats: ScanStats::default(),
            crawl: CrawlMap::new(),
        }
    }

    pub fn start(&mut self, target: &str) -> Result<LogEntry> {
        if self.is_scanning() {
            return Err(ScanError::AlreadyRunning { target: self.target.clone() });
        }
        let target = normalize_target(target)?;

        self.reset();
        self.session_id = uuid::Uuid::new_v4().to_string();
        self.target = target;
        self.status = SessionStatus::Scanning;
        self.started_at = Some(Utc::now());

        info!("Session {} started against {}", self.session_id, self.target);

        let entry = LogEntry::new(
            LogLevel::System,
            ModuleTag::Core,
            format!("Initializing simulated assessment of {}", self.target),
        );
        self.push_log(entry.clone());
        Ok(entry)
    }

    /// Merge one generated batch into the session.
    pub fn apply_batch(&mut self, batch: GeneratedBatch) -> Result<MergeOutcome> {
        self.ensure_active()?;
        let mut outcome = MergeOutcome::default();

        // paths reported by the previous tick count as visited from here on
        self.crawl.mark_visited_all();

        for raw in batch.logs {
            if let Some(entry) = raw.into_entry() {
                self.push_log(entry.clone());
                outcome.logs.push(entry);
            }
        }

        for path in &batch.discovered_paths {
            if path.trim().is_empty() {
                continue;
            }
            if let Some(node) = self.crawl.insert(path) {
                self.stats.pages_crawled += 1;
                outcome.nodes.push(node);
            }
        }

        for raw in batch.vulnerabilities {
            let Some(finding) = raw.into_vulnerability() else {
                continue;
            };
            if !self.seen_types.insert(finding.key()) {
                debug!("Dropping duplicate finding type: {}", finding.kind);
                outcome.duplicates_dropped += 1;
                continue;
            }

            if !finding.location.is_empty() {
                if let Some(node) = self.crawl.mark_vuln(&finding.location) {
                    outcome.nodes.push(node);
                }
            }
            self.stats.vulnerabilities_found += 1;
            self.findings.push(finding.clone());
            outcome.findings.push(finding);
        }

        // model-supplied count; must not wrap
        self.stats.forms_detected = self.stats.forms_detected.saturating_add(batch.forms_detected);

        Ok(outcome)
    }

    /// Append the fixed fallback log set in place of a failed batch.
    pub fn apply_fallback(&mut self) -> Result<Vec<LogEntry>> {
        self.ensure_active()?;
        let entries: Vec<LogEntry> = FALLBACK_LOGS
            .iter()
            .map(|(level, module, message)| LogEntry::new(*level, *module, *message))
            .collect();
        for entry in &entries {
            self.push_log(entry.clone());
        }
        Ok(entries)
    }

    /// Elapsed time only ever moves forward.
    pub fn record_elapsed(&mut self, elapsed: Duration) {
        self.stats.elapsed_seconds = self.stats.elapsed_seconds.max(elapsed.as_secs());
    }

    pub fn log(&mut self, level: LogLevel, module: ModuleTag, message: impl Into<String>) -> Result<LogEntry> {
        self.ensure_active()?;
        let entry = LogEntry::new(level, module, message);
        self.push_log(entry.clone());
        Ok(entry)
    }

    pub fn finish(&mut self) -> Result<LogEntry> {
        self.ensure_active()?;
        self.crawl.mark_visited_all();

        let entry = LogEntry::new(
            LogLevel::Success,
            ModuleTag::Core,
            format!(
                "Assessment complete: {} pages, {} forms, {} vulnerabilities",
                self.stats.pages_crawled, self.stats.forms_detected, self.stats.vulnerabilities_found
            ),
        );
        self.push_log(entry.clone());
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());

        info!("Session {} completed with {} findings", self.session_id, self.findings.len());
        Ok(entry)
    }

    pub fn abort(&mut self, reason: &str) -> Result<LogEntry> {
        self.ensure_active()?;
        let entry = LogEntry::new(LogLevel::Warn, ModuleTag::Core, format!("Scan aborted: {}", reason));
        self.push_log(entry.clone());
        self.status = SessionStatus::Aborted;
        self.completed_at = Some(Utc::now());

        info!("Session {} aborted: {}", self.session_id, reason);
        Ok(entry)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            target: self.target.clone(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            stats: self.stats,
            findings: self.findings.clone(),
            crawl_nodes: self.crawl.nodes().to_vec(),
            logs: self.logs.iter().cloned().collect(),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.status == SessionStatus::Scanning
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn findings(&self) -> &[Vulnerability] {
        &self.findings
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn crawl_nodes(&self) -> &[CrawlNode] {
        self.crawl.nodes()
    }

    /// Finding types accepted so far, in discovery order
    pub fn known_types(&self) -> Vec<String> {
        self.findings.iter().map(|f| f.kind.clone()).collect()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_scanning() {
            Ok(())
        } else {
            Err(ScanError::SessionInactive)
        }
    }

    fn push_log(&mut self, entry: LogEntry) {
        while self.logs.len() >= self.config.log_capacity.max(1) {
            self.logs.pop_front();
        }
        self.logs.push_back(entry);
    }

    fn reset(&mut self) {
        self.logs.clear();
        self.findings.clear();
        self.seen_types.clear();
        self.stats = ScanStats::default();
        self.crawl.clear();
        self.started_at = None;
        self.completed_at = None;
    }
}
