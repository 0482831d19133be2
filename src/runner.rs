//! Fixed-length tick loop driving a simulated scan session.

use crate::config::Config;
use crate::generator::{AnalysisRequest, FindingGenerator, TickRequest};
use crate::prompt;
use crate::session::{ScanSession, SessionSnapshot};
use crate::types::{CrawlNode, LogEntry, ScanPhase, ScanStats, Vulnerability};
use crate::{Result, ScanError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Instant, MissedTickBehavior};

/// Progress notifications for a live display
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started { session_id: String, target: String },
    TickStarted { tick: u32, total: u32, phase: ScanPhase },
    Log(LogEntry),
    Finding(Vulnerability),
    CrawlNode(CrawlNode),
    Stats(ScanStats),
    Fallback { tick: u32, reason: String },
    Finished(ScanStats),
    Aborted { reason: String },
}

/// Result of a static-analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub filename: String,
    pub language: String,
    pub summary: Option<String>,
    pub findings: Vec<Vulnerability>,
    pub duplicates_dropped: usize,
}

struct Emitter<'a>(Option<&'a mpsc::UnboundedSender<SessionEvent>>);

impl Emitter<'_> {
    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.0 {
            // a display that went away must not stop the scan
            let _ = tx.send(event);
        }
    }
}

/// Resolves once the flag is set; never resolves if the sender is dropped
/// without setting it.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct ScanRunner {
    config: Config,
    generator: Arc<dyn FindingGenerator>,
}

impl ScanRunner {
    pub fn new(config: Config, generator: Arc<dyn FindingGenerator>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, generator })
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Run one complete session against `target`.
    ///
    /// Each tick waits for the interval, asks the generator for a batch and
    /// merges it. A failed or timed-out tick is replaced by the fallback log
    /// set unless `session.fallback_on_error` is off, in which case the
    /// session is aborted and the error returned. Setting `cancel` to `true`
    /// aborts the session and returns the partial snapshot.
    pub async fn run(
        &self,
        target: &str,
        events: Option<&mpsc::UnboundedSender<SessionEvent>>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SessionSnapshot> {
        let emitter = Emitter(events);
        let total = self.config.session.ticks;

        let mut session = ScanSession::new(self.config.session.clone());
        let opening = session.start(target)?;
        emitter.emit(SessionEvent::Started {
            session_id: session.session_id().to_string(),
            target: session.target().to_string(),
        });
        emitter.emit(SessionEvent::Log(opening));

        let started = Instant::now();
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for tick in 1..=total {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    return Self::abort(&mut session, &emitter, "cancelled by operator");
                }
                _ = interval.tick() => {}
            }

            let phase = ScanPhase::for_tick(tick, total);
            emitter.emit(SessionEvent::TickStarted { tick, total, phase });
            debug!("Tick {}/{} ({})", tick, total, phase);

            let request = TickRequest {
                target: session.target().to_string(),
                tick,
                total_ticks: total,
                phase,
                known_types: session.known_types(),
            };

            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    return Self::abort(&mut session, &emitter, "cancelled by operator");
                }
                result = timeout(self.config.generator_timeout(), self.generator.generate(&request)) => result,
            };

            let batch = match outcome {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ScanError::Timeout { operation: format!("generator call for tick {}", tick) }),
            };

            match batch {
                Ok(batch) => {
                    let merged = session.apply_batch(batch)?;
                    if merged.duplicates_dropped > 0 {
                        debug!("Tick {} dropped {} duplicate findings", tick, merged.duplicates_dropped);
                    }
                    for entry in merged.logs {
                        emitter.emit(SessionEvent::Log(entry));
                    }
                    for node in merged.nodes {
                        emitter.emit(SessionEvent::CrawlNode(node));
                    }
                    for finding in merged.findings {
                        emitter.emit(SessionEvent::Finding(finding));
                    }
                }
                Err(e) => {
                    warn!("Tick {} generator failure: {}", tick, e);
                    if !self.config.session.fallback_on_error {
                        Self::abort(&mut session, &emitter, &e.to_string())?;
                        return Err(e);
                    }
                    emitter.emit(SessionEvent::Fallback { tick, reason: e.to_string() });
                    for entry in session.apply_fallback()? {
                        emitter.emit(SessionEvent::Log(entry));
                    }
                }
            }

            session.record_elapsed(started.elapsed());
            emitter.emit(SessionEvent::Stats(session.stats()));
        }

        let closing = session.finish()?;
        emitter.emit(SessionEvent::Log(closing));
        emitter.emit(SessionEvent::Finished(session.stats()));

        info!(
            "Simulated scan of {} finished in {}s with {} findings",
            session.target(),
            session.stats().elapsed_seconds,
            session.findings().len()
        );
        Ok(session.snapshot())
    }

    fn abort(session: &mut ScanSession, emitter: &Emitter<'_>, reason: &str) -> Result<SessionSnapshot> {
        let entry = session.abort(reason)?;
        emitter.emit(SessionEvent::Log(entry));
        emitter.emit(SessionEvent::Aborted { reason: reason.to_string() });
        Ok(session.snapshot())
    }

    /// Hand a source file to the generator's static-analysis call.
    pub async fn analyze(&self, path: &Path) -> Result<AnalysisReport> {
        let source = tokio::fs::read_to_string(path).await?;
        if source.trim().is_empty() {
            return Err(ScanError::InvalidInput(format!("{} is empty", path.display())));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let request = AnalysisRequest {
            language: prompt::language_for(&filename).to_string(),
            filename,
            source,
        };

        info!("Analyzing {} ({}) with {}", request.filename, request.language, self.generator.name());
        let batch = timeout(self.config.generator_timeout(), self.generator.analyze(&request))
            .await
            .map_err(|_| ScanError::Timeout { operation: format!("analysis of {}", request.filename) })??;

        let mut seen = HashSet::new();
        let mut duplicates_dropped = 0;
        let mut findings = Vec::new();
        for raw in batch.findings {
            let Some(finding) = raw.into_vulnerability() else {
                continue;
            };
            if seen.insert(finding.key()) {
                findings.push(finding);
            } else {
                duplicates_dropped += 1;
            }
        }
        findings.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));

        Ok(AnalysisReport {
            filename: request.filename,
            language: request.language,
            summary: batch.summary,
            findings,
            duplicates_dropped,
        })
    }
}
