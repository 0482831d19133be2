use async_trait::async_trait;
use parking_lot::Mutex;
use simscan::config::Config;
use simscan::generator::{
    AnalysisBatch, AnalysisRequest, FindingGenerator, GeneratedBatch, OfflineGenerator, RawFinding, RawLog,
    TickRequest,
};
use simscan::runner::{ScanRunner, SessionEvent};
use simscan::session::FALLBACK_LOGS;
use simscan::types::{LogLevel, ModuleTag, SessionStatus};
use simscan::{Result, ScanError};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Replays canned results, one per tick; an exhausted script yields empty batches.
struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<GeneratedBatch>>>,
    requests: Mutex<Vec<TickRequest>>,
}

impl ScriptedGenerator {
    fn new(script: Vec<Result<GeneratedBatch>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FindingGenerator for ScriptedGenerator {
    async fn generate(&self, request: &TickRequest) -> Result<GeneratedBatch> {
        self.requests.lock().push(request.clone());
        self.script.lock().pop_front().unwrap_or_else(|| Ok(GeneratedBatch::default()))
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisBatch> {
        Ok(AnalysisBatch {
            findings: vec![
                RawFinding { kind: "Weak Hash Algorithm".into(), severity: "LOW".into(), ..Default::default() },
                RawFinding { kind: "SQL Injection".into(), severity: "CRITICAL".into(), ..Default::default() },
                RawFinding { kind: "sql injection".into(), severity: "HIGH".into(), ..Default::default() },
            ],
            summary: Some("scripted".into()),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Never answers within any reasonable timeout
struct StalledGenerator;

#[async_trait]
impl FindingGenerator for StalledGenerator {
    async fn generate(&self, _request: &TickRequest) -> Result<GeneratedBatch> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(GeneratedBatch::default())
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisBatch> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(AnalysisBatch::default())
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

fn test_config(ticks: u32) -> Config {
    let mut config = Config::default();
    config.session.ticks = ticks;
    config.session.tick_interval_ms = 1000;
    config.generator.timeout_secs = 5;
    config
}

fn finding_batch(kind: &str, path: &str) -> GeneratedBatch {
    GeneratedBatch {
        logs: vec![RawLog::new(LogLevel::Info, ModuleTag::Dast, format!("probing {}", path))],
        vulnerabilities: vec![RawFinding {
            kind: kind.to_string(),
            severity: "HIGH".to_string(),
            description: "scripted".to_string(),
            location: path.to_string(),
            payload: None,
        }],
        discovered_paths: vec![path.to_string()],
        forms_detected: 1,
    }
}

fn never_cancelled() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_offline_session_completes() {
    let config = test_config(10);
    let runner = ScanRunner::new(config, Arc::new(OfflineGenerator::with_seed(1))).unwrap();
    let (_tx, rx) = never_cancelled();

    let snapshot = runner.run("shop.example", None, rx).await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.target, "https://shop.example/");
    assert!(snapshot.logs.len() <= 100);
    assert!(snapshot.stats.elapsed_seconds >= 9);

    let keys: HashSet<String> = snapshot.findings.iter().map(|f| f.key()).collect();
    assert_eq!(keys.len(), snapshot.findings.len());
    assert_eq!(snapshot.stats.vulnerabilities_found, snapshot.findings.len() as u64);
    // finding locations may add nodes that were never crawled
    assert!(snapshot.stats.pages_crawled <= snapshot.crawl_nodes.len() as u64);
    assert!(snapshot.stats.pages_crawled > 0);
}

#[tokio::test(start_paused = true)]
async fn test_merge_and_dedup_across_ticks() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(finding_batch("SQL Injection", "/login")),
        Ok(finding_batch("SQL Injection", "/search")),
        Ok(finding_batch("Open Redirect", "/login")),
    ]));
    let runner = ScanRunner::new(test_config(3), generator.clone()).unwrap();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_tx, rx) = never_cancelled();

    let snapshot = runner.run("shop.example", Some(&event_tx), rx).await.unwrap();

    let kinds: Vec<&str> = snapshot.findings.iter().map(|f| f.kind.as_str()).collect();
    assert_eq!(kinds, vec!["SQL Injection", "Open Redirect"]);
    assert_eq!(snapshot.stats.forms_detected, 3);
    assert_eq!(snapshot.stats.pages_crawled, 2);
    assert_eq!(snapshot.stats.vulnerabilities_found, 2);

    // the generator is told which types already exist
    let requests = generator.requests.lock();
    assert!(requests[0].known_types.is_empty());
    assert_eq!(requests[1].known_types, vec!["SQL Injection".to_string()]);
    assert_eq!(requests[2].known_types, vec!["SQL Injection".to_string()]);
    assert_eq!(requests[2].tick, 3);

    let events = drain(&mut event_rx);
    let findings = events.iter().filter(|e| matches!(e, SessionEvent::Finding(_))).count();
    let ticks = events.iter().filter(|e| matches!(e, SessionEvent::TickStarted { .. })).count();
    assert_eq!(findings, 2);
    assert_eq!(ticks, 3);
    assert!(matches!(events.first(), Some(SessionEvent::Started { .. })));
    assert!(matches!(events.last(), Some(SessionEvent::Finished(_))));
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_uses_fallback_logs() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(finding_batch("CSRF", "/cart")),
        Err(ScanError::Generator("upstream 500".to_string())),
        Ok(GeneratedBatch::default()),
    ]));
    let runner = ScanRunner::new(test_config(3), generator).unwrap();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_tx, rx) = never_cancelled();

    let snapshot = runner.run("shop.example", Some(&event_tx), rx).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.findings.len(), 1);

    for (_, _, message) in FALLBACK_LOGS.iter() {
        assert_eq!(snapshot.logs.iter().filter(|l| l.message == *message).count(), 1);
    }

    let events = drain(&mut event_rx);
    let fallbacks: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Fallback { tick, .. } => Some(*tick),
            _ => None,
        })
        .collect();
    assert_eq!(fallbacks, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_uses_fallback_logs() {
    let mut config = test_config(2);
    config.generator.timeout_secs = 2;
    let runner = ScanRunner::new(config, Arc::new(StalledGenerator)).unwrap();
    let (_tx, rx) = never_cancelled();

    let snapshot = runner.run("shop.example", None, rx).await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Completed);
    let fallback_lines = snapshot
        .logs
        .iter()
        .filter(|l| FALLBACK_LOGS.iter().any(|(_, _, m)| *m == l.message))
        .count();
    assert_eq!(fallback_lines, 2 * FALLBACK_LOGS.len());
    assert!(snapshot.findings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failure_aborts_when_fallback_disabled() {
    let mut config = test_config(3);
    config.session.fallback_on_error = false;
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(ScanError::Generator("boom".to_string()))]));
    let runner = ScanRunner::new(config, generator).unwrap();
    let (_tx, rx) = never_cancelled();

    let result = runner.run("shop.example", None, rx).await;
    assert!(matches!(result, Err(ScanError::Generator(_))));
}

#[tokio::test(start_paused = true)]
async fn test_pre_cancelled_session_aborts() {
    let runner = ScanRunner::new(test_config(5), Arc::new(OfflineGenerator::with_seed(3))).unwrap();
    let (_tx, rx) = watch::channel(true);

    let snapshot = runner.run("shop.example", None, rx).await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Aborted);
    assert_eq!(snapshot.logs.len(), 2);
    assert_eq!(snapshot.stats.pages_crawled, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_session_keeps_partial_state() {
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(finding_batch("SQL Injection", "/login")),
        Ok(finding_batch("Reflected XSS", "/search")),
        Ok(finding_batch("Open Redirect", "/next")),
        Ok(finding_batch("IDOR", "/api")),
    ]));
    let runner = ScanRunner::new(test_config(10), generator).unwrap();
    let (cancel_tx, rx) = watch::channel(false);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let _ = cancel_tx.send(true);
    });

    let snapshot = runner.run("shop.example", Some(&event_tx), rx).await.unwrap();

    assert_eq!(snapshot.status, SessionStatus::Aborted);
    assert_eq!(snapshot.findings.len(), 3);

    let events = drain(&mut event_rx);
    let ticks = events.iter().filter(|e| matches!(e, SessionEvent::TickStarted { .. })).count();
    assert_eq!(ticks, 3);
    assert!(matches!(events.last(), Some(SessionEvent::Aborted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_target_is_rejected() {
    let runner = ScanRunner::new(test_config(2), Arc::new(OfflineGenerator::new())).unwrap();
    let (_tx, rx) = never_cancelled();
    assert!(matches!(runner.run("   ", None, rx).await, Err(ScanError::InvalidTarget(_))));
}

#[tokio::test]
async fn test_analyze_dedups_and_sorts() {
    let file = tempfile::Builder::new().suffix(".php").tempfile().unwrap();
    std::fs::write(file.path(), "<?php echo md5($_GET['p']);").unwrap();

    let runner = ScanRunner::new(test_config(1), Arc::new(ScriptedGenerator::new(Vec::new()))).unwrap();
    let report = runner.analyze(file.path()).await.unwrap();

    assert_eq!(report.language, "PHP");
    assert_eq!(report.duplicates_dropped, 1);
    let kinds: Vec<&str> = report.findings.iter().map(|f| f.kind.as_str()).collect();
    assert_eq!(kinds, vec!["SQL Injection", "Weak Hash Algorithm"]);
    assert_eq!(report.summary.as_deref(), Some("scripted"));
}

#[tokio::test]
async fn test_analyze_rejects_empty_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let runner = ScanRunner::new(test_config(1), Arc::new(OfflineGenerator::new())).unwrap();
    assert!(matches!(runner.analyze(file.path()).await, Err(ScanError::InvalidInput(_))));
}
