use crate::{Result, ScanError};
use crate::config::{Config, OutputFormat};
use crate::session::SessionSnapshot;
use crate::types::{NodeStatus, ScanStats, SessionStatus, Severity, Vulnerability};
use crate::utils::html::escape;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const REPORT_CSS: &str = include_str!("../assets/report.css");

pub struct ReportGenerator {
    config: Config,
}

impl ReportGenerator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn generate_report(&self, snapshot: &SessionSnapshot) -> Result<Vec<PathBuf>> {
        let mut generated_files = Vec::new();

        // Create output directory if it doesn't exist
        fs::create_dir_all(&self.config.reporting.output_dir).await
            .map_err(|e| ScanError::Reporting(format!("Failed to create output directory: {}", e)))?;

        let started = snapshot.started_at.unwrap_or_else(crate::utils::time::now_utc);
        let base_filename = format!("simscan_report_{}", started.format("%Y%m%d_%H%M%S"));

        for format in &self.config.reporting.formats {
            let file_path = match format {
                OutputFormat::Json => {
                    let path = self.config.reporting.output_dir.join(format!("{}.json", base_filename));
                    self.generate_json_report(snapshot, &path).await?;
                    path
                }
                OutputFormat::Csv => {
                    let path = self.config.reporting.output_dir.join(format!("{}.csv", base_filename));
                    self.generate_csv_report(snapshot, &path).await?;
                    path
                }
                OutputFormat::Html => {
                    let path = self.config.reporting.output_dir.join(format!("{}.html", base_filename));
                    self.generate_html_report(snapshot, &path).await?;
                    path
                }
            };

            generated_files.push(file_path);
        }

        info!("Generated {} report files", generated_files.len());
        Ok(generated_files)
    }

    async fn generate_json_report(&self, snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
        debug!("Generating JSON report: {}", path.display());

        let json_data = if self.config.reporting.include_logs {
            serde_json::to_string_pretty(snapshot)?
        } else {
            // Summary version without the log buffer or crawl map
            let summary = ScanSummary::from_snapshot(snapshot);
            serde_json::to_string_pretty(&summary)?
        };

        fs::write(path, json_data).await
            .map_err(|e| ScanError::Reporting(format!("Failed to write JSON report: {}", e)))?;

        Ok(())
    }

    async fn generate_csv_report(&self, snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
        debug!("Generating CSV report: {}", path.display());

        let csv_content = findings_to_csv(&snapshot.findings)?;

        fs::write(path, csv_content).await
            .map_err(|e| ScanError::Reporting(format!("Failed to write CSV report: {}", e)))?;

        Ok(())
    }

    async fn generate_html_report(&self, snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
        debug!("Generating HTML report: {}", path.display());

        let html_content = self.create_html_report(snapshot);

        fs::write(path, html_content).await
            .map_err(|e| ScanError::Reporting(format!("Failed to write HTML report: {}", e)))?;

        Ok(())
    }

    fn create_html_report(&self, snapshot: &SessionSnapshot) -> String {
        let mut html = String::new();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset='utf-8'>\n");
        html.push_str("<title>Simscan Simulated Assessment Report</title>\n");
        html.push_str("<style>\n");
        html.push_str(REPORT_CSS);
        html.push_str("</style>\n</head>\n<body>\n");

        // Header
        html.push_str("<div class='header'>\n");
        html.push_str("<h1>Simscan Simulated Assessment Report</h1>\n");
        html.push_str("<p class='notice'>All findings in this report were generated by a simulation and do not describe the real target.</p>\n");
        html.push_str(&format!("<p>Target: {}</p>\n", escape(&snapshot.target)));
        html.push_str(&format!("<p>Session: {}</p>\n", escape(&snapshot.session_id)));
        if let Some(started) = snapshot.started_at {
            html.push_str(&format!("<p>Started: {}</p>\n", started.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(completed) = snapshot.completed_at {
            html.push_str(&format!("<p>Completed: {}</p>\n", completed.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        html.push_str("</div>\n");

        // Executive Summary
        html.push_str("<div class='section'>\n<h2>Executive Summary</h2>\n");
        html.push_str(&format!("<p>{}</p>\n", escape(&executive_summary(snapshot))));
        html.push_str("</div>\n");

        // Vulnerability Summary
        html.push_str("<div class='section'>\n<h2>Vulnerability Summary</h2>\n");
        html.push_str("<table class='vuln-summary'>\n");
        html.push_str("<tr><th>Severity</th><th>Count</th></tr>\n");
        for severity in Severity::ALL {
            html.push_str(&format!(
                "<tr class='{}'><td>{}</td><td>{}</td></tr>\n",
                severity.as_str().to_lowercase(),
                severity.as_str(),
                snapshot.count_by_severity(severity)
            ));
        }
        html.push_str("</table>\n</div>\n");

        // Detailed Vulnerabilities
        if !snapshot.findings.is_empty() {
            html.push_str("<div class='section'>\n<h2>Detailed Vulnerabilities</h2>\n");
            for vuln in &snapshot.findings {
                html.push_str(&format!("<div class='vulnerability {}'>\n", vuln.severity.as_str().to_lowercase()));
                html.push_str(&format!("<h3>{}</h3>\n", escape(&vuln.kind)));
                html.push_str(&format!("<p><strong>Severity:</strong> {}</p>\n", vuln.severity));
                html.push_str(&format!("<p><strong>Location:</strong> {}</p>\n", escape(&vuln.location)));
                html.push_str(&format!("<p><strong>Description:</strong> {}</p>\n", escape(&vuln.description)));
                if let Some(payload) = &vuln.payload {
                    html.push_str(&format!("<p><strong>Payload:</strong> <code>{}</code></p>\n", escape(payload)));
                }
                html.push_str("</div>\n");
            }
            html.push_str("</div>\n");
        }

        // Crawl map
        if !snapshot.crawl_nodes.is_empty() {
            html.push_str("<div class='section'>\n<h2>Crawl Map</h2>\n<ul class='crawl'>\n");
            for node in &snapshot.crawl_nodes {
                let class = match node.status {
                    NodeStatus::Pending => "pending",
                    NodeStatus::Visited => "visited",
                    NodeStatus::Vuln => "vuln",
                };
                html.push_str(&format!(
                    "<li class='{}' style='margin-left:{}em'>{}</li>\n",
                    class,
                    node.depth.saturating_sub(1),
                    escape(&node.path)
                ));
            }
            html.push_str("</ul>\n</div>\n");
        }

        // Session log
        if self.config.reporting.include_logs && !snapshot.logs.is_empty() {
            html.push_str("<div class='section'>\n<h2>Session Log</h2>\n<pre class='log'>\n");
            for entry in &snapshot.logs {
                html.push_str(&format!(
                    "[{}] {:<7} {:<8} {}\n",
                    entry.timestamp,
                    entry.level.as_str(),
                    entry.module.as_str(),
                    escape(&entry.message)
                ));
            }
            html.push_str("</pre>\n</div>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

/// One CSV row per finding
pub fn findings_to_csv(findings: &[Vulnerability]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "type", "severity", "location", "description", "payload"])?;
    for vuln in findings {
        writer.write_record([
            vuln.id.as_str(),
            vuln.kind.as_str(),
            vuln.severity.as_str(),
            vuln.location.as_str(),
            vuln.description.as_str(),
            vuln.payload.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ScanError::Reporting(format!("Failed to flush CSV writer: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ScanError::Reporting(format!("CSV output was not UTF-8: {}", e)))
}

pub fn executive_summary(snapshot: &SessionSnapshot) -> String {
    let status = match snapshot.status {
        SessionStatus::Completed => "completed",
        SessionStatus::Aborted => "was aborted",
        SessionStatus::Scanning => "is still running",
        SessionStatus::Idle => "has not started",
    };
    let critical = snapshot.count_by_severity(Severity::Critical);
    let high = snapshot.count_by_severity(Severity::High);

    format!(
        "The simulated assessment of {} {} after crawling {} pages and detecting {} forms. \
         {} vulnerability types were reported, {} critical and {} high.",
        snapshot.target,
        status,
        snapshot.stats.pages_crawled,
        snapshot.stats.forms_detected,
        snapshot.findings.len(),
        critical,
        high
    )
}

/// Report body used when session logs are excluded
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanSummary {
    pub session_id: String,
    pub target: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stats: ScanStats,
    pub severity_counts: BTreeMap<String, usize>,
    pub findings: Vec<Vulnerability>,
}

impl ScanSummary {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let severity_counts = Severity::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), snapshot.count_by_severity(*s)))
            .collect();

        Self {
            session_id: snapshot.session_id.clone(),
            target: snapshot.target.clone(),
            status: snapshot.status,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
            stats: snapshot.stats,
            severity_counts,
            findings: snapshot.findings.clone(),
        }
    }
}
