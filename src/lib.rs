//! Simscan - Simulated Web Security Scanning Dashboard
//!
//! This library drives a *simulated* scanning session: every crawl log,
//! form discovery and vulnerability finding is fabricated by a text
//! generation backend and merged into ephemeral session state that the
//! terminal dashboard renders.
//!
//! # Warning
//! Nothing in this crate contacts the scan target. The findings it shows are
//! invented and must never be presented as the result of a real assessment.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod display;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod reporting;
pub mod runner;
pub mod session;
pub mod utils;

pub use error::{Result, ScanError};

/// Common types shared by the session, generator and presentation layers
pub mod types {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::str::FromStr;

    /// Normalizes an enum-ish token from model output: `form-bot`, `Form Bot`
    /// and `FORM_BOT` all become `FORMBOT`.
    fn squash(value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum LogLevel {
        Info,
        Warn,
        Error,
        Success,
        System,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
                LogLevel::Success => "SUCCESS",
                LogLevel::System => "SYSTEM",
            }
        }

        /// Unknown levels fall back to `INFO`.
        pub fn parse_lenient(value: &str) -> Self {
            value.parse().unwrap_or(LogLevel::Info)
        }
    }

    impl FromStr for LogLevel {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match squash(s).as_str() {
                "INFO" | "DEBUG" => Ok(LogLevel::Info),
                "WARN" | "WARNING" => Ok(LogLevel::Warn),
                "ERROR" | "ERR" | "FATAL" => Ok(LogLevel::Error),
                "SUCCESS" | "OK" => Ok(LogLevel::Success),
                "SYSTEM" | "SYS" => Ok(LogLevel::System),
                _ => Err(format!("unknown log level: {}", s)),
            }
        }
    }

    impl fmt::Display for LogLevel {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ModuleTag {
        Crawler,
        Dast,
        FormBot,
        Core,
    }

    impl ModuleTag {
        pub fn as_str(&self) -> &'static str {
            match self {
                ModuleTag::Crawler => "CRAWLER",
                ModuleTag::Dast => "DAST",
                ModuleTag::FormBot => "FORM_BOT",
                ModuleTag::Core => "CORE",
            }
        }

        /// Unknown modules fall back to `CORE`.
        pub fn parse_lenient(value: &str) -> Self {
            value.parse().unwrap_or(ModuleTag::Core)
        }
    }

    impl FromStr for ModuleTag {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match squash(s).as_str() {
                "CRAWLER" | "CRAWL" | "SPIDER" => Ok(ModuleTag::Crawler),
                "DAST" | "SCANNER" => Ok(ModuleTag::Dast),
                "FORMBOT" | "FORMS" | "FORM" => Ok(ModuleTag::FormBot),
                "CORE" => Ok(ModuleTag::Core),
                _ => Err(format!("unknown module: {}", s)),
            }
        }
    }

    impl fmt::Display for ModuleTag {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct LogEntry {
        pub id: String,
        /// Wall-clock display time, `HH:MM:SS`
        pub timestamp: String,
        pub level: LogLevel,
        pub message: String,
        pub module: ModuleTag,
    }

    impl LogEntry {
        pub fn new(level: LogLevel, module: ModuleTag, message: impl Into<String>) -> Self {
            Self {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
                level,
                message: message.into(),
                module,
            }
        }
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum Severity {
        Critical,
        High,
        Medium,
        Low,
    }

    impl Severity {
        pub const ALL: [Severity; 4] = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ];

        /// Higher is worse.
        pub fn rank(&self) -> u8 {
            match self {
                Severity::Critical => 4,
                Severity::High => 3,
                Severity::Medium => 2,
                Severity::Low => 1,
            }
        }

        pub fn as_str(&self) -> &'static str {
            match self {
                Severity::Critical => "CRITICAL",
                Severity::High => "HIGH",
                Severity::Medium => "MEDIUM",
                Severity::Low => "LOW",
            }
        }

        /// Unknown severities fall back to `MEDIUM`.
        pub fn parse_lenient(value: &str) -> Self {
            value.parse().unwrap_or(Severity::Medium)
        }
    }

    impl FromStr for Severity {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match squash(s).as_str() {
                "CRITICAL" | "CRIT" => Ok(Severity::Critical),
                "HIGH" => Ok(Severity::High),
                "MEDIUM" | "MED" | "MODERATE" => Ok(Severity::Medium),
                "LOW" | "INFO" | "INFORMATIONAL" => Ok(Severity::Low),
                _ => Err(format!("unknown severity: {}", s)),
            }
        }
    }

    impl fmt::Display for Severity {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Vulnerability {
        pub id: String,
        #[serde(rename = "type")]
        pub kind: String,
        pub severity: Severity,
        pub description: String,
        pub location: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub payload: Option<String>,
    }

    impl Vulnerability {
        /// Key used to deduplicate findings within a session: trimmed,
        /// lowercased, inner whitespace collapsed.
        pub fn type_key(kind: &str) -> String {
            kind.split_whitespace()
                .map(|w| w.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(" ")
        }

        pub fn key(&self) -> String {
            Self::type_key(&self.kind)
        }
    }

    #[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ScanStats {
        pub pages_crawled: u64,
        pub forms_detected: u64,
        pub vulnerabilities_found: u64,
        pub elapsed_seconds: u64,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum NodeStatus {
        Pending,
        Visited,
        Vuln,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct CrawlNode {
        pub id: String,
        pub path: String,
        pub status: NodeStatus,
        pub depth: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub parent: Option<String>,
    }

    /// Stage of a simulated scan, derived from tick progress
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum ScanPhase {
        Recon,
        Crawl,
        FormAnalysis,
        Injection,
        Report,
    }

    impl ScanPhase {
        /// Maps a 1-based tick onto the first four phases proportionally; the
        /// last tick is always `Report`.
        pub fn for_tick(tick: u32, total: u32) -> Self {
            let total = total.max(1);
            let tick = tick.clamp(1, total);
            if tick == total {
                return ScanPhase::Report;
            }
            match u64::from(tick - 1) * 4 / u64::from(total - 1) {
                0 => ScanPhase::Recon,
                1 => ScanPhase::Crawl,
                2 => ScanPhase::FormAnalysis,
                _ => ScanPhase::Injection,
            }
        }

        /// Module most likely to be active during this phase
        pub fn primary_module(&self) -> ModuleTag {
            match self {
                ScanPhase::Recon | ScanPhase::Report => ModuleTag::Core,
                ScanPhase::Crawl => ModuleTag::Crawler,
                ScanPhase::FormAnalysis => ModuleTag::FormBot,
                ScanPhase::Injection => ModuleTag::Dast,
            }
        }

        pub fn label(&self) -> &'static str {
            match self {
                ScanPhase::Recon => "reconnaissance",
                ScanPhase::Crawl => "crawling",
                ScanPhase::FormAnalysis => "form analysis",
                ScanPhase::Injection => "payload injection",
                ScanPhase::Report => "reporting",
            }
        }
    }

    impl fmt::Display for ScanPhase {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.label())
        }
    }

    /// Lifecycle of one session
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum SessionStatus {
        Idle,
        Scanning,
        Completed,
        Aborted,
    }
}
