use crate::runner::{AnalysisReport, SessionEvent};
use crate::session::SessionSnapshot;
use crate::types::{CrawlNode, LogEntry, LogLevel, NodeStatus, ScanPhase, ScanStats, Severity, Vulnerability};
use colored::*;
use std::io::Write;

/// Colored terminal rendering of the simulated dashboard
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        // Simple check for color support - assume true for most terminals
        let use_colors = std::env::var("NO_COLOR").is_err() &&
                        std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    /// Render one runner event as it arrives
    pub fn print_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { session_id, target } => {
                self.print_info(&format!("Session {} → {}", short_id(session_id), target));
            }
            SessionEvent::TickStarted { tick, total, phase } => self.print_tick(*tick, *total, *phase),
            SessionEvent::Log(entry) => self.print_log_entry(entry),
            SessionEvent::Finding(vuln) => self.print_vulnerability(vuln),
            SessionEvent::CrawlNode(node) => self.print_crawl_node(node),
            SessionEvent::Stats(stats) => self.print_stats_line(stats),
            SessionEvent::Fallback { tick, reason } => {
                self.print_warning(&format!("Tick {} fell back to cached telemetry ({})", tick, reason.truncate_with_ellipsis(80)));
            }
            SessionEvent::Finished(_) => self.print_success("Simulated scan finished"),
            SessionEvent::Aborted { reason } => self.print_warning(&format!("Simulated scan aborted: {}", reason)),
        }
    }

    /// One dashboard log line: `[HH:MM:SS] LEVEL   MODULE   message`
    pub fn print_log_entry(&self, entry: &LogEntry) {
        if self.quiet_mode { return; }

        if self.use_colors {
            let level = format!("{:<7}", entry.level.as_str()).color(self.get_level_color(&entry.level)).bold();
            println!("  {} {} {} {}",
                format!("[{}]", entry.timestamp).bright_black(),
                level,
                format!("{:<8}", entry.module.as_str()).cyan(),
                entry.message.white()
            );
        } else {
            println!("  [{}] {:<7} {:<8} {}",
                entry.timestamp,
                entry.level.as_str(),
                entry.module.as_str(),
                entry.message
            );
        }
    }

    /// Print a clean vulnerability entry with enhanced formatting
    pub fn print_vulnerability(&self, vuln: &Vulnerability) {
        if self.quiet_mode { return; }

        let severity_color = self.get_severity_color(&vuln.severity);
        let severity_icon = self.get_severity_icon(&vuln.severity);

        if self.use_colors {
            println!("  {} {} {} {}",
                severity_icon.color(severity_color),
                vuln.severity.as_str().color(severity_color).bold(),
                vuln.kind.bright_white().bold(),
                format!("({})", vuln.location).bright_black()
            );

            if !vuln.description.is_empty() {
                println!("    └─ {}", vuln.description.white());
            }
            if let Some(payload) = &vuln.payload {
                println!("    └─ {}: {}", "Payload".blue().bold(), payload.cyan());
            }
        } else {
            println!("  [{}] {} ({})", vuln.severity.as_str(), vuln.kind, vuln.location);
            if !vuln.description.is_empty() {
                println!("    Description: {}", vuln.description);
            }
            if let Some(payload) = &vuln.payload {
                println!("    Payload: {}", payload);
            }
        }
    }

    pub fn print_crawl_node(&self, node: &CrawlNode) {
        if self.quiet_mode { return; }

        let (glyph, color) = self.get_node_style(&node.status);
        if self.use_colors {
            println!("  {} {} {}", glyph.color(color), "discovered".bright_black(), node.path.cyan());
        } else {
            println!("  {} discovered {}", glyph, node.path);
        }
    }

    pub fn print_tick(&self, tick: u32, total: u32, phase: ScanPhase) {
        if self.quiet_mode { return; }

        let total = total.max(1);
        if self.use_colors {
            let bar_length = 20;
            let filled = (tick as usize * bar_length) / total as usize;
            let bar = format!("{}{}",
                "█".repeat(filled).bright_green(),
                "░".repeat(bar_length - filled).bright_black()
            );
            println!("\n  {} [{}] {} {}",
                "⠿".bright_blue().bold(),
                bar,
                format!("{:>2}/{}", tick, total).yellow().bold(),
                phase.label().bright_white()
            );
        } else {
            println!("\n  [{:>2}/{}] {}", tick, total, phase.label());
        }
    }

    pub fn print_stats_line(&self, stats: &ScanStats) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} pages {}  forms {}  vulns {}  elapsed {}s",
                "≡".bright_black(),
                stats.pages_crawled.to_string().cyan().bold(),
                stats.forms_detected.to_string().cyan().bold(),
                stats.vulnerabilities_found.to_string().yellow().bold(),
                stats.elapsed_seconds.to_string().bright_black()
            );
        } else {
            println!("  pages {}  forms {}  vulns {}  elapsed {}s",
                stats.pages_crawled, stats.forms_detected, stats.vulnerabilities_found, stats.elapsed_seconds);
        }
        std::io::stdout().flush().ok();
    }

    /// Print the crawl map as an indented tree ordered by discovery
    pub fn print_crawl_tree(&self, nodes: &[CrawlNode]) {
        if self.quiet_mode || nodes.is_empty() { return; }

        self.print_section_header("🕸  CRAWL MAP");
        for (i, node) in nodes.iter().enumerate() {
            if i == 25 {
                println!("    ... {} more nodes", nodes.len() - 25);
                break;
            }
            let indent = "  ".repeat(node.depth.saturating_sub(1) as usize);
            let (glyph, color) = self.get_node_style(&node.status);
            if self.use_colors {
                println!("  {}{} {}", indent, glyph.color(color), node.path.white());
            } else {
                println!("  {}{} {}", indent, glyph, node.path);
            }
        }
        println!();
    }

    /// Print enhanced scan summary with statistics table
    pub fn print_scan_summary(&self, snapshot: &SessionSnapshot) {
        if self.quiet_mode { return; }

        let stats = &snapshot.stats;
        let counts: Vec<(Severity, usize)> = Severity::ALL
            .iter()
            .map(|s| (*s, snapshot.count_by_severity(*s)))
            .collect();

        println!();
        self.print_section_header("📊 SIMULATED SCAN SUMMARY");

        if self.use_colors {
            println!("  🎯 {}: {}", "Target".bright_white().bold(), snapshot.target.cyan().bold());
            println!("  📄 {}: {}", "Pages Crawled".bright_white().bold(), stats.pages_crawled.to_string().cyan().bold());
            println!("  📝 {}: {}", "Forms Detected".bright_white().bold(), stats.forms_detected.to_string().cyan().bold());
            println!("  ⏱  {}: {}", "Elapsed".bright_white().bold(),
                crate::utils::time::format_duration(std::time::Duration::from_secs(stats.elapsed_seconds)).cyan());

            if snapshot.findings.is_empty() {
                println!("  ✨ {}", "No vulnerabilities reported".bright_green().bold());
                println!();
                return;
            }

            println!("  🔍 {}: {}", "Total Issues".bright_white().bold(), snapshot.findings.len().to_string().yellow().bold());
            println!();
            self.print_vulnerability_table(&counts);
        } else {
            println!("Target: {}", snapshot.target);
            println!("Pages Crawled: {}", stats.pages_crawled);
            println!("Forms Detected: {}", stats.forms_detected);
            println!("Elapsed: {}", crate::utils::time::format_duration(std::time::Duration::from_secs(stats.elapsed_seconds)));
            if snapshot.findings.is_empty() {
                println!("No vulnerabilities reported");
                return;
            }
            println!("Total Issues: {}", snapshot.findings.len());
            for (severity, count) in counts {
                println!("{}: {}", severity.as_str(), count);
            }
        }
        println!();
    }

    /// Print vulnerability breakdown as a clean table
    fn print_vulnerability_table(&self, counts: &[(Severity, usize)]) {
        let active: Vec<_> = counts.iter().filter(|(_, count)| *count > 0).collect();
        if active.is_empty() {
            return;
        }

        println!("  ┌─────────────┬───────┐");
        println!("  │ {} │ {} │",
            "Severity".bright_white().bold(),
            "Count".bright_white().bold()
        );
        println!("  ├─────────────┼───────┤");

        for (severity, count) in active {
            let color = self.get_severity_color(severity);
            println!("  │ {} {} │ {:>5} │",
                self.get_severity_icon(severity),
                format!("{:<8}", severity.as_str()).color(color).bold(),
                count.to_string().color(color).bold()
            );
        }

        println!("  └─────────────┴───────┘");
    }

    pub fn print_analysis_report(&self, report: &AnalysisReport) {
        if self.quiet_mode { return; }

        self.print_section_header(&format!("🧪 STATIC ANALYSIS: {}", report.filename));
        self.print_info(&format!("Language: {}", report.language));
        if let Some(summary) = &report.summary {
            self.print_info(summary);
        }
        println!();

        if report.findings.is_empty() {
            self.print_success("No weaknesses reported");
            return;
        }
        for finding in &report.findings {
            self.print_vulnerability(finding);
        }
        println!();
        self.print_warning(&format!("{} distinct weakness classes reported", report.findings.len()));
    }

    /// Print a clean section header
    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.chars().count()));
        }
    }

    /// Print a clean success message
    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    /// Print a clean warning message
    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Print a clean error message
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    /// Print a clean info message
    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    /// Print a clean banner with enhanced styling
    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        let width = title.chars().count();
        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = width).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(width + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }

    fn get_level_color(&self, level: &LogLevel) -> Color {
        match level {
            LogLevel::Info => Color::Blue,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::BrightRed,
            LogLevel::Success => Color::BrightGreen,
            LogLevel::System => Color::Magenta,
        }
    }

    /// Get severity icon
    fn get_severity_icon(&self, severity: &Severity) -> &'static str {
        match severity {
            Severity::Critical => "🔥",
            Severity::High => "⚠️",
            Severity::Medium => "⚡",
            Severity::Low => "ℹ️",
        }
    }

    /// Get color for severity level
    fn get_severity_color(&self, severity: &Severity) -> Color {
        match severity {
            Severity::Critical => Color::BrightRed,
            Severity::High => Color::Red,
            Severity::Medium => Color::Yellow,
            Severity::Low => Color::Green,
        }
    }

    fn get_node_style(&self, status: &NodeStatus) -> (&'static str, Color) {
        match status {
            NodeStatus::Pending => ("○", Color::BrightBlack),
            NodeStatus::Visited => ("●", Color::Green),
            NodeStatus::Vuln => ("✖", Color::BrightRed),
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// String extension trait for better output formatting
trait StringExt {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String;
}

impl StringExt for str {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String {
        if self.chars().count() <= max_len {
            self.to_string()
        } else {
            let kept: String = self.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}
