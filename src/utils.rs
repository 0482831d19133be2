/// Progress indicators for long generator calls
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        // Clean spinner style
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
        {
            pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

/// Time formatting helpers
pub mod time {
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    /// Get current UTC timestamp
    pub fn now_utc() -> DateTime<Utc> {
        Utc::now()
    }

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Escaping for the HTML report
pub mod html {
    pub fn escape(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}
