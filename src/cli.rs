use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simscan")]
#[command(about = "Terminal dashboard that simulates a web-security scanning agent")]
#[command(long_about = r#"
Simscan plays back a *simulated* web application assessment. Crawl activity,
form discovery and vulnerability findings are invented by a text generation
backend; no request is ever sent to the target.

Use it for demos, UI rehearsal and training. Never present its output as the
result of a real security test.

Simple Usage Examples:
  simscan --host shop.example                       # Offline simulation
  simscan --host shop.example --ticks 20            # Longer session
  simscan --host shop.example --provider gemini     # Narrate with Gemini (needs SIMSCAN_API_KEY)
  simscan --host shop.example --report --format html
  simscan analyze --file src/login.php              # Simulated static analysis
  simscan init-config --path simscan.toml
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Target URL or host name to "scan" (e.g., shop.example, https://app.example/login)
    #[arg(long = "host", value_name = "TARGET")]
    pub target: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of simulated scan ticks
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Delay between ticks in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Generator backend
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Model name for the generator backend
    #[arg(long)]
    pub model: Option<String>,

    /// API key for hosted generator backends
    #[arg(long, env = "SIMSCAN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seed for the offline generator (repeatable sessions)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write a report when the session ends
    #[arg(long)]
    pub report: bool,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulated scan session
    Scan {
        /// Target URL or host name
        #[arg(short, long, required = true)]
        target: String,
    },

    /// Simulated static analysis of a single source file
    Analyze {
        /// Source file to review
        #[arg(short, long, required = true)]
        file: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(long, default_value = "simscan.toml")]
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Json,
    Csv,
    Html,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Provider {
    Gemini,
    Ollama,
    Offline,
}

impl From<OutputFormat> for crate::config::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => crate::config::OutputFormat::Json,
            OutputFormat::Csv => crate::config::OutputFormat::Csv,
            OutputFormat::Html => crate::config::OutputFormat::Html,
        }
    }
}

impl From<Provider> for crate::config::ProviderKind {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Gemini => crate::config::ProviderKind::Gemini,
            Provider::Ollama => crate::config::ProviderKind::Ollama,
            Provider::Offline => crate::config::ProviderKind::Offline,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut crate::config::Config) {
        if let Some(ticks) = self.ticks {
            config.session.ticks = ticks;
        }
        if let Some(interval) = self.interval_ms {
            config.session.tick_interval_ms = interval;
        }
        if let Some(provider) = self.provider {
            config.generator.provider = provider.into();
        }
        if let Some(model) = &self.model {
            config.generator.model = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.generator.api_key = Some(key.clone());
        }
        if let Some(seed) = self.seed {
            config.generator.seed = Some(seed);
        }
        if let Some(output) = &self.output {
            config.reporting.output_dir = output.clone();
        }
        if let Some(format) = self.format {
            config.reporting.formats = vec![format.into()];
        }
    }
}
