use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub session: SessionConfig,
    pub generator: GeneratorConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ticks: u32,
    pub tick_interval_ms: u64,
    pub log_capacity: usize,
    pub fallback_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
    pub include_logs: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Ollama,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    Html,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                ticks: 10,
                tick_interval_ms: 1500,
                log_capacity: 100,
                fallback_on_error: true,
            },
            generator: GeneratorConfig {
                provider: ProviderKind::Offline,
                model: "gemini-2.5-flash".to_string(),
                endpoint: None,
                api_key: None,
                timeout_secs: 20,
                temperature: 0.9,
                seed: None,
            },
            reporting: ReportingConfig {
                output_dir: PathBuf::from("./reports"),
                formats: vec![OutputFormat::Json],
                include_logs: true,
            },
        }
    }
}

impl Config {
    /// Load a TOML file layered with `SIMSCAN_*` environment variables
    /// (`SIMSCAN_GENERATOR__API_KEY`, `SIMSCAN_SESSION__TICKS`, ...).
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SIMSCAN")
                .prefix_separator("_")
                .separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| crate::ScanError::Unknown(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.session.ticks == 0 {
            return Err(crate::ScanError::InvalidInput("session.ticks must be at least 1".to_string()));
        }
        if self.session.log_capacity == 0 {
            return Err(crate::ScanError::InvalidInput("session.log_capacity must be at least 1".to_string()));
        }
        if self.generator.timeout_secs == 0 {
            return Err(crate::ScanError::InvalidInput("generator.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.session.tick_interval_ms)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator.timeout_secs)
    }

    /// Endpoint for the configured provider, falling back to the public default
    pub fn generator_endpoint(&self) -> String {
        if let Some(endpoint) = &self.generator.endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        match self.generator.provider {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com".to_string(),
            ProviderKind::Ollama => "http://localhost:11434".to_string(),
            ProviderKind::Offline => String::new(),
        }
    }
}
