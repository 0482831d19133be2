use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid target format: {0}")]
    InvalidTarget(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Timeout occurred during {operation}")]
    Timeout { operation: String },

    #[error("A scan session is already running against {target}")]
    AlreadyRunning { target: String },

    #[error("No scan session is active")]
    SessionInactive,

    #[error("Reporting error: {0}")]
    Reporting(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
