use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{path} not found; run the `{produced_by}` stage first")]
    MissingInput { path: PathBuf, produced_by: &'static str },

    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

impl EtlError {
    pub fn missing_input(path: impl Into<PathBuf>, produced_by: &'static str) -> Self {
        EtlError::MissingInput { path: path.into(), produced_by }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
