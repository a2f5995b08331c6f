//! Error types for UI probes

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Selector '{selector}' resolved to {count} elements, expected exactly one")]
    StrictModeViolation { selector: String, count: usize },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Probe spec parse error: {0}")]
    SpecParse(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl ProbeError {
    /// Whether this error ends the probe as a failed test rather than a harness fault
    pub fn is_probe_failure(&self) -> bool {
        matches!(
            self,
            ProbeError::Navigation { .. }
                | ProbeError::ElementNotFound(_)
                | ProbeError::StrictModeViolation { .. }
                | ProbeError::AssertionFailed(_)
                | ProbeError::Driver(_)
        )
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
