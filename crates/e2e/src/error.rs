//! Error types for the browser test harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Step '{0}' is not supported by this driver")]
    Unsupported(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Reporting error: {0}")]
    Reporting(#[from] stepwright_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl E2eError {
    /// Setup defects that must stop the run before any test executes
    pub fn is_configuration(&self) -> bool {
        match self {
            E2eError::Config(_) | E2eError::SpecParse(_) | E2eError::Toml(_) => true,
            E2eError::Reporting(e) => e.is_configuration(),
            _ => false,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
