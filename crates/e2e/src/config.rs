//! Harness configuration
//!
//! Loaded once at startup (TOML file, then `STEPWRIGHT_*` environment
//! overrides), validated, and passed by value from then on.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};

const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;
const MAX_RETRIES: u32 = 10;

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// chromium, firefox or webkit
    pub browser: String,

    pub headless: bool,

    /// Absolute http(s) URL relative navigation is resolved against
    pub base_url: String,

    /// Per-step timeout
    pub timeout_ms: u64,

    /// How many times a failed test is re-run
    pub retry_count: u32,

    pub specs_dir: PathBuf,

    pub screenshot_dir: PathBuf,

    pub output_dir: PathBuf,

    pub reporting: ReportingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            headless: true,
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 30_000,
            retry_count: 0,
            specs_dir: PathBuf::from("tests/e2e/specs"),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            output_dir: PathBuf::from("test-results"),
            reporting: ReportingConfig::default(),
        }
    }
}

/// Reporting backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Backend base URL. Without one, steps are only mirrored to the console.
    pub endpoint: Option<String>,

    pub project: String,

    /// Launch name all tests of this run are grouped under
    pub launch: String,

    pub token: Option<String>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            project: "default".to_string(),
            launch: "stepwright".to_string(),
            token: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load, apply environment overrides and validate
    pub fn resolve(path: &Path) -> E2eResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STEPWRIGHT_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STEPWRIGHT_BROWSER") {
            self.browser = v;
        }
        if let Some(v) = lookup("STEPWRIGHT_HEADLESS") {
            self.headless = parse_bool("STEPWRIGHT_HEADLESS", &v)?;
        }
        if let Some(v) = lookup("STEPWRIGHT_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("STEPWRIGHT_TIMEOUT_MS") {
            self.timeout_ms = v
                .parse()
                .map_err(|_| E2eError::Config(format!("STEPWRIGHT_TIMEOUT_MS is not a number: {}", v)))?;
        }
        if let Some(v) = lookup("STEPWRIGHT_RETRY_COUNT") {
            self.retry_count = v
                .parse()
                .map_err(|_| E2eError::Config(format!("STEPWRIGHT_RETRY_COUNT is not a number: {}", v)))?;
        }
        if let Some(v) = lookup("STEPWRIGHT_REPORT_ENDPOINT") {
            self.reporting.endpoint = Some(v);
        }
        if let Some(v) = lookup("STEPWRIGHT_REPORT_PROJECT") {
            self.reporting.project = v;
        }
        if let Some(v) = lookup("STEPWRIGHT_REPORT_TOKEN") {
            self.reporting.token = Some(v);
        }
        Ok(())
    }

    /// Reject setup defects before any test runs
    pub fn validate(&self) -> E2eResult<()> {
        self.browser_kind()?;

        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(E2eError::Config(format!(
                "timeout_ms must be between 1 and {}, got {}",
                MAX_TIMEOUT_MS, self.timeout_ms
            )));
        }

        if self.retry_count > MAX_RETRIES {
            return Err(E2eError::Config(format!(
                "retry_count must be at most {}, got {}",
                MAX_RETRIES, self.retry_count
            )));
        }

        check_http_url("base_url", &self.base_url)?;
        if let Some(endpoint) = &self.reporting.endpoint {
            check_http_url("reporting.endpoint", endpoint)?;
        }
        Ok(())
    }

    pub fn browser_kind(&self) -> E2eResult<Browser> {
        self.browser.parse()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Driver settings. The viewport is chosen per spec.
    pub fn playwright_config(&self) -> E2eResult<PlaywrightConfig> {
        Ok(PlaywrightConfig {
            base_url: self.base_url.clone(),
            screenshot_dir: self.screenshot_dir.clone(),
            browser: self.browser_kind()?,
            headless: self.headless,
            timeout: self.timeout(),
            ..PlaywrightConfig::default()
        })
    }
}

fn check_http_url(field: &str, value: &str) -> E2eResult<()> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| E2eError::Config(format!("{} is not a valid URL ({}): {}", field, e, value)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(E2eError::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(E2eError::Config(format!("{} is not a boolean: {}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    #[test]
    fn test_defaults_are_valid() {
        HarnessConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = HarnessConfig::load(Path::new("/nonexistent/stepwright.toml")).unwrap();
        assert_eq!(config.browser, "chromium");
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwright.toml");
        std::fs::write(
            &path,
            r#"
browser = "firefox"
retry_count = 2

[reporting]
endpoint = "https://reports.example.com"
project = "shop"
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.browser, "firefox");
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.reporting.project, "shop");
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STEPWRIGHT_BROWSER", "webkit"),
            ("STEPWRIGHT_HEADLESS", "false"),
            ("STEPWRIGHT_TIMEOUT_MS", "5000"),
        ]
        .into_iter()
        .collect();

        let mut config = HarnessConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.browser, "webkit");
        assert!(!config.headless);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_playwright_config_follows_harness() {
        let config = HarnessConfig {
            browser: "firefox".to_string(),
            headless: false,
            timeout_ms: 1500,
            ..HarnessConfig::default()
        };
        let pw = config.playwright_config().unwrap();
        assert_eq!(pw.browser, Browser::Firefox);
        assert!(!pw.headless);
        assert_eq!(pw.timeout, Duration::from_millis(1500));
        assert_eq!(pw.screenshot_dir, config.screenshot_dir);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_env(|k| (k == "STEPWRIGHT_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test_case("browser", "netscape" ; "unknown browser")]
    #[test_case("timeout", "0" ; "zero timeout")]
    #[test_case("timeout", "9999999" ; "huge timeout")]
    #[test_case("base_url", "not a url" ; "unparseable url")]
    #[test_case("base_url", "ftp://example.com" ; "non http url")]
    fn test_validate_rejects(field: &str, value: &str) {
        let mut config = HarnessConfig::default();
        match field {
            "browser" => config.browser = value.to_string(),
            "timeout" => config.timeout_ms = value.parse().unwrap(),
            _ => config.base_url = value.to_string(),
        }
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration(), "{}", err);
    }
}
