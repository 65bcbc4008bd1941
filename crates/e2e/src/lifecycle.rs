//! Per-test hooks
//!
//! `on_test_start` opens the test item and annotates it with the test's
//! registration record. `on_test_end` captures failure evidence, reconciles
//! any step left open and closes the test item.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use stepwright_core::format::{self, color};
use stepwright_core::{FinishedStep, Outcome, Priority, Severity, StepExecutor};
use tracing::{info, warn};

use crate::driver::{safe_file_stem, BrowserDriver};

/// Registration-time metadata of a test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestDefinition {
    pub name: String,
    pub priority: Option<Priority>,
    pub categories: Vec<String>,
    pub description: Option<String>,
}

impl TestDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Report attributes: one `priority` entry and one `category` per category
    pub fn attributes(&self) -> Vec<(String, String)> {
        let mut attributes = Vec::new();
        if let Some(priority) = self.priority {
            attributes.push(("priority".to_string(), priority.as_str().to_string()));
        }
        for category in &self.categories {
            attributes.push(("category".to_string(), category.clone()));
        }
        attributes
    }
}

/// What one test run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub failure: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub steps: Vec<FinishedStep>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

pub struct TestLifecycle {
    executor: StepExecutor,
    driver: Arc<dyn BrowserDriver>,
    started: Option<Instant>,
}

impl TestLifecycle {
    pub fn new(executor: StepExecutor, driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            executor,
            driver,
            started: None,
        }
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub fn on_test_start(&mut self, definition: &TestDefinition) {
        let tracker = self.executor.tracker();
        let logger = self.executor.logger();

        tracker.begin_test(
            &definition.name,
            definition.description.as_deref().unwrap_or(""),
            definition.attributes(),
        );
        self.started = Some(Instant::now());
        info!(test = %definition.name, "Test started");

        logger.log_section_header(None, &format!("Test: {}", definition.name));

        if let Some(priority) = definition.priority {
            let attrs = priority.display_attributes();
            logger.log_html(
                None,
                Severity::Info,
                format!(
                    "{} {} {}",
                    attrs.icon,
                    format::badge(attrs.label, attrs.color),
                    format::escape(priority.guidance())
                ),
            );
        }

        if !definition.categories.is_empty() {
            logger.log_html(
                None,
                Severity::Info,
                format!(
                    "{} {}",
                    format::bold("Categories:"),
                    format::colored(&definition.categories.join(", "), color::PURPLE)
                ),
            );
        }

        if let Some(description) = &definition.description {
            logger.log_html(
                None,
                Severity::Info,
                format!("{} {}", format::bold("Description:"), format::italic(description)),
            );
        }
    }

    /// Close the test. A failed test gets a screenshot of the page it left behind.
    pub async fn on_test_end(&mut self, name: &str, outcome: Outcome, failure_message: Option<&str>) -> TestReport {
        let logger = self.executor.logger();
        let mut screenshot = None;

        if outcome == Outcome::Failed {
            let path = self.driver.screenshot_dir().join(failure_screenshot_name(name));
            match self.driver.screenshot(&path).await {
                Ok(saved) => {
                    logger.attach_screenshot(None, &saved, "Page at failure");
                    screenshot = Some(saved);
                }
                Err(e) => warn!(test = name, "Could not capture failure screenshot: {}", e),
            }
            logger.log_error(None, failure_message.unwrap_or("Test failed"), "");
        }

        let steps = self.executor.tracker().end_test(outcome);
        let duration_ms = self
            .started
            .take()
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or_default();

        match outcome {
            Outcome::Passed => info!(test = name, duration_ms, "Test passed"),
            Outcome::Failed => warn!(test = name, duration_ms, "Test failed"),
            Outcome::Skipped => info!(test = name, "Test skipped"),
        }

        TestReport {
            name: name.to_string(),
            outcome,
            duration_ms,
            failure: failure_message.map(String::from),
            screenshot,
            steps,
        }
    }
}

/// File name for a failure screenshot, unique per call
fn failure_screenshot_name(test: &str) -> String {
    format!("{}-failure-{}.png", safe_file_stem(test), chrono::Utc::now().format("%Y%m%d%H%M%S%3f"))
}
