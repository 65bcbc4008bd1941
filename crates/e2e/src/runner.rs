//! Test runner: YAML specs in, reported step trees and a results file out

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwright_core::{Outcome, Reporter, StepExecutor, StepId, StepLogger, StepTracker, TimedStepError};
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::driver::BrowserDriver;
use crate::error::{E2eError, E2eResult};
use crate::lifecycle::{TestLifecycle, TestReport};
use crate::playwright::PlaywrightDriver;
use crate::spec::{TestSpec, TestStep};

/// Node startup and browser launch on top of the configured step timeout
const STEP_OVERHEAD: Duration = Duration::from_secs(15);

/// Builds the driver a spec runs against
pub type DriverFactory = Box<dyn Fn(&TestSpec) -> E2eResult<Arc<dyn BrowserDriver>> + Send + Sync>;

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestReport>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main test runner. One runner is one test worker.
pub struct TestRunner {
    config: HarnessConfig,
    executor: StepExecutor,
    drivers: DriverFactory,
}

impl TestRunner {
    pub fn new(config: HarnessConfig, reporter: Arc<dyn Reporter>, drivers: DriverFactory) -> Self {
        let tracker = Arc::new(StepTracker::new(reporter));
        Self {
            config,
            executor: StepExecutor::new(tracker),
            drivers,
        }
    }

    /// Runner backed by Playwright, one driver per spec viewport
    pub fn with_playwright(config: HarnessConfig, reporter: Arc<dyn Reporter>) -> E2eResult<Self> {
        let base = PlaywrightDriver::new(config.playwright_config()?)?;
        let drivers: DriverFactory =
            Box::new(move |spec: &TestSpec| Ok(Arc::new(base.with_viewport(spec.viewport)) as Arc<dyn BrowserDriver>));
        Ok(Self::new(config, reporter, drivers))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Run all tests in the specs directory
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run tests carrying a category
    pub async fn run_category(&self, category: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_category(&specs, category)
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run_specs(&filtered).await)
    }

    /// Run a specific test by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestReport> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.run_spec(&spec).await
    }

    /// Run a list of test specs. A spec that cannot start counts as failed.
    pub async fn run_specs(&self, specs: &[TestSpec]) -> TestSuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(specs.len());

        info!("Running {} test(s)...", specs.len());

        for spec in specs {
            let report = match self.run_spec(spec).await {
                Ok(report) => report,
                Err(e) => TestReport {
                    name: spec.name.clone(),
                    outcome: Outcome::Failed,
                    duration_ms: 0,
                    failure: Some(e.to_string()),
                    screenshot: None,
                    steps: vec![],
                },
            };
            match report.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", report.name, report.duration_ms),
                Outcome::Failed => error!(
                    "✗ {} - {}",
                    report.name,
                    report.failure.as_deref().unwrap_or("unknown error")
                ),
                Outcome::Skipped => info!("- {} (skipped)", report.name),
            }
            results.push(report);
        }

        let count = |outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let passed = count(Outcome::Passed);
        let failed = count(Outcome::Failed);
        let skipped = count(Outcome::Skipped);
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        TestSuiteResult {
            total: specs.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run a single test spec, retrying a failure up to the retry budget
    pub async fn run_spec(&self, spec: &TestSpec) -> E2eResult<TestReport> {
        let driver = (self.drivers)(spec)?;
        let attempts = spec.retries.unwrap_or(self.config.retry_count) + 1;

        let mut attempt = 1;
        loop {
            debug!(test = %spec.name, attempt, "Running test");
            let report = self.run_attempt(spec, &driver).await;
            if report.passed() || attempt >= attempts {
                return Ok(report);
            }
            warn!(
                test = %spec.name,
                attempt,
                "Retrying failed test: {}",
                report.failure.as_deref().unwrap_or("unknown error")
            );
            attempt += 1;
        }
    }

    async fn run_attempt(&self, spec: &TestSpec, driver: &Arc<dyn BrowserDriver>) -> TestReport {
        let mut lifecycle = TestLifecycle::new(self.executor.clone(), driver.clone());
        lifecycle.on_test_start(&spec.definition());

        let mut failure = None;
        for step in &spec.steps {
            if let Err(e) = self.run_test_step(driver.as_ref(), step).await {
                failure = Some(e.to_string());
                break;
            }
        }

        let outcome = if failure.is_some() {
            Outcome::Failed
        } else {
            Outcome::Passed
        };
        lifecycle.on_test_end(&spec.name, outcome, failure.as_deref()).await
    }

    /// Execute one spec step as a reported step
    async fn run_test_step(&self, driver: &dyn BrowserDriver, step: &TestStep) -> E2eResult<()> {
        let name = step.name();
        let logger = self.executor.logger().clone();
        let deadline = self.step_deadline(step);

        self.executor
            .run_step_with_timeout(&name, step.category(), deadline, |id| {
                perform(driver, logger, id, step)
            })
            .await
            .map_err(|e| match e {
                TimedStepError::Action(e) => e,
                TimedStepError::TimedOut(after) => {
                    E2eError::Timeout(format!("{} after {} ms", name, after.as_millis()))
                }
            })
    }

    fn step_deadline(&self, step: &TestStep) -> Duration {
        let extra = match step {
            TestStep::Sleep { ms } => Duration::from_millis(*ms),
            TestStep::Wait { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
            _ => Duration::ZERO,
        };
        self.config.timeout() + STEP_OVERHEAD + extra
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn perform(driver: &dyn BrowserDriver, logger: StepLogger, id: StepId, step: &TestStep) -> E2eResult<()> {
    match step {
        TestStep::Assert {
            selector,
            visible,
            text,
            text_contains,
            count,
        } => {
            if visible.is_some() || count.is_some() {
                let structural = TestStep::Assert {
                    selector: selector.clone(),
                    visible: *visible,
                    text: None,
                    text_contains: None,
                    count: *count,
                };
                driver.execute(&structural).await?;
                logger.log_info(Some(id), &format!("Element state verified for {}", selector), "");
            }
            if text.is_none() && text_contains.is_none() {
                return Ok(());
            }

            let actual = driver.get_text(selector).await?;
            if let Some(expected) = text {
                let passed = actual.trim() == expected.trim();
                logger.log_verification(Some(id), &format!("Text of {}", selector), expected, &actual, passed);
                if !passed {
                    return Err(E2eError::AssertionFailed(format!(
                        "text of {} is {:?}, expected {:?}",
                        selector, actual, expected
                    )));
                }
            }
            if let Some(fragment) = text_contains {
                let passed = actual.contains(fragment.as_str());
                logger.log_verification(Some(id), &format!("Text of {} contains", selector), fragment, &actual, passed);
                if !passed {
                    return Err(E2eError::AssertionFailed(format!(
                        "text of {} is {:?}, expected it to contain {:?}",
                        selector, actual, fragment
                    )));
                }
            }
            Ok(())
        }
        TestStep::Log { message } => {
            logger.log_info(Some(id), message, "");
            Ok(())
        }
        _ => {
            if let Some((action, element, value)) = describe_action(step) {
                logger.log_action(Some(id), action, element, value);
            }
            let output = driver.execute(step).await?;
            if let Some(path) = output.screenshot_path {
                logger.attach_screenshot(Some(id), &path, &step.name());
            }
            if let Some(text) = output.text {
                logger.log_debug(Some(id), &text, "Output");
            }
            Ok(())
        }
    }
}

/// Action, element and value for steps that touch the page
fn describe_action(step: &TestStep) -> Option<(&'static str, &str, Option<&str>)> {
    match step {
        TestStep::Navigate { url, .. } => Some(("Navigate", url.as_str(), None)),
        TestStep::Click { selector, .. } => Some(("Click", selector.as_str(), None)),
        TestStep::Fill { selector, value, .. } => Some(("Fill", selector.as_str(), Some(value.as_str()))),
        TestStep::Type { selector, text, .. } => Some(("Type", selector.as_str(), Some(text.as_str()))),
        TestStep::Press { selector, key } => Some(("Press", selector.as_deref().unwrap_or("page"), Some(key.as_str()))),
        TestStep::Hover { selector } => Some(("Hover", selector.as_str(), None)),
        TestStep::Select { selector, value } => Some(("Select", selector.as_str(), Some(value.as_str()))),
        TestStep::Check { selector } => Some(("Check", selector.as_str(), None)),
        TestStep::Uncheck { selector } => Some(("Uncheck", selector.as_str(), None)),
        _ => None,
    }
}
