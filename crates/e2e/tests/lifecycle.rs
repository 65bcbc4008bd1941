//! Test lifecycle hooks against a recording reporter and a scripted driver

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepwright_core::{Outcome, Priority, RecordingReporter, Severity, StepExecutor, StepTracker};
use stepwright_e2e::{BrowserDriver, E2eError, E2eResult, TestDefinition, TestLifecycle};
use tempfile::TempDir;

struct ScriptedDriver {
    shots: PathBuf,
    camera_broken: bool,
    captured: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&self, _url: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn fill(&self, _selector: &str, _text: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn get_text(&self, _selector: &str) -> E2eResult<String> {
        Ok(String::new())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf> {
        if self.camera_broken {
            return Err(E2eError::Playwright("browser closed".to_string()));
        }
        std::fs::write(path, b"\x89PNG\r\n")?;
        self.captured.lock().push(path.to_path_buf());
        Ok(path.to_path_buf())
    }

    fn screenshot_dir(&self) -> &Path {
        &self.shots
    }
}

fn setup(dir: &TempDir, camera_broken: bool) -> (Arc<RecordingReporter>, Arc<ScriptedDriver>, TestLifecycle) {
    let reporter = Arc::new(RecordingReporter::new());
    let driver = Arc::new(ScriptedDriver {
        shots: dir.path().to_path_buf(),
        camera_broken,
        captured: Mutex::new(Vec::new()),
    });
    let executor = StepExecutor::new(Arc::new(StepTracker::new(reporter.clone())));
    let lifecycle = TestLifecycle::new(executor, driver.clone());
    (reporter, driver, lifecycle)
}

fn checkout() -> TestDefinition {
    TestDefinition {
        name: "checkout".to_string(),
        priority: Some(Priority::Critical),
        categories: vec!["cart".to_string(), "payments".to_string()],
        description: Some("Buys a single item".to_string()),
    }
}

#[tokio::test]
async fn test_start_annotates_test_item() {
    let dir = TempDir::new().unwrap();
    let (reporter, _driver, mut lifecycle) = setup(&dir, false);

    lifecycle.on_test_start(&checkout());

    let root = reporter.handle_named("checkout").unwrap();
    let logs = reporter.logs_for(&root);
    assert_eq!(logs.len(), 4);
    assert!(logs[0].1.contains("<h3>Test: checkout</h3>"));
    assert!(logs[1].1.contains("CRITICAL"));
    assert!(logs[1].1.contains(Priority::Critical.guidance().split('.').next().unwrap()));
    assert!(logs[2].1.contains("cart, payments"));
    assert!(logs[3].1.contains("Buys a single item"));
}

#[tokio::test]
async fn test_start_without_metadata_logs_only_header() {
    let dir = TempDir::new().unwrap();
    let (reporter, _driver, mut lifecycle) = setup(&dir, false);

    lifecycle.on_test_start(&TestDefinition::new("bare"));

    let root = reporter.handle_named("bare").unwrap();
    assert_eq!(reporter.logs_for(&root).len(), 1);
}

#[tokio::test]
async fn test_passed_test_has_no_screenshot() {
    let dir = TempDir::new().unwrap();
    let (reporter, driver, mut lifecycle) = setup(&dir, false);

    lifecycle.on_test_start(&checkout());
    let executor = lifecycle.executor().clone();
    executor
        .run_step("Add to cart", |_| async { Ok::<_, E2eError>(()) })
        .await
        .unwrap();
    let report = lifecycle.on_test_end("checkout", Outcome::Passed, None).await;

    assert!(report.passed());
    assert_eq!(report.steps.len(), 1);
    assert!(report.screenshot.is_none());
    assert!(driver.captured.lock().is_empty());

    let root = reporter.handle_named("checkout").unwrap();
    assert!(reporter.finished().contains(&(root, Outcome::Passed)));
}

#[tokio::test]
async fn test_failed_test_attaches_screenshot() {
    let dir = TempDir::new().unwrap();
    let (reporter, driver, mut lifecycle) = setup(&dir, false);

    lifecycle.on_test_start(&checkout());
    let report = lifecycle
        .on_test_end("checkout", Outcome::Failed, Some("payment declined"))
        .await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.failure.as_deref(), Some("payment declined"));
    let shot = report.screenshot.unwrap();
    assert!(shot.starts_with(dir.path()));
    assert_eq!(driver.captured.lock().len(), 1);

    let root = reporter.handle_named("checkout").unwrap();
    let attachments = reporter.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].0, root);

    let logs = reporter.logs_for(&root);
    assert!(logs
        .iter()
        .any(|(severity, text)| *severity == Severity::Error && text.contains("payment declined")));
}

#[tokio::test]
async fn test_screenshot_failure_does_not_abort_teardown() {
    let dir = TempDir::new().unwrap();
    let (reporter, _driver, mut lifecycle) = setup(&dir, true);

    lifecycle.on_test_start(&checkout());
    let report = lifecycle.on_test_end("checkout", Outcome::Failed, None).await;

    assert!(report.screenshot.is_none());
    assert!(reporter.attachments().is_empty());
    let root = reporter.handle_named("checkout").unwrap();
    assert!(reporter.finished().contains(&(root, Outcome::Failed)));
}

#[tokio::test]
async fn test_open_steps_are_skipped_at_teardown() {
    let dir = TempDir::new().unwrap();
    let (_reporter, _driver, mut lifecycle) = setup(&dir, false);

    lifecycle.on_test_start(&checkout());
    let executor = lifecycle.executor().clone();
    let scoped = executor.begin_step("Fill address");
    std::mem::forget(scoped);

    let report = lifecycle.on_test_end("checkout", Outcome::Failed, Some("timeout")).await;
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].status, Outcome::Skipped);
}
