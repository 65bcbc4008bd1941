//! Live-step registry
//!
//! One tracker belongs to one executing test. Parallel test workers each
//! construct their own instance; nothing here is process-wide.
//!
//! Bookkeeping mistakes by callers (closing an unknown id, closing twice)
//! are treated as benign races and ignored. Reporter failures are logged
//! and never returned.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::reporter::{ItemStart, LogEntry, Reporter};
use crate::types::{Attachment, FinishedStep, ItemHandle, Outcome, Severity, Step, StepId, StepStatus};

/// Message used when teardown reconciles a step that was never closed
pub const ORPHANED_STEP_MESSAGE: &str = "Step was not finalized before test teardown";

pub struct StepTracker {
    reporter: Arc<dyn Reporter>,
    live: Mutex<HashMap<StepId, Step>>,
    /// Test-level item that top-level steps and root logs attach to
    root: Mutex<Option<ItemHandle>>,
    finished: Mutex<Vec<FinishedStep>>,
    opened: AtomicU64,
}

impl StepTracker {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            live: Mutex::new(HashMap::new()),
            root: Mutex::new(None),
            finished: Mutex::new(Vec::new()),
            opened: AtomicU64::new(0),
        }
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Handle of the current test-level item, if one was started
    pub fn root_handle(&self) -> Option<ItemHandle> {
        self.root.lock().clone()
    }

    /// Open a top-level step under the current test
    pub fn open(&self, name: &str, description: &str, category: &str) -> StepId {
        let parent = self.root_handle();
        self.open_under(parent, name, description, category)
    }

    /// Open a step nested under another live step.
    ///
    /// Falls back to the test root when `parent` is no longer live.
    pub fn open_child(&self, parent: StepId, name: &str, description: &str, category: &str) -> StepId {
        let parent_handle = match self.live.lock().get(&parent) {
            Some(step) => step.parent_handle.clone(),
            None => {
                debug!(parent = %parent, "Parent step is not live, nesting under test root");
                None
            }
        };
        let parent_handle = parent_handle.or_else(|| self.root_handle());
        self.open_under(parent_handle, name, description, category)
    }

    fn open_under(
        &self,
        parent: Option<ItemHandle>,
        name: &str,
        description: &str,
        category: &str,
    ) -> StepId {
        let id = StepId::new();
        let seq = self.opened.fetch_add(1, Ordering::Relaxed);
        let started_at = Utc::now();
        let start = Instant::now();

        let item = ItemStart {
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            start_time: started_at,
            parent,
            attributes: Vec::new(),
        };
        let parent_handle = match self.reporter.start_item(&item) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(step = %id, name, "Reporter could not open step scope: {}", e);
                None
            }
        };

        debug!(step = %id, name, category, "Step opened");
        self.live.lock().insert(
            id,
            Step {
                id,
                seq,
                name: name.to_string(),
                category: category.to_string(),
                description: description.to_string(),
                started_at,
                start,
                status: StepStatus::Pending,
                parent_handle,
            },
        );
        id
    }

    /// Finalize a step exactly once.
    ///
    /// Unknown ids are a no-op returning `None`, so a second close or a
    /// close racing teardown has no observable effect.
    pub fn close(&self, id: StepId, outcome: Outcome, message: &str) -> Option<FinishedStep> {
        let mut step = match self.live.lock().remove(&id) {
            Some(step) => step,
            None => {
                debug!(step = %id, "Ignoring close for step that is not live");
                return None;
            }
        };

        let duration = step.start.elapsed();
        let ended_at = Utc::now();
        step.status = outcome.into();

        if let Some(handle) = &step.parent_handle {
            let entry = LogEntry {
                handle: handle.clone(),
                text: message.to_string(),
                severity: outcome.severity(),
                timestamp: ended_at,
                attachment: None,
            };
            if let Err(e) = self.reporter.log(&entry) {
                warn!(step = %id, "Reporter could not store closing message: {}", e);
            }
            if let Err(e) = self.reporter.finish_item(handle, ended_at, outcome) {
                warn!(step = %id, "Reporter could not finish step: {}", e);
            }
        }

        debug!(
            step = %id,
            name = %step.name,
            status = %outcome,
            duration_ms = duration.as_millis() as u64,
            "Step closed"
        );

        let record = FinishedStep {
            id,
            name: step.name,
            category: step.category,
            status: outcome,
            message: message.to_string(),
            started_at: step.started_at,
            ended_at,
            duration,
        };
        self.finished.lock().push(record.clone());
        Some(record)
    }

    /// Snapshot of a live step
    pub fn get(&self, id: StepId) -> Option<Step> {
        self.live.lock().get(&id).cloned()
    }

    /// Force-close every live step as `Skipped` and empty the registry.
    ///
    /// Newest steps close first so nested children finish before their
    /// parents. Returns how many steps were reconciled.
    pub fn close_all_as_skipped(&self) -> usize {
        let mut orphans: Vec<(StepId, u64, String)> = self
            .live
            .lock()
            .values()
            .map(|s| (s.id, s.seq, s.name.clone()))
            .collect();
        // Newest first, so children finish before their parents
        orphans.sort_by(|a, b| b.1.cmp(&a.1));

        for (id, _, name) in &orphans {
            warn!(step = %id, name = %name, "Orphaned step closed as skipped at teardown");
            self.close(*id, Outcome::Skipped, ORPHANED_STEP_MESSAGE);
        }
        self.live.lock().clear();
        orphans.len()
    }

    /// Per-test setup boundary: reconcile leftovers and open the test item
    pub fn begin_test(&self, name: &str, description: &str, attributes: Vec<(String, String)>) -> Option<ItemHandle> {
        let leftovers = self.close_all_as_skipped();
        if leftovers > 0 {
            warn!(count = leftovers, "Previous test left steps open");
        }
        let stale_root = self.root.lock().take();
        if let Some(old_root) = stale_root {
            warn!(item = %old_root, "Previous test item was never finished");
            if let Err(e) = self.reporter.finish_item(&old_root, Utc::now(), Outcome::Skipped) {
                warn!("Reporter could not finish stale test item: {}", e);
            }
        }
        self.finished.lock().clear();

        let item = ItemStart {
            name: name.to_string(),
            description: description.to_string(),
            category: "Test".to_string(),
            start_time: Utc::now(),
            parent: None,
            attributes,
        };
        let handle = match self.reporter.start_item(&item) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(test = name, "Reporter could not open test item: {}", e);
                None
            }
        };
        *self.root.lock() = handle.clone();
        handle
    }

    /// Reconcile orphans, finish the test item and hand back the step history
    pub fn end_test(&self, outcome: Outcome) -> Vec<FinishedStep> {
        self.close_all_as_skipped();
        let root = self.root.lock().take();
        if let Some(root) = root {
            if let Err(e) = self.reporter.finish_item(&root, Utc::now(), outcome) {
                warn!(item = %root, "Reporter could not finish test item: {}", e);
            }
        }
        std::mem::take(&mut *self.finished.lock())
    }

    /// Steps closed since the current test began
    pub fn finished_steps(&self) -> Vec<FinishedStep> {
        self.finished.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    /// Send a log entry to a reporter scope, downgrading failures to warnings
    pub(crate) fn send_log(&self, handle: ItemHandle, severity: Severity, text: String, attachment: Option<Attachment>) {
        let entry = LogEntry {
            handle,
            text,
            severity,
            timestamp: Utc::now(),
            attachment,
        };
        if let Err(e) = self.reporter.log(&entry) {
            warn!(item = %entry.handle, "Reporter could not store log entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;

    fn tracker() -> (Arc<RecordingReporter>, StepTracker) {
        let reporter = Arc::new(RecordingReporter::new());
        let tracker = StepTracker::new(reporter.clone());
        (reporter, tracker)
    }

    #[test]
    fn test_open_close_returns_registry_to_empty() {
        let (reporter, tracker) = tracker();
        for i in 0..5 {
            let id = tracker.open(&format!("step {}", i), "", "Action");
            assert_eq!(tracker.len(), 1);
            assert_eq!(tracker.get(id).unwrap().status, StepStatus::Pending);
            tracker.close(id, Outcome::Passed, "done");
            assert!(tracker.is_empty());
        }
        assert_eq!(reporter.started().len(), 5);
        assert_eq!(reporter.finished().len(), 5);
    }

    #[test]
    fn test_close_unknown_id_is_noop() {
        let (reporter, tracker) = tracker();
        assert!(tracker.close(StepId::new(), Outcome::Failed, "nope").is_none());
        assert!(tracker.is_empty());
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_double_close_finishes_once() {
        let (reporter, tracker) = tracker();
        let id = tracker.open("Login", "", "Action");
        let first = tracker.close(id, Outcome::Passed, "ok");
        let second = tracker.close(id, Outcome::Failed, "late");
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(reporter.finished().len(), 1);
        assert_eq!(reporter.finished()[0].1, Outcome::Passed);
        assert!(tracker.get(id).is_none());
    }

    #[test]
    fn test_close_all_as_skipped() {
        let (reporter, tracker) = tracker();
        tracker.open("a", "", "Action");
        tracker.open("b", "", "Action");
        tracker.open("c", "", "Action");

        assert_eq!(tracker.close_all_as_skipped(), 3);
        assert!(tracker.is_empty());

        let finished = reporter.finished();
        assert_eq!(finished.len(), 3);
        assert!(finished.iter().all(|(_, s)| *s == Outcome::Skipped));
    }

    #[test]
    fn test_orphans_close_children_first() {
        let (reporter, tracker) = tracker();
        let parent = tracker.open("parent", "", "Action");
        tracker.open_child(parent, "child", "", "Action");

        tracker.close_all_as_skipped();

        let child = reporter.handle_named("child").unwrap();
        let parent = reporter.handle_named("parent").unwrap();
        let order: Vec<ItemHandle> = reporter.finished().into_iter().map(|(h, _)| h).collect();
        assert_eq!(order, vec![child, parent]);
    }

    #[test]
    fn test_orphans_close_in_reverse_open_order() {
        let (reporter, tracker) = tracker();
        let mut parent = tracker.open("level 0", "", "Action");
        for depth in 1..8 {
            parent = tracker.open_child(parent, &format!("level {}", depth), "", "Action");
        }

        assert_eq!(tracker.close_all_as_skipped(), 8);

        let expected: Vec<ItemHandle> = (0..8)
            .rev()
            .map(|depth| reporter.handle_named(&format!("level {}", depth)).unwrap())
            .collect();
        let order: Vec<ItemHandle> = reporter.finished().into_iter().map(|(h, _)| h).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_open_order_is_recorded() {
        let (_reporter, tracker) = tracker();
        let first = tracker.open("first", "", "Action");
        let second = tracker.open("second", "", "Action");
        assert!(tracker.get(first).unwrap().seq < tracker.get(second).unwrap().seq);
    }

    #[test]
    fn test_reporter_start_failure_is_not_fatal() {
        let (reporter, tracker) = tracker();
        reporter.fail_starts(true);

        let id = tracker.open("Offline", "", "Action");
        let step = tracker.get(id).unwrap();
        assert!(step.parent_handle.is_none());

        let finished = tracker.close(id, Outcome::Passed, "ok").unwrap();
        assert_eq!(finished.status, Outcome::Passed);
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_close_logs_message_before_finish() {
        let (reporter, tracker) = tracker();
        let id = tracker.open("Verify", "", "Verification");
        tracker.close(id, Outcome::Failed, "Step failed: boom");

        let handle = reporter.handle_named("Verify").unwrap();
        let logs = reporter.logs_for(&handle);
        assert_eq!(logs, vec![(Severity::Error, "Step failed: boom".to_string())]);
        assert!(matches!(
            reporter.events().last(),
            Some(crate::reporter::ReportEvent::Finished { .. })
        ));
    }

    #[test]
    fn test_nested_step_uses_parent_scope() {
        let (reporter, tracker) = tracker();
        let root = tracker.begin_test("checkout", "", vec![]).unwrap();
        let parent = tracker.open("Checkout", "", "Action");
        let child = tracker.open_child(parent, "Pay", "", "Action");

        let parent_handle = tracker.get(parent).unwrap().parent_handle.unwrap();
        let events = reporter.events();
        let parents: Vec<Option<ItemHandle>> = events
            .iter()
            .filter_map(|e| match e {
                crate::reporter::ReportEvent::Started { parent, .. } => Some(parent.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(parents, vec![None, Some(root), Some(parent_handle)]);

        tracker.close(child, Outcome::Passed, "ok");
        tracker.close(parent, Outcome::Passed, "ok");
    }

    #[test]
    fn test_begin_and_end_test() {
        let (reporter, tracker) = tracker();
        let root = tracker.begin_test("login", "Logs in", vec![]).unwrap();
        assert_eq!(tracker.root_handle(), Some(root.clone()));

        let done = tracker.open("done", "", "Action");
        tracker.close(done, Outcome::Passed, "ok");
        tracker.open("left open", "", "Action");

        let history = tracker.end_test(Outcome::Failed);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, Outcome::Skipped);
        assert_eq!(history[1].message, ORPHANED_STEP_MESSAGE);
        assert!(tracker.root_handle().is_none());
        assert_eq!(reporter.finished().last().unwrap(), &(root, Outcome::Failed));
    }

    #[test]
    fn test_begin_test_reconciles_previous_test() {
        let (reporter, tracker) = tracker();
        tracker.begin_test("first", "", vec![]);
        tracker.open("leaked", "", "Action");

        tracker.begin_test("second", "", vec![]);
        assert!(tracker.is_empty());
        assert!(tracker.finished_steps().is_empty());
        // leaked step and stale first test item
        assert_eq!(reporter.finished().len(), 2);
    }
}
