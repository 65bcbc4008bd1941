//! Run test actions inside reported steps
//!
//! Every `run_*` call opens a step, runs the action, and closes the step
//! exactly once: `Passed` when the action returns `Ok`, `Failed` when it
//! returns `Err`. The action's error is handed back unchanged.
//!
//! If the returned future is dropped before the action settles (the runner
//! cancelled it), a guard closes the step as `Skipped`. A panic inside a
//! synchronous action closes it as `Failed` while unwinding.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::logger::StepLogger;
use crate::scoped::ScopedStep;
use crate::tracker::StepTracker;
use crate::types::{Outcome, StepId};

pub const DEFAULT_CATEGORY: &str = "Action";
pub const SUCCESS_MESSAGE: &str = "Step completed successfully";
pub const CANCELLED_MESSAGE: &str = "Step cancelled before completion";
pub const PANICKED_MESSAGE: &str = "Step panicked";

/// Error from [`StepExecutor::run_step_with_timeout`]
#[derive(Debug)]
pub enum TimedStepError<E> {
    /// The action itself failed
    Action(E),
    /// The action did not settle in time and was dropped
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for TimedStepError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimedStepError::Action(e) => e.fmt(f),
            TimedStepError::TimedOut(d) => write!(f, "Step timed out after {} ms", d.as_millis()),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimedStepError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimedStepError::Action(e) => Some(e),
            TimedStepError::TimedOut(_) => None,
        }
    }
}

/// Closes the step if dropped while still armed
struct CloseGuard<'a> {
    tracker: &'a StepTracker,
    id: StepId,
    armed: bool,
}

impl<'a> CloseGuard<'a> {
    fn new(tracker: &'a StepTracker, id: StepId) -> Self {
        Self {
            tracker,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            self.tracker.close(self.id, Outcome::Failed, PANICKED_MESSAGE);
        } else {
            self.tracker.close(self.id, Outcome::Skipped, CANCELLED_MESSAGE);
        }
    }
}

/// Entry point test code uses to wrap actions in steps
#[derive(Clone)]
pub struct StepExecutor {
    tracker: Arc<StepTracker>,
    logger: StepLogger,
}

impl StepExecutor {
    pub fn new(tracker: Arc<StepTracker>) -> Self {
        let logger = StepLogger::new(tracker.clone());
        Self { tracker, logger }
    }

    pub fn tracker(&self) -> &Arc<StepTracker> {
        &self.tracker
    }

    pub fn logger(&self) -> &StepLogger {
        &self.logger
    }

    /// Run an async action in an `"Action"` step and return its value
    pub async fn run_step<F, Fut, T, E>(&self, name: &str, action: F) -> Result<T, E>
    where
        F: FnOnce(StepId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_categorized_step(name, DEFAULT_CATEGORY, action).await
    }

    pub async fn run_categorized_step<F, Fut, T, E>(&self, name: &str, category: &str, action: F) -> Result<T, E>
    where
        F: FnOnce(StepId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let id = self.tracker.open(name, "", category);
        self.drive(id, action(id)).await
    }

    /// Run an action in a step nested under `parent`
    pub async fn run_nested_step<F, Fut, T, E>(
        &self,
        parent: StepId,
        name: &str,
        category: &str,
        action: F,
    ) -> Result<T, E>
    where
        F: FnOnce(StepId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let id = self.tracker.open_child(parent, name, "", category);
        self.drive(id, action(id)).await
    }

    /// Synchronous counterpart of [`run_categorized_step`](Self::run_categorized_step)
    pub fn run_step_sync<F, T, E>(&self, name: &str, category: &str, action: F) -> Result<T, E>
    where
        F: FnOnce(StepId) -> Result<T, E>,
        E: fmt::Display,
    {
        let id = self.tracker.open(name, "", category);
        let mut guard = CloseGuard::new(&self.tracker, id);
        let result = action(id);
        guard.disarm();
        self.finalize(id, result)
    }

    /// Run an action with a deadline.
    ///
    /// On timeout the action is dropped and the step is closed `Failed`.
    pub async fn run_step_with_timeout<F, Fut, T, E>(
        &self,
        name: &str,
        category: &str,
        timeout: Duration,
        action: F,
    ) -> Result<T, TimedStepError<E>>
    where
        F: FnOnce(StepId) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let id = self.tracker.open(name, "", category);
        let mut guard = CloseGuard::new(&self.tracker, id);
        let settled = tokio::time::timeout(timeout, action(id)).await;
        guard.disarm();

        match settled {
            Ok(result) => self.finalize(id, result).map_err(TimedStepError::Action),
            Err(_) => {
                let err = TimedStepError::TimedOut(timeout);
                self.tracker.close(id, Outcome::Failed, &err.to_string());
                Err(err)
            }
        }
    }

    /// Open a step whose status the caller controls. Closed on drop.
    pub fn begin_step(&self, name: &str) -> ScopedStep<'_> {
        self.begin_categorized_step(name, DEFAULT_CATEGORY)
    }

    pub fn begin_categorized_step(&self, name: &str, category: &str) -> ScopedStep<'_> {
        let id = self.tracker.open(name, "", category);
        ScopedStep::new(&self.tracker, &self.logger, id)
    }

    async fn drive<Fut, T, E>(&self, id: StepId, action: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut guard = CloseGuard::new(&self.tracker, id);
        let result = action.await;
        guard.disarm();
        self.finalize(id, result)
    }

    fn finalize<T, E: fmt::Display>(&self, id: StepId, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => {
                self.tracker.close(id, Outcome::Passed, SUCCESS_MESSAGE);
            }
            Err(e) => {
                self.tracker.close(id, Outcome::Failed, &format!("Step failed: {}", e));
            }
        }
        result
    }
}
