//! Scoped step guard
//!
//! The step opens when the guard is created and closes when it is finished
//! or dropped, whichever comes first. The outcome is `Passed` unless a failed
//! verification or an explicit [`ScopedStep::failed`] / [`ScopedStep::skipped`]
//! overrides it. A scope left by a panic closes `Failed` unless it was
//! already marked `Failed` or `Skipped`.

use crate::executor::PANICKED_MESSAGE;
use crate::logger::StepLogger;
use crate::tracker::StepTracker;
use crate::types::{FinishedStep, Outcome, StepId};

pub struct ScopedStep<'a> {
    tracker: &'a StepTracker,
    logger: &'a StepLogger,
    id: StepId,
    outcome: Outcome,
    message: Option<String>,
    closed: bool,
}

impl<'a> ScopedStep<'a> {
    pub(crate) fn new(tracker: &'a StepTracker, logger: &'a StepLogger, id: StepId) -> Self {
        Self {
            tracker,
            logger,
            id,
            outcome: Outcome::Passed,
            message: None,
            closed: false,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn log_action(&mut self, action: &str, element: &str, value: Option<&str>) -> &mut Self {
        self.logger.log_action(Some(self.id), action, element, value);
        self
    }

    pub fn log_info(&mut self, message: &str) -> &mut Self {
        self.logger.log_info(Some(self.id), message, "");
        self
    }

    /// Log a check. A failed check marks the step `Failed`.
    pub fn log_verification(&mut self, description: &str, expected: &str, actual: &str, passed: bool) -> &mut Self {
        self.logger
            .log_verification(Some(self.id), description, expected, actual, passed);
        if !passed {
            self.outcome = Outcome::Failed;
            self.message
                .get_or_insert_with(|| format!("Verification failed: {}", description));
        }
        self
    }

    /// Message recorded when the step closes
    pub fn set_result(&mut self, message: &str) -> &mut Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn failed(&mut self, reason: &str) -> &mut Self {
        self.outcome = Outcome::Failed;
        self.message = Some(format!("Step failed: {}", reason));
        self
    }

    pub fn skipped(&mut self, reason: &str) -> &mut Self {
        self.outcome = Outcome::Skipped;
        self.message = Some(format!("Step skipped: {}", reason));
        self
    }

    /// Close now instead of at end of scope
    pub fn finish(mut self) -> Option<FinishedStep> {
        self.close()
    }

    fn close(&mut self) -> Option<FinishedStep> {
        if self.closed {
            return None;
        }
        self.closed = true;
        if std::thread::panicking() && self.outcome == Outcome::Passed {
            self.outcome = Outcome::Failed;
            self.message = Some(PANICKED_MESSAGE.to_string());
        }
        let message = self.message.take().unwrap_or_else(|| match self.outcome {
            Outcome::Passed => crate::executor::SUCCESS_MESSAGE.to_string(),
            Outcome::Failed => "Step failed".to_string(),
            Outcome::Skipped => "Step skipped".to_string(),
        });
        self.tracker.close(self.id, self.outcome, &message)
    }
}

impl Drop for ScopedStep<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
