//! In-memory reporter that records every event

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{ItemStart, LogEntry, Reporter};
use crate::error::{Error, Result};
use crate::types::{ItemHandle, Outcome, Severity};

/// An event observed by [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Started {
        handle: ItemHandle,
        name: String,
        category: String,
        parent: Option<ItemHandle>,
    },
    Logged {
        handle: ItemHandle,
        text: String,
        severity: Severity,
        /// Attachment name and size
        attachment: Option<(String, usize)>,
    },
    Finished {
        handle: ItemHandle,
        status: Outcome,
        end_time: DateTime<Utc>,
    },
}

/// Reporter that keeps events in memory, with optional failure injection
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
    next_handle: AtomicU64,
    fail_starts: AtomicBool,
    fail_all: AtomicBool,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `start_item` fail until reset
    pub fn fail_starts(&self, fail: bool) {
        self.fail_starts.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail until reset
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn started(&self) -> Vec<(ItemHandle, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Started { handle, name, .. } => Some((handle.clone(), name.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<(ItemHandle, Outcome)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Finished { handle, status, .. } => Some((handle.clone(), *status)),
                _ => None,
            })
            .collect()
    }

    /// Log entries sent to one scope
    pub fn logs_for(&self, handle: &ItemHandle) -> Vec<(Severity, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Logged {
                    handle: h,
                    text,
                    severity,
                    ..
                } if h == handle => Some((*severity, text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn attachments(&self) -> Vec<(ItemHandle, String, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Logged {
                    handle,
                    attachment: Some((name, len)),
                    ..
                } => Some((handle.clone(), name.clone(), *len)),
                _ => None,
            })
            .collect()
    }

    /// Handle of the most recently started item with this name
    pub fn handle_named(&self, name: &str) -> Option<ItemHandle> {
        self.started()
            .into_iter()
            .rev()
            .find(|(_, n)| n == name)
            .map(|(h, _)| h)
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!("{} refused by recording reporter", operation)));
        }
        Ok(())
    }
}

impl Reporter for RecordingReporter {
    fn start_item(&self, item: &ItemStart) -> Result<ItemHandle> {
        self.check("start_item")?;
        if self.fail_starts.load(Ordering::SeqCst) {
            return Err(Error::Transport("start_item refused by recording reporter".to_string()));
        }
        let n = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = ItemHandle::new(format!("item-{}", n));
        self.events.lock().push(ReportEvent::Started {
            handle: handle.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            parent: item.parent.clone(),
        });
        Ok(handle)
    }

    fn log(&self, entry: &LogEntry) -> Result<()> {
        self.check("log")?;
        self.events.lock().push(ReportEvent::Logged {
            handle: entry.handle.clone(),
            text: entry.text.clone(),
            severity: entry.severity,
            attachment: entry
                .attachment
                .as_ref()
                .map(|a| (a.name.clone(), a.bytes.len())),
        });
        Ok(())
    }

    fn finish_item(&self, handle: &ItemHandle, end_time: DateTime<Utc>, status: Outcome) -> Result<()> {
        self.check("finish_item")?;
        self.events.lock().push(ReportEvent::Finished {
            handle: handle.clone(),
            status,
            end_time,
        });
        Ok(())
    }
}
