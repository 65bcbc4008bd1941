//! Reporter seam: the external service that ingests step, log and attachment events
//!
//! Reporter calls are synchronous and must not block. Implementations that
//! talk to the network queue the work and deliver it in order in the
//! background (see [`HttpReporter`]).

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Attachment, ItemHandle, Outcome, Severity};

pub mod console;
pub mod http;
pub mod recording;

pub use console::ConsoleReporter;
pub use http::{HttpReporter, HttpReporterConfig};
pub use recording::{RecordingReporter, ReportEvent};

/// Request to open a scope in the reporter
#[derive(Debug, Clone)]
pub struct ItemStart {
    pub name: String,
    pub description: String,
    pub category: String,
    pub start_time: DateTime<Utc>,
    /// Scope to nest under. `None` opens a top-level item.
    pub parent: Option<ItemHandle>,
    pub attributes: Vec<(String, String)>,
}

/// A single message sent to a reporter scope
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub handle: ItemHandle,
    pub text: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub attachment: Option<Attachment>,
}

/// External reporting backend
pub trait Reporter: Send + Sync {
    /// Open a child scope and return its handle
    fn start_item(&self, item: &ItemStart) -> Result<ItemHandle>;

    /// Append a message (and optionally a file) to a scope
    fn log(&self, entry: &LogEntry) -> Result<()>;

    /// Close a scope with its terminal status
    fn finish_item(&self, handle: &ItemHandle, end_time: DateTime<Utc>, status: Outcome) -> Result<()>;
}
