//! Reporter that mirrors events into `tracing`

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ItemStart, LogEntry, Reporter};
use crate::error::Result;
use crate::format;
use crate::types::{ItemHandle, Outcome};

/// Used when no reporting backend is configured
#[derive(Debug, Default, Clone)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn start_item(&self, item: &ItemStart) -> Result<ItemHandle> {
        let handle = ItemHandle::new(Uuid::new_v4().to_string());
        info!(
            item = %handle,
            parent = ?item.parent.as_ref().map(ItemHandle::as_str),
            category = %item.category,
            "▶ {}",
            item.name
        );
        Ok(handle)
    }

    fn log(&self, entry: &LogEntry) -> Result<()> {
        let text = format::to_plain(&entry.text);
        match &entry.attachment {
            Some(a) => debug!(
                item = %entry.handle,
                level = %entry.severity,
                attachment = %a.name,
                bytes = a.bytes.len(),
                "{}",
                text
            ),
            None => debug!(item = %entry.handle, level = %entry.severity, "{}", text),
        }
        Ok(())
    }

    fn finish_item(&self, handle: &ItemHandle, end_time: DateTime<Utc>, status: Outcome) -> Result<()> {
        let mark = match status {
            Outcome::Passed => "✓",
            Outcome::Failed => "✗",
            Outcome::Skipped => "-",
        };
        info!(item = %handle, end = %end_time.to_rfc3339(), "{} {}", mark, status);
        Ok(())
    }
}
