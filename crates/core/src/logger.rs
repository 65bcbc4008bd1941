//! Logger facade: domain events to (message, severity, scope)
//!
//! Every call names its scope explicitly. `None` targets the test-level
//! item; `Some(id)` targets a live step. An unknown id, or a step whose
//! reporter scope could not be opened, logs nothing to the reporter.
//! Each message is also mirrored to `tracing`.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::format::{self, color};
use crate::tracker::StepTracker;
use crate::types::{Attachment, ItemHandle, Severity, StepId};

#[derive(Clone)]
pub struct StepLogger {
    tracker: Arc<StepTracker>,
}

impl StepLogger {
    pub fn new(tracker: Arc<StepTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<StepTracker> {
        &self.tracker
    }

    fn resolve(&self, target: Option<StepId>) -> Option<ItemHandle> {
        match target {
            None => self.tracker.root_handle(),
            Some(id) => self.tracker.get(id).and_then(|step| step.parent_handle),
        }
    }

    /// Log a message with an explicit severity
    pub fn log(&self, target: Option<StepId>, severity: Severity, message: &str, category: &str) {
        let text = if category.is_empty() {
            format::escape(message)
        } else {
            format!(
                "{} {}",
                format::colored(&format!("[{}]", category), color::GREY),
                format::escape(message)
            )
        };
        self.emit(target, severity, text, None);
    }

    /// Log an already formatted HTML fragment
    pub fn log_html(&self, target: Option<StepId>, severity: Severity, html: String) {
        self.emit(target, severity, html, None);
    }

    fn emit(&self, target: Option<StepId>, severity: Severity, text: String, attachment: Option<Attachment>) {
        mirror(target, severity, &text);
        match self.resolve(target) {
            Some(handle) => self.tracker.send_log(handle, severity, text, attachment),
            None => debug!(step = ?target.map(|id| id.to_string()), "No reporter scope for log entry"),
        }
    }

    pub fn log_trace(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Trace, message, category);
    }

    pub fn log_debug(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Debug, message, category);
    }

    pub fn log_info(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Info, message, category);
    }

    pub fn log_warn(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Warning, message, category);
    }

    pub fn log_error(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Error, message, category);
    }

    pub fn log_fatal(&self, target: Option<StepId>, message: &str, category: &str) {
        self.log(target, Severity::Fatal, message, category);
    }

    /// Record a UI action such as a click or a fill
    pub fn log_action(&self, target: Option<StepId>, action: &str, element: &str, value: Option<&str>) {
        let mut text = format!("{} on {}", format::bold(action), format::italic(element));
        if let Some(value) = value {
            text.push_str(&format!(" with value {}", format::code(value)));
        }
        self.emit(target, Severity::Info, text, None);
    }

    /// Record the outcome of a check. Observational only: it never fails the test.
    pub fn log_verification(
        &self,
        target: Option<StepId>,
        description: &str,
        expected: &str,
        actual: &str,
        passed: bool,
    ) {
        let (badge, severity) = if passed {
            (format::badge("PASSED", color::GREEN), Severity::Info)
        } else {
            (format::badge("FAILED", color::RED), Severity::Error)
        };
        let text = format!(
            "{} {}<br/>Expected: {}<br/>Actual: {}",
            badge,
            format::escape(description),
            format::code(expected),
            format::code(actual)
        );
        self.emit(target, severity, text, None);
    }

    pub fn log_test_data(&self, target: Option<StepId>, name: &str, value: &str, category: &str) {
        let text = format!(
            "{} {} = {}",
            format::colored(&format!("[{}]", category), color::PURPLE),
            format::bold(name),
            format::code(value)
        );
        self.emit(target, Severity::Info, text, None);
    }

    /// Record a measurement. A threshold only annotates the message.
    pub fn log_performance_metric(
        &self,
        target: Option<StepId>,
        name: &str,
        value: f64,
        unit: &str,
        threshold: Option<f64>,
    ) {
        let mut text = format!("{} {}: {} {}", format::bold("Metric"), format::escape(name), value, format::escape(unit));
        let mut severity = Severity::Info;
        if let Some(limit) = threshold {
            if value <= limit {
                text.push_str(&format!(
                    " {}",
                    format::colored(&format!("(within threshold {} {})", limit, unit), color::GREEN)
                ));
            } else {
                text.push_str(&format!(
                    " {}",
                    format::colored(&format!("(exceeds threshold {} {})", limit, unit), color::ORANGE)
                ));
                severity = Severity::Warning;
            }
        }
        self.emit(target, severity, text, None);
    }

    /// First row is rendered as the header
    pub fn log_table(&self, target: Option<StepId>, title: &str, rows: &[Vec<String>]) {
        self.emit(target, Severity::Info, format::table(title, rows), None);
    }

    pub fn log_section_header(&self, target: Option<StepId>, title: &str) {
        self.emit(target, Severity::Info, format::header(title), None);
    }

    /// Attach an image. A missing file is logged as a warning and skipped.
    pub fn attach_screenshot(&self, target: Option<StepId>, path: &Path, description: &str) {
        let mime = mime_for(path);
        self.attach_file(target, path, description, mime);
    }

    /// Attach any file. A missing file is logged as a warning and skipped.
    pub fn attach_file(&self, target: Option<StepId>, path: &Path, description: &str, mime_type: &str) {
        let attachment = match read_attachment(path, mime_type) {
            Ok(a) => a,
            Err(e) => {
                warn!("Skipping attachment: {}", e);
                return;
            }
        };
        let text = format!("{} {}", format::bold("Attachment:"), format::escape(description));
        self.emit(target, Severity::Info, text, Some(attachment));
    }
}

fn read_attachment(path: &Path, mime_type: &str) -> Result<Attachment> {
    if !path.is_file() {
        return Err(Error::MissingAttachment {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Attachment {
        name,
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// MIME type for a screenshot path, `image/png` when unknown
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

fn mirror(target: Option<StepId>, severity: Severity, text: &str) {
    let plain = format::to_plain(text);
    let step = target.map(|id| id.to_string()).unwrap_or_else(|| "root".to_string());
    match severity {
        Severity::Trace => trace!(step = %step, "{}", plain),
        Severity::Debug => debug!(step = %step, "{}", plain),
        Severity::Info => info!(step = %step, "{}", plain),
        Severity::Warning => warn!(step = %step, "{}", plain),
        Severity::Error | Severity::Fatal => error!(step = %step, level = %severity, "{}", plain),
    }
}
