//! Stepwright core
//!
//! Step-tree reporting for browser tests. A test wraps its actions in
//! steps; each step is mirrored into an external reporter as a nested
//! scope that collects messages, screenshots and metrics, and is always
//! finalized with a terminal status and a duration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  test code                                                   │
//! │    │  run_step(name, |id| action)      begin_step(name)      │
//! │    ▼                                                         │
//! │  StepExecutor ──────────────┐          ScopedStep (guard)    │
//! │    │ open / close           │ log_*                          │
//! │    ▼                        ▼                                │
//! │  StepTracker ◄──────── StepLogger ──── format (HTML)         │
//! │    │  registry: StepId -> Step                               │
//! │    ▼                                                         │
//! │  dyn Reporter: start_item / log / finish_item                │
//! │    ├── HttpReporter      (queued REST delivery)              │
//! │    ├── ConsoleReporter   (tracing)                           │
//! │    └── RecordingReporter (in memory)                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One [`StepTracker`] is built per test worker and passed to the code
//! that needs it. There is no global registry and no ambient "current
//! step": log calls name their target step explicitly.

pub mod error;
pub mod executor;
pub mod format;
pub mod logger;
pub mod priority;
pub mod reporter;
pub mod scoped;
pub mod tracker;
pub mod types;

pub use error::{Error, Result};
pub use executor::{StepExecutor, TimedStepError};
pub use logger::StepLogger;
pub use priority::{DisplayAttributes, Priority};
pub use reporter::{ConsoleReporter, HttpReporter, HttpReporterConfig, RecordingReporter, Reporter};
pub use scoped::ScopedStep;
pub use tracker::StepTracker;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
