//! Stepwright browser test harness
//!
//! Runs declarative YAML test specs against a browser and reports every
//! test as a tree of steps through `stepwright-core`:
//! - Controls Playwright via generated Node scripts
//! - Opens one reported step per spec step, categorized by step kind
//! - Annotates each test with its priority and categories
//! - Attaches a screenshot to every failed test
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TestRunner                             │
//! │    ├── HarnessConfig (TOML + STEPWRIGHT_* env)              │
//! │    ├── DriverFactory -> Arc<dyn BrowserDriver>              │
//! │    └── run_spec(spec) -> TestReport                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestLifecycle                                              │
//! │    ├── on_test_start(TestDefinition)                        │
//! │    └── on_test_end(name, outcome, failure) -> TestReport    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, priority, categories              │
//! │    └── steps: navigate | click | fill | assert | ...        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod playwright;
pub mod runner;
pub mod spec;

pub use config::{HarnessConfig, ReportingConfig};
pub use driver::{BrowserDriver, StepOutput};
pub use error::{E2eError, E2eResult};
pub use lifecycle::{TestDefinition, TestLifecycle, TestReport};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightDriver};
pub use runner::{DriverFactory, TestRunner, TestSuiteResult};
pub use spec::{TestSpec, TestStep, Viewport};
