//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::path::Path;
use stepwright_core::Priority;

use crate::error::{E2eError, E2eResult};
use crate::lifecycle::TestDefinition;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Importance surfaced in the report. Unknown values fail the load.
    #[serde(default)]
    pub priority: Option<Priority>,

    /// Categories for filtering and report attributes
    #[serde(default, alias = "tags")]
    pub categories: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Overrides the configured retry count for this test
    #[serde(default)]
    pub retries: Option<u32>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
        #[serde(default)]
        clear_first: bool,
    },

    /// Type text with keyboard simulation
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Press a key
    Press {
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Take a screenshot and attach it to the step
    Screenshot {
        name: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
    },

    /// Hover over an element
    Hover {
        selector: String,
    },

    /// Select an option from a dropdown
    Select {
        selector: String,
        value: String,
    },

    /// Check a checkbox
    Check {
        selector: String,
    },

    /// Uncheck a checkbox
    Uncheck {
        selector: String,
    },

    /// Log a message into the report
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl TestStep {
    /// Display name used for the reported step
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Type { selector, .. } => format!("type:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            TestStep::Hover { selector } => format!("hover:{}", selector),
            TestStep::Select { selector, .. } => format!("select:{}", selector),
            TestStep::Check { selector } => format!("check:{}", selector),
            TestStep::Uncheck { selector } => format!("uncheck:{}", selector),
            TestStep::Log { message } => {
                let short: String = message.chars().take(30).collect();
                format!("log:{}", short)
            }
        }
    }

    /// Report category for this kind of step
    pub fn category(&self) -> &'static str {
        match self {
            TestStep::Navigate { .. } => "Navigation",
            TestStep::Wait { .. } | TestStep::Sleep { .. } => "Wait",
            TestStep::Assert { .. } => "Verification",
            TestStep::Screenshot { .. } => "Screenshot",
            TestStep::Log { .. } => "Log",
            _ => "Action",
        }
    }
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory.
    ///
    /// A missing or unreadable directory is a configuration error, not an
    /// empty suite.
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::Config(format!(
                "specs directory does not exist or is not a directory: {}",
                dir.display()
            )));
        }

        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                E2eError::Config(format!("cannot read specs directory {}: {}", dir.display(), e))
            })?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter specs by category
    pub fn filter_by_category<'a>(specs: &'a [Self], category: &str) -> Vec<&'a Self> {
        specs
            .iter()
            .filter(|s| s.categories.iter().any(|c| c == category))
            .collect()
    }

    /// Registration record for the lifecycle hooks
    pub fn definition(&self) -> TestDefinition {
        TestDefinition {
            name: self.name.clone(),
            priority: self.priority,
            categories: self.categories.clone(),
            description: (!self.description.is_empty()).then(|| self.description.clone()),
        }
    }
}
