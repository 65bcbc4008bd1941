//! Browser automation seam

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::spec::TestStep;

/// What a test step produced besides success
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutput {
    pub screenshot_path: Option<PathBuf>,
    pub text: Option<String>,
}

/// External browser-automation capability
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> E2eResult<()>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    async fn fill(&self, selector: &str, text: &str) -> E2eResult<()>;

    async fn get_text(&self, selector: &str) -> E2eResult<String>;

    /// Capture the current page into `path`
    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf>;

    /// Directory step screenshots are written to
    fn screenshot_dir(&self) -> &Path;

    /// Execute a declarative step.
    ///
    /// The default covers the primitive operations; drivers override it to
    /// support the rest.
    async fn execute(&self, step: &TestStep) -> E2eResult<StepOutput> {
        match step {
            TestStep::Navigate { url, .. } => {
                self.navigate(url).await?;
                Ok(StepOutput::default())
            }
            TestStep::Click { selector, .. } => {
                self.click(selector).await?;
                Ok(StepOutput::default())
            }
            TestStep::Fill { selector, value, .. } => {
                self.fill(selector, value).await?;
                Ok(StepOutput::default())
            }
            TestStep::Sleep { ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
                Ok(StepOutput::default())
            }
            TestStep::Screenshot { name, .. } => {
                let path = screenshot_path(self.screenshot_dir(), name);
                let path = self.screenshot(&path).await?;
                Ok(StepOutput {
                    screenshot_path: Some(path),
                    text: None,
                })
            }
            TestStep::Log { .. } => Ok(StepOutput::default()),
            other => Err(E2eError::Unsupported(other.name())),
        }
    }
}

/// Replace anything but ASCII alphanumerics and `-` so a name stays one path component
pub fn safe_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Where a named screenshot is written, always directly inside `dir`
pub fn screenshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.png", safe_file_stem(name)))
}
