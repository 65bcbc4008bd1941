//! Playwright browser automation
//!
//! Each command runs as a generated Node script. Scripts start from the
//! last page navigated to, so consecutive commands act on the same URL.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::driver::{screenshot_path, BrowserDriver, StepOutput};
use crate::error::{E2eError, E2eResult};
use crate::spec::{TestStep, Viewport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!(
                "unknown browser '{}' (expected chromium, firefox or webkit)",
                other
            ))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub viewport: Viewport,
    pub browser: Browser,
    pub headless: bool,
    /// Default timeout for element operations
    pub timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            browser: Browser::Chromium,
            headless: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Playwright-backed [`BrowserDriver`]
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
    /// Page the next script opens before running its command
    current_url: Mutex<Option<String>>,
}

impl PlaywrightDriver {
    /// Create a new Playwright driver
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self::unchecked(config))
    }

    /// Build a driver without probing for a Playwright install
    pub fn unchecked(config: PlaywrightConfig) -> Self {
        Self {
            config,
            current_url: Mutex::new(None),
        }
    }

    /// Same driver settings with a different viewport
    pub fn with_viewport(&self, viewport: Viewport) -> Self {
        Self::unchecked(PlaywrightConfig {
            viewport,
            ..self.config.clone()
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    fn timeout_ms(&self) -> u128 {
        self.config.timeout.as_millis()
    }

    /// Wrap a command body in a script that launches the browser
    pub fn build_script(&self, body: &str) -> String {
        let start_page = self
            .current_url
            .lock()
            .as_ref()
            .map(|url| format!("    await page.goto({});\n", js_str(url)))
            .unwrap_or_default();

        format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout});

  try {{
{start_page}{body}
    console.log(JSON.stringify({{ success: true }}));
  }} catch (error) {{
    console.error(JSON.stringify({{ success: false, error: error.message, stack: error.stack }}));
    process.exit(1);
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport.width,
            height = self.config.viewport.height,
            timeout = self.timeout_ms(),
            start_page = start_page,
            body = body,
        )
    }

    /// Convert a step to JavaScript code
    pub fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n    await page.waitForSelector({});", js_str(s)))
                    .unwrap_or_default();
                format!("    await page.goto({});{}", js_str(&self.resolve_url(url)), wait)
            }
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.map(u128::from).unwrap_or_else(|| self.timeout_ms());
                format!("    await page.click({}, {{ timeout: {} }});", js_str(selector), timeout)
            }
            TestStep::Fill { selector, value, clear_first } => {
                let sel = js_str(selector);
                if *clear_first {
                    format!(
                        "    await page.fill({sel}, '');\n    await page.fill({sel}, {});",
                        js_str(value)
                    )
                } else {
                    format!("    await page.fill({}, {});", sel, js_str(value))
                }
            }
            TestStep::Type { selector, text, delay_ms } => {
                let delay = delay_ms.unwrap_or(50);
                format!(
                    "    await page.type({}, {}, {{ delay: {} }});",
                    js_str(selector),
                    js_str(text),
                    delay
                )
            }
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!("    await page.locator({}).press({});", js_str(sel), js_str(key)),
                None => format!("    await page.keyboard.press({});", js_str(key)),
            },
            TestStep::Wait { selector, timeout_ms, state } => format!(
                "    await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                js_str(selector),
                state.as_str(),
                timeout_ms
            ),
            TestStep::Sleep { ms } => format!("    await page.waitForTimeout({});", ms),
            TestStep::Assert { selector, visible, text, text_contains, count } => {
                let sel = js_str(selector);
                let mut checks = Vec::new();
                if let Some(vis) = visible {
                    checks.push(format!(
                        "    if ((await page.locator({sel}).isVisible()) !== {vis}) throw new Error({});",
                        js_str(&format!("expected {} visible={}", selector, vis))
                    ));
                }
                if let Some(t) = text {
                    checks.push(format!(
                        "    if ((await page.locator({sel}).innerText()).trim() !== {}) throw new Error({});",
                        js_str(t),
                        js_str(&format!("expected {} text '{}'", selector, t))
                    ));
                }
                if let Some(tc) = text_contains {
                    checks.push(format!(
                        "    if (!(await page.locator({sel}).innerText()).includes({})) throw new Error({});",
                        js_str(tc),
                        js_str(&format!("expected {} to contain '{}'", selector, tc))
                    ));
                }
                if let Some(c) = count {
                    checks.push(format!(
                        "    if ((await page.locator({sel}).count()) !== {c}) throw new Error({});",
                        js_str(&format!("expected {} elements matching {}", c, selector))
                    ));
                }
                checks.join("\n")
            }
            TestStep::Screenshot { name, selector, full_page } => {
                let path = screenshot_path(&self.config.screenshot_dir, name);
                screenshot_js(&path, selector.as_deref(), *full_page)
            }
            TestStep::Hover { selector } => format!("    await page.hover({});", js_str(selector)),
            TestStep::Select { selector, value } => format!(
                "    await page.selectOption({}, {});",
                js_str(selector),
                js_str(value)
            ),
            TestStep::Check { selector } => format!("    await page.check({});", js_str(selector)),
            TestStep::Uncheck { selector } => format!("    await page.uncheck({});", js_str(selector)),
            TestStep::Log { message } => format!("    console.log({});", js_str(&format!("[TEST] {}", message))),
        }
    }

    /// Execute a script via Node and return its stdout
    pub async fn run_script(&self, script: &str) -> E2eResult<String> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("step.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut command = TokioCommand::new("node");
        command.arg(&script_path).current_dir(temp_dir.path());
        let output = run_command(command).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(E2eError::Playwright(
                script_error(&stderr).unwrap_or_else(|| format!("Script failed:\nstdout: {}\nstderr: {}", stdout, stderr)),
            ));
        }

        Ok(stdout)
    }

    async fn run_step(&self, step: &TestStep) -> E2eResult<String> {
        let script = self.build_script(&self.step_to_js(step));
        self.run_script(&script).await
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        let step = TestStep::Navigate {
            url: url.to_string(),
            wait_for_selector: None,
        };
        self.run_step(&step).await?;
        *self.current_url.lock() = Some(self.resolve_url(url));
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        let step = TestStep::Click {
            selector: selector.to_string(),
            timeout_ms: None,
        };
        self.run_step(&step).await.map(|_| ())
    }

    async fn fill(&self, selector: &str, text: &str) -> E2eResult<()> {
        let step = TestStep::Fill {
            selector: selector.to_string(),
            value: text.to_string(),
            clear_first: false,
        };
        self.run_step(&step).await.map(|_| ())
    }

    async fn get_text(&self, selector: &str) -> E2eResult<String> {
        let body = format!(
            "    const text = await page.locator({}).innerText();\n    console.log(JSON.stringify({{ text }}));",
            js_str(selector)
        );
        let stdout = self.run_script(&self.build_script(&body)).await?;
        extract_text(&stdout).ok_or_else(|| {
            E2eError::Playwright(format!("no text reported for {}", selector))
        })
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let script = self.build_script(&screenshot_js(path, None, true));
        self.run_script(&script).await?;
        Ok(path.to_path_buf())
    }

    fn screenshot_dir(&self) -> &Path {
        &self.config.screenshot_dir
    }

    async fn execute(&self, step: &TestStep) -> E2eResult<StepOutput> {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                self.run_step(step).await?;
                *self.current_url.lock() = Some(self.resolve_url(url));
                debug!(url, wait = ?wait_for_selector, "Navigated");
                Ok(StepOutput::default())
            }
            TestStep::Screenshot { name, .. } => {
                std::fs::create_dir_all(&self.config.screenshot_dir)?;
                self.run_step(step).await?;
                Ok(StepOutput {
                    screenshot_path: Some(screenshot_path(&self.config.screenshot_dir, name)),
                    text: None,
                })
            }
            TestStep::Log { .. } => Ok(StepOutput::default()),
            _ => {
                self.run_step(step).await?;
                Ok(StepOutput::default())
            }
        }
    }
}

/// Run a child to completion. Dropping the future kills the child, so a
/// timed-out or cancelled step leaves no browser behind.
async fn run_command(mut command: TokioCommand) -> E2eResult<std::process::Output> {
    command.kill_on_drop(true);
    Ok(command.output().await?)
}

fn screenshot_js(path: &Path, selector: Option<&str>, full_page: bool) -> String {
    let path_str = js_str(&path.to_string_lossy());
    match selector {
        Some(sel) => format!("    await page.locator({}).screenshot({{ path: {} }});", js_str(sel), path_str),
        None => format!("    await page.screenshot({{ path: {}, fullPage: {} }});", path_str, full_page),
    }
}

/// Quote a value as a JavaScript string literal
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Pull the `{"text": ...}` line a get_text script prints
fn extract_text(stdout: &str) -> Option<String> {
    let re = Regex::new(r#"(?m)^\{"text":.*\}$"#).ok()?;
    let line = re.find(stdout)?.as_str();
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("text")?.as_str().map(String::from)
}

/// Error message from the script's failure JSON on stderr
fn script_error(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
        value.get("error")?.as_str().map(String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> PlaywrightDriver {
        PlaywrightDriver::unchecked(PlaywrightConfig {
            base_url: "http://localhost:3000/".to_string(),
            screenshot_dir: PathBuf::from("/tmp/shots"),
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_browser() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("lynx".parse::<Browser>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_navigate_resolves_relative_url() {
        let js = driver().step_to_js(&TestStep::Navigate {
            url: "/login".to_string(),
            wait_for_selector: Some("#form".to_string()),
        });
        assert!(js.contains(r#"page.goto("http://localhost:3000/login")"#));
        assert!(js.contains(r##"page.waitForSelector("#form")"##));
    }

    #[test]
    fn test_values_are_quoted_safely() {
        let js = driver().step_to_js(&TestStep::Fill {
            selector: "#name".to_string(),
            value: "O'Brien \"Jr\"".to_string(),
            clear_first: false,
        });
        assert_eq!(js, r##"    await page.fill("#name", "O'Brien \"Jr\"");"##);
    }

    #[test]
    fn test_click_uses_default_timeout() {
        let js = driver().step_to_js(&TestStep::Click {
            selector: "#go".to_string(),
            timeout_ms: None,
        });
        assert!(js.contains("timeout: 30000"));
    }

    #[test]
    fn test_build_script_replays_current_page() {
        let d = driver();
        assert!(!d.build_script("").contains("page.goto"));
        *d.current_url.lock() = Some("http://localhost:3000/cart".to_string());
        let script = d.build_script("    await page.click(\"#buy\");");
        assert!(script.contains(r#"await page.goto("http://localhost:3000/cart");"#));
        assert!(script.contains("headless: true"));
    }

    #[test]
    fn test_screenshot_step_writes_into_screenshot_dir() {
        let js = driver().step_to_js(&TestStep::Screenshot {
            name: "home".to_string(),
            selector: None,
            full_page: true,
        });
        assert!(js.contains(r#"path: "/tmp/shots/home.png""#));
        assert!(js.contains("fullPage: true"));
    }

    #[test]
    fn test_screenshot_name_cannot_leave_screenshot_dir() {
        let js = driver().step_to_js(&TestStep::Screenshot {
            name: "../outside".to_string(),
            selector: None,
            full_page: false,
        });
        assert!(js.contains(r#"path: "/tmp/shots/___outside.png""#));
    }

    #[test]
    fn test_extract_text() {
        let stdout = "[TEST] hi\n{\"text\":\"Welcome back\"}\n{\"success\":true}\n";
        assert_eq!(extract_text(stdout).as_deref(), Some("Welcome back"));
        assert!(extract_text("{\"success\":true}").is_none());
    }

    #[test]
    fn test_script_error() {
        let stderr = "noise\n{\"success\":false,\"error\":\"Timeout 30000ms exceeded\"}\n";
        assert_eq!(script_error(stderr).as_deref(), Some("Timeout 30000ms exceeded"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_command_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late-write");
        let mut command = TokioCommand::new("sh");
        command
            .arg("-c")
            .arg(format!("sleep 1 && touch {}", marker.display()));

        let settled = tokio::time::timeout(Duration::from_millis(200), run_command(command)).await;
        assert!(settled.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }
}
