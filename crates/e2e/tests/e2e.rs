//! Browser test harness entry point
//!
//! This file is the test binary that runs browser tests from YAML specs.
//! Run with: cargo test --package stepwright-e2e --test e2e -- --config stepwright.toml

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepwright_core::{ConsoleReporter, HttpReporter, HttpReporterConfig, Reporter};
use stepwright_e2e::{HarnessConfig, TestRunner, TestSuiteResult};

#[derive(Parser, Debug)]
#[command(name = "stepwright-e2e")]
#[command(about = "Browser test runner with step-level reporting")]
struct Args {
    /// Harness configuration file
    #[arg(short, long, default_value = "stepwright.toml")]
    config: PathBuf,

    /// Path to test specs directory (overrides the config file)
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Run only tests carrying this category
    #[arg(long, alias = "tag")]
    category: Option<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "STEPWRIGHT_BROWSER")]
    browser: Option<String>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Ignored; accepted so `cargo test` can pass its own flags
    #[arg(long, hide = true)]
    nocapture: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::resolve(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(specs) = args.specs {
        config.specs_dir = specs;
    }
    if let Some(browser) = args.browser {
        config.browser = browser;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    config.validate()?;

    let http = match &config.reporting.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, project = %config.reporting.project, "Reporting to backend");
            Some(Arc::new(HttpReporter::spawn(HttpReporterConfig {
                endpoint: endpoint.clone(),
                project: config.reporting.project.clone(),
                launch: config.reporting.launch.clone(),
                token: config.reporting.token.clone(),
                ..HttpReporterConfig::default()
            })?))
        }
        None => None,
    };
    let reporter: Arc<dyn Reporter> = match &http {
        Some(http) => http.clone(),
        None => Arc::new(ConsoleReporter::new()),
    };

    let runner = TestRunner::with_playwright(config, reporter)?;

    let results = if let Some(name) = args.name {
        let report = runner.run_test(&name).await?;
        let passed = report.passed();
        TestSuiteResult {
            total: 1,
            passed: usize::from(passed),
            failed: usize::from(!passed),
            skipped: 0,
            duration_ms: report.duration_ms,
            results: vec![report],
        }
    } else if let Some(category) = args.category {
        runner.run_category(&category).await?
    } else {
        runner.run_all().await?
    };

    runner.write_results(&results)?;

    if let Some(http) = http {
        if let Err(e) = http.flush().await {
            warn!("Reporter did not drain: {}", e);
        }
    }

    Ok(results.success())
}

