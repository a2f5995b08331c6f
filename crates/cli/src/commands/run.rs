//! Run Command
//!
//! Executes probe specs in a real browser and writes a run directory with
//! screenshots, evidence manifests and `probe-results.json`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::debug;

use uiprobe_harness::{ChromiumFactory, ProbeConfig, ProbeRunner, ProbeSpec, RunnerConfig};

use crate::output::{print_document, print_list, print_warning, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Probe spec file or directory
    #[arg(default_value = "probes")]
    pub path: PathBuf,

    /// Run only probes carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only the probe with this name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = "uiprobe.toml", env = "UIPROBE_CONFIG")]
    pub config: PathBuf,

    /// Artifacts root (overrides the config file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sessions to run at once (overrides the config file)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Chrome/Chromium executable (overrides the config file)
    #[arg(long, env = "UIPROBE_CHROME")]
    pub browser: Option<PathBuf>,
}

impl RunArgs {
    /// Apply command line overrides on top of the config file
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(output) = &self.output {
            config.artifacts.dir = output.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.runner.concurrency = concurrency;
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(browser) = &self.browser {
            config.browser.executable = Some(browser.clone());
        }
    }

    /// Load specs and narrow them by tag and name
    fn select(&self) -> Result<Vec<ProbeSpec>> {
        let specs = ProbeSpec::load_all(&self.path)
            .with_context(|| format!("Failed to load probe specs from {}", self.path.display()))?;

        let selected: Vec<ProbeSpec> = specs
            .into_iter()
            .filter(|s| self.tag.as_deref().map_or(true, |t| s.has_tag(t)))
            .filter(|s| self.name.as_deref().map_or(true, |n| s.name == n))
            .collect();

        if selected.is_empty() {
            bail!("No probes matched in {}", self.path.display());
        }
        Ok(selected)
    }
}

/// Returns the process exit code
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<i32> {
    let mut config = ProbeConfig::load(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    args.apply(&mut config);
    debug!("Effective config: {:?}", config);

    let specs = args.select()?;

    let factory = Arc::new(ChromiumFactory::new(config.browser.clone()));
    let runner = ProbeRunner::new(
        factory,
        RunnerConfig::from_probe_config(&config, args.path.clone()),
    );

    let suite = runner.run_specs(&specs).await?;
    let results_path = runner
        .write_results(&suite)
        .context("Failed to write probe results")?;

    if format.is_structured() {
        print_document(&suite, format);
        return Ok(suite.exit_code());
    }

    println!();
    print_list(&suite.results, format);

    let summary = format!(
        "{} passed, {} failed, {} documented, {} errored in {} ms",
        suite.passed, suite.failed, suite.documented, suite.errored, suite.duration_ms
    );
    if suite.success() {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red(), summary);
    }
    for report in suite.results.iter().filter(|r| r.error.is_some()) {
        print_warning(&format!(
            "{}: {}",
            report.name,
            report.error.as_deref().unwrap_or_default()
        ));
    }
    println!("Artifacts: {}", results_path.display().to_string().dimmed());

    Ok(suite.exit_code())
}
