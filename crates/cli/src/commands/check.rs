//! Check Command
//!
//! Parses and validates probe specs without launching a browser.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use uiprobe_harness::ProbeSpec;

use crate::output::{print_document, print_success, print_warning, OutputFormat};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Probe spec file or directory
    #[arg(default_value = "probes")]
    pub path: PathBuf,
}

pub async fn execute(args: CheckArgs, format: OutputFormat) -> Result<i32> {
    let specs = ProbeSpec::load_all(&args.path)
        .with_context(|| format!("Invalid probe specs in {}", args.path.display()))?;

    if format.is_structured() {
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        print_document(&names, format);
        return Ok(0);
    }

    for spec in &specs {
        if spec.is_documentation() {
            print_warning(&format!("{}: documentation only, always passes", spec.name));
        } else if spec.indicators.is_empty() {
            print_warning(&format!("{}: no indicators to poll", spec.name));
        }
    }
    print_success(&format!(
        "{} probe spec(s) valid in {}",
        specs.len(),
        args.path.display()
    ));
    Ok(0)
}
