//! List Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use uiprobe_harness::ProbeSpec;

use crate::output::{print_list, OutputFormat};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Probe spec file or directory
    #[arg(default_value = "probes")]
    pub path: PathBuf,

    /// Show only probes carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

pub async fn execute(args: ListArgs, format: OutputFormat) -> Result<i32> {
    let specs = ProbeSpec::load_all(&args.path)
        .with_context(|| format!("Failed to load probe specs from {}", args.path.display()))?;

    let specs: Vec<ProbeSpec> = match &args.tag {
        Some(tag) => specs.into_iter().filter(|s| s.has_tag(tag)).collect(),
        None => specs,
    };

    print_list(&specs, format);
    Ok(0)
}
