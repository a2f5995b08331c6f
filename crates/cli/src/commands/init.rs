//! Init Command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use uiprobe_harness::ProbeConfig;

use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(short, long, default_value = "uiprobe.toml")]
    pub config: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Write a configuration file holding the defaults
pub async fn execute(args: InitArgs) -> Result<i32> {
    if args.config.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.config.display()
        );
    }

    ProbeConfig::default()
        .save(&args.config)
        .with_context(|| format!("Failed to write {}", args.config.display()))?;

    print_success(&format!("Wrote {}", args.config.display()));
    Ok(0)
}
