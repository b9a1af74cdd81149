//! Gantry CLI - runs a sandboxed guest module under the host runtime

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use gantry_runtime::{HostDriver, RunConfig};

/// Default run configuration file looked up next to the working directory.
const CONFIG_FILE: &str = "gantry.toml";

#[derive(Parser)]
#[command(name = "gantry", version, about = "Host runtime for sandboxed guest modules")]
struct Cli {
    /// Path to the guest module artifact (overrides the configuration file)
    module: Option<PathBuf>,

    /// Run configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entry point export to invoke
    #[arg(long)]
    entry: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("debug").init();
    } else {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(module) = cli.module {
        config.module = module;
    }
    if let Some(entry) = cli.entry {
        config.entry = entry;
    }
    tracing::debug!(module = %config.module.display(), entry = %config.entry, "run configuration resolved");

    // The driver reports any uncaught fault itself; the process just
    // carries the outcome in its exit code.
    let driver = HostDriver::new(config);
    match driver.run() {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = Path::new(CONFIG_FILE);
            if !default.exists() {
                return Ok(RunConfig::default());
            }
            default.to_path_buf()
        }
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading run configuration {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing run configuration {}", path.display()))
}
