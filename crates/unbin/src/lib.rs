//! `unbin`: self-extracting installer in, Debian package out.
//!
//! - `cli.rs` - Command-line surface
//! - `config.rs` - Layered configuration
//! - `pipeline.rs` - Stage orchestration

pub mod cli;
pub mod config;
pub mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use unbin_locate::LocateReport;
use unbin_unpack::UnpackReport;

use crate::cli::{Cli, Command};
use crate::config::{CONFIG_FILE, Config};
use crate::pipeline::{Pipeline, find_installer};

/// Resolve configuration for `cli` relative to `cwd`.
pub fn load_config(cli: &Cli, cwd: &Path) -> Result<Config> {
    let file = match &cli.options.config {
        Some(path) => {
            let path = cwd.join(path);
            if !path.is_file() {
                bail!("configuration file '{}' does not exist", path.display());
            }
            path
        }
        None => cwd.join(CONFIG_FILE),
    };
    Config::load(&file, &cli.options.overrides())
        .with_context(|| format!("loading configuration from '{}'", file.display()))
}

pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let config = load_config(&cli, &cwd)?;
    tracing::debug!(?config, "configuration");

    let installer = || -> Result<PathBuf> {
        match cli.input() {
            Some(path) => Ok(path.clone()),
            None => {
                let found = find_installer(&cwd)?;
                tracing::info!(installer = %found.display(), "using detected installer");
                Ok(found)
            }
        }
    };

    let pipeline = Pipeline::new(config)?;
    match &cli.command {
        Some(Command::Payload(_)) => {
            let stage = pipeline.payload(&installer()?)?;
            println!(
                "{} payload at offset {} ({} bytes, sha256 {}) -> {}",
                if stage.reused { "Reused" } else { "Wrote" },
                stage.info.offset,
                stage.info.len,
                stage.info.sha256,
                stage.path.display()
            );
        }
        Some(Command::Unpack(_)) => {
            let stage = pipeline.unpack(&installer()?)?;
            print_unpack(&stage.report);
            print_warnings(&stage.report.warnings());
        }
        Some(Command::Locate(arg)) => {
            let dir = arg
                .dir
                .clone()
                .unwrap_or_else(|| pipeline.config().installer_dir());
            let report = pipeline.locate(&dir)?;
            print_locate(&report);
            let missing = report.missing_required();
            if !missing.is_empty() {
                bail!("required deliverables not found: {}", missing.join(", "));
            }
        }
        Some(Command::Package(_)) | None => {
            let report = pipeline.package(&installer()?)?;
            print_unpack(&report.unpack.report);
            print_locate(&report.located);
            print_warnings(&report.warnings());
            if let Some(staging) = &report.staging {
                println!("Staged tree kept at {}", staging.display());
            }
            println!("Package created: {}", report.output.display());
        }
    }
    Ok(())
}

fn print_unpack(report: &UnpackReport) {
    println!(
        "Unpacked {} container(s) in {} iteration(s){}",
        report.extracted.len(),
        report.iterations,
        if report.stopped_early {
            ", stopped once all deliverables were present"
        } else {
            ""
        }
    );
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("warning: {warning}");
    }
}

fn print_locate(report: &LocateReport) {
    println!("Deliverables:");
    for result in &report.results {
        match &result.path {
            Some(path) => println!("  found    {:<10} {}", result.name, path.display()),
            None if result.required => println!("  MISSING  {}", result.name),
            None => println!("  absent   {} (optional)", result.name),
        }
    }
}
