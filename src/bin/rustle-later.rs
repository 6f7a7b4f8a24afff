use anyhow::{Context, Result};
use clap::Parser;
use rustle_later::cli::{write_errors, write_report, RustleLaterCli};
use rustle_later::collector::{ActionCollector, Report};
use rustle_later::config::Config;
use std::io::Write;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = RustleLaterCli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting rustle-later v{}", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every entry was processed without errors.
fn run(cli: &RustleLaterCli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let collector = ActionCollector::new(config).context("Invalid configuration")?;

    let mut report = Report::default();
    for entry in cli.entry_refs() {
        report.merge(collector.collect(&entry));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &report, cli.format).context("Failed to write report")?;
    out.flush()?;

    write_errors(&mut std::io::stderr().lock(), &report).context("Failed to write errors")?;

    if !report.is_clean() {
        error!("{} errors found", report.errors.len());
    }
    Ok(report.is_clean())
}
