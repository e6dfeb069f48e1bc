// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan: extract OCR-ready field crops from scanned card forms.
//
// Entry point. Initialises logging, loads the template and configuration,
// and drives one pipeline run. Exit status is 0 for a completed run (even
// with skipped pages or fields), 2 for a configuration error, 1 otherwise.

mod cli;

use std::process::ExitCode;

use cardscan_core::error::{CardscanError, Result};
use cardscan_core::human_errors::humanize_error;
use cardscan_core::template::Template;
use cardscan_core::types::RunReport;
use cardscan_document::{Pipeline, open_source};
use clap::Parser;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("cardscan starting");

    match run(&cli) {
        Ok(report) => {
            println!(
                "Processed {} pages: {} aligned, {} fields extracted",
                report.pages.len(),
                report.aligned_pages(),
                report.extracted_fields()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_fatal(&err);
            ExitCode::from(exit_status(&err))
        }
    }
}

/// 2 for configuration errors, 1 for anything else that stops a run.
fn exit_status(err: &CardscanError) -> u8 {
    if err.is_fatal() { 2 } else { 1 }
}

/// Startup checks run before any page is touched: template, configuration,
/// input document, then anchors and output directories.
fn run(cli: &Cli) -> Result<RunReport> {
    let template = Template::load(&cli.template)?;
    let config = cli.load_config()?;
    let source = open_source(&cli.input, &config)?;
    let pipeline = Pipeline::prepare(&config, &template)?;
    pipeline.run(source.as_ref())
}

fn report_fatal(err: &CardscanError) {
    let human = humanize_error(err);
    tracing::error!(error = %err, "Run aborted");
    eprintln!("Error: {}", human.message);
    eprintln!("  {}", human.suggestion);
    eprintln!("  ({err})");
}
