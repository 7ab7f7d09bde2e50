mod cli;
mod logging;
mod report;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use libmorph::Mutant;

use crate::cli::Cli;
use crate::report::RunReport;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = logging::setup_logging(&cli.log_dir, cli.log_level) {
        eprintln!("Failed to setup logging: {}", err);
    }

    if let Err(err) = run(&cli) {
        log::error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let start_time = std::time::Instant::now();
    let output = cli.output_path();

    anyhow::ensure!(
        !is_same_file(&cli.input, &output)?,
        "Refusing to overwrite the input image {:?}",
        cli.input
    );

    let mut mutant = Mutant::load(&cli.input, &cli.config())
        .with_context(|| format!("Failed to load {:?}", cli.input))?;

    log::info!(
        "Loaded {} bytes from {:?}",
        mutant.buffer().len(),
        cli.input
    );

    let mut report = RunReport::new(
        &cli.input,
        &output,
        mutant.buffer().len(),
        &cli.signature.0,
    );
    report.seed = mutant.seed();

    for pass in 1..=cli.passes {
        let outcome = mutant
            .mutate(&cli.signature.0, cli.match_length())
            .with_context(|| format!("Mutation pass {} failed", pass))?;

        log::info!("Pass {}: {:?}", pass, outcome);
        report.record_pass(pass, &outcome);

        if !outcome.is_found() {
            log::warn!("Signature not found, stopping after pass {}", pass);
            break;
        }
    }

    mutant
        .finalize(&output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    log::info!("Mutated image written to {:?}", output);

    if cli.execute {
        log::warn!("Executing mutated image in-process");

        // The image comes from the user and runs with our privileges
        let outcome = unsafe { mutant.execute() }.context("Failed to execute mutated image")?;

        report.record_execution(&outcome);
    }

    report.finish(start_time);

    if let Some(path) = &cli.report {
        report
            .write(path)
            .with_context(|| format!("Failed to write report {:?}", path))?;

        log::info!("Report saved to: {:?}", path);
    }

    Ok(())
}

/// Whether `output` names the file `input` points at.
///
/// A missing output cannot be the input; otherwise both sides are resolved so
/// relative spellings and symlinks compare equal.
fn is_same_file(input: &Path, output: &Path) -> anyhow::Result<bool> {
    if !output.try_exists()? {
        return Ok(false);
    }

    let input = std::fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve {:?}", input))?;
    let output = std::fs::canonicalize(output)
        .with_context(|| format!("Failed to resolve {:?}", output))?;

    Ok(input == output)
}
