//! pdfjoin - Merge PDF files into a single document.
//!
//! Command-line front end: expands inputs, loads them in parallel, merges
//! and publishes the result atomically.

mod cli;
mod output;

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::output::{OutputFormatter, display_inputs, display_load_statistics};
use pdfjoin::config::{Config, OverwriteMode};
use pdfjoin::error::PdfJoinError;
use pdfjoin::io::{PdfReader, PdfWriter};
use pdfjoin::merge::Merger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        process::exit(err.exit_code());
    }
}

/// Install the stderr subscriber: `RUST_LOG` if set, else warnings only;
/// `--verbose` always enables debug output for the library.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pdfjoin=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdfjoin=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic.
async fn run(cli: Cli) -> Result<(), PdfJoinError> {
    cli.validate()?;

    let inputs = expand_inputs(&cli.inputs)?;
    let config = cli.to_config(inputs)?;

    let formatter = OutputFormatter::from_config(&config);

    if formatter.should_print() {
        formatter.section(&format!("{} v{}", pdfjoin::NAME, pdfjoin::VERSION));
        formatter.blank_line();
    }

    if config.dry_run {
        return dry_run(&config, &formatter).await;
    }

    handle_output_overwrite(&config, &formatter).await?;

    let writer = PdfWriter::new();
    writer.can_write(&config.output).await?;

    formatter.info(&format!("Merging {} files...", config.inputs.len()));

    let merger = Merger::new();
    let result = merger.merge(&config).await?;

    if formatter.should_print() {
        formatter.info(&format!(
            "Merged {} file(s) into {} pages in {:.2}s",
            result.statistics.files_merged,
            result.statistics.total_pages,
            result.statistics.merge_time.as_secs_f64()
        ));
    }

    formatter.info(&format!("Writing to: {}", config.output.display()));
    let write_stats = writer.save(&result.bytes, &config.output).await?;

    if formatter.should_print() {
        formatter.blank_line();
        formatter.success(&format!(
            "Successfully created {} ({})",
            config.output.display(),
            write_stats.format_file_size()
        ));

        if formatter.is_verbose() {
            formatter.blank_line();
            formatter.section("Statistics");
            formatter.detail("Input files", &result.statistics.files_merged.to_string());
            formatter.detail("Total pages", &result.statistics.total_pages.to_string());
            formatter.detail("Objects", &result.statistics.total_objects.to_string());
            formatter.detail("Input size", &result.statistics.format_input_size());
            formatter.detail("Output size", &write_stats.format_file_size());
            formatter.detail(
                "Load time",
                &format!("{:.2}s", result.statistics.load_time.as_secs_f64()),
            );
            formatter.detail(
                "Merge time",
                &format!("{:.2}s", result.statistics.merge_time.as_secs_f64()),
            );
            formatter.detail(
                "Write time",
                &format!("{:.2}s", write_stats.write_time.as_secs_f64()),
            );

            if result.statistics.bookmarks_added > 0 {
                formatter.detail("Bookmarks", &result.statistics.bookmarks_added.to_string());
            }

            if !config.metadata.is_empty() {
                formatter.detail("Metadata", "Set");
            }
        }
    }

    Ok(())
}

/// Load every input and report on it without merging or writing.
///
/// Fails with the first input's error if any input does not load.
async fn dry_run(config: &Config, formatter: &OutputFormatter) -> Result<(), PdfJoinError> {
    formatter.info("Loading input files...");

    let reader = PdfReader::new(config.limits.clone());
    let (results, stats) = reader
        .load_all(&config.inputs, config.effective_jobs())
        .await;

    display_inputs(formatter, &results);
    formatter.blank_line();
    display_load_statistics(formatter, &stats);

    if let Some(err) = results.into_iter().find_map(Result::err) {
        return Err(err);
    }

    formatter.blank_line();
    formatter.success("Dry run completed successfully");
    formatter.info(&format!("  Output would be: {}", config.output.display()));
    formatter.info("  Run without --dry-run to create the merged PDF");
    Ok(())
}

/// Expand glob patterns, keeping argument order.
///
/// Arguments without glob metacharacters are kept literally, so a missing
/// file is reported when it is loaded. A pattern that matches no file is
/// an error.
fn expand_inputs(patterns: &[PathBuf]) -> Result<Vec<PathBuf>, PdfJoinError> {
    let mut inputs = Vec::new();

    for pattern in patterns {
        let text = pattern.to_string_lossy();
        if !text.contains(['*', '?', '[']) {
            inputs.push(pattern.clone());
            continue;
        }

        let entries = glob::glob(&text).map_err(|err| {
            PdfJoinError::invalid_config(format!("Invalid pattern '{text}': {err}"))
        })?;

        let mut matched = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => matched.push(path),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping unreadable glob match"),
            }
        }
        if matched.is_empty() {
            return Err(PdfJoinError::file_not_found(pattern.clone()));
        }
        matched.sort();
        inputs.extend(matched);
    }

    Ok(inputs)
}

/// Handle output file overwrite scenarios.
async fn handle_output_overwrite(
    config: &Config,
    formatter: &OutputFormatter,
) -> Result<(), PdfJoinError> {
    if !config.output.exists() {
        return Ok(());
    }

    match config.overwrite_mode {
        OverwriteMode::Force => Ok(()),
        OverwriteMode::NoClobber => Err(PdfJoinError::output_exists(config.output.clone())),
        OverwriteMode::Prompt => {
            // Nobody to ask in quiet mode; treat as no-clobber
            if formatter.is_quiet() {
                return Err(PdfJoinError::output_exists(config.output.clone()));
            }

            formatter.warning(&format!(
                "Output file already exists: {}",
                config.output.display()
            ));

            use std::io::{self, Write};
            print!("Overwrite? [y/N]: ");
            io::stdout().flush().ok();

            let mut response = String::new();
            io::stdin()
                .read_line(&mut response)
                .map_err(|err| PdfJoinError::other(format!("Failed to read input: {err}")))?;

            let response = response.trim().to_lowercase();
            if response == "y" || response == "yes" {
                Ok(())
            } else {
                Err(PdfJoinError::Cancelled)
            }
        }
    }
}
