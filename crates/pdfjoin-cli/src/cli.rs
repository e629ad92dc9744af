//! CLI argument parsing for pdfjoin.
//!
//! This module defines the command-line interface structure using `clap`.
//! It handles argument parsing, validation, and help text generation.

use clap::Parser;
use std::path::PathBuf;

use pdfjoin::config::{Config, Limits, Metadata, OverwriteMode};
use pdfjoin::error::{PdfJoinError, Result};

/// Merge PDF files into a single document.
///
/// pdfjoin copies every object reachable from the pages of each input,
/// renumbers them into one document, and builds a new catalog and page
/// tree. Pages keep their order: inputs in the order given, pages in
/// document order.
#[derive(Parser, Debug)]
#[command(name = "pdfjoin")]
#[command(version)]
#[command(about = "Merge PDF files into a single document", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input PDF files to merge (in order)
    ///
    /// Specify multiple files or use glob patterns.
    /// Files are merged in the order provided; each pattern expands
    /// in alphabetical order.
    ///
    /// Examples:
    ///   pdfjoin file1.pdf file2.pdf -o output.pdf
    ///   pdfjoin 'chapter*.pdf' -o book.pdf
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Output PDF file path
    ///
    /// The merged PDF will be written to this location.
    /// Use --force to overwrite existing files without confirmation.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Dry run - load every input and report without creating output
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output - per-input details, statistics and debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Force overwrite of existing output file without confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Never overwrite existing output file
    ///
    /// If the output file already exists, exit with an error
    /// instead of prompting or overwriting.
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Add one bookmark per input document
    ///
    /// Each bookmark is titled with the input's file name (without
    /// extension) and opens the first page of that input.
    #[arg(short, long)]
    pub bookmarks: bool,

    /// Set title metadata for output PDF
    ///
    /// If not specified, the title of the first input PDF is kept.
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Set author metadata for output PDF
    ///
    /// If not specified, the author of the first input PDF is kept.
    #[arg(long, value_name = "TEXT")]
    pub author: Option<String>,

    /// Set subject metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Set keywords metadata for output PDF (comma-separated)
    #[arg(long, value_name = "TEXT")]
    pub keywords: Option<String>,

    /// Number of inputs loaded in parallel
    ///
    /// Default is number of CPU cores. Use 1 for sequential loading.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Largest accepted input file, in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_input_bytes: Option<u64>,

    /// Largest object count per input and in the merged output
    #[arg(long, value_name = "N")]
    pub max_objects: Option<u64>,

    /// Rebuild broken cross-reference tables by scanning the file
    #[arg(long)]
    pub recover: bool,

    /// Read resource limits from a JSON file
    ///
    /// Fields: max_input_bytes, max_total_objects, allow_recovery_scan,
    /// max_nesting_depth, max_decoded_bytes. Missing fields keep their
    /// defaults; the --max-input-bytes, --max-objects and --recover flags
    /// override the file.
    #[arg(long, value_name = "FILE", env = "PDFJOIN_LIMITS")]
    pub limits: Option<PathBuf>,
}

impl Cli {
    /// Resolve the resource limits: the JSON file (if any), then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the limits file cannot be read or parsed, or
    /// a flag sets a cap to zero.
    pub fn resolve_limits(&self) -> Result<Limits> {
        let mut limits = match &self.limits {
            Some(path) => Limits::from_json_file(path)?,
            None => Limits::default(),
        };
        if let Some(bytes) = self.max_input_bytes {
            limits.max_input_bytes = bytes;
        }
        if let Some(objects) = self.max_objects {
            limits.max_total_objects = objects;
        }
        if self.recover {
            limits.allow_recovery_scan = true;
        }
        limits.validate()?;
        Ok(limits)
    }

    /// Convert CLI arguments into a validated Config.
    ///
    /// `inputs` are the already expanded input paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the limits cannot be resolved or the
    /// resulting configuration fails validation.
    pub fn to_config(&self, inputs: Vec<PathBuf>) -> Result<Config> {
        let overwrite_mode = if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        };

        let metadata = Metadata::new(
            self.title.clone(),
            self.author.clone(),
            self.subject.clone(),
            self.keywords.clone(),
        );

        let config = Config {
            inputs,
            output: self.output.clone(),
            dry_run: self.dry_run,
            verbose: self.verbose,
            quiet: self.quiet,
            overwrite_mode,
            bookmarks: self.bookmarks,
            metadata,
            jobs: self.jobs,
            limits: self.resolve_limits()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate CLI arguments before processing.
    ///
    /// Performs early validation that doesn't require file I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(PdfJoinError::invalid_config("No input files specified"));
        }

        if self.jobs == Some(0) {
            return Err(PdfJoinError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if self.max_input_bytes == Some(0) || self.max_objects == Some(0) {
            return Err(PdfJoinError::invalid_config("Limits must be at least 1"));
        }

        Ok(())
    }
}
