//! Configuration module for pdfjoin.
//!
//! Two layers live here:
//!
//! - [`Limits`] and [`MergeOptions`] steer the core engine. They are plain
//!   values with defaults and can be read from JSON.
//! - [`Config`] describes one complete run of the file-based front end
//!   (inputs, output, overwrite behaviour, parallelism), built by the CLI
//!   from its arguments and validated before any file is touched.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PdfJoinError, Result};

/// Resource caps applied while loading and merging.
///
/// Missing JSON fields fall back to the defaults.
///
/// # Examples
///
/// ```
/// use pdfjoin::config::Limits;
///
/// let limits = Limits::from_json_str(r#"{ "max_total_objects": 5000 }"#).unwrap();
/// assert_eq!(limits.max_total_objects, 5000);
/// assert!(!limits.allow_recovery_scan);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Largest accepted input, in bytes.
    pub max_input_bytes: u64,
    /// Largest object count, per input and in the merged output.
    pub max_total_objects: u64,
    /// Rebuild a broken cross-reference table by scanning the file.
    pub allow_recovery_scan: bool,
    /// Deepest array/dictionary nesting the parser accepts.
    pub max_nesting_depth: usize,
    /// Largest decoded size of one cross-reference or object stream.
    pub max_decoded_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_bytes: 512 * 1024 * 1024,
            max_total_objects: 4_000_000,
            allow_recovery_scan: false,
            max_nesting_depth: 128,
            max_decoded_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Limits {
    /// Parse limits from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the JSON is malformed, names an unknown
    /// field, or sets a cap to zero.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let limits: Self = serde_json::from_str(json)?;
        limits.validate()?;
        Ok(limits)
    }

    /// Read limits from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` / `FileNotAccessible` when the file cannot be
    /// read, otherwise the errors of [`Limits::from_json_str`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PdfJoinError::file_not_found(path.to_path_buf())
            } else {
                PdfJoinError::FileNotAccessible {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json_str(&json)
    }

    /// Reject caps that would refuse every input.
    pub fn validate(&self) -> Result<()> {
        if self.max_input_bytes == 0 {
            return Err(PdfJoinError::invalid_config("max_input_bytes must be at least 1"));
        }
        if self.max_total_objects == 0 {
            return Err(PdfJoinError::invalid_config("max_total_objects must be at least 1"));
        }
        if self.max_nesting_depth == 0 {
            return Err(PdfJoinError::invalid_config("max_nesting_depth must be at least 1"));
        }
        if self.max_decoded_bytes == 0 {
            return Err(PdfJoinError::invalid_config("max_decoded_bytes must be at least 1"));
        }
        Ok(())
    }
}

/// PDF metadata to set on the output document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Document keywords (comma-separated).
    pub keywords: Option<String>,
}

impl Metadata {
    /// Check if any metadata fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
    }

    /// Create metadata from optional strings, trimming whitespace.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    ) -> Self {
        let trimmed = |opt: Option<String>| {
            opt.filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
        };

        Self {
            title: trimmed(title),
            author: trimmed(author),
            subject: trimmed(subject),
            keywords: trimmed(keywords),
        }
    }
}

/// Options for a single merge call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Fewest documents a merge accepts.
    pub min_inputs: usize,
    /// Object count cap for the merged document.
    pub max_total_objects: u64,
    /// One outline entry per input, titled with these labels (in input
    /// order). `None` produces no outline.
    pub bookmarks: Option<Vec<String>>,
    /// Document information overrides.
    pub metadata: Metadata,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            min_inputs: 2,
            max_total_objects: Limits::default().max_total_objects,
            bookmarks: None,
            metadata: Metadata::default(),
        }
    }
}

impl MergeOptions {
    /// Options that take the object cap from `limits`.
    pub fn with_limits(limits: &Limits) -> Self {
        Self {
            max_total_objects: limits.max_total_objects,
            ..Self::default()
        }
    }
}

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Prompt the user before overwriting (default).
    #[default]
    Prompt,
    /// Always overwrite without prompting.
    Force,
    /// Never overwrite, error if file exists.
    NoClobber,
}

/// Complete configuration for a file-based merge run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input PDF file paths (in merge order).
    pub inputs: Vec<PathBuf>,

    /// Output PDF file path.
    pub output: PathBuf,

    /// Dry run mode - load and validate without creating output.
    pub dry_run: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Quiet mode - suppress non-error output.
    pub quiet: bool,

    /// File overwrite behavior.
    pub overwrite_mode: OverwriteMode,

    /// Add one bookmark per input, titled with the file name.
    pub bookmarks: bool,

    /// Metadata to set on the output document.
    pub metadata: Metadata,

    /// Number of parallel loads (None = auto-detect).
    pub jobs: Option<usize>,

    /// Parser and merge caps.
    pub limits: Limits,
}

impl Config {
    /// Minimal configuration for `inputs` merged into `output`.
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            output: output.into(),
            dry_run: false,
            verbose: false,
            quiet: false,
            overwrite_mode: OverwriteMode::default(),
            bookmarks: false,
            metadata: Metadata::default(),
            jobs: None,
            limits: Limits::default(),
        }
    }

    /// Returns a reference to inputs.
    pub fn inputs(&self) -> &[PathBuf] {
        self.inputs.as_ref()
    }

    /// Validate the configuration.
    ///
    /// Checks for logical inconsistencies and invalid combinations. Runs
    /// before any input file is opened.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Fewer than two input files are specified
    /// - Verbose and quiet modes are both enabled
    /// - Jobs count is zero
    /// - The output path is also an input
    /// - The limits are unusable
    pub fn validate(&self) -> Result<()> {
        if self.inputs.len() < 2 {
            return Err(PdfJoinError::NotEnoughInputs {
                required: 2,
                actual: self.inputs.len(),
            });
        }

        if self.verbose && self.quiet {
            return Err(PdfJoinError::invalid_config(
                "Cannot use both --verbose and --quiet",
            ));
        }

        if self.jobs == Some(0) {
            return Err(PdfJoinError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if self.inputs.iter().any(|input| input == &self.output) {
            return Err(PdfJoinError::invalid_config(format!(
                "Output file cannot be the same as an input file: {}",
                self.output.display()
            )));
        }

        self.limits.validate()
    }

    /// Get the effective number of parallel jobs.
    ///
    /// Returns the configured job count, or the number of CPU cores if auto-detect.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Check if output should be displayed.
    ///
    /// Returns false if in quiet mode and not doing a dry run.
    pub fn should_print(&self) -> bool {
        !self.quiet || self.dry_run
    }

    /// Merge options derived from this run: limits, metadata, and file-name
    /// bookmarks when requested.
    pub fn merge_options(&self) -> MergeOptions {
        let bookmarks = self.bookmarks.then(|| {
            self.inputs
                .iter()
                .map(|path| bookmark_title(path))
                .collect()
        });
        MergeOptions {
            bookmarks,
            metadata: self.metadata.clone(),
            ..MergeOptions::with_limits(&self.limits)
        }
    }
}

/// Bookmark title for an input: its file stem, or the full path as a
/// fallback.
pub fn bookmark_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
