//! Error types for pdfjoin.
//!
//! This module defines all error types that can occur while loading,
//! merging and writing PDF documents. Errors carry enough context (byte
//! offsets, object ids, input index and path) to tell the user which input
//! failed and why.
//!
//! # Error Categories
//!
//! - **Parse Errors**: malformed syntax, malformed objects, missing xref.
//!   These are the only errors the recovery scan may work around.
//! - **Document Errors**: invalid structure, encryption, cyclic page trees.
//!   Always fatal for the input that raised them.
//! - **Engine Defects**: dangling references in a merged graph, xref offsets
//!   that do not match the written bytes. These abort the whole merge.
//! - **Limits**: configured size and count caps.
//! - **I/O Errors**: file not found, permission denied, etc.

use std::io;
use std::path::{Path, PathBuf};

use crate::object::ObjectId;

/// Result type alias for pdfjoin operations.
pub type Result<T> = std::result::Result<T, PdfJoinError>;

/// Main error type for pdfjoin operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfJoinError {
    /// The tokenizer hit bytes it cannot turn into a token.
    #[error("Malformed syntax at byte {offset}: {message}")]
    MalformedSyntax {
        /// Byte offset where scanning failed.
        offset: usize,
        /// What was wrong.
        message: String,
    },

    /// An object could not be built from otherwise valid tokens.
    #[error("Malformed object at byte {offset}: {message}")]
    MalformedObject {
        /// Byte offset of the offending object or token.
        offset: usize,
        /// What was wrong.
        message: String,
    },

    /// No usable cross-reference information was found.
    #[error("Missing or unreadable cross-reference data: {reason}")]
    MissingXRef {
        /// Details about the failure.
        reason: String,
    },

    /// The bytes are not a PDF document we can merge.
    #[error("Invalid PDF document: {reason}")]
    InvalidDocument {
        /// Details about what is missing or wrong.
        reason: String,
    },

    /// The trailer declares an `/Encrypt` dictionary.
    #[error(
        "PDF is encrypted and cannot be processed\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools"
    )]
    EncryptedDocument,

    /// A page tree node was reached twice while flattening.
    #[error("Page tree contains a cycle at object {node}")]
    CyclicPageTree {
        /// The node that was revisited.
        node: ObjectId,
    },

    /// A merged graph references an object it does not contain.
    #[error("Internal error: object {referrer} references missing object {reference}")]
    UnresolvedReference {
        /// The dangling target.
        reference: ObjectId,
        /// The object holding the reference.
        referrer: ObjectId,
    },

    /// Written xref offsets do not point at the objects they describe.
    #[error("Internal error: {} xref offset(s) do not match the written objects", .mismatches.len())]
    InconsistentXRef {
        /// Object numbers whose recorded offsets were wrong.
        mismatches: Vec<u32>,
    },

    /// A configured size or count cap was exceeded.
    #[error("Limit exceeded: {limit} is {actual}, maximum is {max}")]
    LimitExceeded {
        /// Name of the limit.
        limit: &'static str,
        /// Observed value.
        actual: u64,
        /// Configured maximum.
        max: u64,
    },

    /// Fewer inputs than a merge requires.
    #[error("At least {required} input files are required, got {actual}")]
    NotEnoughInputs {
        /// Minimum number of inputs.
        required: usize,
        /// Number supplied.
        actual: usize,
    },

    /// A failure attributed to one specific input.
    #[error("{}: {source}", input_label(.index, .path))]
    Input {
        /// Zero-based position of the input in the merge order.
        index: usize,
        /// Source path, when the input came from a file.
        path: Option<PathBuf>,
        /// The underlying failure.
        source: Box<PdfJoinError>,
    },

    /// Input file was not found.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Input path exists but is not a regular file.
    #[error("Not a file: {}", .path.display())]
    NotAFile {
        /// Path that is not a file.
        path: PathBuf,
    },

    /// Input file is not accessible (permission denied, etc.).
    #[error("Cannot access file: {}\n  Reason: {source}", .path.display())]
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Output file already exists and overwrite is not allowed.
    #[error(
        "Output file already exists: {}\n  \
         Use --force to overwrite or choose a different output path",
        .path.display()
    )]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Failed to create output file.
    #[error("Failed to create output file: {}\n  Reason: {source}", .path.display())]
    FailedToCreateOutput {
        /// Path where output should be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to write to output file.
    #[error("Failed to write to output file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

fn input_label(index: &usize, path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("Input #{} ({})", index + 1, path.display()),
        None => format!("Input #{}", index + 1),
    }
}

impl From<serde_json::Error> for PdfJoinError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl PdfJoinError {
    /// Create a MalformedSyntax error.
    pub fn malformed_syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedSyntax {
            offset,
            message: message.into(),
        }
    }

    /// Create a MalformedObject error.
    pub fn malformed_object(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedObject {
            offset,
            message: message.into(),
        }
    }

    /// Create a MissingXRef error.
    pub fn missing_xref(reason: impl Into<String>) -> Self {
        Self::MissingXRef {
            reason: reason.into(),
        }
    }

    /// Create an InvalidDocument error.
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }

    /// Create a LimitExceeded error.
    pub fn limit_exceeded(limit: &'static str, actual: u64, max: u64) -> Self {
        Self::LimitExceeded { limit, actual, max }
    }

    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: PathBuf) -> Self {
        Self::NotAFile { path }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: PathBuf) -> Self {
        Self::OutputExists { path }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Attribute this error to the input at `index`.
    ///
    /// Errors that already name an input are returned unchanged.
    pub fn for_input(self, index: usize, path: Option<&Path>) -> Self {
        match self {
            Self::Input { .. } => self,
            other => Self::Input {
                index,
                path: path.map(Path::to_path_buf),
                source: Box::new(other),
            },
        }
    }

    /// Fill in the path of an input error that has none.
    pub fn with_path(self, path: &Path) -> Self {
        match self {
            Self::Input {
                index,
                path: None,
                source,
            } => Self::Input {
                index,
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }

    /// The underlying error, looking through any input attribution.
    pub fn root_cause(&self) -> &PdfJoinError {
        match self {
            Self::Input { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Index of the input this error is attributed to, if any.
    pub fn input_index(&self) -> Option<usize> {
        match self {
            Self::Input { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Parsing-stage failures that the recovery scan may work around.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::MalformedSyntax { .. } | Self::MalformedObject { .. } | Self::MissingXRef { .. }
        )
    }

    /// Failures that indicate a bug in the merge engine rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::UnresolvedReference { .. } | Self::InconsistentXRef { .. }
        )
    }

    /// Check if this error is recoverable (operation can continue).
    ///
    /// Only parse errors qualify, and only when the caller enabled the
    /// recovery scan.
    pub fn is_recoverable(&self) -> bool {
        self.is_parse_error()
    }

    /// Check if this error should stop all processing immediately.
    pub fn is_fatal(&self) -> bool {
        self.is_defect()
            || matches!(
                self.root_cause(),
                Self::EncryptedDocument
                    | Self::CyclicPageTree { .. }
                    | Self::LimitExceeded { .. }
                    | Self::NotEnoughInputs { .. }
                    | Self::FailedToCreateOutput { .. }
                    | Self::FailedToWrite { .. }
                    | Self::Cancelled
            )
    }

    /// Get the exit code for this error.
    ///
    /// Returns the appropriate process exit code based on error type.
    pub fn exit_code(&self) -> i32 {
        match self.root_cause() {
            Self::FileNotFound { .. } => 2,
            Self::FileNotAccessible { .. } => 2,
            Self::NotAFile { .. } => 2,
            Self::MalformedSyntax { .. } => 3,
            Self::MalformedObject { .. } => 3,
            Self::MissingXRef { .. } => 3,
            Self::InvalidDocument { .. } => 3,
            Self::EncryptedDocument => 3,
            Self::CyclicPageTree { .. } => 3,
            Self::NotEnoughInputs { .. } => 1,
            Self::OutputExists { .. } => 4,
            Self::FailedToCreateOutput { .. } => 5,
            Self::FailedToWrite { .. } => 5,
            Self::Io { .. } => 5,
            Self::UnresolvedReference { .. } => 6,
            Self::InconsistentXRef { .. } => 6,
            Self::LimitExceeded { .. } => 7,
            Self::InvalidConfig { .. } => 1,
            Self::Cancelled => 130, // Standard exit code for SIGINT
            Self::Input { .. } | Self::Other { .. } => 1,
        }
    }
}
