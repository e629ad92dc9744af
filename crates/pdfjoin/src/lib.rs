//! pdfjoin - Merge PDF files by structural object-graph merging.
//!
//! Each input is parsed into its object graph. Every object reachable from
//! its pages is renumbered into one numbering space. The output gets a new
//! catalog and a flat page tree over all pages in input order. It supports:
//!
//! - Classic cross-reference tables, cross-reference streams, object
//!   streams and incremental updates
//! - Inherited page attributes pushed down onto each page
//! - Optional recovery scan for files with a broken cross-reference table
//! - Document information carry-over and one bookmark per input
//! - Bounded parallel loading and resource limits
//!
//! # Examples
//!
//! ## In-memory merge
//!
//! ```no_run
//! # fn example(a: Vec<u8>, b: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let first = pdfjoin::load_document(a)?;
//! let second = pdfjoin::load_document(b)?;
//! let merged: Vec<u8> = pdfjoin::merge_documents(&[first, second])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## File-based merge
//!
//! ```no_run
//! use pdfjoin::config::Config;
//! use pdfjoin::io::PdfWriter;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::new(
//!     vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
//!     "merged.pdf",
//! );
//! config.bookmarks = true;
//!
//! let (bytes, stats) = pdfjoin::merge_pdfs(&config).await?;
//! PdfWriter::new().save(&bytes, &config.output).await?;
//! println!("Created {} page document", stats.total_pages);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod io;
pub mod merge;
pub mod object;
pub mod parser;

use std::borrow::Borrow;

// Re-export commonly used types
pub use config::{Config, Limits, MergeOptions, Metadata};
pub use document::Document;
pub use error::{PdfJoinError, Result};
pub use merge::merge_pdfs;
pub use object::{Dictionary, ObjectId, PdfValue, Stream};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load a document from bytes with default [`Limits`].
///
/// # Errors
///
/// See [`Document::load`].
pub fn load_document(data: Vec<u8>) -> Result<Document> {
    Document::load(data, &Limits::default())
}

/// Load a document from bytes with explicit limits.
///
/// # Errors
///
/// See [`Document::load`].
pub fn load_document_with(data: Vec<u8>, limits: &Limits) -> Result<Document> {
    Document::load(data, limits)
}

/// Merge loaded documents with default options and serialize the result.
///
/// # Errors
///
/// Returns `NotEnoughInputs` for fewer than two documents, and any merge
/// or serialization error.
pub fn merge_documents(documents: &[Document]) -> Result<Vec<u8>> {
    merge_documents_with(documents, &MergeOptions::default())
}

/// Merge loaded documents with explicit options and serialize the result.
///
/// # Errors
///
/// See [`merge::Merger::merge_documents`] and [`io::PdfWriter::write`].
pub fn merge_documents_with<D: Borrow<Document>>(
    documents: &[D],
    options: &MergeOptions,
) -> Result<Vec<u8>> {
    let graph = merge::Merger::new().merge_documents(documents, options)?;
    io::PdfWriter::new().write(&graph)
}
