//! File I/O for pdfjoin.
//!
//! This module handles all file I/O operations including:
//! - Loading PDF documents from disk under [`Limits`](crate::config::Limits)
//! - Parallel loading that keeps input order
//! - Serializing a merged graph and checking its cross-reference table
//! - Atomic output writes
//!
//! # Examples
//!
//! ```no_run
//! use pdfjoin::io::{PdfReader, PdfWriter};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::default();
//! let loaded = reader.load(&PathBuf::from("input.pdf")).await?;
//! println!("{} pages", loaded.page_count);
//!
//! let writer = PdfWriter::new();
//! writer.save(b"%PDF-1.4\n", &PathBuf::from("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod writer;

pub use reader::{LoadResult, LoadStatistics, LoadedPdf, PdfReader};
pub use writer::{PdfWriter, WriteStatistics, XRefCheck};

use crate::document::Document;
use crate::error::Result;
use std::path::Path;

/// Load a PDF document from a file with default limits.
///
/// Convenience function for loading a single PDF.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a loadable PDF.
///
/// # Examples
///
/// ```no_run
/// use pdfjoin::io::load_pdf;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let doc = load_pdf(Path::new("document.pdf")).await?;
/// println!("Loaded PDF with {} pages", doc.page_count());
/// # Ok(())
/// # }
/// ```
pub async fn load_pdf(path: &Path) -> Result<Document> {
    let reader = PdfReader::default();
    let loaded = reader.load(path).await?;
    Ok(loaded.document)
}

/// Write serialized PDF bytes to a file, atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub async fn save_pdf(bytes: &[u8], path: &Path) -> Result<()> {
    let writer = PdfWriter::new();
    writer.save(bytes, path).await.map(|_| ())
}
