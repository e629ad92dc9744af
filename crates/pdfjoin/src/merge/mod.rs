//! PDF merging operations.
//!
//! This module provides the structural merge:
//! - Reachability walk and renumbering per input
//! - Reference rewriting into one numbering space
//! - A synthesized catalog and flat page tree
//! - Document information and optional bookmarks
//!
//! # Examples
//!
//! ```no_run
//! use pdfjoin::merge::Merger;
//! use pdfjoin::config::Config;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new(
//!     vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
//!     "merged.pdf",
//! );
//!
//! let merger = Merger::new();
//! let result = merger.merge(&config).await?;
//! println!("Merged {} pages", result.statistics.total_pages);
//! # Ok(())
//! # }
//! ```

pub mod bookmarks;
pub mod graph;
pub mod merger;
pub mod metadata;

pub use bookmarks::BookmarkManager;
pub use graph::{MergedGraph, RenumberMap};
pub use merger::{format_file_size, MergeResult, MergeStatistics, Merger};
pub use metadata::MetadataManager;

use crate::config::Config;
use crate::error::Result;

/// Merge multiple PDF files according to configuration.
///
/// Convenience function that creates a merger and performs the merge.
///
/// # Returns
///
/// The serialized output and statistics about the operation.
///
/// # Errors
///
/// Returns an error if validation, loading, merging or writing fails.
///
/// # Examples
///
/// ```no_run
/// use pdfjoin::merge::merge_pdfs;
/// use pdfjoin::config::Config;
///
/// # async fn example(config: Config) -> Result<(), Box<dyn std::error::Error>> {
/// let (bytes, stats) = merge_pdfs(&config).await?;
/// println!("Created {} page document ({} bytes)", stats.total_pages, bytes.len());
/// # Ok(())
/// # }
/// ```
pub async fn merge_pdfs(config: &Config) -> Result<(Vec<u8>, MergeStatistics)> {
    let merger = Merger::new();
    let result = merger.merge(config).await?;
    Ok((result.bytes, result.statistics))
}
