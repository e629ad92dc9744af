//! PDF reading and loading operations.
//!
//! This module provides PDF loading with support for:
//! - Size checks from file metadata before any bytes are read
//! - Parsing on the blocking thread pool
//! - Bounded parallel loading that keeps input order
//! - Per-input error attribution and load statistics
//!
//! # Examples
//!
//! ```no_run
//! use pdfjoin::config::Limits;
//! use pdfjoin::io::reader::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new(Limits::default());
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let (results, stats) = reader.load_all(&paths, 4).await;
//! # Ok(())
//! # }
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::task;
use tracing::debug;

use crate::config::Limits;
use crate::document::Document;
use crate::error::{PdfJoinError, Result};
use crate::merge::format_file_size;

/// A loaded PDF document with metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The parsed document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Number of pages in the document.
    pub page_count: usize,

    /// Time taken to read and parse the document.
    pub load_time: Duration,

    /// File size in bytes.
    pub file_size: u64,
}

/// Result of a load operation (success or failure).
pub type LoadResult = Result<LoadedPdf>;

/// Statistics for a batch load operation.
#[derive(Debug, Clone)]
pub struct LoadStatistics {
    /// Number of PDFs successfully loaded.
    pub success_count: usize,

    /// Number of PDFs that failed to load.
    pub failure_count: usize,

    /// Total time taken for all loads.
    pub total_time: Duration,

    /// Average time per successful load.
    pub average_time: Duration,

    /// Total size of successfully loaded files.
    pub total_size: u64,

    /// Total number of pages loaded.
    pub total_pages: usize,
}

impl LoadStatistics {
    /// Create statistics from load results.
    fn from_results(results: &[LoadResult], total_time: Duration) -> Self {
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut total_size = 0;
        let mut total_pages = 0;
        let mut total_load_time = Duration::ZERO;

        for result in results {
            match result {
                Ok(loaded) => {
                    success_count += 1;
                    total_size += loaded.file_size;
                    total_pages += loaded.page_count;
                    total_load_time += loaded.load_time;
                }
                Err(_) => {
                    failure_count += 1;
                }
            }
        }

        let average_time = if success_count > 0 {
            total_load_time / success_count as u32
        } else {
            Duration::ZERO
        };

        Self {
            success_count,
            failure_count,
            total_time,
            average_time,
            total_size,
            total_pages,
        }
    }

    /// Format total size as human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// PDF reader applying a set of [`Limits`].
#[derive(Debug, Clone)]
pub struct PdfReader {
    limits: Limits,
}

impl PdfReader {
    /// Create a reader with the given limits.
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// The limits this reader applies.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Load a single PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist, is not a regular file or cannot be read
    /// - The file is larger than `max_input_bytes`
    /// - The content is not a loadable, unencrypted PDF
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfjoin::io::reader::PdfReader;
    /// # use std::path::Path;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let reader = PdfReader::default();
    /// let loaded = reader.load(Path::new("document.pdf")).await?;
    /// println!("Loaded {} pages in {:?}", loaded.page_count, loaded.load_time);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load(&self, path: &Path) -> Result<LoadedPdf> {
        let start = Instant::now();
        let path_buf = path.to_path_buf();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PdfJoinError::file_not_found(path_buf.clone()),
            _ => PdfJoinError::FileNotAccessible {
                path: path_buf.clone(),
                source: e,
            },
        })?;
        if !metadata.is_file() {
            return Err(PdfJoinError::not_a_file(path_buf));
        }
        let file_size = metadata.len();
        if file_size > self.limits.max_input_bytes {
            return Err(PdfJoinError::limit_exceeded(
                "max_input_bytes",
                file_size,
                self.limits.max_input_bytes,
            ));
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| PdfJoinError::FileNotAccessible {
                path: path_buf.clone(),
                source: e,
            })?;

        let limits = self.limits.clone();
        let document = task::spawn_blocking(move || Document::load(data, &limits))
            .await
            .map_err(|e| PdfJoinError::other(format!("Load task failed: {e}")))??;

        let load_time = start.elapsed();
        debug!(
            path = %path.display(),
            pages = document.page_count(),
            bytes = file_size,
            ?load_time,
            "input loaded"
        );

        Ok(LoadedPdf {
            page_count: document.page_count(),
            document,
            path: path_buf,
            load_time,
            file_size,
        })
    }

    /// Load all PDFs, at most `max_workers` at a time.
    ///
    /// Results come back in input order, and each error is wrapped with
    /// the position and path of the input that caused it.
    ///
    /// # Returns
    ///
    /// A tuple of (results, statistics) where results contains the load
    /// outcome for each file and statistics provides aggregate metrics.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfjoin::io::reader::PdfReader;
    /// # use std::path::PathBuf;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let reader = PdfReader::default();
    /// let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
    ///
    /// let (results, stats) = reader.load_all(&paths, 4).await;
    /// println!("Loaded {} of {} files in {:?}",
    ///          stats.success_count,
    ///          paths.len(),
    ///          stats.total_time);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load_all(
        &self,
        paths: &[PathBuf],
        max_workers: usize,
    ) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();
        let workers = max_workers.max(1);

        let tasks = paths.iter().enumerate().map(|(index, path)| async move {
            self.load(path)
                .await
                .map_err(|err| err.for_input(index, Some(path)))
        });
        let results: Vec<LoadResult> = stream::iter(tasks).buffered(workers).collect().await;

        let stats = LoadStatistics::from_results(&results, start.elapsed());
        (results, stats)
    }
}

impl Default for PdfReader {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
