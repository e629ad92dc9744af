//! PDF serialization and saving.
//!
//! This module provides:
//! - Serialization of a merged graph to a classic-xref PDF
//! - A self-check that re-reads the produced cross-reference table
//! - Atomic saves (write to a sibling temp file, then rename)
//! - Write statistics
//!
//! # Examples
//!
//! ```no_run
//! use pdfjoin::io::writer::PdfWriter;
//! use pdfjoin::merge::MergedGraph;
//! use std::path::Path;
//!
//! # async fn example(graph: MergedGraph) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = PdfWriter::new();
//! let bytes = writer.write(&graph)?;
//! writer.save(&bytes, Path::new("output.pdf")).await?;
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::task;
use tracing::debug;

use crate::config::Limits;
use crate::error::{PdfJoinError, Result};
use crate::merge::{format_file_size, MergedGraph};
use crate::object::{Dictionary, ObjectId, PdfValue, StringFormat};
use crate::parser::{Location, XRefTable};

/// Second header line; the high bytes mark the file as binary.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Nesting depth used when re-reading our own cross-reference table.
const SELF_CHECK_DEPTH: usize = 64;

/// Outcome of the post-write cross-reference check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefCheck {
    /// In-use entries compared against the bytes.
    pub entries_checked: usize,
    /// Object numbers whose entry did not point at `N 0 obj`.
    pub mismatches: Vec<u32>,
}

impl XRefCheck {
    /// Whether every entry pointed at its object.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to write the file.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// PDF writer.
#[derive(Debug, Clone)]
pub struct PdfWriter {
    /// Write to a temp file and rename into place.
    atomic: bool,
}

impl PdfWriter {
    /// Create a new PDF writer with atomic saves.
    pub fn new() -> Self {
        Self { atomic: true }
    }

    /// Create a writer without atomic writes (faster but less safe).
    pub fn non_atomic() -> Self {
        Self { atomic: false }
    }

    /// Serialize a merged graph and verify the result.
    ///
    /// # Errors
    ///
    /// `InconsistentXRef` when the produced cross-reference table does not
    /// point at the objects it lists.
    pub fn write(&self, graph: &MergedGraph) -> Result<Vec<u8>> {
        let bytes = serialize(graph);
        let check = verify_xref(&bytes, graph)?;
        if !check.is_consistent() {
            return Err(PdfJoinError::InconsistentXRef {
                mismatches: check.mismatches,
            });
        }
        debug!(
            bytes = bytes.len(),
            objects = graph.object_count(),
            entries_checked = check.entries_checked,
            "output serialized"
        );
        Ok(bytes)
    }

    /// Save serialized bytes to a file.
    ///
    /// With atomic writes the bytes go to a hidden sibling file that is
    /// renamed over `path`, so a partially written output is never visible.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Output directory doesn't exist
    /// - Insufficient permissions
    /// - Disk full
    /// - Write operation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfjoin::io::writer::PdfWriter;
    /// # use std::path::Path;
    /// # async fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
    /// let writer = PdfWriter::new();
    /// let stats = writer.save(&bytes, Path::new("output.pdf")).await?;
    /// println!("Wrote {} in {:?}", stats.format_file_size(), stats.write_time);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn save(&self, bytes: &[u8], path: &Path) -> Result<WriteStatistics> {
        let path_buf = path.to_path_buf();
        let bytes = bytes.to_vec();
        let atomic = self.atomic;

        task::spawn_blocking(move || {
            let start = Instant::now();

            let write_path = if atomic {
                temp_path(&path_buf)
            } else {
                path_buf.clone()
            };

            let file = std::fs::File::create(&write_path).map_err(|e| {
                PdfJoinError::FailedToCreateOutput {
                    path: write_path.clone(),
                    source: e,
                }
            })?;

            let mut writer = std::io::BufWriter::new(file);
            let written = writer
                .write_all(&bytes)
                .and_then(|()| writer.flush())
                .and_then(|()| writer.get_ref().sync_all());
            if let Err(e) = written {
                drop(writer);
                if atomic {
                    let _ = std::fs::remove_file(&write_path);
                }
                return Err(PdfJoinError::FailedToWrite {
                    path: write_path,
                    source: e,
                });
            }
            drop(writer);

            if atomic {
                std::fs::rename(&write_path, &path_buf).map_err(|e| {
                    let _ = std::fs::remove_file(&write_path);
                    PdfJoinError::FailedToWrite {
                        path: path_buf.clone(),
                        source: e,
                    }
                })?;
            }

            Ok::<_, PdfJoinError>(WriteStatistics {
                write_time: start.elapsed(),
                file_size: bytes.len() as u64,
                output_path: path_buf,
            })
        })
        .await
        .map_err(|e| PdfJoinError::other(format!("Write task failed: {e}")))?
    }

    /// Check if a file can be written to the given path.
    ///
    /// Performs pre-flight checks without actually writing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory doesn't exist
    /// - Parent directory is not writable
    pub async fn can_write(&self, path: &Path) -> Result<()> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let metadata =
            tokio::fs::metadata(parent)
                .await
                .map_err(|e| PdfJoinError::FileNotAccessible {
                    path: parent.to_path_buf(),
                    source: e,
                })?;

        if !metadata.is_dir() {
            return Err(PdfJoinError::invalid_config(format!(
                "Output directory does not exist: {}",
                parent.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(PdfJoinError::invalid_config(format!(
                "Output directory is not writable: {}",
                parent.display()
            )));
        }

        Ok(())
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.pdf".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Serialize a merged graph to PDF bytes.
///
/// Objects are written in ascending id order followed by a classic
/// cross-reference table covering `0..=max`, where numbers without an
/// object are free entries.
pub fn serialize(graph: &MergedGraph) -> Vec<u8> {
    let (major, minor) = graph.version;
    let mut out = format!("%PDF-{major}.{minor}\n").into_bytes();
    out.extend_from_slice(BINARY_MARKER);

    let mut offsets = Vec::with_capacity(graph.object_count());
    for (id, value) in &graph.objects {
        offsets.push((id.number, out.len()));
        out.extend_from_slice(format!("{} {} obj\n", id.number, id.generation).as_bytes());
        write_value(&mut out, value);
        out.extend_from_slice(b"\nendobj\n");
    }

    let size = graph.max_number() + 1;
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    let mut offsets = offsets.into_iter().peekable();
    for number in 1..size {
        match offsets.next_if(|(n, _)| *n == number) {
            Some((_, offset)) => {
                out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes())
            }
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }

    let mut trailer = Dictionary::new();
    trailer.set("Size", i64::from(size));
    trailer.set("Root", graph.root);
    if let Some(info) = graph.info {
        trailer.set("Info", info);
    }
    out.extend_from_slice(b"trailer\n");
    write_value(&mut out, &PdfValue::Dictionary(trailer));
    out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
    out
}

/// Re-read the cross-reference table of `bytes` and check every entry.
///
/// Each object of `graph` must be listed, and each in-use entry must point
/// at `N G obj` for its own number.
///
/// # Errors
///
/// Any parse error from reading the table back.
pub fn verify_xref(bytes: &[u8], graph: &MergedGraph) -> Result<XRefCheck> {
    let limits = Limits {
        max_nesting_depth: SELF_CHECK_DEPTH,
        ..Limits::default()
    };
    let table = XRefTable::load(bytes, &limits)?;
    let mut mismatches = Vec::new();
    let mut entries_checked = 0;

    for id in table.in_use() {
        entries_checked += 1;
        if !points_at(bytes, &table, id) {
            mismatches.push(id.number);
        }
    }
    for id in graph.objects.keys() {
        if table.resolve(*id).is_none() && !mismatches.contains(&id.number) {
            mismatches.push(id.number);
        }
    }
    mismatches.sort_unstable();

    Ok(XRefCheck {
        entries_checked,
        mismatches,
    })
}

fn points_at(bytes: &[u8], table: &XRefTable, id: ObjectId) -> bool {
    match table.resolve(id) {
        Some(Location::Offset(offset)) => {
            let header = format!("{} {} obj", id.number, id.generation);
            bytes
                .get(offset..)
                .is_some_and(|rest| rest.starts_with(header.as_bytes()))
        }
        _ => false,
    }
}

/// Append the PDF syntax for `value`.
fn write_value(out: &mut Vec<u8>, value: &PdfValue) {
    match value {
        PdfValue::Null => out.extend_from_slice(b"null"),
        PdfValue::Boolean(true) => out.extend_from_slice(b"true"),
        PdfValue::Boolean(false) => out.extend_from_slice(b"false"),
        PdfValue::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        PdfValue::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
        PdfValue::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        PdfValue::String(bytes, StringFormat::Hexadecimal) => write_hex_string(out, bytes),
        PdfValue::Name(name) => write_name(out, name),
        PdfValue::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        PdfValue::Dictionary(dict) => write_dictionary(out, dict, None),
        PdfValue::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.number, id.generation).as_bytes())
        }
        PdfValue::Stream(stream) => {
            write_dictionary(out, &stream.dict, Some(stream.content.len()));
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
    }
}

/// Write a dictionary; `length` replaces any `/Length` entry.
fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary, length: Option<usize>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        if length.is_some() && key.as_slice() == b"Length" {
            continue;
        }
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_value(out, value);
    }
    if let Some(length) = length {
        out.extend_from_slice(format!(" /Length {length}").as_bytes());
    }
    out.extend_from_slice(b" >>");
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        let plain = (b'!'..=b'~').contains(&byte)
            && !matches!(
                byte,
                b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
            );
        if plain {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for byte in bytes {
        out.extend_from_slice(format!("{byte:02X}").as_bytes());
    }
    out.push(b'>');
}

/// Format a real without exponent notation.
///
/// `Display` for `f64` gives the shortest text that reads back as the same
/// value and never uses an exponent.
fn format_real(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}
