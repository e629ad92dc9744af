//! Shared fixtures for the integration tests.
//!
//! Fixtures are synthesized instead of checked in, so every offset in a
//! cross-reference table is exact by construction.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdfjoin::{Document, PdfValue};
use tempfile::TempDir;

const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Builds a PDF file object by object.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: String,
    objects: Vec<(u32, Vec<u8>)>,
    trailer: String,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.4".to_string(),
            objects: Vec::new(),
            trailer: String::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Add object `number` (generation 0) with the given body.
    pub fn object(mut self, number: u32, body: &str) -> Self {
        self.objects.push((number, body.as_bytes().to_vec()));
        self
    }

    /// Add a stream object. `entries` are extra dictionary entries;
    /// `/Length` is filled in.
    pub fn stream(mut self, number: u32, entries: &str, content: &[u8]) -> Self {
        let mut body = format!("<< {entries} /Length {} >>\nstream\n", content.len()).into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((number, body));
        self
    }

    /// Add a raw entry to the trailer dictionary, e.g. `/Info 9 0 R`.
    pub fn trailer_entry(mut self, entry: &str) -> Self {
        self.trailer.push(' ');
        self.trailer.push_str(entry);
        self
    }

    fn max_number(&self) -> u32 {
        self.objects.iter().map(|(n, _)| *n).max().unwrap_or(0)
    }

    fn header(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();
        out.extend_from_slice(BINARY_MARKER);
        out
    }

    fn write_objects(&self, out: &mut Vec<u8>, skip: &[u32]) -> BTreeMap<u32, usize> {
        let mut offsets = BTreeMap::new();
        for (number, body) in &self.objects {
            if skip.contains(number) {
                continue;
            }
            offsets.insert(*number, out.len());
            out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }

    /// Serialize with a classic cross-reference table.
    pub fn classic(&self, root: u32) -> Vec<u8> {
        let mut out = self.header();
        let offsets = self.write_objects(&mut out, &[]);
        let size = self.max_number() + 1;

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        for number in 0..size {
            let line = match offsets.get(&number) {
                Some(offset) => format!("{offset:010} 00000 n \n"),
                None if number == 0 => "0000000000 65535 f \n".to_string(),
                None => "0000000000 00000 f \n".to_string(),
            };
            out.extend_from_slice(line.as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root {root} 0 R{} >>\nstartxref\n{xref}\n%%EOF\n",
                self.trailer
            )
            .as_bytes(),
        );
        out
    }

    /// Write the `packed` objects as one compressed object stream numbered
    /// `objstm` and return its offset.
    fn write_object_stream(&self, out: &mut Vec<u8>, objstm: u32, packed: &[u32]) -> usize {
        let mut index = String::new();
        let mut bodies = Vec::new();
        for number in packed {
            let (_, body) = self
                .objects
                .iter()
                .find(|(n, _)| n == number)
                .expect("packed object exists");
            index.push_str(&format!("{number} {} ", bodies.len()));
            bodies.extend_from_slice(body);
            bodies.push(b'\n');
        }
        let first = index.len();
        let mut data = index.into_bytes();
        data.extend_from_slice(&bodies);
        let data = deflate(&data);

        let offset = out.len();
        out.extend_from_slice(
            format!(
                "{objstm} 0 obj\n<< /Type /ObjStm /N {} /First {first} /Filter /FlateDecode /Length {} >>\nstream\n",
                packed.len(),
                data.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        offset
    }

    /// Serialize with a cross-reference stream, packing the `packed`
    /// objects into one compressed object stream.
    pub fn compressed(&self, root: u32, packed: &[u32]) -> Vec<u8> {
        let mut out = self.header();
        let offsets = self.write_objects(&mut out, packed);
        let objstm = self.max_number() + 1;
        let xref_number = objstm + 1;
        let objstm_offset = self.write_object_stream(&mut out, objstm, packed);

        let size = xref_number + 1;
        let xref_offset = out.len();
        let mut rows = Vec::new();
        for number in 0..size {
            let (kind, field2, field3): (u8, u32, u16) = if number == xref_number {
                (1, xref_offset as u32, 0)
            } else if number == objstm {
                (1, objstm_offset as u32, 0)
            } else if let Some(i) = packed.iter().position(|p| *p == number) {
                (2, objstm, i as u16)
            } else if let Some(offset) = offsets.get(&number) {
                (1, *offset as u32, 0)
            } else if number == 0 {
                (0, 0, 65535)
            } else {
                (0, 0, 0)
            };
            rows.push(kind);
            rows.extend_from_slice(&field2.to_be_bytes());
            rows.extend_from_slice(&field3.to_be_bytes());
        }
        out.extend_from_slice(
            format!(
                "{xref_number} 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Root {root} 0 R{} /Length {} >>\nstream\n",
                self.trailer,
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
        out
    }

    /// Serialize a hybrid file: a classic table for the plain objects and
    /// an `/XRefStm` stream for the `packed` ones.
    ///
    /// The stream also lists every plain object at offset 0. Readers must
    /// ignore those rows because the classic entries are in use.
    pub fn hybrid(&self, root: u32, packed: &[u32]) -> Vec<u8> {
        let mut out = self.header();
        let offsets = self.write_objects(&mut out, packed);
        let objstm = self.max_number() + 1;
        let xref_stm = objstm + 1;
        let size = xref_stm + 1;
        let objstm_offset = self.write_object_stream(&mut out, objstm, packed);

        let mut rows = Vec::new();
        for number in 0..size {
            let (kind, field2, field3): (u8, u32, u16) =
                if let Some(i) = packed.iter().position(|p| *p == number) {
                    (2, objstm, i as u16)
                } else if offsets.contains_key(&number) {
                    (1, 0, 0)
                } else {
                    (0, 0, 0)
                };
            rows.push(kind);
            rows.extend_from_slice(&field2.to_be_bytes());
            rows.extend_from_slice(&field3.to_be_bytes());
        }
        let stm_offset = out.len();
        out.extend_from_slice(
            format!(
                "{xref_stm} 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        for number in 0..size {
            let offset = if number == objstm {
                Some(objstm_offset)
            } else if number == xref_stm {
                Some(stm_offset)
            } else {
                offsets.get(&number).copied()
            };
            let line = match offset {
                Some(offset) => format!("{offset:010} 00000 n \n"),
                None if number == 0 => "0000000000 65535 f \n".to_string(),
                None => "0000000000 00000 f \n".to_string(),
            };
            out.extend_from_slice(line.as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {size} /Root {root} 0 R /XRefStm {stm_offset}{} >>\nstartxref\n{xref}\n%%EOF\n",
                self.trailer
            )
            .as_bytes(),
        );
        out
    }
}

/// Append an incremental update that redefines or adds `objects`.
pub fn append_update(mut base: Vec<u8>, root: u32, size: u32, objects: &[(u32, &str)]) -> Vec<u8> {
    let prev = last_startxref(&base);
    let mut offsets = Vec::new();
    for (number, body) in objects {
        offsets.push((*number, base.len()));
        base.extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let xref = base.len();
    base.extend_from_slice(b"xref\n");
    for (number, offset) in offsets {
        base.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    base.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Root {root} 0 R /Prev {prev} >>\nstartxref\n{xref}\n%%EOF\n"
        )
        .as_bytes(),
    );
    base
}

fn last_startxref(data: &[u8]) -> usize {
    let position = data
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .expect("startxref present");
    let digits: String = data[position + b"startxref".len()..]
        .iter()
        .map(|b| char::from(*b))
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().expect("startxref offset")
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate");
    encoder.finish().expect("deflate")
}

/// Content stream that draws `text`.
pub fn content_for(text: &str) -> Vec<u8> {
    format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET").into_bytes()
}

/// A document with one page per text.
///
/// Objects: 1 catalog, 2 page tree (carries the inherited `/MediaBox` and
/// font resources), 3 font, then a page / content pair per text starting
/// at 4.
pub fn text_document(texts: &[&str]) -> PdfBuilder {
    let kids: Vec<String> = (0..texts.len()).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> >>",
                kids.join(" "),
                texts.len()
            ),
        )
        .object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    for (i, text) in texts.iter().enumerate() {
        let page = 4 + 2 * i as u32;
        let content = page + 1;
        builder = builder
            .object(
                page,
                &format!("<< /Type /Page /Parent 2 0 R /Contents {content} 0 R >>"),
            )
            .stream(content, "", &content_for(text));
    }
    builder
}

/// [`text_document`] serialized with a classic table.
pub fn text_pdf(texts: &[&str]) -> Vec<u8> {
    text_document(texts).classic(1)
}

/// A document whose page tree loops back on itself.
pub fn cyclic_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [2 0 R] /Count 1 >>")
        .classic(1)
}

/// A one-page document with an `/Encrypt` entry in its trailer.
pub fn encrypted_pdf() -> Vec<u8> {
    text_document(&["secret"])
        .object(9, "<< /Filter /Standard /V 1 /R 2 >>")
        .trailer_entry("/Encrypt 9 0 R")
        .classic(1)
}

/// Content bytes of each page, in page order.
pub fn page_contents(document: &Document) -> Vec<Vec<u8>> {
    document
        .pages()
        .iter()
        .map(|page| {
            let value = document.get(page.id).expect("page");
            let contents = value
                .as_dict()
                .and_then(|dict| dict.get(b"Contents"))
                .and_then(PdfValue::as_reference)
                .expect("page /Contents reference");
            let stream = document.get(contents).expect("content stream");
            stream.as_stream().expect("stream").content.clone()
        })
        .collect()
}

/// Write `bytes` to `name` inside `dir`.
pub fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

/// Create a temporary output path for test results.
pub fn temp_output_path() -> tempfile::TempPath {
    tempfile::NamedTempFile::new()
        .expect("Failed to create temp file")
        .into_temp_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_load() {
        let doc = pdfjoin::load_document(text_pdf(&["a", "b"])).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(page_contents(&doc), vec![content_for("a"), content_for("b")]);
    }

    #[test]
    fn test_last_startxref() {
        let bytes = text_pdf(&["a"]);
        let offset = last_startxref(&bytes);
        assert!(bytes[offset..].starts_with(b"xref"));
    }
}
