//! Cross-reference resolution.
//!
//! Reads the chain of cross-reference sections starting at `startxref`:
//!
//! - classic `xref` tables followed by a `trailer` dictionary
//! - cross-reference streams (`/Type /XRef`, PDF 1.5+)
//! - hybrid files, where a classic section points at an `/XRefStm`
//!
//! Sections are visited newest first, following `/Prev`. For any object
//! number the first entry seen wins, so updates shadow what they replace.
//! When the chain is unusable, [`XRefTable::recover`] rebuilds a table by
//! scanning the file for `N G obj` headers.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use super::filters::decode_stream;
use super::lexer::{is_whitespace, Lexer, Token};
use super::object_stream::ObjectStream;
use super::objects::{LengthResolver, ObjectParser};
use crate::config::Limits;
use crate::error::{PdfJoinError, Result};
use crate::object::{Dictionary, ObjectId, PdfValue, Stream};

/// How far from the end of the file `startxref` may appear.
const STARTXREF_WINDOW: usize = 1024;

/// Trailer keys that describe a section rather than the document.
const SECTION_KEYS: &[&[u8]] = &[
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Length",
    b"Filter",
    b"DecodeParms",
];

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (or deleted) object.
    Free,
    /// Object stored uncompressed at a byte offset.
    Offset { offset: usize, generation: u16 },
    /// Object stored inside an object stream.
    Compressed { stream: u32, index: u32 },
}

/// Where an object lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Byte offset of the `N G obj` header.
    Offset(usize),
    /// Object stream number and index within it.
    Compressed { stream: u32, index: u32 },
}

/// The merged cross-reference table of a document.
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    sections: usize,
    recovered: bool,
}

/// A single parsed section before merging.
struct Section {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl XRefTable {
    /// Read the xref chain starting at the file's `startxref`.
    ///
    /// # Errors
    ///
    /// Returns `MissingXRef` when `startxref` is absent or points nowhere
    /// useful, and `MalformedSyntax` / `MalformedObject` when a section
    /// cannot be parsed.
    pub fn load(data: &[u8], limits: &Limits) -> Result<Self> {
        let start = find_startxref(data)?;
        let mut table = Self::default();
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next.take() {
            if !visited.insert(offset) {
                warn!(offset, "cyclic /Prev chain in cross-reference data");
                break;
            }

            let mut section = parse_section(data, offset, limits)?;

            if let Some(stm_offset) = section_offset(&section.trailer, b"XRefStm") {
                if visited.insert(stm_offset) {
                    let hybrid = parse_xref_stream(data, stm_offset, limits)?;
                    for (number, entry) in hybrid.entries {
                        let slot = section.entries.entry(number).or_insert(XRefEntry::Free);
                        if *slot == XRefEntry::Free {
                            *slot = entry;
                        }
                    }
                }
            }

            next = section_offset(&section.trailer, b"Prev");
            table.absorb(section);
        }

        debug!(
            sections = table.sections,
            entries = table.entries.len(),
            "cross-reference table loaded"
        );
        Ok(table)
    }

    /// Rebuild a table by scanning the whole file for object headers.
    ///
    /// Later definitions of an object override earlier ones. The trailer is
    /// taken from the last `trailer` dictionary, else from the last xref
    /// stream that names a `/Root`, else synthesized from the first catalog
    /// found.
    pub fn recover(data: &[u8], limits: &Limits) -> Result<Self> {
        warn!("rebuilding cross-reference table by scanning the file");
        let max_depth = limits.max_nesting_depth;

        let mut table = Self {
            recovered: true,
            sections: 1,
            ..Self::default()
        };
        let mut headers = Vec::new();
        for (offset, id) in scan_object_headers(data) {
            table.entries.insert(
                id.number,
                XRefEntry::Offset {
                    offset,
                    generation: id.generation,
                },
            );
            headers.push((offset, id));
        }

        let resolve_length: LengthResolver<'_> = &|id: ObjectId| table.direct_integer(data, id, max_depth);
        let mut xref_stream_trailer = None;
        let mut first_catalog = None;
        let mut compressed = Vec::new();

        for (offset, id) in &headers {
            let parsed = ObjectParser::at(data, *offset, max_depth)
                .parse_indirect_object(Some(*id), Some(resolve_length));
            let Ok(object) = parsed else {
                continue;
            };
            match &object.value {
                PdfValue::Stream(stream) if stream.dict.has_type(b"XRef") => {
                    if stream.dict.has(b"Root") {
                        xref_stream_trailer = Some(stream.dict.clone());
                    }
                }
                PdfValue::Stream(stream) if stream.dict.has_type(b"ObjStm") => {
                    if let Ok(objstm) = ObjectStream::parse(stream, limits) {
                        for (index, number) in objstm.object_numbers().enumerate() {
                            compressed.push((number, id.number, index as u32));
                        }
                    }
                }
                PdfValue::Dictionary(dict) if dict.has_type(b"Catalog") => {
                    first_catalog.get_or_insert(*id);
                }
                _ => {}
            }
        }

        for (number, stream, index) in compressed {
            table
                .entries
                .entry(number)
                .or_insert(XRefEntry::Compressed { stream, index });
        }

        let trailer = last_trailer_dictionary(data, max_depth)
            .filter(|dict| dict.has(b"Root"))
            .or(xref_stream_trailer)
            .or_else(|| {
                first_catalog.map(|root| {
                    let mut dict = Dictionary::new();
                    dict.set("Root", root);
                    dict
                })
            })
            .ok_or_else(|| PdfJoinError::missing_xref("recovery scan found no document catalog"))?;

        for (key, value) in trailer.iter() {
            if !SECTION_KEYS.contains(&key.as_slice()) {
                table.trailer.set(key.clone(), value.clone());
            }
        }
        let size = table.entries.keys().next_back().map_or(1, |n| i64::from(*n) + 1);
        table.trailer.set("Size", size);

        debug!(objects = table.entries.len(), "recovery scan complete");
        Ok(table)
    }

    fn absorb(&mut self, section: Section) {
        for (number, entry) in section.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in section.trailer.iter() {
            if !SECTION_KEYS.contains(&key.as_slice()) && !self.trailer.has(key) {
                self.trailer.set(key.clone(), value.clone());
            }
        }
        self.sections += 1;
    }

    /// Parse an uncompressed object and return it if it is an integer.
    fn direct_integer(&self, data: &[u8], id: ObjectId, max_depth: usize) -> Option<i64> {
        let Some(Location::Offset(offset)) = self.resolve(id) else {
            return None;
        };
        ObjectParser::at(data, offset, max_depth)
            .parse_indirect_object(Some(id), None)
            .ok()
            .and_then(|object| object.value.as_i64())
    }

    /// Locate an object. Free entries and generation mismatches yield `None`.
    pub fn resolve(&self, id: ObjectId) -> Option<Location> {
        match self.entries.get(&id.number)? {
            XRefEntry::Free => None,
            XRefEntry::Offset { offset, generation } => {
                (*generation == id.generation).then_some(Location::Offset(*offset))
            }
            XRefEntry::Compressed { stream, index } => {
                (id.generation == 0).then_some(Location::Compressed {
                    stream: *stream,
                    index: *index,
                })
            }
        }
    }

    /// Raw entry for an object number.
    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    /// Ids of every in-use object, ascending.
    pub fn in_use(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries
            .iter()
            .filter_map(|(number, entry)| match entry {
                XRefEntry::Free => None,
                XRefEntry::Offset { generation, .. } => Some(ObjectId::new(*number, *generation)),
                XRefEntry::Compressed { .. } => Some(ObjectId::new(*number, 0)),
            })
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sections read (1 after recovery).
    pub fn sections(&self) -> usize {
        self.sections
    }

    /// Whether this table came from the recovery scan.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }
}

/// Locate the offset named by the final `startxref`.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(STARTXREF_WINDOW);
    let window = &data[window_start..];
    let position = window
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| PdfJoinError::missing_xref("no startxref in the last 1024 bytes"))?;

    let mut lexer = Lexer::at(data, window_start + position);
    lexer.next_token()?;
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 => usize::try_from(offset)
            .map_err(|_| PdfJoinError::missing_xref(format!("startxref offset {offset} is out of range"))),
        other => Err(PdfJoinError::missing_xref(format!(
            "startxref is followed by {other:?} instead of an offset"
        ))),
    }
}

fn section_offset(trailer: &Dictionary, key: &[u8]) -> Option<usize> {
    trailer
        .get(key)
        .and_then(PdfValue::as_i64)
        .and_then(|offset| usize::try_from(offset).ok())
}

fn parse_section(data: &[u8], offset: usize, limits: &Limits) -> Result<Section> {
    if offset >= data.len() {
        return Err(PdfJoinError::missing_xref(format!(
            "cross-reference offset {offset} is past the end of the file"
        )));
    }
    let mut lexer = Lexer::at(data, offset);
    match lexer.next_token()? {
        Token::XRef => parse_classic(data, lexer.position(), limits.max_nesting_depth),
        Token::Integer(_) => parse_xref_stream(data, offset, limits),
        other => Err(PdfJoinError::missing_xref(format!(
            "expected 'xref' or an xref stream at offset {offset}, found {other:?}"
        ))),
    }
}

fn parse_classic(data: &[u8], offset: usize, max_depth: usize) -> Result<Section> {
    let mut parser = ObjectParser::at(data, offset, max_depth);
    let mut entries = BTreeMap::new();

    loop {
        let subsection_start = parser.position();
        match parser.lexer().next_token()? {
            Token::Trailer => break,
            Token::Integer(first) => {
                let count = match parser.lexer().next_token()? {
                    Token::Integer(count) if count >= 0 => count,
                    other => {
                        return Err(PdfJoinError::malformed_object(
                            subsection_start,
                            format!("bad xref subsection count {other:?}"),
                        ));
                    }
                };
                let first = u32::try_from(first).map_err(|_| {
                    PdfJoinError::malformed_object(subsection_start, "negative xref subsection start")
                })?;
                for i in 0..count {
                    let number = first.checked_add(i as u32).ok_or_else(|| {
                        PdfJoinError::malformed_object(subsection_start, "xref subsection overflows")
                    })?;
                    let entry = parse_classic_entry(parser.lexer())?;
                    entries.insert(number, entry);
                }
            }
            other => {
                return Err(PdfJoinError::malformed_object(
                    subsection_start,
                    format!("unexpected {other:?} in xref table"),
                ));
            }
        }
    }

    let trailer_start = parser.position();
    match parser.parse_object(None)? {
        PdfValue::Dictionary(trailer) => Ok(Section { entries, trailer }),
        other => Err(PdfJoinError::malformed_object(
            trailer_start,
            format!("trailer is a {}", other.kind()),
        )),
    }
}

fn parse_classic_entry(lexer: &mut Lexer<'_>) -> Result<XRefEntry> {
    let start = lexer.position();
    let offset = lexer.next_token()?;
    let generation = lexer.next_token()?;
    let kind = lexer.next_token()?;
    match (offset, generation, kind) {
        (Token::Integer(offset), Token::Integer(generation), Token::Keyword(kind)) => {
            let generation = u16::try_from(generation).unwrap_or(u16::MAX);
            match kind.as_slice() {
                b"f" => Ok(XRefEntry::Free),
                b"n" => match usize::try_from(offset) {
                    Ok(offset) if offset > 0 => Ok(XRefEntry::Offset { offset, generation }),
                    _ => Ok(XRefEntry::Free),
                },
                _ => Err(PdfJoinError::malformed_object(
                    start,
                    "xref entry type must be 'n' or 'f'",
                )),
            }
        }
        _ => Err(PdfJoinError::malformed_object(start, "malformed xref entry")),
    }
}

fn parse_xref_stream(data: &[u8], offset: usize, limits: &Limits) -> Result<Section> {
    let object = ObjectParser::at(data, offset, limits.max_nesting_depth)
        .parse_indirect_object(None, None)?;
    let PdfValue::Stream(stream) = object.value else {
        return Err(PdfJoinError::missing_xref(format!(
            "object at offset {offset} is not a cross-reference stream"
        )));
    };
    if !stream.dict.has_type(b"XRef") {
        return Err(PdfJoinError::missing_xref(format!(
            "stream at offset {offset} is not /Type /XRef"
        )));
    }
    let entries = decode_xref_stream(&stream, offset, limits.max_decoded_bytes)?;
    Ok(Section {
        entries,
        trailer: stream.dict,
    })
}

fn decode_xref_stream(
    stream: &Stream,
    offset: usize,
    max_decoded: u64,
) -> Result<BTreeMap<u32, XRefEntry>> {
    let dict = &stream.dict;
    let widths: Vec<usize> = dict
        .get(b"W")
        .and_then(PdfValue::as_array)
        .ok_or_else(|| PdfJoinError::malformed_object(offset, "xref stream without /W"))?
        .iter()
        .map(|w| {
            w.as_i64()
                .and_then(|w| usize::try_from(w).ok())
                .filter(|w| *w <= 8)
                .ok_or_else(|| PdfJoinError::malformed_object(offset, "invalid /W entry"))
        })
        .collect::<Result<_>>()?;
    let [w_type, w_field2, w_field3] = widths[..] else {
        return Err(PdfJoinError::malformed_object(
            offset,
            "/W must have three entries",
        ));
    };
    let entry_len = w_type + w_field2 + w_field3;
    if entry_len == 0 {
        return Err(PdfJoinError::malformed_object(offset, "/W entries are all zero"));
    }

    let size = dict.get(b"Size").and_then(PdfValue::as_i64).unwrap_or(0);
    let index: Vec<i64> = match dict.get(b"Index").and_then(PdfValue::as_array) {
        Some(items) => items.iter().filter_map(PdfValue::as_i64).collect(),
        None => vec![0, size],
    };
    if index.len() % 2 != 0 {
        return Err(PdfJoinError::malformed_object(offset, "/Index has an odd length"));
    }

    let decoded = decode_stream(stream, max_decoded)?;
    let mut rows = decoded.chunks_exact(entry_len);
    let mut entries = BTreeMap::new();

    for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0], pair[1]);
        let (Ok(first), Ok(count)) = (u32::try_from(first), u32::try_from(count)) else {
            return Err(PdfJoinError::malformed_object(offset, "invalid /Index range"));
        };
        for i in 0..count {
            let Some(row) = rows.next() else {
                warn!(offset, "xref stream data ends before its /Index ranges");
                return Ok(entries);
            };
            let kind = if w_type == 0 { 1 } else { read_field(&row[..w_type]) };
            let field2 = read_field(&row[w_type..w_type + w_field2]);
            let field3 = read_field(&row[w_type + w_field2..]);
            let Some(number) = first.checked_add(i) else {
                break;
            };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => match usize::try_from(field2) {
                    Ok(offset) => XRefEntry::Offset {
                        offset,
                        generation: u16::try_from(field3).unwrap_or(u16::MAX),
                    },
                    Err(_) => XRefEntry::Free,
                },
                2 => XRefEntry::Compressed {
                    stream: u32::try_from(field2).unwrap_or(u32::MAX),
                    index: u32::try_from(field3).unwrap_or(u32::MAX),
                },
                // Unknown types are references to the null object.
                _ => XRefEntry::Free,
            };
            entries.insert(number, entry);
        }
    }

    Ok(entries)
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Find every `N G obj` header in the file, in file order.
fn scan_object_headers(data: &[u8]) -> Vec<(usize, ObjectId)> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let at_boundary = i == 0 || !data[i - 1].is_ascii_alphanumeric();
        if at_boundary && data[i].is_ascii_digit() {
            if let Some((id, end)) = match_object_header(data, i) {
                found.push((i, id));
                i = end;
                continue;
            }
        }
        i += 1;
    }
    found
}

fn match_object_header(data: &[u8], start: usize) -> Option<(ObjectId, usize)> {
    let digits = |from: usize| {
        let len = data[from..].iter().take_while(|b| b.is_ascii_digit()).count();
        (len > 0 && len <= 10).then_some(from + len)
    };
    let spaces = |from: usize| from + data[from..].iter().take_while(|b| is_whitespace(**b)).count();

    let number_end = digits(start)?;
    let gen_start = spaces(number_end);
    if gen_start == number_end {
        return None;
    }
    let gen_end = digits(gen_start)?;
    let kw_start = spaces(gen_end);
    if kw_start == gen_end || !data[kw_start..].starts_with(b"obj") {
        return None;
    }
    let end = kw_start + 3;
    if data.get(end).is_some_and(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    let number = std::str::from_utf8(&data[start..number_end]).ok()?.parse().ok()?;
    let generation = std::str::from_utf8(&data[gen_start..gen_end]).ok()?.parse().ok()?;
    Some((ObjectId::new(number, generation), end))
}

fn last_trailer_dictionary(data: &[u8], max_depth: usize) -> Option<Dictionary> {
    let position = data.windows(b"trailer".len()).rposition(|w| w == b"trailer")?;
    let mut parser = ObjectParser::at(data, position + b"trailer".len(), max_depth);
    match parser.parse_object(None) {
        Ok(PdfValue::Dictionary(dict)) => Some(dict),
        _ => None,
    }
}
