//! The PDF object model.
//!
//! Values are plain owned trees. Indirect objects are addressed by
//! [`ObjectId`] and linked through [`PdfValue::Reference`]; the graph they
//! form is never represented with native back-pointers.

use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an indirect object: object number and generation.
///
/// Unique only within the numbering space of the document that defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Object number.
    pub number: u32,
    /// Generation number.
    pub generation: u16,
}

impl ObjectId {
    /// Create a new object id.
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}

/// How a string was spelled in the source, kept so it can be written back
/// the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(...)`
    #[default]
    Literal,
    /// `<...>`
    Hexadecimal,
}

/// A PDF dictionary. Keys are name bytes without the leading slash.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary(BTreeMap<Vec<u8>, PdfValue>);

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&PdfValue> {
        self.0.get(key)
    }

    /// Insert or replace a key.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<PdfValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<PdfValue> {
        self.0.remove(key)
    }

    /// Whether the key is present.
    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &PdfValue)> {
        self.0.iter()
    }

    /// Iterate values mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut PdfValue> {
        self.0.values_mut()
    }

    /// Iterate entries mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut PdfValue)> {
        self.0.iter_mut()
    }

    /// The `/Type` name, if present.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.get(b"Type").and_then(PdfValue::as_name)
    }

    /// Whether `/Type` equals `name`.
    pub fn has_type(&self, name: &[u8]) -> bool {
        self.type_name() == Some(name)
    }
}

impl FromIterator<(Vec<u8>, PdfValue)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, PdfValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream: dictionary plus the raw payload exactly as stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary.
    pub dict: Dictionary,
    /// Raw, possibly filter-encoded bytes.
    pub content: Vec<u8>,
}

impl Stream {
    /// Create a stream. `/Length` is not touched; the writer sets it.
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        Self { dict, content }
    }
}

/// A PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer number.
    Integer(i64),
    /// Real number.
    Real(f64),
    /// String bytes and their source spelling.
    String(Vec<u8>, StringFormat),
    /// Name bytes without the leading slash, `#xx` escapes decoded.
    Name(Vec<u8>),
    /// Ordered array.
    Array(Vec<PdfValue>),
    /// Dictionary.
    Dictionary(Dictionary),
    /// Indirect reference.
    Reference(ObjectId),
    /// Stream.
    Stream(Stream),
}

impl PdfValue {
    /// Build a name value.
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Self::Name(name.into())
    }

    /// Build a literal string value.
    pub fn string_literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self::String(bytes.into(), StringFormat::Literal)
    }

    /// Short type label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::String(..) => "string",
            Self::Name(_) => "name",
            Self::Array(_) => "array",
            Self::Dictionary(_) => "dictionary",
            Self::Reference(_) => "reference",
            Self::Stream(_) => "stream",
        }
    }

    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The numeric value of an integer or real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// The name bytes, if this is a name.
    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The string bytes, if this is a string.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Self::String(bytes, _) => Some(bytes),
            _ => None,
        }
    }

    /// The items, if this is an array.
    pub fn as_array(&self) -> Option<&[PdfValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The target, if this is an indirect reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// The stream, if this is a stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The dictionary of a dictionary value, or of a stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Mutable counterpart of [`PdfValue::as_dict`].
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    /// Every object id referenced anywhere inside this value.
    ///
    /// Walks with an explicit stack; the order is deterministic (document
    /// order for arrays, key order for dictionaries).
    pub fn references(&self) -> Vec<ObjectId> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                Self::Reference(id) => found.push(*id),
                Self::Array(items) => stack.extend(items.iter().rev()),
                Self::Dictionary(dict) => stack.extend(dict.0.values().rev()),
                Self::Stream(stream) => stack.extend(stream.dict.0.values().rev()),
                _ => {}
            }
        }
        found
    }

    /// Replace every reference inside this value in place.
    pub fn rewrite_references<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(ObjectId) -> PdfValue,
    {
        let mut stack: Vec<&mut PdfValue> = vec![self];
        while let Some(value) = stack.pop() {
            if let Self::Reference(id) = value {
                let id = *id;
                *value = rewrite(id);
                continue;
            }
            match value {
                Self::Array(items) => stack.extend(items.iter_mut()),
                Self::Dictionary(dict) => stack.extend(dict.values_mut()),
                Self::Stream(stream) => stack.extend(stream.dict.values_mut()),
                _ => {}
            }
        }
    }
}

impl From<bool> for PdfValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PdfValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PdfValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<ObjectId> for PdfValue {
    fn from(id: ObjectId) -> Self {
        Self::Reference(id)
    }
}

impl From<Dictionary> for PdfValue {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

impl From<Vec<PdfValue>> for PdfValue {
    fn from(items: Vec<PdfValue>) -> Self {
        Self::Array(items)
    }
}

impl From<Stream> for PdfValue {
    fn from(stream: Stream) -> Self {
        Self::Stream(stream)
    }
}

/// An indirect object as defined by one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Id in the defining document.
    pub id: ObjectId,
    /// The object itself.
    pub value: PdfValue,
}
