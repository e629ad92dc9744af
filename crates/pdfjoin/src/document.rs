//! The per-input document model.
//!
//! A [`Document`] owns the bytes of one PDF file, its merged
//! cross-reference table and trailer, and the flattened page list. Objects
//! are parsed on first access and memoized in an explicit cache, so a
//! document is read-only from the outside and can be shared across threads.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::config::Limits;
use crate::error::{PdfJoinError, Result};
use crate::object::{Dictionary, IndirectObject, ObjectId, PdfValue};
use crate::parser::object_stream::ObjectStream;
use crate::parser::{find_header, LengthResolver, Location, ObjectParser, XRefTable};

/// Page attributes a page may inherit from its ancestors.
pub const INHERITABLE_ATTRIBUTES: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// How many indirect hops a stream `/Length` lookup may take.
const MAX_LENGTH_INDIRECTION: u8 = 4;

/// A leaf of the page tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    /// The page object.
    pub id: ObjectId,
    /// Inheritable attributes collected from ancestors, nearest first wins.
    /// Values are as found in the source (references are not resolved).
    pub inherited: Dictionary,
}

/// A loaded PDF document.
#[derive(Debug)]
pub struct Document {
    data: Vec<u8>,
    base: usize,
    version: (u8, u8),
    xref: XRefTable,
    catalog: ObjectId,
    pages: Vec<PageNode>,
    tree_nodes: HashSet<ObjectId>,
    limits: Limits,
    cache: Mutex<HashMap<ObjectId, Arc<PdfValue>>>,
    object_streams: Mutex<HashMap<u32, Arc<ObjectStream>>>,
}

impl Document {
    /// Load a document from bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidDocument` for empty input, a missing `%PDF-` header or a
    ///   missing catalog / page tree
    /// - `LimitExceeded` when the input or its object table is too large
    /// - `MissingXRef`, `MalformedSyntax`, `MalformedObject` when the
    ///   cross-reference data is unusable and recovery is disabled or fails
    /// - `EncryptedDocument` when the trailer has `/Encrypt`
    /// - `CyclicPageTree` when the page tree loops
    pub fn load(data: Vec<u8>, limits: &Limits) -> Result<Self> {
        if data.is_empty() {
            return Err(PdfJoinError::invalid_document("input is empty"));
        }
        let len = data.len() as u64;
        if len > limits.max_input_bytes {
            return Err(PdfJoinError::limit_exceeded(
                "max_input_bytes",
                len,
                limits.max_input_bytes,
            ));
        }
        let (base, version) = find_header(&data).ok_or_else(|| {
            PdfJoinError::invalid_document("no %PDF- header in the first 1024 bytes")
        })?;
        if base > 0 {
            debug!(base, "skipping bytes before the PDF header");
        }
        let version = parse_version(&version).unwrap_or((1, 4));
        let body = &data[base..];

        let xref = match XRefTable::load(body, limits) {
            Ok(xref) => xref,
            Err(err) if err.is_parse_error() && limits.allow_recovery_scan => {
                warn!(error = %err, "cross-reference data unusable");
                XRefTable::recover(body, limits)?
            }
            Err(err) => return Err(err),
        };

        match Self::open(data, base, version, xref, limits) {
            Ok(document) => Ok(document),
            Err((err, data)) => {
                if !(limits.allow_recovery_scan && recoverable_catalog_error(&err)) {
                    return Err(err);
                }
                warn!(error = %err, "catalog unusable through the cross-reference table");
                let xref = XRefTable::recover(&data[base..], limits)?;
                Self::open(data, base, version, xref, limits).map_err(|(err, _)| err)
            }
        }
    }

    /// Validate the trailer and catalog, then flatten the page tree.
    ///
    /// On failure the bytes are handed back so a recovered table can be
    /// tried without copying the input.
    fn open(
        data: Vec<u8>,
        base: usize,
        version: (u8, u8),
        xref: XRefTable,
        limits: &Limits,
    ) -> std::result::Result<Self, (PdfJoinError, Vec<u8>)> {
        if xref.trailer().has(b"Encrypt") {
            return Err((PdfJoinError::EncryptedDocument, data));
        }
        let entries = xref.len() as u64;
        if entries > limits.max_total_objects {
            return Err((
                PdfJoinError::limit_exceeded("max_total_objects", entries, limits.max_total_objects),
                data,
            ));
        }
        let catalog = match xref.trailer().get(b"Root").and_then(PdfValue::as_reference) {
            Some(catalog) => catalog,
            None => {
                return Err((
                    PdfJoinError::invalid_document("trailer has no /Root reference"),
                    data,
                ));
            }
        };

        let mut document = Self {
            data,
            base,
            version,
            xref,
            catalog,
            pages: Vec::new(),
            tree_nodes: HashSet::new(),
            limits: limits.clone(),
            cache: Mutex::new(HashMap::new()),
            object_streams: Mutex::new(HashMap::new()),
        };

        let tree = document
            .check_catalog()
            .and_then(|()| document.walk_page_tree());
        match tree {
            Ok((pages, tree_nodes)) => {
                document.pages = pages;
                document.tree_nodes = tree_nodes;
            }
            Err(err) => return Err((err, document.data)),
        }
        if let Some(declared) = document.catalog_version() {
            document.version = document.version.max(declared);
        }

        debug!(
            version = %document.version_string(),
            xref_sections = document.xref.sections(),
            objects = document.object_count(),
            pages = document.pages.len(),
            recovered = document.xref.is_recovered(),
            "document loaded"
        );
        Ok(document)
    }

    fn check_catalog(&self) -> Result<()> {
        let catalog = self.get(self.catalog)?;
        let dict = catalog.as_dict().ok_or_else(|| {
            PdfJoinError::invalid_document(format!("catalog {} is not a dictionary", self.catalog))
        })?;
        if !dict.has(b"Pages") {
            return Err(PdfJoinError::invalid_document("catalog has no /Pages"));
        }
        Ok(())
    }

    fn catalog_version(&self) -> Option<(u8, u8)> {
        let catalog = self.get(self.catalog).ok()?;
        let name = catalog.as_dict()?.get(b"Version")?.as_name()?;
        parse_version(std::str::from_utf8(name).ok()?)
    }

    fn body(&self) -> &[u8] {
        &self.data[self.base..]
    }

    /// Resolve an object, parsing it on first access.
    ///
    /// Objects absent from the cross-reference table resolve to `null`.
    pub fn get(&self, id: ObjectId) -> Result<Arc<PdfValue>> {
        self.fetch(id, 0)
    }

    /// Follow a value to a dictionary, resolving one level of indirection.
    pub fn get_dict(&self, value: &PdfValue) -> Result<Option<Arc<PdfValue>>> {
        let resolved = match value {
            PdfValue::Reference(id) => self.get(*id)?,
            other => Arc::new(other.clone()),
        };
        Ok(resolved.as_dict().is_some().then_some(resolved))
    }

    fn fetch(&self, id: ObjectId, depth: u8) -> Result<Arc<PdfValue>> {
        if let Some(value) = self.lock_cache().get(&id) {
            return Ok(Arc::clone(value));
        }

        // Parse without holding the lock; a concurrent parse of the same
        // object yields an equal value and the first insert wins.
        let value = Arc::new(self.parse_object(id, depth)?);
        Ok(Arc::clone(self.lock_cache().entry(id).or_insert(value)))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectId, Arc<PdfValue>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse_object(&self, id: ObjectId, depth: u8) -> Result<PdfValue> {
        match self.xref.resolve(id) {
            None => Ok(PdfValue::Null),
            Some(Location::Offset(offset)) => {
                let resolve_length: LengthResolver<'_> = &|length_id: ObjectId| self.length_value(length_id, depth);
                ObjectParser::at(self.body(), offset, self.limits.max_nesting_depth)
                    .parse_indirect_object(Some(id), Some(resolve_length))
                    .map(|object| object.value)
            }
            Some(Location::Compressed { stream, index }) => {
                let objstm = self.object_stream(stream, depth)?;
                Ok(objstm
                    .get(index as usize, id.number)?
                    .unwrap_or(PdfValue::Null))
            }
        }
    }

    fn length_value(&self, id: ObjectId, depth: u8) -> Option<i64> {
        if depth >= MAX_LENGTH_INDIRECTION {
            return None;
        }
        self.fetch(id, depth + 1).ok()?.as_i64()
    }

    fn object_stream(&self, number: u32, depth: u8) -> Result<Arc<ObjectStream>> {
        {
            let streams = self
                .object_streams
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(objstm) = streams.get(&number) {
                return Ok(Arc::clone(objstm));
            }
        }

        // Object streams may not live inside object streams; following such
        // an entry would recurse through the same stream forever.
        let id = ObjectId::new(number, 0);
        if !matches!(self.xref.resolve(id), Some(Location::Offset(_))) {
            return Err(PdfJoinError::malformed_object(
                0,
                format!("object stream {id} is not stored as an uncompressed object"),
            ));
        }
        let value = self.fetch(id, depth)?;
        let stream = value
            .as_stream()
            .filter(|stream| stream.dict.has_type(b"ObjStm"))
            .ok_or_else(|| {
                PdfJoinError::malformed_object(0, format!("object {id} is not an object stream"))
            })?;
        let objstm = Arc::new(ObjectStream::parse(stream, &self.limits)?);

        let mut streams = self
            .object_streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(streams.entry(number).or_insert(objstm)))
    }

    /// Walk the page tree depth-first, left to right.
    ///
    /// # Errors
    ///
    /// `CyclicPageTree` when any node is reached twice, `InvalidDocument`
    /// when the root is not an indirect page tree node.
    pub fn flatten_pages(&self) -> Result<Vec<PageNode>> {
        self.walk_page_tree().map(|(pages, _)| pages)
    }

    /// Flatten the page tree, also returning the internal nodes visited.
    fn walk_page_tree(&self) -> Result<(Vec<PageNode>, HashSet<ObjectId>)> {
        let catalog = self.get(self.catalog)?;
        let root = catalog
            .as_dict()
            .and_then(|dict| dict.get(b"Pages"))
            .and_then(PdfValue::as_reference)
            .ok_or_else(|| PdfJoinError::invalid_document("catalog /Pages is not a reference"))?;

        let mut pages = Vec::new();
        let mut nodes = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(root, Dictionary::new())];

        while let Some((id, inherited)) = stack.pop() {
            if !visited.insert(id) {
                return Err(PdfJoinError::CyclicPageTree { node: id });
            }
            let node = self.get(id)?;
            let Some(dict) = node.as_dict() else {
                if id == root {
                    return Err(PdfJoinError::invalid_document(format!(
                        "page tree root {id} is not a dictionary"
                    )));
                }
                warn!(node = %id, "skipping page tree node that is not a dictionary");
                continue;
            };

            let is_leaf = if dict.has_type(b"Pages") {
                false
            } else {
                dict.has_type(b"Page") || !dict.has(b"Kids")
            };
            if is_leaf {
                pages.push(PageNode { id, inherited });
                continue;
            }
            nodes.insert(id);

            let mut inherited = inherited;
            for key in INHERITABLE_ATTRIBUTES {
                if let Some(value) = dict.get(key) {
                    inherited.set(key.to_vec(), value.clone());
                }
            }

            let kids = match dict.get(b"Kids") {
                Some(PdfValue::Reference(kids_id)) => self.get(*kids_id)?,
                Some(kids) => Arc::new(kids.clone()),
                None => Arc::new(PdfValue::Array(Vec::new())),
            };
            let Some(kids) = kids.as_array() else {
                warn!(node = %id, "page tree /Kids is not an array");
                continue;
            };
            for kid in kids.iter().rev() {
                match kid.as_reference() {
                    Some(kid) => stack.push((kid, inherited.clone())),
                    None => warn!(node = %id, "skipping direct object in /Kids"),
                }
            }
        }

        Ok((pages, nodes))
    }

    /// Declared PDF version as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Declared PDF version as text, e.g. `1.7`.
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.version.0, self.version.1)
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// The catalog object id.
    pub fn catalog_id(&self) -> ObjectId {
        self.catalog
    }

    /// The resolved catalog.
    pub fn catalog(&self) -> Result<Arc<PdfValue>> {
        self.get(self.catalog)
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageNode] {
        &self.pages
    }

    /// Whether `id` is an internal node of the page tree.
    pub fn is_page_tree_node(&self, id: ObjectId) -> bool {
        self.tree_nodes.contains(&id)
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of in-use objects in the cross-reference table.
    pub fn object_count(&self) -> usize {
        self.xref.in_use().count()
    }

    /// The `/Info` reference from the trailer, if any.
    pub fn info_id(&self) -> Option<ObjectId> {
        self.trailer().get(b"Info").and_then(PdfValue::as_reference)
    }

    /// Every in-use object, resolved, in ascending id order.
    pub fn objects(&self) -> Result<Vec<IndirectObject>> {
        self.xref
            .in_use()
            .map(|id| {
                self.get(id).map(|value| IndirectObject {
                    id,
                    value: (*value).clone(),
                })
            })
            .collect()
    }

    /// Size of the input in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Whether the cross-reference table came from the recovery scan.
    pub fn is_recovered(&self) -> bool {
        self.xref.is_recovered()
    }

    /// Number of cross-reference sections read.
    pub fn xref_sections(&self) -> usize {
        self.xref.sections()
    }
}

fn recoverable_catalog_error(err: &PdfJoinError) -> bool {
    err.is_parse_error() || matches!(err, PdfJoinError::InvalidDocument { .. })
}

/// Parse `1.7` into `(1, 7)`.
pub fn parse_version(text: &str) -> Option<(u8, u8)> {
    let (major, minor) = text.split_once('.')?;
    let minor: String = minor.chars().take_while(char::is_ascii_digit).collect();
    Some((major.parse().ok()?, minor.parse().ok()?))
}
