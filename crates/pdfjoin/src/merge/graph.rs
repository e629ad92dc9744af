//! The renumbering table and the merged object graph.

use std::collections::{BTreeMap, HashMap};

use crate::error::{PdfJoinError, Result};
use crate::object::{ObjectId, PdfValue};

/// Maps (source document index, original id) to the id in the merged
/// output.
///
/// Numbers are handed out from a running counter starting at 1, so the
/// mapping is injective and each document's objects form one contiguous
/// block in the order they were assigned.
#[derive(Debug, Clone)]
pub struct RenumberMap {
    map: HashMap<(usize, ObjectId), ObjectId>,
    order: Vec<(usize, ObjectId)>,
    next: u32,
}

impl RenumberMap {
    /// Create an empty map; the first id handed out is 1.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: Vec::new(),
            next: 1,
        }
    }

    /// Assign a new id to `(doc, id)` unless it already has one.
    ///
    /// Returns the new id and whether it was freshly assigned.
    pub fn assign(&mut self, doc: usize, id: ObjectId) -> (ObjectId, bool) {
        if let Some(existing) = self.map.get(&(doc, id)) {
            return (*existing, false);
        }
        let new_id = self.allocate();
        self.map.insert((doc, id), new_id);
        self.order.push((doc, id));
        (new_id, true)
    }

    /// Reserve an id that no source object maps to.
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next, 0);
        self.next += 1;
        id
    }

    /// The new id of `(doc, id)`, if it was retained.
    pub fn get(&self, doc: usize, id: ObjectId) -> Option<ObjectId> {
        self.map.get(&(doc, id)).copied()
    }

    /// Source objects in assignment order.
    pub fn assigned(&self) -> &[(usize, ObjectId)] {
        &self.order
    }

    /// Number of ids handed out so far, reserved ones included.
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }

    /// Number of source objects mapped.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no source object is mapped.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for RenumberMap {
    fn default() -> Self {
        Self::new()
    }
}

/// The merged document, ready for the writer.
#[derive(Debug, Clone)]
pub struct MergedGraph {
    /// Every object of the output, keyed by its new id.
    pub objects: BTreeMap<ObjectId, PdfValue>,
    /// The synthesized catalog.
    pub root: ObjectId,
    /// The synthesized root page tree node.
    pub pages_root: ObjectId,
    /// The document information dictionary.
    pub info: Option<ObjectId>,
    /// Pages of the output, in order.
    pub pages: Vec<ObjectId>,
    /// PDF version to declare in the header.
    pub version: (u8, u8),
}

impl MergedGraph {
    /// Look up an object by its output id.
    pub fn get(&self, id: ObjectId) -> Option<&PdfValue> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of top-level outline entries hanging off the catalog.
    pub fn outline_count(&self) -> usize {
        self.get(self.root)
            .and_then(PdfValue::as_dict)
            .and_then(|catalog| catalog.get(b"Outlines"))
            .and_then(PdfValue::as_reference)
            .and_then(|outlines| self.get(outlines))
            .and_then(PdfValue::as_dict)
            .and_then(|outlines| outlines.get(b"Count"))
            .and_then(PdfValue::as_i64)
            .map_or(0, |count| count.unsigned_abs() as usize)
    }

    /// Largest object number in the graph.
    pub fn max_number(&self) -> u32 {
        self.objects.keys().next_back().map_or(0, |id| id.number)
    }

    /// Confirm that every reference resolves to an object of the graph.
    ///
    /// # Errors
    ///
    /// `UnresolvedReference` naming the first dangling reference found.
    pub fn check_closure(&self) -> Result<()> {
        for (referrer, value) in &self.objects {
            if let Some(reference) = value
                .references()
                .into_iter()
                .find(|id| !self.objects.contains_key(id))
            {
                return Err(PdfJoinError::UnresolvedReference {
                    reference,
                    referrer: *referrer,
                });
            }
        }
        for id in [Some(self.root), Some(self.pages_root), self.info]
            .into_iter()
            .flatten()
        {
            if !self.objects.contains_key(&id) {
                return Err(PdfJoinError::UnresolvedReference {
                    reference: id,
                    referrer: ObjectId::new(0, 0),
                });
            }
        }
        Ok(())
    }
}
