//! Bookmark (outline) management for merged documents.
//!
//! The outline is flat: one entry per input document, pointing at that
//! document's first page.

use crate::error::{PdfJoinError, Result};
use crate::merge::graph::MergedGraph;
use crate::merge::metadata::pdf_text_string;
use crate::object::{Dictionary, ObjectId, PdfValue};

/// Manager for PDF bookmarks (outlines).
#[derive(Debug, Clone, Default)]
pub struct BookmarkManager;

impl BookmarkManager {
    /// Create a new bookmark manager.
    pub fn new() -> Self {
        Self
    }

    /// Add an outline with one entry per `(title, page)` item.
    ///
    /// Outline objects are numbered after the current largest object. The
    /// catalog gains `/Outlines` and `/PageMode /UseOutlines`. Does nothing
    /// when `items` is empty.
    ///
    /// Returns the number of entries added.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has no catalog dictionary.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfjoin::merge::bookmarks::BookmarkManager;
    /// # use pdfjoin::merge::MergedGraph;
    /// # fn example(graph: &mut MergedGraph) -> Result<(), Box<dyn std::error::Error>> {
    /// let manager = BookmarkManager::new();
    /// let first_page = graph.pages[0];
    /// manager.add_outline(graph, &[("Chapter 1".to_string(), first_page)])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_outline(
        &self,
        graph: &mut MergedGraph,
        items: &[(String, ObjectId)],
    ) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        if graph.get(graph.root).and_then(PdfValue::as_dict).is_none() {
            return Err(PdfJoinError::other("merged graph has no catalog dictionary"));
        }

        let first = graph.max_number() + 1;
        let outline_id = ObjectId::new(first, 0);
        let item_ids: Vec<ObjectId> = (0..items.len() as u32)
            .map(|offset| ObjectId::new(first + 1 + offset, 0))
            .collect();

        for (i, ((title, page_id), item_id)) in items.iter().zip(&item_ids).enumerate() {
            // [page /XYZ null null null]: keep the current zoom and position
            let dest = vec![
                PdfValue::Reference(*page_id),
                PdfValue::name("XYZ"),
                PdfValue::Null,
                PdfValue::Null,
                PdfValue::Null,
            ];

            let mut item = Dictionary::new();
            item.set("Title", pdf_text_string(title));
            item.set("Parent", outline_id);
            item.set("Dest", dest);
            if i > 0 {
                item.set("Prev", item_ids[i - 1]);
            }
            if let Some(next) = item_ids.get(i + 1) {
                item.set("Next", *next);
            }
            graph.objects.insert(*item_id, item.into());
        }

        let mut outline = Dictionary::new();
        outline.set("Type", PdfValue::name("Outlines"));
        outline.set("Count", item_ids.len() as i64);
        if let (Some(head), Some(tail)) = (item_ids.first(), item_ids.last()) {
            outline.set("First", *head);
            outline.set("Last", *tail);
        }
        graph.objects.insert(outline_id, outline.into());

        if let Some(catalog) = graph
            .objects
            .get_mut(&graph.root)
            .and_then(PdfValue::as_dict_mut)
        {
            catalog.set("Outlines", outline_id);
            catalog.set("PageMode", PdfValue::name("UseOutlines"));
        }

        Ok(item_ids.len())
    }

    /// Check if a merged graph has bookmarks.
    pub fn has_bookmarks(&self, graph: &MergedGraph) -> bool {
        graph
            .get(graph.root)
            .and_then(PdfValue::as_dict)
            .is_some_and(|catalog| catalog.has(b"Outlines"))
    }
}
