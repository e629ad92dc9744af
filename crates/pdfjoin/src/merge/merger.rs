//! Core merge implementation.
//!
//! Merging is structural: each input contributes the objects reachable from
//! its pages, renumbered into one contiguous block, and the output gets a
//! fresh catalog and a flat page tree over all pages in input order.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::{Config, MergeOptions};
use crate::document::{Document, PageNode};
use crate::error::{PdfJoinError, Result};
use crate::io::{PdfReader, PdfWriter};
use crate::merge::bookmarks::BookmarkManager;
use crate::merge::graph::{MergedGraph, RenumberMap};
use crate::merge::metadata::MetadataManager;
use crate::object::{Dictionary, ObjectId, PdfValue};

/// Lowest version written to the output header.
const MIN_OUTPUT_VERSION: (u8, u8) = (1, 4);

/// Statistics about a merge operation.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Number of PDFs merged.
    pub files_merged: usize,

    /// Total number of pages in the merged document.
    pub total_pages: usize,

    /// Number of objects in the merged document.
    pub total_objects: usize,

    /// Total time taken, loading included.
    pub merge_time: Duration,

    /// Time taken to load all PDFs.
    pub load_time: Duration,

    /// Total size of input files.
    pub input_size: u64,

    /// Size of the serialized output.
    pub output_size: u64,

    /// Number of bookmarks added.
    pub bookmarks_added: usize,
}

impl MergeStatistics {
    /// Format input size as human-readable string.
    pub fn format_input_size(&self) -> String {
        format_file_size(self.input_size)
    }

    /// Format output size as human-readable string.
    pub fn format_output_size(&self) -> String {
        format_file_size(self.output_size)
    }
}

/// Result of a file-based merge.
#[derive(Debug)]
pub struct MergeResult {
    /// The serialized output document.
    pub bytes: Vec<u8>,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,

    /// Paths of files that were merged.
    pub merged_files: Vec<PathBuf>,
}

/// PDF merger that combines multiple documents.
#[derive(Debug, Default)]
pub struct Merger {
    bookmark_manager: BookmarkManager,
    metadata_manager: MetadataManager,
}

impl Merger {
    /// Create a new merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load, merge and serialize the inputs named by `config`.
    ///
    /// The input count is checked before any file is read. Nothing is
    /// written to disk; see [`PdfWriter::save`].
    ///
    /// # Errors
    ///
    /// Returns the first failing input's error (wrapped with its position
    /// and path), or any merge or write error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfjoin::merge::Merger;
    /// # use pdfjoin::config::Config;
    /// # async fn example(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    /// let merger = Merger::new();
    /// let result = merger.merge(&config).await?;
    /// println!("Merged {} files into {} pages",
    ///          result.statistics.files_merged,
    ///          result.statistics.total_pages);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn merge(&self, config: &Config) -> Result<MergeResult> {
        let merge_start = Instant::now();
        config.validate()?;

        let reader = PdfReader::new(config.limits.clone());
        let load_start = Instant::now();
        let (load_results, load_stats) = reader
            .load_all(&config.inputs, config.effective_jobs())
            .await;
        let load_time = load_start.elapsed();
        debug!(
            loaded = load_stats.success_count,
            failed = load_stats.failure_count,
            pages = load_stats.total_pages,
            "inputs loaded"
        );

        let loaded = load_results.into_iter().collect::<Result<Vec<_>>>()?;
        let documents: Vec<&Document> = loaded.iter().map(|pdf| &pdf.document).collect();

        let graph = self
            .merge_documents(&documents, &config.merge_options())
            .map_err(|err| match err.input_index().and_then(|index| loaded.get(index)) {
                Some(pdf) => err.with_path(&pdf.path),
                None => err,
            })?;
        let bytes = PdfWriter::new().write(&graph)?;

        let statistics = MergeStatistics {
            files_merged: loaded.len(),
            total_pages: graph.page_count(),
            total_objects: graph.object_count(),
            merge_time: merge_start.elapsed(),
            load_time,
            input_size: loaded.iter().map(|pdf| pdf.file_size).sum(),
            output_size: bytes.len() as u64,
            bookmarks_added: graph.outline_count(),
        };
        let merged_files = loaded.into_iter().map(|pdf| pdf.path).collect();

        Ok(MergeResult {
            bytes,
            statistics,
            merged_files,
        })
    }

    /// Merge loaded documents into one object graph.
    ///
    /// Pages keep their order: documents in slice order, pages in document
    /// order. Objects not reachable from any page are dropped.
    ///
    /// # Errors
    ///
    /// - `NotEnoughInputs` when fewer than `options.min_inputs` documents
    /// - `LimitExceeded` when the output would exceed `max_total_objects`
    /// - `Input` wrapping a parse error hit while reading an object
    /// - `UnresolvedReference` if the result is not closed
    pub fn merge_documents<D: Borrow<Document>>(
        &self,
        documents: &[D],
        options: &MergeOptions,
    ) -> Result<MergedGraph> {
        let required = options.min_inputs.max(1);
        if documents.len() < required {
            return Err(PdfJoinError::NotEnoughInputs {
                required,
                actual: documents.len(),
            });
        }
        let documents: Vec<&Document> = documents
            .iter()
            .map(|document| Borrow::<Document>::borrow(document))
            .collect();

        let mut map = RenumberMap::new();
        for (index, document) in documents.iter().enumerate() {
            let before = map.allocated();
            let missing = number_reachable(document, index, &mut map)
                .map_err(|err| err.for_input(index, None))?;
            debug!(
                input = index,
                first = before + 1,
                last = map.allocated(),
                pages = document.page_count(),
                missing,
                "numbered input objects"
            );
        }

        let outline_items = bookmark_items(&documents, options);
        let extra = 3 + if outline_items.is_empty() { 0 } else { outline_items.len() + 1 };
        let total = (map.len() + extra) as u64;
        if total > options.max_total_objects {
            return Err(PdfJoinError::limit_exceeded(
                "max_total_objects",
                total,
                options.max_total_objects,
            ));
        }

        let root = map.allocate();
        let pages_root = map.allocate();
        let info = map.allocate();
        let targets = Targets {
            root,
            pages_root,
            map: &map,
        };

        let page_nodes: Vec<HashMap<ObjectId, &PageNode>> = documents
            .iter()
            .map(|document| document.pages().iter().map(|page| (page.id, page)).collect())
            .collect();

        let mut objects = BTreeMap::new();
        for &(index, old) in map.assigned() {
            let document = documents[index];
            let page = page_nodes[index].get(&old).copied();
            let value = copy_object(document, index, old, page, &targets)
                .map_err(|err| err.for_input(index, None))?;
            if let Some(new) = map.get(index, old) {
                objects.insert(new, value);
            }
        }

        let mut pages = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            pages.extend(
                document
                    .pages()
                    .iter()
                    .filter_map(|page| map.get(index, page.id)),
            );
        }

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", PdfValue::name("Pages"));
        pages_dict.set(
            "Kids",
            pages.iter().copied().map(PdfValue::Reference).collect::<Vec<_>>(),
        );
        pages_dict.set("Count", pages.len() as i64);
        objects.insert(pages_root, pages_dict.into());

        let mut catalog = Dictionary::new();
        catalog.set("Type", PdfValue::name("Catalog"));
        catalog.set("Pages", pages_root);
        objects.insert(root, catalog.into());

        let source_info =
            source_info(documents[0], &targets).map_err(|err| err.for_input(0, None))?;
        let info_dict = self
            .metadata_manager
            .build_info(source_info.as_ref(), &options.metadata);
        objects.insert(info, info_dict.into());

        let version = documents
            .iter()
            .map(|document| document.version())
            .fold(MIN_OUTPUT_VERSION, Ord::max);

        let mut graph = MergedGraph {
            objects,
            root,
            pages_root,
            info: Some(info),
            pages,
            version,
        };

        let items: Vec<(String, ObjectId)> = outline_items
            .into_iter()
            .filter_map(|(title, index, page)| map.get(index, page).map(|id| (title, id)))
            .collect();
        self.bookmark_manager.add_outline(&mut graph, &items)?;

        graph.check_closure()?;
        debug!(
            objects = graph.object_count(),
            pages = graph.page_count(),
            version = ?graph.version,
            "merged graph built"
        );
        Ok(graph)
    }
}

/// Ids the copied values are rewritten against.
struct Targets<'m> {
    root: ObjectId,
    pages_root: ObjectId,
    map: &'m RenumberMap,
}

impl Targets<'_> {
    fn rewrite(&self, document: &Document, index: usize, id: ObjectId) -> PdfValue {
        if id == document.catalog_id() {
            return PdfValue::Reference(self.root);
        }
        if document.is_page_tree_node(id) {
            return PdfValue::Reference(self.pages_root);
        }
        self.map
            .get(index, id)
            .map_or(PdfValue::Null, PdfValue::Reference)
    }
}

/// Number the objects of one document reachable from its pages.
///
/// Pages are numbered first, in page order; everything else in discovery
/// order. Returns how many references pointed at missing objects.
fn number_reachable(document: &Document, index: usize, map: &mut RenumberMap) -> Result<usize> {
    let mut walk = Walk {
        document,
        index,
        expanded: HashSet::new(),
        stack: Vec::new(),
        missing: 0,
    };

    for page in document.pages() {
        map.assign(index, page.id);
    }
    for page in document.pages() {
        walk.stack.push(page.id);
        walk.run(map)?;
        for target in page.inherited.iter().flat_map(|(_, value)| value.references()) {
            walk.discover(map, target)?;
            walk.run(map)?;
        }
    }
    if index == 0 {
        let info = match document.info_id() {
            Some(id) => document.get(id)?.references(),
            None => Vec::new(),
        };
        for target in info {
            walk.discover(map, target)?;
            walk.run(map)?;
        }
    }
    Ok(walk.missing)
}

struct Walk<'d> {
    document: &'d Document,
    index: usize,
    expanded: HashSet<ObjectId>,
    stack: Vec<ObjectId>,
    missing: usize,
}

impl Walk<'_> {
    /// Number `target` and queue it, unless it is redirected, already
    /// expanded, or missing.
    fn discover(&mut self, map: &mut RenumberMap, target: ObjectId) -> Result<bool> {
        if target == self.document.catalog_id() || self.document.is_page_tree_node(target) {
            return Ok(false);
        }
        if self.expanded.contains(&target) {
            return Ok(false);
        }
        if self.document.get(target)?.is_null() {
            if map.get(self.index, target).is_none() {
                warn!(input = self.index, reference = %target, "reference to a missing object");
                self.missing += 1;
            }
            return Ok(false);
        }
        map.assign(self.index, target);
        self.stack.push(target);
        Ok(true)
    }

    fn run(&mut self, map: &mut RenumberMap) -> Result<()> {
        while let Some(id) = self.stack.pop() {
            if !self.expanded.insert(id) {
                continue;
            }
            let value = self.document.get(id)?;
            let mut found = Vec::new();
            for target in walk_targets(&value) {
                let before = self.stack.len();
                if self.discover(map, target)? {
                    found.extend(self.stack.drain(before..));
                }
            }
            self.stack.extend(found.into_iter().rev());
        }
        Ok(())
    }
}

/// References the walk follows out of `value`.
///
/// Page tree `/Parent` links are rebuilt rather than followed, and stream
/// `/Length` is written back as a direct integer.
fn walk_targets(value: &PdfValue) -> Vec<ObjectId> {
    let (dict, is_stream) = match value {
        PdfValue::Dictionary(dict) => (dict, false),
        PdfValue::Stream(stream) => (&stream.dict, true),
        other => return other.references(),
    };
    let tree_node = dict.has_type(b"Page") || dict.has_type(b"Pages");
    dict.iter()
        .filter(|(key, _)| !(tree_node && key.as_slice() == b"Parent"))
        .filter(|(key, _)| !(is_stream && key.as_slice() == b"Length"))
        .flat_map(|(_, value)| value.references())
        .collect()
}

/// Copy one retained object into the output numbering.
///
/// `page` is the page node when `id` is a page.
fn copy_object(
    document: &Document,
    index: usize,
    id: ObjectId,
    page: Option<&PageNode>,
    targets: &Targets<'_>,
) -> Result<PdfValue> {
    let mut value = (*document.get(id)?).clone();

    if let Some(page) = page {
        if let Some(dict) = value.as_dict_mut() {
            for (key, inherited) in page.inherited.iter() {
                if !dict.has(key) {
                    dict.set(key.clone(), inherited.clone());
                }
            }
        }
    }
    if let PdfValue::Stream(stream) = &mut value {
        stream.dict.set("Length", stream.content.len() as i64);
    }

    value.rewrite_references(|old| targets.rewrite(document, index, old));

    if page.is_some() {
        if let Some(dict) = value.as_dict_mut() {
            dict.set("Parent", targets.pages_root);
        }
    }
    Ok(value)
}

/// The first input's information dictionary in output numbering.
fn source_info(document: &Document, targets: &Targets<'_>) -> Result<Option<Dictionary>> {
    let Some(id) = document.info_id() else {
        return Ok(None);
    };
    let mut value = (*document.get(id)?).clone();
    if value.as_dict().is_none() {
        warn!(info = %id, "ignoring /Info that is not a dictionary");
        return Ok(None);
    }
    value.rewrite_references(|old| targets.rewrite(document, 0, old));
    Ok(value.as_dict().cloned())
}

/// (title, input index, first page) for each outline entry to create.
fn bookmark_items(documents: &[&Document], options: &MergeOptions) -> Vec<(String, usize, ObjectId)> {
    let Some(labels) = &options.bookmarks else {
        return Vec::new();
    };
    documents
        .iter()
        .zip(labels)
        .enumerate()
        .filter_map(|(index, (document, label))| {
            document
                .pages()
                .first()
                .map(|page| (label.clone(), index, page.id))
        })
        .collect()
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
