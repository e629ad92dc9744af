//! Integration tests for bookmark functionality.

use pdfjoin::config::{Config, MergeOptions};
use pdfjoin::merge::metadata::decode_text_string;
use pdfjoin::merge::{merge_pdfs, BookmarkManager, Merger};
use pdfjoin::{load_document, Document, ObjectId, PdfValue};
use tempfile::TempDir;

use crate::common::{text_pdf, write_fixture};

/// Titles and destination pages of the outline, in order.
fn outline_entries(doc: &Document) -> Vec<(String, ObjectId)> {
    let catalog = doc.get(doc.catalog_id()).unwrap();
    let outlines = catalog
        .as_dict()
        .and_then(|dict| dict.get(b"Outlines"))
        .and_then(PdfValue::as_reference)
        .expect("catalog has /Outlines");
    let root = doc.get(outlines).unwrap();

    let mut entries = Vec::new();
    let mut next = root
        .as_dict()
        .and_then(|dict| dict.get(b"First"))
        .and_then(PdfValue::as_reference);
    while let Some(id) = next {
        let item = doc.get(id).unwrap();
        let dict = item.as_dict().unwrap();
        let title = dict
            .get(b"Title")
            .and_then(PdfValue::as_string)
            .and_then(decode_text_string)
            .unwrap();
        let page = dict
            .get(b"Dest")
            .and_then(PdfValue::as_array)
            .and_then(|dest| dest.first())
            .and_then(PdfValue::as_reference)
            .unwrap();
        entries.push((title, page));
        next = dict.get(b"Next").and_then(PdfValue::as_reference);
    }
    entries
}

#[tokio::test]
async fn test_merge_with_bookmarks() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "intro.pdf", &text_pdf(&["i1", "i2"])),
        write_fixture(&temp_dir, "body.pdf", &text_pdf(&["b1"])),
    ];
    let mut config = Config::new(inputs, temp_dir.path().join("out.pdf"));
    config.bookmarks = true;

    let (bytes, stats) = merge_pdfs(&config).await.unwrap();
    assert_eq!(stats.bookmarks_added, 2);

    let doc = load_document(bytes).unwrap();
    let entries = outline_entries(&doc);
    let pages: Vec<ObjectId> = doc.pages().iter().map(|page| page.id).collect();

    assert_eq!(
        entries,
        vec![("intro".to_string(), pages[0]), ("body".to_string(), pages[2])]
    );
}

#[tokio::test]
async fn test_merge_without_bookmarks() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "a.pdf", &text_pdf(&["a"])),
        write_fixture(&temp_dir, "b.pdf", &text_pdf(&["b"])),
    ];
    let config = Config::new(inputs, temp_dir.path().join("out.pdf"));

    let (bytes, stats) = merge_pdfs(&config).await.unwrap();
    assert_eq!(stats.bookmarks_added, 0);

    let doc = load_document(bytes).unwrap();
    let catalog = doc.get(doc.catalog_id()).unwrap();
    assert!(!catalog.as_dict().unwrap().has(b"Outlines"));
}

#[test]
fn test_unicode_bookmark_titles() {
    let a = load_document(text_pdf(&["a"])).unwrap();
    let b = load_document(text_pdf(&["b"])).unwrap();
    let options = MergeOptions {
        bookmarks: Some(vec!["Überblick".to_string(), "日本語".to_string()]),
        ..MergeOptions::default()
    };

    let graph = Merger::new()
        .merge_documents(&[&a, &b], &options)
        .unwrap();
    assert!(BookmarkManager::new().has_bookmarks(&graph));
    assert!(graph.check_closure().is_ok());

    let bytes = pdfjoin::io::PdfWriter::new().write(&graph).unwrap();
    let doc = load_document(bytes).unwrap();
    let titles: Vec<String> = outline_entries(&doc)
        .into_iter()
        .map(|(title, _)| title)
        .collect();
    assert_eq!(titles, vec!["Überblick", "日本語"]);
}

#[test]
fn test_bookmarks_readable_by_lopdf() {
    let a = load_document(text_pdf(&["a"])).unwrap();
    let b = load_document(text_pdf(&["b"])).unwrap();
    let options = MergeOptions {
        bookmarks: Some(vec!["first".to_string(), "second".to_string()]),
        ..MergeOptions::default()
    };

    let bytes = pdfjoin::merge_documents_with(&[a, b], &options).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    let catalog = doc.catalog().unwrap();
    let outlines = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
    let outline = doc.get_dictionary(outlines).unwrap();
    assert_eq!(outline.get(b"Count").unwrap().as_i64().unwrap(), 2);
}
