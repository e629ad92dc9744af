//! Integration tests for basic PDF merging operations.

use pdfjoin::config::{Config, MergeOptions, Metadata};
use pdfjoin::io::writer::verify_xref;
use pdfjoin::merge::{merge_pdfs, Merger};
use pdfjoin::merge::metadata::MetadataManager;
use pdfjoin::{load_document, merge_documents, merge_documents_with, PdfValue};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{
    append_update, content_for, page_contents, text_document, text_pdf, write_fixture,
    PdfBuilder,
};

#[test]
fn test_merge_two_documents_in_memory() {
    let a = load_document(text_pdf(&["a1", "a2"])).unwrap();
    let b = load_document(text_pdf(&["b1"])).unwrap();

    let bytes = merge_documents(&[a, b]).unwrap();
    let merged = load_document(bytes).unwrap();

    assert_eq!(merged.page_count(), 3);
    assert_eq!(
        page_contents(&merged),
        vec![content_for("a1"), content_for("a2"), content_for("b1")]
    );
}

#[test]
fn test_output_readable_by_lopdf() {
    let a = load_document(text_pdf(&["a1", "a2"])).unwrap();
    let b = load_document(text_pdf(&["b1", "b2", "b3"])).unwrap();

    let bytes = merge_documents(&[a, b]).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();

    let pages = doc.get_pages();
    assert_eq!(pages.len(), 5);
    let last = pages[&5];
    assert_eq!(doc.get_page_content(last).unwrap(), content_for("b3"));
}

#[test]
fn test_distinct_numbers_and_consistent_xref() {
    let a = load_document(text_pdf(&["one"])).unwrap();
    let b = load_document(text_pdf(&["two"])).unwrap();

    let graph = Merger::new()
        .merge_documents(&[&a, &b], &MergeOptions::default())
        .unwrap();
    assert_eq!(graph.pages.len(), 2);
    assert_ne!(graph.pages[0], graph.pages[1]);

    let bytes = pdfjoin::io::PdfWriter::new().write(&graph).unwrap();
    let check = verify_xref(&bytes, &graph).unwrap();
    assert!(check.is_consistent());
    assert_eq!(check.entries_checked, graph.object_count());
}

#[test]
fn test_single_input_reproduces_pages() {
    let source = text_pdf(&["x", "y"]);
    let a = load_document(source.clone()).unwrap();
    let options = MergeOptions {
        min_inputs: 1,
        ..MergeOptions::default()
    };

    let bytes = merge_documents_with(&[a], &options).unwrap();
    let merged = load_document(bytes).unwrap();
    let original = load_document(source).unwrap();

    assert_eq!(page_contents(&merged), page_contents(&original));
}

#[test]
fn test_inherited_attributes_reach_pages() {
    let nested = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 2 /MediaBox [0 0 200 300] /Resources << /Font << /F1 6 0 R >> >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 /Rotate 90 >>")
        .object(4, "<< /Type /Page /Parent 3 0 R >>")
        .object(5, "<< /Type /Page /Parent 3 0 R /Rotate 180 >>")
        .object(6, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")
        .classic(1);
    let a = load_document(nested).unwrap();
    let b = load_document(text_pdf(&["b"])).unwrap();

    let bytes = merge_documents(&[a, b]).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    let pages = doc.get_pages();

    let first = doc.get_dictionary(pages[&1]).unwrap();
    assert_eq!(first.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    assert_eq!(first.get(b"MediaBox").unwrap().as_array().unwrap().len(), 4);
    assert!(first.get(b"Resources").is_ok());

    // The page's own value wins over the inherited one.
    let second = doc.get_dictionary(pages[&2]).unwrap();
    assert_eq!(second.get(b"Rotate").unwrap().as_i64().unwrap(), 180);
}

#[test]
fn test_xref_stream_input() {
    let packed = text_document(&["packed"]).version("1.5").compressed(1, &[2, 3, 4]);
    let a = load_document(packed).unwrap();
    assert_eq!(a.version(), (1, 5));
    let b = load_document(text_pdf(&["plain"])).unwrap();

    let bytes = merge_documents(&[a, b]).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5\n"));

    let merged = load_document(bytes).unwrap();
    assert_eq!(
        page_contents(&merged),
        vec![content_for("packed"), content_for("plain")]
    );
}

#[test]
fn test_hybrid_input() {
    // Catalog and first page only appear in the /XRefStm stream; the
    // stream's bogus rows for plain objects lose to the classic table.
    let hybrid = text_document(&["h1", "h2"]).version("1.5").hybrid(1, &[1, 4]);
    let a = load_document(hybrid).unwrap();
    assert_eq!(a.xref_sections(), 1);
    assert_eq!(a.page_count(), 2);
    assert!(a.catalog().unwrap().as_dict().unwrap().has_type(b"Catalog"));
    let b = load_document(text_pdf(&["plain"])).unwrap();

    let bytes = merge_documents(&[a, b]).unwrap();
    let merged = load_document(bytes.clone()).unwrap();
    assert_eq!(
        page_contents(&merged),
        vec![content_for("h1"), content_for("h2"), content_for("plain")]
    );
    assert_eq!(lopdf::Document::load_mem(&bytes).unwrap().get_pages().len(), 3);
}

#[test]
fn test_incremental_update_uses_latest_revision() {
    let base = text_pdf(&["old"]);
    let new_content = String::from_utf8(content_for("new")).unwrap();
    let stream = format!(
        "<< /Length {} >>\nstream\n{new_content}\nendstream",
        new_content.len()
    );
    let updated = append_update(
        base,
        1,
        7,
        &[
            (6, stream.as_str()),
            (4, "<< /Type /Page /Parent 2 0 R /Contents 6 0 R >>"),
        ],
    );
    let a = load_document(updated).unwrap();
    assert_eq!(a.xref_sections(), 2);
    let b = load_document(text_pdf(&["b"])).unwrap();

    let merged = load_document(merge_documents(&[a, b]).unwrap()).unwrap();
    assert_eq!(
        page_contents(&merged),
        vec![content_for("new"), content_for("b")]
    );
}

#[test]
fn test_info_carried_from_first_input() {
    let a = load_document(
        text_document(&["a"])
            .object(9, "<< /Title (First) /Author (Ann) >>")
            .trailer_entry("/Info 9 0 R")
            .classic(1),
    )
    .unwrap();
    let b = load_document(
        text_document(&["b"])
            .object(9, "<< /Title (Second) >>")
            .trailer_entry("/Info 9 0 R")
            .classic(1),
    )
    .unwrap();

    let options = MergeOptions {
        metadata: Metadata::new(None, Some("Override".to_string()), None, None),
        ..MergeOptions::default()
    };
    let merged = load_document(merge_documents_with(&[a, b], &options).unwrap()).unwrap();

    let info_id = merged.info_id().unwrap();
    let info = merged.get(info_id).unwrap();
    let dict = info.as_dict().unwrap();
    let metadata = MetadataManager::new().read_metadata(dict);
    assert_eq!(metadata.title.as_deref(), Some("First"));
    assert_eq!(metadata.author.as_deref(), Some("Override"));
    assert_eq!(
        dict.get(b"Producer").and_then(PdfValue::as_string),
        Some(&b"pdfjoin"[..])
    );
}

#[test]
fn test_shared_objects_copied_once() {
    // Both pages of one input share the font; it must appear once.
    let a = load_document(text_pdf(&["1", "2"])).unwrap();
    let b = load_document(text_pdf(&["3"])).unwrap();

    let graph = Merger::new()
        .merge_documents(&[&a, &b], &MergeOptions::default())
        .unwrap();
    let fonts = graph
        .objects
        .values()
        .filter_map(PdfValue::as_dict)
        .filter(|dict| dict.has_type(b"Font"))
        .count();
    assert_eq!(fonts, 2);
}

#[rstest]
#[case::sequential(1)]
#[case::parallel(4)]
#[tokio::test]
async fn test_merge_files_preserves_order(#[case] jobs: usize) {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "a.pdf", &text_pdf(&["a1", "a2"])),
        write_fixture(&temp_dir, "b.pdf", &text_pdf(&["b1"])),
        write_fixture(&temp_dir, "c.pdf", &text_pdf(&["c1", "c2", "c3"])),
    ];
    let mut config = Config::new(inputs, temp_dir.path().join("out.pdf"));
    config.jobs = Some(jobs);

    let (bytes, stats) = merge_pdfs(&config).await.unwrap();
    assert_eq!(stats.files_merged, 3);
    assert_eq!(stats.total_pages, 6);
    assert_eq!(stats.output_size, bytes.len() as u64);
    assert!(!config.output.exists(), "merge_pdfs must not write the output");

    let merged = load_document(bytes).unwrap();
    let expected: Vec<Vec<u8>> = ["a1", "a2", "b1", "c1", "c2", "c3"]
        .iter()
        .map(|text| content_for(text))
        .collect();
    assert_eq!(page_contents(&merged), expected);
}
