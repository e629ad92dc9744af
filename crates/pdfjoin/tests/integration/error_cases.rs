//! Integration tests for error handling and edge cases.

use pdfjoin::config::{Config, Limits, MergeOptions};
use pdfjoin::error::PdfJoinError;
use pdfjoin::merge::merge_pdfs;
use pdfjoin::{load_document, load_document_with, merge_documents, merge_documents_with};
use rstest::rstest;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::{cyclic_pdf, encrypted_pdf, temp_output_path, text_pdf, write_fixture};

#[tokio::test]
async fn test_error_nonexistent_input() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_fixture(&temp_dir, "good.pdf", &text_pdf(&["ok"]));
    let output = temp_output_path();

    let config = Config::new(
        vec![good, PathBuf::from("/nonexistent/file.pdf")],
        output.to_path_buf(),
    );

    let err = merge_pdfs(&config).await.unwrap_err();
    assert_eq!(err.input_index(), Some(1));
    assert!(matches!(err.root_cause(), PdfJoinError::FileNotFound { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[rstest]
#[case::empty(0)]
#[case::single(1)]
fn test_error_not_enough_inputs(#[case] count: usize) {
    let inputs = (0..count)
        .map(|i| PathBuf::from(format!("/nonexistent/{i}.pdf")))
        .collect();
    let config = Config::new(inputs, "out.pdf");

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        PdfJoinError::NotEnoughInputs { required: 2, actual } if actual == count
    ));
}

#[test]
fn test_error_single_document_in_memory() {
    let a = load_document(text_pdf(&["only"])).unwrap();
    let err = merge_documents(&[a]).unwrap_err();
    assert!(matches!(err, PdfJoinError::NotEnoughInputs { .. }));
}

#[test]
fn test_error_output_is_input() {
    let config = Config::new(
        vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
        "a.pdf",
    );
    assert!(matches!(
        config.validate(),
        Err(PdfJoinError::InvalidConfig { .. })
    ));
}

#[test]
fn test_error_verbose_and_quiet() {
    let mut config = Config::new(
        vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
        "out.pdf",
    );
    config.verbose = true;
    config.quiet = true;
    assert!(config.validate().is_err());
}

#[rstest]
#[case::empty(b"".to_vec())]
#[case::not_a_pdf(b"hello world, this is not a PDF".to_vec())]
fn test_error_invalid_document(#[case] bytes: Vec<u8>) {
    let err = load_document(bytes).unwrap_err();
    assert!(matches!(err, PdfJoinError::InvalidDocument { .. }));
}

#[test]
fn test_error_encrypted_input() {
    let err = load_document(encrypted_pdf()).unwrap_err();
    assert!(matches!(err, PdfJoinError::EncryptedDocument));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_error_cyclic_page_tree_produces_no_output() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "good.pdf", &text_pdf(&["ok"])),
        write_fixture(&temp_dir, "cyclic.pdf", &cyclic_pdf()),
    ];
    let config = Config::new(inputs, temp_dir.path().join("out.pdf"));

    let err = merge_pdfs(&config).await.unwrap_err();
    assert_eq!(err.input_index(), Some(1));
    assert!(matches!(err.root_cause(), PdfJoinError::CyclicPageTree { .. }));
    assert!(!config.output.exists());
}

#[test]
fn test_broken_xref_needs_recovery() {
    let mut bytes = text_pdf(&["a", "b"]);
    // Point startxref into the middle of an object.
    let position = bytes
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .unwrap();
    bytes.truncate(position);
    bytes.extend_from_slice(b"startxref\n20\n%%EOF\n");

    let err = load_document(bytes.clone()).unwrap_err();
    assert!(err.is_parse_error());

    let limits = Limits {
        allow_recovery_scan: true,
        ..Limits::default()
    };
    let doc = load_document_with(bytes, &limits).unwrap();
    assert!(doc.is_recovered());
    assert_eq!(doc.page_count(), 2);
}

#[test]
fn test_error_input_over_size_limit() {
    let limits = Limits {
        max_input_bytes: 64,
        ..Limits::default()
    };
    let err = load_document_with(text_pdf(&["big"]), &limits).unwrap_err();
    assert!(matches!(
        err,
        PdfJoinError::LimitExceeded {
            limit: "max_input_bytes",
            ..
        }
    ));
}

#[test]
fn test_error_merged_object_limit() {
    let a = load_document(text_pdf(&["a"])).unwrap();
    let b = load_document(text_pdf(&["b"])).unwrap();
    let options = MergeOptions {
        max_total_objects: 5,
        ..MergeOptions::default()
    };

    let err = merge_documents_with(&[a, b], &options).unwrap_err();
    assert!(matches!(
        err,
        PdfJoinError::LimitExceeded {
            limit: "max_total_objects",
            ..
        }
    ));
    assert_eq!(err.exit_code(), 7);
}

#[test]
fn test_dangling_reference_becomes_null() {
    // The page points at object 40, which does not exist.
    let bytes = crate::common::PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Thumb 40 0 R >>")
        .classic(1);
    let a = load_document(bytes).unwrap();
    let b = load_document(text_pdf(&["b"])).unwrap();

    let merged = load_document(merge_documents(&[a, b]).unwrap()).unwrap();
    let page = merged.get(merged.pages()[0].id).unwrap();
    let thumb = page.as_dict().unwrap().get(b"Thumb").unwrap();
    assert!(thumb.is_null());
}
