//! Integration tests for dry-run functionality.
//!
//! A dry run loads every input and reports what would be merged without
//! producing any output file.

use pdfjoin::config::Config;
use pdfjoin::io::PdfReader;
use tempfile::TempDir;

use crate::common::{encrypted_pdf, text_pdf, write_fixture};

#[tokio::test]
async fn test_dry_run_does_not_create_output() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "a.pdf", &text_pdf(&["a"])),
        write_fixture(&temp_dir, "b.pdf", &text_pdf(&["b1", "b2"])),
    ];
    let mut config = Config::new(inputs, temp_dir.path().join("out.pdf"));
    config.dry_run = true;
    config.validate().unwrap();

    let reader = PdfReader::new(config.limits.clone());
    let (results, stats) = reader
        .load_all(&config.inputs, config.effective_jobs())
        .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.total_pages, 3);
    assert!(stats.total_size > 0);
    assert!(!config.output.exists(), "Output file should not be created in dry run");
}

#[tokio::test]
async fn test_dry_run_reports_every_failing_input() {
    let temp_dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(&temp_dir, "locked.pdf", &encrypted_pdf()),
        write_fixture(&temp_dir, "good.pdf", &text_pdf(&["ok"])),
        write_fixture(&temp_dir, "junk.pdf", b"not a pdf"),
    ];
    let mut config = Config::new(inputs, temp_dir.path().join("out.pdf"));
    config.dry_run = true;

    let reader = PdfReader::new(config.limits.clone());
    let (results, stats) = reader.load_all(&config.inputs, 2).await;

    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.failure_count, 2);

    let failed: Vec<usize> = results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .filter_map(|err| err.input_index())
        .collect();
    assert_eq!(failed, vec![0, 2]);
}

#[test]
fn test_dry_run_should_print_even_when_quiet() {
    let mut config = Config::new(vec![], "out.pdf");
    config.quiet = true;
    assert!(!config.should_print());

    config.dry_run = true;
    assert!(config.should_print());
}
