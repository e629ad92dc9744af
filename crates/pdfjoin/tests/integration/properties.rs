//! Property tests over randomly shaped object graphs.

use pdfjoin::config::MergeOptions;
use pdfjoin::io::PdfWriter;
use pdfjoin::merge::Merger;
use pdfjoin::{load_document, Document};
use proptest::prelude::*;

use crate::common::PdfBuilder;

/// Pages plus extra objects, with edges from any node to an extra.
#[derive(Debug, Clone)]
struct Shape {
    pages: usize,
    extras: usize,
    links: Vec<(usize, usize)>,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        1usize..4,
        0usize..5,
        prop::collection::vec((0usize..16, 0usize..16), 0..12),
    )
        .prop_map(|(pages, extras, links)| Shape {
            pages,
            extras,
            links,
        })
}

fn build(shape: &Shape) -> Vec<u8> {
    let first_extra = 3 + shape.pages as u32;
    let nodes = shape.pages + shape.extras;
    let mut edges: Vec<Vec<u32>> = vec![Vec::new(); nodes];
    if shape.extras > 0 {
        for (from, to) in &shape.links {
            edges[from % nodes].push(first_extra + (to % shape.extras) as u32);
        }
    }
    let refs = |targets: &[u32]| {
        targets
            .iter()
            .map(|n| format!("{n} 0 R"))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let kids: Vec<String> = (0..shape.pages).map(|i| format!("{} 0 R", 3 + i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                shape.pages
            ),
        );
    for i in 0..shape.pages {
        builder = builder.object(
            3 + i as u32,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Refs [{}] >>",
                refs(&edges[i])
            ),
        );
    }
    for j in 0..shape.extras {
        builder = builder.object(
            first_extra + j as u32,
            &format!("<< /Kind /Extra /Links [{}] >>", refs(&edges[shape.pages + j])),
        );
    }
    builder.classic(1)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn merged_graph_has_no_dangling_references(shapes in prop::collection::vec(shape(), 2..4)) {
        let documents: Vec<Document> = shapes
            .iter()
            .map(|shape| load_document(build(shape)).unwrap())
            .collect();

        let graph = Merger::new()
            .merge_documents(&documents, &MergeOptions::default())
            .unwrap();
        prop_assert!(graph.check_closure().is_ok());
        for value in graph.objects.values() {
            for target in value.references() {
                prop_assert!(graph.objects.contains_key(&target), "dangling {}", target);
            }
        }

        let expected: usize = shapes.iter().map(|shape| shape.pages).sum();
        prop_assert_eq!(graph.page_count(), expected);

        let bytes = PdfWriter::new().write(&graph).unwrap();
        let reloaded = load_document(bytes).unwrap();
        prop_assert_eq!(reloaded.page_count(), expected);
    }
}
