mod common;

use common::{labels, make_pdf, page_labels};
use pdf_chunk_translate::{
    chunk_plan::SplitPolicy,
    error::Error,
    manifest::SplitManifest,
    merger::{discover_groups, merge_group, GroupFilter, MergeOptions},
    naming::{ChunkName, OutputKind},
    splitter::decide_and_split,
};

fn policy(pages_per_chunk: u32, force_split: bool) -> SplitPolicy {
    SplitPolicy {
        pages_per_chunk,
        force_split,
        size_threshold_pages: 50,
        size_threshold_bytes: u64::MAX,
    }
}

#[test]
fn small_document_is_not_split() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("short.pdf");
    make_pdf(&input, &labels("p", 0..5));

    let work = tmp.path().join("work");
    let chunks = decide_and_split(&input, &policy(2, false), &work).unwrap();
    assert!(chunks.is_none());
    assert!(!work.exists());
}

#[test]
fn forced_split_writes_ordered_chunks_and_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("paper.pdf");
    make_pdf(&input, &labels("p", 0..7));

    let work = tmp.path().join("work");
    let chunks = decide_and_split(&input, &policy(3, true), &work)
        .unwrap()
        .expect("forced split");

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks.iter().map(|c| c.range.len()).sum::<u32>(), 7);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.index, i as u32);
        assert_eq!(c.total, 3);
        assert_eq!(
            c.path.file_name().unwrap().to_string_lossy(),
            ChunkName::source("paper", i as u32, 3).file_name()
        );
        let expected: Vec<String> = (c.range.start..c.range.end).map(|p| format!("p{p}")).collect();
        assert_eq!(page_labels(&c.path), expected);
    }

    let manifest = SplitManifest::find(&work, "paper").expect("manifest");
    assert_eq!(manifest.total(), 3);
    assert_eq!(manifest.page_count, 7);
    assert_eq!(manifest.pages_per_chunk, 3);
    assert!(input.exists(), "source must not be deleted");
}

#[test]
fn page_threshold_triggers_split() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("long.pdf");
    make_pdf(&input, &labels("p", 0..12));

    let mut p = policy(5, false);
    p.size_threshold_pages = 10;
    let chunks = decide_and_split(&input, &p, &tmp.path().join("work"))
        .unwrap()
        .expect("split over page threshold");
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].range.len(), 2);
}

#[test]
fn invalid_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    let garbage = tmp.path().join("broken.pdf");
    std::fs::write(&garbage, b"this is not a pdf").unwrap();
    assert!(matches!(
        decide_and_split(&garbage, &policy(3, true), tmp.path()),
        Err(Error::InvalidDocument { .. })
    ));

    let input = tmp.path().join("ok.pdf");
    make_pdf(&input, &labels("p", 0..3));
    assert!(matches!(
        decide_and_split(&input, &policy(0, true), tmp.path()),
        Err(Error::InvalidParameters(_))
    ));
}

#[test]
fn merge_of_split_reconstructs_document() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("book.pdf");
    let original = labels("page-", 0..11);
    make_pdf(&input, &original);

    let work = tmp.path().join("work");
    let chunks = decide_and_split(&input, &policy(4, true), &work)
        .unwrap()
        .unwrap();

    // Stand-in for translation: each source chunk becomes its own output.
    for c in &chunks {
        let out = work.join(ChunkName::output("book", OutputKind::Translated, c.index, c.total).file_name());
        std::fs::copy(&c.path, out).unwrap();
    }

    let groups = discover_groups(&work, &GroupFilter::default()).unwrap();
    assert_eq!(groups.len(), 1);
    let group = groups.values().next().unwrap();
    assert!(group.is_complete());

    let out_dir = tmp.path().join("final");
    let outcome = merge_group(group, &out_dir, &MergeOptions::default()).unwrap();
    assert_eq!(outcome.pages, 11);
    assert!(!outcome.partial);
    assert_eq!(page_labels(&outcome.output), original);

    // Inherited attributes survive losing the original page tree.
    let merged = lopdf::Document::load(&outcome.output).unwrap();
    for id in merged.get_pages().values() {
        let page = merged.get_object(*id).unwrap().as_dict().unwrap();
        assert!(page.get(b"MediaBox").is_ok());
        assert!(page.get(b"Resources").is_ok());
    }
}
