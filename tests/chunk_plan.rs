use pdf_chunk_translate::{
    chunk_plan::{ChunkPlan, SplitPolicy},
    error::Error,
};

#[test]
fn chunk_plan_basic() {
    let plan = ChunkPlan::from_page_count(101, 40).unwrap();
    assert_eq!(plan.chunks.len(), 3);
    assert_eq!(plan.chunks[0].start, 0);
    assert_eq!(plan.chunks[0].end, 40);
    assert_eq!(plan.chunks.last().unwrap().end, 101);
    assert_eq!(plan.chunks.last().unwrap().len(), 21);
}

#[test]
fn ranges_partition_every_page_exactly_once() {
    for pages in 0..=60u32 {
        for size in 1..=13u32 {
            let plan = ChunkPlan::from_page_count(pages, size).unwrap();
            assert_eq!(plan.total(), pages.div_ceil(size), "pages={pages} size={size}");
            assert_eq!(plan.chunks.iter().map(|r| r.len()).sum::<u32>(), pages);

            let mut next = 0;
            for r in &plan.chunks {
                assert_eq!(r.start, next, "gap or overlap at pages={pages} size={size}");
                assert!(!r.is_empty());
                assert!(r.len() <= size);
                next = r.end;
            }
            assert_eq!(next, pages);
        }
    }
}

#[test]
fn zero_chunk_size_is_rejected() {
    assert!(matches!(
        ChunkPlan::from_page_count(10, 0),
        Err(Error::InvalidParameters(_))
    ));
    let policy = SplitPolicy {
        pages_per_chunk: 0,
        force_split: true,
        size_threshold_pages: 0,
        size_threshold_bytes: 0,
    };
    assert!(matches!(policy.validate(), Err(Error::InvalidParameters(_))));
}

#[test]
fn split_decision_thresholds() {
    let policy = SplitPolicy {
        pages_per_chunk: 10,
        force_split: false,
        size_threshold_pages: 50,
        size_threshold_bytes: 1_000,
    };
    assert!(!policy.requires_split(50, 1_000));
    assert!(policy.requires_split(51, 10));
    assert!(policy.requires_split(5, 1_001));

    let forced = SplitPolicy {
        force_split: true,
        ..policy
    };
    assert!(forced.requires_split(1, 1));
}
