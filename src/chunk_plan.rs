use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32, // 0-based inclusive
    pub end: u32,   // 0-based exclusive
}

impl PageRange {
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page < self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub page_count: u32,
    pub pages_per_chunk: u32,
    pub chunks: Vec<PageRange>,
}

/// Inputs to the split decision.
#[derive(Debug, Clone, Copy)]
pub struct SplitPolicy {
    pub pages_per_chunk: u32,
    pub force_split: bool,
    pub size_threshold_pages: u32,
    pub size_threshold_bytes: u64,
}

impl SplitPolicy {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            pages_per_chunk: cfg.chunking.pages_per_chunk,
            force_split: cfg.chunking.force_split,
            size_threshold_pages: cfg.limits.split_over_pages,
            size_threshold_bytes: cfg.limits.split_over_bytes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pages_per_chunk == 0 {
            return Err(Error::InvalidParameters(
                "pages_per_chunk must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn requires_split(&self, page_count: u32, file_bytes: u64) -> bool {
        self.force_split
            || page_count > self.size_threshold_pages
            || file_bytes > self.size_threshold_bytes
    }
}

impl ChunkPlan {
    /// Fixed windows of `pages_per_chunk`; the last one may be shorter.
    pub fn from_page_count(page_count: u32, pages_per_chunk: u32) -> Result<Self> {
        if pages_per_chunk == 0 {
            return Err(Error::InvalidParameters(
                "pages_per_chunk must be greater than zero".into(),
            ));
        }

        let mut chunks = Vec::with_capacity(page_count.div_ceil(pages_per_chunk) as usize);
        let mut start = 0u32;
        while start < page_count {
            let end = start.saturating_add(pages_per_chunk).min(page_count);
            chunks.push(PageRange { start, end });
            start = end;
        }

        Ok(Self {
            page_count,
            pages_per_chunk,
            chunks,
        })
    }

    /// The whole document as one unit.
    pub fn single(page_count: u32) -> Self {
        Self {
            page_count,
            pages_per_chunk: page_count,
            chunks: vec![PageRange {
                start: 0,
                end: page_count,
            }],
        }
    }

    pub fn total(&self) -> u32 {
        self.chunks.len() as u32
    }
}
