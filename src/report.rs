use crate::{naming::OutputKind, probe::DocumentInfo};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process exit status for a run or a merge.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Translated,
    /// Outputs were already on disk from an earlier run.
    Resumed,
    Failed,
    /// Never attempted because the run was interrupted.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub project: String,
    pub chunk_index: u32,
    pub chunk_total: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub status: ChunkStatus,
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ChunkReport {
    pub fn ok(&self) -> bool {
        matches!(self.status, ChunkStatus::Translated | ChunkStatus::Resumed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Merged,
    /// Written as `_merged_partial.pdf` with chunks missing.
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub project: String,
    pub kind: OutputKind,
    pub status: GroupStatus,
    pub output: Option<PathBuf>,
    pub chunk_count: u32,
    pub expected_chunks: u32,
    pub pages: u32,
    pub missing: Vec<u32>,
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeSummary {
    pub directory: PathBuf,
    pub groups: Vec<GroupReport>,
}

impl MergeSummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn merged(&self) -> usize {
        self.count(GroupStatus::Merged)
    }

    pub fn failed(&self) -> usize {
        self.count(GroupStatus::Failed)
    }

    fn count(&self, status: GroupStatus) -> usize {
        self.groups.iter().filter(|g| g.status == status).count()
    }

    /// 0 when every group merged completely (or there was nothing to do),
    /// 1 when no group produced output, 2 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.merged() == self.groups.len() {
            EXIT_OK
        } else if self.failed() == self.groups.len() {
            EXIT_FAILED
        } else {
            EXIT_PARTIAL
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub job_id: String,
    pub project: String,
    pub input: DocumentInfo,
    pub engine: String,
    pub split: bool,
    pub chunk_reports: Vec<ChunkReport>,
    pub merge: Option<MergeSummary>,
    pub merge_skipped: Option<String>,
}

impl RunReport {
    pub fn failed_chunks(&self) -> Vec<u32> {
        self.chunk_reports
            .iter()
            .filter(|c| !c.ok())
            .map(|c| c.chunk_index)
            .collect()
    }

    pub fn exit_code(&self) -> i32 {
        let ok = self.chunk_reports.iter().filter(|c| c.ok()).count();
        if ok == 0 {
            return EXIT_FAILED;
        }
        let merge_code = self.merge.as_ref().map_or(EXIT_OK, MergeSummary::exit_code);
        if ok == self.chunk_reports.len() && merge_code == EXIT_OK {
            EXIT_OK
        } else {
            EXIT_PARTIAL
        }
    }
}
