//! Per-split manifest recording the chunk count and ranges, so the merger knows
//! the expected total without trusting filenames alone.

use crate::{
    chunk_plan::PageRange,
    error::{Error, Result},
    naming::manifest_file_name,
    util::write_atomic,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub project: String,
    pub source: PathBuf,
    pub source_sha256: String,
    pub page_count: u32,
    pub pages_per_chunk: u32,
    pub created: String,
    pub chunks: Vec<ManifestChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub index: u32,
    pub range: PageRange,
    pub file: String,
}

impl SplitManifest {
    pub fn total(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn path_in(dir: &Path, project: &str) -> PathBuf {
        dir.join(manifest_file_name(project))
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(dir, &self.project);
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::io(&path, std::io::Error::other(e)))?;
        write_atomic(&path, |f| f.write_all(&bytes)).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&raw).map_err(|e| Error::io(path, std::io::Error::other(e)))
    }

    /// The manifest for `project` in `dir`, if one exists and parses.
    pub fn find(dir: &Path, project: &str) -> Option<Self> {
        let path = Self::path_in(dir, project);
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(m) => Some(m),
            Err(err) => {
                warn!("ignoring unreadable manifest {}: {err}", path.display());
                None
            }
        }
    }
}
