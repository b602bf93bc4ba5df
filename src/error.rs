//! Error taxonomy shared by the splitter, engines, and merger.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Input PDF could not be opened, parsed, or is out of limits.
    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    /// Bad chunk size, unknown engine or output kind, missing directory.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// One chunk failed; siblings keep going.
    #[error("chunk {index} failed: {reason}")]
    ChunkProcessing { index: u32, reason: String },

    #[error(transparent)]
    Merge(#[from] MergeFailure),

    /// Missing credentials or unusable config. Fatal before any processing.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn invalid_document(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::InvalidDocument {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single merge group. Other groups are unaffected.
#[derive(Debug, Error)]
pub enum MergeFailure {
    #[error("group {group} is incomplete: expected {expected} chunks, missing indices {missing:?}")]
    Incomplete {
        group: String,
        expected: u32,
        missing: Vec<u32>,
    },

    #[error("group {group} has index {index} more than once: {paths:?}")]
    DuplicateIndex {
        group: String,
        index: u32,
        paths: Vec<PathBuf>,
    },

    #[error("group {group}: cannot read chunk {index} ({path}): {reason}")]
    Unreadable {
        group: String,
        index: u32,
        path: PathBuf,
        reason: String,
    },

    #[error("group {group}: cannot write {path}: {reason}")]
    Write {
        group: String,
        path: PathBuf,
        reason: String,
    },

    #[error("group {group} has no chunk files")]
    Empty { group: String },
}

impl MergeFailure {
    pub fn missing(&self) -> &[u32] {
        match self {
            MergeFailure::Incomplete { missing, .. } => missing,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
