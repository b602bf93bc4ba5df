//! Reassembles translated chunk files into one PDF per (project, kind).

use crate::{
    error::{Error, MergeFailure, Result},
    manifest::SplitManifest,
    naming::{merged_file_name, ChunkName, OutputKind, MAX_CHUNK_TOTAL},
    pdf,
    report::{GroupReport, GroupStatus, MergeSummary},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub project: String,
    pub kind: OutputKind,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFileRef {
    pub path: PathBuf,
    pub index: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub key: GroupKey,
    /// Sorted by numeric chunk index.
    pub files: Vec<ChunkFileRef>,
    /// Number of chunks a complete group has.
    pub expected: u32,
}

impl Group {
    /// Indices in `[0, expected)` with no file.
    pub fn missing(&self) -> Vec<u32> {
        let present: BTreeSet<u32> = self.files.iter().map(|f| f.index).collect();
        (0..self.expected).filter(|i| !present.contains(i)).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty() && self.duplicate().is_none()
    }

    /// First index that appears more than once, with its files.
    pub fn duplicate(&self) -> Option<(u32, Vec<PathBuf>)> {
        self.files.windows(2).find_map(|w| {
            (w[0].index == w[1].index).then(|| {
                let paths = self
                    .files
                    .iter()
                    .filter(|f| f.index == w[0].index)
                    .map(|f| f.path.clone())
                    .collect();
                (w[0].index, paths)
            })
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub project: Option<String>,
    pub kind: Option<OutputKind>,
    pub recursive: bool,
}

impl GroupFilter {
    fn accepts(&self, key: &GroupKey) -> bool {
        self.project.as_deref().is_none_or(|p| p == key.project)
            && self.kind.is_none_or(|k| k == key.kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Defaults to the scanned directory.
    pub output_dir: Option<PathBuf>,
    pub keep_originals: bool,
    pub allow_partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub output: PathBuf,
    pub pages: u32,
    pub partial: bool,
    pub missing: Vec<u32>,
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted. The merge itself still stands.
    pub cleanup_errors: Vec<String>,
}

/// Scans `dir` for translated chunk files and groups them by (project, kind).
///
/// Names that do not follow the chunk convention are skipped. A directory with
/// no chunk files yields an empty map.
pub fn discover_groups(dir: &Path, filter: &GroupFilter) -> Result<BTreeMap<GroupKey, Group>> {
    if !dir.is_dir() {
        return Err(Error::InvalidParameters(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let max_depth = if filter.recursive { usize::MAX } else { 1 };
    let mut found: BTreeMap<GroupKey, Vec<ChunkFileRef>> = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("skipping unreadable entry under {}: {err}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(name) = ChunkName::parse_output(&file_name) else {
            debug!("not a chunk file: {}", entry.path().display());
            continue;
        };
        let Some(kind) = name.kind else { continue };
        let key = GroupKey {
            project: name.project,
            kind,
        };
        if !filter.accepts(&key) {
            continue;
        }
        found.entry(key).or_default().push(ChunkFileRef {
            path: entry.path().to_path_buf(),
            index: name.index,
            total: name.total,
        });
    }

    let mut groups = BTreeMap::new();
    for (key, mut files) in found {
        files.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.path.cmp(&b.path)));
        let expected = expected_total(dir, &key, &files);
        groups.insert(key.clone(), Group { key, files, expected });
    }
    Ok(groups)
}

fn expected_total(root: &Path, key: &GroupKey, files: &[ChunkFileRef]) -> u32 {
    let from_names = files.iter().map(|f| f.total).max().unwrap_or(0);
    let highest = files
        .iter()
        .map(|f| f.index.saturating_add(1))
        .max()
        .unwrap_or(0);

    let mut dirs: Vec<&Path> = files.iter().filter_map(|f| f.path.parent()).collect();
    dirs.push(root);
    dirs.dedup();
    let manifest = dirs
        .into_iter()
        .find_map(|d| SplitManifest::find(d, &key.project))
        .filter(|m| m.total() <= MAX_CHUNK_TOTAL);

    let expected = match manifest {
        Some(m) => {
            if m.total() != from_names {
                warn!(
                    "group {key}: manifest says {} chunks, filenames say {from_names}",
                    m.total()
                );
            }
            m.total()
        }
        None => from_names,
    };
    expected.max(highest)
}

/// Concatenates one group in index order. Nothing is written unless every
/// chunk loads; originals are removed only after a complete, successful merge.
pub fn merge_group(
    group: &Group,
    out_dir: &Path,
    opts: &MergeOptions,
) -> std::result::Result<MergeOutcome, MergeFailure> {
    let label = group.key.to_string();
    if group.files.is_empty() {
        return Err(MergeFailure::Empty { group: label });
    }
    if let Some((index, paths)) = group.duplicate() {
        return Err(MergeFailure::DuplicateIndex {
            group: label,
            index,
            paths,
        });
    }

    let missing = group.missing();
    let partial = !missing.is_empty();
    if partial && !opts.allow_partial {
        return Err(MergeFailure::Incomplete {
            group: label,
            expected: group.expected,
            missing,
        });
    }

    let mut docs = Vec::with_capacity(group.files.len());
    for f in &group.files {
        let doc = pdf::load(&f.path).map_err(|e| MergeFailure::Unreadable {
            group: label.clone(),
            index: f.index,
            path: f.path.clone(),
            reason: e.to_string(),
        })?;
        debug!("loaded chunk index={} path={}", f.index, f.path.display());
        docs.push(doc);
    }

    let output = out_dir.join(merged_file_name(
        &group.key.project,
        group.key.kind,
        partial,
    ));
    let write_failure = |reason: String| MergeFailure::Write {
        group: label.clone(),
        path: output.clone(),
        reason,
    };

    std::fs::create_dir_all(out_dir).map_err(|e| write_failure(e.to_string()))?;
    let mut merged = pdf::concatenate(docs).map_err(|e| write_failure(e.to_string()))?;
    let pages = pdf::page_count(&merged);
    pdf::save_atomic(&mut merged, &output).map_err(|e| write_failure(e.to_string()))?;

    if partial {
        warn!(
            "group {label} written as partial output {} missing={missing:?}",
            output.display()
        );
    } else {
        info!(
            "merged group {label} chunks={} pages={pages} output={}",
            group.files.len(),
            output.display()
        );
    }

    let mut removed = Vec::new();
    let mut cleanup_errors = Vec::new();
    if !partial && !opts.keep_originals {
        for f in &group.files {
            match std::fs::remove_file(&f.path) {
                Ok(()) => removed.push(f.path.clone()),
                Err(err) => {
                    warn!("could not remove {}: {err}", f.path.display());
                    cleanup_errors.push(format!("{}: {err}", f.path.display()));
                }
            }
        }
    }

    Ok(MergeOutcome {
        output,
        pages,
        partial,
        missing,
        removed,
        cleanup_errors,
    })
}

/// Discovers and merges every group in `dir`. One group failing does not stop
/// the others; each outcome lands in the summary.
pub fn merge_directory(
    dir: &Path,
    filter: &GroupFilter,
    opts: &MergeOptions,
) -> Result<MergeSummary> {
    let groups = discover_groups(dir, filter)?;
    let out_dir = opts.output_dir.clone().unwrap_or_else(|| dir.to_path_buf());

    if groups.is_empty() {
        info!("no chunk groups to merge in {}", dir.display());
    }

    let reports = groups
        .values()
        .map(|group| group_report(group, merge_group(group, &out_dir, opts)))
        .collect();

    Ok(MergeSummary {
        directory: dir.to_path_buf(),
        groups: reports,
    })
}

fn group_report(group: &Group, result: std::result::Result<MergeOutcome, MergeFailure>) -> GroupReport {
    let mut report = GroupReport {
        project: group.key.project.clone(),
        kind: group.key.kind,
        status: GroupStatus::Failed,
        output: None,
        chunk_count: group.files.len() as u32,
        expected_chunks: group.expected,
        pages: 0,
        missing: group.missing(),
        removed: Vec::new(),
        warnings: Vec::new(),
        error: None,
    };
    match result {
        Ok(outcome) => {
            report.status = if outcome.partial {
                GroupStatus::Partial
            } else {
                GroupStatus::Merged
            };
            report.output = Some(outcome.output);
            report.pages = outcome.pages;
            report.removed = outcome.removed;
            report.warnings = outcome.cleanup_errors;
        }
        Err(err) => {
            warn!("merge failed: {err}");
            report.error = Some(err.to_string());
        }
    }
    report
}
