use crate::{
    chunk_plan::{ChunkPlan, PageRange, SplitPolicy},
    error::{Error, Result},
    manifest::{ManifestChunk, SplitManifest},
    naming::{project_identity, ChunkName},
    pdf,
    probe::DocumentInfo,
    util::{hash_file, now_rfc3339},
};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One independently translatable slice of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub total: u32,
    pub range: PageRange,
    pub path: PathBuf,
}

/// Splits `input` into `work_dir` when the policy asks for it.
///
/// `Ok(None)` means the document is small enough to process whole.
pub fn decide_and_split(
    input: &Path,
    policy: &SplitPolicy,
    work_dir: &Path,
) -> Result<Option<Vec<Chunk>>> {
    policy.validate()?;

    let file_bytes = std::fs::metadata(input)
        .map_err(|e| Error::invalid_document(input, e))?
        .len();
    let doc = pdf::load(input).map_err(|e| Error::invalid_document(input, e))?;
    let info = DocumentInfo {
        path: input.to_path_buf(),
        file_bytes,
        page_count: pdf::page_count(&doc),
    };
    if info.page_count == 0 {
        return Err(Error::invalid_document(input, "document has zero pages"));
    }

    if !policy.requires_split(info.page_count, info.file_bytes) {
        debug!(
            "no split needed pages={} bytes={}",
            info.page_count, info.file_bytes
        );
        return Ok(None);
    }

    let plan = ChunkPlan::from_page_count(info.page_count, policy.pages_per_chunk)?;
    let project = project_identity(input);
    split_document(&doc, &info, &project, &plan, work_dir).map(Some)
}

/// Writes one PDF per planned range plus the split manifest.
pub fn split_document(
    doc: &Document,
    info: &DocumentInfo,
    project: &str,
    plan: &ChunkPlan,
    work_dir: &Path,
) -> Result<Vec<Chunk>> {
    std::fs::create_dir_all(work_dir).map_err(|e| Error::io(work_dir, e))?;

    let total = plan.total();
    let mut chunks = Vec::with_capacity(plan.chunks.len());
    for (i, range) in plan.chunks.iter().enumerate() {
        let index = i as u32;
        let path = work_dir.join(ChunkName::source(project, index, total).file_name());
        let mut part = pdf::extract_range(doc, *range);
        let got = pdf::page_count(&part);
        if got != range.len() {
            return Err(Error::invalid_document(
                &info.path,
                format!(
                    "chunk {index} expected {} pages, extracted {got}",
                    range.len()
                ),
            ));
        }
        pdf::save_atomic(&mut part, &path).map_err(|e| Error::io(&path, e))?;
        debug!(
            "split chunk index={index} pages={}-{} path={}",
            range.start,
            range.end,
            path.display()
        );
        chunks.push(Chunk {
            index,
            total,
            range: *range,
            path,
        });
    }

    let manifest = SplitManifest {
        project: project.to_string(),
        source: info.path.clone(),
        source_sha256: hash_file(&info.path).map_err(|e| Error::invalid_document(&info.path, e))?,
        page_count: info.page_count,
        pages_per_chunk: plan.pages_per_chunk,
        created: now_rfc3339(),
        chunks: chunks
            .iter()
            .map(|c| ManifestChunk {
                index: c.index,
                range: c.range,
                file: file_name_of(&c.path),
            })
            .collect(),
    };
    manifest.write(work_dir)?;

    info!(
        "split project={project} pages={} chunks={total} dir={}",
        info.page_count,
        work_dir.display()
    );
    Ok(chunks)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
