use crate::{
    cancel::CancelToken,
    chunk_plan::{ChunkPlan, SplitPolicy},
    config::Config,
    engine::{Engine, TranslateRequest},
    merger::{self, GroupFilter, MergeOptions},
    naming::{merged_file_name, project_identity, ChunkName, OutputKind},
    probe,
    report::{ChunkReport, ChunkStatus, RunReport, EXIT_OK},
    splitter::{self, Chunk},
    util::ensure_dir,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
    cancel: CancelToken,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E, cancel: CancelToken) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
            cancel,
        }
    }

    /// Probe, split, translate every chunk, then merge.
    ///
    /// Invalid input is an error. Chunk and merge failures are recorded in the
    /// report and never stop sibling chunks or groups.
    pub fn run_job(&self, input: &Path, job_dir: &Path) -> Result<RunReport> {
        let started = Instant::now();
        let policy = SplitPolicy::from_config(&self.cfg);
        policy.validate()?;

        let (info, doc) = probe::probe_pdf(&self.cfg, input)?;
        let project = project_identity(input);
        let job_id = job_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            "probe project={project} page_count={} file_bytes={}",
            info.page_count, info.file_bytes
        );

        let chunks_dir = job_dir.join("chunks");
        let final_dir = job_dir.join("final");
        ensure_dir(&chunks_dir)?;
        ensure_dir(&final_dir)?;

        let split = policy.requires_split(info.page_count, info.file_bytes);
        let chunks = if split {
            let plan = ChunkPlan::from_page_count(info.page_count, policy.pages_per_chunk)?;
            debug!(?plan, "chunk plan");
            splitter::split_document(&doc, &info, &project, &plan, &chunks_dir)
                .with_context(|| format!("splitting {}", input.display()))?
        } else {
            let plan = ChunkPlan::single(info.page_count);
            vec![Chunk {
                index: 0,
                total: 1,
                range: plan.chunks[0],
                path: input.to_path_buf(),
            }]
        };
        drop(doc);

        let mut report = RunReport {
            job_id,
            project: project.clone(),
            input: info,
            engine: self.cfg.translate.engine.clone(),
            split,
            chunk_reports: Vec::new(),
            merge: None,
            merge_skipped: None,
        };

        let merged_translated =
            final_dir.join(merged_file_name(&project, OutputKind::Translated, false));
        if self.cfg.global.resume && merged_translated.exists() {
            info!("already merged: {}", merged_translated.display());
            report.chunk_reports = chunks
                .iter()
                .map(|c| self.chunk_report(&project, c, ChunkStatus::Resumed))
                .collect();
        } else {
            report.chunk_reports = chunks
                .iter()
                .map(|c| self.process_chunk(&project, c, &chunks_dir))
                .collect();
        }

        let failed = report.failed_chunks();
        if !failed.is_empty() {
            warn!("{} of {} chunks did not complete: {failed:?}", failed.len(), chunks.len());
        }

        if !self.cfg.merge.auto_merge {
            report.merge_skipped = Some("auto_merge disabled".into());
        } else if !failed.is_empty() {
            report.merge_skipped = Some(format!("chunks not translated: {failed:?}"));
        } else {
            let pending =
                pending_kinds(&chunks_dir, &final_dir, &project, self.cfg.global.resume)?;
            if pending.is_empty() {
                report.merge_skipped = Some(format!(
                    "merged output already present in {}",
                    final_dir.display()
                ));
            } else {
                let filter = GroupFilter {
                    project: Some(project.clone()),
                    kind: match pending.as_slice() {
                        [only] => Some(*only),
                        _ => None,
                    },
                    recursive: false,
                };
                let opts = MergeOptions {
                    output_dir: Some(final_dir.clone()),
                    keep_originals: self.cfg.merge.keep_originals,
                    allow_partial: false,
                };
                report.merge = Some(merger::merge_directory(&chunks_dir, &filter, &opts)?);
            }
        }

        if split && report.exit_code() == EXIT_OK && !self.cfg.global.keep_intermediates {
            cleanup_split_chunks(&chunks);
        }

        info!(
            "job done project={project} chunks={} failed={} elapsed={:?}",
            chunks.len(),
            failed.len(),
            started.elapsed()
        );
        Ok(report)
    }

    fn process_chunk(&self, project: &str, chunk: &Chunk, out_dir: &Path) -> ChunkReport {
        if self.cancel.is_cancelled() {
            return self.chunk_report(project, chunk, ChunkStatus::Cancelled);
        }

        let translated = out_dir.join(
            ChunkName::output(project, OutputKind::Translated, chunk.index, chunk.total)
                .file_name(),
        );
        if self.cfg.global.resume && translated.exists() {
            info!("chunk {} already translated; skipping", chunk.index);
            let mut r = self.chunk_report(project, chunk, ChunkStatus::Resumed);
            r.outputs = existing_outputs(project, chunk, out_dir);
            return r;
        }

        info!(
            "chunk index={} of={} pages={}-{} input={}",
            chunk.index,
            chunk.total,
            chunk.range.start,
            chunk.range.end,
            chunk.path.display()
        );
        let req = TranslateRequest {
            input_pdf: chunk.path.clone(),
            out_dir: out_dir.to_path_buf(),
            project: project.to_string(),
            chunk_index: chunk.index,
            chunk_total: chunk.total,
            source_lang: self.cfg.translate.source_lang.clone(),
            target_lang: self.cfg.translate.target_lang.clone(),
        };

        match self.engine.translate_chunk(&req) {
            Ok(out) => {
                let mut r = self.chunk_report(project, chunk, ChunkStatus::Translated);
                r.outputs = out.outputs.into_iter().map(|(_, p)| p).collect();
                r.warnings = out.warnings;
                r
            }
            Err(err) => {
                warn!("chunk {} failed: {err}", chunk.index);
                let status = if self.cancel.is_cancelled() {
                    ChunkStatus::Cancelled
                } else {
                    ChunkStatus::Failed
                };
                let mut r = self.chunk_report(project, chunk, status);
                r.error = Some(err.to_string());
                r
            }
        }
    }

    fn chunk_report(&self, project: &str, chunk: &Chunk, status: ChunkStatus) -> ChunkReport {
        ChunkReport {
            project: project.to_string(),
            chunk_index: chunk.index,
            chunk_total: chunk.total,
            start_page: chunk.range.start,
            end_page: chunk.range.end,
            status,
            outputs: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }
}

fn existing_outputs(project: &str, chunk: &Chunk, out_dir: &Path) -> Vec<std::path::PathBuf> {
    OutputKind::ALL
        .iter()
        .map(|&k| out_dir.join(ChunkName::output(project, k, chunk.index, chunk.total).file_name()))
        .filter(|p| p.exists())
        .collect()
}

/// Output kinds with chunk files still on disk. When resuming, kinds that
/// already have a merged output are left alone.
fn pending_kinds(
    chunks_dir: &Path,
    final_dir: &Path,
    project: &str,
    resume: bool,
) -> Result<Vec<OutputKind>> {
    let filter = GroupFilter {
        project: Some(project.to_string()),
        kind: None,
        recursive: false,
    };
    let groups = merger::discover_groups(chunks_dir, &filter)?;
    Ok(groups
        .keys()
        .map(|k| k.kind)
        .filter(|&k| !resume || !final_dir.join(merged_file_name(project, k, false)).exists())
        .collect())
}

fn cleanup_split_chunks(chunks: &[Chunk]) {
    for c in chunks {
        match std::fs::remove_file(&c.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("could not remove split chunk {}: {err}", c.path.display()),
        }
    }
}
