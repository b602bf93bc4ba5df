use crate::{
    cancel::CancelToken,
    chunk_plan::{ChunkPlan, SplitPolicy},
    config::Config,
    credentials::Credentials,
    engine::{command::CommandEngine, Engine},
    merger::{self, GroupFilter, MergeOptions},
    naming::{parse_kind_filter, project_identity},
    pipeline::Pipeline,
    report::{EXIT_FAILED, EXIT_OK},
    splitter,
    util::{ensure_dir, hash_file, looks_like_url, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_CONFIG: &str = "pdf-chunk-translate.toml";
const EXAMPLE_CONFIG: &str = "pdf-chunk-translate.example.toml";
const LOG_FILE: &str = "pdf-chunk-translate.log";

#[derive(Parser, Debug)]
#[command(name = "pdf-chunk-translate")]
#[command(about = "Chunked PDF translation orchestrator (pdf2zh + split + resumable merge)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdf-chunk-translate.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the translator command and report which credentials are present.
    Doctor {},
    /// Print the chunk plan for a PDF without writing anything.
    Plan {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        pages_per_chunk: Option<u32>,
        #[arg(long)]
        force_split: bool,
    },
    /// Split a PDF into chunk files.
    Split {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        pages_per_chunk: Option<u32>,
        #[arg(long)]
        force_split: bool,
    },
    /// Split, translate every chunk, and merge the results.
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(short = 's', long)]
        source_lang: Option<String>,
        #[arg(short = 't', long)]
        target_lang: Option<String>,
        /// default, openai, gemini, or claude.
        #[arg(short = 'e', long)]
        engine: Option<String>,
        #[arg(short = 'm', long)]
        model: Option<String>,
        #[arg(long)]
        pages_per_chunk: Option<u32>,
        #[arg(long)]
        force_split: bool,
        #[arg(long)]
        no_merge: bool,
    },
    /// Merge translated chunk files found in a directory.
    Merge {
        directory: PathBuf,
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,
        #[arg(short = 'k', long)]
        keep_originals: bool,
        #[arg(short = 'p', long)]
        project: Option<String>,
        /// translated, bilingual, or both.
        #[arg(short = 't', long = "type", default_value = "both")]
        kind: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        allow_partial: bool,
    },
}

/// Runs a subcommand and returns the process exit code.
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            doctor(&cfg)
        }
        Command::Plan {
            input,
            pages_per_chunk,
            force_split,
        } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            let cfg = with_chunking(&cfg, *pages_per_chunk, *force_split);
            plan(&cfg, input)
        }
        Command::Split {
            input,
            out_dir,
            pages_per_chunk,
            force_split,
        } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            let cfg = with_chunking(&cfg, *pages_per_chunk, *force_split);
            split(&cfg, input, out_dir.as_deref())
        }
        Command::Run {
            input,
            out_dir,
            source_lang,
            target_lang,
            engine,
            model,
            pages_per_chunk,
            force_split,
            no_merge,
        } => {
            let mut cfg = with_chunking(&cfg, *pages_per_chunk, *force_split);
            if let Some(v) = source_lang {
                cfg.translate.source_lang = v.clone();
            }
            if let Some(v) = target_lang {
                cfg.translate.target_lang = v.clone();
            }
            if let Some(v) = engine {
                cfg.translate.engine = v.clone();
            }
            if let Some(v) = model {
                cfg.translate.model = v.clone();
            }
            if *no_merge {
                cfg.merge.auto_merge = false;
            }
            run(&args, &cfg, input, out_dir.as_deref())
        }
        Command::Merge {
            directory,
            output_dir,
            keep_originals,
            project,
            kind,
            recursive,
            allow_partial,
        } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            let filter = GroupFilter {
                project: project.clone(),
                kind: parse_kind_filter(kind)?,
                recursive: *recursive || cfg.merge.recursive,
            };
            let opts = MergeOptions {
                output_dir: output_dir.clone(),
                keep_originals: *keep_originals || cfg.merge.keep_originals,
                allow_partial: *allow_partial || cfg.merge.allow_partial,
            };
            merge(&cfg, directory, &filter, &opts)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    [DEFAULT_CONFIG, EXAMPLE_CONFIG]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn with_chunking(cfg: &Config, pages_per_chunk: Option<u32>, force_split: bool) -> Config {
    let mut cfg = cfg.clone();
    if let Some(n) = pages_per_chunk {
        cfg.chunking.pages_per_chunk = n;
    }
    cfg.chunking.force_split |= force_split;
    cfg
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<i32> {
    let creds = Credentials::from_env(&cfg.credentials);
    // Doctor reports on credentials rather than requiring them.
    let mut probe_cfg = cfg.clone();
    probe_cfg.translate.engine = "default".into();
    let engine = CommandEngine::new(&probe_cfg, &creds, CancelToken::new())?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(if diag.ok { EXIT_OK } else { EXIT_FAILED })
}

fn plan(cfg: &Config, input: &Path) -> Result<i32> {
    validate_input(cfg, input)?;
    warn_if_no_extension(input);
    let policy = SplitPolicy::from_config(cfg);
    policy.validate()?;
    let (info, _doc) = crate::probe::probe_pdf(cfg, input)?;
    let split = policy.requires_split(info.page_count, info.file_bytes);
    let plan = if split {
        ChunkPlan::from_page_count(info.page_count, policy.pages_per_chunk)?
    } else {
        ChunkPlan::single(info.page_count)
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": info,
            "project": project_identity(input),
            "split": split,
            "plan": plan,
        }))?
    );
    Ok(EXIT_OK)
}

fn split(cfg: &Config, input: &Path, out_dir: Option<&Path>) -> Result<i32> {
    validate_input(cfg, input)?;
    warn_if_no_extension(input);
    let policy = SplitPolicy::from_config(cfg);
    let work_dir = out_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(&cfg.paths.work_dir).join(project_identity(input)));
    let chunks = splitter::decide_and_split(input, &policy, &work_dir)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "split": chunks.is_some(),
            "work_dir": work_dir,
            "chunks": chunks.unwrap_or_default(),
        }))?
    );
    Ok(EXIT_OK)
}

fn run(args: &Args, cfg: &Config, input: &Path, out_override: Option<&Path>) -> Result<i32> {
    validate_input(cfg, input)?;

    // Credentials are checked before any work starts.
    let creds = Credentials::from_env(&cfg.credentials);
    let cancel = CancelToken::new();
    let engine = CommandEngine::new(cfg, &creds, cancel.clone())?;

    let input_hash = hash_file(input).with_context(|| format!("hashing input: {}", input.display()))?;
    let settings = format!(
        "{}:{}:{}:{}:{}:{}:{}",
        input_hash,
        cfg.chunking.pages_per_chunk,
        cfg.chunking.force_split,
        engine.kind(),
        cfg.translate.model,
        cfg.translate.source_lang,
        cfg.translate.target_lang,
    );
    let job_id = sha256_hex(settings.as_bytes());
    let project = project_identity(input);

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let job_dir = out_root.join(format!("{project}-{}", &job_id[..12]));

    if job_dir.exists() && !cfg.global.resume {
        return Err(anyhow!(
            "job_dir already exists and resume=false: {}",
            job_dir.display()
        ));
    }

    ensure_dir(&job_dir)?;
    ensure_dir(&job_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&job_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;
    warn_if_no_extension(input);

    if let Err(err) = cancel.install_ctrlc() {
        warn!("could not install interrupt handler: {err}");
    }

    info!("job_id={job_id} out={}", job_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(job_dir.join("effective-config.toml"), raw)?;
    }

    let started = now_rfc3339();
    let pipeline = Pipeline::new(cfg, engine, cancel);
    let report = pipeline.run_job(input, &job_dir)?;

    std::fs::write(
        job_dir.join("report.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "started": started,
            "finished": now_rfc3339(),
            "report": &report,
        }))?,
    )?;

    let code = report.exit_code();
    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": job_id,
                "job_dir": job_dir,
                "exit_code": code,
                "failed_chunks": report.failed_chunks(),
                "merge": report.merge,
                "merge_skipped": report.merge_skipped,
            }))?
        );
    }
    Ok(code)
}

fn merge(cfg: &Config, directory: &Path, filter: &GroupFilter, opts: &MergeOptions) -> Result<i32> {
    let summary = merger::merge_directory(directory, filter, opts)
        .with_context(|| format!("merging {}", directory.display()))?;

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.is_empty() {
        if let Some(project) = &filter.project {
            error!("no chunk groups found for project {project} in {}", directory.display());
            return Ok(EXIT_FAILED);
        }
        info!("nothing to merge in {}", directory.display());
        return Ok(EXIT_OK);
    }

    info!(
        "merged {}/{} groups in {}",
        summary.merged(),
        summary.groups.len(),
        directory.display()
    );
    Ok(summary.exit_code())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        if !ext.eq_ignore_ascii_case("pdf") {
            return Err(anyhow!("input is not a PDF: {}", input.display()));
        }
    }

    Ok(())
}

/// Logged separately from `validate_input`, which runs before `run` has a log sink.
fn warn_if_no_extension(input: &Path) {
    if input.extension().is_none() {
        warn!("input has no extension; assuming PDF: {}", input.display());
    }
}

fn resolve_log_path(cfg: &Config, job_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(job_dir) = job_dir {
        return Some(job_dir.join("logs").join(LOG_FILE));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join(LOG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let buf = Captured::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn extensionless_input_warns_once_logging_is_up() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("scan");
        std::fs::write(&input, "x").unwrap();
        let cfg = Config::default();

        let logs = captured_logs(|| validate_input(&cfg, &input).unwrap());
        assert!(logs.is_empty(), "{logs}");

        let logs = captured_logs(|| warn_if_no_extension(&input));
        assert!(logs.contains("no extension"), "{logs}");

        let text = tmp.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();
        assert!(validate_input(&cfg, &text).is_err());
    }
}
