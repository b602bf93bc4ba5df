//! Runs an external PDF translator (`pdf2zh` by default) once per chunk.

use super::{types::*, Engine};
use crate::{
    cancel::CancelToken,
    config::Config,
    credentials::Credentials,
    error::{Error, Result},
    lang::language_code,
    naming::{ChunkName, OutputKind},
};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DOCTOR_TIMEOUT: Duration = Duration::from_secs(30);
/// How long to wait for pipe readers after the translator was killed.
const KILL_GRACE: Duration = Duration::from_secs(2);

pub struct CommandEngine {
    command: PathBuf,
    kind: EngineKind,
    model: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    extra_args: Vec<String>,
    keep_stderr: bool,
    credentials_present: Vec<EngineKind>,
    cancel: CancelToken,
}

impl CommandEngine {
    /// Fails with a configuration error when the selected engine has no key.
    pub fn new(cfg: &Config, creds: &Credentials, cancel: CancelToken) -> Result<Self> {
        let kind: EngineKind = cfg.translate.engine.parse()?;
        let api_key = creds.require(kind)?.map(str::to_string);
        let model = Some(cfg.translate.model.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| kind.default_model().map(str::to_string));
        let command = cfg.translate.command.trim();
        if command.is_empty() {
            return Err(Error::Configuration("translate.command is empty".into()));
        }
        Ok(Self {
            command: PathBuf::from(command),
            kind,
            model,
            api_key,
            timeout: (cfg.translate.chunk_timeout_seconds > 0)
                .then(|| Duration::from_secs(cfg.translate.chunk_timeout_seconds)),
            extra_args: cfg.translate.extra_args.clone(),
            keep_stderr: cfg.debug.keep_engine_stderr,
            credentials_present: creds.available(),
            cancel,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    fn args(&self, req: &TranslateRequest, staging: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            req.input_pdf.clone().into(),
            "-li".into(),
            language_code(&req.source_lang).into(),
            "-lo".into(),
            language_code(&req.target_lang).into(),
            "-o".into(),
            staging.into(),
        ];
        if let Some(service) = self.kind.service() {
            let service_arg = match &self.model {
                Some(model) => format!("{service}:{model}"),
                None => service.to_string(),
            };
            args.push("-s".into());
            args.push(service_arg.into());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    fn spawn(&self, args: &[OsString]) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        isolate(&mut cmd);
        if let (Some(var), Some(key)) = (self.kind.service_env(), self.api_key.as_deref()) {
            cmd.env(var, key);
        }
        cmd.spawn()
    }
}

impl Engine for CommandEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        let mut diag = EngineDiag {
            command: self.command.display().to_string(),
            version: None,
            ok: false,
            credentials_present: self.credentials_present.clone(),
            error: None,
        };
        let child = match self.spawn(&["--version".into()]) {
            Ok(c) => c,
            Err(err) => {
                diag.error = Some(format!("spawn failed: {err}"));
                return Ok(diag);
            }
        };
        match wait_with_timeout(child, Some(DOCTOR_TIMEOUT), &self.cancel) {
            Ok(out) if out.status.success() => {
                diag.ok = true;
                diag.version = Some(String::from_utf8_lossy(&out.stdout).trim().to_string());
            }
            Ok(out) => {
                diag.error = Some(String::from_utf8_lossy(&out.stderr).trim().to_string());
            }
            Err(err) => diag.error = Some(err.to_string()),
        }
        Ok(diag)
    }

    fn translate_chunk(&self, req: &TranslateRequest) -> Result<TranslateOutput> {
        let index = req.chunk_index;
        let fail = |reason: String| Error::ChunkProcessing { index, reason };

        let staging = req
            .out_dir
            .join(format!(".staging-{}-{:03}", req.project, index));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .map_err(|e| fail(format!("clear staging {}: {e}", staging.display())))?;
        }
        std::fs::create_dir_all(&staging)
            .map_err(|e| fail(format!("create staging {}: {e}", staging.display())))?;

        let args = self.args(req, &staging);
        debug!(
            "engine run chunk={index} command={} args={:?} timeout={:?}",
            self.command.display(),
            args,
            self.timeout
        );
        let child = self
            .spawn(&args)
            .map_err(|e| fail(format!("spawn {}: {e}", self.command.display())))?;
        let output =
            wait_with_timeout(child, self.timeout, &self.cancel).map_err(|e| fail(e.to_string()))?;

        if self.keep_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("engine stderr chunk={index}: {}", stderr.trim());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "translator exited with {}: {}",
                output.status,
                tail(stderr.trim(), 2000)
            )));
        }

        let stem = req
            .input_pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mono = staging.join(format!("{stem}-mono.pdf"));
        let dual = staging.join(format!("{stem}-dual.pdf"));
        if !mono.exists() {
            return Err(fail(format!(
                "translator produced no translated output ({})",
                mono.display()
            )));
        }

        // Bilingual goes first: a translated output on disk implies the
        // bilingual one (when produced) is already in place.
        let mut outputs = Vec::new();
        let mut warnings = Vec::new();
        for (kind, src) in [(OutputKind::Bilingual, dual), (OutputKind::Translated, mono)] {
            if !src.exists() {
                let msg = format!("translator produced no {kind} output ({})", src.display());
                warn!("chunk {index}: {msg}");
                warnings.push(msg);
                continue;
            }
            let dst = req.out_dir.join(
                ChunkName::output(&req.project, kind, index, req.chunk_total).file_name(),
            );
            std::fs::rename(&src, &dst)
                .map_err(|e| fail(format!("move {} -> {}: {e}", src.display(), dst.display())))?;
            outputs.push((kind, dst));
        }

        if let Err(err) = std::fs::remove_dir_all(&staging) {
            warn!("could not remove staging {}: {err}", staging.display());
        }

        Ok(TranslateOutput { outputs, warnings })
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[derive(Debug)]
enum WaitError {
    Io(std::io::Error),
    TimedOut { after: Duration, stderr: String },
    Cancelled,
    ReaderPanicked,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Io(e) => write!(f, "waiting for translator: {e}"),
            WaitError::TimedOut { after, stderr } => {
                write!(f, "translator exceeded timeout ({after:?}); stderr: {}", tail(stderr, 2000))
            }
            WaitError::Cancelled => f.write_str("interrupted"),
            WaitError::ReaderPanicked => f.write_str("output reader thread panicked"),
        }
    }
}

fn wait_with_timeout(
    mut child: Child,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> std::result::Result<Output, WaitError> {
    // Drain pipes while waiting so a chatty translator can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout_reader));
    let stderr_thread = std::thread::spawn(move || drain(stderr_reader));

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(Output {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
            });
        }

        let timed_out = timeout.is_some_and(|t| start.elapsed() > t);
        if timed_out || cancel.is_cancelled() {
            kill_tree(&mut child);
            child.wait().map_err(WaitError::Io)?;
            // Helpers that escaped the process group may still hold the pipes.
            let deadline = Instant::now() + KILL_GRACE;
            let _ = join_until(stdout_thread, deadline);
            let stderr = join_until(stderr_thread, deadline).unwrap_or_default();
            if timed_out {
                let after = timeout.unwrap_or_default();
                warn!("translator timed out after {:?}", after);
                return Err(WaitError::TimedOut {
                    after,
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                });
            }
            return Err(WaitError::Cancelled);
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

fn join(
    handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::result::Result<Vec<u8>, WaitError> {
    handle
        .join()
        .map_err(|_| WaitError::ReaderPanicked)?
        .map_err(WaitError::Io)
}

/// Joins a reader thread unless it is still blocked at `deadline`, in which
/// case the thread is left to finish on its own.
fn join_until(
    handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>,
    deadline: Instant,
) -> Option<Vec<u8>> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    join(handle).ok()
}

/// Puts the translator in its own process group so a timeout can take down
/// wrapper shells and worker processes along with it.
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: plain signal delivery to the group created in `isolate`.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        r.read_to_end(&mut buf)?;
    }
    Ok(buf)
}
