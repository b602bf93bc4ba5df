#![cfg(unix)]

mod common;

use common::{labels, make_pdf, page_labels};
use pdf_chunk_translate::{
    cancel::CancelToken,
    config::Config,
    credentials::Credentials,
    engine::{command::CommandEngine, Engine, EngineKind, TranslateRequest},
    error::Error,
    naming::OutputKind,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FAKE_PDF2ZH: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "fake-pdf2zh 1.0"
  exit 0
fi
in="$1"; shift
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -s) echo "service=$2" >&2; shift 2 ;;
    *) shift ;;
  esac
done
stem=$(basename "$in" .pdf)
cp "$in" "$out/$stem-mono.pdf"
cp "$in" "$out/$stem-dual.pdf"
"#;

fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn request(input: &Path, out_dir: &Path) -> TranslateRequest {
    TranslateRequest {
        input_pdf: input.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        project: "paper".into(),
        chunk_index: 4,
        chunk_total: 9,
        source_lang: "english".into(),
        target_lang: "japanese".into(),
    }
}

#[test]
fn selected_engine_requires_credentials() {
    let mut cfg = Config::default();
    cfg.translate.engine = "claude".into();
    let err = CommandEngine::new(&cfg, &Credentials::default(), CancelToken::new()).err();
    assert!(matches!(err, Some(Error::Configuration(_))));

    cfg.translate.engine = "deepl".into();
    let err = CommandEngine::new(&cfg, &Credentials::default(), CancelToken::new()).err();
    assert!(matches!(err, Some(Error::InvalidParameters(_))));

    cfg.translate.engine = "openai".into();
    let creds = Credentials::from_pairs([(EngineKind::OpenAi, "sk-test")]);
    let engine = CommandEngine::new(&cfg, &creds, CancelToken::new()).unwrap();
    assert_eq!(engine.kind(), EngineKind::OpenAi);
}

// Single test: spawning freshly written scripts from parallel tests can hit ETXTBSY.
#[test]
fn runs_external_translator_per_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let script = install_script(tmp.path(), "fake-pdf2zh", FAKE_PDF2ZH);
    let input = tmp.path().join("paper_source_chunk_004_of_009.pdf");
    make_pdf(&input, &labels("c", 0..2));
    let out_dir = tmp.path().join("chunks");
    std::fs::create_dir_all(&out_dir).unwrap();

    let mut cfg = Config::default();
    cfg.translate.command = script.display().to_string();
    cfg.translate.chunk_timeout_seconds = 20;

    let engine = CommandEngine::new(&cfg, &Credentials::default(), CancelToken::new()).unwrap();
    let diag = engine.doctor().unwrap();
    assert!(diag.ok);
    assert_eq!(diag.version.as_deref(), Some("fake-pdf2zh 1.0"));

    let out = engine.translate_chunk(&request(&input, &out_dir)).unwrap();
    assert_eq!(out.outputs.len(), 2);
    let translated = out_dir.join("paper_translated_chunk_004_of_009.pdf");
    let bilingual = out_dir.join("paper_bilingual_chunk_004_of_009.pdf");
    assert!(out.outputs.contains(&(OutputKind::Translated, translated.clone())));
    assert!(out.outputs.contains(&(OutputKind::Bilingual, bilingual.clone())));
    assert_eq!(page_labels(&translated), labels("c", 0..2));
    assert!(!out_dir.join(".staging-paper-004").exists());

    // A translator that outlives its timeout fails only this chunk. The shell
    // keeps `sleep` as a grandchild holding the output pipes; the whole
    // process group must go down with it.
    cfg.translate.chunk_timeout_seconds = 1;
    let slow = install_script(tmp.path(), "slow-pdf2zh", "#!/bin/sh\nsleep 10\necho late\n");
    cfg.translate.command = slow.display().to_string();
    let engine = CommandEngine::new(&cfg, &Credentials::default(), CancelToken::new()).unwrap();
    let started = Instant::now();
    let err = engine.translate_chunk(&request(&input, &out_dir)).unwrap_err();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(6), "timeout did not bound the wait: {elapsed:?}");
    match err {
        Error::ChunkProcessing { index, reason } => {
            assert_eq!(index, 4);
            assert!(reason.contains("timeout"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Non-zero exit is a chunk failure too.
    let broken = install_script(tmp.path(), "broken-pdf2zh", "#!/bin/sh\necho boom >&2\nexit 3\n");
    cfg.translate.command = broken.display().to_string();
    let engine = CommandEngine::new(&cfg, &Credentials::default(), CancelToken::new()).unwrap();
    let err = engine.translate_chunk(&request(&input, &out_dir)).unwrap_err();
    assert!(err.to_string().contains("boom"), "{err}");
}
