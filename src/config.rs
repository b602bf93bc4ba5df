use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub translate: Translate,
    #[serde(default)]
    pub credentials: CredentialEnv,
    #[serde(default)]
    pub merge: Merge,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub resume: bool,
    pub keep_intermediates: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            resume: true,
            keep_intermediates: true,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".pdf-chunk-translate-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_input_pages: u32,
    /// Split when the page count exceeds this.
    pub split_over_pages: u32,
    /// Split when the file size exceeds this.
    pub split_over_bytes: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 2 * 1024 * 1024 * 1024,
            max_input_pages: 20000,
            split_over_pages: 50,
            split_over_bytes: 20_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunking {
    pub pages_per_chunk: u32,
    pub force_split: bool,
}
impl Default for Chunking {
    fn default() -> Self {
        Self {
            pages_per_chunk: 20,
            force_split: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translate {
    /// External translator executable.
    pub command: String,
    /// `default`, `openai`, `gemini`, or `claude`.
    pub engine: String,
    /// Empty means the engine's default model.
    pub model: String,
    pub source_lang: String,
    pub target_lang: String,
    pub chunk_timeout_seconds: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}
impl Default for Translate {
    fn default() -> Self {
        Self {
            command: "pdf2zh".into(),
            engine: "default".into(),
            model: "".into(),
            source_lang: "english".into(),
            target_lang: "japanese".into(),
            chunk_timeout_seconds: 1800,
            extra_args: Vec::new(),
        }
    }
}

/// Names of the environment variables holding each engine's API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnv {
    pub openai_env: String,
    pub gemini_env: String,
    pub claude_env: String,
}
impl Default for CredentialEnv {
    fn default() -> Self {
        Self {
            openai_env: "OPENAI_API_KEY".into(),
            gemini_env: "GOOGLE_API_KEY".into(),
            claude_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merge {
    /// Merge chunk outputs at the end of `run` when every chunk succeeded.
    pub auto_merge: bool,
    pub keep_originals: bool,
    /// Write `_merged_partial.pdf` for groups with missing chunks instead of failing them.
    pub allow_partial: bool,
    pub recursive: bool,
}
impl Default for Merge {
    fn default() -> Self {
        Self {
            auto_merge: true,
            keep_originals: false,
            allow_partial: false,
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_engine_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_engine_stderr: true,
            dump_effective_config: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
