use crate::error::{Error, Result};
use crate::naming::OutputKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Translation provider handed to the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The tool's built-in service; needs no credential.
    Default,
    OpenAi,
    Gemini,
    Claude,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Default => "default",
            EngineKind::OpenAi => "openai",
            EngineKind::Gemini => "gemini",
            EngineKind::Claude => "claude",
        }
    }

    pub fn default_model(self) -> Option<&'static str> {
        match self {
            EngineKind::Default => None,
            EngineKind::OpenAi => Some("gpt-4o"),
            EngineKind::Gemini => Some("gemini-1.5-pro"),
            EngineKind::Claude => Some("claude-3-opus-20240229"),
        }
    }

    /// Service name understood by `pdf2zh -s`.
    pub fn service(self) -> Option<&'static str> {
        match self {
            EngineKind::Default => None,
            EngineKind::OpenAi => Some("openai"),
            EngineKind::Gemini => Some("gemini"),
            EngineKind::Claude => Some("anthropic"),
        }
    }

    /// Variable the external tool reads the API key from.
    pub fn service_env(self) -> Option<&'static str> {
        match self {
            EngineKind::Default => None,
            EngineKind::OpenAi => Some("OPENAI_API_KEY"),
            EngineKind::Gemini => Some("GEMINI_API_KEY"),
            EngineKind::Claude => Some("ANTHROPIC_API_KEY"),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(EngineKind::Default),
            "openai" | "chatgpt" => Ok(EngineKind::OpenAi),
            "gemini" | "google" => Ok(EngineKind::Gemini),
            "claude" | "anthropic" => Ok(EngineKind::Claude),
            other => Err(Error::InvalidParameters(format!("unknown engine: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub command: String,
    pub version: Option<String>,
    pub ok: bool,
    pub credentials_present: Vec<EngineKind>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub input_pdf: PathBuf,
    /// Final chunk outputs land here under the chunk naming convention.
    pub out_dir: PathBuf,
    pub project: String,
    pub chunk_index: u32,
    pub chunk_total: u32,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateOutput {
    pub outputs: Vec<(OutputKind, PathBuf)>,
    pub warnings: Vec<String>,
}
