//! Chunk filename convention shared by the splitter, the engines, and the merger.
//!
//! Source chunks: `{project}_source_chunk_{index:03}_of_{total:03}.pdf`
//! Outputs:       `{project}_{kind}_chunk_{index:03}_of_{total:03}.pdf`
//! Merged:        `{project}_{kind}_merged.pdf` (or `_merged_partial.pdf`)
//!
//! Parsing is anchored at the end of the name, so a project may itself contain
//! underscores or the words `chunk`, `translated`, `bilingual`.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<project>.+)_(?P<kind>translated|bilingual)_chunk_(?P<index>\d+)_of_(?P<total>\d+)\.(?i:pdf)$",
    )
    .expect("static output chunk regex")
});

/// Largest chunk count a filename may claim. Names above it are not chunks.
pub const MAX_CHUNK_TOTAL: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Translated,
    Bilingual,
}

impl OutputKind {
    pub const ALL: [OutputKind; 2] = [OutputKind::Translated, OutputKind::Bilingual];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Translated => "translated",
            OutputKind::Bilingual => "bilingual",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "translated" => Ok(OutputKind::Translated),
            "bilingual" => Ok(OutputKind::Bilingual),
            other => Err(Error::InvalidParameters(format!("unknown output kind: {other}"))),
        }
    }
}

/// `both` (or empty) means no filter.
pub fn parse_kind_filter(raw: &str) -> Result<Option<OutputKind>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("both") {
        return Ok(None);
    }
    raw.parse().map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkName {
    pub project: String,
    /// `None` for split source chunks.
    pub kind: Option<OutputKind>,
    pub index: u32,
    pub total: u32,
}

impl ChunkName {
    pub fn source(project: &str, index: u32, total: u32) -> Self {
        Self {
            project: project.to_string(),
            kind: None,
            index,
            total,
        }
    }

    pub fn output(project: &str, kind: OutputKind, index: u32, total: u32) -> Self {
        Self {
            project: project.to_string(),
            kind: Some(kind),
            index,
            total,
        }
    }

    pub fn file_name(&self) -> String {
        let tag = self.kind.map(OutputKind::as_str).unwrap_or("source");
        format!(
            "{}_{}_chunk_{:03}_of_{:03}.pdf",
            self.project, tag, self.index, self.total
        )
    }

    /// Parses a translated/bilingual chunk filename. Anything else is `None`,
    /// including names whose index is not below the total or whose total is
    /// zero or above [`MAX_CHUNK_TOTAL`].
    pub fn parse_output(file_name: &str) -> Option<Self> {
        let file_name: String = file_name.nfkc().collect();
        let caps = OUTPUT_RE.captures(&file_name)?;
        let kind = caps.name("kind")?.as_str().parse().ok()?;
        let index: u32 = caps.name("index")?.as_str().parse().ok()?;
        let total: u32 = caps.name("total")?.as_str().parse().ok()?;
        if total == 0 || total > MAX_CHUNK_TOTAL || index >= total {
            return None;
        }
        Some(Self {
            project: caps.name("project")?.as_str().to_string(),
            kind: Some(kind),
            index,
            total,
        })
    }
}

pub fn merged_file_name(project: &str, kind: OutputKind, partial: bool) -> String {
    if partial {
        format!("{project}_{kind}_merged_partial.pdf")
    } else {
        format!("{project}_{kind}_merged.pdf")
    }
}

pub fn manifest_file_name(project: &str) -> String {
    format!("{project}.manifest.json")
}

/// Project identity for a source document: NFKC-normalized file stem.
///
/// Normalizing here and in `parse_output` keeps NFD filenames (macOS) grouped
/// with the names we wrote.
pub fn project_identity(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let norm: String = stem.nfkc().collect::<String>().trim().to_string();
    if norm.is_empty() {
        "document".to_string()
    } else {
        norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_round_trips() {
        let name = ChunkName::output("paper", OutputKind::Bilingual, 7, 12);
        assert_eq!(name.file_name(), "paper_bilingual_chunk_007_of_012.pdf");
        assert_eq!(ChunkName::parse_output(&name.file_name()), Some(name));
    }

    #[test]
    fn project_may_contain_delimiters() {
        let parsed =
            ChunkName::parse_output("my_chunk_translated_notes_translated_chunk_002_of_004.pdf")
                .unwrap();
        assert_eq!(parsed.project, "my_chunk_translated_notes");
        assert_eq!(parsed.kind, Some(OutputKind::Translated));
        assert_eq!(parsed.index, 2);
        assert_eq!(parsed.total, 4);
    }

    #[test]
    fn source_and_merged_names_are_not_outputs() {
        let src = ChunkName::source("foo_translated", 0, 3).file_name();
        assert_eq!(src, "foo_translated_source_chunk_000_of_003.pdf");
        assert!(ChunkName::parse_output(&src).is_none());
        assert!(ChunkName::parse_output(&merged_file_name("foo", OutputKind::Translated, false)).is_none());
        assert!(ChunkName::parse_output("notes.txt").is_none());
    }

    #[test]
    fn wide_indices_parse_numerically() {
        let parsed = ChunkName::parse_output("book_translated_chunk_1000_of_1200.PDF").unwrap();
        assert_eq!(parsed.index, 1000);
        assert_eq!(parsed.total, 1200);
    }

    #[test]
    fn out_of_range_numbers_are_not_chunks() {
        for name in [
            "junk_translated_chunk_4294967295_of_001.pdf",
            "junk_translated_chunk_99999999999_of_001.pdf",
            "junk_translated_chunk_000_of_999999999.pdf",
            "junk_translated_chunk_003_of_003.pdf",
            "junk_translated_chunk_000_of_000.pdf",
        ] {
            assert!(ChunkName::parse_output(name).is_none(), "{name}");
        }
    }

    #[test]
    fn kind_filter() {
        assert_eq!(parse_kind_filter("both").unwrap(), None);
        assert_eq!(parse_kind_filter("Translated").unwrap(), Some(OutputKind::Translated));
        assert!(matches!(parse_kind_filter("mono"), Err(Error::InvalidParameters(_))));
    }
}
