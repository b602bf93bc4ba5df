use crate::{
    config::Config,
    error::{Error, Result},
    pdf,
};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub file_bytes: u64,
    pub page_count: u32,
}

/// Opens `input`, enforcing the configured limits. The parsed document is
/// returned so callers that split do not parse twice.
pub fn probe_pdf(cfg: &Config, input: &Path) -> Result<(DocumentInfo, Document)> {
    let meta = std::fs::metadata(input).map_err(|e| Error::invalid_document(input, e))?;
    let file_bytes = meta.len();
    if file_bytes > cfg.limits.max_input_file_bytes {
        return Err(Error::invalid_document(
            input,
            format!("exceeds max_input_file_bytes: {file_bytes}"),
        ));
    }

    let doc = pdf::load(input).map_err(|e| Error::invalid_document(input, e))?;
    let page_count = pdf::page_count(&doc);

    if page_count > cfg.limits.max_input_pages {
        return Err(Error::invalid_document(
            input,
            format!("exceeds max_input_pages: {page_count}"),
        ));
    }
    if page_count == 0 {
        return Err(Error::invalid_document(input, "document has zero pages"));
    }

    Ok((
        DocumentInfo {
            path: input.to_path_buf(),
            file_bytes,
            page_count,
        },
        doc,
    ))
}
