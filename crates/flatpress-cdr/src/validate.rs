//! Output validation.
//!
//! Final gate before an artifact leaves the worker: asserts the structural
//! *absence* of the dangerous constructs the pipeline exists to remove.
//! The checks run in order and the first violation is fatal — the
//! controller destroys the output and fails the job.

use std::path::Path;

use lopdf::{Document, Object};
use tracing::debug;

use crate::error::{CdrError, Result};

/// Facts about a validated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    /// Page count of the artifact.
    pub pages: usize,
    /// Size on disk in bytes.
    pub bytes: u64,
}

/// Validate the final artifact at `path`.
///
/// Asserts, in order:
/// 1. the file exists and is nonzero,
/// 2. it parses as a PDF,
/// 3. the catalog name tree has no `/JavaScript` entry,
/// 4. the catalog name tree has no `/EmbeddedFiles` entry.
pub fn validate_output(path: &Path) -> Result<ValidationReport> {
    let meta = std::fs::metadata(path)
        .map_err(|_| CdrError::Validation("output file missing".into()))?;
    if meta.len() == 0 {
        return Err(CdrError::Validation("output file is empty".into()));
    }

    let doc = Document::load(path)
        .map_err(|e| CdrError::Validation(format!("invalid pdf structure: {e}")))?;

    if let Some(names) = catalog_names(&doc) {
        if names.has(b"JavaScript") {
            return Err(CdrError::Validation(
                "catalog name tree still carries /JavaScript".into(),
            ));
        }
        if names.has(b"EmbeddedFiles") {
            return Err(CdrError::Validation(
                "catalog name tree still carries /EmbeddedFiles".into(),
            ));
        }
    }

    let report = ValidationReport {
        pages: doc.get_pages().len(),
        bytes: meta.len(),
    };
    debug!(pages = report.pages, bytes = report.bytes, "output validated");
    Ok(report)
}

/// Resolve the catalog's `/Names` dictionary, inline or indirect.
fn catalog_names(doc: &Document) -> Option<&lopdf::Dictionary> {
    let root_id = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_dictionary(root_id).ok()?;
    match catalog.get(b"Names").ok()? {
        Object::Dictionary(names) => Some(names),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        _ => None,
    }
}
