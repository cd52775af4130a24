//! The in-worker sanitization pipeline.
//!
//! Sequences the four worker-side stages on one document:
//!
//! 1. normalize to the PDF substrate,
//! 2. structural disarm (non-fatal: a document the parser chokes on is
//!    copied forward, the pixel pass disarms it anyway),
//! 3. rasterize at 200 DPI,
//! 4. re-emit from pixels and validate.
//!
//! Everything intermediate lives in the scratch directory the caller
//! provides; only the final validated artifact lands on the output path.

use std::path::Path;

use tracing::{info, warn};

use crate::disarm::{disarm_file, DisarmSummary};
use crate::emit::emit_pixel_pdf;
use crate::error::Result;
use crate::normalize::normalize_to_pdf;
use crate::raster::rasterize_pages;
use crate::validate::validate_output;

/// What one pipeline run did.
#[derive(Debug, Clone, Copy)]
pub struct PipelineReport {
    /// Pages in the reconstructed artifact.
    pub pages: usize,
    /// What the structural disarm removed.
    pub disarm: DisarmSummary,
    /// True when the structural disarm failed and the document was carried
    /// forward undisarmed (the pixel pass still neutralized it).
    pub disarm_degraded: bool,
}

/// Run the full worker pipeline: `input` in, validated artifact at `output`.
pub async fn sanitize_document(input: &Path, output: &Path, scratch: &Path) -> Result<PipelineReport> {
    let substrate = scratch.join("substrate.pdf");
    normalize_to_pdf(input, &substrate).await?;

    let disarmed = scratch.join("disarmed.pdf");
    let (summary, disarm_degraded) = match disarm_file(&substrate, &disarmed) {
        Ok(summary) => (summary, false),
        Err(e) => {
            // Structural CDR is belt-and-braces; the raster round-trip is
            // the disarm of record. Carry the substrate forward.
            warn!(error = %e, "structural disarm failed, deferring to pixel pass");
            std::fs::copy(&substrate, &disarmed)?;
            (DisarmSummary::default(), true)
        }
    };

    let pages = rasterize_pages(&disarmed)?;
    emit_pixel_pdf(&pages, output)?;

    let report = validate_output(output)?;
    info!(
        pages = report.pages,
        bytes = report.bytes,
        disarm_degraded,
        "document sanitized"
    );

    Ok(PipelineReport {
        pages: report.pages,
        disarm: summary,
        disarm_degraded,
    })
}
