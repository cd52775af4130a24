//! Page rasterization.
//!
//! Renders every page of the disarmed PDF into plain RGB pixel buffers.
//! This is the input half of the pixel round-trip: whatever structure the
//! source document had — text objects, object streams, fonts, incremental
//! updates — none of it survives a trip through a framebuffer.
//!
//! 200 DPI is the fidelity knob, not a security parameter: a higher value
//! yields larger output and no additional safety.

use std::path::Path;

use image::RgbImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{CdrError, Result};

/// Render resolution for the pixel pass.
pub const RASTER_DPI: f32 = 200.0;

/// PDF user space runs at 72 points per inch.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Rasterize every page of `path` at [`RASTER_DPI`].
///
/// Returns the page image sequence in page order. A zero-page document
/// yields an empty sequence, which is not an error.
pub fn rasterize_pages(path: &Path) -> Result<Vec<RgbImage>> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| CdrError::Rasterize(format!("pdfium unavailable: {e}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| CdrError::Rasterize(format!("could not open document: {e}")))?;

    let config = PdfRenderConfig::new().scale_page_by_factor(RASTER_DPI / PDF_POINTS_PER_INCH);

    let mut pages = Vec::new();
    for page in document.pages().iter() {
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| CdrError::Rasterize(format!("page render failed: {e}")))?;
        pages.push(bitmap.as_image().to_rgb8());
    }

    debug!(pages = pages.len(), dpi = RASTER_DPI, "rasterized document");
    Ok(pages)
}
