//! # Flatpress CDR
//!
//! Content Disarm & Reconstruction for documents: the transformations that
//! run *inside* the sandboxed worker and produce the sanitized artifact.
//!
//! ## Philosophy
//!
//! > **"Don't detect the bomb. Rebuild without one."**
//!
//! Nothing in this crate classifies content as malicious. Instead, every
//! upload is driven through a chain of lossy transformations whose
//! composition yields the security guarantee:
//!
//! ```text
//! upload ──normalize──▶ PDF ──disarm──▶ inert PDF ──rasterize──▶ pixels
//!                                                                  │
//!                  validated artifact ◀──validate── re-emit ◀──────┘
//! ```
//!
//! | Stage | Module | Removes |
//! |-------|--------|---------|
//! | Normalize | [`normalize`] | macros (office conversion), EXIF/ICC (fresh pixel buffer) |
//! | Disarm | [`disarm`] | annotations, actions, scripts, embedded files, metadata |
//! | Pixel pass | [`raster`] + [`emit`] | everything that is not a pixel |
//! | Validate | [`validate`] | nothing — asserts the above held |
//!
//! The pixel round-trip is the security terminator: after it the document
//! contains raster images and page scaffolding, nothing else. The
//! structural disarm before it exists so even the intermediate artifact is
//! inert, and the validator behind it turns "should be clean" into a
//! checked invariant.

pub mod disarm;
pub mod emit;
mod error;
pub mod normalize;
pub mod pipeline;
pub mod raster;
pub mod validate;

pub use disarm::{disarm_document, disarm_file, DisarmSummary};
pub use emit::{emit_pixel_pdf, emit_single_image_pdf};
pub use error::{CdrError, Result};
pub use normalize::{classify, normalize_to_pdf, InputKind, IMAGE_DPI, OFFICE_TIMEOUT};
pub use pipeline::{sanitize_document, PipelineReport};
pub use raster::{rasterize_pages, RASTER_DPI};
pub use validate::{validate_output, ValidationReport};
