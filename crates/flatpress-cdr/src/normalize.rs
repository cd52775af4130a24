//! Format normalization.
//!
//! Brings any accepted upload onto a PDF substrate so the rest of the
//! pipeline only ever sees one format:
//!
//! - **PDF** passes through (the structural disarm still runs on it).
//! - **Images** are decoded, flattened over white, rewritten into a fresh
//!   pixel buffer (which drops EXIF and every ancillary chunk), and wrapped
//!   in a single-page PDF at 100 DPI.
//! - **Office documents and RTF/ODT** go through the office suite's
//!   headless converter; the format transformation discards macros and
//!   active content as a side effect.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use tokio::process::Command;
use tracing::{debug, info};

use crate::emit::emit_single_image_pdf;
use crate::error::{CdrError, Result};

/// Render density for image uploads.
pub const IMAGE_DPI: u32 = 100;

/// Wall-clock budget for one office conversion.
pub const OFFICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Converter binary, expected on the worker image.
const OFFICE_CONVERTER: &str = "libreoffice";

/// Input classes the normalizer can bring onto the PDF substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Already a PDF.
    Pdf,
    /// Raster image (jpg/jpeg/png).
    Image,
    /// Office document, RTF, ODT, or plain text routed through the
    /// office-suite converter.
    Office,
}

/// Classify a lowercase extension, `None` if outside the accepted set.
pub fn classify(extension: &str) -> Option<InputKind> {
    match extension {
        "pdf" => Some(InputKind::Pdf),
        "jpg" | "jpeg" | "png" => Some(InputKind::Image),
        "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "rtf" | "odt" => {
            Some(InputKind::Office)
        }
        _ => None,
    }
}

/// Normalize `input` onto the PDF substrate at `output`.
pub async fn normalize_to_pdf(input: &Path, output: &Path) -> Result<()> {
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let kind = classify(&extension).ok_or(CdrError::UnsupportedType(extension))?;

    match kind {
        InputKind::Pdf => {
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
        InputKind::Image => normalize_image(input, output),
        InputKind::Office => convert_office(input, output, OFFICE_TIMEOUT).await,
    }
}

/// Decode an image upload, strip it to bare pixels, and wrap it in a
/// single-page PDF.
pub fn normalize_image(input: &Path, output: &Path) -> Result<()> {
    let decoded = image::open(input)?;
    let flattened = flatten_to_rgb(&decoded);
    debug!(
        width = flattened.width(),
        height = flattened.height(),
        "image flattened to bare rgb"
    );
    emit_single_image_pdf(&flattened, IMAGE_DPI, output)
}

/// Composite any alpha over a white background and copy the pixels into a
/// freshly allocated RGB surface. The fresh buffer is what guarantees that
/// EXIF, ICC profiles, and ancillary chunks are gone: nothing but pixel
/// values crosses over.
fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut flat = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| -> u8 {
            ((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        flat.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flat
}

/// Convert an office document to PDF via the headless office suite.
pub async fn convert_office(input: &Path, output: &Path, timeout: Duration) -> Result<()> {
    let outdir = output.parent().unwrap_or_else(|| Path::new("."));

    let mut command = Command::new(OFFICE_CONVERTER);
    command
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(outdir)
        .arg(input)
        .kill_on_drop(true);

    let run = tokio::time::timeout(timeout, command.output()).await;
    let finished = match run {
        Err(_) => return Err(CdrError::ConversionTimeout(timeout.as_secs())),
        Ok(spawned) => spawned?,
    };

    if !finished.status.success() {
        return Err(CdrError::Conversion(format!(
            "converter exited with {}: {}",
            finished.status,
            String::from_utf8_lossy(&finished.stderr).trim()
        )));
    }

    let converted = discover_converted(input, outdir)?;
    if converted.as_path() != output {
        tokio::fs::rename(&converted, output).await?;
    }
    info!(input = %input.display(), "office conversion complete");
    Ok(())
}

/// Locate the converter's artifact: the entry in `outdir` named
/// `<input stem>.pdf`, asserted to exist exactly once. The converter is
/// known to emit auxiliary files on some inputs, so the directory is
/// enumerated rather than trusting a blind path join.
fn discover_converted(input: &Path, outdir: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| CdrError::Conversion("input has no file stem".into()))?;
    let expected = format!("{stem}.pdf");

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(outdir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy() == expected {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(CdrError::Conversion(format!(
            "converter produced no artifact named {expected}"
        ))),
        n => Err(CdrError::Conversion(format!(
            "converter artifact {expected} is ambiguous ({n} matches)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_classify_accepted_extensions() {
        assert_eq!(classify("pdf"), Some(InputKind::Pdf));
        assert_eq!(classify("jpeg"), Some(InputKind::Image));
        assert_eq!(classify("png"), Some(InputKind::Image));
        assert_eq!(classify("docx"), Some(InputKind::Office));
        assert_eq!(classify("rtf"), Some(InputKind::Office));
        assert_eq!(classify("txt"), Some(InputKind::Office));
    }

    #[test]
    fn test_classify_rejects_the_rest() {
        assert_eq!(classify("exe"), None);
        assert_eq!(classify("js"), None);
        assert_eq!(classify(""), None);
        // Classification is over lowercase extensions only.
        assert_eq!(classify("PDF"), None);
    }

    #[test]
    fn test_flatten_composites_alpha_over_white() {
        let mut rgba = image::RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0])); // fully transparent black
        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_flatten_keeps_opaque_pixels() {
        let mut rgba = image::RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_flatten_blends_partial_alpha() {
        let mut rgba = image::RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        let Rgb([r, g, b]) = *flat.get_pixel(0, 0);
        // Half-transparent black over white sits near mid-gray.
        assert!(r > 120 && r < 135, "r = {r}");
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_normalize_image_produces_loadable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        let output = dir.path().join("photo.pdf");

        image::RgbImage::from_pixel(40, 30, Rgb([1, 2, 3]))
            .save(&input)
            .unwrap();

        normalize_image(&input, &output).unwrap();

        let doc = lopdf::Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_discover_converted_requires_exact_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("/incoming/report.docx");

        let miss = discover_converted(input, dir.path());
        assert!(matches!(miss, Err(CdrError::Conversion(_))));

        std::fs::write(dir.path().join("report.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("report_aux.log"), b"noise").unwrap();

        let hit = discover_converted(input, dir.path()).unwrap();
        assert_eq!(hit, dir.path().join("report.pdf"));
    }

    #[tokio::test]
    async fn test_normalize_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("payload.exe");
        std::fs::write(&input, b"MZ").unwrap();

        let result = normalize_to_pdf(&input, &dir.path().join("out.pdf")).await;
        assert!(matches!(result, Err(CdrError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_normalize_passes_pdf_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("substrate.pdf");
        std::fs::write(&input, b"%PDF-1.4\nplaceholder").unwrap();

        normalize_to_pdf(&input, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.4\nplaceholder");
    }
}
