//! Source classification and page rendering
//!
//! Image and PDF sources become a list of page images ready for the
//! extractor. Each page's longest side is bounded by `max_dim` to keep
//! the extractor payload (and cost) down.

use image::{imageops::FilterType, DynamicImage, ImageBuffer, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// How a source file is ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    /// xlsx, xlsm, xlsb, xls, ods
    Workbook,
    /// Single-page raster image with its MIME type
    Image(&'static str),
    Pdf,
}

impl SourceKind {
    /// Classify by file extension, then by magic bytes
    pub fn detect(name: &str, bytes: &[u8]) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        if let Some(kind) = extension.as_deref().and_then(Self::from_extension) {
            return Some(kind);
        }

        let sniffed = infer::get(bytes)?;
        match sniffed.mime_type() {
            "application/pdf" => Some(SourceKind::Pdf),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(SourceKind::Workbook),
            mime => image_mime(mime).map(SourceKind::Image),
        }
    }

    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "csv" => Some(SourceKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SourceKind::Workbook),
            "pdf" => Some(SourceKind::Pdf),
            "png" => Some(SourceKind::Image("image/png")),
            "jpg" | "jpeg" => Some(SourceKind::Image("image/jpeg")),
            "webp" => Some(SourceKind::Image("image/webp")),
            "gif" => Some(SourceKind::Image("image/gif")),
            "bmp" => Some(SourceKind::Image("image/bmp")),
            "tif" | "tiff" => Some(SourceKind::Image("image/tiff")),
            _ => None,
        }
    }
}

fn image_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("image/png"),
        "image/jpeg" => Some("image/jpeg"),
        "image/webp" => Some("image/webp"),
        "image/gif" => Some("image/gif"),
        "image/bmp" => Some("image/bmp"),
        "image/tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// One page ready for extraction
#[derive(Debug, Clone)]
pub struct PageImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encode failed: {0}")]
    Encode(String),

    #[error("PDF render failed: {0}")]
    Pdf(String),
}

/// Prepare a raster image, downscaling when it exceeds `max_dim`
///
/// Formats the extractor accepts directly (png, jpeg, webp) pass through
/// untouched when already small enough; anything else is re-encoded as JPEG.
pub fn prepare_image(
    mime: &'static str,
    bytes: Vec<u8>,
    max_dim: u32,
) -> Result<PageImage, PageError> {
    let image = image::load_from_memory(&bytes).map_err(|e| PageError::Decode(e.to_string()))?;

    let oversized = image.width().max(image.height()) > max_dim;
    let passthrough = matches!(mime, "image/png" | "image/jpeg" | "image/webp");

    if !oversized && passthrough {
        return Ok(PageImage { mime, bytes });
    }

    let image = if oversized {
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            max_dim,
            "Downscaling page image"
        );
        image.resize(max_dim, max_dim, FilterType::Lanczos3)
    } else {
        image
    };

    encode_jpeg(&image)
}

/// Render every PDF page to a bounded JPEG
///
/// Binds the system pdfium library; blocking, run it off the async runtime.
pub fn render_pdf(bytes: &[u8], max_dim: u32) -> Result<Vec<PageImage>, PageError> {
    use pdfium_render::prelude::*;

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| PageError::Pdf(format!("pdfium library unavailable: {}", e)))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PageError::Pdf(format!("failed to load PDF: {}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_dim as i32)
        .set_maximum_height(max_dim as i32);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PageError::Pdf(format!("failed to render page {}: {}", index + 1, e)))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;

        // pdfium renders BGRA
        let raw = bitmap.as_raw_bytes();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        for pixel in raw.chunks_exact(4) {
            rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }

        let image: RgbImage = ImageBuffer::from_raw(width, height, rgb).ok_or_else(|| {
            PageError::Pdf(format!("page {} bitmap has unexpected size", index + 1))
        })?;

        pages.push(encode_jpeg(&DynamicImage::ImageRgb8(image))?);
    }

    tracing::debug!(pages = pages.len(), "Rendered PDF pages");
    Ok(pages)
}

fn encode_jpeg(image: &DynamicImage) -> Result<PageImage, PageError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|e| PageError::Encode(e.to_string()))?;

    Ok(PageImage {
        mime: "image/jpeg",
        bytes,
    })
}
