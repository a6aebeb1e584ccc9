//! Area redaction engine
//!
//! Two modes share one input shape. `preview` draws opaque boxes over the
//! page and keeps everything underneath. `apply_permanent` rasterizes every
//! affected page, burns the boxes into the pixels and drops the page's
//! original content from the file.
//!
//! Both modes check every area before touching any page, so a bad area never
//! yields a partially redacted document.

mod bitmap;
mod pages;

use std::sync::Arc;

use docshield_core::models::{DocumentFormat, RedactionArea, RedactionStyle};
use docshield_core::validation::{validate_each, validate_input};
use docshield_core::{AppError, RedactionConfig};
use image::imageops;
use lopdf::Document;
use serde::Serialize;

use crate::pdf as pdf_graph;
use crate::raster::{PageRasterizer, PageSpec, PdftoppmRasterizer, MAX_RASTER_PIXELS};

/// A redacted copy for on-screen review only.
///
/// Only readable: no storage or repository API accepts this type.
#[derive(Debug, Clone)]
pub struct PreviewDocument {
    bytes: Vec<u8>,
    format: DocumentFormat,
}

impl PreviewDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

/// Output of a permanent redaction, ready to replace the source bytes.
#[derive(Debug, Clone)]
pub struct PermanentRedaction {
    pub bytes: Vec<u8>,
    pub format: DocumentFormat,
    /// Number of areas applied (not pages touched)
    pub redaction_count: u32,
    /// 0-based indexes of the pages that were rasterized
    pub pages_flattened: Vec<u32>,
    pub flattened: bool,
}

#[derive(Debug, Clone)]
pub enum RedactionOutput {
    Preview(PreviewDocument),
    Permanent(PermanentRedaction),
}

impl RedactionOutput {
    pub fn is_permanent(&self) -> bool {
        matches!(self, RedactionOutput::Permanent(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RedactionOutput::Preview(preview) => preview.as_bytes(),
            RedactionOutput::Permanent(permanent) => &permanent.bytes,
        }
    }

    pub fn into_permanent(self) -> Option<PermanentRedaction> {
        match self {
            RedactionOutput::Permanent(permanent) => Some(permanent),
            RedactionOutput::Preview(_) => None,
        }
    }
}

/// Page geometry as reported by `get_info`. PDF pages are in points,
/// raster images in pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub width: f64,
    pub height: f64,
    pub rotation: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub format: DocumentFormat,
    pub page_count: u32,
    pub pages: Vec<PageInfo>,
}

/// A source document that passed format checks.
enum Source {
    Pdf(Document),
    Raster(DocumentFormat),
}

pub struct RedactionEngine {
    rasterizer: Arc<dyn PageRasterizer>,
    dpi: u32,
}

impl RedactionEngine {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, dpi: u32) -> Self {
        Self { rasterizer, dpi }
    }

    /// Engine backed by `pdftoppm` at the configured resolution
    pub fn from_config(config: &RedactionConfig) -> Self {
        Self::new(
            Arc::new(PdftoppmRasterizer::new(config.pdftoppm_path.clone())),
            config.dpi,
        )
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn get_info(&self, data: &[u8]) -> Result<DocumentInfo, AppError> {
        let format = DocumentFormat::sniff(data);
        match format {
            DocumentFormat::Pdf => {
                let doc = pdf_graph::load(data)?;
                let pages: Vec<PageInfo> = pdf_graph::page_ids(&doc)
                    .into_iter()
                    .map(|page_id| {
                        let page = pdf_graph::page_box(&doc, page_id);
                        PageInfo {
                            width: page.width(),
                            height: page.height(),
                            rotation: pdf_graph::page_rotation(&doc, page_id),
                        }
                    })
                    .collect();
                Ok(DocumentInfo {
                    format,
                    page_count: pages.len() as u32,
                    pages,
                })
            }
            DocumentFormat::Png | DocumentFormat::Jpeg => {
                let (width, height) = bitmap::dimensions(data, format)?;
                Ok(DocumentInfo {
                    format,
                    page_count: 1,
                    pages: vec![PageInfo {
                        width: width as f64,
                        height: height as f64,
                        rotation: 0,
                    }],
                })
            }
            DocumentFormat::Unknown => Err(AppError::UnsupportedFormat(
                "Document is not a PDF, PNG or JPEG".to_string(),
            )),
        }
    }

    /// Draw opaque boxes over the given areas without removing anything
    /// underneath.
    #[tracing::instrument(skip(self, data, areas, style), fields(size = data.len(), areas = areas.len()))]
    pub fn preview(
        &self,
        data: &[u8],
        areas: &[RedactionArea],
        style: &RedactionStyle,
    ) -> Result<RedactionOutput, AppError> {
        let source = self.prepare(data, areas, style)?;
        let start = std::time::Instant::now();

        let (bytes, format) = match source {
            Source::Pdf(doc) => (
                pages::preview(doc, &pages::group_by_page(areas), style)?,
                DocumentFormat::Pdf,
            ),
            Source::Raster(format) => (
                bitmap::redact_raster(data, format, areas, style.fill_color)?,
                format,
            ),
        };

        tracing::info!(
            format = %format,
            output_size = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Redaction preview generated"
        );
        Ok(RedactionOutput::Preview(PreviewDocument { bytes, format }))
    }

    /// Irreversibly redact the given areas.
    ///
    /// PDF pages carrying at least one area are rendered, the boxes burned
    /// into the pixels, and the page rebuilt around that single image. Pages
    /// without areas are kept as they are. The document is written out fresh
    /// with unreachable objects and document metadata removed.
    #[tracing::instrument(skip(self, data, areas, style), fields(size = data.len(), areas = areas.len(), dpi = self.dpi))]
    pub async fn apply_permanent(
        &self,
        data: &[u8],
        areas: &[RedactionArea],
        style: &RedactionStyle,
    ) -> Result<RedactionOutput, AppError> {
        let source = self.prepare(data, areas, style)?;
        let start = std::time::Instant::now();
        let grouped = pages::group_by_page(areas);
        let pages_flattened: Vec<u32> = grouped.keys().copied().collect();

        let (bytes, format) = match source {
            Source::Pdf(mut doc) => {
                let page_ids = pdf_graph::page_ids(&doc);
                let targets: Vec<_> = pages_flattened
                    .iter()
                    .map(|index| {
                        let page_id = page_ids[*index as usize];
                        let page = pdf_graph::page_box(&doc, page_id);
                        let spec = PageSpec {
                            index: *index,
                            width_pt: page.width(),
                            height_pt: page.height(),
                            rotation: pdf_graph::page_rotation(&doc, page_id),
                        };
                        (page_id, page, spec)
                    })
                    .collect();

                for (_, _, spec) in &targets {
                    let (w, h) = spec.pixel_size(self.dpi);
                    if w as u64 * h as u64 > MAX_RASTER_PIXELS {
                        return Err(AppError::UnprocessableDocument(format!(
                            "Page {} is too large to rasterize at {} dpi",
                            spec.index, self.dpi
                        )));
                    }
                }

                let specs: Vec<PageSpec> = targets.iter().map(|(_, _, spec)| *spec).collect();
                let rendered = self
                    .rasterizer
                    .render_pages(data, &specs, self.dpi)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Page rasterization failed");
                        AppError::UnprocessableDocument("Failed to rasterize document pages".to_string())
                    })?;
                if rendered.len() != targets.len() {
                    return Err(AppError::Internal(format!(
                        "Rasterizer returned {} pages, expected {}",
                        rendered.len(),
                        targets.len()
                    )));
                }

                for ((page_id, page, spec), displayed) in targets.iter().zip(rendered) {
                    // Rendered pages are upright as displayed; areas are
                    // relative to the unrotated MediaBox.
                    let mut upright = match spec.rotation {
                        90 => imageops::rotate270(&displayed),
                        180 => imageops::rotate180(&displayed),
                        270 => imageops::rotate90(&displayed),
                        _ => displayed,
                    };
                    let page_areas = grouped.get(&spec.index).into_iter().flatten().copied();
                    bitmap::burn_areas(&mut upright, page_areas, style.fill_color);
                    pages::flatten_page(&mut doc, *page_id, page, &upright)?;
                }

                (pages::finish_permanent(doc)?, DocumentFormat::Pdf)
            }
            Source::Raster(format) => (
                bitmap::redact_raster(data, format, areas, style.fill_color)?,
                format,
            ),
        };

        tracing::info!(
            format = %format,
            redaction_count = areas.len(),
            pages_flattened = pages_flattened.len(),
            output_size = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Permanent redaction applied"
        );

        Ok(RedactionOutput::Permanent(PermanentRedaction {
            bytes,
            format,
            redaction_count: areas.len() as u32,
            pages_flattened,
            flattened: true,
        }))
    }

    /// Parse the source and check every area against it.
    ///
    /// Page indexes are checked first so a bad index is reported as such even
    /// when the same area also has bad geometry.
    fn prepare(
        &self,
        data: &[u8],
        areas: &[RedactionArea],
        style: &RedactionStyle,
    ) -> Result<Source, AppError> {
        let format = DocumentFormat::sniff(data);
        let (source, page_count) = match format {
            DocumentFormat::Pdf => {
                let doc = pdf_graph::load(data)?;
                if pdf_graph::is_encrypted(&doc) {
                    return Err(AppError::UnprocessableDocument(
                        "Encrypted documents cannot be redacted".to_string(),
                    ));
                }
                let pages = pdf_graph::page_ids(&doc).len() as u32;
                if pages == 0 {
                    return Err(AppError::UnprocessableDocument(
                        "Document has no pages".to_string(),
                    ));
                }
                (Source::Pdf(doc), pages)
            }
            DocumentFormat::Png | DocumentFormat::Jpeg => {
                bitmap::dimensions(data, format)?;
                (Source::Raster(format), 1)
            }
            DocumentFormat::Unknown => {
                return Err(AppError::UnsupportedFormat(
                    "Document is not a PDF, PNG or JPEG".to_string(),
                ))
            }
        };

        if areas.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one redaction area is required".to_string(),
            ));
        }
        if let Some(area) = areas.iter().find(|a| a.page >= page_count) {
            return Err(AppError::OutOfRange {
                page_index: area.page,
                page_count,
            });
        }
        validate_each(areas, "Redaction area")?;
        validate_input(style)?;

        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BlankRasterizer;

    fn engine() -> RedactionEngine {
        RedactionEngine::new(Arc::new(BlankRasterizer), 72)
    }

    #[test]
    fn test_unknown_format_is_unsupported() {
        let areas = [RedactionArea::new(0, 0.0, 0.0, 0.5, 0.5)];
        let result = engine().preview(b"plain text", &areas, &RedactionStyle::default());
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
        assert!(matches!(
            engine().get_info(b"plain text"),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_corrupt_pdf_is_unprocessable() {
        let areas = [RedactionArea::new(0, 0.0, 0.0, 0.5, 0.5)];
        let result = engine().preview(b"%PDF-1.4\ngarbage", &areas, &RedactionStyle::default());
        assert!(matches!(result, Err(AppError::UnprocessableDocument(_))));
    }

    #[test]
    fn test_output_accessors() {
        let output = RedactionOutput::Preview(PreviewDocument {
            bytes: vec![1, 2, 3],
            format: DocumentFormat::Png,
        });
        assert!(!output.is_permanent());
        assert_eq!(output.as_bytes(), &[1, 2, 3]);
        assert!(output.into_permanent().is_none());
    }
}
