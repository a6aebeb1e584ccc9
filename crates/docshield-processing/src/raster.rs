//! Page rasterization
//!
//! Permanent redaction replaces each affected page with pixels. Rendering is
//! behind `PageRasterizer` so the engine does not depend on a particular
//! renderer; production uses poppler's `pdftoppm`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::process::Stdio;
use tokio::process::Command;

/// Upper bound on rendered pixels per page (about 190 MB of RGB)
pub const MAX_RASTER_PIXELS: u64 = 64_000_000;

/// What the engine knows about a page it asks to have rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpec {
    /// 0-based page index
    pub index: u32,
    /// MediaBox size in points, unrotated
    pub width_pt: f64,
    pub height_pt: f64,
    /// Clockwise display rotation in degrees
    pub rotation: u16,
}

impl PageSpec {
    /// Pixel size of the page as displayed (rotation applied) at `dpi`.
    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        let scale = dpi as f64 / 72.0;
        let w = (self.width_pt * scale).round().max(1.0) as u32;
        let h = (self.height_pt * scale).round().max(1.0) as u32;
        if self.rotation == 90 || self.rotation == 270 {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// Renders PDF pages to RGB bitmaps.
///
/// Implementations return one image per requested page, in request order,
/// oriented as the page is displayed (i.e. with `/Rotate` applied) and
/// covering the page's MediaBox.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn render_pages(&self, pdf: &[u8], pages: &[PageSpec], dpi: u32)
        -> Result<Vec<RgbImage>>;
}

/// Shells out to poppler's `pdftoppm`, one invocation per page.
pub struct PdftoppmRasterizer {
    pdftoppm_path: String,
}

impl PdftoppmRasterizer {
    pub fn new(pdftoppm_path: impl Into<String>) -> Self {
        Self {
            pdftoppm_path: pdftoppm_path.into(),
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn render_pages(
        &self,
        pdf: &[u8],
        pages: &[PageSpec],
        dpi: u32,
    ) -> Result<Vec<RgbImage>> {
        // Scratch directory is removed when `scratch` drops, success or not.
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let input_path = scratch.path().join("input.pdf");
        tokio::fs::write(&input_path, pdf)
            .await
            .context("Failed to write scratch PDF")?;

        let mut rendered = Vec::with_capacity(pages.len());
        for page in pages {
            let (w, h) = page.pixel_size(dpi);
            if (w as u64) * (h as u64) > MAX_RASTER_PIXELS {
                return Err(anyhow!(
                    "Page {} is too large to rasterize at {} dpi ({}x{} px)",
                    page.index,
                    dpi,
                    w,
                    h
                ));
            }

            let number = (page.index + 1).to_string();
            let output_prefix = scratch.path().join(format!("page-{}", number));
            let start = std::time::Instant::now();

            let output = Command::new(&self.pdftoppm_path)
                .args(["-f", &number, "-l", &number, "-r", &dpi.to_string()])
                .args(["-png", "-singlefile"])
                .arg(&input_path)
                .arg(&output_prefix)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .context("Failed to execute pdftoppm")?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(anyhow!("pdftoppm failed on page {}: {}", page.index, stderr));
            }

            let png_path = output_prefix.with_extension("png");
            let png = tokio::fs::read(&png_path)
                .await
                .with_context(|| format!("pdftoppm produced no image for page {}", page.index))?;
            let image = image::load_from_memory(&png)
                .context("Failed to decode rendered page")?
                .to_rgb8();

            tracing::debug!(
                page = page.index,
                width = image.width(),
                height = image.height(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Rendered page"
            );
            rendered.push(image);
        }

        Ok(rendered)
    }
}

/// Produces blank white pages of the right size without rendering anything.
///
/// Redacting with this rasterizer discards the visible content of every
/// affected page, which is still a complete redaction. Used where no renderer
/// is installed, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankRasterizer;

#[async_trait]
impl PageRasterizer for BlankRasterizer {
    async fn render_pages(
        &self,
        _pdf: &[u8],
        pages: &[PageSpec],
        dpi: u32,
    ) -> Result<Vec<RgbImage>> {
        pages
            .iter()
            .map(|page| {
                let (w, h) = page.pixel_size(dpi);
                if (w as u64) * (h as u64) > MAX_RASTER_PIXELS {
                    return Err(anyhow!("Page {} is too large to rasterize", page.index));
                }
                Ok(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size_swaps_for_quarter_turns() {
        let page = PageSpec {
            index: 0,
            width_pt: 612.0,
            height_pt: 792.0,
            rotation: 0,
        };
        assert_eq!(page.pixel_size(72), (612, 792));
        assert_eq!(page.pixel_size(144), (1224, 1584));

        let rotated = PageSpec {
            rotation: 90,
            ..page
        };
        assert_eq!(rotated.pixel_size(72), (792, 612));
    }

    #[tokio::test]
    async fn test_blank_rasterizer_sizes() {
        let pages = [PageSpec {
            index: 2,
            width_pt: 100.0,
            height_pt: 50.0,
            rotation: 0,
        }];
        let images = BlankRasterizer.render_pages(b"", &pages, 144).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].dimensions(), (200, 100));
        assert_eq!(images[0].get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[tokio::test]
    async fn test_missing_pdftoppm_is_an_error() {
        let rasterizer = PdftoppmRasterizer::new("/nonexistent/pdftoppm");
        let pages = [PageSpec {
            index: 0,
            width_pt: 10.0,
            height_pt: 10.0,
            rotation: 0,
        }];
        assert!(rasterizer.render_pages(b"%PDF-1.4", &pages, 72).await.is_err());
    }
}
