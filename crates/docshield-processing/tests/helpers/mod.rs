#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use async_trait::async_trait;
use docshield_processing::{BlankRasterizer, PageRasterizer, PageSpec, RedactionEngine};
use image::RgbImage;

/// Engine that renders blank pages at 72 dpi (1 px per point).
pub fn test_engine() -> RedactionEngine {
    RedactionEngine::new(Arc::new(BlankRasterizer), 72)
}

/// Rasterizer that always fails, standing in for a missing or crashing renderer.
pub struct FailingRasterizer;

#[async_trait]
impl PageRasterizer for FailingRasterizer {
    async fn render_pages(
        &self,
        _pdf: &[u8],
        _pages: &[PageSpec],
        _dpi: u32,
    ) -> anyhow::Result<Vec<RgbImage>> {
        Err(anyhow::anyhow!("renderer crashed"))
    }
}
