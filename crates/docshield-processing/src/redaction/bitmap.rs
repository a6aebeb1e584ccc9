//! Pixel-level redaction for raster documents and rasterized PDF pages.

use std::io::Cursor;

use docshield_core::models::{DocumentFormat, RedactionArea};
use docshield_core::AppError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::raster::MAX_RASTER_PIXELS;

const JPEG_QUALITY: u8 = 92;

fn image_format(format: DocumentFormat) -> Result<ImageFormat, AppError> {
    match format {
        DocumentFormat::Png => Ok(ImageFormat::Png),
        DocumentFormat::Jpeg => Ok(ImageFormat::Jpeg),
        other => Err(AppError::UnsupportedFormat(other.to_string())),
    }
}

/// Width and height of an encoded image, read from its header only.
pub(crate) fn dimensions(data: &[u8], format: DocumentFormat) -> Result<(u32, u32), AppError> {
    ImageReader::with_format(Cursor::new(data), image_format(format)?)
        .into_dimensions()
        .map_err(|e| AppError::UnprocessableDocument(format!("Failed to read image header: {}", e)))
}

pub(crate) fn decode(data: &[u8], format: DocumentFormat) -> Result<RgbImage, AppError> {
    let (width, height) = dimensions(data, format)?;
    if width as u64 * height as u64 > MAX_RASTER_PIXELS {
        return Err(AppError::UnprocessableDocument(format!(
            "Image is too large to process ({}x{} px)",
            width, height
        )));
    }
    let decoded = image::load_from_memory_with_format(data, image_format(format)?)
        .map_err(|e| AppError::UnprocessableDocument(format!("Failed to decode image: {}", e)))?;
    Ok(decoded.to_rgb8())
}

/// Re-encode in the source format. Ancillary metadata (EXIF, text chunks) is
/// not carried over.
pub(crate) fn encode(image: RgbImage, format: DocumentFormat) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    match format {
        DocumentFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                .encode_image(&image)
                .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {}", e)))?;
        }
        _ => {
            DynamicImage::ImageRgb8(image)
                .write_to(&mut Cursor::new(&mut out), image_format(format)?)
                .map_err(|e| AppError::Internal(format!("Failed to encode image: {}", e)))?;
        }
    }
    Ok(out)
}

/// Pixel bounds covering an area completely: edges round outward.
pub(crate) fn pixel_rect(area: &RedactionArea, width: u32, height: u32) -> Option<Rect> {
    let x0 = (area.x * width as f64).floor().clamp(0.0, width as f64) as u32;
    let y0 = (area.y * height as f64).floor().clamp(0.0, height as f64) as u32;
    let x1 = ((area.x + area.width) * width as f64)
        .ceil()
        .clamp(0.0, width as f64) as u32;
    let y1 = ((area.y + area.height) * height as f64)
        .ceil()
        .clamp(0.0, height as f64) as u32;

    (x1 > x0 && y1 > y0).then(|| Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0))
}

/// Overwrite every area with solid fill. The image must be oriented so its
/// top-left corner is the top-left of the area coordinate space.
pub(crate) fn burn_areas<'a>(
    image: &mut RgbImage,
    areas: impl IntoIterator<Item = &'a RedactionArea>,
    fill: [u8; 3],
) {
    let (width, height) = image.dimensions();
    for area in areas {
        if let Some(rect) = pixel_rect(area, width, height) {
            draw_filled_rect_mut(image, rect, Rgb(fill));
        }
    }
}

/// Decode, burn and re-encode a PNG or JPEG.
pub(crate) fn redact_raster(
    data: &[u8],
    format: DocumentFormat,
    areas: &[RedactionArea],
    fill: [u8; 3],
) -> Result<Vec<u8>, AppError> {
    let mut image = decode(data, format)?;
    burn_areas(&mut image, areas, fill);
    encode(image, format)
}
