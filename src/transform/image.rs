//! In-process image transformer.
//!
//! # Fit modes
//!
//! Images are never upscaled. With both a width and a height:
//!
//! - `scale-down` / `contain` (and no fit): fit inside the box
//! - `cover` / `crop`: shrink until the box is covered, then center-crop
//! - `pad`: fit inside, then center on a canvas with the box's aspect ratio
//!   (transparent, or white when encoding JPEG). The canvas is the box itself
//!   when it fits within the source, otherwise the box scaled down until it does
//!
//! With a single dimension every mode behaves as `scale-down`.
//!
//! # Output format
//!
//! The requested format, else the source format when it is encodable, else PNG.
//! JPEG and AVIF honour quality; PNG and lossless WebP ignore it.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use super::{TransformInput, TransformOutput, Transformer};
use crate::error::TransformError;
use crate::params::{clamp_quality, FitMode, OutputFormat, TransformParameters, DEFAULT_QUALITY};

/// Largest canvas side `pad` will allocate.
pub const MAX_CANVAS_DIMENSION: u32 = 8192;

/// Encoder speed for AVIF (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 8;

// =============================================================================
// Image Transformer
// =============================================================================

/// Resizes and re-encodes images with the `image` crate.
///
/// Decoding and encoding are CPU-bound and run under
/// [`tokio::task::spawn_blocking`].
#[derive(Debug, Clone, Copy)]
pub struct ImageTransformer {
    default_quality: u8,
}

impl ImageTransformer {
    pub fn new() -> Self {
        Self::with_default_quality(DEFAULT_QUALITY)
    }

    /// Create a transformer using `quality` when a request does not name one.
    pub fn with_default_quality(quality: u8) -> Self {
        Self {
            default_quality: clamp_quality(quality),
        }
    }

    pub fn default_quality(&self) -> u8 {
        self.default_quality
    }
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transformer for ImageTransformer {
    async fn transform(
        &self,
        input: TransformInput,
        params: &TransformParameters,
    ) -> Result<TransformOutput, TransformError> {
        let params = *params;
        let quality = params.quality_or(self.default_quality);
        let source = input.bytes;

        let (bytes, format) =
            tokio::task::spawn_blocking(move || process(&source, &params, quality))
                .await
                .map_err(|e| TransformError::Task(e.to_string()))??;

        debug!(
            asset_id = %input.asset_id,
            format = %format,
            size = bytes.len(),
            "Produced derivative"
        );

        Ok(TransformOutput {
            bytes,
            content_type: Some(format.content_type().to_string()),
        })
    }
}

// =============================================================================
// Pipeline
// =============================================================================

fn process(
    source: &[u8],
    params: &TransformParameters,
    quality: u8,
) -> Result<(Bytes, OutputFormat), TransformError> {
    let source_format = image::guess_format(source)
        .ok()
        .and_then(encodable_format);
    let img = image::load_from_memory(source).map_err(|e| TransformError::Decode(e.to_string()))?;

    let format = params
        .format
        .or(source_format)
        .unwrap_or(OutputFormat::Png);

    let img = apply_fit(img, params, format)?;
    let encoded = encode(&img, format, quality)?;

    Ok((Bytes::from(encoded), format))
}

fn encodable_format(format: ImageFormat) -> Option<OutputFormat> {
    match format {
        ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
        ImageFormat::Png => Some(OutputFormat::Png),
        ImageFormat::WebP => Some(OutputFormat::Webp),
        ImageFormat::Avif => Some(OutputFormat::Avif),
        _ => None,
    }
}

fn apply_fit(
    img: DynamicImage,
    params: &TransformParameters,
    format: OutputFormat,
) -> Result<DynamicImage, TransformError> {
    let (src_w, src_h) = img.dimensions();

    let (box_w, box_h) = match (params.width, params.height) {
        (None, None) => return Ok(img),
        (Some(w), Some(h)) => (w, h),
        (w, h) => {
            let (w, h) = fit_inside(src_w, src_h, w, h);
            return Ok(resize(img, w, h));
        }
    };

    match params.fit.unwrap_or(FitMode::ScaleDown) {
        FitMode::ScaleDown | FitMode::Contain => {
            let (w, h) = fit_inside(src_w, src_h, Some(box_w), Some(box_h));
            Ok(resize(img, w, h))
        }
        FitMode::Cover | FitMode::Crop => {
            let ratio = (box_w as f64 / src_w as f64)
                .max(box_h as f64 / src_h as f64)
                .min(1.0);
            let (w, h) = (scaled(src_w, ratio), scaled(src_h, ratio));
            let img = resize(img, w, h);

            let (crop_w, crop_h) = (box_w.min(w), box_h.min(h));
            Ok(img.crop_imm((w - crop_w) / 2, (h - crop_h) / 2, crop_w, crop_h))
        }
        FitMode::Pad => {
            if box_w > MAX_CANVAS_DIMENSION || box_h > MAX_CANVAS_DIMENSION {
                return Err(TransformError::TooLarge {
                    width: box_w,
                    height: box_h,
                });
            }

            // Canvas keeps the box aspect ratio but never exceeds the source
            let (canvas_w, canvas_h) = fit_inside(box_w, box_h, Some(src_w), Some(src_h));
            let (w, h) = fit_inside(src_w, src_h, Some(canvas_w), Some(canvas_h));
            let fitted = resize(img, w, h).to_rgba8();

            let background = if format == OutputFormat::Jpeg {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            };
            let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, background);
            imageops::overlay(
                &mut canvas,
                &fitted,
                ((canvas_w - w) / 2) as i64,
                ((canvas_h - h) / 2) as i64,
            );
            Ok(DynamicImage::ImageRgba8(canvas))
        }
    }
}

/// Largest size inside the given bounds that keeps the aspect ratio, never
/// exceeding the source size.
fn fit_inside(src_w: u32, src_h: u32, max_w: Option<u32>, max_h: Option<u32>) -> (u32, u32) {
    let ratio = [
        max_w.map(|w| w as f64 / src_w as f64),
        max_h.map(|h| h as f64 / src_h as f64),
    ]
    .into_iter()
    .flatten()
    .fold(1.0, f64::min);

    (scaled(src_w, ratio), scaled(src_h, ratio))
}

fn scaled(dimension: u32, ratio: f64) -> u32 {
    ((dimension as f64 * ratio).round() as u32).clamp(1, dimension)
}

fn resize(img: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, TransformError> {
    let mut output = Vec::new();

    let result = match format {
        // JPEG has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut output, quality)),
        OutputFormat::Png => normalized(img).write_with_encoder(PngEncoder::new(&mut output)),
        OutputFormat::Webp => {
            normalized(img).write_with_encoder(WebPEncoder::new_lossless(&mut output))
        }
        OutputFormat::Avif => normalized(img).write_with_encoder(
            AvifEncoder::new_with_speed_quality(&mut output, AVIF_SPEED, quality),
        ),
    };

    result.map_err(|e| match e {
        ImageError::Unsupported(e) => TransformError::UnsupportedFormat(e.to_string()),
        e => TransformError::Encode(e.to_string()),
    })?;

    Ok(output)
}

/// 8-bit RGB or RGBA, which every encoder here accepts.
fn normalized(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

// =============================================================================
// Tests
// =============================================================================
