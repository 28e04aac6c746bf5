//! Image preparation for the embedding service.
//!
//! Decodes source images, scales them down to a pixel budget and re-encodes
//! them as JPEG until the result fits a byte budget. The final bytes are
//! wrapped in a base64 data URL, which is what the embedding API accepts.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::FileError;

/// Default pixel budget (15 MP).
pub const DEFAULT_MAX_PIXELS: u64 = 15_000_000;
/// Default byte budget for the transmitted image (20 MB).
pub const DEFAULT_MAX_BYTES: u64 = 20_000_000;

/// JPEG quality of the first encode attempt.
pub const START_QUALITY: u8 = 95;
/// Quality decrement between attempts.
pub const QUALITY_STEP: u8 = 10;
/// Lowest quality the search is allowed to try.
pub const QUALITY_FLOOR: u8 = 20;

/// Share of `max_bytes` the raw JPEG may use. Base64 grows the payload by ~33%.
const BYTE_HEADROOM: f64 = 0.7;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not a jpeg data url")]
    NotDataUrl,
}

#[derive(Debug, thiserror::Error)]
#[error("jpeg encoding failed at quality {quality}: {source}")]
pub struct EncodeError {
    pub quality: u8,
    #[source]
    pub source: image::ImageError,
}

/// Size limits imposed by the embedding service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeLimits {
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for EncodeLimits {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

impl EncodeLimits {
    /// Largest raw JPEG size accepted without lowering quality further.
    pub fn byte_target(&self) -> f64 {
        self.max_bytes as f64 * BYTE_HEADROOM
    }

    fn fits(&self, len: usize) -> bool {
        len as f64 <= self.byte_target()
    }
}

/// A decoded source image.
#[derive(Debug)]
pub struct ImageAsset {
    pub image: DynamicImage,
    /// Size of the bytes the image was decoded from
    pub source_len: usize,
}

impl ImageAsset {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color(&self) -> ColorType {
        self.image.color()
    }
}

/// Decode raw file bytes (any format supported by `image`).
pub fn decode(data: &[u8]) -> Result<ImageAsset, DecodeError> {
    let image = image::load_from_memory(data)?;
    Ok(ImageAsset {
        image,
        source_len: data.len(),
    })
}

/// Read and decode an image file.
pub fn open(path: &Path) -> Result<ImageAsset, FileError> {
    let data = std::fs::read(path)?;
    Ok(decode(&data)?)
}

/// Result of [`encode`], ready to hand to the embedding gateway.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    /// JPEG bytes
    pub data: Vec<u8>,
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
    /// Quality the accepted attempt was encoded with
    pub quality: u8,
    /// Number of JPEG encodes performed
    pub attempts: u32,
    /// Whether `data` met the byte target; false means the floor was hit
    pub within_budget: bool,
    pub original_dimensions: (u32, u32),
    pub dimensions: (u32, u32),
    pub was_resized: bool,
}

impl EncodedPayload {
    pub fn pixel_count(&self) -> u64 {
        self.dimensions.0 as u64 * self.dimensions.1 as u64
    }

    /// Reverse the transport encoding and decode the image it carries.
    pub fn decode_transport(data_url: &str) -> Result<DynamicImage, DecodeError> {
        let encoded = data_url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or(DecodeError::NotDataUrl)?;
        let bytes = STANDARD.decode(encoded)?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// Target dimensions for an image exceeding `max_pixels`, or `None` if it fits.
///
/// Both axes are scaled by `sqrt(max_pixels / (w * h))` and floored, which
/// keeps the aspect ratio and never overshoots the budget. An axis that
/// floors to 0 is raised to 1 and the other axis is capped to compensate.
pub fn scaled_dimensions(width: u32, height: u32, max_pixels: u64) -> Option<(u32, u32)> {
    let pixels = width as u64 * height as u64;
    if pixels <= max_pixels {
        return None;
    }

    let scale = (max_pixels as f64 / pixels as f64).sqrt();
    let new_w = (((width as f64) * scale).floor() as u64).max(1);
    let new_h = (((height as f64) * scale).floor() as u64).max(1);

    let new_w = new_w.min((max_pixels / new_h).max(1));
    let new_h = new_h.min((max_pixels / new_w).max(1));
    Some((new_w as u32, new_h as u32))
}

/// Quality values tried by [`encode`], in order.
pub fn quality_schedule() -> impl Iterator<Item = u8> {
    std::iter::successors(Some(START_QUALITY), |q| next_quality(*q))
}

fn next_quality(quality: u8) -> Option<u8> {
    quality
        .checked_sub(QUALITY_STEP)
        .filter(|next| *next >= QUALITY_FLOOR)
}

/// Resize, normalise and compress an image to fit `limits`.
///
/// Never fails because of the byte budget: if the floor quality still
/// produces too many bytes, that attempt is returned with
/// `within_budget == false`.
pub fn encode(asset: ImageAsset, limits: EncodeLimits) -> Result<EncodedPayload, EncodeError> {
    let original_dimensions = (asset.width(), asset.height());

    let (image, was_resized) =
        match scaled_dimensions(asset.width(), asset.height(), limits.max_pixels) {
            Some((w, h)) => (
                asset
                    .image
                    .resize_exact(w, h, image::imageops::FilterType::Lanczos3),
                true,
            ),
            None => (asset.image, false),
        };

    let image = normalize_color(image);
    let dimensions = image.dimensions();

    let mut quality = START_QUALITY;
    let mut attempts = 0;
    let (data, quality, within_budget) = loop {
        let data = encode_jpeg(&image, quality)?;
        attempts += 1;

        let within_budget = limits.fits(data.len());
        log::debug!(
            "jpeg attempt={attempts} quality={quality} bytes={} target={:.0}",
            data.len(),
            limits.byte_target()
        );

        match next_quality(quality) {
            Some(next) if !within_budget => quality = next,
            _ => break (data, quality, within_budget),
        }
    };

    if !within_budget {
        log::warn!(
            "image still {} bytes at quality floor, sending best effort",
            data.len()
        );
    }

    let data_url = format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&data));

    Ok(EncodedPayload {
        data,
        data_url,
        quality,
        attempts,
        within_budget,
        original_dimensions,
        dimensions,
        was_resized,
    })
}

/// JPEG has no alpha channel and no high bit depths.
fn normalize_color(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::Rgb8 | ColorType::L8 => image,
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|source| EncodeError { quality, source })?;
    Ok(data)
}
