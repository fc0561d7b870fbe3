//! Image recompression for embedding in prompts
//!
//! Uploaded images are scaled down to fit a bounding box and re-encoded as
//! JPEG, then embedded as a `data:` URI so they travel inside the library
//! document. When decoding fails the caller embeds the original bytes
//! instead via [`embed_uncompressed`].

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

use crate::errors::{LibraryError, Result};

/// Default bounding box and quality used for prompt images
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;
pub const DEFAULT_QUALITY: f32 = 0.7;

/// Embedded images above this size are flagged as too large to store
pub const DEFAULT_MAX_EMBED_MB: f64 = 1.0;

/// Decode `bytes`, fit within `max_width`×`max_height` and re-encode as JPEG
///
/// `quality` is a 0–1 factor. Images are only ever scaled down.
pub fn compress(bytes: &[u8], max_width: u32, max_height: u32, quality: f32) -> Result<String> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(img.width(), img.height(), max_width, max_height);

    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, jpeg_quality(quality));
    rgb.write_with_encoder(encoder)?;

    Ok(data_uri("image/jpeg", &encoded))
}

/// [`compress`] on the blocking pool
pub async fn compress_async(
    bytes: Vec<u8>,
    max_width: u32,
    max_height: u32,
    quality: f32,
) -> Result<String> {
    tokio::task::spawn_blocking(move || compress(&bytes, max_width, max_height, quality))
        .await
        .map_err(|e| LibraryError::Codec(format!("compression task failed: {}", e)))?
}

/// Compress, falling back to embedding the original bytes
pub fn compress_or_embed(bytes: &[u8], max_width: u32, max_height: u32, quality: f32) -> String {
    match compress(bytes, max_width, max_height, quality) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Image compression failed, embedding original");
            embed_uncompressed(bytes, None)
        },
    }
}

/// Embed bytes unchanged as a data URI
///
/// The MIME type is sniffed from the bytes when not given.
pub fn embed_uncompressed(bytes: &[u8], mime: Option<&str>) -> String {
    let mime = mime
        .map(str::to_string)
        .or_else(|| {
            image::guess_format(bytes)
                .ok()
                .map(|f| f.to_mime_type().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());
    data_uri(&mime, bytes)
}

/// Whether `s` is an embedded image rather than an external URL
pub fn is_data_uri_image(s: &str) -> bool {
    s.starts_with("data:image/")
}

/// Approximate decoded size in bytes of a base64 payload or data URI
pub fn estimated_size(encoded: &str) -> usize {
    let payload = encoded
        .split_once(";base64,")
        .map(|(_, b64)| b64)
        .unwrap_or(encoded);
    (payload.len() * 3).div_ceil(4)
}

/// Whether an embedded image exceeds `max_mb` megabytes
pub fn is_too_large(encoded: &str, max_mb: f64) -> bool {
    estimated_size(encoded) as f64 > max_mb * 1024.0 * 1024.0
}

/// Decode the payload of a base64 data URI
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| LibraryError::Codec("not a data URI".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| LibraryError::Codec("data URI is not base64 encoded".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| LibraryError::Codec(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Target size preserving aspect ratio, never larger than the original
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled = |dim: u32| ((dim as f64 * scale).round() as u32).max(1);
    (
        scaled(width).min(max_width.max(1)),
        scaled(height).min(max_height.max(1)),
    )
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
