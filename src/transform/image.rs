// src/transform/image.rs

//! Raster and vector image optimization, and derived webp variants.

use std::sync::LazyLock;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use regex::Regex;

/// JPEG re-encode quality.
pub const JPEG_QUALITY: u8 = 75;

fn extension(rel: &str) -> String {
    rel.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn decode(rel: &str, bytes: &[u8]) -> Result<DynamicImage, String> {
    let format = match extension(rel).as_str() {
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "png" => ImageFormat::Png,
        other => return Err(format!("{rel}: unsupported raster format '{other}'")),
    };
    image::load_from_memory_with_format(bytes, format).map_err(|e| format!("{rel}: {e}"))
}

/// Optimize one image. Re-encoded rasters never grow: when the result is
/// larger than the input, the input bytes are kept.
pub fn optimize(rel: &str, bytes: &[u8]) -> Result<Vec<u8>, String> {
    let optimized = match extension(rel).as_str() {
        "svg" => return optimize_svg(rel, bytes),
        "jpg" | "jpeg" => {
            let img = decode(rel, bytes)?;
            let mut out = Vec::new();
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
                .map_err(|e| format!("{rel}: {e}"))?;
            out
        }
        "png" => {
            let img = decode(rel, bytes)?;
            let mut out = Vec::new();
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))
            .map_err(|e| format!("{rel}: {e}"))?;
            out
        }
        other => return Err(format!("{rel}: cannot optimize '{other}' files")),
    };

    if optimized.len() < bytes.len() {
        Ok(optimized)
    } else {
        Ok(bytes.to_vec())
    }
}

/// Encode a jpeg/png as lossless webp.
pub fn to_webp(rel: &str, bytes: &[u8]) -> Result<Vec<u8>, String> {
    let img = decode(rel, bytes)?;
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|e| format!("{rel}: {e}"))?;
    Ok(out)
}

static SVG_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\?xml.*?\?>|<!--.*?-->|<!DOCTYPE[^>]*>|<metadata\b.*?</metadata>")
        .expect("valid svg noise regex")
});
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid whitespace regex"));

/// Drop the prolog, comments, doctype, metadata and inter-tag whitespace.
/// Attributes, `viewBox` included, are left untouched.
pub fn optimize_svg(rel: &str, bytes: &[u8]) -> Result<Vec<u8>, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("{rel}: {e}"))?;
    if !text.contains("<svg") {
        return Err(format!("{rel}: no <svg> element"));
    }
    let stripped = SVG_NOISE.replace_all(text, "");
    let compact = BETWEEN_TAGS.replace_all(&stripped, "><");
    Ok(compact.trim().as_bytes().to_vec())
}
