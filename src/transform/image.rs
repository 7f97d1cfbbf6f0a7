// src/transform/image.rs

use std::io::Cursor;

use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use tracing::trace;

use crate::errors::{CompilationError, Result};
use crate::transform::{
    Asset, BoxFuture, StepOptions, Transform, TransformContext, collect_compiled,
};

/// `image-optimize`: re-encode PNG and JPEG images, keeping whichever of
/// the original and re-encoded bytes is smaller. Other files pass through.
///
/// Options:
/// - `quality`: JPEG quality 1-100, default 85.
/// - `strict`: default `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageOptimizeTransform;

fn format_of(asset: &Asset) -> Option<ImageFormat> {
    match asset.extension()?.to_ascii_lowercase().as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

fn reencode(bytes: &[u8], format: ImageFormat, quality: u8) -> image::ImageResult<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, format)?;
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
        }
        _ => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))?;
        }
    }
    Ok(out.into_inner())
}

fn optimize_one(asset: Asset, quality: u8) -> std::result::Result<Option<Asset>, CompilationError> {
    let Some(format) = format_of(&asset) else {
        return Ok(Some(asset));
    };
    let encoded = reencode(&asset.contents, format, quality)
        .map_err(|e| CompilationError::new(asset.origin(), e.to_string()))?;

    if encoded.len() < asset.contents.len() {
        trace!(
            file = %asset.path.display(),
            before = asset.contents.len(),
            after = encoded.len(),
            "image shrunk"
        );
        Ok(Some(Asset {
            contents: encoded,
            ..asset
        }))
    } else {
        Ok(Some(asset))
    }
}

impl Transform for ImageOptimizeTransform {
    fn name(&self) -> &str {
        "image-optimize"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            let strict = options.strict()?;
            let quality = options.get_u64("quality")?.unwrap_or(85).clamp(1, 100) as u8;

            let results = tokio::task::spawn_blocking(move || {
                assets
                    .into_iter()
                    .map(|asset| optimize_one(asset, quality))
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| anyhow::anyhow!("image worker panicked: {e}"))?;

            collect_compiled(results, strict, ctx, "image-optimize")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(32, 32, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn output_is_never_larger_than_input() {
        let original = png_bytes();
        let out = optimize_one(Asset::new("a.png", original.clone()), 80)
            .unwrap()
            .unwrap();
        assert!(out.contents.len() <= original.len());
        assert!(image::load_from_memory(&out.contents).is_ok());
    }

    #[test]
    fn corrupt_image_is_a_compilation_error() {
        let err = optimize_one(Asset::new("broken.png", "not a png"), 80).unwrap_err();
        assert_eq!(err.file, std::path::PathBuf::from("broken.png"));
    }

    #[test]
    fn other_files_pass_through() {
        let asset = Asset::new("logo.svg", "<svg/>");
        assert_eq!(optimize_one(asset.clone(), 80).unwrap(), Some(asset));
    }
}
