use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use crate::types::ContentSource;

const CHECKER_LIGHT: Rgba<u8> = Rgba([235, 235, 235, 255]);
const CHECKER_DARK: Rgba<u8> = Rgba([120, 120, 120, 255]);

/// Produces the RGBA pixels uploaded as the content texture.
///
/// Images keep their native resolution and are stretched by the sampler;
/// generated content is rasterised at `surface_size`.
pub(crate) fn rasterize(source: &ContentSource, surface_size: (u32, u32)) -> Result<RgbaImage> {
    match source {
        ContentSource::Image { path } => {
            let image = image::open(path)
                .with_context(|| format!("failed to load content image {}", path.display()))?;
            tracing::debug!(
                path = %path.display(),
                width = image.width(),
                height = image.height(),
                "loaded content image"
            );
            Ok(image.to_rgba8())
        }
        ContentSource::Solid { color } => Ok(RgbaImage::from_pixel(1, 1, Rgba(to_rgba8(*color)))),
        ContentSource::Checker { cell } => {
            let cell = (*cell).max(1);
            let (width, height) = (surface_size.0.max(1), surface_size.1.max(1));
            Ok(RgbaImage::from_fn(width, height, |x, y| {
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    CHECKER_LIGHT
                } else {
                    CHECKER_DARK
                }
            }))
        }
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|component| (component.clamp(0.0, 1.0) * 255.0).round() as u8)
}
