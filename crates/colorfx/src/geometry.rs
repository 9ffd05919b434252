use std::time::Instant;

use serde::Serialize;

use crate::argument::ShaderArgument;

/// Extent of the render target an effect is applied to, in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ViewGeometry {
    pub width: f32,
    pub height: f32,
}

impl ViewGeometry {
    /// Builds a geometry snapshot; non-finite or negative extents clamp to zero.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: sanitize_extent(width),
            height: sanitize_extent(height),
        }
    }

    /// Converts a physical pixel size into logical units using the host's scale factor.
    pub fn from_physical(width: u32, height: u32, scale_factor: f64) -> Self {
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            1.0
        };
        Self::new(
            (f64::from(width) / scale) as f32,
            (f64::from(height) / scale) as f32,
        )
    }

    pub fn as_argument(&self) -> ShaderArgument {
        ShaderArgument::Float2([self.width, self.height])
    }
}

fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Everything an effect may read while producing its binding for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub geometry: ViewGeometry,
    /// Instant the host composites this frame at.
    pub timestamp: Instant,
    pub frame_index: u64,
}

impl FrameContext {
    pub fn new(geometry: ViewGeometry, timestamp: Instant) -> Self {
        Self {
            geometry,
            timestamp,
            frame_index: 0,
        }
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_is_divided_by_scale_factor() {
        let geometry = ViewGeometry::from_physical(400, 200, 2.0);
        assert_eq!(geometry, ViewGeometry::new(200.0, 100.0));
    }

    #[test]
    fn invalid_scale_factor_falls_back_to_one() {
        let geometry = ViewGeometry::from_physical(300, 150, 0.0);
        assert_eq!(geometry, ViewGeometry::new(300.0, 150.0));
    }

    #[test]
    fn degenerate_extents_clamp_to_zero() {
        let geometry = ViewGeometry::new(f32::NAN, -4.0);
        assert_eq!(geometry.width, 0.0);
        assert_eq!(geometry.height, 0.0);
    }
}
