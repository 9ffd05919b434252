use std::path::PathBuf;
use std::time::Duration;

use colorfx::{ClockSign, EffectKind};
use serde::Serialize;

/// Drawable content the colour effects decorate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentSource {
    /// Image file stretched over the surface.
    Image { path: PathBuf },
    /// Single RGBA colour, components in 0.0-1.0.
    Solid { color: [f32; 4] },
    /// Light/dark checkerboard with square cells of `cell` pixels.
    Checker { cell: u32 },
}

impl Default for ContentSource {
    fn default() -> Self {
        Self::Checker { cell: 32 }
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded targets, matching how the bundled colour functions are authored.
    #[default]
    Auto,
    /// Treat shader outputs/textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains/textures for conversion.
    Linear,
}

/// How the renderer should present frames.
///
/// * `Windowed` opens an interactive preview driven by `winit` that
///   re-evaluates the effect stack on resize and, for animated stacks, on
///   every frame.
/// * `Export` renders a single frame off-screen at `time` after activation
///   and writes it to `path` as PNG.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderMode {
    Windowed,
    Export { path: PathBuf, time: Duration },
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI flags and config-file settings: which
/// decorators to stack, how the effect clock counts, what content to
/// decorate, and where to present the result.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or export size in physical pixels.
    pub surface_size: (u32, u32),
    /// Presentation mode (preview window vs still export).
    pub mode: RenderMode,
    /// Decorators applied to the content, in order.
    pub effects: Vec<EffectKind>,
    /// Sign convention for time-varying effects.
    pub clock: ClockSign,
    /// Content the decorators wrap.
    pub content: ContentSource,
    /// Optional directory of extra `*.glsl` colour functions.
    pub shader_dir: Option<PathBuf>,
    /// Optional FPS cap for animated stacks; None = render every frame.
    pub target_fps: Option<f32>,
    /// Desired color handling for swapchain/textures.
    pub color_space: ColorSpaceMode,
}

impl Default for RendererConfig {
    /// An 800x600 preview of the time-varying effect over a checkerboard.
    fn default() -> Self {
        Self {
            surface_size: (800, 600),
            mode: RenderMode::Windowed,
            effects: vec![EffectKind::TimeVarying],
            clock: ClockSign::default(),
            content: ContentSource::default(),
            shader_dir: None,
            target_fps: None,
            color_space: ColorSpaceMode::default(),
        }
    }
}
