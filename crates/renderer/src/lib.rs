//! Reference host for `colorfx` effect stacks.
//!
//! The renderer turns the render instructions produced by an effect stack
//! into pixels with `wgpu`. The overall flow is:
//!
//! ```text
//!   CLI / fxview
//!          │ RendererConfig + ShaderLibrary
//!          ▼
//!   Renderer::run ──▶ PreviewState ──▶ winit event loop ──▶ render_frame()
//!          │                                   │
//!          │                                   └─▶ EffectStack::apply ─▶ GpuState::prepare ─▶ present
//!          └─▶ export_still ─▶ GpuState (headless) ─▶ PNG
//! ```
//!
//! Every colour function is wrapped at runtime into a full fragment shader
//! that samples the content, converts the fragment position into logical
//! units, and calls the function with arguments read from uniform slots.
//! Passes are chained through ping-pong targets so each one sees the output
//! of the previous pass as its input colour.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colorfx::{EffectStack, FrameContext, RenderInstruction, ShaderLibrary, ViewGeometry};
use winit::dpi::PhysicalSize;

mod compile;
mod content;
mod gpu;
mod runtime;
mod types;
mod window;

pub use types::{ColorSpaceMode, ContentSource, RenderMode, RendererConfig};

/// Entry point that chooses between the preview window and still export.
pub struct Renderer {
    config: RendererConfig,
    library: ShaderLibrary,
}

impl Renderer {
    pub fn new(config: RendererConfig, library: ShaderLibrary) -> Self {
        Self { config, library }
    }

    /// Runs the configured mode to completion.
    ///
    /// Windowed mode returns once the window closes; export mode returns once
    /// the PNG has been written.
    pub fn run(&mut self) -> Result<()> {
        match &self.config.mode {
            RenderMode::Windowed => window::run_preview(&self.config, self.library.clone()),
            RenderMode::Export { path, time } => {
                export_still(&self.config, &self.library, *time, path)
            }
        }
    }
}

/// Builds the colour-function library: the bundled functions plus every
/// `*.glsl` file in `shader_dir`.
pub fn build_library(shader_dir: Option<&Path>) -> Result<ShaderLibrary> {
    let mut library = ShaderLibrary::with_builtins();
    if let Some(dir) = shader_dir {
        library
            .load_dir(dir)
            .with_context(|| format!("failed to load colour functions from {}", dir.display()))?;
    }
    tracing::debug!(
        functions = ?library.names().collect::<Vec<_>>(),
        "colour function library ready"
    );
    Ok(library)
}

/// Evaluates the configured stack once, `elapsed` after activation, at
/// `surface_size` with a scale factor of 1, and checks every pass against
/// `library`.
pub fn plan_frame(
    config: &RendererConfig,
    library: &ShaderLibrary,
    elapsed: Duration,
) -> Result<RenderInstruction<ContentSource>> {
    let activation = Instant::now();
    let stack = EffectStack::from_kinds(&config.effects, config.clock, activation);
    let geometry = ViewGeometry::from_physical(config.surface_size.0, config.surface_size.1, 1.0);
    let timestamp = activation
        .checked_add(elapsed)
        .with_context(|| format!("time {elapsed:?} is out of range"))?;
    let frame = FrameContext::new(geometry, timestamp);
    let instruction = stack.apply(config.content.clone(), &frame);
    for call in &instruction.passes {
        library.resolve(call)?;
    }
    Ok(instruction)
}

/// Renders one frame off-screen and writes it to `path` as PNG.
pub fn export_still(
    config: &RendererConfig,
    library: &ShaderLibrary,
    time: Duration,
    path: &Path,
) -> Result<()> {
    let instruction = plan_frame(config, library, time)?;
    let size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let mut gpu = gpu::GpuState::headless(size, config.color_space, &instruction.content)?;
    let passes = gpu.prepare(library, &instruction)?;
    tracing::debug!(
        passes = ?passes.iter().map(|pass| pass.function()).collect::<Vec<_>>(),
        time = ?time,
        "rendering still frame"
    );
    gpu.export(&passes, path)
}

#[cfg(test)]
mod tests {
    use colorfx::{ClockSign, EffectKind, ShaderArgument, ShaderError};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn plans_time_varying_frame_at_requested_time() {
        let config = RendererConfig {
            surface_size: (200, 100),
            ..RendererConfig::default()
        };
        let library = build_library(None).unwrap();
        let instruction = plan_frame(&config, &library, Duration::from_millis(500)).unwrap();
        assert_eq!(instruction.passes.len(), 1);
        let call = &instruction.passes[0];
        assert_eq!(call.function, "timeVaryingColor");
        assert_eq!(
            call.arguments,
            vec![
                ShaderArgument::Float2([200.0, 100.0]),
                ShaderArgument::Float(0.5)
            ]
        );
    }

    #[test]
    fn reverse_clock_plans_negative_time() {
        let config = RendererConfig {
            clock: ClockSign::Reverse,
            ..RendererConfig::default()
        };
        let library = build_library(None).unwrap();
        let instruction = plan_frame(&config, &library, Duration::from_secs(2)).unwrap();
        assert_eq!(
            instruction.passes[0].arguments[1],
            ShaderArgument::Float(-2.0)
        );
    }

    #[test]
    fn empty_stack_plans_passthrough() {
        let config = RendererConfig {
            effects: Vec::new(),
            ..RendererConfig::default()
        };
        let library = build_library(None).unwrap();
        let instruction = plan_frame(&config, &library, Duration::ZERO).unwrap();
        assert!(instruction.is_passthrough());
        assert_eq!(instruction.content, ContentSource::default());
    }

    #[test]
    fn planning_fails_when_library_lacks_function() {
        let config = RendererConfig {
            effects: vec![EffectKind::SizeAware],
            ..RendererConfig::default()
        };
        let err = plan_frame(&config, &ShaderLibrary::new(), Duration::ZERO).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShaderError>(),
            Some(ShaderError::UnknownShader(name)) if name == "sizeAwareColor"
        ));
    }

    #[test]
    fn library_includes_user_functions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tint.glsl"),
            "vec4 tint(vec2 position, vec4 currentColor, vec4 tint) { return currentColor * tint; }",
        )
        .unwrap();
        let library = build_library(Some(dir.path())).unwrap();
        assert!(library.get("tint").is_some());
        assert!(library.get("color").is_some());
    }

    #[test]
    fn planning_rejects_time_beyond_clock_range() {
        let library = build_library(None).unwrap();
        let err = plan_frame(
            &RendererConfig::default(),
            &library,
            Duration::from_secs(u64::MAX),
        )
        .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn missing_shader_dir_is_an_error() {
        let err = build_library(Some(Path::new("/nonexistent/fxview-shaders"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fxview-shaders"));
    }
}
