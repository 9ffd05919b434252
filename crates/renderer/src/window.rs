use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use colorfx::{EffectStack, Redraw, ShaderLibrary, ViewGeometry};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::runtime::{FrameScheduler, FrameStats, FrameTimeline, Visibility};
use crate::types::{ContentSource, RendererConfig};

#[derive(Debug)]
pub(crate) enum FrameError {
    Surface(wgpu::SurfaceError),
    /// The instruction could not be resolved or compiled; retrying will not help.
    Prepare(anyhow::Error),
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(value: wgpu::SurfaceError) -> Self {
        FrameError::Surface(value)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Surface(err) => write!(f, "surface error: {err:?}"),
            FrameError::Prepare(err) => write!(f, "failed to prepare frame: {err:#}"),
        }
    }
}

/// Owns everything the preview needs to turn the effect stack into pixels.
pub(crate) struct PreviewState {
    window: Arc<Window>,
    gpu: GpuState,
    library: ShaderLibrary,
    stack: EffectStack,
    content: ContentSource,
    timeline: FrameTimeline,
    stats: FrameStats,
    visibility: Visibility,
}

impl PreviewState {
    pub(crate) fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        library: ShaderLibrary,
    ) -> Result<Self> {
        let now = Instant::now();
        let gpu = GpuState::windowed(
            window.as_ref(),
            window.inner_size(),
            window.scale_factor(),
            config.color_space,
            &config.content,
        )?;
        // The window appearing is the activation of every time-varying decorator.
        let stack = EffectStack::from_kinds(&config.effects, config.clock, now);
        tracing::debug!(
            effects = stack.len(),
            redraw = ?stack.redraw(),
            "preview effect stack ready"
        );

        Ok(Self {
            window,
            gpu,
            library,
            stack,
            content: config.content.clone(),
            timeline: FrameTimeline::default(),
            stats: FrameStats::new(now),
            visibility: Visibility::default(),
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn redraw(&self) -> Redraw {
        self.stack.redraw()
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.window.request_redraw();
    }

    pub(crate) fn set_scale_factor(&mut self, scale_factor: f64) {
        self.gpu.set_scale_factor(scale_factor);
        self.window.request_redraw();
    }

    /// Showing the window again restarts every time-varying clock.
    pub(crate) fn set_occluded(&mut self, occluded: bool) {
        if self.visibility.update(occluded) {
            tracing::debug!("preview visible again; reactivating effects");
            self.stack.activate(Instant::now());
            self.window.request_redraw();
        }
    }

    pub(crate) fn occluded(&self) -> bool {
        self.visibility.occluded()
    }

    pub(crate) fn reconfigure(&mut self) {
        self.gpu.reconfigure();
    }

    /// Re-evaluates the stack for the current geometry and time and presents the result.
    pub(crate) fn render_frame(&mut self) -> Result<(), FrameError> {
        let now = Instant::now();
        let size = self.gpu.size();
        let geometry = ViewGeometry::from_physical(size.width, size.height, self.gpu.scale_factor());
        let frame = self.timeline.next(geometry, now);
        let instruction = self.stack.apply(self.content.clone(), &frame);
        let passes = self
            .gpu
            .prepare(&self.library, &instruction)
            .map_err(FrameError::Prepare)?;
        self.gpu.present(&passes)?;

        if let Some(fps) = self.stats.record(now) {
            tracing::debug!(
                fps = fps.round(),
                frame = frame.frame_index,
                passes = passes.len(),
                "render stats"
            );
        }
        Ok(())
    }
}

/// Opens the preview window and drives it until the user closes it.
pub(crate) fn run_preview(config: &RendererConfig, library: ShaderLibrary) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("fxview")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = PreviewState::new(Arc::clone(&window), config, library)
        .map_err(|err| anyhow!("failed to initialise preview renderer: {err:#}"))?;
    let mut scheduler = FrameScheduler::new(config.target_fps, Instant::now());
    let mut failure: Option<anyhow::Error> = None;
    state.window().request_redraw();

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    state.resize(new_size);
                }
                WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                    state.set_scale_factor(scale_factor);
                }
                WindowEvent::Occluded(occluded) => {
                    state.set_occluded(occluded);
                }
                WindowEvent::RedrawRequested => match state.render_frame() {
                    Ok(()) => scheduler.mark_rendered(Instant::now()),
                    Err(FrameError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        tracing::debug!("surface lost or outdated; reconfiguring");
                        state.reconfigure();
                        state.window().request_redraw();
                    }
                    Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                        failure = Some(anyhow!("surface out of memory; exiting preview"));
                        elwt.exit();
                    }
                    Err(FrameError::Surface(other)) => {
                        tracing::warn!(error = ?other, "surface error; retrying next frame");
                    }
                    Err(err @ FrameError::Prepare(_)) => {
                        tracing::error!(error = %err, "cannot render effect stack");
                        failure = Some(anyhow!("{err}"));
                        elwt.exit();
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            if state.redraw() == Redraw::OnChange || state.occluded() {
                tracing::trace!("scheduler: idle until the window changes");
                elwt.set_control_flow(ControlFlow::Wait);
                return;
            }
            let now = Instant::now();
            if scheduler.ready(now) {
                state.window().request_redraw();
                if scheduler.next_deadline().is_some() {
                    elwt.set_control_flow(ControlFlow::Wait);
                } else {
                    elwt.set_control_flow(ControlFlow::Poll);
                }
            } else if let Some(deadline) = scheduler.next_deadline() {
                let ms = deadline.saturating_duration_since(now).as_millis();
                tracing::trace!(deadline_ms = ms, "scheduler: waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
