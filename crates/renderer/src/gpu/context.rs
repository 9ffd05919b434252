use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::types::ColorSpaceMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SurfaceColorSpace {
    Gamma,
    Linear,
}

impl SurfaceColorSpace {
    fn from_mode(mode: ColorSpaceMode) -> Self {
        match mode {
            ColorSpaceMode::Auto | ColorSpaceMode::Gamma => Self::Gamma,
            ColorSpaceMode::Linear => Self::Linear,
        }
    }

    /// Format used for uploaded content and off-screen targets.
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            Self::Gamma => wgpu::TextureFormat::Rgba8Unorm,
            Self::Linear => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

/// Swapchain state for a window-backed context.
pub(crate) struct PresentTarget {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Present only when rendering to a window.
    pub target: Option<PresentTarget>,
    pub size: PhysicalSize<u32>,
    /// Format every effect pipeline renders into.
    pub target_format: wgpu::TextureFormat,
    pub color_space: SurfaceColorSpace,
}

impl GpuContext {
    /// Creates a context that presents to `window`.
    pub(crate) fn windowed<T>(
        window: &T,
        initial_size: PhysicalSize<u32>,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = window
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = window
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the preview loop keeps the window alive for as long as the
        // renderer that owns this surface.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, Some(&surface))?;
        let size = clamp_size(&adapter, initial_size)?;
        let (device, queue) = request_device(&adapter)?;

        let color_space = SurfaceColorSpace::from_mode(color_space);
        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            bail!("surface reports no supported formats for the selected adapter");
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| match color_space {
                SurfaceColorSpace::Linear => format.is_srgb(),
                SurfaceColorSpace::Gamma => !format.is_srgb(),
            })
            .unwrap_or_else(|| {
                tracing::warn!(
                    fallback = ?first_format,
                    ?color_space,
                    "no surface format matches the requested color space; falling back"
                );
                first_format
            });

        let present_mode = if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Fifo)
        {
            wgpu::PresentMode::Fifo
        } else {
            surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        };
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?surface_format, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            target: Some(PresentTarget { surface, config }),
            size,
            target_format: surface_format,
            color_space,
        })
    }

    /// Creates a context without a window, rendering into off-screen textures.
    pub(crate) fn headless(size: PhysicalSize<u32>, color_space: ColorSpaceMode) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, None)?;
        let size = clamp_size(&adapter, size)?;
        let (device, queue) = request_device(&adapter)?;
        let color_space = SurfaceColorSpace::from_mode(color_space);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            target: None,
            size,
            target_format: color_space.texture_format(),
            color_space,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        if let Some(target) = self.target.as_mut() {
            target.config.width = new_size.width;
            target.config.height = new_size.height;
            target.surface.configure(&self.device, &target.config);
        }
    }

    /// Re-applies the current configuration after the surface was lost or outdated.
    pub(crate) fn reconfigure(&mut self) {
        if let Some(target) = self.target.as_ref() {
            target.surface.configure(&self.device, &target.config);
        }
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );
    Ok(adapter)
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("fxview device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")
}

fn clamp_size(adapter: &wgpu::Adapter, size: PhysicalSize<u32>) -> Result<PhysicalSize<u32>> {
    let max_dimension = adapter.limits().max_texture_dimension_2d;
    let width = size.width.max(1);
    let height = size.height.max(1);
    if width > max_dimension || height > max_dimension {
        bail!("GPU max texture dimension is {max_dimension}, requested surface is {width}x{height}");
    }
    Ok(PhysicalSize::new(width, height))
}
