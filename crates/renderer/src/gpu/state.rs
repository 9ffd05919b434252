use std::path::Path;
use std::sync::{mpsc, Arc};

use anyhow::{bail, Context, Result};
use colorfx::{RenderInstruction, ShaderArgument, ShaderFunction, ShaderLibrary};
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::compile::passthrough_function;
use crate::content::rasterize;
use crate::types::{ColorSpaceMode, ContentSource};

use super::context::GpuContext;
use super::pipeline::{EffectPipeline, PipelineCache, PipelineLayouts};
use super::uniforms::EffectUniforms;

/// One resolved pass of a render instruction, ready to encode.
pub(crate) struct PreparedPass {
    pipeline: Arc<EffectPipeline>,
    arguments: Vec<ShaderArgument>,
}

impl PreparedPass {
    pub fn function(&self) -> &str {
        &self.pipeline.function
    }
}

/// A sampled texture bound at set 1.
struct BoundTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

/// Two alternating targets carrying colour between chained passes.
struct PingPong {
    size: PhysicalSize<u32>,
    targets: [BoundTexture; 2],
}

pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    pipelines: PipelineCache,
    passthrough: ShaderFunction,
    sampler: wgpu::Sampler,
    uniforms: EffectUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    content_source: ContentSource,
    content: BoundTexture,
    intermediates: Option<PingPong>,
    scale_factor: f64,
}

impl GpuState {
    pub(crate) fn windowed<T>(
        window: &T,
        size: PhysicalSize<u32>,
        scale_factor: f64,
        color_space: ColorSpaceMode,
        content: &ContentSource,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::windowed(window, size, color_space)?;
        Self::from_context(context, scale_factor, content)
    }

    pub(crate) fn headless(
        size: PhysicalSize<u32>,
        color_space: ColorSpaceMode,
        content: &ContentSource,
    ) -> Result<Self> {
        let context = GpuContext::headless(size, color_space)?;
        Self::from_context(context, 1.0, content)
    }

    fn from_context(
        context: GpuContext,
        scale_factor: f64,
        content_source: &ContentSource,
    ) -> Result<Self> {
        let layouts = PipelineLayouts::new(&context.device)?;

        let uniforms = EffectUniforms::new(context.size.width, context.size.height, scale_factor);
        let uniform_buffer =
            context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("effect uniform buffer"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("effect uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("content sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let content = upload_content(&context, &layouts, &sampler, content_source)?;

        Ok(Self {
            context,
            layouts,
            pipelines: PipelineCache::default(),
            passthrough: passthrough_function()?,
            sampler,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            content_source: content_source.clone(),
            content,
            intermediates: None,
            scale_factor,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 || new_size == self.context.size {
            return;
        }
        self.context.resize(new_size);
        self.intermediates = None;
        // Checkerboards are rasterised at surface size to keep their cells square.
        if matches!(self.content_source, ContentSource::Checker { .. }) {
            let source = self.content_source.clone();
            if let Err(err) = self.set_content(&source) {
                tracing::warn!(error = %err, "failed to regenerate content after resize");
            }
        }
    }

    pub(crate) fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Replaces the content texture when the source changed.
    pub(crate) fn set_content(&mut self, source: &ContentSource) -> Result<()> {
        self.content = upload_content(&self.context, &self.layouts, &self.sampler, source)?;
        self.content_source = source.clone();
        Ok(())
    }

    /// Resolves every pass of `instruction` against `library` and makes sure
    /// a pipeline exists for it. Instructions without passes draw the content
    /// through the passthrough function.
    pub(crate) fn prepare(
        &mut self,
        library: &ShaderLibrary,
        instruction: &RenderInstruction<ContentSource>,
    ) -> Result<Vec<PreparedPass>> {
        if instruction.content != self.content_source {
            self.set_content(&instruction.content)?;
        }

        if instruction.is_passthrough() {
            let pipeline = self.pipelines.get_or_build(
                &self.context.device,
                &self.layouts,
                self.context.target_format,
                &self.passthrough,
            )?;
            return Ok(vec![PreparedPass {
                pipeline,
                arguments: Vec::new(),
            }]);
        }

        let mut passes = Vec::with_capacity(instruction.passes.len());
        for call in &instruction.passes {
            let function = library.resolve(call)?;
            let pipeline = self.pipelines.get_or_build(
                &self.context.device,
                &self.layouts,
                self.context.target_format,
                function,
            )?;
            passes.push(PreparedPass {
                pipeline,
                arguments: call.arguments.clone(),
            });
        }
        tracing::trace!(
            passes = passes.len(),
            cached_pipelines = self.pipelines.len(),
            "prepared render instruction"
        );
        Ok(passes)
    }

    /// Draws `passes` into the next swapchain image and presents it.
    pub(crate) fn present(&mut self, passes: &[PreparedPass]) -> Result<(), wgpu::SurfaceError> {
        let Some(target) = self.context.target.as_ref() else {
            tracing::warn!("present requested on a context without a window surface");
            return Ok(());
        };
        let frame = target.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("effect encoder"),
                });
        self.encode_passes(&mut encoder, &view, passes);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Draws `passes` off-screen and writes the result to `path` as PNG.
    pub(crate) fn export(&mut self, passes: &[PreparedPass], path: &Path) -> Result<()> {
        let size = self.context.size;
        let format = self.context.target_format;
        let texture = self
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("export target"),
                size: extent(size),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let unpadded_bytes_per_row = size.width * 4;
        let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(alignment) * alignment;
        let readback = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("export encoder"),
                });
        self.encode_passes(&mut encoder, &view, passes);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            extent(size),
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for export readback")?;
        receiver
            .recv()
            .context("export readback callback was dropped")?
            .context("failed to map export readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * size.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        readback.unmap();

        if matches!(
            format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        ) {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }

        let Some(image) = RgbaImage::from_raw(size.width, size.height, pixels) else {
            bail!("export readback produced a truncated image");
        };
        image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write still frame to {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            width = size.width,
            height = size.height,
            passes = passes.len(),
            "exported still frame"
        );
        Ok(())
    }

    fn encode_passes(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        passes: &[PreparedPass],
    ) {
        if passes.len() > 1 {
            self.ensure_intermediates();
        }
        self.uniforms.set_surface(
            self.context.size.width,
            self.context.size.height,
            self.scale_factor,
        );

        let last = passes.len().saturating_sub(1);
        for (index, pass) in passes.iter().enumerate() {
            let source = if index == 0 {
                &self.content.bind_group
            } else {
                match self.intermediates.as_ref() {
                    Some(ping_pong) => &ping_pong.targets[(index - 1) % 2].bind_group,
                    None => &self.content.bind_group,
                }
            };
            let target = if index == last {
                output
            } else {
                match self.intermediates.as_ref() {
                    Some(ping_pong) => &ping_pong.targets[index % 2].view,
                    None => output,
                }
            };

            self.uniforms.load_arguments(&pass.arguments);
            // Each pass gets its own staging copy so later passes cannot
            // overwrite the arguments of earlier ones before submission.
            let staging =
                self.context
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("uniform staging"),
                        contents: bytemuck::bytes_of(&self.uniforms),
                        usage: wgpu::BufferUsages::COPY_SRC,
                    });
            encoder.copy_buffer_to_buffer(
                &staging,
                0,
                &self.uniform_buffer,
                0,
                std::mem::size_of::<EffectUniforms>() as u64,
            );

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.function()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&pass.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, source, &[]);
            render_pass.draw(0..3, 0..1);
        }
    }

    fn ensure_intermediates(&mut self) {
        let size = self.context.size;
        if self
            .intermediates
            .as_ref()
            .is_some_and(|ping_pong| ping_pong.size == size)
        {
            return;
        }
        let make = |label: &str| {
            let texture = self
                .context
                .device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: extent(size),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: self.context.target_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
            bind_texture(
                &self.context.device,
                &self.layouts,
                &self.sampler,
                texture,
                label,
            )
        };
        let targets = [make("intermediate target #0"), make("intermediate target #1")];
        tracing::debug!(width = size.width, height = size.height, "allocated pass targets");
        self.intermediates = Some(PingPong { size, targets });
    }
}

fn extent(size: PhysicalSize<u32>) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width.max(1),
        height: size.height.max(1),
        depth_or_array_layers: 1,
    }
}

fn upload_content(
    context: &GpuContext,
    layouts: &PipelineLayouts,
    sampler: &wgpu::Sampler,
    source: &ContentSource,
) -> Result<BoundTexture> {
    let mut image = rasterize(source, (context.size.width, context.size.height))?;
    let max_dimension = context.device.limits().max_texture_dimension_2d;
    if image.width() > max_dimension || image.height() > max_dimension {
        let scale = f64::from(max_dimension) / f64::from(image.width().max(image.height()));
        let width = ((f64::from(image.width()) * scale) as u32).max(1);
        let height = ((f64::from(image.height()) * scale) as u32).max(1);
        tracing::warn!(
            original_width = image.width(),
            original_height = image.height(),
            width,
            height,
            "content exceeds GPU texture limits; downscaling"
        );
        image = image::imageops::resize(&image, width, height, image::imageops::FilterType::Triangle);
    }

    let texture = context.device.create_texture_with_data(
        &context.queue,
        &wgpu::TextureDescriptor {
            label: Some("content texture"),
            size: wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: context.color_space.texture_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        image.as_raw(),
    );
    Ok(bind_texture(
        &context.device,
        layouts,
        sampler,
        texture,
        "content bind group",
    ))
}

fn bind_texture(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    sampler: &wgpu::Sampler,
    texture: wgpu::Texture,
    label: &str,
) -> BoundTexture {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layouts.content_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    BoundTexture {
        _texture: texture,
        view,
        bind_group,
    }
}
