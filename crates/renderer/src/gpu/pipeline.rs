use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use colorfx::ShaderFunction;

use crate::compile::{compile_effect_shader, compile_vertex_shader};

/// Bind group layouts and the vertex stage shared by every effect pipeline.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub content_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("effect uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let content_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("content layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("effect pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &content_layout],
            push_constant_ranges: &[],
        });

        let vertex_module = compile_vertex_shader(device)?;

        Ok(Self {
            uniform_layout,
            content_layout,
            pipeline_layout,
            vertex_module,
        })
    }
}

/// Render pipeline drawing one wrapped colour function.
pub(crate) struct EffectPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub function: String,
}

impl EffectPipeline {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        target_format: wgpu::TextureFormat,
        function: &ShaderFunction,
    ) -> Result<Self> {
        let fragment_module = compile_effect_shader(device, function).with_context(|| {
            format!(
                "failed to compile colour function `{}` from {}",
                function.name(),
                function.origin()
            )
        })?;

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(function.name()),
            layout: Some(&layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &layouts.vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            function: function.name().to_string(),
        })
    }
}

/// Compiled pipelines keyed by colour function name.
///
/// Function names are unique within a library, and every pipeline targets the
/// same format, so the name alone identifies a pipeline.
#[derive(Default)]
pub(crate) struct PipelineCache {
    entries: HashMap<String, Arc<EffectPipeline>>,
}

impl PipelineCache {
    pub fn get_or_build(
        &mut self,
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        target_format: wgpu::TextureFormat,
        function: &ShaderFunction,
    ) -> Result<Arc<EffectPipeline>> {
        if let Some(pipeline) = self.entries.get(function.name()) {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(EffectPipeline::new(
            device,
            layouts,
            target_format,
            function,
        )?);
        tracing::debug!(
            function = function.name(),
            origin = function.origin(),
            "built effect pipeline"
        );
        self.entries
            .insert(function.name().to_string(), Arc::clone(&pipeline));
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
