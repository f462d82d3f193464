use crate::extract::SlotGeometry;
use crate::rig::BlendMode;
use anyhow::{Context, Result};
use glam::Mat4;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

pub mod textures;

use textures::TextureStore;

/// Offscreen color target format for both the stage output and atlas pages.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    proj: [[f32; 4]; 4],
    /// x holds 1.0 when the shader premultiplies rgb by alpha; yzw pad the
    /// struct to 16-byte uniform alignment.
    premultiply: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Headless GPU handle shared by the renderer and the texture store.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        let required_limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        let (device, queue) =
            adapter.request_device(&device_desc).await.context("device request failed")?;
        Ok(Self { device, queue })
    }

    pub fn new_headless_blocking() -> Result<Self> {
        pollster::block_on(Self::new_headless())
    }
}

struct DrawCall {
    index_range: Range<u32>,
    base_vertex: i32,
    blend: BlendMode,
    page: Arc<str>,
}

/// GPU side of the batch-and-draw stage: one reusable dynamic vertex buffer
/// and index buffer, a pipeline per blend mode, and a bind group per atlas
/// page. Every frame packs the slot meshes once and issues one indexed draw
/// call per slot.
pub struct StageRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: [wgpu::RenderPipeline; 4],
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    premultiplied: bool,
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: usize,
    index_buffer: Option<wgpu::Buffer>,
    index_capacity: usize,
    textures: TextureStore,
    bind_cache: HashMap<Arc<str>, Arc<wgpu::BindGroup>>,
}

impl StageRenderer {
    pub fn new(gpu: &GpuContext, premultiplied: bool) -> Self {
        let device = &gpu.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Slot Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../assets/shaders/slot_mesh.wgsl").into()),
        });

        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Stage Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stage Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stage Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buf.as_entire_binding() }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Stage Texture BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Stage Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stage Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let pipelines = BlendMode::ALL.map(|mode| {
            build_pipeline(device, &shader, &pipeline_layout, blend_state(mode, premultiplied), mode)
        });

        Self {
            device: device.clone(),
            queue: gpu.queue.clone(),
            pipelines,
            globals_buf,
            globals_bg,
            texture_bgl,
            sampler,
            premultiplied,
            vertex_buffer: None,
            vertex_capacity: 0,
            index_buffer: None,
            index_capacity: 0,
            textures: TextureStore::new(),
            bind_cache: HashMap::new(),
        }
    }

    pub fn premultiplied(&self) -> bool {
        self.premultiplied
    }

    /// Draws the frame's slot meshes into `target`, clearing it first. The
    /// draw-call sequence is exactly the order of `batches`.
    pub fn render(
        &mut self,
        target: &wgpu::TextureView,
        size: (u32, u32),
        batches: &[SlotGeometry],
    ) -> Result<()> {
        let width = size.0.max(1) as f32;
        let height = size.1.max(1) as f32;
        let proj = Mat4::orthographic_rh(
            -width * 0.5,
            width * 0.5,
            -height * 0.5,
            height * 0.5,
            -1.0,
            1.0,
        );
        self.queue.write_buffer(
            &self.globals_buf,
            0,
            bytemuck::bytes_of(&Globals {
                proj: proj.to_cols_array_2d(),
                premultiply: [if self.premultiplied { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
            }),
        );

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u16> = Vec::new();
        let mut draws: Vec<DrawCall> = Vec::new();
        for batch in batches {
            if batch.is_degenerate() {
                continue;
            }
            let base_vertex = vertices.len() as i32;
            let start = indices.len() as u32;
            for (position, uv) in batch.positions.iter().zip(batch.uvs.iter()) {
                vertices.push(Vertex {
                    pos: [position.x, position.y],
                    uv: [uv.x, uv.y],
                    color: batch.color,
                });
            }
            indices.extend_from_slice(&batch.indices);
            draws.push(DrawCall {
                index_range: start..indices.len() as u32,
                base_vertex,
                blend: batch.blend,
                page: Arc::clone(&batch.page),
            });
        }
        // Keep the u16 upload a multiple of wgpu's copy alignment.
        if indices.len() % 2 == 1 {
            indices.push(0);
        }

        if !vertices.is_empty() {
            self.ensure_vertex_capacity(vertices.len());
            self.ensure_index_capacity(indices.len());
            let vertex_buffer = self.vertex_buffer.as_ref().context("vertex buffer missing")?;
            self.queue.write_buffer(vertex_buffer, 0, bytemuck::cast_slice(&vertices));
            let index_buffer = self.index_buffer.as_ref().context("index buffer missing")?;
            self.queue.write_buffer(index_buffer, 0, bytemuck::cast_slice(&indices));
        }

        let mut bind_groups = Vec::with_capacity(draws.len());
        for draw in &draws {
            bind_groups.push(self.page_bind_group(&draw.page));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Stage Encoder") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Stage Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if !draws.is_empty() {
                pass.set_bind_group(0, &self.globals_bg, &[]);
                let vertex_buffer = self.vertex_buffer.as_ref().context("vertex buffer missing")?;
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                let index_buffer = self.index_buffer.as_ref().context("index buffer missing")?;
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                for (draw, bind_group) in draws.iter().zip(bind_groups.iter()) {
                    pass.set_pipeline(&self.pipelines[draw.blend.index()]);
                    pass.set_bind_group(1, bind_group.as_ref(), &[]);
                    pass.draw_indexed(draw.index_range.clone(), draw.base_vertex, 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn page_bind_group(&mut self, page: &Arc<str>) -> Arc<wgpu::BindGroup> {
        if let Some(bind_group) = self.bind_cache.get(page) {
            return Arc::clone(bind_group);
        }
        let view = self.textures.page_view(&self.device, &self.queue, page);
        let bind_group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stage Page Bind Group"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view.as_ref()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        self.bind_cache.insert(Arc::clone(page), Arc::clone(&bind_group));
        bind_group
    }

    fn ensure_vertex_capacity(&mut self, count: usize) {
        if self.vertex_capacity >= count && self.vertex_buffer.is_some() {
            return;
        }
        let mut new_cap = self.vertex_capacity.max(256);
        while new_cap < count {
            new_cap *= 2;
        }
        self.vertex_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stage Vertex Buffer"),
            size: (new_cap * std::mem::size_of::<Vertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.vertex_capacity = new_cap;
    }

    fn ensure_index_capacity(&mut self, count: usize) {
        if self.index_capacity >= count && self.index_buffer.is_some() {
            return;
        }
        let mut new_cap = self.index_capacity.max(512);
        while new_cap < count {
            new_cap *= 2;
        }
        self.index_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stage Index Buffer"),
            size: (new_cap * std::mem::size_of::<u16>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.index_capacity = new_cap;
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    blend: wgpu::BlendState,
    mode: BlendMode,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match mode {
            BlendMode::Normal => "Stage Pipeline (normal)",
            BlendMode::Additive => "Stage Pipeline (additive)",
            BlendMode::Multiply => "Stage Pipeline (multiply)",
            BlendMode::Screen => "Stage Pipeline (screen)",
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                    },
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 8,
                    },
                    wgpu::VertexAttribute {
                        shader_location: 2,
                        format: wgpu::VertexFormat::Float32x4,
                        offset: 16,
                    },
                ],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Blend-function pair for a slot blend mode under either alpha convention.
/// Four modes by two conventions give the eight concrete cases.
pub fn blend_state(mode: BlendMode, premultiplied: bool) -> wgpu::BlendState {
    let color = if premultiplied {
        match mode {
            BlendMode::Normal => component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
            BlendMode::Additive => component(wgpu::BlendFactor::One, wgpu::BlendFactor::One),
            BlendMode::Multiply => {
                component(wgpu::BlendFactor::Dst, wgpu::BlendFactor::OneMinusSrcAlpha)
            }
            BlendMode::Screen => component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrc),
        }
    } else {
        match mode {
            BlendMode::Normal => {
                component(wgpu::BlendFactor::SrcAlpha, wgpu::BlendFactor::OneMinusSrcAlpha)
            }
            BlendMode::Additive => component(wgpu::BlendFactor::SrcAlpha, wgpu::BlendFactor::One),
            BlendMode::Multiply => {
                component(wgpu::BlendFactor::Dst, wgpu::BlendFactor::OneMinusSrcAlpha)
            }
            BlendMode::Screen => component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrc),
        }
    };
    wgpu::BlendState {
        color,
        alpha: component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha),
    }
}

fn component(src_factor: wgpu::BlendFactor, dst_factor: wgpu::BlendFactor) -> wgpu::BlendComponent {
    wgpu::BlendComponent { src_factor, dst_factor, operation: wgpu::BlendOperation::Add }
}
