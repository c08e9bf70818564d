// src/rendering_lib/renderer.rs
//
// Two passes per frame: the inner scene into an offscreen colour target,
// then the outer scene onto the surface with the portal surface sampling
// that target.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::rendering_lib::compositor::SceneCompositor;
use crate::rendering_lib::geometry::ConvexPolygon;
use crate::rendering_lib::projection::{build_draw_list, DrawItem, Lighting, ViewProjection};
use crate::rendering_lib::shader::{FLAT_SHADER_SOURCE, PORTAL_SHADER_SOURCE};
use crate::rendering_lib::vertex::Vertex;

const INITIAL_VERTICES: usize = 4096;
const INITIAL_INDICES: usize = INITIAL_VERTICES * 3;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ScreenDimensionsUniform {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

impl ScreenDimensionsUniform {
    fn new(width: f32, height: f32) -> Self {
        Self { width, height, _padding1: 0.0, _padding2: 0.0 }
    }
}

/// Consecutive draw items sharing a pipeline.
#[derive(Clone, Debug, PartialEq)]
struct DrawRun {
    portal: bool,
    indices: Range<u32>,
}

fn extend_runs(runs: &mut Vec<DrawRun>, portal: bool, indices: Range<u32>) {
    match runs.last_mut() {
        Some(run) if run.portal == portal && run.indices.end == indices.start => run.indices.end = indices.end,
        _ => runs.push(DrawRun { portal, indices }),
    }
}

/// CPU-side triangles plus the GPU buffers they are uploaded into. Each
/// pass owns its own batch so both uploads survive until submit.
struct GeometryBatch {
    label: &'static str,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    runs: Vec<DrawRun>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl GeometryBatch {
    fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            label,
            vertices: Vec::with_capacity(INITIAL_VERTICES),
            indices: Vec::with_capacity(INITIAL_INDICES),
            runs: Vec::new(),
            vertex_buffer: Self::create_buffer(device, label, INITIAL_VERTICES * std::mem::size_of::<Vertex>(), wgpu::BufferUsages::VERTEX),
            index_buffer: Self::create_buffer(device, label, INITIAL_INDICES * std::mem::size_of::<u32>(), wgpu::BufferUsages::INDEX),
        }
    }

    fn create_buffer(device: &wgpu::Device, label: &str, size: usize, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.runs.clear();
    }

    fn push_polygon(&mut self, polygon: &ConvexPolygon, color: [f32; 4], portal: bool) {
        if polygon.count() < 3 {
            return;
        }
        let start_index = self.indices.len() as u32;
        let base = self.vertices.len() as u32;
        self.vertices.extend(polygon.vertices().iter().map(|&p| Vertex::new(p, color)));
        for i in 1..(polygon.count() as u32 - 1) {
            self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
        let end_index = self.indices.len() as u32;
        extend_runs(&mut self.runs, portal, start_index..end_index);
    }

    fn push_items(&mut self, items: &[DrawItem]) {
        for item in items {
            self.push_polygon(&item.polygon, item.color, item.portal);
        }
    }

    /// Grows the GPU buffers if needed, then writes this frame's data.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.indices.is_empty() {
            return;
        }
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        if vertex_bytes.len() as u64 > self.vertex_buffer.size() {
            debug!("{}: growing vertex buffer to {} bytes", self.label, vertex_bytes.len().next_power_of_two());
            self.vertex_buffer.destroy();
            self.vertex_buffer = Self::create_buffer(device, self.label, vertex_bytes.len().next_power_of_two(), wgpu::BufferUsages::VERTEX);
        }
        if index_bytes.len() as u64 > self.index_buffer.size() {
            self.index_buffer.destroy();
            self.index_buffer = Self::create_buffer(device, self.label, index_bytes.len().next_power_of_two(), wgpu::BufferUsages::INDEX);
        }
        queue.write_buffer(&self.vertex_buffer, 0, vertex_bytes);
        queue.write_buffer(&self.index_buffer, 0, index_bytes);
    }

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, flat: &'a wgpu::RenderPipeline, portal: Option<(&'a wgpu::RenderPipeline, &'a wgpu::BindGroup)>) {
        if self.indices.is_empty() {
            return;
        }
        let vertex_len = (self.vertices.len() * std::mem::size_of::<Vertex>()) as u64;
        let index_len = (self.indices.len() * std::mem::size_of::<u32>()) as u64;
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..vertex_len));
        pass.set_index_buffer(self.index_buffer.slice(..index_len), wgpu::IndexFormat::Uint32);
        for run in &self.runs {
            match (run.portal, portal) {
                (false, _) => pass.set_pipeline(flat),
                (true, Some((pipeline, texture_group))) => {
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(1, texture_group, &[]);
                }
                (true, None) => continue,
            }
            pass.draw_indexed(run.indices.clone(), 0, 0..1);
        }
    }

    fn release(&mut self) {
        self.clear();
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Offscreen colour target holding the rendered inner scene.
struct InnerTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl InnerTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Inner Scene Target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("inner_target_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        });
        Self { texture, view, bind_group, width, height }
    }
}

pub struct Renderer {
    format: wgpu::TextureFormat,
    flat_pipeline: wgpu::RenderPipeline,
    portal_pipeline: wgpu::RenderPipeline,
    screen_uniform_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    inner_target: InnerTarget,
    inner_batch: GeometryBatch,
    outer_batch: GeometryBatch,
    lighting: Lighting,
    released: bool,
}

fn pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // winding is resolved on the CPU
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn to_wgpu_color(c: [f32; 4]) -> wgpu::Color {
    wgpu::Color { r: c[0] as f64, g: c[1] as f64, b: c[2] as f64, a: c[3] as f64 }
}

impl Renderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let screen_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Dimensions Uniform Buffer"),
            contents: bytemuck::bytes_of(&ScreenDimensionsUniform::new(width as f32, height as f32)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen_dimensions_bind_group_layout"),
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
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen_dimensions_bind_group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: screen_uniform_buffer.as_entire_binding() }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("inner_target_bind_group_layout"),
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
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Inner Scene Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let flat_pipeline = pipeline(device, "Flat Pipeline", FLAT_SHADER_SOURCE, &[&screen_layout], format);
        let portal_pipeline = pipeline(
            device,
            "Portal Pipeline",
            PORTAL_SHADER_SOURCE,
            &[&screen_layout, &texture_layout],
            format,
        );
        let inner_target = InnerTarget::new(device, format, &texture_layout, &sampler, width, height);

        Self {
            format,
            flat_pipeline,
            portal_pipeline,
            screen_uniform_buffer,
            screen_bind_group,
            texture_layout,
            sampler,
            inner_target,
            inner_batch: GeometryBatch::new(device, "Inner Scene Geometry"),
            outer_batch: GeometryBatch::new(device, "Outer Scene Geometry"),
            lighting: Lighting::default(),
            released: false,
        }
    }

    /// Keeps the offscreen target the same size as the output surface.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.released || width == 0 || height == 0 {
            return;
        }
        if self.inner_target.width == width && self.inner_target.height == height {
            return;
        }
        self.inner_target.texture.destroy();
        self.inner_target = InnerTarget::new(device, self.format, &self.texture_layout, &self.sampler, width, height);
    }

    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
        compositor: &SceneCompositor,
        view: &ViewProjection,
    ) {
        if self.released {
            return;
        }
        queue.write_buffer(
            &self.screen_uniform_buffer,
            0,
            bytemuck::bytes_of(&ScreenDimensionsUniform::new(view.width, view.height)),
        );

        // Inner scene, only while the portal surface is on screen.
        self.inner_batch.clear();
        let draw_inner = compositor.portal_visible();
        if draw_inner {
            let items = build_draw_list(compositor.inner(), view, &self.lighting);
            self.inner_batch.push_items(&items);
            self.inner_batch.upload(device, queue);
        }

        // Outer scene: occlusion overlay first, then painter-ordered objects.
        self.outer_batch.clear();
        if let Some(color) = compositor.overlay_color() {
            self.outer_batch.push_polygon(&ConvexPolygon::viewport(view.width, view.height), color, false);
        }
        let items = build_draw_list(compositor.outer(), view, &self.lighting);
        self.outer_batch.push_items(&items);
        self.outer_batch.upload(device, queue);

        if draw_inner {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Inner Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.inner_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(compositor.inner_clear_color())),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.screen_bind_group, &[]);
            self.inner_batch.draw(&mut pass, &self.flat_pipeline, None);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Outer Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color([0.0, 0.0, 0.0, compositor.clear_alpha()])),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.screen_bind_group, &[]);
            let portal = draw_inner.then_some((&self.portal_pipeline, &self.inner_target.bind_group));
            self.outer_batch.draw(&mut pass, &self.flat_pipeline, portal);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Frees GPU buffers and the offscreen target. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            warn!("renderer already released");
            return;
        }
        self.inner_batch.release();
        self.outer_batch.release();
        self.inner_target.texture.destroy();
        self.screen_uniform_buffer.destroy();
        self.released = true;
        debug!("renderer resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_items_share_a_run() {
        let mut runs = Vec::new();
        for (portal, range) in [(false, 0..3), (false, 3..6), (true, 6..9), (false, 9..12)] {
            extend_runs(&mut runs, portal, range);
        }
        assert_eq!(
            runs,
            vec![
                DrawRun { portal: false, indices: 0..6 },
                DrawRun { portal: true, indices: 6..9 },
                DrawRun { portal: false, indices: 9..12 },
            ]
        );
    }

    #[test]
    fn uniform_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<ScreenDimensionsUniform>(), 16);
    }
}
