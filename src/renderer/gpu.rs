use log::{info, trace};

use crate::error::{SceneError, SceneResult};
use crate::renderer::background::{BackgroundTexture, Frame};
use crate::renderer::buffers::{
    DrawUniform, MAX_DRAWS_PER_FRAME, SceneBuffers, UNIFORM_SLOT, normal_layout, position_layout,
    textured_layout,
};
use crate::scene::SceneState;
use crate::scene::frame::{ChannelMask, FILL_COLOR, FramePlan, LINE_COLOR, MARKER_COLOR};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub fn color_writes(mask: ChannelMask) -> wgpu::ColorWrites {
    match mask {
        ChannelMask::Red => wgpu::ColorWrites::RED,
        ChannelMask::Cyan => wgpu::ColorWrites::GREEN | wgpu::ColorWrites::BLUE,
        ChannelMask::All => wgpu::ColorWrites::ALL,
    }
}

/// Fill, wireframe and marker pipelines sharing one color write mask.
struct MaskedPipelines {
    fill: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    marker: wgpu::RenderPipeline,
}

struct PipelineDesc<'a> {
    label: &'a str,
    vertex_entry: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'static>],
    topology: wgpu::PrimitiveTopology,
    write_mask: wgpu::ColorWrites,
    depth: bool,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    desc: PipelineDesc,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(desc.vertex_entry),
            buffers: desc.buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: desc.write_mask,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: desc.depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl MaskedPipelines {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        mask: ChannelMask,
    ) -> Self {
        let write_mask = color_writes(mask);
        let fill = create_pipeline(
            device,
            layout,
            shader,
            format,
            PipelineDesc {
                label: "Surface Fill Pipeline",
                vertex_entry: "vs_lit",
                buffers: &[position_layout(), normal_layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                write_mask,
                depth: true,
            },
        );
        let lines = create_pipeline(
            device,
            layout,
            shader,
            format,
            PipelineDesc {
                label: "Surface Wireframe Pipeline",
                vertex_entry: "vs_flat",
                buffers: &[position_layout()],
                topology: wgpu::PrimitiveTopology::LineStrip,
                write_mask,
                depth: true,
            },
        );
        let marker = create_pipeline(
            device,
            layout,
            shader,
            format,
            PipelineDesc {
                label: "Marker Pipeline",
                vertex_entry: "vs_flat",
                buffers: &[position_layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                write_mask,
                depth: true,
            },
        );
        Self { fill, lines, marker }
    }
}

struct EyeSlots {
    fill: u32,
    lines: u32,
    marker: u32,
}

pub struct GpuState {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pub adapter_name: String,

    red: MaskedPipelines,
    cyan: MaskedPipelines,
    full: MaskedPipelines,
    background_pipeline: wgpu::RenderPipeline,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,

    pub background: BackgroundTexture,
    pub buffers: SceneBuffers,

    depth_texture: wgpu::TextureView,
}

impl GpuState {
    pub async fn new(
        window: std::sync::Arc<winit::window::Window>,
        vsync: bool,
    ) -> SceneResult<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| SceneError::DeviceUnavailable(format!("no drawing surface: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| SceneError::DeviceUnavailable("no compatible adapter".to_string()))?;

        let adapter_info = adapter.get_info();
        let adapter_name = format!("{} ({:?})", adapter_info.name, adapter_info.backend);
        info!("Using adapter {}", adapter_name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| SceneError::DeviceUnavailable(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| SceneError::DeviceUnavailable("surface has no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });
        if let Some(error) = device.pop_error_scope().await {
            return Err(SceneError::ShaderCompile(error.to_string()));
        }

        let uniform_size = std::mem::size_of::<DrawUniform>() as u64;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniform Buffer"),
            size: UNIFORM_SLOT * MAX_DRAWS_PER_FRAME,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(uniform_size),
                }),
            }],
        });

        let texture_layout = BackgroundTexture::bind_group_layout(&device);
        let background = BackgroundTexture::new(&device, &queue, &texture_layout);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let format = config.format;
        let red = MaskedPipelines::new(&device, &pipeline_layout, &shader, format, ChannelMask::Red);
        let cyan =
            MaskedPipelines::new(&device, &pipeline_layout, &shader, format, ChannelMask::Cyan);
        let full = MaskedPipelines::new(&device, &pipeline_layout, &shader, format, ChannelMask::All);
        let background_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            PipelineDesc {
                label: "Background Pipeline",
                vertex_entry: "vs_textured",
                buffers: &[textured_layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                write_mask: wgpu::ColorWrites::ALL,
                depth: false,
            },
        );
        if let Some(error) = device.pop_error_scope().await {
            return Err(SceneError::ShaderLink(error.to_string()));
        }

        let buffers = SceneBuffers::new(&device);
        let depth_texture = Self::create_depth_texture(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            adapter_name,
            red,
            cyan,
            full,
            background_pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            background,
            buffers,
            depth_texture,
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
    ) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = Self::create_depth_texture(&self.device, &self.config);
        }
    }

    pub fn set_vsync(&mut self, enabled: bool) {
        self.config.present_mode = present_mode(enabled);
        self.surface.configure(&self.device, &self.config);
    }

    /// Moves freshly generated meshes from the scene into GPU buffers.
    pub fn upload_pending(&mut self, scene: &mut SceneState) -> SceneResult<()> {
        if !scene.has_pending_geometry() {
            return Ok(());
        }
        if let Some(surface) = scene.take_pending_surface() {
            self.buffers.upload_surface(&self.queue, &surface)?;
        }
        if let Some(marker) = scene.take_pending_marker() {
            self.buffers.upload_marker(&self.device, &marker);
        }
        Ok(())
    }

    pub fn update_background(&mut self, frame: &Frame) -> SceneResult<()> {
        self.background
            .update(&self.device, &self.queue, &self.texture_layout, frame)
    }

    fn pipelines(&self, mask: ChannelMask) -> &MaskedPipelines {
        match mask {
            ChannelMask::Red => &self.red,
            ChannelMask::Cyan => &self.cyan,
            ChannelMask::All => &self.full,
        }
    }

    fn write_uniforms(&self, uniforms: &[DrawUniform]) {
        let mut bytes = vec![0u8; uniforms.len() * UNIFORM_SLOT as usize];
        for (slot, uniform) in bytes.chunks_mut(UNIFORM_SLOT as usize).zip(uniforms) {
            let data = bytemuck::bytes_of(uniform);
            slot[..data.len()].copy_from_slice(data);
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &bytes);
    }

    /// Records the whole scene for one frame: background, then every eye pass
    /// with its own depth clear and color mask.
    pub fn draw_scene(
        &self,
        plan: &FramePlan,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
    ) -> SceneResult<()> {
        let mut uniforms = Vec::new();
        let mut push = |uniform: DrawUniform| {
            uniforms.push(uniform);
            ((uniforms.len() - 1) as u64 * UNIFORM_SLOT) as u32
        };

        let background_slot = plan.background.then(|| push(DrawUniform::textured()));
        let lit = plan.lighting && self.buffers.surface_has_normals;
        let eye_slots: Vec<EyeSlots> = plan
            .passes
            .iter()
            .map(|pass| EyeSlots {
                fill: push(if lit {
                    DrawUniform::lit(pass.surface_mvp, pass.normal_matrix, FILL_COLOR)
                } else {
                    DrawUniform::flat(pass.surface_mvp, FILL_COLOR)
                }),
                lines: push(DrawUniform::flat(pass.surface_mvp, LINE_COLOR)),
                marker: push(DrawUniform::flat(pass.marker_mvp, MARKER_COLOR)),
            })
            .collect();

        if uniforms.len() as u64 > MAX_DRAWS_PER_FRAME {
            return Err(SceneError::MalformedParameter(format!(
                "{} draws requested, uniform buffer holds {}",
                uniforms.len(),
                MAX_DRAWS_PER_FRAME
            )));
        }
        self.write_uniforms(&uniforms);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Background Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(offset) = background_slot {
                render_pass.set_pipeline(&self.background_pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                render_pass.set_bind_group(1, &self.background.bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.buffers.background_buffer.slice(..));
                render_pass.draw(0..6, 0..1);
            }
        }

        for (pass, slots) in plan.passes.iter().zip(&eye_slots) {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Eye Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let pipelines = self.pipelines(pass.mask);
            render_pass.set_bind_group(1, &self.background.bind_group, &[]);

            if self.buffers.surface_ready() {
                let vertices = self.buffers.surface_vertex_buffer.slice(..);

                if plan.draw_fill {
                    render_pass.set_pipeline(&pipelines.fill);
                    render_pass.set_bind_group(0, &self.uniform_bind_group, &[slots.fill]);
                    render_pass.set_vertex_buffer(0, vertices);
                    render_pass.set_vertex_buffer(1, self.buffers.surface_normal_buffer.slice(..));
                    render_pass.draw(0..self.buffers.surface_vertex_count, 0..1);
                }

                if plan.draw_wireframe {
                    render_pass.set_pipeline(&pipelines.lines);
                    render_pass.set_bind_group(0, &self.uniform_bind_group, &[slots.lines]);
                    render_pass.set_vertex_buffer(0, vertices);
                    for strip in &self.buffers.line_strips {
                        render_pass.draw(strip.clone(), 0..1);
                    }
                }
            }

            match (&self.buffers.marker_vertex_buffer, &self.buffers.marker_index_buffer) {
                (Some(vertices), Some(indices)) if self.buffers.marker_ready() => {
                    render_pass.set_pipeline(&pipelines.marker);
                    render_pass.set_bind_group(0, &self.uniform_bind_group, &[slots.marker]);
                    render_pass.set_vertex_buffer(0, vertices.slice(..));
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..self.buffers.marker_index_count, 0, 0..1);
                }
                _ => trace!("Marker buffers not uploaded, skipping marker"),
            }
        }

        Ok(())
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anaglyph_masks_split_the_channels() {
        let red = color_writes(ChannelMask::Red);
        let cyan = color_writes(ChannelMask::Cyan);

        assert_eq!(red, wgpu::ColorWrites::RED);
        assert!(cyan.contains(wgpu::ColorWrites::GREEN | wgpu::ColorWrites::BLUE));
        assert!(!cyan.contains(wgpu::ColorWrites::RED));
        assert!((red & cyan).is_empty());
        assert_eq!(color_writes(ChannelMask::All), wgpu::ColorWrites::ALL);
    }

    #[test]
    fn vsync_selects_present_mode() {
        assert_eq!(present_mode(true), wgpu::PresentMode::AutoVsync);
        assert_eq!(present_mode(false), wgpu::PresentMode::AutoNoVsync);
    }
}
