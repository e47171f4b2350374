use std::ops::Range;

use glam::Mat4;
use log::debug;
use wgpu::util::DeviceExt;

use crate::error::{SceneError, SceneResult};
use crate::math::{MAX_SURFACE_VERTICES, SphereMesh, SurfaceMesh};

/// Stride between per-draw uniform blocks in the dynamic uniform buffer.
pub const UNIFORM_SLOT: u64 = 256;
/// Background, plus fill, lines and marker for each of the two eyes, with room to spare.
pub const MAX_DRAWS_PER_FRAME: u64 = 16;

pub const FLAG_TEXTURED: u32 = 1;
pub const FLAG_LIT: u32 = 2;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub mvp: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub flags: [u32; 4],
}

impl DrawUniform {
    pub fn flat(mvp: Mat4, color: [f32; 4]) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            normal_matrix: Mat4::IDENTITY.to_cols_array_2d(),
            color,
            flags: [0; 4],
        }
    }

    pub fn lit(mvp: Mat4, normal_matrix: Mat4, color: [f32; 4]) -> Self {
        Self {
            normal_matrix: normal_matrix.to_cols_array_2d(),
            flags: [FLAG_LIT, 0, 0, 0],
            ..Self::flat(mvp, color)
        }
    }

    pub fn textured() -> Self {
        Self {
            flags: [FLAG_TEXTURED, 0, 0, 0],
            ..Self::flat(Mat4::IDENTITY, [1.0; 4])
        }
    }
}

/// Full-screen quad as two triangles, interleaved `[x, y, z, u, v]`.
/// Image row 0 maps to the top of the screen.
#[rustfmt::skip]
pub const BACKGROUND_QUAD: [f32; 30] = [
    -1.0, -1.0, 0.0,  0.0, 1.0,
     1.0, -1.0, 0.0,  1.0, 1.0,
    -1.0,  1.0, 0.0,  0.0, 0.0,
    -1.0,  1.0, 0.0,  0.0, 0.0,
     1.0, -1.0, 0.0,  1.0, 1.0,
     1.0,  1.0, 0.0,  1.0, 0.0,
];

pub fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    }
}

pub fn normal_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        }],
    }
}

pub fn textured_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 20,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    }
}

pub struct SceneBuffers {
    pub surface_vertex_buffer: wgpu::Buffer,
    pub surface_normal_buffer: wgpu::Buffer,
    pub surface_vertex_count: u32,
    pub surface_has_normals: bool,
    pub line_strips: Vec<Range<u32>>,

    pub marker_vertex_buffer: Option<wgpu::Buffer>,
    pub marker_index_buffer: Option<wgpu::Buffer>,
    pub marker_index_count: u32,

    pub background_buffer: wgpu::Buffer,
}

impl SceneBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        let surface_vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Vertex Buffer"),
            size: (MAX_SURFACE_VERTICES * 3 * 4) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let surface_normal_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Normal Buffer"),
            size: (MAX_SURFACE_VERTICES * 3 * 4) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let background_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Background Quad Buffer"),
            contents: bytemuck::cast_slice(&BACKGROUND_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            surface_vertex_buffer,
            surface_normal_buffer,
            surface_vertex_count: 0,
            surface_has_normals: false,
            line_strips: Vec::new(),
            marker_vertex_buffer: None,
            marker_index_buffer: None,
            marker_index_count: 0,
            background_buffer,
        }
    }

    pub fn upload_surface(&mut self, queue: &wgpu::Queue, surface: &SurfaceMesh) -> SceneResult<()> {
        let vertex_count = surface.mesh.vertex_count();
        if vertex_count > MAX_SURFACE_VERTICES {
            return Err(SceneError::MalformedParameter(format!(
                "surface has {} vertices, buffers hold {}",
                vertex_count, MAX_SURFACE_VERTICES
            )));
        }

        queue.write_buffer(
            &self.surface_vertex_buffer,
            0,
            bytemuck::cast_slice(&surface.mesh.vertices),
        );

        self.surface_has_normals = match &surface.mesh.normals {
            Some(normals) => {
                queue.write_buffer(&self.surface_normal_buffer, 0, bytemuck::cast_slice(normals));
                true
            }
            None => false,
        };

        self.surface_vertex_count = vertex_count as u32;
        self.line_strips = surface.line_strips.clone();
        debug!(
            "Uploaded surface: {} vertices, {} strips",
            vertex_count,
            self.line_strips.len()
        );
        Ok(())
    }

    pub fn upload_marker(&mut self, device: &wgpu::Device, sphere: &SphereMesh) {
        self.marker_vertex_buffer = Some(device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Marker Vertex Buffer"),
                contents: bytemuck::cast_slice(&sphere.positions),
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
        self.marker_index_buffer = Some(device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Marker Index Buffer"),
                contents: bytemuck::cast_slice(&sphere.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        ));
        self.marker_index_count = sphere.index_count();
    }

    pub fn surface_ready(&self) -> bool {
        self.surface_vertex_count > 0
    }

    pub fn marker_ready(&self) -> bool {
        self.marker_vertex_buffer.is_some() && self.marker_index_count > 0
    }
}
