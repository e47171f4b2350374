use std::ops::Range;

pub struct TriangleMesh {
    pub vertices: Vec<f32>,
    pub normals: Option<Vec<f32>>,
}

impl TriangleMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }
}

/// Surface tessellation plus the per-row vertex ranges used for the wireframe overlay.
pub struct SurfaceMesh {
    pub mesh: TriangleMesh,
    pub line_strips: Vec<Range<u32>>,
}

impl SurfaceMesh {
    pub fn horizontal_steps(&self) -> usize {
        self.line_strips.len()
    }
}

pub struct SphereMesh {
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
