pub mod mesh;
pub mod sphere;
pub mod surface;

pub use mesh::{SphereMesh, SurfaceMesh, TriangleMesh};
pub use surface::{MAX_SURFACE_VERTICES, SurfaceParams};
