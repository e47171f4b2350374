pub mod background;
pub mod buffers;
pub mod camera;
pub mod gpu;
pub mod trackball;

pub use background::{FrameSource, StillImageFeed, TestPatternFeed};
pub use gpu::GpuState;
