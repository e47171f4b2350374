use glam::Vec3;

use crate::scene::audio::SoundEmitter;

pub const DEFAULT_ORBIT_RADIUS: f32 = 1.0;

/// Marker circling the surface in the X-Z plane.
pub struct MarkerState {
    position: Vec3,
    start_time: Option<f64>,
    radius: f32,
}

impl Default for MarkerState {
    fn default() -> Self {
        Self::new(DEFAULT_ORBIT_RADIUS)
    }
}

impl MarkerState {
    pub fn new(radius: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            start_time: None,
            radius,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// `now` is in seconds. The first call latches the start time.
    pub fn advance(&mut self, now: f64) -> Vec3 {
        let start = *self.start_time.get_or_insert(now);
        let (sin, cos) = (now - start).sin_cos();

        self.position = Vec3::new(self.radius * sin as f32, 0.0, self.radius * cos as f32);
        self.position
    }

    pub fn advance_with(&mut self, now: f64, emitter: &mut dyn SoundEmitter) -> Vec3 {
        let position = self.advance(now);
        emitter.set_position(position);
        position
    }
}
