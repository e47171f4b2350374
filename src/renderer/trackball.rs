use glam::{Mat4, Quat, Vec2, Vec3};

/// Virtual-sphere rotator driven by pointer drags.
pub struct Trackball {
    rotation: Quat,
    anchor: Option<Vec3>,
    viewport: Vec2,
}

impl Default for Trackball {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            anchor: None,
            viewport: Vec2::new(1.0, 1.0),
        }
    }
}

impl Trackball {
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn begin_drag(&mut self, cursor: Vec2) {
        self.anchor = Some(self.project(cursor));
    }

    /// Returns `true` when the rotation changed.
    pub fn drag_to(&mut self, cursor: Vec2) -> bool {
        let Some(anchor) = self.anchor else {
            return false;
        };

        let current = self.project(cursor);
        let axis = anchor.cross(current);
        if axis.length_squared() < 1e-12 {
            return false;
        }

        let angle = anchor.dot(current).clamp(-1.0, 1.0).acos();
        self.rotation = (Quat::from_axis_angle(axis.normalize(), angle) * self.rotation).normalize();
        self.anchor = Some(current);
        true
    }

    pub fn end_drag(&mut self) {
        self.anchor = None;
    }

    pub fn reset(&mut self) {
        self.rotation = Quat::IDENTITY;
        self.anchor = None;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation)
    }

    // Cursor in pixels (origin top-left) onto the unit sphere, or its rim when outside.
    fn project(&self, cursor: Vec2) -> Vec3 {
        let scale = self.viewport.min_element();
        let x = (2.0 * cursor.x - self.viewport.x) / scale;
        let y = (self.viewport.y - 2.0 * cursor.y) / scale;

        let d2 = x * x + y * y;
        if d2 <= 1.0 {
            Vec3::new(x, y, (1.0 - d2).sqrt())
        } else {
            Vec3::new(x, y, 0.0).normalize()
        }
    }
}
