//! Asymmetric-frustum stereo camera.
//!
//! Both eyes share the same convergence plane; each eye gets an off-axis
//! frustum whose horizontal extents are shifted by half the eye separation,
//! and a view matrix that moves the world opposite to the eye's offset.

use glam::{Mat4, Vec3, Vec4};

use crate::error::{SceneError, SceneResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Signed offset of the eye along camera-local X, in units of half the separation.
    fn side(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoSettings {
    pub convergence: f32,
    pub eye_separation: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Default for StereoSettings {
    fn default() -> Self {
        Self {
            convergence: 1.0,
            eye_separation: 1.0,
            fov: 45.0_f32.to_radians(),
            near: 2.0,
            far: 30.0,
            aspect: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Frustum {
    pub fn for_eye(settings: &StereoSettings, eye: Eye) -> Self {
        let tan_half = (settings.fov * 0.5).tan();
        let top = settings.near * tan_half;
        let a = settings.aspect * tan_half * settings.convergence;
        let b = a + eye.side() * settings.eye_separation * 0.5;
        let scale = settings.near / settings.convergence;

        Self {
            left: -b * scale,
            right: (2.0 * a - b) * scale,
            bottom: -top,
            top,
            near: settings.near,
            far: settings.far,
        }
    }

    pub fn symmetric(settings: &StereoSettings) -> Self {
        let top = settings.near * (settings.fov * 0.5).tan();
        let right = top * settings.aspect;
        Self {
            left: -right,
            right,
            bottom: -top,
            top,
            near: settings.near,
            far: settings.far,
        }
    }

    pub fn is_valid(&self) -> bool {
        let values = [
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        ];
        values.iter().all(|v| v.is_finite())
            && self.left < self.right
            && self.bottom < self.top
            && 0.0 < self.near
            && self.near < self.far
    }

    /// Right-handed off-axis projection mapping depth to `[0, 1]`.
    pub fn projection(&self) -> Mat4 {
        let width = self.right - self.left;
        let height = self.top - self.bottom;
        let depth = self.near - self.far;

        Mat4::from_cols(
            Vec4::new(2.0 * self.near / width, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * self.near / height, 0.0, 0.0),
            Vec4::new(
                (self.right + self.left) / width,
                (self.top + self.bottom) / height,
                self.far / depth,
                -1.0,
            ),
            Vec4::new(0.0, 0.0, self.near * self.far / depth, 0.0),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeTransform {
    pub frustum: Frustum,
    pub projection: Mat4,
    pub view: Mat4,
}

impl EyeTransform {
    pub fn for_eye(settings: &StereoSettings, eye: Eye) -> Self {
        let frustum = Frustum::for_eye(settings, eye);
        // The eye sits at side * sep / 2, so the world moves the other way.
        let offset = -eye.side() * settings.eye_separation * 0.5;

        Self {
            frustum,
            projection: frustum.projection(),
            view: Mat4::from_translation(Vec3::new(offset, 0.0, 0.0)),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

pub struct StereoCamera {
    settings: StereoSettings,
    cached: Option<[EyeTransform; 2]>,
}

impl Default for StereoCamera {
    fn default() -> Self {
        Self::new(StereoSettings::default())
    }
}

impl StereoCamera {
    pub fn new(settings: StereoSettings) -> Self {
        Self {
            settings,
            cached: None,
        }
    }

    pub fn try_new(settings: StereoSettings) -> SceneResult<Self> {
        positive("convergence", settings.convergence)?;
        positive("eye separation", settings.eye_separation)?;
        positive("aspect ratio", settings.aspect)?;
        check_fov(settings.fov)?;
        check_clip_range(
            positive("near clip distance", settings.near)?,
            positive("far clip distance", settings.far)?,
        )?;
        Ok(Self::new(settings))
    }

    pub fn settings(&self) -> &StereoSettings {
        &self.settings
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    pub fn set_convergence(&mut self, convergence: f32) -> SceneResult<()> {
        self.settings.convergence = positive("convergence", convergence)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_eye_separation(&mut self, separation: f32) -> SceneResult<()> {
        self.settings.eye_separation = positive("eye separation", separation)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_fov(&mut self, fov: f32) -> SceneResult<()> {
        self.settings.fov = check_fov(fov)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_near_clip(&mut self, near: f32) -> SceneResult<()> {
        let near = positive("near clip distance", near)?;
        check_clip_range(near, self.settings.far)?;
        self.settings.near = near;
        self.invalidate();
        Ok(())
    }

    pub fn set_far_clip(&mut self, far: f32) -> SceneResult<()> {
        let far = positive("far clip distance", far)?;
        check_clip_range(self.settings.near, far)?;
        self.settings.far = far;
        self.invalidate();
        Ok(())
    }

    pub fn set_aspect(&mut self, aspect: f32) -> SceneResult<()> {
        self.settings.aspect = positive("aspect ratio", aspect)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }

    fn eyes(&mut self) -> &[EyeTransform; 2] {
        let settings = self.settings;
        self.cached.get_or_insert_with(|| {
            [
                EyeTransform::for_eye(&settings, Eye::Left),
                EyeTransform::for_eye(&settings, Eye::Right),
            ]
        })
    }

    pub fn apply_left_frustum(&mut self) -> EyeTransform {
        self.eyes()[0]
    }

    pub fn apply_right_frustum(&mut self) -> EyeTransform {
        self.eyes()[1]
    }

    pub fn apply(&mut self, eye: Eye) -> EyeTransform {
        match eye {
            Eye::Left => self.apply_left_frustum(),
            Eye::Right => self.apply_right_frustum(),
        }
    }

    pub fn mono(&self) -> EyeTransform {
        let frustum = Frustum::symmetric(&self.settings);
        EyeTransform {
            frustum,
            projection: frustum.projection(),
            view: Mat4::IDENTITY,
        }
    }
}

fn positive(name: &str, value: f32) -> SceneResult<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SceneError::MalformedParameter(format!(
            "{} must be a positive number (got {})",
            name, value
        )))
    }
}

fn check_fov(fov: f32) -> SceneResult<f32> {
    let fov = positive("field of view", fov)?;
    if fov >= std::f32::consts::PI {
        return Err(SceneError::MalformedParameter(format!(
            "field of view must be below 180 degrees (got {:.1})",
            fov.to_degrees()
        )));
    }
    Ok(fov)
}

fn check_clip_range(near: f32, far: f32) -> SceneResult<()> {
    if near >= far {
        return Err(SceneError::MalformedParameter(format!(
            "near clip distance {} must be below the far clip distance {}",
            near, far
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-5), "{:?} != {:?}", a, b);
    }

    #[test]
    fn reference_scenario_produces_valid_frusta() {
        let settings = StereoSettings::default();
        let left = Frustum::for_eye(&settings, Eye::Left);
        let right = Frustum::for_eye(&settings, Eye::Right);

        assert!(left.is_valid(), "{:?}", left);
        assert!(right.is_valid(), "{:?}", right);

        let a = (22.5_f32).to_radians().tan();
        assert!((left.left - -(a - 0.5) * 2.0).abs() < 1e-5);
        assert!((left.right - (a + 0.5) * 2.0).abs() < 1e-5);
        assert!((right.left + left.right).abs() < 1e-5);
        assert!((right.right + left.left).abs() < 1e-5);
        assert!((left.top - 2.0 * a).abs() < 1e-5);
    }

    #[test]
    fn negated_separation_swaps_the_eyes() {
        let settings = StereoSettings {
            convergence: 3.0,
            eye_separation: 0.4,
            fov: 1.1,
            near: 0.5,
            far: 40.0,
            aspect: 1.6,
        };
        let swapped = StereoSettings {
            eye_separation: -settings.eye_separation,
            ..settings
        };

        let left = EyeTransform::for_eye(&settings, Eye::Left);
        let right = EyeTransform::for_eye(&settings, Eye::Right);
        let swapped_left = EyeTransform::for_eye(&swapped, Eye::Left);
        let swapped_right = EyeTransform::for_eye(&swapped, Eye::Right);

        assert_mat_eq(swapped_left.projection, right.projection);
        assert_mat_eq(swapped_left.view, right.view);
        assert_mat_eq(swapped_right.projection, left.projection);
        assert_mat_eq(swapped_right.view, left.view);
    }

    #[test]
    fn eyes_are_offset_in_opposite_directions() {
        let settings = StereoSettings::default();
        let left = EyeTransform::for_eye(&settings, Eye::Left);
        let right = EyeTransform::for_eye(&settings, Eye::Right);

        // Left eye at x = -sep/2 sees the origin shifted to +sep/2.
        let origin_left = left.view.transform_point3(Vec3::ZERO);
        let origin_right = right.view.transform_point3(Vec3::ZERO);
        assert!((origin_left.x - 0.5).abs() < 1e-6);
        assert!((origin_right.x + 0.5).abs() < 1e-6);
    }

    #[test]
    fn symmetric_frustum_matches_glam_perspective() {
        let settings = StereoSettings {
            aspect: 16.0 / 9.0,
            ..StereoSettings::default()
        };
        let expected = Mat4::perspective_rh(settings.fov, settings.aspect, settings.near, settings.far);
        assert_mat_eq(Frustum::symmetric(&settings).projection(), expected);
    }

    #[test]
    fn near_plane_maps_to_zero_depth() {
        let frustum = Frustum::for_eye(&StereoSettings::default(), Eye::Left);
        let projection = frustum.projection();

        let near = projection.project_point3(Vec3::new(0.0, 0.0, -frustum.near));
        let far = projection.project_point3(Vec3::new(0.0, 0.0, -frustum.far));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);

        let corner = projection.project_point3(Vec3::new(frustum.left, frustum.bottom, -frustum.near));
        assert!((corner.x + 1.0).abs() < 1e-5);
        assert!((corner.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn any_change_invalidates_the_cache() {
        let mut camera = StereoCamera::default();
        let before = camera.apply_left_frustum();
        assert!(camera.is_cached());

        camera.set_fov(60.0_f32.to_radians()).unwrap();
        assert!(!camera.is_cached());
        let after = camera.apply_left_frustum();
        assert_ne!(before.projection, after.projection);

        camera.apply_right_frustum();
        camera.set_near_clip(1.0).unwrap();
        assert!(!camera.is_cached());
        camera.apply(Eye::Right);
        camera.set_eye_separation(0.2).unwrap();
        assert!(!camera.is_cached());
        camera.apply(Eye::Left);
        camera.set_convergence(4.0).unwrap();
        assert!(!camera.is_cached());
    }

    #[test]
    fn rejected_values_leave_settings_untouched() {
        let mut camera = StereoCamera::default();
        let original = *camera.settings();

        assert!(camera.set_convergence(0.0).is_err());
        assert!(camera.set_eye_separation(-1.0).is_err());
        assert!(camera.set_fov(f32::NAN).is_err());
        assert!(camera.set_fov(std::f32::consts::PI).is_err());
        assert!(camera.set_near_clip(30.0).is_err());
        assert!(camera.set_far_clip(1.0).is_err());

        assert_eq!(*camera.settings(), original);
    }

    #[test]
    fn try_new_validates_every_field() {
        assert!(StereoCamera::try_new(StereoSettings::default()).is_ok());
        let bad = StereoSettings {
            near: 50.0,
            ..StereoSettings::default()
        };
        assert!(StereoCamera::try_new(bad).is_err());
    }
}
