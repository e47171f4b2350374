//! Per-frame composition of the anaglyph scene.
//!
//! [`plan_frame`] does all of the math for one frame (eye transforms, channel
//! masks, marker motion) and hands the GPU side a [`FramePlan`] to execute.

use glam::{Mat4, Vec3};

use crate::renderer::camera::{Eye, EyeTransform};
use crate::scene::{SceneState, StereoMode};

pub const FILL_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
pub const LINE_COLOR: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
pub const MARKER_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

const REORIENT_AXIS: Vec3 = Vec3::new(0.707, 0.707, 0.0);
const REORIENT_ANGLE: f32 = 0.7;
const PULL_BACK: f32 = -5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMask {
    Red,
    Cyan,
    All,
}

impl ChannelMask {
    pub fn for_eye(eye: Eye) -> Self {
        match eye {
            Eye::Left => ChannelMask::Red,
            Eye::Right => ChannelMask::Cyan,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EyePass {
    pub eye: Option<Eye>,
    pub mask: ChannelMask,
    pub surface_mvp: Mat4,
    pub normal_matrix: Mat4,
    pub marker_mvp: Mat4,
    pub marker_position: Vec3,
}

#[derive(Clone, Debug)]
pub struct FramePlan {
    pub background: bool,
    pub draw_fill: bool,
    pub draw_wireframe: bool,
    pub lighting: bool,
    pub passes: Vec<EyePass>,
}

/// Fixed reorientation and pull-back applied on top of the user's rotation.
pub fn model_view(rotation: Mat4) -> Mat4 {
    let reorient = Mat4::from_axis_angle(REORIENT_AXIS.normalize(), REORIENT_ANGLE);
    let pull_back = Mat4::from_translation(Vec3::new(0.0, 0.0, PULL_BACK));
    pull_back * reorient * rotation
}

fn eye_pass(
    scene: &mut SceneState,
    eye: Option<Eye>,
    transform: EyeTransform,
    model_view: Mat4,
    now: f64,
) -> EyePass {
    debug_assert!(transform.frustum.is_valid(), "{:?}", transform.frustum);
    let view = transform.view * model_view;
    let surface_mvp = transform.view_projection() * model_view;
    let marker_position = scene.marker.advance_with(now, &mut scene.panner);

    EyePass {
        eye,
        mask: eye.map_or(ChannelMask::All, ChannelMask::for_eye),
        surface_mvp,
        normal_matrix: view.inverse().transpose(),
        marker_mvp: surface_mvp * Mat4::from_translation(marker_position),
        marker_position,
    }
}

pub fn plan_frame(scene: &mut SceneState, now: f64, background_ready: bool) -> FramePlan {
    let model_view = model_view(scene.trackball.view_matrix());

    let mode = scene.display.stereo_mode;
    let passes = match mode {
        StereoMode::Anaglyph => Eye::BOTH
            .iter()
            .map(|&eye| {
                let transform = scene.camera.apply(eye);
                eye_pass(scene, Some(eye), transform, model_view, now)
            })
            .collect(),
        StereoMode::Mono => {
            let transform = scene.camera.mono();
            vec![eye_pass(scene, None, transform, model_view, now)]
        }
    };

    FramePlan {
        background: background_ready,
        draw_fill: scene.display.show_fill,
        draw_wireframe: scene.display.show_wireframe,
        lighting: scene.display.lighting,
        passes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::renderer::camera::StereoSettings;

    fn scene() -> SceneState {
        SceneState::new(&SceneConfig::default()).unwrap()
    }

    #[test_log::test]
    fn anaglyph_draws_left_then_right_with_channel_masks() {
        let mut scene = scene();
        let plan = plan_frame(&mut scene, 0.0, false);

        assert_eq!(plan.passes.len(), 2);
        assert_eq!(plan.passes[0].eye, Some(Eye::Left));
        assert_eq!(plan.passes[0].mask, ChannelMask::Red);
        assert_eq!(plan.passes[1].eye, Some(Eye::Right));
        assert_eq!(plan.passes[1].mask, ChannelMask::Cyan);
        assert!(!plan.background);
    }

    #[test_log::test]
    fn eye_matrices_come_from_the_stereo_camera() {
        let mut scene = scene();
        let plan = plan_frame(&mut scene, 0.0, true);
        let mv = model_view(Mat4::IDENTITY);

        let settings = *scene.camera.settings();
        for pass in &plan.passes {
            let eye = pass.eye.unwrap();
            let transform = EyeTransform::for_eye(&settings, eye);
            let expected = transform.projection * transform.view * mv;
            assert!(pass.surface_mvp.abs_diff_eq(expected, 1e-5));
        }
        assert!(plan.background);
    }

    #[test]
    fn mono_mode_uses_a_single_unmasked_pass() {
        let mut scene = scene();
        scene.display.stereo_mode = StereoMode::Mono;
        let plan = plan_frame(&mut scene, 0.0, false);

        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].mask, ChannelMask::All);
        assert_eq!(plan.passes[0].eye, None);
    }

    #[test]
    fn marker_is_advanced_and_reported_to_the_panner() {
        let mut scene = scene();
        plan_frame(&mut scene, 10.0, false);
        let plan = plan_frame(&mut scene, 10.0 + std::f64::consts::PI, false);

        for pass in &plan.passes {
            assert!((pass.marker_position - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        }
        assert_eq!(scene.panner.position(), plan.passes[1].marker_position);
    }

    #[test]
    fn model_view_pulls_the_surface_back() {
        let origin = model_view(Mat4::IDENTITY).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-6);
    }

    #[test]
    fn surface_center_lands_inside_both_frusta() {
        let mut scene = scene();
        scene.camera.set_aspect(StereoSettings::default().aspect).unwrap();
        let plan = plan_frame(&mut scene, 0.0, false);

        for pass in &plan.passes {
            let ndc = pass.surface_mvp.project_point3(Vec3::ZERO);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{:?}", ndc);
            assert!((0.0..=1.0).contains(&ndc.z), "{:?}", ndc);
        }
    }
}
