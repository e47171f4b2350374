use crate::config::SceneConfig;
use crate::math::SurfaceParams;
use crate::renderer::camera::StereoSettings;
use crate::scene::{DisplayOptions, ParameterChange};

/// Slider values for the stereo camera, in the units shown to the user.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoSliders {
    pub convergence: f32,
    pub eye_separation: f32,
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl StereoSliders {
    /// One change per slider that moved, in panel order.
    pub fn changes_since(&self, before: &StereoSliders) -> Vec<ParameterChange> {
        let mut changes = Vec::new();
        if self.convergence != before.convergence {
            changes.push(ParameterChange::Convergence(self.convergence));
        }
        if self.eye_separation != before.eye_separation {
            changes.push(ParameterChange::EyeSeparation(self.eye_separation));
        }
        if self.fov_degrees != before.fov_degrees {
            changes.push(ParameterChange::FovDegrees(self.fov_degrees));
        }
        if self.near_clip != before.near_clip {
            changes.push(ParameterChange::NearClip(self.near_clip));
        }
        if self.far_clip != before.far_clip {
            changes.push(ParameterChange::FarClip(self.far_clip));
        }
        changes
    }

    /// Puts the slider a rejected change came from back to the camera's value.
    pub fn revert(&mut self, change: ParameterChange, settings: &StereoSettings) {
        match change {
            ParameterChange::Convergence(_) => self.convergence = settings.convergence,
            ParameterChange::EyeSeparation(_) => self.eye_separation = settings.eye_separation,
            ParameterChange::FovDegrees(_) => self.fov_degrees = settings.fov.to_degrees(),
            ParameterChange::NearClip(_) => self.near_clip = settings.near,
            ParameterChange::FarClip(_) => self.far_clip = settings.far,
        }
    }
}

pub struct UiState {
    pub stereo: StereoSliders,
    pub surface: SurfaceParams,
    pub display: DisplayOptions,
    pub vsync_enabled: bool,
    pub show_stats: bool,
    pub last_error: Option<String>,
}

impl UiState {
    pub fn from_config(config: &SceneConfig) -> Self {
        Self {
            stereo: StereoSliders {
                convergence: config.stereo.convergence,
                eye_separation: config.stereo.eye_separation,
                fov_degrees: config.stereo.fov_degrees,
                near_clip: config.stereo.near_clip,
                far_clip: config.stereo.far_clip,
            },
            surface: config.surface,
            display: config.display.clone(),
            vsync_enabled: config.window.vsync,
            show_stats: true,
            last_error: None,
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::from_config(&SceneConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliders_start_at_configured_values() {
        let state = UiState::default();
        assert_eq!(state.stereo.convergence, 1.0);
        assert_eq!(state.stereo.eye_separation, 1.0);
        assert_eq!(state.stereo.fov_degrees, 45.0);
        assert_eq!(state.stereo.near_clip, 2.0);
        assert!(state.vsync_enabled);
    }

    #[test]
    fn unchanged_sliders_emit_nothing() {
        let state = UiState::default();
        assert!(state.stereo.changes_since(&state.stereo).is_empty());
    }

    #[test]
    fn moved_sliders_emit_in_panel_order() {
        let before = UiState::default().stereo;
        let after = StereoSliders {
            fov_degrees: 60.0,
            convergence: 2.0,
            ..before
        };

        assert_eq!(
            after.changes_since(&before),
            vec![
                ParameterChange::Convergence(2.0),
                ParameterChange::FovDegrees(60.0)
            ]
        );
    }

    #[test]
    fn rejected_near_clip_snaps_back_to_camera() {
        let config = SceneConfig::default();
        let mut scene = crate::scene::SceneState::new(&config).unwrap();
        let mut state = UiState::from_config(&config);

        let before = state.stereo;
        state.stereo.far_clip = 10.0;
        for change in state.stereo.changes_since(&before) {
            scene.apply(change).unwrap();
        }

        let before = state.stereo;
        state.stereo.near_clip = 15.0;
        for change in state.stereo.changes_since(&before) {
            if scene.apply(change).is_err() {
                state.stereo.revert(change, scene.camera.settings());
            }
        }

        assert_eq!(state.stereo.near_clip, 2.0);
        assert_eq!(state.stereo.far_clip, 10.0);
        assert_eq!(scene.camera.settings().near, 2.0);
    }

    #[test]
    fn revert_converts_fov_back_to_degrees() {
        let mut sliders = UiState::default().stereo;
        sliders.fov_degrees = 500.0;
        let settings = SceneConfig::default().stereo.settings(1.0);

        sliders.revert(ParameterChange::FovDegrees(500.0), &settings);
        assert!((sliders.fov_degrees - 45.0).abs() < 1e-4);
    }
}
