pub mod animation;
pub mod audio;
pub mod frame;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SceneConfig;
use crate::error::SceneResult;
use crate::math::{SphereMesh, SurfaceMesh, SurfaceParams, sphere, surface};
use crate::renderer::camera::StereoCamera;
use crate::renderer::trackball::Trackball;

use animation::MarkerState;
use audio::Panner;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    Anaglyph,
    Mono,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Redraw only after input or a parameter change.
    Idle,
    /// Redraw continuously.
    Animating,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub stereo_mode: StereoMode,
    pub lighting: bool,
    pub show_fill: bool,
    pub show_wireframe: bool,
    pub animate: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            stereo_mode: StereoMode::Anaglyph,
            lighting: false,
            show_fill: true,
            show_wireframe: true,
            animate: true,
        }
    }
}

/// A new value from one of the camera sliders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterChange {
    Convergence(f32),
    EyeSeparation(f32),
    FovDegrees(f32),
    NearClip(f32),
    FarClip(f32),
}

pub struct SceneState {
    pub camera: StereoCamera,
    pub trackball: Trackball,
    pub marker: MarkerState,
    pub panner: Panner,
    pub display: DisplayOptions,

    surface_params: SurfaceParams,
    surface_revision: u64,
    pending_surface: Option<SurfaceMesh>,
    pending_marker: Option<SphereMesh>,
}

impl SceneState {
    pub fn new(config: &SceneConfig) -> SceneResult<Self> {
        let camera = StereoCamera::try_new(config.stereo.settings(config.window.aspect()))?;
        let surface = surface::generate(&config.surface, true)?;
        let marker_mesh = sphere::generate(
            config.marker.lat_bands,
            config.marker.lon_bands,
            config.marker.radius,
        )?;

        info!(
            "Scene ready: {} surface triangles in {} strips, {} marker indices",
            surface.mesh.triangle_count(),
            surface.horizontal_steps(),
            marker_mesh.index_count()
        );

        let mut trackball = Trackball::default();
        trackball.set_viewport(config.window.width as f32, config.window.height as f32);

        Ok(Self {
            camera,
            trackball,
            marker: MarkerState::new(config.marker.orbit_radius),
            panner: Panner::default(),
            display: config.display.clone(),
            surface_params: config.surface,
            surface_revision: 1,
            pending_surface: Some(surface),
            pending_marker: Some(marker_mesh),
        })
    }

    pub fn apply(&mut self, change: ParameterChange) -> SceneResult<()> {
        debug!("Parameter change: {:?}", change);
        let result = match change {
            ParameterChange::Convergence(value) => self.camera.set_convergence(value),
            ParameterChange::EyeSeparation(value) => self.camera.set_eye_separation(value),
            ParameterChange::FovDegrees(degrees) => self.camera.set_fov(degrees.to_radians()),
            ParameterChange::NearClip(value) => self.camera.set_near_clip(value),
            ParameterChange::FarClip(value) => self.camera.set_far_clip(value),
        };
        if let Err(e) = &result {
            warn!("Rejected {:?}: {}", change, e);
        }
        result
    }

    /// Regenerates the surface. On error the previous mesh stays in place.
    pub fn set_surface_params(&mut self, params: SurfaceParams) -> SceneResult<()> {
        if params == self.surface_params {
            return Ok(());
        }

        match surface::generate(&params, true) {
            Ok(mesh) => {
                self.surface_params = params;
                self.surface_revision += 1;
                info!(
                    "Regenerated surface revision {} ({} vertices) for {:?}",
                    self.surface_revision,
                    mesh.mesh.vertex_count(),
                    params
                );
                self.pending_surface = Some(mesh);
                Ok(())
            }
            Err(e) => {
                warn!("Keeping previous surface: {}", e);
                Err(e)
            }
        }
    }

    pub fn has_pending_geometry(&self) -> bool {
        self.pending_surface.is_some() || self.pending_marker.is_some()
    }

    /// Hands a freshly generated surface over to the GPU buffers.
    pub fn take_pending_surface(&mut self) -> Option<SurfaceMesh> {
        self.pending_surface.take()
    }

    pub fn take_pending_marker(&mut self) -> Option<SphereMesh> {
        self.pending_marker.take()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.trackball.set_viewport(width as f32, height as f32);
        if let Err(e) = self.camera.set_aspect(width as f32 / height as f32) {
            warn!("Ignoring resize to {}x{}: {}", width, height, e);
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        if self.display.animate {
            RenderMode::Animating
        } else {
            RenderMode::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SceneError;

    fn scene() -> SceneState {
        SceneState::new(&SceneConfig::default()).unwrap()
    }

    #[test_log::test]
    fn initial_geometry_is_pending_once() {
        let mut scene = scene();
        assert!(scene.has_pending_geometry());

        let surface = scene.take_pending_surface().unwrap();
        assert_eq!(surface.mesh.vertex_count(), 2 * 6 * 63 * 63);
        assert!(surface.mesh.normals.is_some());
        assert!(scene.take_pending_marker().is_some());

        assert!(!scene.has_pending_geometry());
        assert!(scene.take_pending_surface().is_none());
    }

    #[test_log::test]
    fn fov_change_never_touches_the_mesh() {
        let mut scene = scene();
        scene.take_pending_surface();
        let revision = scene.surface_revision;
        let before = scene.camera.apply_left_frustum();

        scene.apply(ParameterChange::FovDegrees(70.0)).unwrap();

        assert_eq!(scene.surface_revision, revision);
        assert!(scene.take_pending_surface().is_none());
        let after = scene.camera.apply_left_frustum();
        assert_ne!(before.projection, after.projection);
        assert!((scene.camera.settings().fov - 70.0_f32.to_radians()).abs() < 1e-6);
    }

    #[test_log::test]
    fn each_slider_updates_its_field() {
        let mut scene = scene();
        scene.apply(ParameterChange::Convergence(3.0)).unwrap();
        scene.apply(ParameterChange::EyeSeparation(0.1)).unwrap();
        scene.apply(ParameterChange::NearClip(0.5)).unwrap();
        scene.apply(ParameterChange::FarClip(50.0)).unwrap();

        let settings = scene.camera.settings();
        assert_eq!(settings.convergence, 3.0);
        assert_eq!(settings.eye_separation, 0.1);
        assert_eq!(settings.near, 0.5);
        assert_eq!(settings.far, 50.0);
    }

    #[test_log::test]
    fn near_clip_beyond_far_is_rejected() {
        let mut scene = scene();
        let result = scene.apply(ParameterChange::NearClip(40.0));
        assert!(matches!(result, Err(SceneError::MalformedParameter(_))));
        assert_eq!(scene.camera.settings().near, 2.0);
    }

    #[test_log::test]
    fn bad_surface_keeps_previous_mesh() {
        let mut scene = scene();
        scene.take_pending_surface();
        let previous = scene.surface_params;

        let result = scene.set_surface_params(SurfaceParams {
            a: 0.0,
            b: 0.0,
            ..previous
        });
        assert!(matches!(result, Err(SceneError::MalformedParameter(_))));
        assert_eq!(scene.surface_params, previous);
        assert!(scene.take_pending_surface().is_none());
    }

    #[test_log::test]
    fn new_surface_params_regenerate_the_mesh() {
        let mut scene = scene();
        scene.take_pending_surface();
        let revision = scene.surface_revision;

        let params = SurfaceParams {
            t_range: 1.0,
            ..scene.surface_params
        };
        scene.set_surface_params(params).unwrap();

        assert_eq!(scene.surface_revision, revision + 1);
        let mesh = scene.take_pending_surface().unwrap();
        assert_eq!(mesh.mesh.vertex_count(), 2 * 6 * 63 * 32);

        // same values again are a no-op
        scene.set_surface_params(params).unwrap();
        assert_eq!(scene.surface_revision, revision + 1);
    }

    #[test]
    fn resize_updates_aspect_and_invalidates() {
        let mut scene = scene();
        scene.camera.apply_left_frustum();
        scene.resize(1000, 500);
        assert!(!scene.camera.is_cached());
        assert_eq!(scene.camera.settings().aspect, 2.0);

        scene.resize(0, 500);
        assert_eq!(scene.camera.settings().aspect, 2.0);
    }

    #[test]
    fn animate_flag_selects_render_mode() {
        let mut scene = scene();
        assert_eq!(scene.render_mode(), RenderMode::Animating);
        scene.display.animate = false;
        assert_eq!(scene.render_mode(), RenderMode::Idle);
    }
}
