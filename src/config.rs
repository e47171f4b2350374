//! Scene configuration, read from an optional JSON file.
//!
//! Every section falls back to its defaults when missing, so a config file
//! only needs the fields it wants to change:
//!
//! ```json
//! { "stereo": { "eye_separation": 0.3 }, "display": { "lighting": true } }
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::math::SurfaceParams;
use crate::math::sphere::{self, DEFAULT_BANDS, DEFAULT_RADIUS};
use crate::renderer::camera::StereoSettings;
use crate::scene::DisplayOptions;
use crate::scene::animation::DEFAULT_ORBIT_RADIUS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SceneConfig {
    pub surface: SurfaceParams,
    pub stereo: StereoConfig,
    pub marker: MarkerConfig,
    pub window: WindowConfig,
    pub display: DisplayOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    pub convergence: f32,
    pub eye_separation: f32,
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            convergence: 1.0,
            eye_separation: 1.0,
            fov_degrees: 45.0,
            near_clip: 2.0,
            far_clip: 30.0,
        }
    }
}

impl StereoConfig {
    pub fn settings(&self, aspect: f32) -> StereoSettings {
        StereoSettings {
            convergence: self.convergence,
            eye_separation: self.eye_separation,
            fov: self.fov_degrees.to_radians(),
            near: self.near_clip,
            far: self.far_clip,
            aspect,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub orbit_radius: f32,
    pub lat_bands: u32,
    pub lon_bands: u32,
    pub radius: f32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            orbit_radius: DEFAULT_ORBIT_RADIUS,
            lat_bands: DEFAULT_BANDS,
            lon_bands: DEFAULT_BANDS,
            radius: DEFAULT_RADIUS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Stereo Surface".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

impl WindowConfig {
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl SceneConfig {
    pub fn from_json(text: &str) -> SceneResult<Self> {
        let config: SceneConfig =
            serde_json::from_str(text).map_err(|e| SceneError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SceneResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Loaded scene configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> SceneResult<()> {
        self.surface.validate()?;

        let marker = &self.marker;
        sphere::check_bands(marker.lat_bands, marker.lon_bands)
            .map_err(|e| SceneError::Config(format!("marker: {}", e)))?;
        if !(marker.radius.is_finite() && marker.radius > 0.0 && marker.orbit_radius.is_finite()) {
            return Err(SceneError::Config(
                "marker radius must be positive and the orbit finite".to_string(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(SceneError::Config("window size must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::StereoMode;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SceneConfig::from_json("{}").unwrap();
        assert_eq!(config.surface, SurfaceParams::default());
        assert_eq!(config.stereo.fov_degrees, 45.0);
        assert_eq!(config.marker.lat_bands, 30);
        assert_eq!(config.display.stereo_mode, StereoMode::Anaglyph);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SceneConfig::from_json(
            r#"{ "surface": { "a": 2.0 }, "stereo": { "eye_separation": 0.25 },
                 "display": { "stereo_mode": "mono", "lighting": true } }"#,
        )
        .unwrap();

        assert_eq!(config.surface.a, 2.0);
        assert_eq!(config.surface.b, 1.5);
        assert_eq!(config.stereo.eye_separation, 0.25);
        assert_eq!(config.stereo.convergence, 1.0);
        assert_eq!(config.display.stereo_mode, StereoMode::Mono);
        assert!(config.display.lighting);
        assert!(config.display.show_wireframe);
    }

    #[test]
    fn example_file_spells_out_the_defaults() {
        let config = SceneConfig::from_json(include_str!("../scene.example.json")).unwrap();
        assert_eq!(config.surface, SurfaceParams::default());
        assert_eq!(config.display, DisplayOptions::default());
        assert_eq!(config.window.title, WindowConfig::default().title);
        assert_eq!(config.stereo.far_clip, 30.0);
    }

    #[test]
    fn stereo_settings_convert_degrees() {
        let settings = StereoConfig::default().settings(2.0);
        assert!((settings.fov - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert_eq!(settings.aspect, 2.0);
    }

    #[test]
    fn malformed_files_are_rejected() {
        assert!(matches!(
            SceneConfig::from_json("{ not json"),
            Err(SceneError::Config(_))
        ));
        assert!(matches!(
            SceneConfig::from_json(r#"{ "surface": { "a": 0.0, "b": 0.0 } }"#),
            Err(SceneError::MalformedParameter(_))
        ));
        assert!(SceneConfig::from_json(r#"{ "marker": { "lat_bands": 1 } }"#).is_err());
    }

    #[test]
    fn marker_limits_are_enforced() {
        assert!(matches!(
            SceneConfig::from_json(r#"{ "marker": { "lat_bands": 70000, "lon_bands": 70000 } }"#),
            Err(SceneError::Config(_))
        ));

        let mut config = SceneConfig::default();
        config.marker.radius = f32::INFINITY;
        assert!(matches!(config.validate(), Err(SceneError::Config(_))));

        config.marker.radius = DEFAULT_RADIUS;
        config.marker.lat_bands = sphere::MAX_BANDS;
        assert!(config.validate().is_ok());
    }
}
