//! Spatialization of the marker's sound source.
//!
//! The listener sits at the origin looking down -Z. [`Panner`] reproduces an
//! inverse-distance attenuation with equal-power stereo panning and keeps the
//! resulting channel gains for whatever audio backend consumes them.

use glam::Vec3;
use log::trace;

pub trait SoundEmitter {
    fn set_position(&mut self, position: Vec3);
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialMix {
    pub distance: f32,
    /// Distance attenuation in `[0, 1]`.
    pub gain: f32,
    /// Azimuth in degrees, negative to the left, folded into `[-90, 90]`.
    pub azimuth: f32,
    pub left: f32,
    pub right: f32,
}

pub struct Panner {
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
    position: Vec3,
    mix: SpatialMix,
}

impl Default for Panner {
    fn default() -> Self {
        Self {
            ref_distance: 1.0,
            max_distance: 10_000.0,
            rolloff: 1.0,
            position: Vec3::ZERO,
            mix: SpatialMix {
                gain: 1.0,
                left: std::f32::consts::FRAC_1_SQRT_2,
                right: std::f32::consts::FRAC_1_SQRT_2,
                ..SpatialMix::default()
            },
        }
    }
}

impl Panner {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn mix(&self) -> SpatialMix {
        self.mix
    }

    fn distance_gain(&self, distance: f32) -> f32 {
        let d = distance.clamp(self.ref_distance, self.max_distance);
        self.ref_distance / (self.ref_distance + self.rolloff * (d - self.ref_distance))
    }

    fn compute(&self, position: Vec3) -> SpatialMix {
        let distance = position.length();
        let gain = self.distance_gain(distance);

        let azimuth = if distance > f32::EPSILON {
            (position.x / distance).clamp(-1.0, 1.0).asin().to_degrees()
        } else {
            0.0
        };

        let x = (azimuth + 90.0) / 180.0;
        let (right, left) = (x * std::f32::consts::FRAC_PI_2).sin_cos();

        SpatialMix {
            distance,
            gain,
            azimuth,
            left: left * gain,
            right: right * gain,
        }
    }
}

impl SoundEmitter for Panner {
    fn set_position(&mut self, position: Vec3) {
        if !position.is_finite() {
            return;
        }
        self.position = position;
        self.mix = self.compute(position);
        trace!("Panner moved to {:?}: {:?}", position, self.mix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_in_front_is_centered() {
        let mut panner = Panner::default();
        panner.set_position(Vec3::new(0.0, 0.0, -1.0));
        let mix = panner.mix();

        assert!(mix.azimuth.abs() < 1e-4);
        assert!((mix.left - mix.right).abs() < 1e-5);
        assert!((mix.gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hard_right_silences_the_left_channel() {
        let mut panner = Panner::default();
        panner.set_position(Vec3::new(1.0, 0.0, 0.0));
        let mix = panner.mix();

        assert!((mix.azimuth - 90.0).abs() < 1e-3);
        assert!(mix.left.abs() < 1e-5);
        assert!((mix.right - 1.0).abs() < 1e-5);
    }

    #[test]
    fn inverse_distance_attenuation() {
        let mut panner = Panner::default();
        panner.set_position(Vec3::new(0.0, 0.0, 4.0));
        assert!((panner.mix().gain - 0.25).abs() < 1e-6);

        // inside the reference distance there is no boost
        panner.set_position(Vec3::new(0.0, 0.0, 0.5));
        assert!((panner.mix().gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_positions_are_ignored() {
        let mut panner = Panner::default();
        panner.set_position(Vec3::new(0.5, 0.0, 0.5));
        let before = panner.mix();
        panner.set_position(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(panner.mix(), before);
        assert_eq!(panner.position(), Vec3::new(0.5, 0.0, 0.5));
    }
}
