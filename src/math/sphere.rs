use std::f32::consts::PI;

use crate::error::{SceneError, SceneResult};
use crate::math::mesh::SphereMesh;

pub const DEFAULT_BANDS: u32 = 30;
pub const DEFAULT_RADIUS: f32 = 0.05;
/// Upper bound on either band count; keeps every index well inside `u32`.
pub const MAX_BANDS: u32 = 1024;

pub fn check_bands(lat_bands: u32, lon_bands: u32) -> SceneResult<()> {
    if !(2..=MAX_BANDS).contains(&lat_bands) || !(3..=MAX_BANDS).contains(&lon_bands) {
        return Err(SceneError::MalformedParameter(format!(
            "sphere needs 2..={max} latitude and 3..={max} longitude bands (got {}x{})",
            lat_bands,
            lon_bands,
            max = MAX_BANDS
        )));
    }
    Ok(())
}

/// Latitude/longitude sphere with poles on the Y axis.
pub fn generate(lat_bands: u32, lon_bands: u32, radius: f32) -> SceneResult<SphereMesh> {
    check_bands(lat_bands, lon_bands)?;
    if !(radius.is_finite() && radius > 0.0) {
        return Err(SceneError::MalformedParameter(format!(
            "sphere radius must be positive and finite (got {})",
            radius
        )));
    }

    let (lat_count, lon_count) = (lat_bands as usize, lon_bands as usize);
    let mut positions = Vec::with_capacity((lat_count + 1) * (lon_count + 1) * 3);
    let mut indices = Vec::with_capacity(lat_count * lon_count * 6);

    for lat in 0..=lat_bands {
        let theta = lat as f32 * PI / lat_bands as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for lon in 0..=lon_bands {
            let phi = lon as f32 * 2.0 * PI / lon_bands as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            positions.push(radius * cos_phi * sin_theta);
            positions.push(radius * cos_theta);
            positions.push(radius * sin_phi * sin_theta);
        }
    }

    for lat in 0..lat_bands {
        for lon in 0..lon_bands {
            let first = lat * (lon_bands + 1) + lon;
            let second = first + lon_bands + 1;

            indices.extend_from_slice(&[first, second, first + 1]);
            indices.extend_from_slice(&[second, second + 1, first + 1]);
        }
    }

    Ok(SphereMesh { positions, indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_match_band_counts() {
        let sphere = generate(30, 30, DEFAULT_RADIUS).unwrap();
        assert_eq!(sphere.positions.len(), 31 * 31 * 3);
        assert_eq!(sphere.indices.len(), 30 * 30 * 6);
        assert_eq!(sphere.index_count(), 5400);
    }

    #[test]
    fn every_position_lies_on_the_sphere() {
        let radius = 2.5;
        let sphere = generate(12, 18, radius).unwrap();
        for p in sphere.positions.chunks(3) {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - radius).abs() < 1e-5);
        }
    }

    #[test]
    fn poles_sit_on_the_y_axis() {
        let sphere = generate(8, 8, 1.0).unwrap();
        assert!((sphere.positions[1] - 1.0).abs() < 1e-6);
        let last = sphere.positions.len() - 3;
        assert!((sphere.positions[last + 1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn indices_stay_in_bounds_and_follow_quad_layout() {
        let (lat, lon) = (5, 7);
        let sphere = generate(lat, lon, 1.0).unwrap();
        let vertex_count = sphere.positions.len() as u32 / 3;
        assert!(sphere.indices.iter().all(|&i| i < vertex_count));

        // second quad of the second band
        let first = (lon + 1) + 1;
        let second = first + lon + 1;
        let quad = &sphere.indices[(lon as usize + 1) * 6..(lon as usize + 2) * 6];
        assert_eq!(quad, &[first, second, first + 1, second, second + 1, first + 1]);
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(10, 10, 0.3).unwrap();
        let b = generate(10, 10, 0.3).unwrap();
        assert_eq!(a.positions, b.positions);
        assert_eq!(a.indices, b.indices);
    }

    #[test]
    fn out_of_range_bands_are_rejected() {
        for (lat, lon) in [(70_000, 70_000), (MAX_BANDS + 1, 30), (30, u32::MAX), (1, 30), (30, 2)] {
            assert!(matches!(
                generate(lat, lon, 1.0),
                Err(SceneError::MalformedParameter(_))
            ));
        }

        let largest = generate(MAX_BANDS, MAX_BANDS, 1.0).unwrap();
        let vertex_count = largest.positions.len() as u64 / 3;
        assert!(largest.indices.iter().all(|&i| (i as u64) < vertex_count));
    }

    #[test]
    fn non_finite_radius_is_rejected() {
        assert!(generate(8, 8, f32::INFINITY).is_err());
        assert!(generate(8, 8, 0.0).is_err());
    }
}
