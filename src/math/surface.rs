//! Tessellation of the elliptic spindle-torus surface.
//!
//! The surface is swept twice over the same `(v, t)` grid, once with `v` as the
//! outer loop and once with `t`, so the line-strip overlay gets both families
//! of grid lines out of a single flat vertex buffer.

use std::f64::consts::PI;

use glam::DVec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};
use crate::math::mesh::{SurfaceMesh, TriangleMesh};

pub const DEFAULT_STEP: f64 = 0.1;
/// Finite-difference offset used for normal estimation.
pub const NORMAL_DELTA: f64 = 0.0001;
/// Capacity of the surface vertex buffer on the GPU.
pub const MAX_SURFACE_VERTICES: usize = 1_500_000;

const DEGENERATE_NORMAL_LENGTH: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// Extent of `v` in multiples of π.
    pub v_range: f64,
    /// Extent of `t` in multiples of π.
    pub t_range: f64,
    pub step: f64,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            a: 0.75,
            b: 1.5,
            c: 1.0,
            d: 1.0,
            v_range: 2.0,
            t_range: 2.0,
            step: DEFAULT_STEP,
        }
    }
}

impl SurfaceParams {
    pub fn validate(&self) -> SceneResult<()> {
        let fields = [
            ("a", self.a),
            ("b", self.b),
            ("c", self.c),
            ("d", self.d),
            ("v range", self.v_range),
            ("t range", self.t_range),
            ("step", self.step),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(SceneError::MalformedParameter(format!(
                "{} must be a finite number",
                name
            )));
        }

        if self.a <= 0.0 || self.b <= 0.0 {
            return Err(SceneError::MalformedParameter(format!(
                "a and b must be positive (got a={}, b={})",
                self.a, self.b
            )));
        }
        if self.c < 0.0 || self.d < 0.0 {
            return Err(SceneError::MalformedParameter(format!(
                "c and d must not be negative (got c={}, d={})",
                self.c, self.d
            )));
        }
        if self.v_range <= 0.0 || self.t_range <= 0.0 {
            return Err(SceneError::MalformedParameter(
                "parameter ranges must be positive".to_string(),
            ));
        }
        if self.step <= 0.0 {
            return Err(SceneError::MalformedParameter(
                "step must be positive".to_string(),
            ));
        }

        let limit = MAX_SURFACE_VERTICES as f64;
        for (name, range) in [("v range", self.v_range), ("t range", self.t_range)] {
            if range * PI / self.step > limit {
                return Err(SceneError::MalformedParameter(format!(
                    "{} of {}π at step {} is too large",
                    name, range, self.step
                )));
            }
        }

        match self.checked_vertex_count() {
            Some(count) if count <= MAX_SURFACE_VERTICES => {}
            Some(count) => {
                return Err(SceneError::MalformedParameter(format!(
                    "grid would produce {} vertices, the limit is {}",
                    count, MAX_SURFACE_VERTICES
                )));
            }
            None => {
                return Err(SceneError::MalformedParameter(
                    "grid vertex count overflows".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn v_samples(&self) -> usize {
        sample_count(self.v_range * PI, self.step)
    }

    pub fn t_samples(&self) -> usize {
        sample_count(self.t_range * PI, self.step)
    }

    /// Vertices emitted by [`generate`]: two sweeps, six vertices per grid cell.
    ///
    /// Saturates at `usize::MAX`; [`SurfaceParams::validate`] rejects such grids.
    pub fn vertex_count(&self) -> usize {
        self.checked_vertex_count().unwrap_or(usize::MAX)
    }

    fn checked_vertex_count(&self) -> Option<usize> {
        (2 * 6usize)
            .checked_mul(self.v_samples())?
            .checked_mul(self.t_samples())
    }

    /// Evaluates the surface at `(v, t)`.
    pub fn point(&self, v: f64, t: f64) -> DVec3 {
        let (sin_v, cos_v) = v.sin_cos();
        let (sin_t, cos_t) = t.sin_cos();

        let f = self.a * self.b
            / (self.a * self.a * sin_v * sin_v + self.b * self.b * cos_v * cos_v).sqrt();
        let k = self.d * self.d - self.c * self.c;

        let radial = 0.5 * (f * (1.0 + cos_t) + k * (1.0 - cos_t) / f);
        DVec3::new(
            radial * cos_v,
            radial * sin_v,
            0.5 * (f - k / f) * sin_t,
        )
    }

    /// Unit normal from forward differences, or `None` where the tangents collapse.
    pub fn normal(&self, v: f64, t: f64) -> Option<DVec3> {
        let p = self.point(v, t);
        let dv = (self.point(v + NORMAL_DELTA, t) - p) / NORMAL_DELTA;
        let dt = (self.point(v, t + NORMAL_DELTA) - p) / NORMAL_DELTA;

        let n = dv.cross(dt);
        let len = n.length();
        if len.is_finite() && len > DEGENERATE_NORMAL_LENGTH {
            Some(n / len)
        } else {
            None
        }
    }
}

fn sample_count(extent: f64, step: f64) -> usize {
    ((extent / step + 1e-9).floor() as usize).saturating_add(1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepOrder {
    /// `v` outer, `t` inner.
    RowMajor,
    /// `t` outer, `v` inner.
    ColumnMajor,
}

impl SweepOrder {
    pub const ALL: [SweepOrder; 2] = [SweepOrder::RowMajor, SweepOrder::ColumnMajor];
}

struct NormalTracker {
    last_valid: DVec3,
}

impl NormalTracker {
    // Degenerate points (the spindle tip at t = π) reuse the most recent valid
    // normal in emission order; before any valid normal exists, +Z is used.
    fn resolve(&mut self, normal: Option<DVec3>) -> DVec3 {
        match normal {
            Some(n) => {
                self.last_valid = n;
                n
            }
            None => self.last_valid,
        }
    }
}

pub fn generate(params: &SurfaceParams, with_normals: bool) -> SceneResult<SurfaceMesh> {
    params.validate()?;

    let n_v = params.v_samples();
    let n_t = params.t_samples();
    let step = params.step;
    let total = params.vertex_count();

    let mut vertices = Vec::with_capacity(total * 3);
    let mut normals = if with_normals {
        Some(Vec::with_capacity(total * 3))
    } else {
        None
    };
    let mut line_strips = Vec::with_capacity(n_v + n_t);
    let mut tracker = NormalTracker {
        last_valid: DVec3::Z,
    };

    for order in SweepOrder::ALL {
        let (outer, inner) = match order {
            SweepOrder::RowMajor => (n_v, n_t),
            SweepOrder::ColumnMajor => (n_t, n_v),
        };

        for i in 0..outer {
            let start = (vertices.len() / 3) as u32;

            for j in 0..inner {
                let (v, t) = match order {
                    SweepOrder::RowMajor => (i as f64 * step, j as f64 * step),
                    SweepOrder::ColumnMajor => (j as f64 * step, i as f64 * step),
                };

                let corners = [(v, t), (v, t + step), (v + step, t), (v + step, t + step)];
                // (P00, P01, P10) and (P10, P01, P11)
                for index in [0, 1, 2, 2, 1, 3] {
                    let (cv, ct) = corners[index];
                    let p = params.point(cv, ct);
                    vertices.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);

                    if let Some(normals) = normals.as_mut() {
                        let n = tracker.resolve(params.normal(cv, ct));
                        normals.extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
                    }
                }
            }

            let end = (vertices.len() / 3) as u32;
            line_strips.push(start..end);
        }
    }

    debug!(
        "Tessellated surface: {}x{} grid, {} vertices, {} line strips",
        n_v,
        n_t,
        vertices.len() / 3,
        line_strips.len()
    );

    Ok(SurfaceMesh {
        mesh: TriangleMesh { vertices, normals },
        line_strips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_count(v_range: f64, t_range: f64) -> usize {
        let n_v = (v_range * PI / DEFAULT_STEP).ceil() as usize;
        let n_t = (t_range * PI / DEFAULT_STEP).ceil() as usize;
        2 * 6 * n_v * n_t
    }

    #[test_log::test]
    fn default_scenario_has_exact_vertex_count_and_no_nan() {
        let params = SurfaceParams::default();
        let surface = generate(&params, false).unwrap();

        assert_eq!(surface.mesh.vertex_count(), 2 * 6 * 63 * 63);
        assert!(surface.mesh.vertices.iter().all(|x| x.is_finite()));
        assert!(surface.mesh.normals.is_none());
    }

    #[test_log::test]
    fn vertex_count_follows_grid_formula() {
        for (v_range, t_range) in [(1.0, 1.0), (1.0, 2.0), (2.0, 0.5), (3.0, 1.5)] {
            let params = SurfaceParams {
                v_range,
                t_range,
                ..SurfaceParams::default()
            };
            let surface = generate(&params, false).unwrap();
            assert_eq!(
                surface.mesh.vertex_count(),
                expected_count(v_range, t_range),
                "v_range={} t_range={}",
                v_range,
                t_range
            );
            assert_eq!(surface.mesh.vertices.len() % 9, 0);
        }
    }

    #[test_log::test]
    fn normals_are_parallel_and_unit_length() {
        let surface = generate(&SurfaceParams::default(), true).unwrap();
        let normals = surface.mesh.normals.as_ref().unwrap();

        assert_eq!(normals.len(), surface.mesh.vertices.len());
        for n in normals.chunks(3) {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4, "normal length {}", len);
        }
    }

    #[test]
    fn spindle_tip_has_no_normal() {
        let params = SurfaceParams::default();
        assert!(params.normal(0.3, PI).is_none());
        assert!(params.normal(0.3, 1.0).is_some());
    }

    #[test]
    fn degenerate_normal_reuses_previous_valid_one() {
        let mut tracker = NormalTracker {
            last_valid: DVec3::Z,
        };
        assert_eq!(tracker.resolve(None), DVec3::Z);
        tracker.resolve(Some(DVec3::X));
        assert_eq!(tracker.resolve(None), DVec3::X);
    }

    #[test]
    fn surface_is_periodic_in_v() {
        let params = SurfaceParams::default();
        for i in 0..20 {
            let v = i as f64 * 0.37;
            let t = i as f64 * 0.21;
            let p = params.point(v, t);
            let q = params.point(v + 2.0 * PI, t);
            assert!((p - q).length() < 1e-9, "v={} t={}", v, t);
        }
    }

    #[test]
    fn line_strips_cover_the_buffer_in_order() {
        let surface = generate(&SurfaceParams::default(), false).unwrap();

        assert_eq!(surface.horizontal_steps(), 63 + 63);
        assert_eq!(surface.line_strips[0].start, 0);
        for pair in surface.line_strips.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let last = surface.line_strips.last().unwrap();
        assert_eq!(last.end as usize, surface.mesh.vertex_count());
        assert_eq!(
            (surface.mesh.vertex_count() / 3) % surface.horizontal_steps(),
            0
        );
    }

    #[test]
    fn first_quad_is_wound_as_emitted() {
        let params = SurfaceParams::default();
        let surface = generate(&params, false).unwrap();
        let vertex = |i: usize| {
            let s = &surface.mesh.vertices[i * 3..i * 3 + 3];
            DVec3::new(s[0] as f64, s[1] as f64, s[2] as f64)
        };

        let step = params.step;
        let p00 = params.point(0.0, 0.0);
        let p01 = params.point(0.0, step);
        let p10 = params.point(step, 0.0);
        let p11 = params.point(step, step);
        let expected = [p00, p01, p10, p10, p01, p11];
        for (i, p) in expected.iter().enumerate() {
            assert!((vertex(i) - *p).length() < 1e-6);
        }
    }

    #[test]
    fn rejects_degenerate_coefficients() {
        let zero = SurfaceParams {
            a: 0.0,
            b: 0.0,
            ..SurfaceParams::default()
        };
        assert!(matches!(
            generate(&zero, false),
            Err(SceneError::MalformedParameter(_))
        ));

        let nan = SurfaceParams {
            c: f64::NAN,
            ..SurfaceParams::default()
        };
        assert!(nan.validate().is_err());

        let huge = SurfaceParams {
            v_range: 400.0,
            t_range: 400.0,
            ..SurfaceParams::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn enormous_ranges_are_rejected_without_overflow() {
        for (v_range, t_range) in [(1e17, 2.0), (2.0, 1e17), (1e300, 1e300)] {
            let params = SurfaceParams {
                v_range,
                t_range,
                ..SurfaceParams::default()
            };
            assert!(matches!(
                params.validate(),
                Err(SceneError::MalformedParameter(_))
            ));
            assert!(matches!(
                generate(&params, false),
                Err(SceneError::MalformedParameter(_))
            ));
        }

        let tiny_step = SurfaceParams {
            step: 1e-300,
            ..SurfaceParams::default()
        };
        assert!(tiny_step.validate().is_err());
        assert_eq!(tiny_step.vertex_count(), usize::MAX);
    }
}
