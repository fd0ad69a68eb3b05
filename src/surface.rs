//! Geometry collaborator: the read-only surface the agents move on.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use surface_common::{clamp, SurfaceConfig, Vec3};

/// Closed parameter interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        Interval { lo, hi }
    }

    pub fn unit() -> Self {
        Interval { lo: 0.0, hi: 1.0 }
    }

    pub fn length(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.lo && t <= self.hi
    }

    pub fn clamp(&self, t: f64) -> f64 {
        clamp(t, self.lo, self.hi)
    }

    /// Parameter at fraction `t` of the interval.
    pub fn lerp(&self, t: f64) -> f64 {
        self.lo + t * self.length()
    }

    /// Fraction of the interval at parameter `x` (not clamped).
    pub fn normalized(&self, x: f64) -> f64 {
        (x - self.lo) / self.length()
    }

    /// True when the interval has finite bounds and non-zero length.
    pub fn is_valid(&self) -> bool {
        self.lo.is_finite() && self.hi.is_finite() && self.hi > self.lo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    U,
    V,
}

/// Queries the simulation needs from a parametric surface.
///
/// Implementations must be immutable once shared; the stepper reads them from
/// many workers at once.
pub trait Surface: Send + Sync {
    fn domain(&self, axis: Axis) -> Interval;

    fn evaluate(&self, u: f64, v: f64) -> Vec3;

    /// Point plus first partial derivatives `(S, S_u, S_v)`.
    fn evaluate_with_derivatives(&self, u: f64, v: f64) -> Result<(Vec3, Vec3, Vec3)>;

    /// Unit normal, `None` where the tangents are degenerate.
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (_, du, dv) = self.evaluate_with_derivatives(u, v).ok()?;
        du.cross(dv).try_normalize()
    }

    fn gaussian_curvature_at(&self, u: f64, v: f64) -> Result<f64>;

    /// Parameters of the surface point closest to `point`.
    fn closest_point(&self, point: Vec3) -> (f64, f64);
}

/// `domain_of(surface, axis)` convenience over trait objects.
pub fn domain_of(surface: &dyn Surface, axis: Axis) -> Interval {
    surface.domain(axis)
}

const CLOSEST_POINT_ITERATIONS: usize = 16;

/// Square sheet of side `size` displaced in Z by a sine/cosine heightmap.
///
/// The domain is `[0,1] x [0,1]`; `S(u, v) = (size*u, size*v, h(u, v) - z_offset)` where
/// `h = amplitude * sin(freq*pi*u + phase) * cos(freq*pi*v + phase)` and `z_offset` is the
/// lowest height on the `resolution x resolution` control grid.
#[derive(Debug, Clone)]
pub struct HeightfieldSurface {
    size: f64,
    amplitude: f64,
    frequency: f64,
    phase: f64,
    z_offset: f64,
}

impl HeightfieldSurface {
    pub fn new(size: f64, amplitude: f64, frequency: f64, phase: f64, resolution: usize) -> Result<Self> {
        if !(size.is_finite() && size > 0.0) {
            anyhow::bail!("Heightfield size must be positive (got {}).", size);
        }
        if resolution == 0 {
            anyhow::bail!("Heightfield resolution must be greater than 0.");
        }
        let mut surface = HeightfieldSurface { size, amplitude, frequency, phase, z_offset: 0.0 };

        let denom = (resolution.max(2) - 1) as f64;
        let mut min_z = f64::INFINITY;
        for i in 0..resolution {
            for j in 0..resolution {
                min_z = min_z.min(surface.height(i as f64 / denom, j as f64 / denom));
            }
        }
        surface.z_offset = min_z;
        log::debug!(
            "Heightfield surface: size={} amp={} freq={} phase={} z_offset={:.4}",
            size, amplitude, frequency, phase, min_z
        );
        Ok(surface)
    }

    pub fn from_config(config: &SurfaceConfig) -> Result<Self> {
        Self::new(config.size, config.amplitude, config.frequency, config.phase, config.resolution)
    }

    /// A flat sheet (zero amplitude).
    pub fn flat(size: f64) -> Result<Self> {
        Self::new(size, 0.0, 0.0, 0.0, 1)
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    fn angles(&self, u: f64, v: f64) -> (f64, f64) {
        let k = self.frequency * std::f64::consts::PI;
        (k * u + self.phase, k * v + self.phase)
    }

    fn height(&self, u: f64, v: f64) -> f64 {
        let (a, b) = self.angles(u, v);
        self.amplitude * a.sin() * b.cos()
    }

    /// `(h_u, h_v)`
    fn height_gradient(&self, u: f64, v: f64) -> (f64, f64) {
        let (a, b) = self.angles(u, v);
        let ak = self.amplitude * self.frequency * std::f64::consts::PI;
        (ak * a.cos() * b.cos(), -ak * a.sin() * b.sin())
    }

    /// `(h_uu, h_vv, h_uv)`
    fn height_hessian(&self, u: f64, v: f64) -> (f64, f64, f64) {
        let (a, b) = self.angles(u, v);
        let k = self.frequency * std::f64::consts::PI;
        let ak2 = self.amplitude * k * k;
        let h_uu = -ak2 * a.sin() * b.cos();
        (h_uu, h_uu, -ak2 * a.cos() * b.sin())
    }

    fn check_parameters(&self, u: f64, v: f64) -> Result<()> {
        if !(u.is_finite() && v.is_finite()) {
            anyhow::bail!("Non-finite surface parameters ({}, {}).", u, v);
        }
        if !(Interval::unit().contains(u) && Interval::unit().contains(v)) {
            anyhow::bail!("Parameters ({}, {}) outside the surface domain.", u, v);
        }
        Ok(())
    }
}

impl Surface for HeightfieldSurface {
    fn domain(&self, _axis: Axis) -> Interval {
        Interval::unit()
    }

    fn evaluate(&self, u: f64, v: f64) -> Vec3 {
        Vec3::new(self.size * u, self.size * v, self.height(u, v) - self.z_offset)
    }

    fn evaluate_with_derivatives(&self, u: f64, v: f64) -> Result<(Vec3, Vec3, Vec3)> {
        self.check_parameters(u, v)?;
        let (h_u, h_v) = self.height_gradient(u, v);
        Ok((
            self.evaluate(u, v),
            Vec3::new(self.size, 0.0, h_u),
            Vec3::new(0.0, self.size, h_v),
        ))
    }

    fn gaussian_curvature_at(&self, u: f64, v: f64) -> Result<f64> {
        self.check_parameters(u, v)?;
        // Monge patch z = f(x, y) with x = size*u, y = size*v.
        let (h_u, h_v) = self.height_gradient(u, v);
        let (h_uu, h_vv, h_uv) = self.height_hessian(u, v);
        let s = self.size;
        let (f_x, f_y) = (h_u / s, h_v / s);
        let s2 = s * s;
        let (f_xx, f_yy, f_xy) = (h_uu / s2, h_vv / s2, h_uv / s2);
        let w = 1.0 + f_x * f_x + f_y * f_y;
        Ok((f_xx * f_yy - f_xy * f_xy) / (w * w))
    }

    fn closest_point(&self, point: Vec3) -> (f64, f64) {
        let domain = Interval::unit();
        let mut u = domain.clamp(point.x / self.size);
        let mut v = domain.clamp(point.y / self.size);
        if !(u.is_finite() && v.is_finite()) {
            return (domain.lo, domain.lo);
        }

        // Gauss-Newton on |S(u,v) - p|^2, kept inside the domain.
        for _ in 0..CLOSEST_POINT_ITERATIONS {
            let Ok((s, du, dv)) = self.evaluate_with_derivatives(u, v) else { break };
            let r = s - point;
            let (a, b, c) = (du.dot(du), du.dot(dv), dv.dot(dv));
            let det = a * c - b * b;
            if det.abs() < 1e-18 {
                break;
            }
            let (gu, gv) = (du.dot(r), dv.dot(r));
            let step_u = (c * gu - b * gv) / det;
            let step_v = (a * gv - b * gu) / det;
            let next_u = domain.clamp(u - step_u);
            let next_v = domain.clamp(v - step_v);
            let moved = (next_u - u).abs() + (next_v - v).abs();
            u = next_u;
            v = next_v;
            if moved < 1e-14 {
                break;
            }
        }
        (u, v)
    }
}
