//! Curvature and slope fields sampled over a UV grid.
//!
//! Fields are built once per surface and never mutated afterwards. Per-sample query
//! failures and degenerate geometry are absorbed here (counted in [`FieldDiagnostics`]);
//! only invalid grid resolutions reach the caller.

use crate::surface::{Axis, Interval, Surface};
use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use surface_common::{clamp, FieldSampling, Vec2, Vec3};

/// Raw curvature ranges at or below this collapse the whole field to [`DEGENERATE_CURVATURE`].
pub const CURVATURE_RANGE_EPSILON: f64 = 1e-12;
/// Value of every cell of a curvature field whose raw range is degenerate.
pub const DEGENERATE_CURVATURE: f64 = 0.5;
const SLOPE_MAX_EPSILON: f64 = 1e-12;
const UNIT_LENGTH_TOLERANCE: f64 = 1e-9;

/// Reference "down" used to derive the downhill direction.
const GRAVITY: Vec3 = Vec3 { x: 0.0, y: 0.0, z: -1.0 };

/// Regular grid of UV samples, row-major (`iv * nu + iu`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvGrid {
    pub nu: usize,
    pub nv: usize,
    pub domain_u: Interval,
    pub domain_v: Interval,
    pub uv: Vec<Vec2>,
}

impl UvGrid {
    /// Evenly spaced samples spanning both domains, endpoints included. An axis with a
    /// single sample sits at the domain's `lo`.
    pub fn uniform(nu: usize, nv: usize, domain_u: Interval, domain_v: Interval) -> Result<Self> {
        if nu == 0 || nv == 0 {
            anyhow::bail!("Field grid resolution must be positive (got {}x{}).", nu, nv);
        }
        if !domain_u.is_valid() || !domain_v.is_valid() {
            anyhow::bail!("Surface domain has zero area: u={:?} v={:?}.", domain_u, domain_v);
        }
        let fraction = |i: usize, n: usize| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };

        let mut uv = Vec::with_capacity(nu * nv);
        for iv in 0..nv {
            let v = domain_v.lerp(fraction(iv, nv));
            for iu in 0..nu {
                uv.push(Vec2::new(domain_u.lerp(fraction(iu, nu)), v));
            }
        }
        Ok(UvGrid { nu, nv, domain_u, domain_v, uv })
    }

    pub fn len(&self) -> usize {
        self.uv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uv.is_empty()
    }

    #[inline(always)]
    pub fn index(&self, iu: usize, iv: usize) -> usize {
        iv * self.nu + iu
    }
}

/// UV grid together with the evaluated points and normals at each sample.
#[derive(Debug, Clone)]
pub struct SurfaceSamples {
    pub grid: UvGrid,
    pub points: Vec<Vec3>,
    /// Unit normals; `(0, 0, 1)` where the surface normal is degenerate.
    pub normals: Vec<Vec3>,
}

/// Samples `surface` on a uniform `nu x nv` grid over its domain.
pub fn sample_uniform_grid(nu: usize, nv: usize, surface: &dyn Surface) -> Result<SurfaceSamples> {
    let grid = UvGrid::uniform(nu, nv, surface.domain(Axis::U), surface.domain(Axis::V))?;
    let points = grid.uv.iter().map(|p| surface.evaluate(p.x, p.y)).collect();
    let normals = grid
        .uv
        .iter()
        .map(|p| surface.normal_at(p.x, p.y).unwrap_or(Vec3::Z))
        .collect();
    Ok(SurfaceSamples { grid, points, normals })
}

/// Counts of samples that resolved to a neutral default during field construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostics {
    pub curvature_failures: usize,
    pub slope_failures: usize,
    pub degenerate_normals: usize,
    pub degenerate_projections: usize,
    pub curvature_range_degenerate: bool,
}

impl FieldDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.curvature_failures == 0
            && self.slope_failures == 0
            && self.degenerate_normals == 0
            && self.degenerate_projections == 0
            && !self.curvature_range_degenerate
    }
}

/// Per-cell Gaussian curvature, min-max normalized to `[0, 1]`.
///
/// A failed query contributes 0 before normalization. If the raw range is at most
/// [`CURVATURE_RANGE_EPSILON`] every cell is exactly [`DEGENERATE_CURVATURE`].
pub fn compute_curvature(surface: &dyn Surface, grid: &UvGrid, diagnostics: &mut FieldDiagnostics) -> Vec<f64> {
    let mut min_k = f64::INFINITY;
    let mut max_k = f64::NEG_INFINITY;

    let mut curvature: Vec<f64> = grid
        .uv
        .iter()
        .map(|p| {
            let k = match surface.gaussian_curvature_at(p.x, p.y) {
                Ok(k) if k.is_finite() => k,
                _ => {
                    diagnostics.curvature_failures += 1;
                    0.0
                }
            };
            min_k = min_k.min(k);
            max_k = max_k.max(k);
            k
        })
        .collect();

    let range = max_k - min_k;
    if !(range > CURVATURE_RANGE_EPSILON) {
        diagnostics.curvature_range_degenerate = true;
        curvature.iter_mut().for_each(|c| *c = DEGENERATE_CURVATURE);
        return curvature;
    }

    for c in curvature.iter_mut() {
        *c = clamp((*c - min_k) / range, 0.0, 1.0);
    }
    curvature
}

/// Slope magnitude and downhill direction of a single sample.
fn slope_at(surface: &dyn Surface, u: f64, v: f64, diagnostics: &mut FieldDiagnostics) -> (f64, Vec3) {
    let (_, du, dv) = match surface.evaluate_with_derivatives(u, v) {
        Ok(derivs) => derivs,
        Err(_) => {
            diagnostics.slope_failures += 1;
            return (0.0, Vec3::ZERO);
        }
    };

    let Some(n) = du.cross(dv).try_normalize() else {
        diagnostics.degenerate_normals += 1;
        return (0.0, Vec3::ZERO);
    };

    // Project "down" onto the tangent plane.
    let Some(downhill) = (GRAVITY - n * GRAVITY.dot(n)).try_normalize() else {
        diagnostics.degenerate_projections += 1;
        return (0.0, Vec3::ZERO);
    };

    let theta = clamp(n.dot(Vec3::Z), -1.0, 1.0).acos();
    (theta.sin(), downhill)
}

/// Per-cell slope magnitude (sine of the tilt from vertical) and unit downhill direction.
///
/// Magnitudes are divided by the grid maximum unless that maximum is ~0.
pub fn compute_slope(surface: &dyn Surface, grid: &UvGrid, diagnostics: &mut FieldDiagnostics) -> (Vec<f64>, Vec<Vec3>) {
    let (mut magnitude, direction): (Vec<f64>, Vec<Vec3>) = grid
        .uv
        .iter()
        .map(|p| slope_at(surface, p.x, p.y, diagnostics))
        .unzip();

    let max_mag = magnitude.iter().copied().fold(0.0, f64::max);
    if max_mag > SLOPE_MAX_EPSILON {
        magnitude.iter_mut().for_each(|m| *m /= max_mag);
    }
    (magnitude, direction)
}

/// Immutable curvature / slope field over a fixed `nu x nv` grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldGrid {
    nu: usize,
    nv: usize,
    domain_u: Interval,
    domain_v: Interval,
    curvature: Vec<f64>,
    slope_magnitude: Vec<f64>,
    slope_direction: Vec<Vec3>,
}

impl FieldGrid {
    /// Samples `surface` and computes both fields.
    pub fn build(surface: &dyn Surface, nu: usize, nv: usize) -> Result<(Self, FieldDiagnostics)> {
        let grid = UvGrid::uniform(nu, nv, surface.domain(Axis::U), surface.domain(Axis::V))?;
        let mut diagnostics = FieldDiagnostics::default();

        let curvature = compute_curvature(surface, &grid, &mut diagnostics);
        let (slope_magnitude, slope_direction) = compute_slope(surface, &grid, &mut diagnostics);

        if diagnostics.is_clean() {
            debug!("Field grid {}x{} built without degenerate samples.", nu, nv);
        } else {
            warn!("Field grid {}x{} absorbed degenerate samples: {:?}", nu, nv, diagnostics);
        }
        info!("Field grid {}x{} ready.", nu, nv);

        let field = FieldGrid::from_parts(grid, curvature, slope_magnitude, slope_direction)?;
        Ok((field, diagnostics))
    }

    /// Assembles a field from precomputed cell values (row-major, `iv * nu + iu`).
    pub fn from_parts(
        grid: UvGrid,
        curvature: Vec<f64>,
        slope_magnitude: Vec<f64>,
        slope_direction: Vec<Vec3>,
    ) -> Result<Self> {
        let cells = grid.len();
        if curvature.len() != cells || slope_magnitude.len() != cells || slope_direction.len() != cells {
            anyhow::bail!(
                "Field layers must have {} cells (curvature {}, slope magnitude {}, slope direction {}).",
                cells, curvature.len(), slope_magnitude.len(), slope_direction.len()
            );
        }
        let unit_interval = |x: f64| x.is_finite() && (0.0..=1.0).contains(&x);
        if let Some(i) = curvature.iter().position(|&c| !unit_interval(c)) {
            anyhow::bail!("Curvature at cell {} must lie in [0, 1] (got {}).", i, curvature[i]);
        }
        if let Some(i) = slope_magnitude.iter().position(|&m| !unit_interval(m)) {
            anyhow::bail!("Slope magnitude at cell {} must lie in [0, 1] (got {}).", i, slope_magnitude[i]);
        }
        let unit_or_zero = |d: &Vec3| {
            let len = d.length();
            len == 0.0 || (len - 1.0).abs() <= UNIT_LENGTH_TOLERANCE
        };
        if let Some(i) = slope_direction.iter().position(|d| !unit_or_zero(d)) {
            anyhow::bail!("Slope direction at cell {} must be a unit or zero vector (got {:?}).", i, slope_direction[i]);
        }
        Ok(FieldGrid {
            nu: grid.nu,
            nv: grid.nv,
            domain_u: grid.domain_u,
            domain_v: grid.domain_v,
            curvature,
            slope_magnitude,
            slope_direction,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nu, self.nv)
    }

    pub fn domain(&self) -> (Interval, Interval) {
        (self.domain_u, self.domain_v)
    }

    #[inline(always)]
    fn index(&self, iu: usize, iv: usize) -> usize {
        iv * self.nu + iu
    }

    /// Cell indices for a continuous UV position: truncating linear scaling against the
    /// domain and resolution, clamped to valid indices.
    pub fn cell_indices(&self, uv: Vec2) -> (usize, usize) {
        (
            Self::axis_index(uv.x, self.domain_u, self.nu),
            Self::axis_index(uv.y, self.domain_v, self.nv),
        )
    }

    fn axis_index(t: f64, domain: Interval, n: usize) -> usize {
        let scaled = domain.normalized(t) * (n - 1) as f64;
        // NaN casts to 0; negatives saturate at 0.
        (scaled as usize).min(n - 1)
    }

    /// Continuous cell coordinates, clamped to `[0, n-1]`.
    fn cell_coords(&self, uv: Vec2) -> (f64, f64) {
        let scale = |t: f64, domain: Interval, n: usize| {
            let s = domain.normalized(t) * (n - 1) as f64;
            if s.is_finite() { clamp(s, 0.0, (n - 1) as f64) } else { 0.0 }
        };
        (scale(uv.x, self.domain_u, self.nu), scale(uv.y, self.domain_v, self.nv))
    }

    pub fn curvature(&self, iu: usize, iv: usize) -> f64 {
        self.curvature[self.index(iu, iv)]
    }

    pub fn slope_magnitude(&self, iu: usize, iv: usize) -> f64 {
        self.slope_magnitude[self.index(iu, iv)]
    }

    pub fn slope_direction(&self, iu: usize, iv: usize) -> Vec3 {
        self.slope_direction[self.index(iu, iv)]
    }

    /// Slope force of one cell, in UV components.
    fn cell_slope_force(&self, iu: usize, iv: usize) -> Vec2 {
        self.slope_direction(iu, iv).truncate() * self.slope_magnitude(iu, iv)
    }

    /// Curvature at `uv` under the given sampling mode.
    pub fn sample_curvature(&self, uv: Vec2, sampling: FieldSampling) -> f64 {
        match sampling {
            FieldSampling::Nearest => {
                let (iu, iv) = self.cell_indices(uv);
                self.curvature(iu, iv)
            }
            FieldSampling::Bilinear => self.bilinear(uv, |iu, iv| self.curvature(iu, iv), |a, b, t| a + (b - a) * t),
        }
    }

    /// `slope_magnitude * slope_direction` at `uv`, in UV components.
    pub fn sample_slope_force(&self, uv: Vec2, sampling: FieldSampling) -> Vec2 {
        match sampling {
            FieldSampling::Nearest => {
                let (iu, iv) = self.cell_indices(uv);
                self.cell_slope_force(iu, iv)
            }
            FieldSampling::Bilinear => {
                self.bilinear(uv, |iu, iv| self.cell_slope_force(iu, iv), |a, b, t| a + (b - a) * t)
            }
        }
    }

    fn bilinear<T, F, L>(&self, uv: Vec2, cell: F, lerp: L) -> T
    where
        T: Copy,
        F: Fn(usize, usize) -> T,
        L: Fn(T, T, f64) -> T,
    {
        let (su, sv) = self.cell_coords(uv);
        let (iu0, iv0) = (su.floor() as usize, sv.floor() as usize);
        let (iu1, iv1) = ((iu0 + 1).min(self.nu - 1), (iv0 + 1).min(self.nv - 1));
        let (tu, tv) = (su - iu0 as f64, sv - iv0 as f64);

        let bottom = lerp(cell(iu0, iv0), cell(iu1, iv0), tu);
        let top = lerp(cell(iu0, iv1), cell(iu1, iv1), tu);
        lerp(bottom, top, tv)
    }
}
