use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub};

/// Lengths below this are treated as zero when normalizing.
pub const EPSILON: f64 = 1e-12;

/// A 2D vector in surface parameter (UV) space.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector, or the zero vector if the length is (near) zero.
    pub fn normalize_or_zero(&self) -> Self {
        let len = self.length();
        if len > EPSILON {
            *self / len
        } else {
            Vec2::ZERO
        }
    }

    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance_squared(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Scales the vector down to `max_len` if it is longer, preserving direction.
    /// Shorter vectors are returned unchanged. The result never exceeds `max_len`.
    pub fn clamp_length_max(&self, max_len: f64) -> Self {
        let len = self.length();
        if len.is_nan() || len <= max_len {
            return *self;
        }
        if max_len <= 0.0 {
            return Vec2::ZERO;
        }
        // Rounding can leave the scaled length an ulp or two above the cap.
        let mut factor = max_len / len;
        let mut scaled = *self * factor;
        while scaled.length() > max_len && factor > 0.0 {
            factor = f64::from_bits(factor.to_bits() - 1);
            scaled = *self * factor;
        }
        scaled
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar }
    }
}

impl MulAssign<f64> for Vec2 {
    fn mul_assign(&mut self, scalar: f64) {
        self.x *= scalar;
        self.y *= scalar;
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self { x: self.x / scalar, y: self.y / scalar }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

/// A 3D vector / point in model space.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const Z: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Unit vector, or `None` when the length is (near) zero.
    pub fn try_normalize(&self) -> Option<Self> {
        let len = self.length();
        if len > EPSILON && len.is_finite() {
            Some(*self / len)
        } else {
            None
        }
    }

    pub fn normalize_or_zero(&self) -> Self {
        self.try_normalize().unwrap_or(Vec3::ZERO)
    }

    /// The UV-plane components (x, y).
    pub fn truncate(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { x: self.x * scalar, y: self.y * scalar, z: self.z * scalar }
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self { x: self.x / scalar, y: self.y / scalar, z: self.z / scalar }
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z }
    }
}

/// Clamps a value between a minimum and maximum.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_length_max_only_scales_down() {
        let v = Vec2::new(3.0, 4.0);
        let clamped = v.clamp_length_max(1.0);
        assert!((clamped.length() - 1.0).abs() < 1e-12);
        assert!((clamped.x / clamped.y - 0.75).abs() < 1e-12);

        let short = Vec2::new(0.1, 0.0);
        assert_eq!(short.clamp_length_max(1.0), short);
    }

    #[test]
    fn clamp_length_max_never_exceeds_the_cap() {
        // Low-discrepancy sweep over directions, lengths and caps.
        for i in 1..20_000u32 {
            let t = i as f64;
            let angle = (t * 0.618_033_988_749_895).fract() * std::f64::consts::TAU;
            let len = 1e-3 + (t * 0.754_877_666_246_692_7).fract() * 10.0;
            let cap = 1e-4 + (t * 0.569_840_290_998_053_3).fract() * len;
            let v = Vec2::new(angle.cos() * len, angle.sin() * len);
            let clamped = v.clamp_length_max(cap);
            assert!(clamped.length() <= cap, "{:?} capped at {} has length {}", v, cap, clamped.length());
            assert!((clamped.length() - cap).abs() <= cap * 1e-14);
        }
        assert_eq!(Vec2::new(1.0, 1.0).clamp_length_max(0.0), Vec2::ZERO);
    }

    #[test]
    fn normalize_or_zero_handles_zero_vector() {
        assert_eq!(Vec2::ZERO.normalize_or_zero(), Vec2::ZERO);
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
        assert!(Vec3::ZERO.try_normalize().is_none());
    }

    #[test]
    fn cross_of_axes_is_right_handed() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::Z);
    }
}
