use std::ops;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const ONE: Vector3 = Vector3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Cartesian position of a spherical sample, Z up.
    /// Azimuth turns about the vertical axis, elevation is measured from the horizontal plane.
    pub fn from_spherical(range: f64, azimuth: f64, elevation: f64) -> Self {
        let horizontal = range * elevation.cos();
        Self {
            x: horizontal * azimuth.cos(),
            y: horizontal * azimuth.sin(),
            z: range * elevation.sin(),
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn translate(&mut self, offset: &Vector3) {
        self.x += offset.x;
        self.y += offset.y;
        self.z += offset.z;
    }

    pub fn scale(&mut self, factor: &Vector3) {
        self.x *= factor.x;
        self.y *= factor.y;
        self.z *= factor.z;
    }

    pub fn rotate_around_x(&mut self, cos: f64, sin: f64) {
        let (y, z) = (self.y, self.z);
        self.y = y * cos - z * sin;
        self.z = y * sin + z * cos;
    }

    pub fn rotate_around_y(&mut self, cos: f64, sin: f64) {
        let (x, z) = (self.x, self.z);
        self.x = x * cos + z * sin;
        self.z = z * cos - x * sin;
    }

    pub fn rotate_around_z(&mut self, cos: f64, sin: f64) {
        let (x, y) = (self.x, self.y);
        self.x = x * cos - y * sin;
        self.y = x * sin + y * cos;
    }

    pub fn swap_xy(&mut self) {
        std::mem::swap(&mut self.x, &mut self.y);
    }

    pub fn swap_xz(&mut self) {
        std::mem::swap(&mut self.x, &mut self.z);
    }

    pub fn swap_yz(&mut self) {
        std::mem::swap(&mut self.y, &mut self.z);
    }

    pub fn clamp(&mut self, min: f64, max: f64) {
        self.x = self.x.clamp(min, max);
        self.y = self.y.clamp(min, max);
        self.z = self.z.clamp(min, max);
    }
}

impl ops::Add<Vector3> for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl ops::Sub<Vector3> for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl ops::Mul<f64> for Vector3 {
    type Output = Vector3;

    fn mul(self, scalar: f64) -> Vector3 {
        Vector3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Four channel vector. For colors X, Y, Z hold red, green, blue and W holds intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector4 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Vector4 {
    pub const ZERO: Vector4 = Vector4::new(0.0, 0.0, 0.0, 0.0);
    pub const ONE: Vector4 = Vector4::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn translate(&mut self, offset: &Vector4) {
        self.x += offset.x;
        self.y += offset.y;
        self.z += offset.z;
        self.w += offset.w;
    }

    pub fn scale(&mut self, factor: &Vector4) {
        self.x *= factor.x;
        self.y *= factor.y;
        self.z *= factor.z;
        self.w *= factor.w;
    }

    pub fn clamp(&mut self, min: f64, max: f64) {
        self.x = self.x.clamp(min, max);
        self.y = self.y.clamp(min, max);
        self.z = self.z.clamp(min, max);
        self.w = self.w.clamp(min, max);
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn assert_close(a: Vector3, b: Vector3) {
        assert!((a.x - b.x).abs() < 1e-12, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < 1e-12, "{a:?} != {b:?}");
        assert!((a.z - b.z).abs() < 1e-12, "{a:?} != {b:?}");
    }

    #[test]
    fn quarter_turns_follow_the_right_hand_rule() {
        let (cos, sin) = (FRAC_PI_2.cos(), FRAC_PI_2.sin());

        let mut v = Vector3::new(1.0, 0.0, 0.0);
        v.rotate_around_z(cos, sin);
        assert_close(v, Vector3::new(0.0, 1.0, 0.0));

        let mut v = Vector3::new(0.0, 1.0, 0.0);
        v.rotate_around_x(cos, sin);
        assert_close(v, Vector3::new(0.0, 0.0, 1.0));

        let mut v = Vector3::new(0.0, 0.0, 1.0);
        v.rotate_around_y(cos, sin);
        assert_close(v, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn spherical_conversion() {
        assert_close(
            Vector3::from_spherical(2.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        );
        assert_close(
            Vector3::from_spherical(2.0, FRAC_PI_2, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        );
        assert_close(
            Vector3::from_spherical(3.0, 1.0, FRAC_PI_2),
            Vector3::new(0.0, 0.0, 3.0),
        );
    }

    #[test]
    fn color_clamp() {
        let mut c = Vector4::new(-0.5, 0.25, 1.5, 2.0);
        c.clamp(0.0, 1.0);
        assert_eq!(c, Vector4::new(0.0, 0.25, 1.0, 1.0));
    }
}
