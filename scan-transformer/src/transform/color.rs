use scan_core::{math::Vector4, pointcloud::point::Point};

use super::Transform;

/// Offset, scale and translation of the color channels. W is intensity.
#[derive(Debug, Clone, Copy)]
pub struct ColorAffine {
    pub offset: Vector4,
    pub scale: Vector4,
    pub translation: Vector4,
}

impl Transform for ColorAffine {
    fn transform(&self, mut point: Point) -> Point {
        point.color.translate(&self.offset);
        point.color.scale(&self.scale);
        point.color.translate(&self.translation);
        point
    }
}

/// Multiplies red, green and blue by the intensity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyIntensity;

impl Transform for ApplyIntensity {
    fn transform(&self, mut point: Point) -> Point {
        let intensity = point.color.w;
        point.color.x *= intensity;
        point.color.y *= intensity;
        point.color.z *= intensity;
        point
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClampColor;

impl Transform for ClampColor {
    fn transform(&self, mut point: Point) -> Point {
        point.color.clamp(0.0, 1.0);
        point
    }
}
