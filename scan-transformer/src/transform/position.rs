use scan_core::{math::Vector3, pointcloud::point::Point};

use super::Transform;

/// Coordinate swaps, applied XY then XZ then YZ.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisSwap {
    pub xy: bool,
    pub xz: bool,
    pub yz: bool,
}

impl Transform for AxisSwap {
    fn transform(&self, mut point: Point) -> Point {
        if self.xy {
            point.position.swap_xy();
        }
        if self.xz {
            point.position.swap_xz();
        }
        if self.yz {
            point.position.swap_yz();
        }
        point
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisRotation {
    cos: f64,
    sin: f64,
}

impl AxisRotation {
    fn from_angle(angle: f64) -> Option<Self> {
        if angle == 0.0 {
            None
        } else {
            Some(Self {
                cos: angle.cos(),
                sin: angle.sin(),
            })
        }
    }
}

/// Offset, scale, rotation (radians, Z then X then Y) and translation of the position.
#[derive(Debug, Clone)]
pub struct PositionAffine {
    offset: Vector3,
    scale: Vector3,
    rotation_z: Option<AxisRotation>,
    rotation_x: Option<AxisRotation>,
    rotation_y: Option<AxisRotation>,
    translation: Vector3,
}

impl PositionAffine {
    pub fn new(offset: Vector3, scale: Vector3, rotation: Vector3, translation: Vector3) -> Self {
        Self {
            offset,
            scale,
            rotation_z: AxisRotation::from_angle(rotation.z),
            rotation_x: AxisRotation::from_angle(rotation.x),
            rotation_y: AxisRotation::from_angle(rotation.y),
            translation,
        }
    }
}

impl Transform for PositionAffine {
    fn transform(&self, mut point: Point) -> Point {
        let position = &mut point.position;
        position.translate(&self.offset);
        position.scale(&self.scale);
        if let Some(r) = self.rotation_z {
            position.rotate_around_z(r.cos, r.sin);
        }
        if let Some(r) = self.rotation_x {
            position.rotate_around_x(r.cos, r.sin);
        }
        if let Some(r) = self.rotation_y {
            position.rotate_around_y(r.cos, r.sin);
        }
        position.translate(&self.translation);
        point
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use scan_core::math::Vector4;

    use super::*;

    fn point(x: f64, y: f64, z: f64) -> Point {
        Point::new(Vector3::new(x, y, z), Vector4::ZERO)
    }

    #[test]
    fn swaps_compose_in_order() {
        let swap = AxisSwap {
            xy: true,
            xz: true,
            yz: false,
        };
        // (1,2,3) -> xy -> (2,1,3) -> xz -> (3,1,2)
        assert_eq!(swap.transform(point(1.0, 2.0, 3.0)).position, Vector3::new(3.0, 1.0, 2.0));
    }

    #[test]
    fn quarter_turn_around_z() {
        let affine = PositionAffine::new(
            Vector3::ZERO,
            Vector3::ONE,
            Vector3::new(0.0, 0.0, FRAC_PI_2),
            Vector3::ZERO,
        );
        let p = affine.transform(point(1.0, 0.0, 0.0)).position;
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
        assert_eq!(p.z, 0.0);
    }

    #[test]
    fn offset_before_scale_before_translation() {
        let affine = PositionAffine::new(
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(2.0, 3.0, 4.0),
            Vector3::ZERO,
            Vector3::new(10.0, 0.0, -1.0),
        );
        assert_eq!(
            affine.transform(point(0.0, 1.0, 2.0)).position,
            Vector3::new(12.0, 6.0, 11.0)
        );
    }
}
