use scan_core::{
    math::{Vector3, Vector4},
    pointcloud::scan::ScanPose,
};
use serde::{Deserialize, Serialize};

use crate::transform::{
    color::{ApplyIntensity, ClampColor, ColorAffine},
    pose::ScanPoseTransform,
    position::{AxisSwap, PositionAffine},
    CompositeTransform, Transform,
};

/// Per-run point transform settings. Rotation angles are in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub swap_xy: bool,
    pub swap_xz: bool,
    pub swap_yz: bool,
    pub position_offset: Vector3,
    pub position_scaling: Vector3,
    pub position_rotation: Vector3,
    pub position_translation: Vector3,
    pub color_offset: Vector4,
    pub color_scaling: Vector4,
    pub color_translation: Vector4,
    pub apply_intensity: bool,
    pub clamp_color: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            swap_xy: false,
            swap_xz: false,
            swap_yz: false,
            position_offset: Vector3::ZERO,
            position_scaling: Vector3::ONE,
            position_rotation: Vector3::ZERO,
            position_translation: Vector3::ZERO,
            color_offset: Vector4::ZERO,
            color_scaling: Vector4::ONE,
            color_translation: Vector4::ZERO,
            apply_intensity: false,
            clamp_color: false,
        }
    }
}

impl TransformConfig {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    fn has_swap(&self) -> bool {
        self.swap_xy || self.swap_xz || self.swap_yz
    }

    fn has_position_affine(&self) -> bool {
        self.position_offset != Vector3::ZERO
            || self.position_scaling != Vector3::ONE
            || self.position_rotation != Vector3::ZERO
            || self.position_translation != Vector3::ZERO
    }

    fn has_color_affine(&self) -> bool {
        self.color_offset != Vector4::ZERO
            || self.color_scaling != Vector4::ONE
            || self.color_translation != Vector4::ZERO
    }
}

pub trait TransformBuilder {
    fn build(&self) -> Box<dyn Transform>;
}

/// Builds the per-scan pipeline: optional pose, then the configured point transform.
pub struct PointTransformBuilder<'a> {
    config: &'a TransformConfig,
    pose: Option<ScanPose>,
}

impl<'a> PointTransformBuilder<'a> {
    pub fn new(config: &'a TransformConfig) -> Self {
        Self { config, pose: None }
    }

    pub fn with_pose(mut self, pose: ScanPose) -> Self {
        self.pose = Some(pose);
        self
    }
}

impl TransformBuilder for PointTransformBuilder<'_> {
    fn build(&self) -> Box<dyn Transform> {
        let config = self.config;
        let mut stages: Vec<Box<dyn Transform>> = Vec::new();

        if let Some(pose) = self.pose {
            stages.push(Box::new(ScanPoseTransform { pose }));
        }
        if config.has_swap() {
            stages.push(Box::new(AxisSwap {
                xy: config.swap_xy,
                xz: config.swap_xz,
                yz: config.swap_yz,
            }));
        }
        if config.has_position_affine() {
            stages.push(Box::new(PositionAffine::new(
                config.position_offset,
                config.position_scaling,
                config.position_rotation,
                config.position_translation,
            )));
        }
        if config.has_color_affine() {
            stages.push(Box::new(ColorAffine {
                offset: config.color_offset,
                scale: config.color_scaling,
                translation: config.color_translation,
            }));
        }
        if config.apply_intensity {
            stages.push(Box::new(ApplyIntensity));
        }
        if config.clamp_color {
            stages.push(Box::new(ClampColor));
        }

        log::debug!("Point transform has {} stage(s)", stages.len());
        Box::new(CompositeTransform::new(stages))
    }
}

#[cfg(test)]
mod tests {
    use scan_core::pointcloud::point::Point;

    use super::*;

    fn sample() -> Point {
        Point::new(
            Vector3::new(1.5, -2.25, 3.0),
            Vector4::new(0.1, 0.2, 0.3, 0.4),
        )
    }

    #[test]
    fn default_config_is_identity() {
        let config = TransformConfig::default();
        assert!(config.is_identity());
        let transform = PointTransformBuilder::new(&config).build();
        assert_eq!(transform.transform(sample()), sample());
    }

    #[test]
    fn swap_xy_exchanges_coordinates() {
        let config = TransformConfig {
            swap_xy: true,
            ..Default::default()
        };
        let transform = PointTransformBuilder::new(&config).build();
        let p = transform.transform(sample());
        assert_eq!(p.position, Vector3::new(-2.25, 1.5, 3.0));
        assert_eq!(p.color, sample().color);
    }

    #[test]
    fn color_is_scaled_before_intensity_and_clamp() {
        let config = TransformConfig {
            color_scaling: Vector4::new(4.0, 1.0, 1.0, 2.0),
            apply_intensity: true,
            clamp_color: true,
            ..Default::default()
        };
        let transform = PointTransformBuilder::new(&config).build();
        let p = transform.transform(sample());
        // I = 0.8, R = 0.4 * 0.8, G = 0.2 * 0.8
        assert!((p.intensity() - 0.8).abs() < 1e-12);
        assert!((p.red() - 0.32).abs() < 1e-12);
        assert!((p.green() - 0.16).abs() < 1e-12);
    }

    #[test]
    fn pose_runs_before_user_transform() {
        let config = TransformConfig {
            position_scaling: Vector3::new(2.0, 2.0, 2.0),
            ..Default::default()
        };
        let pose = ScanPose {
            position: Vector3::new(1.0, 0.0, 0.0),
            ..Default::default()
        };
        let transform = PointTransformBuilder::new(&config).with_pose(pose).build();
        let p = transform.transform(Point::new(Vector3::new(1.0, 1.0, 1.0), Vector4::ZERO));
        assert_eq!(p.position, Vector3::new(4.0, 2.0, 2.0));
    }
}
