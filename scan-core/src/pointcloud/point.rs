use serde::{Deserialize, Serialize};

use crate::math::{Vector3, Vector4};

// Colors are normalized to [0, 1] using the per-scan limits.
// The W channel of `color` carries intensity, X/Y/Z carry red/green/blue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub spherical: Vector3,
    pub position: Vector3,
    pub color: Vector4,
}

impl Point {
    pub fn new(position: Vector3, color: Vector4) -> Self {
        Self {
            spherical: Vector3::ZERO,
            position,
            color,
        }
    }

    pub fn range(&self) -> f64 {
        self.spherical.x
    }

    pub fn azimuth(&self) -> f64 {
        self.spherical.y
    }

    pub fn elevation(&self) -> f64 {
        self.spherical.z
    }

    pub fn intensity(&self) -> f64 {
        self.color.w
    }

    pub fn red(&self) -> f64 {
        self.color.x
    }

    pub fn green(&self) -> f64 {
        self.color.y
    }

    pub fn blue(&self) -> f64 {
        self.color.z
    }
}
