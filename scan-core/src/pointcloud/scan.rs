use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Quaternion, Vector3};

/// Per-point fields a scan may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Range,
    Azimuth,
    Elevation,
    X,
    Y,
    Z,
    Intensity,
    Red,
    Green,
    Blue,
}

impl Field {
    pub const COUNT: usize = 10;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Range,
        Field::Azimuth,
        Field::Elevation,
        Field::X,
        Field::Y,
        Field::Z,
        Field::Intensity,
        Field::Red,
        Field::Green,
        Field::Blue,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        match self {
            Field::Range => 'D',
            Field::Azimuth => 'A',
            Field::Elevation => 'E',
            Field::X => 'X',
            Field::Y => 'Y',
            Field::Z => 'Z',
            Field::Intensity => 'I',
            Field::Red => 'R',
            Field::Green => 'G',
            Field::Blue => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.letter() == letter)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Per-point invalid-state flags. Each one guards a group of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValidityMask {
    Spherical,
    Cartesian,
    Intensity,
    Color,
}

impl ValidityMask {
    pub const COUNT: usize = 4;

    pub const ALL: [ValidityMask; ValidityMask::COUNT] = [
        ValidityMask::Spherical,
        ValidityMask::Cartesian,
        ValidityMask::Intensity,
        ValidityMask::Color,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn guarded_fields(self) -> &'static [Field] {
        match self {
            ValidityMask::Spherical => &[Field::Range, Field::Azimuth, Field::Elevation],
            ValidityMask::Cartesian => &[Field::X, Field::Y, Field::Z],
            ValidityMask::Intensity => &[Field::Intensity],
            ValidityMask::Color => &[Field::Red, Field::Green, Field::Blue],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Maps a raw value into [0, 1]. Degenerate ranges leave the value untouched.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            (value - self.min) / (self.max - self.min)
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPose {
    pub position: Vector3,
    pub rotation: Quaternion,
}

impl ScanPose {
    pub fn axis_vectors(&self) -> [Vector3; 3] {
        self.rotation.axis_vectors()
    }

    /// Maps a point from scanner-local to world coordinates.
    pub fn to_world(&self, local: Vector3) -> Vector3 {
        let [x_axis, y_axis, z_axis] = self.axis_vectors();
        self.position + x_axis * local.x + y_axis * local.y + z_axis * local.z
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub index: usize,
    pub name: String,
    pub pose: ScanPose,
    pub row_count: u64,
    pub column_count: u64,
    pub point_count: u64,
    pub fields: BTreeMap<Field, FieldRange>,
    pub validity: BTreeSet<ValidityMask>,
}

impl ScanMetadata {
    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn field_range(&self, field: Field) -> Option<FieldRange> {
        self.fields.get(&field).copied()
    }

    pub fn has_validity(&self, mask: ValidityMask) -> bool {
        self.validity.contains(&mask)
    }

    pub fn has_cartesian(&self) -> bool {
        self.has_field(Field::X) || self.has_field(Field::Y) || self.has_field(Field::Z)
    }

    pub fn has_spherical(&self) -> bool {
        self.has_field(Field::Range)
            && self.has_field(Field::Azimuth)
            && self.has_field(Field::Elevation)
    }

    /// Position must be rebuilt from range/azimuth/elevation.
    pub fn derives_cartesian(&self) -> bool {
        self.has_spherical() && !self.has_cartesian()
    }

    /// Row and column counts of the point grid.
    /// Unstructured scans are reported as a single row holding every point.
    pub fn grid_shape(&self) -> (u64, u64) {
        if self.row_count == 0 && self.column_count == 0 && self.point_count > 0 {
            (1, self.point_count)
        } else {
            (self.row_count, self.column_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unstructured_scan_is_one_row() {
        let scan = ScanMetadata {
            point_count: 42,
            ..Default::default()
        };
        assert_eq!(scan.grid_shape(), (1, 42));

        let gridded = ScanMetadata {
            point_count: 12,
            row_count: 3,
            column_count: 4,
            ..Default::default()
        };
        assert_eq!(gridded.grid_shape(), (3, 4));
    }

    #[test]
    fn normalization_uses_scan_limits() {
        let range = FieldRange::new(0.0, 255.0);
        assert_eq!(range.normalize(51.0), 0.2);

        let flat = FieldRange::new(7.0, 7.0);
        assert_eq!(flat.normalize(7.0), 7.0);
    }

    #[test]
    fn pose_maps_to_world() {
        let pose = ScanPose {
            position: Vector3::new(10.0, 20.0, 30.0),
            rotation: Quaternion::IDENTITY,
        };
        assert_eq!(
            pose.to_world(Vector3::new(1.0, 2.0, 3.0)),
            Vector3::new(11.0, 22.0, 33.0)
        );
    }
}
