use std::{fmt, str::FromStr};

use scan_core::pointcloud::{
    point::Point,
    scan::{Field, ScanMetadata},
};
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    Uncompressed,
    Discretized,
}

/// How a letter turns a point field into an output value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueRule {
    Direct,
    Negated,
    Byte,
    TwelveBit,
}

/// One letter of a component format, resolved once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputComponent {
    pub letter: char,
    pub field: Field,
    rule: ValueRule,
}

const LETTERS: [(char, Field, ValueRule); 18] = [
    ('D', Field::Range, ValueRule::Direct),
    ('A', Field::Azimuth, ValueRule::Direct),
    ('E', Field::Elevation, ValueRule::Direct),
    ('X', Field::X, ValueRule::Direct),
    ('Y', Field::Y, ValueRule::Direct),
    ('Z', Field::Z, ValueRule::Direct),
    ('x', Field::X, ValueRule::Negated),
    ('y', Field::Y, ValueRule::Negated),
    ('z', Field::Z, ValueRule::Negated),
    ('i', Field::Intensity, ValueRule::Direct),
    ('I', Field::Intensity, ValueRule::Byte),
    ('n', Field::Intensity, ValueRule::TwelveBit),
    ('r', Field::Red, ValueRule::Direct),
    ('g', Field::Green, ValueRule::Direct),
    ('b', Field::Blue, ValueRule::Direct),
    ('R', Field::Red, ValueRule::Byte),
    ('G', Field::Green, ValueRule::Byte),
    ('B', Field::Blue, ValueRule::Byte),
];

/// Position encoding shared by every scan of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEncoding {
    pub compression: Compression,
    pub bit_count: u16,
    pub precision: f64,
}

impl PositionEncoding {
    /// Positions are stored as floats from 32 bits up.
    pub fn new(bit_count: u16, precision: f64) -> Self {
        let compression = if bit_count >= 32 {
            Compression::Uncompressed
        } else {
            Compression::Discretized
        };
        Self {
            compression,
            bit_count,
            precision,
        }
    }
}

impl OutputComponent {
    pub fn from_letter(letter: char) -> Result<Self, ComponentError> {
        LETTERS
            .iter()
            .find(|(c, _, _)| *c == letter)
            .map(|&(letter, field, rule)| Self {
                letter,
                field,
                rule,
            })
            .ok_or(ComponentError::UnknownLetter(letter))
    }

    pub fn is_position(&self) -> bool {
        matches!(self.field, Field::X | Field::Y | Field::Z)
    }

    pub fn is_color(&self) -> bool {
        matches!(
            self.field,
            Field::Intensity | Field::Red | Field::Green | Field::Blue
        )
    }

    pub fn value(&self, point: &Point) -> f64 {
        let raw = match self.field {
            Field::Range => point.range(),
            Field::Azimuth => point.azimuth(),
            Field::Elevation => point.elevation(),
            Field::X => point.position.x,
            Field::Y => point.position.y,
            Field::Z => point.position.z,
            Field::Intensity => point.intensity(),
            Field::Red => point.red(),
            Field::Green => point.green(),
            Field::Blue => point.blue(),
        };

        match self.rule {
            ValueRule::Direct => raw,
            ValueRule::Negated => -raw,
            ValueRule::Byte => (raw * 255.0).floor(),
            ValueRule::TwelveBit => (-2048.0 + raw * 4095.0).floor(),
        }
    }

    /// Descriptor of this component for one scan of a PCF run.
    pub fn descriptor(
        &self,
        scan: &ScanMetadata,
        position: &PositionEncoding,
    ) -> Result<ComponentDescriptor, ComponentError> {
        if position.compression == Compression::Uncompressed {
            return Ok(ComponentDescriptor::uncompressed(self.field));
        }

        match (self.field, self.rule) {
            (Field::Range | Field::Azimuth | Field::Elevation, _) => {
                Ok(ComponentDescriptor::uncompressed(self.field))
            }
            (Field::X | Field::Y | Field::Z, rule) => {
                let (minimum, maximum) = position_bounds(scan, self.field, position);
                let (minimum, maximum) = if rule == ValueRule::Negated {
                    (-maximum, -minimum)
                } else {
                    (minimum, maximum)
                };
                ComponentDescriptor::discretized(
                    self.field,
                    position.bit_count,
                    position.precision,
                    0.0,
                    minimum,
                    maximum,
                )
            }
            (_, ValueRule::TwelveBit) => {
                ComponentDescriptor::discretized(self.field, 12, 1.0, -2048.0, -2048.0, 2047.0)
            }
            (_, ValueRule::Byte) => {
                ComponentDescriptor::discretized(self.field, 8, 1.0, 0.0, 0.0, 255.0)
            }
            _ => ComponentDescriptor::discretized(self.field, 8, 1.0 / 255.0, 0.0, 0.0, 1.0),
        }
    }
}

/// Declared bounds of a position axis. Scans without Cartesian bounds fall back to the
/// spherical range, then to the widest interval the bit count can represent.
fn position_bounds(scan: &ScanMetadata, field: Field, position: &PositionEncoding) -> (f64, f64) {
    if let Some(range) = scan.field_range(field) {
        return (range.min, range.max);
    }
    if let Some(range) = scan.field_range(Field::Range) {
        let reach = range.min.abs().max(range.max.abs());
        return (-reach, reach);
    }
    let half = (1u64 << (position.bit_count.saturating_sub(1))) as f64;
    (-half * position.precision, (half - 1.0) * position.precision)
}

impl fmt::Display for OutputComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)
    }
}

/// Ordered output components, parsed from a letter string such as `XYZi` or `xzYRGB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFormat {
    components: Vec<OutputComponent>,
}

impl FromStr for ComponentFormat {
    type Err = ComponentError;

    fn from_str(letters: &str) -> Result<Self, Self::Err> {
        if letters.is_empty() {
            return Err(ComponentError::EmptyFormat);
        }
        let components = letters
            .chars()
            .map(OutputComponent::from_letter)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }
}

impl fmt::Display for ComponentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl ComponentFormat {
    pub fn components(&self) -> &[OutputComponent] {
        &self.components
    }

    pub fn values(&self, point: &Point) -> Vec<f64> {
        self.components.iter().map(|c| c.value(point)).collect()
    }

    /// Components used to key cells. The last letter naming an axis decides its sign.
    pub fn axis_components(&self) -> [OutputComponent; 3] {
        let mut axes = [Field::X, Field::Y, Field::Z].map(|field| OutputComponent {
            letter: field.letter(),
            field,
            rule: ValueRule::Direct,
        });
        for component in self.components.iter().filter(|c| c.is_position()) {
            axes[component.field.index() - Field::X.index()] = *component;
        }
        axes
    }

    /// Source fields the format needs, including the ones positions and colors are derived from.
    pub fn required_fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::Range,
            Field::Azimuth,
            Field::Elevation,
            Field::X,
            Field::Y,
            Field::Z,
        ];
        for component in self.components.iter().filter(|c| c.is_color()) {
            if !fields.contains(&component.field) {
                fields.push(component.field);
            }
            if component.field != Field::Intensity && !fields.contains(&Field::Intensity) {
                fields.push(Field::Intensity);
            }
        }
        fields
    }

    pub fn descriptors(
        &self,
        scan: &ScanMetadata,
        position: &PositionEncoding,
    ) -> Result<Vec<ComponentDescriptor>, ComponentError> {
        self.components
            .iter()
            .map(|component| component.descriptor(scan, position))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodedValue {
    Float(f32),
    Code(i64),
}

/// Storage rule for one PCF channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: Field,
    pub compression: Compression,
    pub bit_count: u16,
    pub precision: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl ComponentDescriptor {
    pub fn uncompressed(name: Field) -> Self {
        Self {
            name,
            compression: Compression::Uncompressed,
            bit_count: 32,
            precision: 0.0,
            offset: 0.0,
            minimum: 0.0,
            maximum: 0.0,
        }
    }

    pub fn discretized(
        name: Field,
        bit_count: u16,
        precision: f64,
        offset: f64,
        minimum: f64,
        maximum: f64,
    ) -> Result<Self, ComponentError> {
        if bit_count == 0 || bit_count > 63 {
            return Err(ComponentError::InvalidBitCount(bit_count));
        }
        if !(precision.is_finite() && precision > 0.0) {
            return Err(ComponentError::InvalidPrecision(precision));
        }
        if !(minimum.is_finite() && maximum.is_finite() && minimum <= maximum) {
            return Err(ComponentError::InvalidRange {
                name,
                minimum,
                maximum,
            });
        }

        let descriptor = Self {
            name,
            compression: Compression::Discretized,
            bit_count,
            precision,
            offset,
            minimum,
            maximum,
        };

        let (low, high) = descriptor.code_range();
        let codes = (i128::from(high) - i128::from(low) + 1) as u128;
        let capacity = 1u128 << bit_count;
        if codes > capacity {
            return Err(ComponentError::RangeOverflow {
                name,
                codes,
                bit_count,
                capacity,
            });
        }

        Ok(descriptor)
    }

    fn raw_code(&self, value: f64) -> i64 {
        ((value - self.offset) / self.precision).round() as i64
    }

    /// Smallest and largest code of a discretized descriptor.
    pub fn code_range(&self) -> (i64, i64) {
        (self.raw_code(self.minimum), self.raw_code(self.maximum))
    }

    /// Distance of a code from the lowest code, as stored in a PCF cell.
    pub fn stored_code(&self, code: i64) -> u64 {
        let (low, high) = self.code_range();
        (code.clamp(low, high) - low) as u64
    }

    pub fn code_from_stored(&self, stored: u64) -> i64 {
        self.code_range().0 + stored as i64
    }

    pub fn is_signed(&self) -> bool {
        self.compression == Compression::Discretized && self.code_range().0 < 0
    }

    /// Bytes one encoded value takes in a PCF cell record.
    pub fn byte_count(&self) -> usize {
        match self.compression {
            Compression::Uncompressed => 4,
            Compression::Discretized => usize::from(self.bit_count).div_ceil(8),
        }
    }

    pub fn encode(&self, value: f64) -> EncodedValue {
        match self.compression {
            Compression::Uncompressed => EncodedValue::Float(value as f32),
            Compression::Discretized => {
                let (low, high) = self.code_range();
                EncodedValue::Code(self.raw_code(value).clamp(low, high))
            }
        }
    }

    pub fn decode(&self, value: EncodedValue) -> f64 {
        match value {
            EncodedValue::Float(value) => f64::from(value),
            EncodedValue::Code(code) => code as f64 * self.precision + self.offset,
        }
    }

    /// Value as it reads back after storage.
    pub fn quantize(&self, value: f64) -> f64 {
        self.decode(self.encode(value))
    }
}
