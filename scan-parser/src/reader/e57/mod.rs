use std::{fs::File, io::BufReader, path::PathBuf};

use e57::{E57Reader, RawValues, RecordDataType, RecordName, RecordValue};
use scan_core::math::{Quaternion, Vector3};
use scan_core::pointcloud::scan::{Field, FieldRange, ScanMetadata, ScanPose, ValidityMask};

use super::{ChunkBuffer, ChunkReader, ScanSource, SourceProvider};
use crate::error::ReaderError;

pub struct E57SourceProvider {
    pub filename: PathBuf,
}

impl SourceProvider for E57SourceProvider {
    fn open_source(&self) -> Result<Box<dyn ScanSource>, ReaderError> {
        Ok(Box::new(E57Source::open(self.filename.clone())?))
    }
}

/// Record layout of one scan: which prototype slot feeds which buffer array.
struct ScanLayout {
    fields: Vec<(Field, usize, RecordDataType)>,
    masks: Vec<(ValidityMask, usize, RecordDataType)>,
}

pub struct E57Source {
    reader: E57Reader<BufReader<File>>,
    pointclouds: Vec<e57::PointCloud>,
    scans: Vec<ScanMetadata>,
}

impl E57Source {
    pub fn open(path: PathBuf) -> Result<Self, ReaderError> {
        let start = std::time::Instant::now();
        let reader = E57Reader::from_file(&path).map_err(|source| ReaderError::Open {
            path: path.clone(),
            source,
        })?;
        log::debug!("Open E57 time: {:?}", start.elapsed());

        let pointclouds = reader.pointclouds();
        let scans = pointclouds
            .iter()
            .enumerate()
            .map(|(index, pc)| read_metadata(index, pc))
            .collect();

        Ok(Self {
            reader,
            pointclouds,
            scans,
        })
    }
}

impl ScanSource for E57Source {
    fn scan_count(&self) -> usize {
        self.scans.len()
    }

    fn scan_metadata(&self, index: usize) -> Result<ScanMetadata, ReaderError> {
        self.scans
            .get(index)
            .cloned()
            .ok_or(ReaderError::ScanIndex {
                index,
                count: self.scans.len(),
            })
    }

    fn open_reader(&mut self, index: usize) -> Result<Box<dyn ChunkReader + '_>, ReaderError> {
        let count = self.pointclouds.len();
        let pc = self
            .pointclouds
            .get(index)
            .ok_or(ReaderError::ScanIndex { index, count })?;
        let layout = scan_layout(pc);
        let points = self
            .reader
            .pointcloud_raw(pc)
            .map_err(|source| ReaderError::Decode {
                scan: index,
                source,
            })?;

        Ok(Box::new(E57ChunkReader {
            scan: index,
            layout,
            points: Box::new(points),
        }))
    }
}

struct E57ChunkReader<'a> {
    scan: usize,
    layout: ScanLayout,
    points: Box<dyn Iterator<Item = Result<RawValues, e57::Error>> + 'a>,
}

impl E57ChunkReader<'_> {
    /// Values arrive in prototype order.
    fn raw_value(
        &self,
        point: &RawValues,
        slot: usize,
        data_type: &RecordDataType,
    ) -> Result<f64, ReaderError> {
        match point.get(slot) {
            Some(value) => value
                .to_f64(data_type)
                .map_err(|source| ReaderError::Decode {
                    scan: self.scan,
                    source,
                }),
            None => Ok(0.0),
        }
    }
}

impl ChunkReader for E57ChunkReader<'_> {
    fn read_chunk(&mut self, buffer: &mut ChunkBuffer) -> Result<usize, ReaderError> {
        let mut count = 0;

        while count < buffer.capacity() {
            let point = match self.points.next() {
                Some(Ok(point)) => point,
                Some(Err(source)) => {
                    return Err(ReaderError::Decode {
                        scan: self.scan,
                        source,
                    })
                }
                None => break,
            };

            for (field, slot, data_type) in &self.layout.fields {
                if buffer.has_field(*field) {
                    let value = self.raw_value(&point, *slot, data_type)?;
                    buffer.values_mut(*field)[count] = value;
                }
            }
            for (mask, slot, data_type) in &self.layout.masks {
                if buffer.has_validity(*mask) {
                    let state = self.raw_value(&point, *slot, data_type)?;
                    buffer.invalid_mut(*mask)[count] = i8::from(state != 0.0);
                }
            }

            count += 1;
        }

        buffer.set_len(count);
        Ok(count)
    }
}

fn field_of(name: &RecordName) -> Option<Field> {
    match name {
        RecordName::SphericalRange => Some(Field::Range),
        RecordName::SphericalAzimuth => Some(Field::Azimuth),
        RecordName::SphericalElevation => Some(Field::Elevation),
        RecordName::CartesianX => Some(Field::X),
        RecordName::CartesianY => Some(Field::Y),
        RecordName::CartesianZ => Some(Field::Z),
        RecordName::Intensity => Some(Field::Intensity),
        RecordName::ColorRed => Some(Field::Red),
        RecordName::ColorGreen => Some(Field::Green),
        RecordName::ColorBlue => Some(Field::Blue),
        _ => None,
    }
}

fn mask_of(name: &RecordName) -> Option<ValidityMask> {
    match name {
        RecordName::SphericalInvalidState => Some(ValidityMask::Spherical),
        RecordName::CartesianInvalidState => Some(ValidityMask::Cartesian),
        RecordName::IsIntensityInvalid => Some(ValidityMask::Intensity),
        RecordName::IsColorInvalid => Some(ValidityMask::Color),
        _ => None,
    }
}

fn scan_layout(pc: &e57::PointCloud) -> ScanLayout {
    let mut layout = ScanLayout {
        fields: Vec::new(),
        masks: Vec::new(),
    };

    for (slot, record) in pc.prototype.iter().enumerate() {
        if let Some(field) = field_of(&record.name) {
            layout.fields.push((field, slot, record.data_type.clone()));
        } else if let Some(mask) = mask_of(&record.name) {
            layout.masks.push((mask, slot, record.data_type.clone()));
        }
    }

    layout
}

/// Min/max a record type can hold. Used when the scan declares no limits.
fn data_type_range(data_type: &RecordDataType) -> Option<FieldRange> {
    match data_type {
        RecordDataType::Single { min, max } => {
            Some(FieldRange::new((*min)? as f64, (*max)? as f64))
        }
        RecordDataType::Double { min, max } => Some(FieldRange::new((*min)?, (*max)?)),
        RecordDataType::Integer { min, max } => Some(FieldRange::new(*min as f64, *max as f64)),
        RecordDataType::ScaledInteger { min, max, .. } => Some(FieldRange::new(
            RecordValue::ScaledInteger(*min).to_f64(data_type).ok()?,
            RecordValue::ScaledInteger(*max).to_f64(data_type).ok()?,
        )),
    }
}

fn limit_value(value: &Option<RecordValue>, data_type: &RecordDataType) -> Option<f64> {
    match value.as_ref()? {
        RecordValue::Single(v) => Some(*v as f64),
        RecordValue::Double(v) => Some(*v),
        RecordValue::Integer(v) => Some(*v as f64),
        scaled @ RecordValue::ScaledInteger(_) => scaled.to_f64(data_type).ok(),
    }
}

fn pair(min: Option<f64>, max: Option<f64>) -> Option<FieldRange> {
    Some(FieldRange::new(min?, max?))
}

fn declared_range(pc: &e57::PointCloud, field: Field, data_type: &RecordDataType) -> Option<FieldRange> {
    match field {
        Field::Range | Field::Azimuth | Field::Elevation => {
            let bounds = pc.spherical_bounds.as_ref()?;
            match field {
                Field::Range => pair(bounds.range_min, bounds.range_max),
                Field::Azimuth => pair(bounds.azimuth_start, bounds.azimuth_end),
                _ => pair(bounds.elevation_min, bounds.elevation_max),
            }
        }
        Field::X | Field::Y | Field::Z => {
            let bounds = pc.cartesian_bounds.as_ref()?;
            match field {
                Field::X => pair(bounds.x_min, bounds.x_max),
                Field::Y => pair(bounds.y_min, bounds.y_max),
                _ => pair(bounds.z_min, bounds.z_max),
            }
        }
        Field::Intensity => {
            let limits = pc.intensity_limits.as_ref()?;
            pair(
                limit_value(&limits.intensity_min, data_type),
                limit_value(&limits.intensity_max, data_type),
            )
        }
        Field::Red | Field::Green | Field::Blue => {
            let limits = pc.color_limits.as_ref()?;
            let (min, max) = match field {
                Field::Red => (&limits.red_min, &limits.red_max),
                Field::Green => (&limits.green_min, &limits.green_max),
                _ => (&limits.blue_min, &limits.blue_max),
            };
            pair(limit_value(min, data_type), limit_value(max, data_type))
        }
    }
}

fn read_metadata(index: usize, pc: &e57::PointCloud) -> ScanMetadata {
    let pose = pc
        .transform
        .as_ref()
        .map(|transform| ScanPose {
            position: Vector3::new(
                transform.translation.x,
                transform.translation.y,
                transform.translation.z,
            ),
            rotation: Quaternion::new(
                transform.rotation.w,
                transform.rotation.x,
                transform.rotation.y,
                transform.rotation.z,
            ),
        })
        .unwrap_or_default();

    let (row_count, column_count) = pc
        .index_bounds
        .as_ref()
        .map(|bounds| {
            let span = |min: Option<i64>, max: Option<i64>| match (min, max) {
                (Some(min), Some(max)) if max >= min => (max - min + 1) as u64,
                _ => 0,
            };
            (
                span(bounds.row_min, bounds.row_max),
                span(bounds.column_min, bounds.column_max),
            )
        })
        .unwrap_or((0, 0));

    let mut scan = ScanMetadata {
        index,
        name: pc.name.clone().unwrap_or_default(),
        pose,
        row_count,
        column_count,
        point_count: pc.records,
        ..Default::default()
    };

    for record in &pc.prototype {
        if let Some(field) = field_of(&record.name) {
            let range = declared_range(pc, field, &record.data_type)
                .or_else(|| data_type_range(&record.data_type))
                .unwrap_or_default();
            scan.fields.insert(field, range);
        } else if let Some(mask) = mask_of(&record.name) {
            scan.validity.insert(mask);
        }
    }

    scan
}
