use scan_core::{
    math::{Vector3, Vector4},
    pointcloud::{
        decimation::decimator::{PointDecimator, StrideDecimator},
        point::Point,
        scan::{Field, ScanMetadata},
    },
};

use crate::{
    error::ReaderError,
    reader::{ChunkBuffer, ScanSource},
};

/// Turns one row of a chunk into a [`Point`] using the scan's declared ranges.
pub struct ScanDecoder<'a> {
    scan: &'a ScanMetadata,
}

impl<'a> ScanDecoder<'a> {
    pub fn new(scan: &'a ScanMetadata) -> Self {
        Self { scan }
    }

    fn normalized(&self, buffer: &ChunkBuffer, field: Field, index: usize) -> f64 {
        match (buffer.value(field, index), self.scan.field_range(field)) {
            (Some(value), Some(range)) => range.normalize(value),
            (Some(value), None) => value,
            _ => 0.0,
        }
    }

    pub fn point_at(&self, buffer: &ChunkBuffer, index: usize) -> Point {
        let raw = |field| buffer.value(field, index).unwrap_or(0.0);

        let spherical = Vector3::new(raw(Field::Range), raw(Field::Azimuth), raw(Field::Elevation));
        let position = if self.scan.derives_cartesian() {
            Vector3::from_spherical(spherical.x, spherical.y, spherical.z)
        } else {
            Vector3::new(raw(Field::X), raw(Field::Y), raw(Field::Z))
        };
        let color = Vector4::new(
            self.normalized(buffer, Field::Red, index),
            self.normalized(buffer, Field::Green, index),
            self.normalized(buffer, Field::Blue, index),
            self.normalized(buffer, Field::Intensity, index),
        );

        Point {
            spherical,
            position,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Points read from the source, kept or not.
    pub streamed: u64,
    /// Points handed to the visitor.
    pub emitted: u64,
    /// Points dropped by a validity mask.
    pub invalid: u64,
}

/// Streams one scan, keeping every `stride`-th valid point.
///
/// The decimation counter advances for every streamed point, invalid ones included.
pub fn decode_scan<E, F>(
    source: &mut dyn ScanSource,
    scan: &ScanMetadata,
    fields: &[Field],
    capacity: usize,
    stride: u64,
    mut visit: F,
) -> Result<ScanSummary, E>
where
    E: From<ReaderError>,
    F: FnMut(Point) -> Result<(), E>,
{
    let mut decimator = StrideDecimator::new(stride);
    let mut buffer = ChunkBuffer::with_fields(capacity, scan, fields);
    let decoder = ScanDecoder::new(scan);
    let mut summary = ScanSummary::default();

    let progress_step = (scan.point_count / 10).max(1);
    let mut next_progress = progress_step;

    let mut reader = source.open_reader(scan.index)?;
    loop {
        let count = reader.read_chunk(&mut buffer)?;
        if count == 0 {
            break;
        }

        for index in 0..buffer.len() {
            let selected = decimator.advance();
            if !buffer.is_valid(index) {
                summary.invalid += 1;
                continue;
            }
            if selected {
                visit(decoder.point_at(&buffer, index))?;
                summary.emitted += 1;
            }
        }

        summary.streamed = decimator.seen();
        if summary.streamed >= next_progress {
            log::debug!(
                "Scan {:?}: {}/{} points read",
                scan.name,
                summary.streamed,
                scan.point_count
            );
            next_progress = (summary.streamed / progress_step + 1) * progress_step;
        }
    }

    if summary.streamed != scan.point_count {
        log::warn!(
            "Scan {:?} declares {} points but {} were read",
            scan.name,
            scan.point_count,
            summary.streamed
        );
    }

    Ok(summary)
}
