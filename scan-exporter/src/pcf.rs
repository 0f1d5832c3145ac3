//! PCF cloud files.
//!
//! Everything is little-endian:
//!
//! ```text
//! magic "PCF\0" | version u16 | axis format [u8; 3] | scan count u32
//! per scan:
//!   name (u32 length + UTF-8) | point count u64 | column count u64 | row count u64
//!   position 3 x f64 | rotation 4 x f64 (w, x, y, z)
//!   component count u32
//!   per component: name u8 | compression u8 | bit count u16 | precision, offset, minimum, maximum f64
//!   cell count u64
//!   per cell: key 3 x i64 | point count u64 | one value per component
//! ```
//!
//! The scan point count is the number of points written into the scan's cells.
//!
//! Uncompressed values are `f32`. A discretized code is stored as its unsigned distance
//! from the descriptor's lowest code, in `ceil(bit count / 8)` bytes.

use std::io::{self, BufWriter, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use scan_core::{
    math::{Quaternion, Vector3},
    pointcloud::{
        point::Point,
        scan::{Field, ScanMetadata, ScanPose},
    },
};

use crate::{
    cell::{CellGrid, CellKey, EncodedCell, FinalizedGrid, KeyQuantizer},
    component::{ComponentDescriptor, Compression, EncodedValue, OutputComponent},
    error::ExportError,
    sink::{PointSink, SinkSettings},
};

pub const MAGIC: [u8; 4] = *b"PCF\0";
pub const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct PcfScan {
    pub name: String,
    pub point_count: u64,
    pub column_count: u64,
    pub row_count: u64,
    pub pose: ScanPose,
    pub components: Vec<ComponentDescriptor>,
    pub cells: Vec<EncodedCell>,
}

impl PcfScan {
    pub fn new(scan: &ScanMetadata, grid: FinalizedGrid) -> Self {
        let (row_count, column_count) = scan.grid_shape();
        Self {
            name: scan.name.clone(),
            point_count: grid.point_count(),
            column_count,
            row_count,
            pose: scan.pose,
            components: grid.components,
            cells: grid.cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcfCloud {
    pub axis_format: String,
    pub scans: Vec<PcfScan>,
}

impl PcfCloud {
    /// Scan headers and component tables, without the cells.
    pub fn describe(&self) -> serde_json::Value {
        let scans: Vec<serde_json::Value> = self
            .scans
            .iter()
            .map(|scan| {
                serde_json::json!({
                    "name": scan.name,
                    "point_count": scan.point_count,
                    "column_count": scan.column_count,
                    "row_count": scan.row_count,
                    "pose": scan.pose,
                    "components": scan.components,
                    "cell_count": scan.cells.len(),
                })
            })
            .collect();
        serde_json::json!({
            "axis_format": self.axis_format,
            "scans": scans,
        })
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

pub fn write_pcf<W: Write>(writer: &mut W, cloud: &PcfCloud) -> io::Result<()> {
    let axis_format = cloud.axis_format.as_bytes();
    if axis_format.len() != 3 {
        return Err(invalid_data(format!(
            "axis format must be 3 bytes, got {:?}",
            cloud.axis_format
        )));
    }

    writer.write_all(&MAGIC)?;
    writer.write_u16::<LittleEndian>(VERSION)?;
    writer.write_all(axis_format)?;
    writer.write_u32::<LittleEndian>(cloud.scans.len() as u32)?;

    for scan in &cloud.scans {
        write_scan(writer, scan)?;
    }
    Ok(())
}

fn write_scan<W: Write>(writer: &mut W, scan: &PcfScan) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(scan.name.len() as u32)?;
    writer.write_all(scan.name.as_bytes())?;
    writer.write_u64::<LittleEndian>(scan.point_count)?;
    writer.write_u64::<LittleEndian>(scan.column_count)?;
    writer.write_u64::<LittleEndian>(scan.row_count)?;

    let position = scan.pose.position;
    let rotation = scan.pose.rotation;
    for value in [position.x, position.y, position.z] {
        writer.write_f64::<LittleEndian>(value)?;
    }
    for value in [rotation.w, rotation.x, rotation.y, rotation.z] {
        writer.write_f64::<LittleEndian>(value)?;
    }

    writer.write_u32::<LittleEndian>(scan.components.len() as u32)?;
    for component in &scan.components {
        writer.write_u8(component.name.letter() as u8)?;
        writer.write_u8(match component.compression {
            Compression::Uncompressed => 0,
            Compression::Discretized => 1,
        })?;
        writer.write_u16::<LittleEndian>(component.bit_count)?;
        for value in [
            component.precision,
            component.offset,
            component.minimum,
            component.maximum,
        ] {
            writer.write_f64::<LittleEndian>(value)?;
        }
    }

    writer.write_u64::<LittleEndian>(scan.cells.len() as u64)?;
    for cell in &scan.cells {
        writer.write_i64::<LittleEndian>(cell.key.x)?;
        writer.write_i64::<LittleEndian>(cell.key.y)?;
        writer.write_i64::<LittleEndian>(cell.key.z)?;
        writer.write_u64::<LittleEndian>(cell.point_count)?;
        for (component, value) in scan.components.iter().zip(&cell.values) {
            write_value(writer, component, *value)?;
        }
    }
    Ok(())
}

fn write_value<W: Write>(
    writer: &mut W,
    component: &ComponentDescriptor,
    value: EncodedValue,
) -> io::Result<()> {
    match value {
        EncodedValue::Float(value) => writer.write_f32::<LittleEndian>(value),
        EncodedValue::Code(code) => {
            writer.write_uint::<LittleEndian>(component.stored_code(code), component.byte_count())
        }
    }
}

pub fn read_pcf<R: Read>(reader: &mut R) -> io::Result<PcfCloud> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(invalid_data("not a PCF file"));
    }
    let version = reader.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(invalid_data(format!("unsupported PCF version {version}")));
    }

    let mut axis_format = [0u8; 3];
    reader.read_exact(&mut axis_format)?;
    let axis_format =
        String::from_utf8(axis_format.to_vec()).map_err(|e| invalid_data(e.to_string()))?;

    let scan_count = reader.read_u32::<LittleEndian>()?;
    let scans = (0..scan_count)
        .map(|_| read_scan(reader))
        .collect::<io::Result<Vec<_>>>()?;

    Ok(PcfCloud { axis_format, scans })
}

fn read_scan<R: Read>(reader: &mut R) -> io::Result<PcfScan> {
    let name_len = reader.read_u32::<LittleEndian>()? as usize;
    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name)?;
    let name = String::from_utf8(name).map_err(|e| invalid_data(e.to_string()))?;

    let point_count = reader.read_u64::<LittleEndian>()?;
    let column_count = reader.read_u64::<LittleEndian>()?;
    let row_count = reader.read_u64::<LittleEndian>()?;

    let mut pose = [0.0; 7];
    reader.read_f64_into::<LittleEndian>(&mut pose)?;
    let pose = ScanPose {
        position: Vector3::new(pose[0], pose[1], pose[2]),
        rotation: Quaternion::new(pose[3], pose[4], pose[5], pose[6]),
    };

    let component_count = reader.read_u32::<LittleEndian>()?;
    let mut components = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        let letter = reader.read_u8()? as char;
        let name = Field::from_letter(letter)
            .ok_or_else(|| invalid_data(format!("unknown component {letter:?}")))?;
        let compression = match reader.read_u8()? {
            0 => Compression::Uncompressed,
            1 => Compression::Discretized,
            other => return Err(invalid_data(format!("unknown compression {other}"))),
        };
        let bit_count = reader.read_u16::<LittleEndian>()?;
        let mut values = [0.0; 4];
        reader.read_f64_into::<LittleEndian>(&mut values)?;
        components.push(ComponentDescriptor {
            name,
            compression,
            bit_count,
            precision: values[0],
            offset: values[1],
            minimum: values[2],
            maximum: values[3],
        });
    }

    let cell_count = reader.read_u64::<LittleEndian>()?;
    let mut cells = Vec::new();
    for _ in 0..cell_count {
        let key = CellKey::new(
            reader.read_i64::<LittleEndian>()?,
            reader.read_i64::<LittleEndian>()?,
            reader.read_i64::<LittleEndian>()?,
        );
        let point_count = reader.read_u64::<LittleEndian>()?;
        let values = components
            .iter()
            .map(|component| read_value(reader, component))
            .collect::<io::Result<Vec<_>>>()?;
        cells.push(EncodedCell {
            key,
            point_count,
            values,
        });
    }

    Ok(PcfScan {
        name,
        point_count,
        column_count,
        row_count,
        pose,
        components,
        cells,
    })
}

fn read_value<R: Read>(reader: &mut R, component: &ComponentDescriptor) -> io::Result<EncodedValue> {
    match component.compression {
        Compression::Uncompressed => Ok(EncodedValue::Float(reader.read_f32::<LittleEndian>()?)),
        Compression::Discretized => {
            let stored = reader.read_uint::<LittleEndian>(component.byte_count())?;
            Ok(EncodedValue::Code(component.code_from_stored(stored)))
        }
    }
}

struct ActiveScan {
    metadata: ScanMetadata,
    grid: CellGrid,
}

/// Buckets every scan into its own cell grid and writes the cloud on `finish`.
pub struct PcfSink<W: Write> {
    writer: W,
    settings: SinkSettings,
    axes: [OutputComponent; 3],
    current: Option<ActiveScan>,
    scans: Vec<PcfScan>,
    emitted: u64,
}

impl<W: Write> PcfSink<W> {
    pub fn new(writer: W, settings: SinkSettings) -> Self {
        let axes = settings.format.axis_components();
        Self {
            writer,
            settings,
            axes,
            current: None,
            scans: Vec::new(),
            emitted: 0,
        }
    }

    fn quantizer(&self) -> KeyQuantizer {
        match self.settings.position.compression {
            Compression::Discretized => KeyQuantizer::Precision(self.settings.position.precision),
            Compression::Uncompressed => KeyQuantizer::Exact,
        }
    }

    /// Serializes the collected scans and returns the destination.
    pub fn finish_into(mut self) -> Result<(W, PcfCloud), ExportError> {
        self.end_scan()?;
        let cloud = PcfCloud {
            axis_format: self.settings.axis_format.clone(),
            scans: self.scans,
        };

        log::debug!("{}", cloud.describe());

        let mut writer = BufWriter::new(self.writer);
        write_pcf(&mut writer, &cloud)?;
        let writer = writer.into_inner().map_err(|e| e.into_error())?;
        Ok((writer, cloud))
    }
}

impl<W: Write> PointSink for PcfSink<W> {
    fn begin_scan(&mut self, scan: &ScanMetadata) -> Result<(), ExportError> {
        self.end_scan()?;
        let descriptors = self
            .settings
            .format
            .descriptors(scan, &self.settings.position)?;
        for descriptor in &descriptors {
            log::debug!(
                "Scan {:?} component {:?} codes {:?} signed {}",
                scan.name,
                descriptor,
                descriptor.code_range(),
                descriptor.is_signed()
            );
        }
        self.current = Some(ActiveScan {
            metadata: scan.clone(),
            grid: CellGrid::new(descriptors, self.quantizer()),
        });
        Ok(())
    }

    fn add_point(&mut self, point: &Point) -> Result<(), ExportError> {
        let active = self.current.as_mut().ok_or(ExportError::NoActiveScan)?;
        let [x, y, z] = self.axes.map(|axis| axis.value(point));
        active
            .grid
            .add_point([x, y, z], &self.settings.format.values(point));
        self.emitted += 1;
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), ExportError> {
        if let Some(active) = self.current.take() {
            log::info!(
                "Scan {:?}: {} cells",
                active.metadata.name,
                active.grid.len()
            );
            self.scans
                .push(PcfScan::new(&active.metadata, active.grid.finalize()));
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64, ExportError> {
        let emitted = self.emitted;
        let (mut writer, _) = self.finish_into()?;
        writer.flush()?;
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::cell::{CellGrid, KeyQuantizer};

    fn cloud() -> PcfCloud {
        let components = vec![
            ComponentDescriptor::discretized(Field::X, 12, 0.5, 0.0, -100.0, 100.0).unwrap(),
            ComponentDescriptor::discretized(Field::Intensity, 12, 1.0, -2048.0, -2048.0, 2047.0)
                .unwrap(),
            ComponentDescriptor::uncompressed(Field::Range),
        ];
        let mut grid = CellGrid::new(components, KeyQuantizer::Precision(0.5));
        grid.add_point([-40.2, 1.0, 2.0], &[-40.2, 2047.0, 12.5]);
        grid.add_point([3.0, 1.0, 2.0], &[3.0, -2048.0, 0.25]);

        let scan = ScanMetadata {
            name: "station 1".to_string(),
            point_count: 2,
            ..Default::default()
        };
        PcfCloud {
            axis_format: "XYZ".to_string(),
            scans: vec![PcfScan::new(&scan, grid.finalize())],
        }
    }

    #[test]
    fn written_cloud_reads_back() {
        let cloud = cloud();
        let mut bytes = Vec::new();
        write_pcf(&mut bytes, &cloud).unwrap();
        assert_eq!(&bytes[..4], b"PCF\0");

        let read = read_pcf(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read, cloud);
        assert_eq!(read.scans[0].row_count, 1);
        assert_eq!(read.scans[0].column_count, 2);
        assert_eq!(read.scans[0].cells[0].values[0], EncodedValue::Code(-80));
        assert_eq!(read.scans[0].cells[1].values[1], EncodedValue::Code(0));
    }

    #[test]
    fn ranges_away_from_zero_read_back() {
        let components = vec![
            ComponentDescriptor::discretized(Field::X, 16, 0.001, 0.0, 10.0, 70.0).unwrap(),
            ComponentDescriptor::discretized(Field::Y, 8, 1.0, 0.0, -10.0, 200.0).unwrap(),
        ];
        let mut grid = CellGrid::new(components, KeyQuantizer::Precision(0.001));
        grid.add_point([70.0, 200.0, 0.0], &[70.0, 200.0]);
        grid.add_point([10.0, -10.0, 0.0], &[10.0, -10.0]);

        let scan = ScanMetadata {
            name: "far".to_string(),
            ..Default::default()
        };
        let cloud = PcfCloud {
            axis_format: "XYZ".to_string(),
            scans: vec![PcfScan::new(&scan, grid.finalize())],
        };
        let mut bytes = Vec::new();
        write_pcf(&mut bytes, &cloud).unwrap();

        let read = read_pcf(&mut Cursor::new(bytes)).unwrap();
        let cells = &read.scans[0].cells;
        assert_eq!(read.scans[0].point_count, 2);
        assert_eq!(cells[0].values, vec![EncodedValue::Code(70000), EncodedValue::Code(200)]);
        assert_eq!(cells[1].values, vec![EncodedValue::Code(10000), EncodedValue::Code(-10)]);
    }

    #[test]
    fn description_skips_cells() {
        let description = cloud().describe();
        let scan = &description["scans"][0];
        assert_eq!(description["axis_format"], "XYZ");
        assert_eq!(scan["name"], "station 1");
        assert_eq!(scan["cell_count"], 2);
        assert_eq!(scan["components"][1]["bit_count"], 12);
        assert!(scan.get("cells").is_none());
    }

    #[test]
    fn rejects_foreign_files() {
        let error = read_pcf(&mut Cursor::new(b"PLY\0".to_vec())).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }
}
