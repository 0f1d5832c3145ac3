use std::{
    fs::File,
    path::{Path, PathBuf},
};

use scan_core::pointcloud::{point::Point, scan::ScanMetadata};
use serde::{Deserialize, Serialize};

use crate::{
    component::{ComponentFormat, PositionEncoding},
    error::ExportError,
    pcf::PcfSink,
    text::{PtsSink, PtxSink, XyzSink},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Xyz,
    Pts,
    Ptx,
    Pcf,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "xyz" => Ok(OutputFormat::Xyz),
            "pts" => Ok(OutputFormat::Pts),
            "ptx" => Ok(OutputFormat::Ptx),
            "pcf" => Ok(OutputFormat::Pcf),
            _ => Err(ExportError::UnsupportedExtension(extension)),
        }
    }

    /// Formats without a per-scan pose record.
    pub fn needs_world_positions(&self) -> bool {
        matches!(self, OutputFormat::Xyz | OutputFormat::Pts)
    }
}

/// Receives the emitted points of a run, scan by scan.
pub trait PointSink {
    fn begin_scan(&mut self, scan: &ScanMetadata) -> Result<(), ExportError>;

    fn add_point(&mut self, point: &Point) -> Result<(), ExportError>;

    fn end_scan(&mut self) -> Result<(), ExportError>;

    /// Flushes everything and returns the number of points written.
    fn finish(self: Box<Self>) -> Result<u64, ExportError>;
}

#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub format: ComponentFormat,
    pub position: PositionEncoding,
    pub axis_format: String,
}

impl SinkSettings {
    /// Checks that every scan can be encoded in `output`.
    pub fn validate(&self, output: OutputFormat, scans: &[ScanMetadata]) -> Result<(), ExportError> {
        if output == OutputFormat::Pcf {
            for scan in scans {
                self.format.descriptors(scan, &self.position)?;
            }
        }
        Ok(())
    }
}

/// Creates the output file for `scans`. Nothing is written when a scan cannot be encoded.
pub fn create_sink(
    path: &Path,
    output: OutputFormat,
    settings: SinkSettings,
    scans: &[ScanMetadata],
) -> Result<Box<dyn PointSink>, ExportError> {
    settings.validate(output, scans)?;
    let file = File::create(path).map_err(|source| ExportError::Write {
        path: PathBuf::from(path),
        source,
    })?;
    log::info!("Writing {:?} as {:?}", path, output);

    let sink: Box<dyn PointSink> = match output {
        OutputFormat::Xyz => Box::new(XyzSink::new(file, settings.format)),
        OutputFormat::Pts => Box::new(PtsSink::new(file, settings.format)?),
        OutputFormat::Ptx => Box::new(PtxSink::new(file, settings.format)?),
        OutputFormat::Pcf => Box::new(PcfSink::new(file, settings)),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use scan_core::{
        math::{Vector3, Vector4},
        pointcloud::scan::{Field, FieldRange},
    };

    use super::*;
    use crate::{component::EncodedValue, error::ComponentError, pcf::read_pcf};

    #[test]
    fn format_from_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out/cloud.PTS")).unwrap(),
            OutputFormat::Pts
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("cloud.pcf")).unwrap(),
            OutputFormat::Pcf
        );
        assert!(matches!(
            OutputFormat::from_path(Path::new("cloud.ply")),
            Err(ExportError::UnsupportedExtension(ext)) if ext == "ply"
        ));
    }

    #[test]
    fn pcf_sink_writes_one_grid_per_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcf");
        let settings = SinkSettings {
            format: "XYZi".parse().unwrap(),
            position: PositionEncoding::new(16, 0.5),
            axis_format: "XYZ".to_string(),
        };

        let mut scan = ScanMetadata {
            name: "a".to_string(),
            point_count: 2,
            ..Default::default()
        };
        for field in [Field::X, Field::Y, Field::Z] {
            scan.fields.insert(field, FieldRange::new(-50.0, 50.0));
        }

        let mut sink =
            create_sink(&path, OutputFormat::Pcf, settings, &[scan.clone()]).unwrap();
        sink.begin_scan(&scan).unwrap();
        sink.add_point(&Point::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector4::new(0.0, 0.0, 0.0, 0.5),
        ))
        .unwrap();
        sink.add_point(&Point::new(
            Vector3::new(1.1, 2.1, 3.0),
            Vector4::new(0.0, 0.0, 0.0, 0.6),
        ))
        .unwrap();
        sink.end_scan().unwrap();
        let second = ScanMetadata {
            name: "b".to_string(),
            ..scan.clone()
        };
        sink.begin_scan(&second).unwrap();
        assert_eq!(sink.finish().unwrap(), 2);

        let cloud = read_pcf(&mut BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(cloud.scans.len(), 2);
        let cell = &cloud.scans[0].cells[0];
        assert_eq!((cell.key.x, cell.key.y, cell.key.z), (2, 4, 6));
        assert_eq!(cell.point_count, 2);
        assert_eq!(cell.values[3], EncodedValue::Code(140));
        assert!(cloud.scans[1].cells.is_empty());
        assert_eq!(cloud.scans[0].point_count, 2);
        assert_eq!(cloud.scans[1].point_count, 0);
    }

    #[test]
    fn unencodable_scan_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcf");
        std::fs::write(&path, b"previous").unwrap();

        let mut scan = ScanMetadata::default();
        scan.fields.insert(Field::X, FieldRange::new(0.0, 120.0));
        let settings = SinkSettings {
            format: "XYZ".parse().unwrap(),
            position: PositionEncoding::new(16, 0.001),
            axis_format: "XYZ".to_string(),
        };

        let result = create_sink(&path, OutputFormat::Pcf, settings.clone(), &[scan.clone()]);
        assert!(matches!(
            result,
            Err(ExportError::Component(ComponentError::RangeOverflow { name: Field::X, .. }))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");

        // Text outputs carry positions as floats.
        assert!(create_sink(&path, OutputFormat::Xyz, settings, &[scan]).is_ok());
    }
}
