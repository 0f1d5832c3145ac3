use std::time::Instant;

use scan_core::pointcloud::scan::ScanMetadata;
use scan_exporter::sink::{create_sink, PointSink};
use scan_parser::{
    decoder::decode_scan,
    reader::{source_provider, ScanSource},
};
use scan_transformer::{
    builder::PointTransformBuilder,
    runner::{PointTransformer, Transformer},
    TransformBuilder,
};

use crate::{
    config::{ConfigError, RunConfig},
    error::AppError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scans: usize,
    pub skipped_scans: usize,
    pub streamed: u64,
    pub emitted: u64,
}

/// One conversion run over a multi-scan source.
pub struct Cloud {
    config: RunConfig,
}

impl Cloud {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn open_source(&self) -> Result<Box<dyn ScanSource>, AppError> {
        let provider = source_provider(&self.config.input)?;
        Ok(provider.open_source()?)
    }

    pub fn scans(&self, source: &dyn ScanSource) -> Result<Vec<ScanMetadata>, AppError> {
        (0..source.scan_count())
            .map(|index| Ok(source.scan_metadata(index)?))
            .collect()
    }

    pub fn list_scans(&self, source: &dyn ScanSource, json: bool) -> Result<(), AppError> {
        let scans = self.scans(source)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&scans)?);
            return Ok(());
        }

        log::info!("Scan count: {}", scans.len());
        for scan in &scans {
            let (rows, columns) = scan.grid_shape();
            log::info!(
                "Scan[{}] {:?}: {} points, {} rows x {} columns",
                scan.index,
                scan.name,
                scan.point_count,
                rows,
                columns
            );
            log::info!(
                "    position {:?}, rotation {:?}",
                scan.pose.position,
                scan.pose.rotation
            );
            for (field, range) in &scan.fields {
                log::info!("    {} : {} / {}", field, range.min, range.max);
            }
            if !scan.validity.is_empty() {
                log::info!("    validity masks: {:?}", scan.validity);
            }
        }
        Ok(())
    }

    /// Opens the configured output and converts every selected scan into it.
    pub fn convert(&self, source: &mut dyn ScanSource) -> Result<RunSummary, AppError> {
        let (path, output) = self
            .config
            .output
            .as_ref()
            .ok_or(ConfigError::MissingOutput)?;
        let selected: Vec<ScanMetadata> = self
            .scans(source)?
            .into_iter()
            .filter(|scan| self.config.is_scan_selected(&scan.name))
            .collect();
        let sink = create_sink(path, *output, self.config.sink_settings(), &selected)?;
        self.convert_into(source, sink)
    }

    pub fn convert_into(
        &self,
        source: &mut dyn ScanSource,
        mut sink: Box<dyn PointSink>,
    ) -> Result<RunSummary, AppError> {
        let config = &self.config;
        let world_positions = config.apply_scan_pose
            && config
                .output
                .as_ref()
                .is_some_and(|(_, output)| output.needs_world_positions());
        let fields = config.components.required_fields();
        let mut summary = RunSummary::default();

        for index in 0..source.scan_count() {
            let scan = source.scan_metadata(index)?;
            if !config.is_scan_selected(&scan.name) {
                log::info!("Skipping scan[{}] {:?}", index, scan.name);
                summary.skipped_scans += 1;
                continue;
            }

            let start = Instant::now();
            let mut builder = PointTransformBuilder::new(&config.transform);
            if world_positions {
                builder = builder.with_pose(scan.pose);
            }
            let transformer = PointTransformer::new(builder.build());

            sink.begin_scan(&scan)?;
            let scan_summary = decode_scan::<AppError, _>(
                source,
                &scan,
                &fields,
                config.chunk_capacity,
                config.stride,
                |point| {
                    sink.add_point(&transformer.execute(point))?;
                    Ok(())
                },
            )?;
            sink.end_scan()?;

            log::info!(
                "Scan[{}] {:?}: {} of {} points written ({} invalid) in {:?}",
                index,
                scan.name,
                scan_summary.emitted,
                scan_summary.streamed,
                scan_summary.invalid,
                start.elapsed()
            );
            summary.scans += 1;
            summary.streamed += scan_summary.streamed;
            summary.emitted += scan_summary.emitted;
        }

        let written = sink.finish()?;
        debug_assert_eq!(written, summary.emitted);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use scan_core::pointcloud::scan::{Field, FieldRange, ValidityMask};
    use scan_exporter::{component::EncodedValue, pcf::read_pcf, ComponentError, ExportError};
    use scan_parser::reader::memory::{MemoryScan, MemorySource};

    use super::*;
    use crate::config::Profile;

    fn source() -> MemorySource {
        let north = MemoryScan::new("north")
            .with_field(Field::X, vec![1.0, 1.1, 5.0, 7.0, 9.0])
            .with_field(Field::Y, vec![2.0, 2.1, 5.0, 7.0, 9.0])
            .with_field(Field::Z, vec![3.0, 3.0, 5.0, 7.0, 9.0])
            .with_range(
                Field::Intensity,
                vec![0.5, 0.6, 0.1, 0.2, 0.3],
                FieldRange::new(0.0, 1.0),
            )
            .with_validity(ValidityMask::Cartesian, vec![0, 0, 0, 1, 0]);
        let south = MemoryScan::new("south")
            .with_field(Field::X, vec![0.0, 1.0, 2.0])
            .with_field(Field::Y, vec![0.0, 0.0, 0.0])
            .with_field(Field::Z, vec![0.0, 0.0, 0.0]);
        MemorySource::new(vec![north, south])
    }

    fn config(output: PathBuf, components: &str) -> RunConfig {
        let mut config = RunConfig::new(PathBuf::from("memory.e57"), Profile::Classic).unwrap();
        config.set_output(output).unwrap();
        config.set_components(components).unwrap();
        config
    }

    #[test]
    fn pts_count_matches_lines_after_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pts");
        let mut config = config(path.clone(), "XYZ");
        config.set_stride(2).unwrap();
        config.ignored_scans = vec!["south".to_string()];

        let summary = Cloud::new(config).convert(&mut source()).unwrap();
        assert_eq!(summary.scans, 1);
        assert_eq!(summary.skipped_scans, 1);
        assert_eq!(summary.streamed, 5);

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let count: u64 = lines.next().unwrap().parse().unwrap();
        let rest: Vec<&str> = lines.collect();
        // Points 0, 2 and 4 are selected; point 3 is invalid but still counted.
        assert_eq!(count, 3);
        assert_eq!(rest, vec!["1 2 3", "5 5 5", "9 9 9"]);
        assert_eq!(summary.emitted, count);
    }

    #[test]
    fn pcf_merges_points_per_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcf");
        let mut config = config(path.clone(), "XYZi");
        config.set_position_encoding(16, 0.5).unwrap();
        config.selected_scans = vec!["north".to_string()];

        Cloud::new(config).convert(&mut source()).unwrap();

        let cloud = read_pcf(&mut fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(cloud.axis_format, "XYZ");
        assert_eq!(cloud.scans.len(), 1);
        let scan = &cloud.scans[0];
        assert_eq!(scan.name, "north");
        assert_eq!(scan.cells.len(), 3);
        assert_eq!(
            (scan.cells[0].key.x, scan.cells[0].key.y, scan.cells[0].key.z),
            (2, 4, 6)
        );
        assert_eq!(scan.cells[0].point_count, 2);
        assert_eq!(scan.cells[0].values[3], EncodedValue::Code(140));
    }

    #[test]
    fn overflowing_scan_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcf");
        fs::write(&path, "previous").unwrap();
        let mut config = config(path.clone(), "XYZ");
        config.set_position_encoding(8, 0.001).unwrap();

        let result = Cloud::new(config).convert(&mut source());
        assert!(matches!(
            result,
            Err(AppError::Export(ExportError::Component(
                ComponentError::RangeOverflow { .. }
            )))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
    }

    #[test]
    fn ptx_header_matches_decimated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ptx");
        let mut config = config(path.clone(), "XYZ");
        config.set_stride(2).unwrap();
        config.selected_scans = vec!["grid".to_string()];

        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let grid = MemoryScan::new("grid")
            .with_field(Field::X, values.clone())
            .with_field(Field::Y, values.clone())
            .with_field(Field::Z, values)
            .with_grid(3, 4);
        let mut source = MemorySource::new(vec![grid]);

        let summary = Cloud::new(config).convert(&mut source).unwrap();
        assert_eq!(summary.emitted, 6);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let columns: usize = lines[0].parse().unwrap();
        let rows: usize = lines[1].parse().unwrap();
        assert_eq!(columns * rows, lines.len() - 10);
        assert_eq!((columns, rows), (6, 1));
    }

    #[test]
    fn swap_applies_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.xyz");
        let mut config = config(path.clone(), "XYZ");
        config.transform.swap_xy = true;
        config.selected_scans = vec!["south".to_string()];

        Cloud::new(config).convert(&mut source()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0 0 0\n0 1 0\n0 2 0\n");
    }
}
