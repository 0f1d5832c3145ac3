use std::path::PathBuf;

use clap::ValueEnum;
use scan_exporter::{
    component::{ComponentFormat, Compression, PositionEncoding},
    sink::{OutputFormat, SinkSettings},
    ComponentError, ExportError,
};
use scan_parser::reader::DEFAULT_CHUNK_CAPACITY;
use scan_transformer::TransformConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Components(#[from] ComponentError),
    #[error("axis format {0:?} must name X, Y and Z once each, using letters from xyzXYZ")]
    AxisFormat(String),
    #[error("point decimation must be at least 1")]
    Stride,
    #[error("position bit count must be between 1 and 64, got {0}")]
    BitCount(u16),
    #[error("position precision must be positive, got {0}")]
    Precision(f64),
    #[error("unsupported output extension: {0:?}")]
    OutputExtension(String),
    #[error("an output file is required unless scans are only listed")]
    MissingOutput,
}

/// Named sets of defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Profile {
    /// Raw scanner-local positions, unclamped colors.
    #[default]
    Classic,
    /// Clamped colors, world positions for formats without a pose header.
    Extended,
}

impl Profile {
    pub fn clamp_color(&self) -> bool {
        matches!(self, Profile::Extended)
    }

    pub fn apply_scan_pose(&self) -> bool {
        matches!(self, Profile::Extended)
    }

    pub fn default_components(&self) -> &'static str {
        match self {
            Profile::Classic => "XYZI",
            Profile::Extended => "XYZIRGB",
        }
    }
}

/// Validated settings of one conversion run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: Option<(PathBuf, OutputFormat)>,
    pub profile: Profile,
    pub components: ComponentFormat,
    pub position: PositionEncoding,
    pub axis_format: String,
    pub transform: TransformConfig,
    pub apply_scan_pose: bool,
    pub stride: u64,
    pub chunk_capacity: usize,
    pub selected_scans: Vec<String>,
    pub ignored_scans: Vec<String>,
}

impl RunConfig {
    pub fn new(input: PathBuf, profile: Profile) -> Result<Self, ConfigError> {
        let transform = TransformConfig {
            clamp_color: profile.clamp_color(),
            ..Default::default()
        };
        Ok(Self {
            input,
            output: None,
            profile,
            components: profile.default_components().parse()?,
            position: PositionEncoding::new(16, 0.001),
            axis_format: "XYZ".to_string(),
            transform,
            apply_scan_pose: profile.apply_scan_pose(),
            stride: 1,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            selected_scans: Vec::new(),
            ignored_scans: Vec::new(),
        })
    }

    pub fn set_output(&mut self, path: PathBuf) -> Result<(), ConfigError> {
        let format = OutputFormat::from_path(&path).map_err(|error| match error {
            ExportError::UnsupportedExtension(ext) => ConfigError::OutputExtension(ext),
            other => ConfigError::OutputExtension(other.to_string()),
        })?;
        self.output = Some((path, format));
        Ok(())
    }

    pub fn set_components(&mut self, letters: &str) -> Result<(), ConfigError> {
        self.components = letters.parse()?;
        Ok(())
    }

    pub fn set_position_encoding(&mut self, bit_count: u16, precision: f64) -> Result<(), ConfigError> {
        if bit_count == 0 || bit_count > 64 {
            return Err(ConfigError::BitCount(bit_count));
        }
        let position = PositionEncoding::new(bit_count, precision);
        if position.compression == Compression::Discretized
            && !(precision.is_finite() && precision > 0.0)
        {
            return Err(ConfigError::Precision(precision));
        }
        self.position = position;
        Ok(())
    }

    pub fn set_axis_format(&mut self, format: &str) -> Result<(), ConfigError> {
        let chars: Vec<char> = format.chars().collect();
        let valid = chars.len() == 3
            && chars.iter().all(|c| "xyzXYZ".contains(*c))
            && ['x', 'y', 'z']
                .iter()
                .all(|axis| chars.iter().filter(|c| c.to_ascii_lowercase() == *axis).count() == 1);
        if !valid {
            return Err(ConfigError::AxisFormat(format.to_string()));
        }
        self.axis_format = format.to_string();
        Ok(())
    }

    pub fn set_stride(&mut self, stride: u64) -> Result<(), ConfigError> {
        if stride < 1 {
            return Err(ConfigError::Stride);
        }
        self.stride = stride;
        Ok(())
    }

    /// Ignore wins over select. An empty selection keeps every scan.
    pub fn is_scan_selected(&self, name: &str) -> bool {
        if self.ignored_scans.iter().any(|ignored| ignored == name) {
            return false;
        }
        self.selected_scans.is_empty() || self.selected_scans.iter().any(|selected| selected == name)
    }

    pub fn sink_settings(&self) -> SinkSettings {
        SinkSettings {
            format: self.components.clone(),
            position: self.position,
            axis_format: self.axis_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new(PathBuf::from("site.e57"), Profile::Classic).unwrap()
    }

    #[test]
    fn profiles_set_defaults() {
        let classic = config();
        assert!(!classic.transform.clamp_color);
        assert!(!classic.apply_scan_pose);
        assert_eq!(classic.components.to_string(), "XYZI");

        let extended = RunConfig::new(PathBuf::from("site.e57"), Profile::Extended).unwrap();
        assert!(extended.transform.clamp_color);
        assert!(extended.apply_scan_pose);
        assert_eq!(extended.components.to_string(), "XYZIRGB");
    }

    #[test]
    fn axis_format_validation() {
        let mut config = config();
        assert!(config.set_axis_format("xZY").is_ok());
        assert_eq!(config.axis_format, "xZY");
        for bad in ["XY", "XXZ", "XYW", "xXZ", "XYZY"] {
            assert_eq!(
                config.set_axis_format(bad),
                Err(ConfigError::AxisFormat(bad.to_string()))
            );
        }
    }

    #[test]
    fn numeric_settings_are_checked() {
        let mut config = config();
        assert_eq!(config.set_stride(0), Err(ConfigError::Stride));
        assert_eq!(config.set_position_encoding(0, 0.1), Err(ConfigError::BitCount(0)));
        assert_eq!(config.set_position_encoding(65, 0.1), Err(ConfigError::BitCount(65)));
        assert_eq!(
            config.set_position_encoding(16, -1.0),
            Err(ConfigError::Precision(-1.0))
        );
        // Float positions do not use the precision.
        assert!(config.set_position_encoding(32, 0.0).is_ok());
        assert_eq!(
            config.set_output(PathBuf::from("out.las")),
            Err(ConfigError::OutputExtension("las".to_string()))
        );
        assert!(matches!(
            config.set_components("XYQ"),
            Err(ConfigError::Components(ComponentError::UnknownLetter('Q')))
        ));
    }

    #[test]
    fn ignore_wins_over_select() {
        let mut config = config();
        assert!(config.is_scan_selected("north"));

        config.selected_scans = vec!["north".to_string(), "south".to_string()];
        config.ignored_scans = vec!["south".to_string()];
        assert!(config.is_scan_selected("north"));
        assert!(!config.is_scan_selected("south"));
        assert!(!config.is_scan_selected("east"));
    }
}
