mod cloud;
mod config;
mod error;

use std::error::Error as _;
use std::io::Write as _;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use scan_core::math::{Vector3, Vector4};

use crate::{
    cloud::Cloud,
    config::{ConfigError, Profile, RunConfig},
    error::AppError,
};

#[derive(Parser, Debug)]
#[command(
    name = "scanconv",
    about = "Converts terrestrial LiDAR scans into XYZ, PTS, PTX and PCF clouds",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file. The extension selects the format: xyz, pts, ptx or pcf.
    #[arg(value_name = "OUTPUT", required_unless_present = "list_scans")]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Profile::Classic)]
    profile: Profile,

    /// Output component letters, e.g. XYZI or xzYRGB.
    #[arg(short, long, value_name = "LETTERS")]
    components: Option<String>,

    #[arg(long, default_value_t = 16)]
    position_bits: u16,

    #[arg(long, default_value_t = 0.001)]
    position_precision: f64,

    #[arg(long, default_value = "XYZ")]
    axis_format: String,

    /// Keep one point out of every N.
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    decimation: u64,

    #[arg(long, default_value_t = scan_parser::reader::DEFAULT_CHUNK_CAPACITY)]
    chunk_size: usize,

    #[arg(long, value_name = "NAME")]
    select_scan: Vec<String>,

    #[arg(long, value_name = "NAME")]
    ignore_scan: Vec<String>,

    #[arg(long)]
    swap_xy: bool,

    #[arg(long)]
    swap_xz: bool,

    #[arg(long)]
    swap_yz: bool,

    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    position_offset: Option<Vec<f64>>,

    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    position_scaling: Option<Vec<f64>>,

    /// Radians, applied around Z, then X, then Y.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    position_rotation: Option<Vec<f64>>,

    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    position_translation: Option<Vec<f64>>,

    #[arg(long, num_args = 4, value_names = ["R", "G", "B", "I"], allow_negative_numbers = true)]
    color_offset: Option<Vec<f64>>,

    #[arg(long, num_args = 4, value_names = ["R", "G", "B", "I"], allow_negative_numbers = true)]
    color_scaling: Option<Vec<f64>>,

    #[arg(long, num_args = 4, value_names = ["R", "G", "B", "I"], allow_negative_numbers = true)]
    color_translation: Option<Vec<f64>>,

    #[arg(long, allow_negative_numbers = true)]
    intensity_offset: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    intensity_scaling: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    intensity_translation: Option<f64>,

    /// Multiply colors by intensity.
    #[arg(long)]
    apply_intensity: bool,

    /// Clamp colors and intensity to [0, 1].
    #[arg(long)]
    clamp_color: bool,

    /// Move XYZ and PTS points into the scan's world frame.
    #[arg(long)]
    scan_pose: bool,

    /// Print the scans of the input and exit.
    #[arg(long)]
    list_scans: bool,

    /// Print the scan list as JSON.
    #[arg(long, requires = "list_scans")]
    json: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn vector3(values: &[f64]) -> Vector3 {
    Vector3::new(values[0], values[1], values[2])
}

fn vector4(values: &[f64]) -> Vector4 {
    Vector4::new(values[0], values[1], values[2], values[3])
}

impl Cli {
    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::new(self.input, self.profile)?;

        if let Some(output) = self.output {
            config.set_output(output)?;
        }
        if let Some(components) = &self.components {
            config.set_components(components)?;
        }
        config.set_position_encoding(self.position_bits, self.position_precision)?;
        config.set_axis_format(&self.axis_format)?;
        config.set_stride(self.decimation)?;
        config.chunk_capacity = self.chunk_size.max(1);
        config.selected_scans = self.select_scan;
        config.ignored_scans = self.ignore_scan;
        config.apply_scan_pose |= self.scan_pose;

        let transform = &mut config.transform;
        transform.swap_xy = self.swap_xy;
        transform.swap_xz = self.swap_xz;
        transform.swap_yz = self.swap_yz;
        if let Some(v) = self.position_offset.as_deref() {
            transform.position_offset = vector3(v);
        }
        if let Some(v) = self.position_scaling.as_deref() {
            transform.position_scaling = vector3(v);
        }
        if let Some(v) = self.position_rotation.as_deref() {
            transform.position_rotation = vector3(v);
        }
        if let Some(v) = self.position_translation.as_deref() {
            transform.position_translation = vector3(v);
        }
        if let Some(v) = self.color_offset.as_deref() {
            transform.color_offset = vector4(v);
        }
        if let Some(v) = self.color_scaling.as_deref() {
            transform.color_scaling = vector4(v);
        }
        if let Some(v) = self.color_translation.as_deref() {
            transform.color_translation = vector4(v);
        }
        if let Some(i) = self.intensity_offset {
            transform.color_offset.w = i;
        }
        if let Some(i) = self.intensity_scaling {
            transform.color_scaling.w = i;
        }
        if let Some(i) = self.intensity_translation {
            transform.color_translation.w = i;
        }
        transform.apply_intensity = self.apply_intensity;
        transform.clamp_color |= self.clamp_color;

        Ok(config)
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let list_scans = cli.list_scans;
    let json = cli.json;
    let config = cli.into_config()?;

    log::info!("input file: {:?}", config.input);
    if let Some((path, format)) = &config.output {
        log::info!("output file: {:?} ({:?})", path, format);
    }
    log::info!("profile: {:?}", config.profile);
    log::info!("components: {}", config.components);
    log::debug!("transform: {:?}", config.transform);

    let cloud = Cloud::new(config);

    let start = std::time::Instant::now();
    let mut source = cloud.open_source()?;
    log::info!("Scan count: {}", source.scan_count());

    if list_scans {
        return cloud.list_scans(source.as_ref(), json);
    }

    let summary = cloud.convert(source.as_mut())?;
    log::info!(
        "{} scans converted ({} skipped), {} of {} points written",
        summary.scans,
        summary.skipped_scans,
        summary.emitted,
        summary.streamed
    );
    log::info!("Elapsed: {:?}", start.elapsed());
    Ok(())
}

fn main() {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .init();

    if let Err(error) = run(args) {
        log::error!("{}", error);
        let mut source = error.source();
        while let Some(cause) = source {
            log::error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_maps_into_config() {
        let cli = Cli::parse_from([
            "scanconv",
            "site.e57",
            "out.pcf",
            "--components",
            "xYZn",
            "--position-bits",
            "20",
            "--position-precision",
            "0.002",
            "--decimation",
            "4",
            "--position-offset",
            "-1",
            "0",
            "2.5",
            "--intensity-scaling",
            "2",
            "--select-scan",
            "north",
            "--select-scan",
            "south",
            "--profile",
            "extended",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.components.to_string(), "xYZn");
        assert_eq!(config.position.bit_count, 20);
        assert_eq!(config.stride, 4);
        assert_eq!(config.transform.position_offset, Vector3::new(-1.0, 0.0, 2.5));
        assert_eq!(config.transform.color_scaling, Vector4::new(1.0, 1.0, 1.0, 2.0));
        assert_eq!(config.selected_scans, vec!["north", "south"]);
        assert!(config.transform.clamp_color);
    }

    #[test]
    fn listing_needs_no_output() {
        let cli = Cli::parse_from(["scanconv", "site.e57", "--list-scans", "--json"]);
        let config = cli.into_config().unwrap();
        assert!(config.output.is_none());

        assert!(Cli::try_parse_from(["scanconv", "site.e57"]).is_err());
    }

    #[test]
    fn invalid_settings_fail_before_io() {
        let cli = Cli::parse_from(["scanconv", "site.e57", "out.xyz", "--decimation", "0"]);
        assert_eq!(cli.into_config().unwrap_err(), ConfigError::Stride);

        let cli = Cli::parse_from(["scanconv", "site.e57", "out.xyz", "--axis-format", "XYX"]);
        assert!(matches!(
            cli.into_config(),
            Err(ConfigError::AxisFormat(_))
        ));
    }
}
