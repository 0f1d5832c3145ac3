use std::path::PathBuf;

use scan_core::pointcloud::scan::Field;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ComponentError {
    #[error("component format is empty")]
    EmptyFormat,
    #[error("unknown component letter {0:?}")]
    UnknownLetter(char),
    #[error("bit count {0} is not supported for discretized components")]
    InvalidBitCount(u16),
    #[error("precision must be positive, got {0}")]
    InvalidPrecision(f64),
    #[error("component {name} has an invalid range [{minimum}, {maximum}]")]
    InvalidRange {
        name: Field,
        minimum: f64,
        maximum: f64,
    },
    #[error("component {name} needs {codes} codes but {bit_count} bits hold only {capacity}")]
    RangeOverflow {
        name: Field,
        codes: u128,
        bit_count: u16,
        capacity: u128,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported output extension: {0:?}")]
    UnsupportedExtension(String),
    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Component(#[from] ComponentError),
    #[error("point added outside of a scan")]
    NoActiveScan,
}
