use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open point cloud file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: e57::Error,
    },
    #[error("failed to read points of scan {scan}")]
    Decode {
        scan: usize,
        #[source]
        source: e57::Error,
    },
    #[error("scan index {index} is out of range ({count} scans)")]
    ScanIndex { index: usize, count: usize },
    #[error("unsupported input extension: {0:?}")]
    UnsupportedExtension(String),
}
