use scan_exporter::ExportError;
use scan_parser::ReaderError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot read point cloud: {0}")]
    Reader(#[from] ReaderError),
    #[error("cannot write point cloud: {0}")]
    Export(#[from] ExportError),
    #[error("cannot serialize scan list: {0}")]
    Json(#[from] serde_json::Error),
}
