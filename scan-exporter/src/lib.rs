pub mod cell;
pub mod component;
pub mod error;
pub mod pcf;
pub mod sink;
pub mod text;

pub use error::{ComponentError, ExportError};
