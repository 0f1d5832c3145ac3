pub mod decoder;
pub mod error;
pub mod reader;

pub use error::ReaderError;
