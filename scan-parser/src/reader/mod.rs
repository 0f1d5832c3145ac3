use std::path::{Path, PathBuf};

use scan_core::pointcloud::scan::{Field, ScanMetadata, ValidityMask};

use crate::error::ReaderError;

pub mod e57;
pub mod memory;

/// Number of points decoded per chunk unless the caller asks otherwise.
pub const DEFAULT_CHUNK_CAPACITY: usize = 65536;

pub trait SourceProvider {
    fn open_source(&self) -> Result<Box<dyn ScanSource>, ReaderError>;
}

/// A multi-scan point cloud file.
pub trait ScanSource {
    fn scan_count(&self) -> usize;

    fn scan_metadata(&self, index: usize) -> Result<ScanMetadata, ReaderError>;

    /// Starts streaming the points of one scan. The stream cannot be restarted.
    fn open_reader(&mut self, index: usize) -> Result<Box<dyn ChunkReader + '_>, ReaderError>;
}

pub trait ChunkReader {
    /// Fills `buffer` with up to `buffer.capacity()` points and returns how many were read.
    /// Zero means the scan is exhausted.
    fn read_chunk(&mut self, buffer: &mut ChunkBuffer) -> Result<usize, ReaderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    E57,
}

pub fn get_extension(path: &Path) -> Result<Extension, ReaderError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "e57" => Ok(Extension::E57),
        _ => Err(ReaderError::UnsupportedExtension(extension)),
    }
}

pub fn source_provider(path: &Path) -> Result<Box<dyn SourceProvider>, ReaderError> {
    match get_extension(path)? {
        Extension::E57 => Ok(Box::new(e57::E57SourceProvider {
            filename: PathBuf::from(path),
        })),
    }
}

/// Reusable storage for one chunk of raw field arrays.
///
/// Arrays are allocated once, at `capacity`, for the fields and validity masks the scan
/// declares. Readers overwrite them on every chunk.
#[derive(Debug, Clone)]
pub struct ChunkBuffer {
    capacity: usize,
    len: usize,
    values: Vec<Vec<f64>>,
    invalid: Vec<Vec<i8>>,
}

impl ChunkBuffer {
    pub fn new(capacity: usize, scan: &ScanMetadata) -> Self {
        Self::with_fields(capacity, scan, &Field::ALL)
    }

    /// Allocates only the requested fields among those the scan declares. A validity mask
    /// is kept only when the scan has one of the fields it guards.
    pub fn with_fields(capacity: usize, scan: &ScanMetadata, fields: &[Field]) -> Self {
        let capacity = capacity.max(1);
        let values = Field::ALL
            .iter()
            .map(|&field| {
                if scan.has_field(field) && fields.contains(&field) {
                    vec![0.0; capacity]
                } else {
                    Vec::new()
                }
            })
            .collect();
        let invalid = ValidityMask::ALL
            .iter()
            .map(|&mask| {
                let guards_present_field = mask
                    .guarded_fields()
                    .iter()
                    .any(|&field| scan.has_field(field));
                if scan.has_validity(mask) && guards_present_field {
                    vec![0; capacity]
                } else {
                    Vec::new()
                }
            })
            .collect();

        Self {
            capacity,
            len: 0,
            values,
            invalid,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity, "chunk length exceeds buffer capacity");
        self.len = len;
    }

    pub fn has_field(&self, field: Field) -> bool {
        !self.values[field.index()].is_empty()
    }

    pub fn has_validity(&self, mask: ValidityMask) -> bool {
        !self.invalid[mask.index()].is_empty()
    }

    pub fn values(&self, field: Field) -> &[f64] {
        let values = &self.values[field.index()];
        &values[..self.len.min(values.len())]
    }

    /// Whole backing array of a field, `capacity` long when the field is present.
    pub fn values_mut(&mut self, field: Field) -> &mut [f64] {
        &mut self.values[field.index()]
    }

    pub fn invalid_mut(&mut self, mask: ValidityMask) -> &mut [i8] {
        &mut self.invalid[mask.index()]
    }

    pub fn value(&self, field: Field, index: usize) -> Option<f64> {
        self.values(field).get(index).copied()
    }

    /// A point is valid when none of the present masks flags it.
    pub fn is_valid(&self, index: usize) -> bool {
        self.invalid
            .iter()
            .all(|flags| flags.is_empty() || flags[index] == 0)
    }
}
