use std::collections::BTreeMap;

use scan_core::pointcloud::scan::{Field, FieldRange, ScanMetadata, ValidityMask};

use super::{ChunkBuffer, ChunkReader, ScanSource};
use crate::error::ReaderError;

/// A scan held entirely in memory, column by column.
#[derive(Debug, Clone, Default)]
pub struct MemoryScan {
    pub metadata: ScanMetadata,
    columns: BTreeMap<Field, Vec<f64>>,
    invalid: BTreeMap<ValidityMask, Vec<i8>>,
}

impl MemoryScan {
    pub fn new(name: &str) -> Self {
        Self {
            metadata: ScanMetadata {
                name: name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Adds a field column. The declared range is taken from the values.
    pub fn with_field(self, field: Field, values: Vec<f64>) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if values.is_empty() {
            FieldRange::default()
        } else {
            FieldRange::new(min, max)
        };
        self.with_range(field, values, range)
    }

    pub fn with_range(mut self, field: Field, values: Vec<f64>, range: FieldRange) -> Self {
        self.metadata.point_count = self.metadata.point_count.max(values.len() as u64);
        self.metadata.fields.insert(field, range);
        self.columns.insert(field, values);
        self
    }

    pub fn with_validity(mut self, mask: ValidityMask, flags: Vec<i8>) -> Self {
        self.metadata.validity.insert(mask);
        self.invalid.insert(mask, flags);
        self
    }

    /// Overrides the declared point count, which may disagree with the streamed count.
    pub fn with_point_count(mut self, count: u64) -> Self {
        self.metadata.point_count = count;
        self
    }

    pub fn with_grid(mut self, rows: u64, columns: u64) -> Self {
        self.metadata.row_count = rows;
        self.metadata.column_count = columns;
        self
    }

    fn streamed_len(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scans: Vec<MemoryScan>,
}

impl MemorySource {
    pub fn new(scans: Vec<MemoryScan>) -> Self {
        let scans = scans
            .into_iter()
            .enumerate()
            .map(|(index, mut scan)| {
                scan.metadata.index = index;
                scan
            })
            .collect();
        Self { scans }
    }
}

impl ScanSource for MemorySource {
    fn scan_count(&self) -> usize {
        self.scans.len()
    }

    fn scan_metadata(&self, index: usize) -> Result<ScanMetadata, ReaderError> {
        self.scans
            .get(index)
            .map(|scan| scan.metadata.clone())
            .ok_or(ReaderError::ScanIndex {
                index,
                count: self.scans.len(),
            })
    }

    fn open_reader(&mut self, index: usize) -> Result<Box<dyn ChunkReader + '_>, ReaderError> {
        let count = self.scans.len();
        let scan = self
            .scans
            .get(index)
            .ok_or(ReaderError::ScanIndex { index, count })?;
        Ok(Box::new(MemoryChunkReader {
            scan,
            position: 0,
            len: scan.streamed_len(),
        }))
    }
}

struct MemoryChunkReader<'a> {
    scan: &'a MemoryScan,
    position: usize,
    len: usize,
}

impl ChunkReader for MemoryChunkReader<'_> {
    fn read_chunk(&mut self, buffer: &mut ChunkBuffer) -> Result<usize, ReaderError> {
        let count = buffer.capacity().min(self.len - self.position);
        let range = self.position..self.position + count;

        for (field, column) in &self.scan.columns {
            if buffer.has_field(*field) {
                for (slot, index) in range.clone().enumerate() {
                    buffer.values_mut(*field)[slot] = column.get(index).copied().unwrap_or(0.0);
                }
            }
        }
        for (mask, flags) in &self.scan.invalid {
            if buffer.has_validity(*mask) {
                for (slot, index) in range.clone().enumerate() {
                    buffer.invalid_mut(*mask)[slot] = flags.get(index).copied().unwrap_or(0);
                }
            }
        }

        self.position += count;
        buffer.set_len(count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_chunks() {
        let mut source = MemorySource::new(vec![MemoryScan::new("scan")
            .with_field(Field::X, (0..5).map(f64::from).collect())]);
        let metadata = source.scan_metadata(0).unwrap();
        assert_eq!(metadata.point_count, 5);
        assert_eq!(metadata.field_range(Field::X), Some(FieldRange::new(0.0, 4.0)));

        let mut buffer = ChunkBuffer::new(2, &metadata);
        let mut reader = source.open_reader(0).unwrap();
        let mut lens = Vec::new();
        let mut xs = Vec::new();
        loop {
            let n = reader.read_chunk(&mut buffer).unwrap();
            if n == 0 {
                break;
            }
            lens.push(n);
            xs.extend_from_slice(buffer.values(Field::X));
        }
        assert_eq!(lens, vec![2, 2, 1]);
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn out_of_range_scan_is_an_error() {
        let source = MemorySource::new(vec![]);
        assert!(matches!(
            source.scan_metadata(3),
            Err(ReaderError::ScanIndex { index: 3, count: 0 })
        ));
    }
}
