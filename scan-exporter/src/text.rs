use std::{
    fs::File,
    io::{self, BufWriter, Seek, SeekFrom, Write},
};

use scan_core::{
    math::Vector3,
    pointcloud::{
        point::Point,
        scan::{ScanMetadata, ScanPose},
    },
};

use crate::{component::ComponentFormat, error::ExportError, sink::PointSink};

/// Writes one space-separated line. Floats use the shortest representation that reads back exactly.
pub fn write_values<W: Write>(writer: &mut W, values: &[f64]) -> io::Result<()> {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{value}")?;
    }
    writer.write_all(b"\n")
}

fn write_vector<W: Write>(writer: &mut W, vector: &Vector3, last: Option<f64>) -> io::Result<()> {
    match last {
        Some(last) => write_values(writer, &[vector.x, vector.y, vector.z, last]),
        None => write_values(writer, &vector.to_array()),
    }
}

/// One line per point, no header.
pub struct XyzSink<W: Write> {
    writer: BufWriter<W>,
    format: ComponentFormat,
    emitted: u64,
}

impl<W: Write> XyzSink<W> {
    pub fn new(writer: W, format: ComponentFormat) -> Self {
        Self {
            writer: BufWriter::new(writer),
            format,
            emitted: 0,
        }
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> PointSink for XyzSink<W> {
    fn begin_scan(&mut self, _scan: &ScanMetadata) -> Result<(), ExportError> {
        Ok(())
    }

    fn add_point(&mut self, point: &Point) -> Result<(), ExportError> {
        write_values(&mut self.writer, &self.format.values(point))?;
        self.emitted += 1;
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), ExportError> {
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64, ExportError> {
        self.writer.flush()?;
        Ok(self.emitted)
    }
}

/// Point count line followed by the point lines.
///
/// Lines are spooled to an anonymous temporary file until the count is known.
pub struct PtsSink<W: Write> {
    writer: W,
    spool: BufWriter<File>,
    format: ComponentFormat,
    emitted: u64,
}

impl<W: Write> PtsSink<W> {
    pub fn new(writer: W, format: ComponentFormat) -> Result<Self, ExportError> {
        Ok(Self {
            writer,
            spool: BufWriter::new(tempfile::tempfile()?),
            format,
            emitted: 0,
        })
    }

    /// Writes the header and the spooled lines, returning the destination.
    pub fn finish_into(self) -> Result<(W, u64), ExportError> {
        let Self {
            mut writer,
            spool,
            emitted,
            ..
        } = self;

        let mut spool = spool.into_inner().map_err(|e| e.into_error())?;
        spool.seek(SeekFrom::Start(0))?;

        writeln!(writer, "{emitted}")?;
        io::copy(&mut spool, &mut writer)?;
        writer.flush()?;
        Ok((writer, emitted))
    }
}

impl<W: Write> PointSink for PtsSink<W> {
    fn begin_scan(&mut self, _scan: &ScanMetadata) -> Result<(), ExportError> {
        Ok(())
    }

    fn add_point(&mut self, point: &Point) -> Result<(), ExportError> {
        write_values(&mut self.spool, &self.format.values(point))?;
        self.emitted += 1;
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), ExportError> {
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64, ExportError> {
        let (_, emitted) = self.finish_into()?;
        Ok(emitted)
    }
}

struct PtxScan {
    shape: (u64, u64),
    pose: ScanPose,
    emitted: u64,
}

/// Grid shape written in a PTX header. A scan that lost points to decimation or
/// validity no longer fills its declared grid and becomes a single row.
pub fn framed_shape((rows, columns): (u64, u64), emitted: u64) -> (u64, u64) {
    if rows * columns == emitted {
        (rows, columns)
    } else {
        (1, emitted)
    }
}

/// Per scan: grid shape, scanner pose and a 4x4 transform, then the point lines.
///
/// A scan's lines are spooled until the scan ends, so the header frames exactly the
/// lines that follow it.
pub struct PtxSink<W: Write> {
    writer: BufWriter<W>,
    spool: BufWriter<File>,
    format: ComponentFormat,
    current: Option<PtxScan>,
    emitted: u64,
}

impl<W: Write> PtxSink<W> {
    pub fn new(writer: W, format: ComponentFormat) -> Result<Self, ExportError> {
        Ok(Self {
            writer: BufWriter::new(writer),
            spool: BufWriter::new(tempfile::tempfile()?),
            format,
            current: None,
            emitted: 0,
        })
    }

    pub fn into_inner(mut self) -> Result<W, ExportError> {
        self.end_scan()?;
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }

    fn write_header(&mut self, scan: &PtxScan) -> io::Result<()> {
        let (rows, columns) = framed_shape(scan.shape, scan.emitted);
        let position = scan.pose.position;
        let axes = scan.pose.axis_vectors();
        let writer = &mut self.writer;

        writeln!(writer, "{columns}")?;
        writeln!(writer, "{rows}")?;
        write_vector(writer, &position, None)?;
        for axis in &axes {
            write_vector(writer, axis, None)?;
        }
        for axis in &axes {
            write_vector(writer, axis, Some(0.0))?;
        }
        write_vector(writer, &position, Some(1.0))
    }
}

impl<W: Write> PointSink for PtxSink<W> {
    fn begin_scan(&mut self, scan: &ScanMetadata) -> Result<(), ExportError> {
        self.end_scan()?;
        self.current = Some(PtxScan {
            shape: scan.grid_shape(),
            pose: scan.pose,
            emitted: 0,
        });
        Ok(())
    }

    fn add_point(&mut self, point: &Point) -> Result<(), ExportError> {
        let scan = self.current.as_mut().ok_or(ExportError::NoActiveScan)?;
        write_values(&mut self.spool, &self.format.values(point))?;
        scan.emitted += 1;
        self.emitted += 1;
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), ExportError> {
        let Some(scan) = self.current.take() else {
            return Ok(());
        };
        self.write_header(&scan)?;

        self.spool.flush()?;
        let spool = self.spool.get_mut();
        spool.seek(SeekFrom::Start(0))?;
        io::copy(spool, &mut self.writer)?;
        spool.set_len(0)?;
        spool.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64, ExportError> {
        self.end_scan()?;
        self.writer.flush()?;
        Ok(self.emitted)
    }
}
