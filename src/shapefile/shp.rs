//! Reads and writes ESRI ".shp" files and their ".shx" indexes, as per
//! https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf

use std::io::{self, Read, Seek, SeekFrom, Write};
use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, ShapefileError};
use crate::geo::Geometry;
use super::buffer::{ByteBuffer, ByteReader};
use super::builder::ShapeBuilder;
use super::header::{
    IndexEntry, RecordHeader, ShpHeader, HEADER_LENGTH, MAX_FILE_LENGTH, RECORD_HEADER_LENGTH, SHX_RECORD_LENGTH,
};
use super::record::ShapeCodec;
use super::shape_type::ShapeType;

fn truncated(file: &str, what: &str, position: u64) -> ShapefileError {
    ShapefileError::Corrupted(format!("'{}' file ends in the middle of {} at byte {}", file, what, position))
}

fn read_exact_or_truncated<R: Read>(
    buf: &mut ByteBuffer,
    r: &mut R,
    n: usize,
    file: &str,
    what: &str,
    position: u64,
) -> Result<()> {
    match buf.fill_from(r, n) {
        Ok(()) => Ok(()),
        Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(truncated(file, what, position)),
        Err(err) => Err(err.into()),
    }
}

/// Reads an ".shx" index into memory.
fn read_index<S: Read>(mut shx: S, shape_type: ShapeType) -> Result<Vec<IndexEntry>> {
    let mut buf = ByteBuffer::new();
    read_exact_or_truncated(&mut buf, &mut shx, HEADER_LENGTH, ".shx", "the header", 0)?;
    let header = ShpHeader::read(buf.as_slice())?;
    if header.shape_type != shape_type {
        return Err(ShapefileError::Corrupted(format!(
            "'.shx' file declares shape type {}, but the '.shp' file declares {}",
            header.shape_type, shape_type
        )));
    }

    let mut rest = vec![];
    shx.read_to_end(&mut rest)?;
    let n = header.file_length.saturating_sub(HEADER_LENGTH) / SHX_RECORD_LENGTH;
    if rest.len() < n * SHX_RECORD_LENGTH {
        return Err(ShapefileError::Corrupted(format!(
            "'.shx' header promises {} entries, but the file holds {}",
            n,
            rest.len() / SHX_RECORD_LENGTH
        )));
    }

    rest.chunks(SHX_RECORD_LENGTH).take(n).map(IndexEntry::read).collect()
}

/// Reads shape records one at a time.
///
/// The lending `read_shape()` decodes into a builder the reader owns and
/// reuses: the returned reference is only good until the next call.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use shpcodec::geo::{Coordinate, Geometry};
/// use shpcodec::shapefile::{ShapeType, ShpReader, ShpWriter};
///
/// let mut shp = Cursor::new(Vec::new());
/// let mut shx = Cursor::new(Vec::new());
/// {
///     let mut writer = ShpWriter::new(&mut shp, &mut shx, ShapeType::Point).unwrap();
///     writer.write(Some(&Geometry::Point(Coordinate::new(1., 2.)))).unwrap();
/// }
///
/// shp.set_position(0);
/// shx.set_position(0);
/// let mut reader = ShpReader::with_index(shp, shx).unwrap();
/// assert_eq!(Some(1), reader.record_count());
/// let shape = reader.read_shape().unwrap().unwrap();
/// assert_eq!(Coordinate::new(1., 2.), shape.points()[0]);
/// ```
#[derive(Debug)]
pub struct ShpReader<R: Read + Seek> {
    file: R,
    header: ShpHeader,
    codec: ShapeCodec,
    index: Option<Vec<IndexEntry>>,
    /// Byte offset of the next record header.
    position: u64,
    n_records_already_read: usize,
    file_length: u64,
    buf: ByteBuffer,
    shape: ShapeBuilder,
}

impl<R: Read + Seek> ShpReader<R> {
    /// Opens a ".shp" stream without an index; `read_at()` is unavailable.
    pub fn new(mut file: R) -> Result<ShpReader<R>> {
        let mut buf = ByteBuffer::new();
        read_exact_or_truncated(&mut buf, &mut file, HEADER_LENGTH, ".shp", "the header", 0)?;
        let header = ShpHeader::read(buf.as_slice())?;
        let file_length = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(HEADER_LENGTH as u64))?;

        tracing::debug!(
            shape_type = %header.shape_type,
            declared_length = header.file_length,
            file_length = file_length,
            "Opened '.shp' file"
        );

        Ok(ShpReader {
            file,
            header,
            codec: ShapeCodec::new(header.shape_type),
            index: None,
            position: HEADER_LENGTH as u64,
            n_records_already_read: 0,
            file_length,
            buf,
            shape: ShapeBuilder::new(),
        })
    }

    /// Opens a ".shp" stream with its ".shx" index.
    pub fn with_index<S: Read>(file: R, shx: S) -> Result<ShpReader<R>> {
        let mut reader = ShpReader::new(file)?;
        let index = read_index(shx, reader.header.shape_type)?;
        tracing::debug!(records = index.len(), "Read '.shx' index");
        reader.index = Some(index);
        Ok(reader)
    }

    pub fn header(&self) -> &ShpHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// Number of records, when an index was supplied.
    pub fn record_count(&self) -> Option<usize> {
        self.index.as_ref().map(|i| i.len())
    }

    pub fn index(&self) -> Option<&[IndexEntry]> {
        self.index.as_deref()
    }

    /// 1-based number of the record most recently read.
    pub fn record_number(&self) -> usize {
        self.n_records_already_read
    }

    /// The record most recently read (empty before the first read).
    pub fn shape(&self) -> &ShapeBuilder {
        &self.shape
    }

    /// Decodes the next record. `None` at the end of the file.
    pub fn read_shape(&mut self) -> Result<Option<&ShapeBuilder>> {
        let end = (self.header.file_length as u64).min(self.file_length);
        if self.position + RECORD_HEADER_LENGTH as u64 > end {
            if self.position < self.header.file_length as u64 {
                return Err(truncated(".shp", "a record header", self.position));
            }
            return Ok(None);
        }

        let record_header = self.read_record_header()?;
        self.read_body(record_header.content_length)?;
        self.n_records_already_read += 1;
        Ok(Some(&self.shape))
    }

    /// Decodes record `i` (0-based) by seeking through the index.
    ///
    /// Sequential reading continues from the record after `i`.
    pub fn read_at(&mut self, i: usize) -> Result<Option<&ShapeBuilder>> {
        let entry = match self.index {
            None => return Err(ShapefileError::NoIndex),
            Some(ref index) => match index.get(i) {
                None => return Ok(None),
                Some(&entry) => entry,
            },
        };

        self.file.seek(SeekFrom::Start(entry.offset))?;
        self.position = entry.offset;
        let record_header = self.read_record_header()?;
        if record_header.content_length != entry.content_length {
            return Err(ShapefileError::IndexMismatch {
                record: i + 1,
                reason: format!(
                    "index says {} bytes, record header says {}",
                    entry.content_length, record_header.content_length
                ),
            });
        }
        self.read_body(record_header.content_length)?;
        self.n_records_already_read = i + 1;
        Ok(Some(&self.shape))
    }

    fn read_record_header(&mut self) -> Result<RecordHeader> {
        read_exact_or_truncated(
            &mut self.buf,
            &mut self.file,
            RECORD_HEADER_LENGTH,
            ".shp",
            "a record header",
            self.position,
        )?;
        let record_header = RecordHeader::read(self.buf.as_slice())?;
        self.position += RECORD_HEADER_LENGTH as u64;
        Ok(record_header)
    }

    fn read_body(&mut self, content_length: usize) -> Result<()> {
        let record = self.n_records_already_read + 1;
        // check the declared length before sizing the buffer for it
        let end = self.position + content_length as u64;
        if end > self.header.file_length as u64 {
            return Err(ShapefileError::Corrupted(format!(
                "the '.shp' header says the file is {} bytes long, but record {} ends at byte {}",
                self.header.file_length, record, end
            )));
        }
        if end > self.file_length {
            return Err(truncated(".shp", "a record", self.position));
        }
        read_exact_or_truncated(&mut self.buf, &mut self.file, content_length, ".shp", "a record", self.position)?;
        self.position = end;

        let mut r = ByteReader::new(self.buf.as_slice());
        self.codec.decode(record, &mut r, &mut self.shape)?;
        tracing::trace!(record = record, points = self.shape.point_count(), "Read '.shp' record");
        Ok(())
    }

    /// Rewinds to the first record.
    pub fn restart(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(HEADER_LENGTH as u64))?;
        self.position = HEADER_LENGTH as u64;
        self.n_records_already_read = 0;
        Ok(())
    }

    /// Copies out every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<ShapeBuilder>> {
        let mut ret = vec![];
        while let Some(shape) = self.read_shape()? {
            ret.push(shape.clone());
        }
        Ok(ret)
    }

    /// Cross-checks the whole ".shx" index against the ".shp" file, then
    /// rewinds.
    ///
    /// Every entry must point at the next record header in sequence, with
    /// the right record number and length, and every record's shape type
    /// must be the file's (or a null shape).
    pub fn validate(&mut self) -> Result<()> {
        let index = match self.index {
            None => return Err(ShapefileError::NoIndex),
            Some(ref index) => index.clone(),
        };

        let mut expected_offset = HEADER_LENGTH as u64;
        for (i, entry) in index.iter().enumerate() {
            let mismatch = |reason: String| ShapefileError::IndexMismatch { record: i + 1, reason };

            if entry.offset != expected_offset {
                return Err(mismatch(format!(
                    "index points at byte {}, but the record header is at byte {}",
                    entry.offset, expected_offset
                )));
            }
            let record_end = entry.offset + (RECORD_HEADER_LENGTH + entry.content_length) as u64;
            if record_end > self.file_length {
                return Err(mismatch(format!(
                    "record would end at byte {}, past the end of the '.shp' file ({} bytes)",
                    record_end, self.file_length
                )));
            }

            self.file.seek(SeekFrom::Start(entry.offset))?;
            self.buf.fill_from(&mut self.file, RECORD_HEADER_LENGTH + entry.content_length.min(4))?;
            let mut r = ByteReader::new(self.buf.as_slice());
            let number = r.read_i32_be()?;
            let words = r.read_i32_be()?;
            if number != (i + 1) as i32 {
                return Err(mismatch(format!("record header is numbered {}", number)));
            }
            if words as i64 * 2 != entry.content_length as i64 {
                return Err(mismatch(format!(
                    "index says {} bytes, record header says {}",
                    entry.content_length,
                    words as i64 * 2
                )));
            }
            if entry.content_length >= 4 {
                let found = ShapeType::from_code(r.read_i32_le()?)?;
                if found != ShapeType::NullShape && found != self.header.shape_type {
                    return Err(ShapefileError::ShapeTypeMismatch {
                        record: i + 1,
                        expected: self.header.shape_type,
                        found,
                    });
                }
            }

            expected_offset = record_end;
        }

        if expected_offset != self.header.file_length as u64 {
            return Err(ShapefileError::IndexMismatch {
                record: index.len(),
                reason: format!(
                    "records end at byte {}, but the '.shp' header says the file is {} bytes",
                    expected_offset, self.header.file_length
                ),
            });
        }

        self.restart()
    }
}

/// Appends shape records to a ".shp" file and its ".shx" index.
///
/// Both headers carry the file length and extent, which are only known at the
/// end: they are written as placeholders up front and patched by `close()`
/// (or on drop).
pub struct ShpWriter<W: Write + Seek> {
    shp: W,
    shx: W,
    header: ShpHeader,
    codec: ShapeCodec,
    /// Byte offset of the next record header.
    position: u64,
    record_count: usize,
    buf: ByteBuffer,
    shape: ShapeBuilder,
    closed: bool,
}

impl<W: Write + Seek> ShpWriter<W> {
    pub fn new(mut shp: W, mut shx: W, shape_type: ShapeType) -> Result<ShpWriter<W>> {
        let header = ShpHeader::new(shape_type);
        let mut buf = ByteBuffer::new();
        header.write(&mut buf);
        shp.write_all(buf.as_slice())?;
        shx.write_all(buf.as_slice())?;

        tracing::debug!(shape_type = %shape_type, "Created '.shp' file");

        Ok(ShpWriter {
            shp,
            shx,
            header,
            codec: ShapeCodec::new(shape_type),
            position: HEADER_LENGTH as u64,
            record_count: 0,
            buf,
            shape: ShapeBuilder::new(),
            closed: false,
        })
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Extent of every record written so far.
    pub fn header(&self) -> &ShpHeader {
        &self.header
    }

    /// Appends `shape` as the next record.
    pub fn write_shape(&mut self, shape: &ShapeBuilder) -> Result<()> {
        if self.closed {
            return Err(ShapefileError::Closed);
        }
        let number = self.record_count + 1;

        self.buf.clear();
        self.buf.write_zeros(RECORD_HEADER_LENGTH);
        let extent = self.codec.encode(number, shape, &mut self.buf)?;
        let content_length = self.buf.len() - RECORD_HEADER_LENGTH;
        if self.position + self.buf.len() as u64 > MAX_FILE_LENGTH {
            return Err(ShapefileError::FileTooLarge { max: MAX_FILE_LENGTH });
        }
        {
            let head = self.buf.as_mut_slice();
            BigEndian::write_i32(&mut head[0..4], number as i32);
            BigEndian::write_i32(&mut head[4..8], (content_length / 2) as i32);
        }
        self.shp.write_all(self.buf.as_slice())?;

        self.buf.clear();
        IndexEntry { offset: self.position, content_length }.write(&mut self.buf);
        self.shx.write_all(self.buf.as_slice())?;

        self.header.bounding_box.expand(&extent);
        self.position += (RECORD_HEADER_LENGTH + content_length) as u64;
        self.record_count = number;

        tracing::trace!(record = number, bytes = content_length, "Wrote '.shp' record");
        Ok(())
    }

    /// Appends `geometry` (`None` for a null shape) as the next record.
    pub fn write(&mut self, geometry: Option<&Geometry>) -> Result<()> {
        let mut shape = std::mem::take(&mut self.shape);
        let result = shape
            .set_geometry(geometry, self.header.shape_type)
            .and_then(|_| self.write_shape(&shape));
        self.shape = shape;
        result
    }

    /// Patches both headers and flushes. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.record_count > 0 {
            self.header.file_length = self.position as usize;
            self.buf.clear();
            self.header.write(&mut self.buf);
            self.shp.seek(SeekFrom::Start(0))?;
            self.shp.write_all(self.buf.as_slice())?;
            self.shp.seek(SeekFrom::End(0))?;

            let shx_header = ShpHeader {
                file_length: HEADER_LENGTH + SHX_RECORD_LENGTH * self.record_count,
                ..self.header
            };
            self.buf.clear();
            shx_header.write(&mut self.buf);
            self.shx.seek(SeekFrom::Start(0))?;
            self.shx.write_all(self.buf.as_slice())?;
            self.shx.seek(SeekFrom::End(0))?;
        }

        self.shp.flush()?;
        self.shx.flush()?;

        tracing::debug!(records = self.record_count, bytes = self.position, "Closed '.shp' file");
        Ok(())
    }
}

impl<W: Write + Seek> Drop for ShpWriter<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close '.shp' file");
        }
    }
}
