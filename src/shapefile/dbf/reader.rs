use std::io::{self, Read, Seek, SeekFrom};
use encoding::EncodingRef;

use crate::error::{Result, ShapefileError};
use crate::shapefile::buffer::{ByteBuffer, ByteReader};
use super::encoding::{resolve, EncodingSource};
use super::field::{DbfField, FIELD_DESCRIPTOR_LENGTH};
use super::{Attributes, DbfHeader, DELETED_FLAG, END_OF_FILE, HEADER_LENGTH, HEADER_TERMINATOR};

/// Whether the row just read is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Active,
    Deleted,
}

/// Reads an xBase ".dbf" file record by record.
///
/// Each read overwrites the `value` of every field, so copy values out (or
/// use the `Iterator` impl, which does) before reading the next record.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use shpcodec::shapefile::dbf::{DbfField, DbfReader, DbfValue, DbfWriter};
///
/// let mut file = Cursor::new(Vec::new());
/// {
///     let fields = vec![DbfField::character("NAME", 5).unwrap()];
///     let mut writer = DbfWriter::new(&mut file, fields, encoding::all::UTF_8).unwrap();
///     writer.write(&["abc".into()]).unwrap();
///     writer.close().unwrap();
/// }
///
/// file.set_position(0);
/// let mut reader = DbfReader::new(file, None, None).unwrap();
/// let fields = reader.read().unwrap().unwrap();
/// assert_eq!(DbfValue::from("abc"), fields[0].value);
/// ```
pub struct DbfReader<R: Read + Seek> {
    file: R,
    header: DbfHeader,
    fields: Vec<DbfField>,
    encoding: EncodingRef,
    encoding_source: EncodingSource,
    n_rows_already_read: usize,
    buf: ByteBuffer,
}

impl<R: Read + Seek> DbfReader<R> {
    /// Reads the header and field descriptors.
    ///
    /// `encoding` overrides everything; otherwise `cpg` (the contents of a
    /// ".cpg" sidecar) is consulted, then the header's language driver byte.
    pub fn new(mut file: R, encoding: Option<EncodingRef>, cpg: Option<&str>) -> Result<DbfReader<R>> {
        let mut buf = ByteBuffer::new();
        fill_header(&mut buf, &mut file, HEADER_LENGTH)?;
        let header = DbfHeader::read(buf.as_slice())?;

        if header.header_length < HEADER_LENGTH + 1 {
            return Err(ShapefileError::Corrupted(format!(
                "'.dbf' header length {} is too short",
                header.header_length
            )));
        }

        fill_header(&mut buf, &mut file, header.header_length - HEADER_LENGTH)?;
        let fields = read_fields(buf.as_slice())?;

        let record_length: usize = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
        if record_length > header.record_length {
            return Err(ShapefileError::Corrupted(format!(
                "'.dbf' fields need {} bytes per record, but the header says {}",
                record_length, header.record_length
            )));
        }

        let (encoding, encoding_source) = resolve(encoding, cpg, header.language_driver);
        tracing::debug!(
            records = header.record_count,
            fields = fields.len(),
            encoding = encoding.name(),
            source = ?encoding_source,
            "Opened '.dbf' file"
        );

        Ok(DbfReader {
            file,
            header,
            fields,
            encoding,
            encoding_source,
            n_rows_already_read: 0,
            buf,
        })
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&DbfField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Number of rows, deleted ones included.
    pub fn record_count(&self) -> usize {
        self.header.record_count
    }

    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    pub fn encoding_source(&self) -> EncodingSource {
        self.encoding_source
    }

    /// Reads the next row, deleted or not, into the fields' values.
    ///
    /// Returns `None` after the last row the header promises. A file that
    /// ends before then is corrupt.
    pub fn read_row(&mut self) -> Result<Option<RowStatus>> {
        if self.n_rows_already_read >= self.header.record_count {
            return Ok(None);
        }

        let row = self.n_rows_already_read;
        match self.buf.fill_from(&mut self.file, self.header.record_length) {
            Ok(()) => {}
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(self.truncated(row));
            }
            Err(err) => return Err(err.into()),
        }
        self.n_rows_already_read += 1;

        let mut r = ByteReader::new(self.buf.as_slice());
        let flag = r.read_u8()?;
        if flag == END_OF_FILE {
            return Err(self.truncated(row));
        }

        for field in self.fields.iter_mut() {
            let bytes = r.read_bytes(field.length as usize)?;
            field.read(bytes, self.encoding);
        }

        tracing::trace!(row = row, deleted = flag == DELETED_FLAG, "Read '.dbf' row");

        Ok(Some(if flag == DELETED_FLAG { RowStatus::Deleted } else { RowStatus::Active }))
    }

    fn truncated(&self, row: usize) -> ShapefileError {
        ShapefileError::RecordCountMismatch(format!(
            "'.dbf' file ends at row {}, but its header promises {} rows",
            row, self.header.record_count
        ))
    }

    /// Reads the next live record, skipping deleted rows. The returned fields
    /// are valid until the next read.
    pub fn read(&mut self) -> Result<Option<&[DbfField]>> {
        loop {
            match self.read_row()? {
                None => return Ok(None),
                Some(RowStatus::Deleted) => continue,
                Some(RowStatus::Active) => return Ok(Some(&self.fields)),
            }
        }
    }

    /// Copies the current field values out.
    pub fn attributes(&self) -> Attributes {
        Attributes::from_fields(&self.fields)
    }

    /// Rewinds to the first record.
    pub fn restart(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.header.header_length as u64))?;
        self.n_rows_already_read = 0;
        Ok(())
    }

    /// Positions the reader so the next `read_row()` reads row `i` (0-based).
    pub fn seek_row(&mut self, i: usize) -> Result<()> {
        let offset = self.header.header_length + i * self.header.record_length;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.n_rows_already_read = i;
        Ok(())
    }

    /// Reads every remaining live record.
    pub fn read_all(&mut self) -> Result<Vec<Attributes>> {
        let mut ret = vec![];
        while self.read()?.is_some() {
            ret.push(self.attributes());
        }
        Ok(ret)
    }
}

fn fill_header<R: Read>(buf: &mut ByteBuffer, file: &mut R, n: usize) -> Result<()> {
    match buf.fill_from(file, n) {
        Ok(()) => Ok(()),
        Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(ShapefileError::Corrupted(
            "'.dbf' file ends in the middle of its header".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Parses descriptors up to the 0x0D terminator.
fn read_fields(buf: &[u8]) -> Result<Vec<DbfField>> {
    let mut fields = vec![];
    let mut r = ByteReader::new(buf);

    loop {
        if r.remaining() == 0 {
            return Err(ShapefileError::Corrupted("'.dbf' field descriptors are not terminated".to_string()));
        }
        if buf[r.position()] == HEADER_TERMINATOR {
            break;
        }
        let descriptor = r.read_bytes(FIELD_DESCRIPTOR_LENGTH)?;
        fields.push(DbfField::read_descriptor(descriptor)?);
    }

    Ok(fields)
}

impl<R: Read + Seek> Iterator for DbfReader<R> {
    type Item = Result<Attributes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Err(err) => Some(Err(err)),
            Ok(None) => None,
            Ok(Some(fields)) => Some(Ok(Attributes::from_fields(fields))),
        }
    }
}
