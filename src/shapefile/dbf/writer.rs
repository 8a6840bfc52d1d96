use std::io::{Seek, SeekFrom, Write};
use encoding::EncodingRef;

use crate::error::{Result, ShapefileError};
use crate::shapefile::buffer::ByteBuffer;
use super::encoding::language_driver_for;
use super::field::{DbfField, FIELD_DESCRIPTOR_LENGTH};
use super::value::DbfValue;
use super::{DbfHeader, ACTIVE_FLAG, END_OF_FILE, HEADER_LENGTH, HEADER_TERMINATOR};

/// Appends records to a ".dbf" file.
///
/// The header's record count and date are only known at the end, so they are
/// patched in by `close()` (or on drop).
pub struct DbfWriter<W: Write + Seek> {
    file: W,
    header: DbfHeader,
    fields: Vec<DbfField>,
    encoding: EncodingRef,
    buf: ByteBuffer,
    closed: bool,
}

impl<W: Write + Seek> DbfWriter<W> {
    /// Validates the schema and writes a placeholder header.
    pub fn new(mut file: W, fields: Vec<DbfField>, encoding: EncodingRef) -> Result<DbfWriter<W>> {
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            if fields[..i].iter().any(|f| f.name.eq_ignore_ascii_case(&field.name)) {
                return Err(ShapefileError::InvalidField {
                    name: field.name.clone(),
                    reason: "duplicate field name".to_string(),
                });
            }
        }

        let header = DbfHeader {
            last_update: None,
            record_count: 0,
            header_length: HEADER_LENGTH + FIELD_DESCRIPTOR_LENGTH * fields.len() + 1,
            record_length: 1 + fields.iter().map(|f| f.length as usize).sum::<usize>(),
            language_driver: language_driver_for(encoding),
        };
        if header.header_length > u16::MAX as usize || header.record_length > u16::MAX as usize {
            return Err(ShapefileError::InvalidField {
                name: fields.last().map(|f| f.name.clone()).unwrap_or_default(),
                reason: "too many fields".to_string(),
            });
        }

        let mut buf = ByteBuffer::new();
        header.write(&mut buf);
        for field in fields.iter() {
            field.write_descriptor(&mut buf);
        }
        buf.write_u8(HEADER_TERMINATOR);
        file.write_all(buf.as_slice())?;

        tracing::debug!(fields = fields.len(), encoding = encoding.name(), "Created '.dbf' file");

        Ok(DbfWriter {
            file,
            header,
            fields,
            encoding,
            buf,
            closed: false,
        })
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    /// Field value slots; set them, then call `write_current()`.
    pub fn fields_mut(&mut self) -> &mut [DbfField] {
        &mut self.fields
    }

    pub fn record_count(&self) -> usize {
        self.header.record_count
    }

    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    /// Appends a record from the fields' current values.
    ///
    /// Nothing is written if any value does not fit its field.
    pub fn write_current(&mut self) -> Result<()> {
        if self.closed {
            return Err(ShapefileError::Closed);
        }

        self.buf.clear();
        self.buf.write_u8(ACTIVE_FLAG);
        for field in self.fields.iter() {
            field.write(&mut self.buf, self.encoding)?;
        }
        self.file.write_all(self.buf.as_slice())?;
        self.header.record_count += 1;
        Ok(())
    }

    fn check_count(&self, values: &[DbfValue]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(ShapefileError::InvalidValue {
                name: String::new(),
                reason: format!("{} values for {} fields", values.len(), self.fields.len()),
            });
        }
        Ok(())
    }

    /// Fails the way `write(values)` would, without writing anything.
    pub fn check(&self, values: &[DbfValue]) -> Result<()> {
        self.check_count(values)?;
        for (field, value) in self.fields.iter().zip(values) {
            field.encode(value, self.encoding)?;
        }
        Ok(())
    }

    /// Appends a record with `values`, one per field, in field order.
    pub fn write(&mut self, values: &[DbfValue]) -> Result<()> {
        self.check_count(values)?;
        for (field, value) in self.fields.iter_mut().zip(values) {
            field.value = value.clone();
        }
        self.write_current()
    }

    /// Writes the end-of-file marker and patches the header. Calling it again
    /// does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.file.write_all(&[END_OF_FILE])?;

        self.header.last_update = Some(chrono::Local::now().date_naive());
        self.buf.clear();
        self.header.write(&mut self.buf);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(self.buf.as_slice())?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.flush()?;

        tracing::debug!(records = self.header.record_count, "Closed '.dbf' file");
        Ok(())
    }
}

impl<W: Write + Seek> Drop for DbfWriter<W> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close '.dbf' file");
        }
    }
}
