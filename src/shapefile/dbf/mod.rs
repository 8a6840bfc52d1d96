//! Reads and writes xBase ".dbf" attribute tables, as per
//! https://www.clicketyclick.dk/databases/xbase/format/dbf.html

use chrono::{Datelike, NaiveDate};

use crate::error::Result;
use super::buffer::{ByteBuffer, ByteReader};

pub mod encoding;
pub mod field;
pub mod reader;
pub mod value;
pub mod writer;

pub use self::field::{DbfField, FieldType};
pub use self::reader::{DbfReader, RowStatus};
pub use self::value::DbfValue;
pub use self::writer::DbfWriter;

pub const HEADER_LENGTH: usize = 32;
pub const HEADER_TERMINATOR: u8 = 0x0d;
pub const END_OF_FILE: u8 = 0x1a;
pub const ACTIVE_FLAG: u8 = 0x20;
pub const DELETED_FLAG: u8 = 0x2a;
const VERSION: u8 = 0x03;

/// The first 32 bytes of a ".dbf" file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbfHeader {
    pub last_update: Option<NaiveDate>,
    pub record_count: usize,
    pub header_length: usize,
    /// Bytes per record, deletion flag included.
    pub record_length: usize,
    pub language_driver: u8,
}

impl DbfHeader {
    pub fn read(buf: &[u8]) -> Result<DbfHeader> {
        let mut r = ByteReader::new(buf);
        r.skip(1)?;
        let yy = r.read_u8()?;
        let mm = r.read_u8()?;
        let dd = r.read_u8()?;
        let record_count = r.read_u32_le()? as usize;
        let header_length = r.read_u16_le()? as usize;
        let record_length = r.read_u16_le()? as usize;
        r.skip(17)?;
        let language_driver = r.read_u8()?;

        Ok(DbfHeader {
            last_update: NaiveDate::from_ymd_opt(1900 + yy as i32, mm as u32, dd as u32),
            record_count,
            header_length,
            record_length,
            language_driver,
        })
    }

    pub fn write(&self, buf: &mut ByteBuffer) {
        buf.write_u8(VERSION);
        match self.last_update {
            Some(d) => {
                buf.write_u8((d.year() - 1900).clamp(0, 255) as u8);
                buf.write_u8(d.month() as u8);
                buf.write_u8(d.day() as u8);
            }
            None => buf.write_zeros(3),
        }
        buf.write_u32_le(self.record_count as u32);
        buf.write_u16_le(self.header_length as u16);
        buf.write_u16_le(self.record_length as u16);
        buf.write_zeros(17);
        buf.write_u8(self.language_driver);
        buf.write_zeros(2);
    }
}

/// Attribute values of one record, in field order, looked up by field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(pub Vec<(String, DbfValue)>);

impl Attributes {
    pub fn from_fields(fields: &[DbfField]) -> Attributes {
        Attributes(fields.iter().map(|f| (f.name.clone(), f.value.clone())).collect())
    }

    /// Case-insensitive, like xBase field names.
    pub fn get(&self, name: &str) -> Option<&DbfValue> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &DbfValue> {
        self.0.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = DbfHeader {
            last_update: NaiveDate::from_ymd_opt(2024, 2, 29),
            record_count: 70000,
            header_length: 97,
            record_length: 31,
            language_driver: 0x57,
        };
        let mut buf = ByteBuffer::new();
        header.write(&mut buf);
        assert_eq!(HEADER_LENGTH, buf.len());
        assert_eq!(&[0x03, 124, 2, 29], &buf.as_slice()[0..4]);
        assert_eq!(header, DbfHeader::read(buf.as_slice()).unwrap());
    }

    #[test]
    fn attributes_lookup_ignores_case() {
        let attributes = Attributes(vec![("NAME".to_string(), DbfValue::from("x"))]);
        assert_eq!(Some(&DbfValue::from("x")), attributes.get("name"));
        assert_eq!(None, attributes.get("other"));
    }
}
