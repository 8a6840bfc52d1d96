//! Field definitions of an xBase ".dbf" file, as per
//! https://www.clicketyclick.dk/databases/xbase/format/dbf.html
//!
//! Each field is a fixed-width slot of text in every record.

use chrono::{Datelike, NaiveDate};
use encoding::all::ASCII;
use encoding::EncodingRef;
use regex::Regex;

use crate::error::{Result, ShapefileError};
use crate::shapefile::buffer::{decode_fixed_string, encode_to_width, ByteBuffer, ByteReader};
use super::value::DbfValue;

pub const FIELD_DESCRIPTOR_LENGTH: usize = 32;
pub const MAX_NAME_LENGTH: usize = 10;
const MAX_CHARACTER_LENGTH: u8 = 254;
const MAX_NUMERIC_LENGTH: u8 = 20;

lazy_static! {
    // sign, digits with an optional decimal point, optional exponent
    static ref NUMBER: Regex = Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
}

impl FieldType {
    pub fn from_byte(b: u8) -> Option<FieldType> {
        match b {
            b'C' | b'c' => Some(FieldType::Character),
            b'N' | b'n' => Some(FieldType::Numeric),
            b'F' | b'f' => Some(FieldType::Float),
            b'L' | b'l' => Some(FieldType::Logical),
            b'D' | b'd' => Some(FieldType::Date),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Logical => b'L',
            FieldType::Date => b'D',
        }
    }
}

/// A column: its definition, plus the value of the record most recently read
/// or about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    pub field_type: FieldType,
    pub length: u8,
    pub decimal_count: u8,
    pub value: DbfValue,
}

impl DbfField {
    /// Validates the definition.
    pub fn new(name: &str, field_type: FieldType, length: u8, decimal_count: u8) -> Result<DbfField> {
        let field = DbfField {
            name: name.to_string(),
            field_type,
            length,
            decimal_count,
            value: DbfValue::Null,
        };
        field.validate()?;
        Ok(field)
    }

    pub fn character(name: &str, length: u8) -> Result<DbfField> {
        DbfField::new(name, FieldType::Character, length, 0)
    }

    pub fn numeric(name: &str, length: u8, decimal_count: u8) -> Result<DbfField> {
        DbfField::new(name, FieldType::Numeric, length, decimal_count)
    }

    pub fn float(name: &str, length: u8, decimal_count: u8) -> Result<DbfField> {
        DbfField::new(name, FieldType::Float, length, decimal_count)
    }

    pub fn logical(name: &str) -> Result<DbfField> {
        DbfField::new(name, FieldType::Logical, 1, 0)
    }

    pub fn date(name: &str) -> Result<DbfField> {
        DbfField::new(name, FieldType::Date, 8, 0)
    }

    fn invalid(&self, reason: String) -> ShapefileError {
        ShapefileError::InvalidField { name: self.name.clone(), reason }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LENGTH {
            return Err(self.invalid(format!("names must be 1 to {} bytes", MAX_NAME_LENGTH)));
        }
        if !self.name.is_ascii() || self.name.contains('\0') {
            return Err(self.invalid("names must be ASCII without NUL".to_string()));
        }

        let (min, max) = match self.field_type {
            FieldType::Character => (1, MAX_CHARACTER_LENGTH),
            FieldType::Numeric | FieldType::Float => (1, MAX_NUMERIC_LENGTH),
            FieldType::Logical => (1, 1),
            FieldType::Date => (8, 8),
        };
        if self.length < min || self.length > max {
            return Err(self.invalid(format!(
                "{:?} fields must be {} to {} bytes long, not {}",
                self.field_type, min, max, self.length
            )));
        }

        match self.field_type {
            FieldType::Numeric | FieldType::Float => {
                if self.decimal_count >= self.length {
                    return Err(self.invalid(format!(
                        "{} decimals do not fit in {} bytes",
                        self.decimal_count, self.length
                    )));
                }
            }
            _ => {
                if self.decimal_count != 0 {
                    return Err(self.invalid(format!("{:?} fields have no decimals", self.field_type)));
                }
            }
        }

        Ok(())
    }

    /// Parses one 32-byte field descriptor.
    pub fn read_descriptor(buf: &[u8]) -> Result<DbfField> {
        let mut r = ByteReader::new(buf);
        let name_bytes = r.read_bytes(11)?;
        let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let name = decode_fixed_string(&name_bytes[..name_end], ASCII)
            .unwrap_or_default()
            .trim()
            .to_string();

        let type_byte = r.read_u8()?;
        let field_type = FieldType::from_byte(type_byte).ok_or_else(|| ShapefileError::InvalidField {
            name: name.clone(),
            reason: format!("unsupported field type '{}'", type_byte as char),
        })?;
        r.skip(4)?;
        let length = r.read_u8()?;
        let decimal_count = r.read_u8()?;

        if length == 0 {
            return Err(ShapefileError::InvalidField { name, reason: "zero length".to_string() });
        }

        Ok(DbfField {
            name,
            field_type,
            length,
            decimal_count,
            value: DbfValue::Null,
        })
    }

    pub fn write_descriptor(&self, buf: &mut ByteBuffer) {
        let mut name = self.name.as_bytes().to_vec();
        name.resize(11, 0);
        buf.write_bytes(&name);
        buf.write_u8(self.field_type.to_byte());
        buf.write_zeros(4);
        buf.write_u8(self.length);
        buf.write_u8(self.decimal_count);
        buf.write_zeros(14);
    }

    /// Decodes this field's slot of a record.
    pub fn decode(&self, bytes: &[u8], encoding: EncodingRef) -> DbfValue {
        match self.field_type {
            FieldType::Character => match decode_fixed_string(bytes, encoding) {
                None => DbfValue::Null,
                Some(s) => {
                    let trimmed = s.trim_end();
                    if trimmed.is_empty() {
                        DbfValue::Null
                    } else {
                        DbfValue::Character(trimmed.to_string())
                    }
                }
            },
            FieldType::Numeric | FieldType::Float => self.decode_number(bytes),
            FieldType::Logical => match bytes.first() {
                Some(b'T') | Some(b't') | Some(b'Y') | Some(b'y') => DbfValue::Logical(true),
                Some(b'F') | Some(b'f') | Some(b'N') | Some(b'n') => DbfValue::Logical(false),
                _ => DbfValue::Null,
            },
            // all-NUL and all-space both mean "no date"
            FieldType::Date => match decode_fixed_string(bytes, ASCII) {
                None => DbfValue::Null,
                Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
                    .map(DbfValue::Date)
                    .unwrap_or(DbfValue::Null),
            },
        }
    }

    fn decode_number(&self, bytes: &[u8]) -> DbfValue {
        let text = match decode_fixed_string(bytes, ASCII) {
            None => return DbfValue::Null,
            Some(s) => s.trim().to_string(),
        };
        if text.is_empty() {
            return DbfValue::Null;
        }
        if !NUMBER.is_match(&text) {
            return DbfValue::Unparsed(text);
        }

        if self.field_type == FieldType::Numeric && self.decimal_count == 0 {
            if let Ok(v) = text.parse::<i64>() {
                return DbfValue::Integer(v);
            }
        }

        match text.parse::<f64>() {
            Ok(v) if self.field_type == FieldType::Float => DbfValue::Float(v),
            Ok(v) => DbfValue::Numeric(v),
            Err(_) => DbfValue::Unparsed(text),
        }
    }

    /// Decodes this field's slot into `self.value`.
    pub fn read(&mut self, bytes: &[u8], encoding: EncodingRef) {
        self.value = self.decode(bytes, encoding);
    }

    fn value_error(&self, reason: String) -> ShapefileError {
        ShapefileError::InvalidValue { name: self.name.clone(), reason }
    }

    /// Encodes `value` into exactly `self.length` bytes.
    pub fn encode(&self, value: &DbfValue, encoding: EncodingRef) -> Result<Vec<u8>> {
        let bytes = self.encode_slot(value, encoding)?;
        if bytes.len() != self.length as usize {
            return Err(self.value_error(format!(
                "{:?} encodes to {} bytes, not {}",
                value,
                bytes.len(),
                self.length
            )));
        }
        Ok(bytes)
    }

    fn encode_slot(&self, value: &DbfValue, encoding: EncodingRef) -> Result<Vec<u8>> {
        let width = self.length as usize;
        let blank = || vec![b' '; width];

        match self.field_type {
            FieldType::Character => match value {
                DbfValue::Null => Ok(blank()),
                DbfValue::Character(s) | DbfValue::Unparsed(s) => Ok(encode_to_width(s, width, encoding)),
                DbfValue::Integer(_) | DbfValue::Numeric(_) | DbfValue::Float(_) => {
                    Ok(encode_to_width(&value.to_string(), width, encoding))
                }
                _ => Err(self.value_error(format!("cannot store {:?} as text", value))),
            },
            FieldType::Numeric | FieldType::Float => {
                let text = match *value {
                    DbfValue::Null => return Ok(blank()),
                    DbfValue::Integer(v) if self.decimal_count == 0 => v.to_string(),
                    DbfValue::Integer(v) => format!("{:.*}", self.decimal_count as usize, v as f64),
                    DbfValue::Numeric(v) | DbfValue::Float(v) => {
                        if !v.is_finite() {
                            return Ok(blank());
                        }
                        format!("{:.*}", self.decimal_count as usize, v)
                    }
                    DbfValue::Unparsed(ref s) => s.trim().to_string(),
                    _ => return Err(self.value_error(format!("cannot store {:?} as a number", value))),
                };
                if !text.is_ascii() {
                    return Err(self.value_error(format!("'{}' is not ASCII", text)));
                }
                if text.len() > width {
                    return Err(self.value_error(format!("'{}' is wider than {} bytes", text, width)));
                }
                let mut bytes = vec![b' '; width - text.len()];
                bytes.extend_from_slice(text.as_bytes());
                Ok(bytes)
            }
            FieldType::Logical => match *value {
                DbfValue::Null => Ok(vec![b' ']),
                DbfValue::Logical(true) => Ok(vec![b'T']),
                DbfValue::Logical(false) => Ok(vec![b'F']),
                _ => Err(self.value_error(format!("cannot store {:?} as a logical", value))),
            },
            FieldType::Date => match *value {
                DbfValue::Null => Ok(vec![0u8; width]),
                DbfValue::Date(d) if (0..=9999).contains(&d.year()) => Ok(d.format("%Y%m%d").to_string().into_bytes()),
                DbfValue::Date(d) => Err(self.value_error(format!("year {} does not fit in 4 digits", d.year()))),
                _ => Err(self.value_error(format!("cannot store {:?} as a date", value))),
            },
        }
    }

    /// Encodes `self.value` onto the end of `buf`.
    pub fn write(&self, buf: &mut ByteBuffer, encoding: EncodingRef) -> Result<()> {
        let bytes = self.encode(&self.value, encoding)?;
        buf.write_bytes(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use encoding::all::{UTF_8, WINDOWS_1252};

    fn round_trip(field: &DbfField, value: DbfValue) -> DbfValue {
        let bytes = field.encode(&value, WINDOWS_1252).unwrap();
        assert_eq!(field.length as usize, bytes.len());
        field.decode(&bytes, WINDOWS_1252)
    }

    #[test]
    fn character_pads_and_trims() {
        let field = DbfField::character("NAME", 5).unwrap();
        assert_eq!(b"abc  ".to_vec(), field.encode(&"abc".into(), WINDOWS_1252).unwrap());
        assert_eq!(DbfValue::from("abc"), round_trip(&field, "abc".into()));
        assert_eq!(DbfValue::Null, round_trip(&field, DbfValue::Null));
        assert_eq!(DbfValue::Null, field.decode(&[0; 5], WINDOWS_1252));
    }

    #[test]
    fn character_truncates_multibyte() {
        let field = DbfField::character("NAME", 3).unwrap();
        assert_eq!(vec![b'a', 0xc3, 0xa9], field.encode(&"aéz".into(), UTF_8).unwrap());
    }

    #[test]
    fn numeric_integers() {
        let field = DbfField::numeric("COUNT", 6, 0).unwrap();
        assert_eq!(b"   -42".to_vec(), field.encode(&DbfValue::Integer(-42), WINDOWS_1252).unwrap());
        assert_eq!(DbfValue::Integer(-42), round_trip(&field, DbfValue::Integer(-42)));
        assert!(field.encode(&DbfValue::Integer(12345678), WINDOWS_1252).is_err());
    }

    #[test]
    fn numeric_decimals() {
        let field = DbfField::numeric("AREA", 10, 3).unwrap();
        assert_eq!(b"     2.500".to_vec(), field.encode(&DbfValue::Numeric(2.5), WINDOWS_1252).unwrap());
        assert_eq!(DbfValue::Numeric(2.5), round_trip(&field, DbfValue::Numeric(2.5)));
    }

    #[test]
    fn numeric_permissive_parse() {
        let field = DbfField::float("F", 12, 2).unwrap();
        assert_eq!(DbfValue::Float(1500.), field.decode(b"  +1.5e3    ", WINDOWS_1252));
        assert_eq!(DbfValue::Float(0.25), field.decode(b"         .25", WINDOWS_1252));
        assert_eq!(DbfValue::Null, field.decode(b"            ", WINDOWS_1252));
        assert_eq!(DbfValue::Unparsed("*****".to_string()), field.decode(b"       *****", WINDOWS_1252));
    }

    #[test]
    fn logical_values() {
        let field = DbfField::logical("OK").unwrap();
        for b in b"TtYy" {
            assert_eq!(DbfValue::Logical(true), field.decode(&[*b], WINDOWS_1252));
        }
        for b in b"FfNn" {
            assert_eq!(DbfValue::Logical(false), field.decode(&[*b], WINDOWS_1252));
        }
        assert_eq!(DbfValue::Null, field.decode(b" ", WINDOWS_1252));
        assert_eq!(DbfValue::Null, field.decode(b"?", WINDOWS_1252));
        assert_eq!(b" ".to_vec(), field.encode(&DbfValue::Null, WINDOWS_1252).unwrap());
    }

    #[test]
    fn dates() {
        let field = DbfField::date("WHEN").unwrap();
        let d = NaiveDate::from_ymd_opt(2017, 3, 9).unwrap();
        assert_eq!(b"20170309".to_vec(), field.encode(&d.into(), WINDOWS_1252).unwrap());
        assert_eq!(DbfValue::Date(d), round_trip(&field, d.into()));
        assert_eq!(vec![0u8; 8], field.encode(&DbfValue::Null, WINDOWS_1252).unwrap());
        assert_eq!(DbfValue::Null, field.decode(&[0u8; 8], WINDOWS_1252));
        assert_eq!(DbfValue::Null, field.decode(b"        ", WINDOWS_1252));
        assert_eq!(DbfValue::Null, field.decode(b"2017XX09", WINDOWS_1252));
    }

    #[test]
    fn invalid_definitions() {
        assert!(DbfField::character("", 10).is_err());
        assert!(DbfField::character("ELEVENCHARS", 10).is_err());
        assert!(DbfField::character("NAME", 0).is_err());
        assert!(DbfField::character("NAME", 255).is_err());
        assert!(DbfField::numeric("N", 21, 0).is_err());
        assert!(DbfField::numeric("N", 5, 5).is_err());
        assert!(DbfField::new("D", FieldType::Date, 10, 0).is_err());
        assert!(DbfField::new("C", FieldType::Character, 10, 2).is_err());
        assert!(DbfField::character("TENCHARSOK", 10).is_ok());
    }

    #[test]
    fn five_digit_year_is_rejected() {
        let field = DbfField::date("WHEN").unwrap();
        let d = NaiveDate::from_ymd_opt(12345, 1, 2).unwrap();
        assert!(matches!(field.encode(&d.into(), WINDOWS_1252), Err(ShapefileError::InvalidValue { .. })));
        let d = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert_eq!(b"99991231".to_vec(), field.encode(&d.into(), WINDOWS_1252).unwrap());
    }

    #[test]
    fn non_ascii_numeric_text_is_rejected() {
        let field = DbfField::numeric("N", 6, 0).unwrap();
        let garbled = field.decode(b"   \xe912", WINDOWS_1252);
        assert!(matches!(garbled, DbfValue::Unparsed(_)));
        assert!(matches!(field.encode(&garbled, WINDOWS_1252), Err(ShapefileError::InvalidValue { .. })));
        assert!(matches!(
            field.encode(&DbfValue::Unparsed("\u{fffd}12".to_string()), WINDOWS_1252),
            Err(ShapefileError::InvalidValue { .. })
        ));
        assert_eq!(b"   *12".to_vec(), field.encode(&DbfValue::Unparsed("*12".to_string()), WINDOWS_1252).unwrap());
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let field = DbfField::logical("OK").unwrap();
        assert!(matches!(
            field.encode(&"yes".into(), WINDOWS_1252),
            Err(ShapefileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn descriptor_layout() {
        let field = DbfField::numeric("POP", 9, 2).unwrap();
        let mut buf = ByteBuffer::new();
        field.write_descriptor(&mut buf);
        assert_eq!(FIELD_DESCRIPTOR_LENGTH, buf.len());
        assert_eq!(b'N', buf.as_slice()[11]);
        assert_eq!(9, buf.as_slice()[16]);
        assert_eq!(2, buf.as_slice()[17]);
        assert_eq!(field, DbfField::read_descriptor(buf.as_slice()).unwrap());
    }
}
