//! Fixed-size headers of ".shp" and ".shx" files, as per
//! https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
//!
//! Lengths and offsets are counted in 16-bit words.

use crate::error::{Result, ShapefileError};
use super::buffer::{ByteBuffer, ByteReader};
use super::range::{BoundingBox, Range};
use super::shape_type::ShapeType;

pub const HEADER_LENGTH: usize = 100;
pub const RECORD_HEADER_LENGTH: usize = 8;
pub const SHX_RECORD_LENGTH: usize = 8;
pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;
/// Largest byte length or offset a big-endian word count can express.
pub const MAX_FILE_LENGTH: u64 = i32::MAX as u64 * 2;

/// The 100-byte header shared by ".shp" and ".shx".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShpHeader {
    /// Whole file length, in bytes (stored as words).
    pub file_length: usize,
    pub shape_type: ShapeType,
    pub bounding_box: BoundingBox,
}

impl ShpHeader {
    pub fn new(shape_type: ShapeType) -> ShpHeader {
        ShpHeader {
            file_length: HEADER_LENGTH,
            shape_type,
            bounding_box: BoundingBox::default(),
        }
    }

    pub fn read(buf: &[u8]) -> Result<ShpHeader> {
        let mut r = ByteReader::new(buf);

        let file_code = r.read_i32_be()?;
        if file_code != FILE_CODE {
            return Err(ShapefileError::InvalidFileCode(file_code));
        }
        r.skip(20)?;
        let file_length_words = r.read_i32_be()?;
        let version = r.read_i32_le()?;
        if version != VERSION {
            return Err(ShapefileError::InvalidVersion(version));
        }
        let shape_type = ShapeType::from_code(r.read_i32_le()?)?;
        if file_length_words < (HEADER_LENGTH / 2) as i32 {
            return Err(ShapefileError::Corrupted(format!(
                "header says the file is {} words long, shorter than the header itself",
                file_length_words
            )));
        }

        let x_min = r.read_f64_le()?;
        let y_min = r.read_f64_le()?;
        let x_max = r.read_f64_le()?;
        let y_max = r.read_f64_le()?;
        let z_min = r.read_f64_le()?;
        let z_max = r.read_f64_le()?;
        let m_min = r.read_f64_le()?;
        let m_max = r.read_f64_le()?;

        let bounding_box = BoundingBox {
            x: Range::new(x_min, x_max),
            y: Range::new(y_min, y_max),
            z: if shape_type.has_z() { Range::new(z_min, z_max) } else { Range::empty() },
            m: if shape_type.has_m() { Range::new(m_min, m_max) } else { Range::empty() },
        };

        Ok(ShpHeader {
            file_length: file_length_words as usize * 2,
            shape_type,
            bounding_box,
        })
    }

    pub fn write(&self, buf: &mut ByteBuffer) {
        buf.write_i32_be(FILE_CODE);
        buf.write_zeros(20);
        buf.write_i32_be((self.file_length / 2) as i32);
        buf.write_i32_le(VERSION);
        buf.write_i32_le(self.shape_type.code());

        let bb = &self.bounding_box;
        let (x_min, x_max) = bb.x.or(0.0);
        let (y_min, y_max) = bb.y.or(0.0);
        let (z_min, z_max) = if self.shape_type.has_z() { bb.z.or(0.0) } else { (0.0, 0.0) };
        let (m_min, m_max) = if self.shape_type.has_m() { bb.m.or(0.0) } else { (0.0, 0.0) };
        for v in &[x_min, y_min, x_max, y_max, z_min, z_max, m_min, m_max] {
            buf.write_f64_le(*v);
        }
    }
}

/// The 8 bytes before each ".shp" record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// 1-based.
    pub number: i32,
    /// Record body length in bytes (stored as words).
    pub content_length: usize,
}

impl RecordHeader {
    pub fn read(buf: &[u8]) -> Result<RecordHeader> {
        let mut r = ByteReader::new(buf);
        let number = r.read_i32_be()?;
        let words = r.read_i32_be()?;
        if words < 0 {
            return Err(ShapefileError::Corrupted(format!(
                "record {} has negative content length {}",
                number, words
            )));
        }
        Ok(RecordHeader { number, content_length: words as usize * 2 })
    }

    pub fn write(&self, buf: &mut ByteBuffer) {
        buf.write_i32_be(self.number);
        buf.write_i32_be((self.content_length / 2) as i32);
    }
}

/// One ".shx" entry: where a record's header starts in the ".shp" file and
/// how long its body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset (stored as words).
    pub offset: u64,
    /// Body length in bytes (stored as words).
    pub content_length: usize,
}

impl IndexEntry {
    pub fn read(buf: &[u8]) -> Result<IndexEntry> {
        let mut r = ByteReader::new(buf);
        let offset = r.read_i32_be()?;
        let words = r.read_i32_be()?;
        if offset < 0 || words < 0 {
            return Err(ShapefileError::Corrupted(format!(
                "index entry has negative offset {} or length {}",
                offset, words
            )));
        }
        Ok(IndexEntry {
            offset: offset as u64 * 2,
            content_length: words as usize * 2,
        })
    }

    pub fn write(&self, buf: &mut ByteBuffer) {
        buf.write_i32_be((self.offset / 2) as i32);
        buf.write_i32_be((self.content_length / 2) as i32);
    }
}
