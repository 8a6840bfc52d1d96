//! Byte buffers for record bodies.
//!
//! `ByteBuffer` is a growable scratch area that writers fill and readers load
//! one record into. `ByteReader` walks a byte slice, bounds-checking every
//! read: a truncated or lying record surfaces as `OutOfRange` instead of a
//! panic.

use std::io;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use encoding::{DecoderTrap, EncoderTrap, EncodingRef};

use crate::error::{Result, ShapefileError};

/// Capacity doubles until it reaches this size, then grows by this size.
const LINEAR_GROWTH_THRESHOLD: usize = 4 * 1024 * 1024;
const MIN_CAPACITY: usize = 256;

#[derive(Debug, Default)]
pub struct ByteBuffer {
    // data.len() is the capacity; bytes past `len` are scratch.
    data: Vec<u8>,
    len: usize,
}

impl ByteBuffer {
    pub fn new() -> ByteBuffer {
        ByteBuffer::default()
    }

    pub fn with_capacity(capacity: usize) -> ByteBuffer {
        ByteBuffer { data: vec![0u8; capacity], len: 0 }
    }

    /// Number of bytes written (or loaded).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Forgets the contents. Capacity is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Grows capacity to hold at least `needed` bytes.
    pub fn expand(&mut self, needed: usize) {
        let mut capacity = self.data.len().max(MIN_CAPACITY);
        while capacity < needed {
            if capacity < LINEAR_GROWTH_THRESHOLD {
                capacity *= 2;
            } else {
                capacity += LINEAR_GROWTH_THRESHOLD;
            }
        }
        if capacity > self.data.len() {
            self.data.resize(capacity, 0);
        }
    }

    /// Replaces the contents with exactly `n` bytes read from `r`.
    pub fn fill_from<R: io::Read>(&mut self, r: &mut R, n: usize) -> io::Result<()> {
        self.expand(n);
        self.len = 0;
        r.read_exact(&mut self.data[..n])?;
        self.len = n;
        Ok(())
    }

    fn claim(&mut self, width: usize) -> &mut [u8] {
        let start = self.len;
        self.expand(start + width);
        self.len += width;
        &mut self.data[start..start + width]
    }

    pub fn write_u8(&mut self, v: u8) {
        self.claim(1)[0] = v;
    }

    pub fn write_u16_le(&mut self, v: u16) {
        LittleEndian::write_u16(self.claim(2), v);
    }

    pub fn write_i16_le(&mut self, v: i16) {
        LittleEndian::write_i16(self.claim(2), v);
    }

    pub fn write_u32_le(&mut self, v: u32) {
        LittleEndian::write_u32(self.claim(4), v);
    }

    pub fn write_i32_le(&mut self, v: i32) {
        LittleEndian::write_i32(self.claim(4), v);
    }

    pub fn write_i32_be(&mut self, v: i32) {
        BigEndian::write_i32(self.claim(4), v);
    }

    pub fn write_f64_le(&mut self, v: f64) {
        LittleEndian::write_f64(self.claim(8), v);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.claim(bytes.len()).copy_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, n: usize) {
        for b in self.claim(n).iter_mut() {
            *b = 0;
        }
    }

    /// Writes `value` into exactly `width` bytes.
    ///
    /// Short values are padded with spaces. Values whose encoding is too long
    /// lose trailing characters until they fit; the few bytes a multi-byte
    /// character may leave free are NUL-filled.
    pub fn write_fixed_string(&mut self, value: &str, width: usize, encoding: EncodingRef) {
        let bytes = encode_to_width(value, width, encoding);
        self.write_bytes(&bytes);
    }
}

/// Encodes `value` into exactly `width` bytes (see
/// `ByteBuffer::write_fixed_string`).
pub fn encode_to_width(value: &str, width: usize, encoding: EncodingRef) -> Vec<u8> {
    let encode = |s: &str| -> Vec<u8> {
        encoding
            .encode(s, EncoderTrap::Replace)
            .unwrap_or_else(|_| s.bytes().collect())
    };

    let mut bytes = encode(value);
    if bytes.len() <= width {
        bytes.resize(width, b' ');
        return bytes;
    }

    let mut chars: Vec<char> = value.chars().collect();
    while bytes.len() > width {
        chars.pop();
        let truncated: String = chars.iter().collect();
        bytes = encode(&truncated);
    }
    bytes.resize(width, 0);
    bytes
}

/// Decodes a fixed-width text slot.
///
/// All-NUL slots are `None`. NUL characters are dropped from anything else.
pub fn decode_fixed_string(bytes: &[u8], encoding: EncodingRef) -> Option<String> {
    if bytes.iter().all(|&b| b == 0) {
        return None;
    }

    let mut s = encoding
        .decode(bytes, DecoderTrap::Replace)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    s.retain(|c| c != '\0');
    Some(s)
}

/// Bounds-checked little/big-endian cursor over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> ByteReader<'a> {
        ByteReader { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        match self.position.checked_add(width) {
            Some(end) if end <= self.data.len() => {
                let slice = &self.data[self.position..end];
                self.position = end;
                Ok(slice)
            }
            _ => Err(ShapefileError::OutOfRange {
                position: self.position,
                width,
                len: self.data.len(),
            }),
        }
    }

    pub fn skip(&mut self, width: usize) -> Result<()> {
        self.take(width).map(|_| ())
    }

    pub fn read_bytes(&mut self, width: usize) -> Result<&'a [u8]> {
        self.take(width)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_fixed_string(&mut self, width: usize, encoding: EncodingRef) -> Result<Option<String>> {
        Ok(decode_fixed_string(self.take(width)?, encoding))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use encoding::all::{UTF_8, WINDOWS_1252};

    #[test]
    fn doubles_then_grows_linearly() {
        let mut buf = ByteBuffer::new();
        buf.expand(300);
        assert_eq!(512, buf.capacity());
        buf.expand(LINEAR_GROWTH_THRESHOLD + 1);
        assert_eq!(2 * LINEAR_GROWTH_THRESHOLD, buf.capacity());
        buf.expand(2 * LINEAR_GROWTH_THRESHOLD + 1);
        assert_eq!(3 * LINEAR_GROWTH_THRESHOLD, buf.capacity());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = ByteBuffer::new();
        buf.write_zeros(1000);
        let capacity = buf.capacity();
        buf.clear();
        assert_eq!(0, buf.len());
        assert_eq!(capacity, buf.capacity());
    }

    #[test]
    fn mixed_endianness() {
        let mut buf = ByteBuffer::new();
        buf.write_i32_be(9994);
        buf.write_i32_le(1000);
        buf.write_f64_le(-2.5);
        assert_eq!(&[0x00, 0x00, 0x27, 0x0a, 0xe8, 0x03, 0x00, 0x00], &buf.as_slice()[0..8]);

        let mut r = ByteReader::new(buf.as_slice());
        assert_eq!(9994, r.read_i32_be().unwrap());
        assert_eq!(1000, r.read_i32_le().unwrap());
        assert_eq!(-2.5, r.read_f64_le().unwrap());
        assert_eq!(0, r.remaining());
    }

    #[test]
    fn read_past_end_is_out_of_range() {
        let data = [1u8, 2, 3];
        let mut r = ByteReader::new(&data);
        r.read_u16_le().unwrap();
        match r.read_u16_le() {
            Err(ShapefileError::OutOfRange { position: 2, width: 2, len: 3 }) => {}
            other => panic!("expected OutOfRange, got {:?}", other),
        }
        // A failed read does not move the cursor
        assert_eq!(2, r.position());
    }

    #[test]
    fn pads_short_strings_with_spaces() {
        assert_eq!(b"abc  ".to_vec(), encode_to_width("abc", 5, WINDOWS_1252));
    }

    #[test]
    fn truncates_multibyte_strings_then_nul_pads() {
        // "é" is two bytes in UTF-8; "aé" + "é" is 5 bytes, width 4 keeps "aé"
        assert_eq!(vec![b'a', 0xc3, 0xa9, 0], encode_to_width("aéé", 4, UTF_8));
        assert_eq!(b"abcd".to_vec(), encode_to_width("abcdef", 4, UTF_8));
    }

    #[test]
    fn all_nul_decodes_to_none() {
        assert_eq!(None, decode_fixed_string(&[0, 0, 0], WINDOWS_1252));
        assert_eq!(Some("ab".to_string()), decode_fixed_string(b"a\0b\0", WINDOWS_1252));
        assert_eq!(Some("   ".to_string()), decode_fixed_string(b"   ", WINDOWS_1252));
    }
}
