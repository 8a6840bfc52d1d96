//! Encodes and decodes the body of one ".shp" record.
//!
//! Every body starts with a 4-byte shape type. A `NullShape` tag ends the
//! record; any other tag must match the file's declared type.

use crate::error::{Result, ShapefileError};
use crate::geo::Coordinate;
use super::buffer::{ByteBuffer, ByteReader};
use super::builder::{m_to_file, ShapeBuilder, NO_DATA_VALUE};
use super::range::{BoundingBox, Range};
use super::shape_type::ShapeType;

const BOUNDING_BOX_LENGTH: usize = 32;
const RANGE_LENGTH: usize = 16;
const XY_LENGTH: usize = 16;

/// Record body codec for one file-level shape type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeCodec {
    /// A file whose every record is a null shape.
    Null,
    Point(ShapeType),
    MultiPoint(ShapeType),
    /// PolyLine and Polygon share a layout.
    MultiPart(ShapeType),
}

impl ShapeCodec {
    pub fn new(shape_type: ShapeType) -> ShapeCodec {
        if shape_type.is_point() {
            ShapeCodec::Point(shape_type)
        } else if shape_type.is_multi_point() {
            ShapeCodec::MultiPoint(shape_type)
        } else if shape_type.is_multi_part() {
            ShapeCodec::MultiPart(shape_type)
        } else {
            ShapeCodec::Null
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match *self {
            ShapeCodec::Null => ShapeType::NullShape,
            ShapeCodec::Point(t) | ShapeCodec::MultiPoint(t) | ShapeCodec::MultiPart(t) => t,
        }
    }

    /// Decodes record number `record` (1-based, for error messages) into
    /// `shape`, which is cleared first.
    pub fn decode(&self, record: usize, r: &mut ByteReader, shape: &mut ShapeBuilder) -> Result<()> {
        shape.clear();

        let found = ShapeType::from_code(r.read_i32_le()?)?;
        if found == ShapeType::NullShape {
            return Ok(());
        }
        if found != self.shape_type() {
            return Err(ShapefileError::ShapeTypeMismatch {
                record,
                expected: self.shape_type(),
                found,
            });
        }

        match *self {
            ShapeCodec::Null => Ok(()),
            ShapeCodec::Point(t) => decode_point(t, r, shape),
            ShapeCodec::MultiPoint(t) => decode_multi_point(t, record, r, shape),
            ShapeCodec::MultiPart(t) => decode_multi_part(t, record, r, shape),
        }
    }

    /// Appends the body for `shape` to `buf` and returns the extent it
    /// covers (empty for a null shape).
    ///
    /// Counts and bounding boxes come from `shape`'s current contents. An
    /// empty point or multipoint, or a multi-part shape with no parts or
    /// fewer than two points, is written as a null shape.
    pub fn encode(&self, record: usize, shape: &ShapeBuilder, buf: &mut ByteBuffer) -> Result<BoundingBox> {
        let is_null = match *self {
            ShapeCodec::Null => true,
            ShapeCodec::Point(_) | ShapeCodec::MultiPoint(_) => shape.point_count() == 0,
            ShapeCodec::MultiPart(_) => shape.part_count() < 1 || shape.point_count() < 2,
        };

        if is_null {
            buf.write_i32_le(ShapeType::NullShape.code());
            return Ok(BoundingBox::default());
        }

        let t = self.shape_type();
        buf.write_i32_le(t.code());

        // a missing Z goes out as 0.0, so the range must cover it
        let mut extent = *shape.extent();
        if t.has_z() && shape.points().iter().any(|c| c.z.is_nan()) {
            extent.z.expand(0.0);
        }

        match *self {
            ShapeCodec::Null => {}
            ShapeCodec::Point(_) => {
                let c = shape.points()[0];
                buf.write_f64_le(c.x);
                buf.write_f64_le(c.y);
                if t.has_z() {
                    buf.write_f64_le(z_to_file(c.z));
                }
                if t.has_m() {
                    buf.write_f64_le(m_to_file(c.m));
                }
            }
            ShapeCodec::MultiPoint(_) => {
                write_xy_box(&extent, buf);
                buf.write_i32_le(shape.point_count() as i32);
                write_points(t, shape, &extent, buf);
            }
            ShapeCodec::MultiPart(_) => {
                check_parts(t, record, shape)?;
                write_xy_box(&extent, buf);
                buf.write_i32_le(shape.part_count() as i32);
                buf.write_i32_le(shape.point_count() as i32);
                for &offset in shape.parts() {
                    buf.write_i32_le(offset as i32);
                }
                write_points(t, shape, &extent, buf);
            }
        }

        Ok(extent)
    }
}

fn z_to_file(z: f64) -> f64 {
    if z.is_nan() { 0.0 } else { z }
}

fn decode_point(t: ShapeType, r: &mut ByteReader, shape: &mut ShapeBuilder) -> Result<()> {
    let x = r.read_f64_le()?;
    let y = r.read_f64_le()?;
    shape.add_point(Coordinate::new(x, y));
    if t.has_z() {
        let z = r.read_f64_le()?;
        shape.set_z(0, z);
    }
    // M is optional in PointZ records
    if t.has_m() && (!t.has_z() || r.remaining() >= 8) {
        let m = r.read_f64_le()?;
        shape.set_m(0, m);
    }
    Ok(())
}

/// Validates a point count against what is left in the record, so a bogus
/// count fails before anything is allocated.
fn read_count(r: &mut ByteReader, record: usize, what: &str, width: usize) -> Result<usize> {
    let n = r.read_i32_le()?;
    if n < 0 || (n as usize).saturating_mul(width) > r.remaining() {
        return Err(ShapefileError::Corrupted(format!(
            "record {} claims {} {}, but only {} bytes remain",
            record,
            n,
            what,
            r.remaining()
        )));
    }
    Ok(n as usize)
}

fn read_xy(r: &mut ByteReader, n: usize, shape: &mut ShapeBuilder) -> Result<()> {
    for _ in 0..n {
        let x = r.read_f64_le()?;
        let y = r.read_f64_le()?;
        shape.add_point(Coordinate::new(x, y));
    }
    Ok(())
}

/// Reads the Z block (always present for Z types) then the M block (optional
/// for Z types, required for M types).
fn read_z_m(t: ShapeType, r: &mut ByteReader, n: usize, shape: &mut ShapeBuilder) -> Result<()> {
    if t.has_z() {
        r.skip(RANGE_LENGTH)?;
        for i in 0..n {
            let z = r.read_f64_le()?;
            shape.set_z(i, z);
        }
    }
    if t.has_m() && (!t.has_z() || r.remaining() >= RANGE_LENGTH + 8 * n) {
        r.skip(RANGE_LENGTH)?;
        for i in 0..n {
            let m = r.read_f64_le()?;
            shape.set_m(i, m);
        }
    }
    Ok(())
}

fn decode_multi_point(t: ShapeType, record: usize, r: &mut ByteReader, shape: &mut ShapeBuilder) -> Result<()> {
    r.skip(BOUNDING_BOX_LENGTH)?;
    let n = read_count(r, record, "points", XY_LENGTH)?;
    read_xy(r, n, shape)?;
    read_z_m(t, r, n, shape)
}

fn decode_multi_part(t: ShapeType, record: usize, r: &mut ByteReader, shape: &mut ShapeBuilder) -> Result<()> {
    r.skip(BOUNDING_BOX_LENGTH)?;
    let n_parts = read_count(r, record, "parts", 4)?;
    let n_points = r.read_i32_le()?;
    if n_points < 0 || (n_points as usize).saturating_mul(XY_LENGTH) > r.remaining() {
        return Err(ShapefileError::Corrupted(format!(
            "record {} claims {} points, but only {} bytes remain",
            record,
            n_points,
            r.remaining()
        )));
    }
    let n_points = n_points as usize;

    if n_parts == 0 && n_points > 0 {
        return Err(ShapefileError::InvalidParts {
            record,
            reason: format!("{} points but no parts", n_points),
        });
    }

    let mut previous: Option<usize> = None;
    for i in 0..n_parts {
        let offset = r.read_i32_le()?;
        let valid = match previous {
            None => offset == 0,
            Some(p) => offset >= 0 && offset as usize > p,
        };
        if !valid || offset as usize >= n_points {
            return Err(ShapefileError::InvalidParts {
                record,
                reason: format!("part {} starts at point {} ({} points in total)", i, offset, n_points),
            });
        }
        previous = Some(offset as usize);
        shape.push_part_offset(offset as usize);
    }

    read_xy(r, n_points, shape)?;
    read_z_m(t, r, n_points, shape)
}

fn write_xy_box(extent: &BoundingBox, buf: &mut ByteBuffer) {
    let (x_min, x_max) = extent.x.or(0.0);
    let (y_min, y_max) = extent.y.or(0.0);
    buf.write_f64_le(x_min);
    buf.write_f64_le(y_min);
    buf.write_f64_le(x_max);
    buf.write_f64_le(y_max);
}

fn write_range(range: &Range, absent: f64, buf: &mut ByteBuffer) {
    let (min, max) = range.or(absent);
    buf.write_f64_le(min);
    buf.write_f64_le(max);
}

fn write_points(t: ShapeType, shape: &ShapeBuilder, extent: &BoundingBox, buf: &mut ByteBuffer) {
    for c in shape.points() {
        buf.write_f64_le(c.x);
        buf.write_f64_le(c.y);
    }
    if t.has_z() {
        write_range(&extent.z, 0.0, buf);
        for c in shape.points() {
            buf.write_f64_le(z_to_file(c.z));
        }
    }
    if t.has_m() {
        write_range(&extent.m, NO_DATA_VALUE, buf);
        for c in shape.points() {
            buf.write_f64_le(m_to_file(c.m));
        }
    }
}

fn check_parts(t: ShapeType, record: usize, shape: &ShapeBuilder) -> Result<()> {
    let parts = shape.parts();
    if parts[0] != 0 {
        return Err(ShapefileError::InvalidParts {
            record,
            reason: format!("first part starts at point {}", parts[0]),
        });
    }
    for (i, pair) in parts.windows(2).enumerate() {
        if pair[1] <= pair[0] || pair[1] >= shape.point_count() {
            return Err(ShapefileError::InvalidParts {
                record,
                reason: format!("part {} starts at {} after a part starting at {}", i + 1, pair[1], pair[0]),
            });
        }
    }

    // lines need 2 points per part, rings 3
    let min_points = t.min_part_points();
    for i in 0..shape.part_count() {
        let n = shape.part_range(i).len();
        if n < min_points {
            return Err(ShapefileError::InvalidParts {
                record,
                reason: format!("part {} has {} points, needs at least {}", i, n, min_points),
            });
        }
    }
    Ok(())
}
