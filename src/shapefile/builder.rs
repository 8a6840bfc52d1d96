use std::ops;

use crate::error::{Result, ShapefileError};
use crate::geo::{Coordinate, Geometry, GeometryFactory, LineString, WindingOrder};
use super::range::BoundingBox;
use super::rings::{self, RingStrategy};
use super::shape_type::ShapeType;

/// M values below this are "no data".
pub const NO_DATA_THRESHOLD: f64 = -1.0e38;

/// What a missing M is written as.
pub const NO_DATA_VALUE: f64 = -1.0e39;

/// Normalizes a decoded M: anything below the no-data threshold is NaN.
pub fn m_from_file(m: f64) -> f64 {
    if m < NO_DATA_THRESHOLD { f64::NAN } else { m }
}

pub fn m_to_file(m: f64) -> f64 {
    if m.is_nan() || m < NO_DATA_THRESHOLD { NO_DATA_VALUE } else { m }
}

/// Points and part offsets of one shape record.
///
/// Readers and writers keep one of these and overwrite it on every record, so
/// `clear()` keeps the allocations around.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeBuilder {
    points: Vec<Coordinate>,
    parts: Vec<usize>,
    extent: BoundingBox,
}

impl ShapeBuilder {
    pub fn new() -> ShapeBuilder {
        ShapeBuilder::default()
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Offset of each part's first point.
    pub fn parts(&self) -> &[usize] {
        &self.parts
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Begins a new part at the current point count.
    ///
    /// Calling this twice without adding a point in between opens only one
    /// part.
    pub fn start_new_part(&mut self) {
        if self.parts.last() == Some(&self.points.len()) {
            return;
        }
        self.parts.push(self.points.len());
    }

    pub fn add_point(&mut self, c: Coordinate) {
        self.extent.x.expand(c.x);
        self.extent.y.expand(c.y);
        self.extent.z.expand(c.z);
        if !(c.m < NO_DATA_THRESHOLD) {
            self.extent.m.expand(c.m);
        }
        self.points.push(c);
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.parts.clear();
        self.extent.clear();
    }

    /// Overwrites `self` with `other`, reusing `self`'s storage.
    pub fn copy_from(&mut self, other: &ShapeBuilder) {
        self.points.clear();
        self.points.extend_from_slice(&other.points);
        self.parts.clear();
        self.parts.extend_from_slice(&other.parts);
        self.extent = other.extent;
    }

    /// Point index range of part `i`.
    pub fn part_range(&self, i: usize) -> ops::Range<usize> {
        let start = self.parts[i];
        let end = self.parts.get(i + 1).cloned().unwrap_or(self.points.len());
        start..end
    }

    pub fn part(&self, i: usize) -> &[Coordinate] {
        &self.points[self.part_range(i)]
    }

    pub(crate) fn push_part_offset(&mut self, offset: usize) {
        self.parts.push(offset);
    }

    pub(crate) fn set_z(&mut self, i: usize, z: f64) {
        self.points[i].z = z;
        self.extent.z.expand(z);
    }

    pub(crate) fn set_m(&mut self, i: usize, m: f64) {
        let m = m_from_file(m);
        self.points[i].m = m;
        self.extent.m.expand(m);
    }

    /// Loads `geometry` (or a null shape for `None`) in the layout
    /// `shape_type` expects.
    ///
    /// Polygon rings are closed, and reoriented so shells run clockwise and
    /// holes counter-clockwise.
    pub fn set_geometry(&mut self, geometry: Option<&Geometry>, shape_type: ShapeType) -> Result<()> {
        self.clear();

        let geometry = match geometry {
            None => return Ok(()),
            Some(g) => g,
        };

        let unsupported = || ShapefileError::UnsupportedGeometry {
            shape_type,
            geometry: geometry.name(),
        };

        if shape_type.is_point() {
            match geometry {
                Geometry::Point(c) => self.add_point(*c),
                _ => return Err(unsupported()),
            }
        } else if shape_type.is_multi_point() {
            match geometry {
                Geometry::Point(c) => self.add_point(*c),
                Geometry::MultiPoint(cs) => {
                    for c in cs {
                        self.add_point(*c);
                    }
                }
                _ => return Err(unsupported()),
            }
        } else if shape_type.is_poly_line() {
            match geometry {
                Geometry::LineString(l) => self.add_part(&l.0),
                Geometry::MultiLineString(ls) => {
                    for l in ls {
                        self.add_part(&l.0);
                    }
                }
                _ => return Err(unsupported()),
            }
        } else if shape_type.is_polygon() {
            match geometry {
                Geometry::Polygon(p) => self.add_polygon(&p.exterior, &p.interiors),
                Geometry::MultiPolygon(ps) => {
                    for p in ps {
                        self.add_polygon(&p.exterior, &p.interiors);
                    }
                }
                _ => return Err(unsupported()),
            }
        } else {
            return Err(unsupported());
        }

        Ok(())
    }

    fn add_part(&mut self, coordinates: &[Coordinate]) {
        if coordinates.is_empty() {
            return;
        }
        self.start_new_part();
        for c in coordinates {
            self.add_point(*c);
        }
    }

    fn add_ring(&mut self, ring: &LineString, order: WindingOrder) {
        let mut ring = GeometryFactory::default().ring(&ring.0);
        if ring.0.len() > 1 && ring.winding_order() != order {
            ring.reverse();
        }
        self.add_part(&ring.0);
    }

    fn add_polygon(&mut self, exterior: &LineString, interiors: &[LineString]) {
        self.add_ring(exterior, WindingOrder::Clockwise);
        for hole in interiors {
            self.add_ring(hole, WindingOrder::CounterClockwise);
        }
    }

    /// Builds output geometry from the current contents. A null shape is
    /// `None`.
    ///
    /// `record` is only used in error messages.
    pub fn to_geometry(
        &self,
        shape_type: ShapeType,
        record: usize,
        strategy: RingStrategy,
        factory: &GeometryFactory,
    ) -> Result<Option<Geometry>> {
        if self.points.is_empty() {
            return Ok(None);
        }

        if shape_type.is_point() {
            return Ok(Some(Geometry::Point(factory.coordinate(&self.points[0]))));
        }

        if shape_type.is_multi_point() {
            let points = self.points.iter().map(|c| factory.coordinate(c)).collect();
            return Ok(Some(Geometry::MultiPoint(points)));
        }

        let min_points = shape_type.min_part_points();
        for i in 0..self.parts.len() {
            let n = self.part_range(i).len();
            if n < min_points {
                return Err(ShapefileError::InvalidParts {
                    record,
                    reason: format!("part {} has {} points, needs at least {}", i, n, min_points),
                });
            }
        }

        if shape_type.is_poly_line() {
            let mut lines: Vec<LineString> = (0..self.parts.len())
                .map(|i| factory.line_string(self.part(i)))
                .collect();
            return Ok(Some(if lines.len() == 1 {
                Geometry::LineString(lines.remove(0))
            } else {
                Geometry::MultiLineString(lines)
            }));
        }

        let rings: Vec<LineString> = (0..self.parts.len())
            .map(|i| factory.ring(self.part(i)))
            .collect();
        let mut polygons = rings::assemble(rings, strategy)?;
        Ok(match polygons.len() {
            0 => None,
            1 => Some(Geometry::Polygon(polygons.remove(0))),
            _ => Some(Geometry::MultiPolygon(polygons)),
        })
    }
}
