//! The small geometry model the codec produces and consumes.
//!
//! Readers hand out these types; writers accept them. Nothing here knows
//! about bytes.

use std::fmt;
use itertools::Itertools;

/// X, Y, Z and M ordinates. A missing Z or M is NaN.
///
/// Equality treats two NaN ordinates as equal, so a coordinate read back from
/// a file compares equal to the one that was written.
#[derive(Clone, Copy, Debug)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

fn same(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Coordinate) -> bool {
        same(self.x, other.x) && same(self.y, other.y) && same(self.z, other.z) && same(self.m, other.m)
    }
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Coordinate {
        Coordinate { x, y, z: f64::NAN, m: f64::NAN }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Coordinate {
        Coordinate { x, y, z, m: f64::NAN }
    }

    pub fn xym(x: f64, y: f64, m: f64) -> Coordinate {
        Coordinate { x, y, z: f64::NAN, m }
    }

    pub fn xyzm(x: f64, y: f64, z: f64, m: f64) -> Coordinate {
        Coordinate { x, y, z, m }
    }

    pub fn equals_2d(&self, other: &Coordinate) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{}", self.x, self.y)?;
        if !self.z.is_nan() {
            write!(f, ",z={}", self.z)?;
        }
        if !self.m.is_nan() {
            write!(f, ",m={}", self.m)?;
        }
        write!(f, ")")
    }
}

/// 2D axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn of<'a, T: IntoIterator<Item = &'a Coordinate>>(coordinates: T) -> Envelope {
        let mut env = Envelope {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for c in coordinates {
            env.min_x = env.min_x.min(c.x);
            env.min_y = env.min_y.min(c.y);
            env.max_x = env.max_x.max(c.x);
            env.max_y = env.max_y.max(c.y);
        }
        env
    }

    /// True iff `other` lies entirely within (or on the edge of) `self`.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, c: &Coordinate) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// Returns 2*area, positive iff the ring is clockwise.
///
/// Assumes Y grows northwards, as it does in every shapefile.
///
/// Assumes the first and last Coordinates are identical.
pub fn signed_area2<'a, T: IntoIterator<Item = &'a Coordinate>>(coordinates: T) -> f64 {
    // https://en.wikipedia.org/wiki/Shoelace_formula
    let mut a = 0.0;

    for (p1, p2) in coordinates.into_iter().tuple_windows() {
        a += p2.x * p1.y - p1.x * p2.y;
    }

    a
}

/// A zero-area ring is considered to be Clockwise.
pub fn winding_order<'a, T: IntoIterator<Item = &'a Coordinate>>(coordinates: T) -> WindingOrder {
    if signed_area2(coordinates) >= 0.0 {
        WindingOrder::Clockwise
    } else {
        WindingOrder::CounterClockwise
    }
}

/// Where a point lies relative to a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingLocation {
    Inside,
    OnBoundary,
    Outside,
}

/// Crossing-number point-in-ring test.
///
/// Assumes the first and last Coordinates are identical.
pub fn locate_in_ring(point: &Coordinate, ring: &[Coordinate]) -> RingLocation {
    let mut inside = false;

    for (a, b) in ring.iter().tuple_windows() {
        // on-boundary: collinear and within the segment's box
        let cross = (b.x - a.x) * (point.y - a.y) - (point.x - a.x) * (b.y - a.y);
        if cross == 0.0
            && point.x >= a.x.min(b.x)
            && point.x <= a.x.max(b.x)
            && point.y >= a.y.min(b.y)
            && point.y <= a.y.max(b.y)
        {
            return RingLocation::OnBoundary;
        }

        if (a.y > point.y) != (b.y > point.y) {
            let x_at = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_at {
                inside = !inside;
            }
        }
    }

    if inside { RingLocation::Inside } else { RingLocation::Outside }
}

/// An ordered run of coordinates. When it is a polygon ring, the first and
/// last coordinates are identical.
#[derive(Clone, Debug, PartialEq)]
pub struct LineString(pub Vec<Coordinate>);

impl LineString {
    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => self.0.len() > 1 && first.equals_2d(last),
            _ => false,
        }
    }

    pub fn envelope(&self) -> Envelope {
        Envelope::of(self.0.iter())
    }

    pub fn signed_area2(&self) -> f64 {
        signed_area2(self.0.iter())
    }

    pub fn area(&self) -> f64 {
        self.signed_area2().abs() / 2.0
    }

    pub fn winding_order(&self) -> WindingOrder {
        winding_order(self.0.iter())
    }

    pub fn locate(&self, point: &Coordinate) -> RingLocation {
        locate_in_ring(point, &self.0)
    }

    pub fn reverse(&mut self) {
        self.0.reverse();
    }
}

impl fmt::Display for LineString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "]")
    }
}

/// A shell with zero or more holes.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub exterior: LineString,
    pub interiors: Vec<LineString>,
}

impl Polygon {
    pub fn new(exterior: LineString, interiors: Vec<LineString>) -> Polygon {
        Polygon { exterior, interiors }
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Polygon(outer:{}, inner:[", self.exterior)?;
        for (i, ring) in self.interiors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ring)?;
        }
        write!(f, "])")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    MultiPoint(Vec<Coordinate>),
    LineString(LineString),
    MultiLineString(Vec<LineString>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn name(&self) -> &'static str {
        match *self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Geometry::Point(c) => write!(f, "Point{}", c),
            Geometry::MultiPoint(cs) => write!(f, "MultiPoint{}", LineString(cs.clone())),
            Geometry::LineString(l) => write!(f, "LineString{}", l),
            Geometry::MultiLineString(ls) => {
                write!(f, "MultiLineString(")?;
                for (i, l) in ls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", l)?;
                }
                write!(f, ")")
            }
            Geometry::Polygon(p) => write!(f, "{}", p),
            Geometry::MultiPolygon(ps) => {
                write!(f, "MultiPolygon(")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// How X and Y are snapped when a reader builds coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrecisionModel {
    Floating,
    /// Ordinates are rounded to multiples of `1 / scale`.
    Fixed { scale: f64 },
}

impl PrecisionModel {
    pub fn make_precise(&self, value: f64) -> f64 {
        match *self {
            PrecisionModel::Floating => value,
            PrecisionModel::Fixed { scale } => {
                if value.is_nan() {
                    value
                } else {
                    (value * scale).round() / scale
                }
            }
        }
    }
}

/// Builds output geometry from decoded coordinates.
///
/// Passed to readers through their options rather than held globally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryFactory {
    pub precision: PrecisionModel,
}

impl Default for GeometryFactory {
    fn default() -> GeometryFactory {
        GeometryFactory { precision: PrecisionModel::Floating }
    }
}

impl GeometryFactory {
    pub fn fixed(scale: f64) -> GeometryFactory {
        GeometryFactory { precision: PrecisionModel::Fixed { scale } }
    }

    pub fn coordinate(&self, c: &Coordinate) -> Coordinate {
        Coordinate {
            x: self.precision.make_precise(c.x),
            y: self.precision.make_precise(c.y),
            z: c.z,
            m: c.m,
        }
    }

    pub fn line_string(&self, coordinates: &[Coordinate]) -> LineString {
        LineString(coordinates.iter().map(|c| self.coordinate(c)).collect())
    }

    /// Builds a closed ring, appending the first coordinate when the run is
    /// not already closed.
    pub fn ring(&self, coordinates: &[Coordinate]) -> LineString {
        let mut ring = self.line_string(coordinates);
        if !ring.is_closed() {
            if let Some(&first) = ring.0.first() {
                ring.0.push(first);
            }
        }
        ring
    }
}
