use std::fmt;

use crate::error::{Result, ShapefileError};

/// Shape type codes, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// MultiPatch (31) is not supported and is rejected as an unknown code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShapeType {
    NullShape,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Result<ShapeType> {
        match code {
            0 => Ok(ShapeType::NullShape),
            1 => Ok(ShapeType::Point),
            3 => Ok(ShapeType::PolyLine),
            5 => Ok(ShapeType::Polygon),
            8 => Ok(ShapeType::MultiPoint),
            11 => Ok(ShapeType::PointZ),
            13 => Ok(ShapeType::PolyLineZ),
            15 => Ok(ShapeType::PolygonZ),
            18 => Ok(ShapeType::MultiPointZ),
            21 => Ok(ShapeType::PointM),
            23 => Ok(ShapeType::PolyLineM),
            25 => Ok(ShapeType::PolygonM),
            28 => Ok(ShapeType::MultiPointM),
            _ => Err(ShapefileError::UnknownShapeType(code)),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ShapeType::NullShape => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
        }
    }

    /// Z types always carry M as well.
    pub fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ | ShapeType::MultiPointZ
        )
    }

    pub fn has_m(self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM | ShapeType::PolyLineM | ShapeType::PolygonM | ShapeType::MultiPointM
            )
    }

    pub fn is_point(self) -> bool {
        matches!(self, ShapeType::Point | ShapeType::PointZ | ShapeType::PointM)
    }

    pub fn is_multi_point(self) -> bool {
        matches!(self, ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM)
    }

    pub fn is_poly_line(self) -> bool {
        matches!(self, ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM)
    }

    pub fn is_polygon(self) -> bool {
        matches!(self, ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM)
    }

    pub fn is_multi_part(self) -> bool {
        self.is_poly_line() || self.is_polygon()
    }

    /// Fewest points a part may hold: 3 for a ring (closing point included),
    /// 2 for a line.
    pub fn min_part_points(self) -> usize {
        if self.is_polygon() { 3 } else { 2 }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
