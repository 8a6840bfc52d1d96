//! Errors raised while reading or writing shapefiles.

use std::io;
use thiserror::Error;

use crate::shapefile::ShapeType;

/// Broad classes of failure.
///
/// `Io`, `Format` and `Structure` errors leave a stream in an unknown
/// position, so a reader or writer that returned one should be abandoned.
/// `Semantic` and `Geometry` errors concern a single record; the caller may
/// skip that record and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Format,
    Structure,
    Semantic,
    Geometry,
}

#[derive(Error, Debug)]
pub enum ShapefileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The 4-byte big-endian file code was not 9994.
    #[error("File has wrong magic number: found {0}, expected 9994")]
    InvalidFileCode(i32),

    #[error("File has wrong version: found {0}, expected 1000")]
    InvalidVersion(i32),

    #[error("File has nonexistent shape type {0}")]
    UnknownShapeType(i32),

    #[error("Read of {width} bytes at position {position} overruns a {len}-byte buffer")]
    OutOfRange { position: usize, width: usize, len: usize },

    /// One of the paired streams ended before the other.
    #[error("Record count mismatch: {0}")]
    RecordCountMismatch(String),

    /// The `.shx` index disagrees with the `.shp` file.
    #[error("Index entry {record} is inconsistent with the '.shp' file: {reason}")]
    IndexMismatch { record: usize, reason: String },

    #[error("Record {record} has invalid part offsets: {reason}")]
    InvalidParts { record: usize, reason: String },

    #[error("Corrupted file: {0}")]
    Corrupted(String),

    #[error("Record {record} has shape type {found}, but the file declares {expected}")]
    ShapeTypeMismatch {
        record: usize,
        expected: ShapeType,
        found: ShapeType,
    },

    #[error("Cannot write a {geometry} through a {shape_type} writer")]
    UnsupportedGeometry {
        shape_type: ShapeType,
        geometry: &'static str,
    },

    #[error("Invalid field definition '{name}': {reason}")]
    InvalidField { name: String, reason: String },

    #[error("Value for field '{name}' does not fit: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Polygon {polygon} has a hole nested directly inside another hole")]
    NestedHole { polygon: usize },

    /// Lengths and offsets are stored as signed 32-bit word counts.
    #[error("'.shp' file would grow past {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("No '.shx' index was supplied")]
    NoIndex,

    #[error("Writer is already closed")]
    Closed,
}

impl ShapefileError {
    pub fn category(&self) -> ErrorCategory {
        match *self {
            ShapefileError::Io(_) | ShapefileError::Closed => ErrorCategory::Io,
            ShapefileError::InvalidFileCode(_)
            | ShapefileError::InvalidVersion(_)
            | ShapefileError::UnknownShapeType(_) => ErrorCategory::Format,
            ShapefileError::OutOfRange { .. }
            | ShapefileError::RecordCountMismatch(_)
            | ShapefileError::IndexMismatch { .. }
            | ShapefileError::InvalidParts { .. }
            | ShapefileError::Corrupted(_) => ErrorCategory::Structure,
            ShapefileError::ShapeTypeMismatch { .. }
            | ShapefileError::UnsupportedGeometry { .. }
            | ShapefileError::InvalidField { .. }
            | ShapefileError::InvalidValue { .. }
            | ShapefileError::FileTooLarge { .. }
            | ShapefileError::NoIndex => ErrorCategory::Semantic,
            ShapefileError::NestedHole { .. } => ErrorCategory::Geometry,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Io | ErrorCategory::Format | ErrorCategory::Structure
        )
    }
}

pub type Result<T> = std::result::Result<T, ShapefileError>;
