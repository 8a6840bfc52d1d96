//! Reads and writes ESRI Shapefiles.
//!
//! `shapefile` holds the file codecs; `geo` holds the geometry they produce
//! and consume.

#[macro_use] extern crate lazy_static;

pub mod error;
pub mod geo;
pub mod shapefile;

pub use error::{ErrorCategory, Result, ShapefileError};
pub use shapefile::{open, create, Feature, ReaderOptions, ShapefileReader, ShapefileWriter, WriterOptions};
