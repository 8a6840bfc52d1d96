//! Reads and writes ESRI Shapefiles: ".shp" geometry, its ".shx" index and
//! the ".dbf" attribute table, plus the ".cpg" and ".prj" sidecars.
//!
//! Geometry is laid out as per
//! https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf and attributes
//! as per https://www.clicketyclick.dk/databases/xbase/format/dbf.html
//!
//! The projection is not interpreted. When there's a ".prj" file its text is
//! handed back untouched through `ShapefileReader::projection()`, and points
//! come out as plain `f64` ordinates.
//!
//! # Examples
//!
//! Write, then read back by ".shp" filename:
//!
//! ```
//! use shpcodec::geo::{Coordinate, Geometry};
//! use shpcodec::shapefile::{self, ReaderOptions, ShapeType, WriterOptions};
//! use shpcodec::shapefile::dbf::DbfField;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("places.shp");
//!
//! let fields = vec![DbfField::character("NAME", 20).unwrap()];
//! let mut writer = shapefile::create(&path, ShapeType::Point, fields, WriterOptions::default(), None).unwrap();
//! writer.write(Some(&Geometry::Point(Coordinate::new(1., 2.))), &["home".into()]).unwrap();
//! writer.close().unwrap();
//!
//! let reader = shapefile::open(&path, ReaderOptions::default()).unwrap();
//! for feature in reader {
//!     // feature is a Result<Feature, ShapefileError>
//!     println!("{:?}", feature.unwrap());
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, ShapefileError};

pub mod buffer;
pub mod builder;
pub mod dbf;
pub mod header;
pub mod options;
pub mod range;
pub mod record;
pub mod rings;
pub mod shape_type;
pub mod shapefile;
pub mod shp;

pub use self::builder::ShapeBuilder;
pub use self::dbf::{Attributes, DbfField, DbfReader, DbfValue, DbfWriter, FieldType};
pub use self::header::{IndexEntry, ShpHeader};
pub use self::options::{ReaderOptions, WriterOptions};
pub use self::range::{BoundingBox, Range};
pub use self::rings::RingStrategy;
pub use self::shape_type::ShapeType;
pub use self::shapefile::{Feature, RecordView, ShapefileReader, ShapefileWriter};
pub use self::shp::{ShpReader, ShpWriter};

/// Reads a sidecar file as text. A missing file is `None`.
fn read_sidecar(path: &Path, extension: &str) -> Result<Option<String>> {
    let path = path.with_extension(extension);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(ref err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn open_file(path: &Path, extension: &str) -> Result<io::BufReader<fs::File>> {
    Ok(io::BufReader::new(fs::File::open(path.with_extension(extension))?))
}

fn create_file(path: &Path, extension: &str) -> Result<io::BufWriter<fs::File>> {
    Ok(io::BufWriter::new(fs::File::create(path.with_extension(extension))?))
}

/// Opens by ".shp" filename.
///
/// The ".dbf" must exist beside it. The ".shx", ".cpg" and ".prj" files are
/// picked up when present; without a ".shx", `feature_at()` and index
/// validation are unavailable.
pub fn open(shp_path: &Path, options: ReaderOptions) -> Result<ShapefileReader<io::BufReader<fs::File>>> {
    let shp_file = open_file(shp_path, "shp")?;
    let shp = match open_file(shp_path, "shx") {
        Ok(shx_file) => ShpReader::with_index(shp_file, shx_file)?,
        Err(ShapefileError::Io(ref err)) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %shp_path.display(), "No '.shx' file");
            ShpReader::new(shp_file)?
        }
        Err(err) => return Err(err),
    };

    let cpg = read_sidecar(shp_path, "cpg")?;
    let dbf = DbfReader::new(open_file(shp_path, "dbf")?, options.encoding, cpg.as_deref())?;
    let projection = read_sidecar(shp_path, "prj")?;

    ShapefileReader::from_parts(shp, dbf, options, projection)
}

/// Creates ".shp", ".shx" and ".dbf" files named after `shp_path`, plus a
/// ".cpg" (unless the options say otherwise) and, given a `projection`, a
/// ".prj".
pub fn create(
    shp_path: &Path,
    shape_type: ShapeType,
    fields: Vec<DbfField>,
    options: WriterOptions,
    projection: Option<&str>,
) -> Result<ShapefileWriter<io::BufWriter<fs::File>>> {
    if options.write_cpg {
        fs::write(shp_path.with_extension("cpg"), dbf::encoding::cpg_name(options.encoding))?;
    }
    if let Some(projection) = projection {
        fs::write(shp_path.with_extension("prj"), projection)?;
    }

    ShapefileWriter::new(
        create_file(shp_path, "shp")?,
        create_file(shp_path, "shx")?,
        create_file(shp_path, "dbf")?,
        shape_type,
        fields,
        options,
    )
}
