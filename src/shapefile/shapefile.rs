use std::io::{Read, Seek, Write};

use crate::error::{Result, ShapefileError};
use crate::geo::Geometry;
use super::builder::ShapeBuilder;
use super::dbf::{Attributes, DbfField, DbfReader, DbfValue, DbfWriter, RowStatus};
use super::options::{ReaderOptions, WriterOptions};
use super::shape_type::ShapeType;
use super::shp::{ShpReader, ShpWriter};

/// One record: geometry (`None` for a null shape) plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub attributes: Attributes,
}

/// One record as the readers hold it. Valid until the next read.
#[derive(Debug)]
pub struct RecordView<'a> {
    /// 1-based ".shp" record number.
    pub number: usize,
    pub shape: &'a ShapeBuilder,
    pub fields: &'a [DbfField],
}

/// Reads ".shp" and ".dbf" records simultaneously.
///
/// Records pair up by position. A row deleted from the ".dbf" drops the
/// ".shp" record beside it, too.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use shpcodec::geo::{Coordinate, Geometry};
/// use shpcodec::shapefile::dbf::{DbfField, DbfValue};
/// use shpcodec::shapefile::{ReaderOptions, ShapeType, ShapefileReader, ShapefileWriter, WriterOptions};
///
/// let mut shp = Cursor::new(Vec::new());
/// let mut shx = Cursor::new(Vec::new());
/// let mut dbf = Cursor::new(Vec::new());
/// {
///     let fields = vec![DbfField::character("NAME", 5).unwrap()];
///     let mut writer = ShapefileWriter::new(
///         &mut shp, &mut shx, &mut dbf,
///         ShapeType::Point, fields, WriterOptions::default(),
///     ).unwrap();
///     let point = Geometry::Point(Coordinate::new(10.5, 20.25));
///     writer.write(Some(&point), &["abc".into()]).unwrap();
///     writer.close().unwrap();
/// }
///
/// shp.set_position(0);
/// dbf.set_position(0);
/// let mut reader = ShapefileReader::new(shp, dbf, ReaderOptions::default()).unwrap();
/// let feature = reader.read().unwrap().unwrap();
/// assert_eq!(Some(Geometry::Point(Coordinate::new(10.5, 20.25))), feature.geometry);
/// assert_eq!(Some(&DbfValue::from("abc")), feature.attributes.get("name"));
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct ShapefileReader<R: Read + Seek> {
    shp: ShpReader<R>,
    dbf: DbfReader<R>,
    options: ReaderOptions,
    projection: Option<String>,
}

impl<R: Read + Seek> ShapefileReader<R> {
    /// Reads from a ".shp" stream and a ".dbf" stream, without an index.
    pub fn new(shp: R, dbf: R, options: ReaderOptions) -> Result<ShapefileReader<R>> {
        let shp = ShpReader::new(shp)?;
        let dbf = DbfReader::new(dbf, options.encoding, None)?;
        ShapefileReader::from_parts(shp, dbf, options, None)
    }

    /// Reads from ".shp", ".shx" and ".dbf" streams.
    pub fn with_index(shp: R, shx: R, dbf: R, options: ReaderOptions) -> Result<ShapefileReader<R>> {
        let shp = ShpReader::with_index(shp, shx)?;
        let dbf = DbfReader::new(dbf, options.encoding, None)?;
        ShapefileReader::from_parts(shp, dbf, options, None)
    }

    /// Pairs readers that are already open. Validates the index first when
    /// the options ask for it.
    pub fn from_parts(
        mut shp: ShpReader<R>,
        dbf: DbfReader<R>,
        options: ReaderOptions,
        projection: Option<String>,
    ) -> Result<ShapefileReader<R>> {
        if options.validate_index {
            shp.validate()?;
        }
        if let Some(n) = shp.record_count() {
            if n != dbf.record_count() {
                tracing::warn!(shx = n, dbf = dbf.record_count(), "'.shx' and '.dbf' disagree on the record count");
            }
        }

        Ok(ShapefileReader { shp, dbf, options, projection })
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shp.shape_type()
    }

    pub fn shp(&self) -> &ShpReader<R> {
        &self.shp
    }

    pub fn dbf(&self) -> &DbfReader<R> {
        &self.dbf
    }

    pub fn fields(&self) -> &[DbfField] {
        self.dbf.fields()
    }

    pub fn get_field(&self, name: &str) -> Option<&DbfField> {
        self.dbf.get_field(name)
    }

    /// Contents of the ".prj" sidecar, when there was one.
    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Advances both files to the next live record, without building
    /// geometry.
    pub fn read_record(&mut self) -> Result<Option<RecordView>> {
        loop {
            let has_shape = self.shp.read_shape()?.is_some();
            match (has_shape, self.dbf.read_row()?) {
                (false, None) => return Ok(None),
                (true, None) => {
                    return Err(ShapefileError::RecordCountMismatch(
                        "'.shp' file has more records than '.dbf' file".to_string(),
                    ))
                }
                (false, Some(_)) => {
                    return Err(ShapefileError::RecordCountMismatch(
                        "'.dbf' file has more records than '.shp' file".to_string(),
                    ))
                }
                (true, Some(RowStatus::Deleted)) => {
                    tracing::trace!(record = self.shp.record_number(), "Skipping deleted record");
                }
                (true, Some(RowStatus::Active)) => break,
            }
        }

        Ok(Some(RecordView {
            number: self.shp.record_number(),
            shape: self.shp.shape(),
            fields: self.dbf.fields(),
        }))
    }

    /// Reads the next live record.
    pub fn read(&mut self) -> Result<Option<Feature>> {
        let shape_type = self.shp.shape_type();
        let strategy = self.options.ring_strategy;
        let factory = self.options.factory;

        match self.read_record()? {
            None => Ok(None),
            Some(view) => Ok(Some(Feature {
                geometry: view.shape.to_geometry(shape_type, view.number, strategy, &factory)?,
                attributes: Attributes::from_fields(view.fields),
            })),
        }
    }

    /// Reads record `i` (0-based) through the ".shx" index. A deleted record
    /// reads as `None`, as does one past the end.
    ///
    /// Sequential reading continues from the record after `i`.
    pub fn feature_at(&mut self, i: usize) -> Result<Option<Feature>> {
        let shape_type = self.shp.shape_type();
        let geometry = match self.shp.read_at(i)? {
            None => return Ok(None),
            Some(shape) => shape.to_geometry(shape_type, i + 1, self.options.ring_strategy, &self.options.factory)?,
        };

        if i >= self.dbf.record_count() {
            return Err(ShapefileError::RecordCountMismatch(format!(
                "'.shp' record {} has no '.dbf' row; the '.dbf' file has {}",
                i + 1,
                self.dbf.record_count()
            )));
        }
        self.dbf.seek_row(i)?;
        match self.dbf.read_row()? {
            Some(RowStatus::Active) => Ok(Some(Feature { geometry, attributes: self.dbf.attributes() })),
            _ => Ok(None),
        }
    }

    /// Rewinds both files to the first record.
    pub fn restart(&mut self) -> Result<()> {
        self.shp.restart()?;
        self.dbf.restart()
    }

    /// Reads every remaining live record.
    pub fn read_all(&mut self) -> Result<Vec<Feature>> {
        let mut ret = vec![];
        while let Some(feature) = self.read()? {
            ret.push(feature);
        }
        Ok(ret)
    }
}

impl<R: Read + Seek> Iterator for ShapefileReader<R> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

/// Writes ".shp", ".shx" and ".dbf" files in step.
pub struct ShapefileWriter<W: Write + Seek> {
    shp: ShpWriter<W>,
    dbf: DbfWriter<W>,
    shape: ShapeBuilder,
}

impl<W: Write + Seek> ShapefileWriter<W> {
    pub fn new(
        shp: W,
        shx: W,
        dbf: W,
        shape_type: ShapeType,
        fields: Vec<DbfField>,
        options: WriterOptions,
    ) -> Result<ShapefileWriter<W>> {
        let dbf = DbfWriter::new(dbf, fields, options.encoding)?;
        let shp = ShpWriter::new(shp, shx, shape_type)?;
        Ok(ShapefileWriter { shp, dbf, shape: ShapeBuilder::new() })
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shp.shape_type()
    }

    pub fn fields(&self) -> &[DbfField] {
        self.dbf.fields()
    }

    pub fn record_count(&self) -> usize {
        self.shp.record_count()
    }

    /// Appends one record. On error nothing is written.
    pub fn write(&mut self, geometry: Option<&Geometry>, values: &[DbfValue]) -> Result<()> {
        self.shape.set_geometry(geometry, self.shp.shape_type())?;
        self.dbf.check(values)?;
        self.shp.write_shape(&self.shape)?;
        self.dbf.write(values)
    }

    /// Appends one record from a shape built by hand. On error nothing is
    /// written.
    pub fn write_shape(&mut self, shape: &ShapeBuilder, values: &[DbfValue]) -> Result<()> {
        self.dbf.check(values)?;
        self.shp.write_shape(shape)?;
        self.dbf.write(values)
    }

    /// Patches every header and flushes. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        let shp = self.shp.close();
        let dbf = self.dbf.close();
        shp.and(dbf)
    }
}
