use std::fs;
use std::io::Cursor;

use approx::assert_abs_diff_eq;
use encoding::all::UTF_8;

use shpcodec::geo::{self, Coordinate, Geometry, GeometryFactory, LineString, Polygon, WindingOrder};
use shpcodec::shapefile::dbf::encoding::EncodingSource;
use shpcodec::shapefile::dbf::{DbfField, DbfValue};
use shpcodec::shapefile::{
    self, ReaderOptions, RingStrategy, ShapeBuilder, ShapeType, ShapefileReader, ShapefileWriter, ShpReader,
    ShpWriter, WriterOptions,
};
use shpcodec::{ErrorCategory, ShapefileError};

type Files = (Cursor<Vec<u8>>, Cursor<Vec<u8>>, Cursor<Vec<u8>>);

fn write_in_memory(
    shape_type: ShapeType,
    fields: Vec<DbfField>,
    records: Vec<(Option<Geometry>, Vec<DbfValue>)>,
) -> Files {
    let mut shp = Cursor::new(Vec::new());
    let mut shx = Cursor::new(Vec::new());
    let mut dbf = Cursor::new(Vec::new());
    {
        let mut writer =
            ShapefileWriter::new(&mut shp, &mut shx, &mut dbf, shape_type, fields, WriterOptions::default()).unwrap();
        for (geometry, values) in records.iter() {
            writer.write(geometry.as_ref(), values).unwrap();
        }
        writer.close().unwrap();
    }
    shp.set_position(0);
    shx.set_position(0);
    dbf.set_position(0);
    (shp, shx, dbf)
}

fn read_in_memory((shp, shx, dbf): Files, options: ReaderOptions) -> ShapefileReader<Cursor<Vec<u8>>> {
    ShapefileReader::with_index(shp, shx, dbf, options).unwrap()
}

fn ring(coordinates: &[(f64, f64)]) -> LineString {
    LineString(coordinates.iter().map(|&(x, y)| Coordinate::new(x, y)).collect())
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> LineString {
    // clockwise
    ring(&[(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)])
}

#[test]
fn point_and_text_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("points.shp");

    let fields = vec![DbfField::character("NAME", 5).unwrap()];
    let mut writer = shapefile::create(
        &path,
        ShapeType::Point,
        fields,
        WriterOptions::default(),
        Some("GEOGCS[\"GCS_WGS_1984\"]"),
    )
    .unwrap();
    writer
        .write(Some(&Geometry::Point(Coordinate::new(10.5, 20.25))), &["abc".into()])
        .unwrap();
    writer.close().unwrap();
    drop(writer);

    let dbf = fs::read(path.with_extension("dbf")).unwrap();
    // header, one descriptor, terminator, deletion flag
    assert_eq!(b"abc  ", &dbf[32 + 32 + 1 + 1..32 + 32 + 1 + 6]);
    assert_eq!("windows-1252", fs::read_to_string(path.with_extension("cpg")).unwrap());
    assert_eq!(100 + 28, fs::metadata(path.with_extension("shp")).unwrap().len());
    assert_eq!(100 + 8, fs::metadata(path.with_extension("shx")).unwrap().len());

    let mut reader = shapefile::open(&path, ReaderOptions::default().with_validation(true)).unwrap();
    assert_eq!(Some("GEOGCS[\"GCS_WGS_1984\"]"), reader.projection());
    assert_eq!(EncodingSource::CodePageFile, reader.dbf().encoding_source());

    let feature = reader.read().unwrap().unwrap();
    assert_eq!(Some(Geometry::Point(Coordinate::new(10.5, 20.25))), feature.geometry);
    assert_eq!(Some(&DbfValue::from("abc")), feature.attributes.get("NAME"));
    assert!(reader.read().unwrap().is_none());
}

#[test]
fn counter_clockwise_lone_ring_is_a_shell() {
    let mut shp = Cursor::new(Vec::new());
    let mut shx = Cursor::new(Vec::new());
    {
        let mut writer = ShpWriter::new(&mut shp, &mut shx, ShapeType::Polygon).unwrap();
        let mut shape = ShapeBuilder::new();
        shape.start_new_part();
        for &(x, y) in &[(0., 0.), (10., 0.), (10., 10.), (0., 10.), (0., 0.)] {
            shape.add_point(Coordinate::new(x, y));
        }
        writer.write_shape(&shape).unwrap();
    }

    for &strategy in &[
        RingStrategy::Legacy,
        RingStrategy::Extended,
        RingStrategy::Sequential,
        RingStrategy::Polygonizer,
    ] {
        let mut reader = ShpReader::new(Cursor::new(shp.get_ref().clone())).unwrap();
        let shape = reader.read_shape().unwrap().unwrap();
        let geometry = shape
            .to_geometry(ShapeType::Polygon, 1, strategy, &GeometryFactory::default())
            .unwrap();
        match geometry {
            Some(Geometry::Polygon(polygon)) => {
                assert!(polygon.interiors.is_empty(), "{:?}", strategy);
                assert_eq!(WindingOrder::Clockwise, polygon.exterior.winding_order(), "{:?}", strategy);
                assert_abs_diff_eq!(100., polygon.exterior.area());
            }
            other => panic!("{:?}: expected one polygon, got {:?}", strategy, other),
        }
    }
}

#[test]
fn no_data_m_reads_as_nan() {
    let points = Geometry::MultiPoint(vec![
        Coordinate::xym(1., 2., -1.0e39),
        Coordinate::xym(3., 4., 5.),
        Coordinate::xym(5., 6., 7.),
    ]);
    let files = write_in_memory(
        ShapeType::MultiPointM,
        vec![DbfField::logical("OK").unwrap()],
        vec![(Some(points), vec![DbfValue::Logical(true)])],
    );
    let mut reader = read_in_memory(files, ReaderOptions::default());

    let header = *reader.shp().header();
    assert_eq!((5., 7.), header.bounding_box.m.or(0.));

    match reader.read().unwrap().unwrap().geometry {
        Some(Geometry::MultiPoint(points)) => {
            assert_eq!(3, points.len());
            assert!(points[0].m.is_nan());
            assert_eq!(5., points[1].m);
            assert_eq!(Coordinate::xym(3., 4., 5.), points[1]);
        }
        other => panic!("expected a multipoint, got {:?}", other),
    }
}

#[test]
fn bad_index_fails_before_any_feature() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.shp");
    {
        let mut writer = shapefile::create(
            &path,
            ShapeType::Point,
            vec![DbfField::numeric("ID", 3, 0).unwrap()],
            WriterOptions::default(),
            None,
        )
        .unwrap();
        for i in 0..3 {
            let point = Geometry::Point(Coordinate::new(i as f64, i as f64));
            writer.write(Some(&point), &[DbfValue::Integer(i)]).unwrap();
        }
    }

    let shx_path = path.with_extension("shx");
    let mut shx = fs::read(&shx_path).unwrap();
    // second entry's offset, in words
    shx[111] += 2;
    fs::write(&shx_path, &shx).unwrap();

    match shapefile::open(&path, ReaderOptions::default().with_validation(true)) {
        Err(err @ ShapefileError::IndexMismatch { record: 2, .. }) => {
            assert_eq!(ErrorCategory::Structure, err.category());
        }
        Err(err) => panic!("expected IndexMismatch, got {:?}", err),
        Ok(_) => panic!("expected IndexMismatch, got a reader"),
    }

    // Without validation, sequential reads do not consult the index
    let reader = shapefile::open(&path, ReaderOptions::default()).unwrap();
    assert_eq!(3, reader.count());
}

#[test]
fn header_extent_covers_every_record() {
    let lines = vec![
        Geometry::LineString(ring(&[(0., 0.), (5., 5.)])),
        Geometry::MultiLineString(vec![ring(&[(-3., 1.), (2., 8.)]), ring(&[(7., -2.), (6., 0.)])]),
    ];
    let files = write_in_memory(
        ShapeType::PolyLine,
        vec![DbfField::character("NAME", 4).unwrap()],
        lines.iter().map(|l| (Some(l.clone()), vec![DbfValue::Null])).collect(),
    );
    let mut shp = ShpReader::new(files.0).unwrap();
    let header = *shp.header();
    assert_eq!((-3., 7.), header.bounding_box.x.or(0.));
    assert_eq!((-2., 8.), header.bounding_box.y.or(0.));

    for shape in shp.read_all().unwrap() {
        let extent = shape.extent();
        assert!(header.bounding_box.x.min <= extent.x.min && extent.x.max <= header.bounding_box.x.max);
        assert!(header.bounding_box.y.min <= extent.y.min && extent.y.max <= header.bounding_box.y.max);
    }
}

#[test]
fn rings_are_reoriented_on_write() {
    let mut exterior = square(0., 0., 10., 10.);
    exterior.reverse();
    let hole = square(2., 2., 8., 8.);
    let polygon = Geometry::Polygon(Polygon::new(exterior, vec![hole]));

    let files = write_in_memory(
        ShapeType::Polygon,
        vec![DbfField::logical("OK").unwrap()],
        vec![(Some(polygon), vec![DbfValue::Null])],
    );
    let mut shp = ShpReader::new(files.0).unwrap();
    let shape = shp.read_shape().unwrap().unwrap();
    assert_eq!(2, shape.part_count());
    assert_eq!(WindingOrder::Clockwise, geo::winding_order(shape.part(0)));
    assert_eq!(WindingOrder::CounterClockwise, geo::winding_order(shape.part(1)));
}

#[test]
fn island_in_lake_nests_per_strategy() {
    let mut lake = square(2., 2., 8., 8.);
    lake.reverse();
    let land = Polygon::new(square(0., 0., 10., 10.), vec![lake]);
    let island = Polygon::new(square(4., 4., 6., 6.), vec![]);
    let geometry = Geometry::MultiPolygon(vec![land.clone(), island.clone()]);

    for &strategy in &[
        RingStrategy::Legacy,
        RingStrategy::Extended,
        RingStrategy::Sequential,
        RingStrategy::Polygonizer,
    ] {
        let files = write_in_memory(
            ShapeType::Polygon,
            vec![DbfField::logical("OK").unwrap()],
            vec![(Some(geometry.clone()), vec![DbfValue::Null])],
        );
        let mut reader = read_in_memory(files, ReaderOptions::default().with_ring_strategy(strategy));
        match reader.read().unwrap().unwrap().geometry {
            Some(Geometry::MultiPolygon(polygons)) => {
                assert_eq!(2, polygons.len(), "{:?}", strategy);
                let with_hole = polygons.iter().find(|p| p.interiors.len() == 1).unwrap();
                let without = polygons.iter().find(|p| p.interiors.is_empty()).unwrap();
                assert_abs_diff_eq!(100., with_hole.exterior.area());
                assert_abs_diff_eq!(36., with_hole.interiors[0].area());
                assert_abs_diff_eq!(4., without.exterior.area());
            }
            other => panic!("{:?}: expected two polygons, got {:?}", strategy, other),
        }
    }
}

#[test]
fn truncated_dbf_is_structural() {
    let (shp, shx, dbf) = write_in_memory(
        ShapeType::Point,
        vec![DbfField::numeric("ID", 4, 0).unwrap()],
        (0..3)
            .map(|i| (Some(Geometry::Point(Coordinate::new(0., 0.))), vec![DbfValue::Integer(i)]))
            .collect(),
    );
    let mut bytes = dbf.into_inner();
    // drop the third row and the end-of-file marker
    bytes.truncate(bytes.len() - 6);

    let mut reader = read_in_memory((shp, shx, Cursor::new(bytes)), ReaderOptions::default());
    assert!(reader.read().unwrap().is_some());
    assert!(reader.read().unwrap().is_some());
    let err = reader.read().unwrap_err();
    assert_eq!(ErrorCategory::Structure, err.category());
    assert!(err.is_fatal());
}

#[test]
fn z_and_m_survive_a_round_trip() {
    let line = Geometry::MultiLineString(vec![
        LineString(vec![Coordinate::xyzm(0., 0., 1., 10.), Coordinate::xyzm(1., 1., 2., f64::NAN)]),
        LineString(vec![
            Coordinate::xyzm(5., 5., 3., 30.),
            Coordinate::xyzm(6., 6., 4., 40.),
            Coordinate::xyzm(7., 5., 5., 50.),
        ]),
    ]);
    let point = Geometry::Point(Coordinate::xyzm(1.5, 2.5, 3.5, 4.5));

    let files = write_in_memory(
        ShapeType::PolyLineZ,
        vec![DbfField::float("LEN", 12, 3).unwrap()],
        vec![(Some(line.clone()), vec![DbfValue::Float(3.25)]), (None, vec![DbfValue::Null])],
    );
    let features = read_in_memory(files, ReaderOptions::default()).read_all().unwrap();
    assert_eq!(2, features.len());
    assert_eq!(Some(line), features[0].geometry);
    assert_abs_diff_eq!(3.25, features[0].attributes.get("len").and_then(|v| v.as_f64()).unwrap());
    assert_eq!(None, features[1].geometry);
    assert!(features[1].attributes.get("LEN").unwrap().is_null());

    let files = write_in_memory(
        ShapeType::PointZ,
        vec![DbfField::logical("OK").unwrap()],
        vec![(Some(point.clone()), vec![DbfValue::Logical(false)])],
    );
    let feature = read_in_memory(files, ReaderOptions::default()).read().unwrap().unwrap();
    assert_eq!(Some(point), feature.geometry);
    assert_eq!(Some(false), feature.attributes.get("OK").and_then(|v| v.as_bool()));
}

#[test]
fn fixed_precision_factory_snaps_ordinates() {
    let files = write_in_memory(
        ShapeType::Point,
        vec![DbfField::logical("OK").unwrap()],
        vec![(Some(Geometry::Point(Coordinate::new(1.23456, -7.891))), vec![DbfValue::Null])],
    );
    let options = ReaderOptions::default().with_factory(GeometryFactory::fixed(100.));
    match read_in_memory(files, options).read().unwrap().unwrap().geometry {
        Some(Geometry::Point(c)) => {
            assert_abs_diff_eq!(1.23, c.x, epsilon = 1e-12);
            assert_abs_diff_eq!(-7.89, c.y, epsilon = 1e-12);
        }
        other => panic!("expected a point, got {:?}", other),
    }
}

#[test]
fn restart_and_random_access() {
    let files = write_in_memory(
        ShapeType::Point,
        vec![DbfField::numeric("ID", 4, 0).unwrap()],
        (0..5)
            .map(|i| (Some(Geometry::Point(Coordinate::new(i as f64, 0.))), vec![DbfValue::Integer(i)]))
            .collect(),
    );
    let mut reader = read_in_memory(files, ReaderOptions::default());
    assert_eq!(5, reader.read_all().unwrap().len());
    assert!(reader.read().unwrap().is_none());

    let fourth = reader.feature_at(3).unwrap().unwrap();
    assert_eq!(Some(3), fourth.attributes.get("ID").and_then(|v| v.as_i64()));
    let fifth = reader.read().unwrap().unwrap();
    assert_eq!(Some(Geometry::Point(Coordinate::new(4., 0.))), fifth.geometry);

    reader.restart().unwrap();
    let ids: Vec<i64> = reader
        .map(|f| f.unwrap().attributes.get("ID").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(vec![0, 1, 2, 3, 4], ids);
}

#[test]
fn encoding_follows_the_cpg_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utf8.shp");
    {
        let mut writer = shapefile::create(
            &path,
            ShapeType::Point,
            vec![DbfField::character("NAME", 10).unwrap()],
            WriterOptions::default().with_encoding(UTF_8),
            None,
        )
        .unwrap();
        writer
            .write(Some(&Geometry::Point(Coordinate::new(0., 0.))), &["café".into()])
            .unwrap();
    }
    assert_eq!("UTF-8", fs::read_to_string(path.with_extension("cpg")).unwrap());

    let mut reader = shapefile::open(&path, ReaderOptions::default()).unwrap();
    let feature = reader.read().unwrap().unwrap();
    assert_eq!(Some("café"), feature.attributes.get("NAME").and_then(|v| v.as_str()));

    // Without the sidecar, nothing says UTF-8
    fs::remove_file(path.with_extension("cpg")).unwrap();
    let mut reader = shapefile::open(&path, ReaderOptions::default()).unwrap();
    assert_eq!(EncodingSource::Default, reader.dbf().encoding_source());
    let feature = reader.read().unwrap().unwrap();
    assert_eq!(Some("cafÃ©"), feature.attributes.get("NAME").and_then(|v| v.as_str()));

    // An explicit encoding wins
    let mut reader = shapefile::open(&path, ReaderOptions::default().with_encoding(UTF_8)).unwrap();
    let feature = reader.read().unwrap().unwrap();
    assert_eq!(Some("café"), feature.attributes.get("NAME").and_then(|v| v.as_str()));
}

#[test]
fn missing_dbf_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lonely.shp");
    {
        let mut writer = shapefile::create(
            &path,
            ShapeType::Point,
            vec![DbfField::logical("OK").unwrap()],
            WriterOptions::default().with_cpg(false),
            None,
        )
        .unwrap();
        writer.write(None, &[DbfValue::Null]).unwrap();
    }
    assert!(!path.with_extension("cpg").exists());
    fs::remove_file(path.with_extension("dbf")).unwrap();

    match shapefile::open(&path, ReaderOptions::default()) {
        Err(err) => assert_eq!(ErrorCategory::Io, err.category()),
        Ok(_) => panic!("expected an error"),
    }
}
