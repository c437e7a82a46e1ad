//! Scénarios de bout en bout et propriétés du moteur

use chrono::{TimeZone, Utc};
use geo::{Centroid, LineString, Point};
use geonorm::codec::{self, Precision};
use geonorm::join::contains;
use geonorm::{
    containment_join, map_record, normalize_records, reconcile, Attributes, Crs, DataType,
    FeatureRecord, FieldMapping, GeoError, Geometry, GeometrySource, JoinMode, JoinOptions,
    NormalizeOptions, RawRecord, RawValue, Rings, SchemaMapping, Shape, UpdatedAt, Value,
};
use proptest::prelude::*;

fn record(id: &str, shape: Shape, attributes: Attributes) -> FeatureRecord {
    FeatureRecord {
        id: id.to_string(),
        geometry: Geometry::new(shape, Crs::WGS84),
        attributes,
        updated_at: Utc.with_ymd_and_hms(2025, 8, 27, 6, 58, 0).unwrap(),
        is_valid_geometry: true,
        defect: None,
    }
}

fn text_attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::Text(v.to_string())))
        .collect()
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rings {
    Rings::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )
}

#[test]
fn scenario_point_in_square() {
    let square = rect(0.0, 0.0, 4.0, 4.0).to_polygon();
    assert!(contains(&square, &Point::new(2.0, 2.0)));
    assert!(!contains(&square, &Point::new(5.0, 5.0)));
}

#[test]
fn scenario_pool_demolition() {
    let installation = record(
        "1",
        Shape::Point(Point::new(-71.2, 46.8)),
        text_attributes(&[
            ("address", "10 Main"),
            ("lot", "L1"),
            ("borough", "X"),
            ("reason", "Installation de piscine"),
        ]),
    );
    let removal = record(
        "2",
        Shape::Point(Point::new(-71.2, 46.8)),
        text_attributes(&[
            ("address", "10 Main St"),
            ("lot", "L1"),
            ("borough", "X"),
            ("reason", "Démolition"),
        ]),
    );
    let keys = vec!["address".to_string(), "lot".to_string(), "borough".to_string()];

    let result = reconcile(&[installation], &[removal], &keys).unwrap();
    assert_eq!(result.matches.len(), 1);
    let m = &result.matches[0];
    assert_eq!((m.installation_id.as_str(), m.removal_id.as_str(), m.superseded), ("1", "2", true));
}

#[test]
fn scenario_missing_column_named() {
    let mapping = SchemaMapping::new(vec![
        FieldMapping::new("NOM", "name", DataType::Text),
        FieldMapping::new("REGION", "region", DataType::Text),
    ]);
    let row: RawRecord = [("NOM".to_string(), RawValue::from("Caserne 3"))].into_iter().collect();

    match map_record(&row, &mapping, &["NOM".to_string(), "REGION".to_string()], &[]) {
        Err(GeoError::MissingColumn { column }) => assert_eq!(column, "REGION"),
        other => panic!("Expected MissingColumn, got {:?}", other),
    }
}

#[test]
fn scenario_stations_in_regions() {
    let station_rows: Vec<RawRecord> = [
        ("1", "-71.2080", "46.8139"),
        ("2", "-73.5673", "45.5017"),
        ("3", "-68.5000", "48.4500"),
    ]
    .iter()
    .map(|(id, x, y)| {
        [("ID", *id), ("LONGITUDE", *x), ("LATITUDE", *y)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), RawValue::from(v)))
            .collect()
    })
    .collect();

    let snapshot = UpdatedAt::Snapshot(Utc.with_ymd_and_hms(2025, 8, 27, 6, 58, 0).unwrap());
    let options = NormalizeOptions::new(GeometrySource::lon_lat("LONGITUDE", "LATITUDE"), snapshot)
        .with_source_crs(Crs::WGS84)
        .with_id_column("ID");
    let stations = normalize_records(&station_rows, &options).unwrap();
    assert_eq!(stations.stats.crs_defaulted, 0);

    let capitale = record(
        "03",
        Shape::Polygon(rect(-72.5, 46.5, -70.0, 48.0)),
        text_attributes(&[("name", "Capitale-Nationale")]),
    );
    let montreal = record(
        "06",
        Shape::Polygon(rect(-74.0, 45.3, -73.4, 45.8)),
        text_attributes(&[("name", "Montréal")]),
    );
    let regions = vec![capitale, montreal];

    let left = containment_join(&stations.records, &regions, JoinOptions::new(JoinMode::Left)).unwrap();
    let pairs: Vec<(&str, Option<&str>)> = left
        .rows
        .iter()
        .map(|r| (r.point_id.as_str(), r.polygon_id.as_deref()))
        .collect();
    assert_eq!(pairs, vec![("1", Some("03")), ("2", Some("06")), ("3", None)]);

    let fields = vec![("name".to_string(), "region_name".to_string())];
    let enriched = geonorm::enrich(&stations.records, &regions, &left, &fields).unwrap();
    assert_eq!(enriched[2].attributes.get("region_name"), Some(&Value::Null));
}

#[test]
fn scenario_lambert_to_wgs84_join() {
    // Polygone en Québec Lambert, point en degrés: les deux sont ramenés en 4326
    let wkt = "SRID=32198;POLYGON((-260000 260000,-150000 260000,-150000 370000,-260000 370000,-260000 260000))";
    let rows: Vec<RawRecord> = vec![[
        ("GEOM".to_string(), RawValue::from(wkt)),
        ("ID".to_string(), RawValue::from("QC")),
    ]
    .into_iter()
    .collect()];
    let snapshot = UpdatedAt::Snapshot(Utc::now());
    let options = NormalizeOptions::new(GeometrySource::Wkt { column: "GEOM".into() }, snapshot)
        .with_id_column("ID");
    let polygons = normalize_records(&rows, &options).unwrap();
    assert!(polygons.records[0].is_valid_geometry);
    assert_eq!(polygons.records[0].geometry.crs, Crs::WGS84);

    let points = vec![record("quebec", Shape::Point(Point::new(-71.2080, 46.8139)), Attributes::new())];
    let result = containment_join(&points, &polygons.records, JoinOptions::default()).unwrap();
    assert_eq!(result.rows.len(), 1);
}

fn coordinate() -> impl Strategy<Value = f64> {
    (-180.0f64..180.0).prop_map(|v| codec::round_half_even(v, 7))
}

fn rectangle() -> impl Strategy<Value = Rings> {
    (coordinate(), coordinate(), 0.001f64..50.0, 0.001f64..50.0).prop_map(|(x, y, w, h)| {
        let x1 = codec::round_half_even(x + w, 7);
        let y1 = codec::round_half_even(y + h, 7);
        rect(x, y, x1, y1)
    })
}

proptest! {
    #[test]
    fn prop_wkt_round_trip_point(x in coordinate(), y in coordinate()) {
        let shape = Shape::Point(Point::new(x, y));
        prop_assert_eq!(codec::from_wkt(&codec::to_wkt(&shape)).unwrap(), shape);
    }

    #[test]
    fn prop_wkt_and_wkb_round_trip_polygon(rings in rectangle()) {
        let shape = Shape::Polygon(rings);
        prop_assert_eq!(codec::from_wkt(&codec::to_wkt(&shape)).unwrap(), shape.clone());
        prop_assert_eq!(codec::from_wkb(&codec::to_wkb(&shape)).unwrap(), shape);
    }

    #[test]
    fn prop_quantization_idempotent(v in -1.0e7f64..1.0e7, digits in 0u32..9, grid in 0.0001f64..100.0) {
        for precision in [Precision::Decimals(digits), Precision::Grid(grid)] {
            let once = precision.apply(v);
            prop_assert_eq!(precision.apply(once), once);
        }
    }

    #[test]
    fn prop_centroid_contained_and_outside_bbox_not(rings in rectangle(), dx in 0.01f64..10.0) {
        let polygon = rings.to_polygon();
        let centroid = polygon.centroid().unwrap();
        prop_assert!(contains(&polygon, &centroid));

        let max_x = rings.exterior().0.iter().map(|c| c.x).fold(f64::MIN, f64::max);
        prop_assert!(!contains(&polygon, &Point::new(max_x + dx, centroid.y())));
    }

    #[test]
    fn prop_inner_is_subset_of_left(
        xs in proptest::collection::vec((0.0f64..20.0, 0.0f64..20.0), 1..40),
    ) {
        let points: Vec<_> = xs
            .iter()
            .enumerate()
            .map(|(i, (x, y))| record(&i.to_string(), Shape::Point(Point::new(*x, *y)), Attributes::new()))
            .collect();
        let polygons = vec![
            record("a", Shape::Polygon(rect(0.0, 0.0, 8.0, 8.0)), Attributes::new()),
            record("b", Shape::Polygon(rect(5.0, 5.0, 12.0, 12.0)), Attributes::new()),
        ];

        let inner = containment_join(&points, &polygons, JoinOptions::new(JoinMode::Inner)).unwrap();
        let left = containment_join(&points, &polygons, JoinOptions::new(JoinMode::Left)).unwrap();
        prop_assert!(inner.rows.len() <= left.rows.len());

        for point in &points {
            let in_inner = inner.rows.iter().any(|r| r.point_id == point.id);
            let in_left: Vec<_> = left.rows.iter().filter(|r| r.point_id == point.id).collect();
            if !in_inner {
                prop_assert_eq!(in_left.len(), 1);
                prop_assert!(in_left[0].polygon_id.is_none());
            }
        }
    }
}
