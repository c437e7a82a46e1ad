//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use geonorm::{Crs, DefectKind, FeatureRecord};

/// Exporte des enregistrements en GeoJSON
pub fn export_to_geojson(records: &[FeatureRecord], crs: Crs, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_collection(&mut writer, records, crs)?;
    writer.flush()?;
    Ok(())
}

/// Écrit une FeatureCollection complète
pub fn write_collection<W: Write>(writer: &mut W, records: &[FeatureRecord], crs: Crs) -> Result<()> {
    // Header FeatureCollection avec CRS
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        crs.epsg
    )?;

    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, record)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit un enregistrement en Feature GeoJSON
fn write_feature<W: Write>(writer: &mut W, record: &FeatureRecord) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":"#)?;
    serde_json::to_writer(&mut *writer, &record.id)?;
    write!(writer, ",")?;

    write!(writer, r#""geometry":"#)?;
    if record.defect == Some(DefectKind::NanOrInfiniteCoordinate) {
        // NaN n'a pas de représentation JSON
        write!(writer, "null")?;
    } else {
        let mut geom_buf = Vec::new();
        let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
        record.geometry.shape.to_geo().process_geom(&mut geom_writer)?;
        writer.write_all(&geom_buf)?;
    }

    // Propriétés: attributs canoniques puis champs dérivés
    write!(writer, r#","properties":{{"#)?;
    for (key, value) in record.attributes.iter() {
        serde_json::to_writer(&mut *writer, key)?;
        write!(writer, ":")?;
        serde_json::to_writer(&mut *writer, value)?;
        write!(writer, ",")?;
    }
    write!(
        writer,
        r#""updated_at":"{}","is_valid_geometry":{}"#,
        record.updated_at.to_rfc3339(),
        record.is_valid_geometry
    )?;
    if let Some(defect) = record.defect {
        write!(writer, r#","reason":"{}""#, defect)?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo::{LineString, Point};
    use geonorm::{Attributes, Geometry, Rings, Shape, Value};

    fn record(id: &str, shape: Shape) -> FeatureRecord {
        let mut attributes = Attributes::new();
        attributes.insert("name", Value::Text("Caserne \"Centre\"".into()));
        attributes.insert("area", Value::Float(12.5));
        attributes.insert("borough", Value::Null);
        FeatureRecord {
            id: id.to_string(),
            geometry: Geometry::new(shape, Crs::WGS84),
            attributes,
            updated_at: Utc.with_ymd_and_hms(2025, 8, 27, 6, 58, 0).unwrap(),
            is_valid_geometry: true,
            defect: None,
        }
    }

    #[test]
    fn test_collection_is_valid_json() {
        let point = record("001", Shape::Point(Point::new(-71.208, 46.8139)));
        let mut bowtie = record(
            "002",
            Shape::Polygon(Rings::new(
                LineString::from(vec![(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
                vec![],
            )),
        );
        bowtie.is_valid_geometry = false;
        bowtie.defect = Some(DefectKind::SelfIntersection);

        let mut buffer = Vec::new();
        write_collection(&mut buffer, &[point, bowtie], Crs::WGS84).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");

        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["id"], "001");
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["properties"]["name"], "Caserne \"Centre\"");
        assert_eq!(features[0]["properties"]["area"], 12.5);
        assert!(features[0]["properties"]["borough"].is_null());
        assert_eq!(features[1]["geometry"]["type"], "Polygon");
        assert_eq!(features[1]["properties"]["reason"], "SelfIntersection");
    }

    #[test]
    fn test_strings_are_escaped() {
        let mut point = record("id \"1\"\n", Shape::Point(Point::new(-71.2, 46.8)));
        point.attributes.insert("note\t", Value::Text("ligne\u{1}\\fin".into()));

        let mut buffer = Vec::new();
        write_collection(&mut buffer, &[point], Crs::WGS84).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        let feature = &json["features"][0];
        assert_eq!(feature["id"], "id \"1\"\n");
        assert_eq!(feature["properties"]["note\t"], "ligne\u{1}\\fin");
    }

    #[test]
    fn test_export_to_file() {
        let records = vec![record("001", Shape::Point(Point::new(5.0, 47.0)))];
        let output_path = std::env::temp_dir().join("qc_opendata_test.geojson");

        export_to_geojson(&records, Crs::WGS84, &output_path).unwrap();

        let content = std::fs::read_to_string(&output_path).unwrap();
        assert!(content.contains(r#""id":"001""#));
        assert!(content.contains("EPSG::4326"));

        std::fs::remove_file(output_path).ok();
    }
}
