//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use geo::{Coord, LineString, Point};
use proj::Proj;

use super::smart::check_finite;
use crate::error::Result;
use crate::{GeoError, Rings, Shape};

/// Reprojection de géométries entre deux systèmes de coordonnées
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).map_err(|e| {
            GeoError::UnknownReference(format!("{} -> {}: {}", source, target, e))
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une forme
    pub fn transform(&self, shape: &Shape) -> Result<Shape> {
        match shape {
            Shape::Point(p) => {
                let (x, y) = self.proj.convert((p.x(), p.y())).map_err(|e| GeoError::Reprojection {
                    reason: e.to_string(),
                })?;
                let out = check_finite(p.0, Coord { x, y })?;
                Ok(Shape::Point(Point::from(out)))
            }
            Shape::Polygon(rings) => {
                let exterior = self.transform_linestring(rings.exterior())?;
                let interiors = rings
                    .interiors()
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Shape::Polygon(Rings::new(exterior, interiors)))
            }
        }
    }

    /// Transforme une LineString (optimisé avec batch conversion)
    fn transform_linestring(&self, ls: &LineString<f64>) -> Result<LineString<f64>> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        // Transformation batch - beaucoup plus rapide que point par point
        self.proj
            .convert_array(&mut coords)
            .map_err(|e| GeoError::Reprojection {
                reason: e.to_string(),
            })?;

        let result = ls
            .0
            .iter()
            .zip(coords)
            .map(|(input, (x, y))| check_finite(*input, Coord { x, y }))
            .collect::<Result<Vec<_>>>()?;
        Ok(LineString::new(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quebec_lambert_to_wgs84() {
        let reprojector = Reprojector::new(32198, 4326).unwrap();
        let shape = Shape::Point(Point::new(-206300.41, 317060.36));

        let Shape::Point(p) = reprojector.transform(&shape).unwrap() else {
            panic!("Expected Point geometry");
        };
        assert!((p.x() - (-71.2080)).abs() < 0.001, "lon={}", p.x());
        assert!((p.y() - 46.8139).abs() < 0.001, "lat={}", p.y());
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}
