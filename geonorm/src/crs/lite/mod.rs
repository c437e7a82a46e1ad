//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les références rencontrées dans les données ouvertes du Québec :
//! - WGS84 (EPSG:4326) et NAD83 géographique (EPSG:4269, confondu avec WGS84)
//! - Web Mercator (EPSG:3857)
//! - NAD83 / Québec Lambert (EPSG:32198)
//! - NAD83 / MTM zones 3 à 10 (EPSG:32183-32190)
//! - UTM zones 17N à 21N, WGS84 (EPSG:32617-32621) et NAD83 (EPSG:26917-26921)
//!
//! Cibles supportées :
//! - WGS84 (EPSG:4326)
//! - Web Mercator (EPSG:3857)

mod ellipsoid;
mod lambert;
mod mercator;
mod tm;

pub use ellipsoid::{Ellipsoid, GRS80, WGS84};
pub use lambert::LambertConic;
pub use tm::TransverseMercator;

use geo::Coord;

use crate::error::Result;
use crate::GeoError;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Projection source résolue
#[derive(Debug, Clone, Copy)]
enum Source {
    Geographic,
    WebMercator,
    Lambert(LambertConic),
    TransverseMercator(TransverseMercator),
}

impl Source {
    fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 | 4269 => Some(Source::Geographic),
            3857 => Some(Source::WebMercator),
            32198 => Some(Source::Lambert(LambertConic::quebec())),
            _ => TransverseMercator::from_epsg(epsg).map(Source::TransverseMercator),
        }
    }

    fn to_geographic(&self, x: f64, y: f64) -> Geographic {
        match self {
            Source::Geographic => Geographic::from_degrees(x, y),
            Source::WebMercator => mercator::web_mercator_to_geographic(x, y),
            Source::Lambert(lcc) => lcc.to_geographic(x, y),
            Source::TransverseMercator(tm) => tm.to_geographic(x, y),
        }
    }
}

/// Reprojection légère pour les références québécoises
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source: Source,
    target_epsg: u32,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = Source::from_epsg(source_epsg).ok_or_else(|| {
            GeoError::UnknownReference(format!(
                "EPSG:{} (supported sources: 4326, 4269, 3857, 32198, 32183-32190, 32617-32621, 26917-26921)",
                source_epsg
            ))
        })?;
        if !Self::is_supported_target(target_epsg) {
            return Err(GeoError::UnknownReference(format!(
                "EPSG:{} (supported targets: 4326, 3857)",
                target_epsg
            )));
        }

        Ok(Self {
            source,
            target_epsg,
        })
    }

    /// Vérifie si l'EPSG source est supporté
    pub fn is_supported_source(epsg: u32) -> bool {
        Source::from_epsg(epsg).is_some()
    }

    /// Vérifie si l'EPSG cible est supporté
    pub fn is_supported_target(epsg: u32) -> bool {
        matches!(epsg, 4326 | 3857)
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        Self::is_supported_source(source) && Self::is_supported_target(target)
    }

    /// Transforme une coordonnée de la source vers la cible
    pub fn transform_coord(&self, c: Coord<f64>) -> Coord<f64> {
        // Étape 1: Source → Géographique
        let geo = self.source.to_geographic(c.x, c.y);

        // Étape 2: Géographique → Cible
        let (x, y) = match self.target_epsg {
            3857 => mercator::geographic_to_web_mercator(geo),
            _ => geo.to_degrees(),
        };
        Coord { x, y }
    }
}
