//! Projection conique conforme de Lambert à 2 parallèles standards
//!
//! Utilisée par NAD83 / Québec Lambert (EPSG:32198).

use super::ellipsoid::{Ellipsoid, GRS80};
use super::Geographic;

/// Paramètres d'une conique conforme (angles en radians)
#[derive(Debug, Clone, Copy)]
pub struct LambertConic {
    pub ellipsoid: Ellipsoid,
    /// Longitude origine
    pub lon0: f64,
    /// Latitude origine
    pub lat0: f64,
    /// Premier parallèle standard
    pub lat1: f64,
    /// Deuxième parallèle standard
    pub lat2: f64,
    /// False easting
    pub x0: f64,
    /// False northing
    pub y0: f64,
}

impl LambertConic {
    /// NAD83 / Québec Lambert (EPSG:32198)
    pub fn quebec() -> Self {
        Self {
            ellipsoid: GRS80,
            lon0: (-68.5_f64).to_radians(),
            lat0: 44.0_f64.to_radians(),
            lat1: 60.0_f64.to_radians(),
            lat2: 46.0_f64.to_radians(),
            x0: 0.0,
            y0: 0.0,
        }
    }

    /// Constantes dérivées: exposant n, constante C, rayon à l'origine r0
    fn constants(&self) -> (f64, f64, f64) {
        let e = self.ellipsoid.e();
        let e2 = self.ellipsoid.e2();
        let a = self.ellipsoid.a;

        let n1 = grande_normale(self.lat1, a, e2);
        let n2 = grande_normale(self.lat2, a, e2);

        let iso_lat1 = isometric_latitude(self.lat1, e);
        let iso_lat2 = isometric_latitude(self.lat2, e);
        let iso_lat0 = isometric_latitude(self.lat0, e);

        let n = ((n1 * self.lat1.cos()).ln() - (n2 * self.lat2.cos()).ln()) / (iso_lat2 - iso_lat1);
        let c = (n1 * self.lat1.cos() / n) * (n * iso_lat1).exp();
        let r0 = c * (-n * iso_lat0).exp();
        (n, c, r0)
    }

    /// Projeté → géographique
    pub fn to_geographic(&self, x: f64, y: f64) -> Geographic {
        let (n, c, r0) = self.constants();

        let dx = x - self.x0;
        let dy = y - self.y0;

        let r = (dx.powi(2) + (r0 - dy).powi(2)).sqrt();
        let r = if n < 0.0 { -r } else { r };
        let gamma = (dx / (r0 - dy)).atan();

        let iso_lat = -(r / c).ln() / n;
        let lat = latitude_from_isometric(iso_lat, self.ellipsoid.e());
        let lon = self.lon0 + gamma / n;

        Geographic::new(lon, lat)
    }

    /// Géographique → projeté
    pub fn from_geographic(&self, geo: Geographic) -> (f64, f64) {
        let (n, c, r0) = self.constants();
        let r = c * (-n * isometric_latitude(geo.lat, self.ellipsoid.e())).exp();
        let gamma = n * (geo.lon - self.lon0);
        (self.x0 + r * gamma.sin(), self.y0 + r0 - r * gamma.cos())
    }
}

/// Calcule la latitude isométrique
fn isometric_latitude(lat: f64, e: f64) -> f64 {
    let sin_lat = lat.sin();
    let term = ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).powf(e / 2.0);
    ((std::f64::consts::FRAC_PI_4 + lat / 2.0).tan() * term).ln()
}

/// Calcule la latitude depuis la latitude isométrique (itératif)
fn latitude_from_isometric(iso_lat: f64, e: f64) -> f64 {
    let mut lat = 2.0 * iso_lat.exp().atan() - std::f64::consts::FRAC_PI_2;

    for _ in 0..10 {
        let sin_lat = lat.sin();
        let term = ((1.0 + e * sin_lat) / (1.0 - e * sin_lat)).powf(e / 2.0);
        let new_lat = 2.0 * (iso_lat.exp() * term).atan() - std::f64::consts::FRAC_PI_2;

        if (new_lat - lat).abs() < 1e-12 {
            return new_lat;
        }
        lat = new_lat;
    }
    lat
}

/// Calcule le grand normal (rayon de courbure dans le plan vertical)
fn grande_normale(lat: f64, a: f64, e2: f64) -> f64 {
    a / (1.0 - e2 * lat.sin().powi(2)).sqrt()
}
