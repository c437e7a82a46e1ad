//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique de rayon égal au demi-grand axe WGS84.

use super::ellipsoid::WGS84;
use super::Geographic;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    let r = WGS84.a;

    // Limiter la latitude pour éviter l'infini
    let lat = geo.lat.clamp(-85.0_f64.to_radians(), 85.0_f64.to_radians());

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = WGS84.a;
    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;
    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quebec_city_to_web_mercator() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(-71.2080, 46.8139));
        assert_abs_diff_eq!(x, -7926838.30, epsilon = 0.01);
        assert_abs_diff_eq!(y, 5911750.54, epsilon = 0.01);
    }

    #[test]
    fn test_roundtrip() {
        let geo = Geographic::from_degrees(-71.2080, 46.8139);
        let (x, y) = geographic_to_web_mercator(geo);
        let (lon, lat) = web_mercator_to_geographic(x, y).to_degrees();

        assert_abs_diff_eq!(lon, -71.2080, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 46.8139, epsilon = 1e-9);
    }
}
