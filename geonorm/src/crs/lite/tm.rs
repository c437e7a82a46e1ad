//! Projection Transverse Mercator (UTM et MTM)
//!
//! - UTM zones 17N à 21N, sur WGS84 (EPSG:32617-32621) ou NAD83 (EPSG:26917-26921)
//! - MTM zones 3 à 10 du Québec, NAD83 (EPSG:32183-32190)

use super::ellipsoid::{Ellipsoid, GRS80, WGS84};
use super::Geographic;

/// Paramètres d'une projection Transverse Mercator
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Facteur d'échelle au méridien central
    pub k0: f64,
    /// Méridien central (radians)
    pub lon0: f64,
    /// False easting
    pub x0: f64,
    /// False northing
    pub y0: f64,
}

impl TransverseMercator {
    /// Zone UTM
    pub fn utm(zone: u32, south: bool, ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            k0: 0.9996,
            lon0: ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians(),
            x0: 500000.0,
            y0: if south { 10000000.0 } else { 0.0 },
        }
    }

    /// Zone MTM (Modified Transverse Mercator, bandes de 3°)
    pub fn mtm(zone: u32) -> Self {
        Self {
            ellipsoid: GRS80,
            k0: 0.9999,
            lon0: (-(52.5 + 3.0 * (zone as f64 - 1.0))).to_radians(),
            x0: 304800.0,
            y0: 0.0,
        }
    }

    /// Résout un code EPSG en projection TM connue
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            32617..=32621 => Some(Self::utm(epsg - 32600, false, WGS84)),
            26917..=26921 => Some(Self::utm(epsg - 26900, false, GRS80)),
            32183..=32190 => Some(Self::mtm(epsg - 32180)),
            _ => None,
        }
    }

    /// Projeté → géographique
    pub fn to_geographic(&self, x: f64, y: f64) -> Geographic {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.ep2();
        let k0 = self.k0;

        // Coordonnées réduites
        let x = x - self.x0;
        let y = y - self.y0;

        // Calcul du footprint latitude
        let m = y / k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();

        let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
        let t1 = tan_phi1.powi(2);
        let c1 = ep2 * cos_phi1.powi(2);
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
        let d = x / (n1 * k0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                        - 252.0 * ep2
                        - 3.0 * c1.powi(2))
                        * d.powi(6)
                        / 720.0);

        let lon = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        Geographic::new(lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mtm7_quebec_city() {
        let tm = TransverseMercator::from_epsg(32187).unwrap();
        let (lon, lat) = tm.to_geographic(250771.16, 5186283.20).to_degrees();

        assert_abs_diff_eq!(lon, -71.2080, epsilon = 1e-5);
        assert_abs_diff_eq!(lat, 46.8139, epsilon = 1e-5);
    }

    #[test]
    fn test_utm19_quebec_city() {
        for epsg in [32619, 26919] {
            let tm = TransverseMercator::from_epsg(epsg).unwrap();
            let (lon, lat) = tm.to_geographic(331556.14, 5186850.92).to_degrees();

            assert_abs_diff_eq!(lon, -71.2080, epsilon = 1e-5);
            assert_abs_diff_eq!(lat, 46.8139, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_mtm_central_meridians() {
        let lon0 = |zone| TransverseMercator::mtm(zone).lon0.to_degrees();
        assert_abs_diff_eq!(lon0(3), -58.5, epsilon = 1e-12);
        assert_abs_diff_eq!(lon0(10), -79.5, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_epsg() {
        assert!(TransverseMercator::from_epsg(32622).is_none());
        assert!(TransverseMercator::from_epsg(2154).is_none());
    }
}
