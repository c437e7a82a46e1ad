//! Codec géométrique: paires lon/lat, WKT, WKB, et quantification
//!
//! Toutes les entrées convergent vers [`Shape`]. Les coordonnées sont
//! arrondies sur une grille fixe pour borner le bruit de stockage.

pub mod wkb;
pub mod wkt;

pub use self::wkb::{from_ewkb, from_wkb, from_wkb_hex, to_ewkb, to_wkb};
pub use self::wkt::{from_ewkt, from_wkt, to_ewkt, to_wkt};

use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

use crate::Shape;

/// Nombre de décimales par défaut (≈ 1 cm à l'équateur en degrés)
pub const DEFAULT_DECIMALS: u32 = 7;

/// Précision de quantification des coordonnées
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Arrondi à N décimales (demi vers pair)
    Decimals(u32),
    /// Accrochage sur une grille de pas `g`: x ↦ round(x / g) · g
    Grid(f64),
}

impl Default for Precision {
    fn default() -> Self {
        Precision::Decimals(DEFAULT_DECIMALS)
    }
}

impl Precision {
    /// Précision usuelle selon la référence cible
    ///
    /// Degrés: 7 décimales. Références métriques: 2 décimales.
    pub fn for_epsg(epsg: u32) -> Self {
        match epsg {
            4326 | 4269 => Precision::Decimals(7),
            _ => Precision::Decimals(2),
        }
    }

    /// Quantifie une valeur
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Precision::Decimals(digits) => round_half_even(value, digits),
            Precision::Grid(grid) => snap_to_grid(value, grid),
        }
    }

    pub fn apply_coord(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.apply(c.x),
            y: self.apply(c.y),
        }
    }
}

/// Arrondit à `digits` décimales, égalités vers le pair
///
/// Les valeurs non finies sont laissées telles quelles (le validateur les signale).
pub fn round_half_even(value: f64, digits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10_f64.powi(digits as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    // Division (et non multiplication par 10^-n) pour retomber sur le littéral décimal
    scaled.round_ties_even() / scale
}

/// Accroche une valeur sur une grille de pas `grid`
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if !value.is_finite() || !(grid > 0.0) || !grid.is_finite() {
        return value;
    }
    (value / grid).round_ties_even() * grid
}

/// Quantifie toutes les coordonnées d'une forme
pub fn quantize(shape: &Shape, precision: Precision) -> Shape {
    shape.map_coords(|c| precision.apply_coord(c))
}

/// Construit un point depuis une paire longitude/latitude arrondie
pub fn from_lon_lat(x: f64, y: f64, digits: u32) -> Point<f64> {
    Point::new(round_half_even(x, digits), round_half_even(y, digits))
}
