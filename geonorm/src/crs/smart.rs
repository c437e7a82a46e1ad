//! Reprojection intelligente : projections légères en priorité, fallback sur proj
//!
//! Utilise automatiquement la meilleure option disponible.

use tracing::debug;

use super::lite::ReprojectorLite;
use crate::error::Result;
use crate::{GeoError, Shape};

/// Reprojection intelligente
///
/// Essaie d'abord les projections légères (pure Rust), puis proj si disponible.
pub enum SmartReprojector {
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(super::proj::Reprojector),
    /// Pas de reprojection (source == cible)
    Identity,
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        // Pas de reprojection nécessaire
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        // Projections légères d'abord
        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            let lite = ReprojectorLite::new(source_epsg, target_epsg)?;
            debug!(source_epsg, target_epsg, "Using lite projection");
            return Ok(Self::Lite(lite));
        }

        // Fallback sur proj si disponible
        Self::fallback(source_epsg, target_epsg)
    }

    #[cfg(feature = "reproject")]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let proj = super::proj::Reprojector::new(source_epsg, target_epsg)?;
        debug!(source_epsg, target_epsg, "Using PROJ");
        Ok(Self::Proj(proj))
    }

    /// Aucune option disponible
    #[cfg(not(feature = "reproject"))]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        Err(GeoError::UnknownReference(format!(
            "no transform from EPSG:{} to EPSG:{} (build with --features reproject for PROJ support)",
            source_epsg, target_epsg
        )))
    }

    /// Transforme une forme
    ///
    /// Une coordonnée finie qui devient non finie est une erreur: on ne
    /// propage jamais une géométrie partiellement reprojetée.
    pub fn transform(&self, shape: &Shape) -> Result<Shape> {
        match self {
            Self::Identity => Ok(shape.clone()),
            Self::Lite(lite) => shape.try_map_coords(|c| {
                let out = lite.transform_coord(c);
                check_finite(c, out)
            }),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform(shape),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity (no reprojection)",
            Self::Lite(_) => "lite (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}

pub(crate) fn check_finite(input: geo::Coord<f64>, out: geo::Coord<f64>) -> Result<geo::Coord<f64>> {
    let input_finite = input.x.is_finite() && input.y.is_finite();
    if input_finite && !(out.x.is_finite() && out.y.is_finite()) {
        return Err(GeoError::Reprojection {
            reason: format!("({}, {}) has no image in the target reference", input.x, input.y),
        });
    }
    Ok(out)
}
