//! Normalisation des références spatiales
//!
//! Chaque géométrie reçoit une référence; si la référence déclarée diffère
//! de la cible, toutes les coordonnées sont reprojetées. Une référence
//! absente vaut EPSG:4326 et lève un avertissement (jamais une erreur).

pub mod lite;
#[cfg(feature = "reproject")]
pub mod proj;
mod smart;

pub use smart::SmartReprojector;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::{Crs, Geometry, Shape};

/// Géométrie normalisée et signal de référence par défaut
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub geometry: Geometry,
    /// Vrai si aucune référence n'était déclarée (EPSG:4326 supposé)
    pub defaulted: bool,
}

/// Normalise une géométrie isolée vers la référence cible
pub fn normalize(shape: &Shape, declared: Option<Crs>, target: Crs) -> Result<Normalized> {
    Normalizer::new(target).normalize(shape, declared)
}

/// Normaliseur réutilisable sur un lot
///
/// Les reprojecteurs sont construits une fois par couple (source, cible).
pub struct Normalizer {
    target: Crs,
    reprojectors: HashMap<u32, SmartReprojector>,
    defaulted: usize,
}

impl Normalizer {
    pub fn new(target: Crs) -> Self {
        Self {
            target,
            reprojectors: HashMap::new(),
            defaulted: 0,
        }
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Nombre de géométries sans référence déclarée
    pub fn defaulted_count(&self) -> usize {
        self.defaulted
    }

    pub fn normalize(&mut self, shape: &Shape, declared: Option<Crs>) -> Result<Normalized> {
        let defaulted = declared.is_none();
        let source = match declared {
            Some(crs) => crs,
            None => {
                if self.defaulted == 0 {
                    warn!(
                        target_crs = %self.target,
                        "No declared coordinate reference, assuming EPSG:4326"
                    );
                }
                self.defaulted += 1;
                Crs::WGS84
            }
        };

        let target = self.target;
        let reprojector = match self.reprojectors.entry(source.epsg) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let r = SmartReprojector::new(source.epsg, target.epsg)?;
                debug!(source = %source, target = %target, method = r.description(), "Reprojector ready");
                e.insert(r)
            }
        };

        let shape = reprojector.transform(shape)?;
        Ok(Normalized {
            geometry: Geometry::new(shape, target),
            defaulted,
        })
    }
}
