//! Validation topologique des géométries
//!
//! La validation est consultative: un défaut est porté par l'enregistrement
//! (`is_valid_geometry`, `defect`), jamais levé comme erreur.

mod ring;

pub use ring::{distinct_vertices, ring_signed_area, self_intersects};

use std::fmt;

use serde::Serialize;

use crate::{Rings, Shape};

/// Nature d'un défaut géométrique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DefectKind {
    SelfIntersection,
    RingNotClosed,
    /// Moins de 4 coordonnées, ou aire nulle
    DegenerateRing,
    #[serde(rename = "NaNOrInfiniteCoordinate")]
    NanOrInfiniteCoordinate,
}

impl DefectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::SelfIntersection => "SelfIntersection",
            DefectKind::RingNotClosed => "RingNotClosed",
            DefectKind::DegenerateRing => "DegenerateRing",
            DefectKind::NanOrInfiniteCoordinate => "NaNOrInfiniteCoordinate",
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Résultat de validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<DefectKind>,
}

impl Validation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: DefectKind) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

impl From<Result<(), DefectKind>> for Validation {
    fn from(r: Result<(), DefectKind>) -> Self {
        match r {
            Ok(()) => Validation::valid(),
            Err(kind) => Validation::invalid(kind),
        }
    }
}

/// Valide une géométrie et retourne le premier défaut rencontré
///
/// Ordre des contrôles: coordonnées finies, fermeture des anneaux,
/// anneaux dégénérés, puis auto-intersection.
pub fn validate(shape: &Shape) -> Validation {
    let result = match shape {
        Shape::Point(p) => {
            if p.x().is_finite() && p.y().is_finite() {
                Ok(())
            } else {
                Err(DefectKind::NanOrInfiniteCoordinate)
            }
        }
        Shape::Polygon(poly) => check_polygon(poly),
    };
    result.into()
}

fn check_polygon(poly: &Rings) -> Result<(), DefectKind> {
    let finite = poly
        .iter()
        .flat_map(|r| r.0.iter())
        .all(|c| c.x.is_finite() && c.y.is_finite());
    if !finite {
        return Err(DefectKind::NanOrInfiniteCoordinate);
    }

    for ring in poly.iter() {
        match (ring.0.first(), ring.0.last()) {
            (Some(first), Some(last)) if first == last => {}
            (None, None) => return Err(DefectKind::DegenerateRing),
            _ => return Err(DefectKind::RingNotClosed),
        }
    }

    for ring in poly.iter() {
        if ring.0.len() < 4 {
            return Err(DefectKind::DegenerateRing);
        }
    }
    if ring_signed_area(poly.exterior()) == 0.0 {
        return Err(DefectKind::DegenerateRing);
    }

    // Un triangle ne peut pas s'auto-intersecter
    for ring in poly.iter() {
        if distinct_vertices(ring) >= 4 && self_intersects(ring) {
            return Err(DefectKind::SelfIntersection);
        }
    }

    Ok(())
}
