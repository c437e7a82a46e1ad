//! Jointure spatiale de contenance points / polygones
//!
//! Un R-tree sur les boîtes englobantes des polygones filtre les candidats,
//! puis un test exact point-dans-polygone (bord inclus) tranche. Les points
//! sont répartis en partitions disjointes sur un pool rayon de taille fixe;
//! l'index est en lecture seule pendant la requête.

use std::fmt;
use std::str::FromStr;

use geo::{coordinate_position::CoordPos, CoordinatePosition, Point, Polygon};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::{Crs, FeatureRecord, GeoError, Rings, Value};

/// Sémantique de jointure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Les points sans polygone sont exclus
    #[default]
    Inner,
    /// Les points sans polygone sont conservés avec une référence nulle
    Left,
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inner" => Ok(JoinMode::Inner),
            "left" => Ok(JoinMode::Left),
            _ => Err(format!("Unknown join mode: {} (expected inner or left)", s)),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMode::Inner => f.write_str("inner"),
            JoinMode::Left => f.write_str("left"),
        }
    }
}

/// Options de jointure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinOptions {
    pub mode: JoinMode,
    /// Taille du pool (0 = nombre de cœurs)
    pub jobs: usize,
}

impl JoinOptions {
    pub fn new(mode: JoinMode) -> Self {
        Self { mode, jobs: 0 }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Une paire (point, polygone); `polygon_id` nul en jointure gauche
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRow {
    pub point_id: String,
    pub polygon_id: Option<String>,
    /// Position du point dans l'entrée
    #[serde(skip)]
    pub point_index: usize,
    /// Position du polygone dans l'entrée
    #[serde(skip)]
    pub polygon_index: Option<usize>,
}

/// Statistiques de jointure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub points: usize,
    pub polygons: usize,
    /// Points contenus dans au moins un polygone
    pub matched_points: usize,
    pub unmatched_points: usize,
    /// Points contenus dans plusieurs polygones (entrées qui se chevauchent)
    pub multi_matched_points: usize,
    pub pairs: usize,
}

/// Résultat de jointure, dans l'ordre des points en entrée
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinResult {
    pub mode: JoinMode,
    pub rows: Vec<JoinRow>,
    pub stats: JoinStats,
}

/// Polygone stocké dans le R-tree
struct PolygonEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for PolygonEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Test de contenance, bord inclus
pub fn contains(polygon: &Polygon<f64>, point: &Point<f64>) -> bool {
    polygon.coordinate_position(&point.0) != CoordPos::Outside
}

/// Index spatial sur un jeu de polygones
pub struct PolygonIndex {
    tree: RTree<PolygonEntry>,
    crs: Option<Crs>,
    len: usize,
}

impl PolygonIndex {
    /// Construit l'index; chaque enregistrement doit porter un polygone
    pub fn build(polygons: &[FeatureRecord]) -> Result<Self> {
        let crs = common_crs(polygons)?;
        let mut entries = Vec::with_capacity(polygons.len());

        for (index, record) in polygons.iter().enumerate() {
            let rings = record.geometry.shape.as_polygon().ok_or_else(|| {
                GeoError::GeometryKind {
                    id: record.id.clone(),
                    expected: "polygon",
                }
            })?;

            let Some(envelope) = envelope(rings) else {
                warn!(id = %record.id, "Polygon without finite extent, not indexed");
                continue;
            };

            entries.push(PolygonEntry {
                index,
                envelope,
                polygon: rings.to_polygon(),
            });
        }

        debug!(indexed = entries.len(), total = polygons.len(), "Polygon index built");
        Ok(Self {
            tree: RTree::bulk_load(entries),
            crs,
            len: polygons.len(),
        })
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Indices (ordre d'entrée) des polygones contenant le point
    pub fn containing(&self, point: &Point<f64>) -> Vec<usize> {
        if !(point.x().is_finite() && point.y().is_finite()) {
            return Vec::new();
        }
        let query = AABB::from_point([point.x(), point.y()]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter(|entry| contains(&entry.polygon, point))
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn envelope(rings: &Rings) -> Option<AABB<[f64; 2]>> {
    let coords = &rings.exterior().0;
    let first = coords.first()?;
    let (mut min, mut max) = ([first.x, first.y], [first.x, first.y]);
    for c in coords {
        min = [min[0].min(c.x), min[1].min(c.y)];
        max = [max[0].max(c.x), max[1].max(c.y)];
    }
    let finite = min.iter().chain(max.iter()).all(|v| v.is_finite());
    finite.then(|| AABB::from_corners(min, max))
}

/// Référence commune d'un jeu, erreur si plusieurs
fn common_crs(records: &[FeatureRecord]) -> Result<Option<Crs>> {
    let mut crs: Option<Crs> = None;
    for record in records {
        match crs {
            None => crs = Some(record.geometry.crs),
            Some(c) if c != record.geometry.crs => {
                return Err(GeoError::CrsMismatch {
                    left: c.to_string(),
                    right: record.geometry.crs.to_string(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(crs)
}

/// Jointure de contenance entre points et polygones
///
/// Un point contenu par plusieurs polygones produit une ligne par polygone.
pub fn containment_join(
    points: &[FeatureRecord],
    polygons: &[FeatureRecord],
    options: JoinOptions,
) -> Result<JoinResult> {
    let index = PolygonIndex::build(polygons)?;

    let point_crs = common_crs(points)?;
    if let (Some(left), Some(right)) = (point_crs, index.crs()) {
        if left != right {
            return Err(GeoError::CrsMismatch {
                left: left.to_string(),
                right: right.to_string(),
            });
        }
    }

    let locations = points
        .iter()
        .map(|record| {
            record
                .geometry
                .shape
                .as_point()
                .copied()
                .ok_or_else(|| GeoError::GeometryKind {
                    id: record.id.clone(),
                    expected: "point",
                })
        })
        .collect::<Result<Vec<Point<f64>>>>()?;

    let matches = query_all(&index, &locations, options.jobs);

    let mut stats = JoinStats {
        points: points.len(),
        polygons: polygons.len(),
        ..JoinStats::default()
    };
    let mut rows = Vec::with_capacity(points.len());

    for (point_index, hits) in matches.into_iter().enumerate() {
        let point_id = &points[point_index].id;
        match hits.len() {
            0 => {
                stats.unmatched_points += 1;
                if options.mode == JoinMode::Left {
                    rows.push(JoinRow {
                        point_id: point_id.clone(),
                        polygon_id: None,
                        point_index,
                        polygon_index: None,
                    });
                }
            }
            n => {
                stats.matched_points += 1;
                if n > 1 {
                    stats.multi_matched_points += 1;
                }
                for polygon_index in hits {
                    stats.pairs += 1;
                    rows.push(JoinRow {
                        point_id: point_id.clone(),
                        polygon_id: Some(polygons[polygon_index].id.clone()),
                        point_index,
                        polygon_index: Some(polygon_index),
                    });
                }
            }
        }
    }

    info!(
        mode = %options.mode,
        points = stats.points,
        polygons = stats.polygons,
        matched = stats.matched_points,
        unmatched = stats.unmatched_points,
        rows = rows.len(),
        "Containment join complete"
    );

    Ok(JoinResult {
        mode: options.mode,
        rows,
        stats,
    })
}

/// Interroge l'index pour chaque point, résultats dans l'ordre d'entrée
fn query_all(index: &PolygonIndex, points: &[Point<f64>], jobs: usize) -> Vec<Vec<usize>> {
    if points.is_empty() {
        return Vec::new();
    }

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "Thread pool unavailable, querying sequentially");
            return points.iter().map(|p| index.containing(p)).collect();
        }
    };

    let workers = pool.current_num_threads().max(1);
    let chunk_size = points.len().div_ceil(workers).max(1);

    // Partitions disjointes; collect() préserve l'ordre des partitions
    pool.install(|| {
        points
            .par_chunks(chunk_size)
            .map(|chunk| chunk.iter().map(|p| index.containing(p)).collect::<Vec<_>>())
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    })
}

/// Matérialise les lignes de jointure en enregistrements enrichis
///
/// Chaque point reçoit les attributs `(source, cible)` du polygone
/// contenant; en jointure gauche, ces champs sont nuls sans polygone.
/// Une cible qui porte le nom d'un attribut du point le remplace (le
/// polygone a priorité); la collision est signalée une fois par champ.
pub fn enrich(
    points: &[FeatureRecord],
    polygons: &[FeatureRecord],
    result: &JoinResult,
    fields: &[(String, String)],
) -> Result<Vec<FeatureRecord>> {
    for (_, target) in fields {
        if points.iter().any(|p| p.attributes.contains(target)) {
            warn!(field = %target, "Polygon attribute replaces a point attribute of the same name");
        }
    }

    let mut out = Vec::with_capacity(result.rows.len());

    for row in &result.rows {
        let mut record = points[row.point_index].clone();
        match row.polygon_index {
            Some(pi) => {
                let polygon = &polygons[pi];
                for (source, target) in fields {
                    let value = polygon
                        .attributes
                        .get(source)
                        .cloned()
                        .ok_or_else(|| GeoError::missing_column(source).at_row(pi))?;
                    record.attributes.insert(target.clone(), value);
                }
            }
            None => {
                for (_, target) in fields {
                    record.attributes.insert(target.clone(), Value::Null);
                }
            }
        }
        out.push(record);
    }
    Ok(out)
}
