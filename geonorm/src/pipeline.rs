//! Normalisation d'un instantané tabulaire complet
//!
//! Pour chaque ligne: filtre, décodage de la géométrie, référence spatiale,
//! quantification, validation, puis mapping des attributs. Une erreur
//! structurelle arrête le lot avec l'index de la ligne fautive; une
//! géométrie invalide est conservée et marquée.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{self, Precision};
use crate::crs::Normalizer;
use crate::error::Result;
use crate::hash::synthesize_id;
use crate::schema::{map_record, SchemaMapping};
use crate::types::parse_timestamp;
use crate::validate::{validate, DefectKind};
use crate::{Crs, FeatureRecord, GeoError, RawRecord, RawValue, Shape};

/// Provenance de la géométrie dans une ligne source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometrySource {
    /// Deux colonnes numériques (longitude, latitude ou x, y projetés)
    LonLat { x: String, y: String },
    /// Colonne WKT, préfixe `SRID=n;` accepté
    Wkt { column: String },
    /// Colonne WKB en hexadécimal (EWKB accepté)
    Wkb { column: String },
}

impl GeometrySource {
    pub fn lon_lat(x: impl Into<String>, y: impl Into<String>) -> Self {
        GeometrySource::LonLat {
            x: x.into(),
            y: y.into(),
        }
    }
}

/// Origine de `updated_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatedAt {
    /// Horodatage des métadonnées de l'instantané
    Snapshot(DateTime<Utc>),
    /// Colonne de la source
    Column(String),
}

/// Filtre d'égalité appliqué avant le mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub equals: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, equals: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            equals: equals.into(),
        }
    }

    fn keeps(&self, record: &RawRecord) -> Result<bool> {
        let value = record
            .get(&self.column)
            .ok_or_else(|| GeoError::missing_column(&self.column))?;
        Ok(value.as_text().is_some_and(|v| v.trim() == self.equals))
    }
}

/// Paramètres de normalisation d'un jeu de données
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub geometry: GeometrySource,
    /// Référence déclarée de la source; sinon SRID embarqué, sinon EPSG:4326
    pub source_crs: Option<Crs>,
    pub target_crs: Crs,
    /// Par défaut selon la référence cible
    pub precision: Option<Precision>,
    /// Clé naturelle; absente, l'identifiant est synthétisé
    pub id_column: Option<String>,
    pub updated_at: UpdatedAt,
    pub mapping: SchemaMapping,
    pub wanted: Vec<String>,
    pub final_order: Vec<String>,
    pub filter: Option<RowFilter>,
}

impl NormalizeOptions {
    pub fn new(geometry: GeometrySource, updated_at: UpdatedAt) -> Self {
        Self {
            geometry,
            source_crs: None,
            target_crs: Crs::WGS84,
            precision: None,
            id_column: None,
            updated_at,
            mapping: SchemaMapping::default(),
            wanted: Vec::new(),
            final_order: Vec::new(),
            filter: None,
        }
    }

    pub fn with_mapping(mut self, mapping: SchemaMapping, wanted: Vec<String>) -> Self {
        self.mapping = mapping;
        self.wanted = wanted;
        self
    }

    pub fn with_source_crs(mut self, crs: Crs) -> Self {
        self.source_crs = Some(crs);
        self
    }

    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = crs;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn with_final_order(mut self, order: Vec<String>) -> Self {
        self.final_order = order;
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn effective_precision(&self) -> Precision {
        self.precision
            .unwrap_or_else(|| Precision::for_epsg(self.target_crs.epsg))
    }
}

/// Statistiques d'un lot normalisé
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub read: usize,
    pub filtered: usize,
    pub written: usize,
    /// Lignes sans référence déclarée (EPSG:4326 supposé)
    pub crs_defaulted: usize,
    pub invalid: BTreeMap<DefectKind, usize>,
}

impl NormalizeStats {
    pub fn invalid_count(&self) -> usize {
        self.invalid.values().sum()
    }
}

/// Enregistrements normalisés et statistiques
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<FeatureRecord>,
    pub stats: NormalizeStats,
}

/// Normalise un lot de lignes brutes
pub fn normalize_records(rows: &[RawRecord], options: &NormalizeOptions) -> Result<NormalizedBatch> {
    let mut normalizer = Normalizer::new(options.target_crs);
    let precision = options.effective_precision();
    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(rows.len()),
        stats: NormalizeStats {
            read: rows.len(),
            ..NormalizeStats::default()
        },
    };

    for (index, row) in rows.iter().enumerate() {
        match normalize_row(row, options, precision, &mut normalizer).map_err(|e| e.at_row(index))? {
            Some(record) => {
                if let Some(defect) = record.defect {
                    warn!(row = index, id = %record.id, defect = %defect, "Invalid geometry kept");
                    *batch.stats.invalid.entry(defect).or_insert(0) += 1;
                }
                batch.records.push(record);
            }
            None => batch.stats.filtered += 1,
        }
    }

    batch.stats.written = batch.records.len();
    batch.stats.crs_defaulted = normalizer.defaulted_count();

    info!(
        read = batch.stats.read,
        written = batch.stats.written,
        filtered = batch.stats.filtered,
        invalid = batch.stats.invalid_count(),
        crs_defaulted = batch.stats.crs_defaulted,
        target = %options.target_crs,
        "Batch normalized"
    );
    Ok(batch)
}

fn normalize_row(
    row: &RawRecord,
    options: &NormalizeOptions,
    precision: Precision,
    normalizer: &mut Normalizer,
) -> Result<Option<FeatureRecord>> {
    if let Some(filter) = &options.filter {
        if !filter.keeps(row)? {
            return Ok(None);
        }
    }

    let (embedded, shape) = decode_geometry(row, &options.geometry)?;
    let declared = options.source_crs.or(embedded);
    let normalized = normalizer.normalize(&shape, declared)?;

    let mut geometry = normalized.geometry;
    geometry.shape = codec::quantize(&geometry.shape, precision);
    let validation = validate(&geometry.shape);

    let attributes = map_record(row, &options.mapping, &options.wanted, &options.final_order)?;
    let updated_at = updated_at(row, &options.updated_at)?;

    let natural_id = match &options.id_column {
        Some(column) => row
            .get(column)
            .ok_or_else(|| GeoError::missing_column(column))?
            .as_text()
            .map(|id| id.trim().to_string()),
        None => None,
    };
    let id = natural_id.unwrap_or_else(|| synthesize_id(&geometry.shape, &attributes));

    debug!(id = %id, kind = geometry.shape.kind(), valid = validation.valid, "Row normalized");

    Ok(Some(FeatureRecord {
        id,
        geometry,
        attributes,
        updated_at,
        is_valid_geometry: validation.valid,
        defect: validation.reason,
    }))
}

/// Décode la géométrie d'une ligne, avec le SRID embarqué s'il existe
pub fn decode_geometry(row: &RawRecord, source: &GeometrySource) -> Result<(Option<Crs>, Shape)> {
    match source {
        GeometrySource::LonLat { x, y } => {
            let point = geo::Point::new(coordinate(row, x)?, coordinate(row, y)?);
            Ok((None, Shape::Point(point)))
        }
        GeometrySource::Wkt { column } => codec::from_ewkt(&text_cell(row, column)?),
        GeometrySource::Wkb { column } => codec::from_wkb_hex(&text_cell(row, column)?),
    }
}

fn cell<'a>(row: &'a RawRecord, column: &str) -> Result<&'a RawValue> {
    row.get(column).ok_or_else(|| GeoError::missing_column(column))
}

fn text_cell(row: &RawRecord, column: &str) -> Result<String> {
    cell(row, column)?
        .as_text()
        .map(|s| s.into_owned())
        .ok_or_else(|| GeoError::parse(0, "", format!("empty geometry cell in column {}", column)))
}

fn coordinate(row: &RawRecord, column: &str) -> Result<f64> {
    let raw = cell(row, column)?;
    raw.as_f64().ok_or_else(|| GeoError::InvalidCoordinate {
        column: column.to_string(),
        value: raw.as_text().map(|s| s.into_owned()).unwrap_or_default(),
    })
}

fn updated_at(row: &RawRecord, source: &UpdatedAt) -> Result<DateTime<Utc>> {
    match source {
        UpdatedAt::Snapshot(ts) => Ok(*ts),
        UpdatedAt::Column(column) => {
            let raw = cell(row, column)?;
            raw.as_text()
                .and_then(|s| parse_timestamp(&s))
                .ok_or_else(|| GeoError::InvalidTimestamp {
                    column: column.clone(),
                    value: raw.as_text().map(|s| s.into_owned()).unwrap_or_default(),
                })
        }
    }
}
