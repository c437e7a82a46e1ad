//! # geonorm
//!
//! Moteur de normalisation et de réconciliation géospatiale pour les jeux de
//! données ouverts (permis, casernes, régions administratives, zonage).
//!
//! ## Features
//!
//! - Codec WKT / WKB (EWKT, EWKB PostGIS, hexadécimal) et quantification
//! - Validation géométrique avec défaut typé, sans jamais rejeter la ligne
//! - Reprojection légère en Rust pur (Lambert Québec, MTM, UTM, Web Mercator),
//!   PROJ en option (feature `reproject`)
//! - Mapping de schéma strict: colonne absente ou non mappée = erreur nommée
//! - Jointure de contenance point / polygone indexée (R-tree, rayon)
//! - Réconciliation du cycle de vie (installation / démolition)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geonorm::{containment_join, normalize_records, JoinMode, JoinOptions};
//!
//! let stations = normalize_records(&rows, &station_options)?;
//! let regions = normalize_records(&region_rows, &region_options)?;
//!
//! let result = containment_join(
//!     &stations.records,
//!     &regions.records,
//!     JoinOptions::new(JoinMode::Left),
//! )?;
//! println!("{} points sans région", result.stats.unmatched_points);
//! ```

pub mod codec;
pub mod crs;
pub mod error;
pub mod hash;
pub mod join;
pub mod lifecycle;
pub mod pipeline;
pub mod schema;
pub mod types;
pub mod validate;

pub use codec::Precision;
pub use crs::{normalize, Normalized, Normalizer};
pub use error::{GeoError, Result};
pub use join::{containment_join, enrich, JoinMode, JoinOptions, JoinResult, JoinRow, PolygonIndex};
pub use lifecycle::{reconcile, LifecycleMatch, LifecycleRule, Reconciliation};
pub use pipeline::{normalize_records, GeometrySource, NormalizeOptions, NormalizedBatch, RowFilter, UpdatedAt};
pub use schema::{map_record, DataType, FieldMapping, SchemaMapping};
pub use types::{
    Attributes, Crs, FeatureRecord, Geometry, RawRecord, RawValue, Rings, Shape, Value,
};
pub use validate::{validate, DefectKind, Validation};
