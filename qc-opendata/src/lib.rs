//! # qc-opendata
//!
//! Normalisation des jeux de données ouverts du Québec vers GeoJSON.
//!
//! ## Features
//!
//! - Lecture CSV (UTF-8 avec ou sans BOM, repli Windows-1252)
//! - Presets embarqués par jeu de données (permis, casernes, régions, zonage)
//! - Jointure points / polygones et réconciliation des permis
//! - Export GeoJSON et rapport JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Normaliser les casernes
//! qc-opendata normalize --input MSP_CASERNE_PUBLIC.csv --dataset fire_stations --output casernes.geojson
//!
//! # Casernes dans la Capitale-Nationale
//! qc-opendata join --points MSP_CASERNE_PUBLIC.csv --points-dataset fire_stations \
//!     --polygons regions.csv --polygons-dataset admin_regions \
//!     --mode inner --polygon-field name:region_name --output casernes_capitale.geojson
//!
//! # Piscines démolies
//! qc-opendata reconcile --input vdq-permis.csv --output piscines.geojson --report rapport.json
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod input;
pub mod report;

pub use config::DatasetConfig;
pub use report::{RunReport, RunStatus};
