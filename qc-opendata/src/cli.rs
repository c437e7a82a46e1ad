//! Définition et implémentation des commandes CLI
//!
//! - `normalize`: CSV → GeoJSON canonique
//! - `join`: points dans polygones, points enrichis en GeoJSON
//! - `reconcile`: cycle de vie des permis (installations remplacées)

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use geonorm::{
    containment_join, enrich, normalize_records, Crs, JoinMode, JoinOptions, NormalizedBatch,
    Precision, Value,
};

use crate::config::DatasetConfig;
use crate::export::export_to_geojson;
use crate::input::read_csv;
use crate::report::RunReport;

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize a CSV snapshot into canonical GeoJSON
    Normalize {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset preset name or path to a JSON dataset config
        #[arg(short, long)]
        dataset: String,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Containment join of a point dataset into a polygon dataset
    Join {
        /// Point CSV file
        #[arg(long)]
        points: PathBuf,

        /// Dataset config of the point file
        #[arg(long)]
        points_dataset: String,

        /// Polygon CSV file
        #[arg(long)]
        polygons: PathBuf,

        /// Dataset config of the polygon file
        #[arg(long)]
        polygons_dataset: String,

        /// Join semantics: inner drops points outside every polygon, left keeps them
        #[arg(long, default_value = "inner")]
        mode: JoinMode,

        /// Polygon attribute copied onto points, as `source:target` (repeatable)
        #[arg(long = "polygon-field")]
        polygon_fields: Vec<String>,

        /// Worker threads for the join (default: one per core)
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Flag installations superseded by a later removal (pool demolitions)
    Reconcile {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset config carrying a lifecycle rule
        #[arg(short, long, default_value = "permits")]
        dataset: String,

        /// Output GeoJSON file (installations with their flag)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options partagées par toutes les commandes
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Drop records whose geometry failed validation
    #[arg(long)]
    pub only_valid: bool,

    /// Target SRID (default: 4326 / WGS84)
    #[arg(long, default_value_t = 4326)]
    pub target_srid: u32,

    /// Coordinate precision (decimal places). Default: dataset setting, else 7 for 4326, 2 for metric SRIDs
    #[arg(long)]
    pub precision: Option<u32>,
}

impl CommonArgs {
    fn target(&self) -> Crs {
        Crs::epsg(self.target_srid)
    }

    fn precision(&self) -> Option<Precision> {
        self.precision.map(Precision::Decimals)
    }
}

/// Exécute une commande et produit son rapport, même en cas d'échec
fn run_with_report(
    command: &str,
    common: &CommonArgs,
    body: impl FnOnce(&mut RunReport) -> Result<()>,
) -> Result<()> {
    let start = Instant::now();
    let mut report = RunReport::new(command);

    let outcome = body(&mut report);
    if let Err(e) = &outcome {
        report.record_error(format!("{:#}", e));
    }

    report.set_duration(start.elapsed());
    report.finalize();
    report.display();

    if let Some(path) = &common.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report written");
    }

    outcome
}

/// Lit et normalise un fichier selon sa configuration
///
/// Le rapport range le lot sous `role` s'il est donné, sinon sous le nom du jeu.
fn load_dataset(
    input: &Path,
    dataset: &str,
    role: Option<&str>,
    common: &CommonArgs,
    report: &mut RunReport,
) -> Result<(DatasetConfig, NormalizedBatch)> {
    let config = DatasetConfig::resolve(dataset)
        .with_context(|| format!("Cannot load dataset config {}", dataset))?;
    let options = config.to_options(common.target(), common.precision())?;

    let rows = read_csv(input)?;
    let mut batch = normalize_records(&rows, &options)
        .with_context(|| format!("Normalization of {} failed", input.display()))?;

    let mut dropped = 0;
    if common.only_valid {
        let before = batch.records.len();
        batch.records.retain(|r| r.is_valid_geometry);
        dropped = before - batch.records.len();
        if dropped > 0 {
            warn!(dataset = %config.name, dropped, "Invalid geometries dropped");
        }
    }

    let key = role.unwrap_or(config.name.as_str());
    report.record_dataset(key, &config.name, &batch.stats, dropped);
    Ok((config, batch))
}

/// Exécute la commande normalize
pub fn cmd_normalize(input: &Path, dataset: &str, output: &Path, common: &CommonArgs) -> Result<()> {
    run_with_report("normalize", common, |report| {
        let (config, batch) = load_dataset(input, dataset, None, common, report)?;
        export_to_geojson(&batch.records, common.target(), output)?;
        info!(
            dataset = %config.name,
            records = batch.records.len(),
            output = %output.display(),
            "GeoJSON written"
        );
        Ok(())
    })
}

/// Paramètres de la commande join
pub struct JoinArgs<'a> {
    pub points: &'a Path,
    pub points_dataset: &'a str,
    pub polygons: &'a Path,
    pub polygons_dataset: &'a str,
    pub mode: JoinMode,
    pub polygon_fields: &'a [String],
    pub jobs: Option<usize>,
    pub output: &'a Path,
}

/// Exécute la commande join
pub fn cmd_join(args: JoinArgs<'_>, common: &CommonArgs) -> Result<()> {
    let fields = parse_field_pairs(args.polygon_fields)?;

    run_with_report("join", common, |report| {
        let (_, points) = load_dataset(args.points, args.points_dataset, Some("points"), common, report)?;
        let (_, polygons) = load_dataset(args.polygons, args.polygons_dataset, Some("polygons"), common, report)?;

        let options = JoinOptions::new(args.mode).with_jobs(args.jobs.unwrap_or(0));
        let result = containment_join(&points.records, &polygons.records, options)?;
        report.record_join(&result.stats);

        let mut enriched = enrich(&points.records, &polygons.records, &result, &fields)?;
        for (record, row) in enriched.iter_mut().zip(&result.rows) {
            let polygon_id = row.polygon_id.clone().map(Value::Text).unwrap_or(Value::Null);
            record.attributes.insert("polygon_id", polygon_id);
        }

        export_to_geojson(&enriched, common.target(), args.output)?;
        info!(rows = enriched.len(), output = %args.output.display(), "Joined GeoJSON written");
        Ok(())
    })
}

/// Exécute la commande reconcile
pub fn cmd_reconcile(input: &Path, dataset: &str, output: &Path, common: &CommonArgs) -> Result<()> {
    run_with_report("reconcile", common, |report| {
        let (config, batch) = load_dataset(input, dataset, None, common, report)?;
        let rule = config
            .lifecycle
            .as_ref()
            .with_context(|| format!("Dataset {} has no lifecycle rule", config.name))?;

        let outcome = rule.apply(&batch.records)?;
        report.record_lifecycle(&outcome);

        export_to_geojson(&outcome.installations, common.target(), output)?;
        info!(
            installations = outcome.installations.len(),
            output = %output.display(),
            "Reconciled GeoJSON written"
        );
        Ok(())
    })
}

/// Parse les paires `source:target` (ou `nom` seul: même nom des deux côtés)
fn parse_field_pairs(specs: &[String]) -> Result<Vec<(String, String)>> {
    specs
        .iter()
        .map(|spec| {
            let (source, target) = spec.split_once(':').unwrap_or((spec.as_str(), spec.as_str()));
            let (source, target) = (source.trim(), target.trim());
            if source.is_empty() || target.is_empty() {
                anyhow::bail!("Invalid polygon field: '{}'. Expected source:target", spec);
            }
            Ok((source.to_string(), target.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_pairs() {
        let pairs = parse_field_pairs(&["name:region_name".to_string(), "region_id".to_string()]).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "region_name".to_string()),
                ("region_id".to_string(), "region_id".to_string()),
            ]
        );
        assert!(parse_field_pairs(&[":x".to_string()]).is_err());
    }
}
