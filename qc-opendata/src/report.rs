//! Rapport d'exécution
//!
//! Collecte les statistiques d'une commande (normalisation, jointure,
//! réconciliation) pour l'affichage console et l'export JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use geonorm::join::JoinStats;
use geonorm::lifecycle::{LifecycleMatch, LifecycleOutcome};
use geonorm::pipeline::NormalizeStats;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Aucune géométrie invalide ni erreur
    Success,
    /// Sortie produite, avec des géométries invalides ou écartées
    PartialSuccess,
    /// Erreur fatale: aucune sortie
    Failed,
}

/// Statistiques d'un jeu normalisé
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetStats {
    /// Nom de la configuration du jeu
    pub dataset: String,
    pub read: usize,
    pub filtered: usize,
    pub written: usize,
    /// Géométries invalides écartées par `--only-valid`
    pub dropped_invalid: usize,
    pub crs_defaulted: usize,
    pub invalid_by_defect: BTreeMap<String, usize>,
}

/// Résumé de réconciliation
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleSummary {
    pub installations: usize,
    pub removals: usize,
    pub ignored: usize,
    pub superseded: usize,
    /// Paires (installation, retrait) appariées
    pub matches: Vec<LifecycleMatch>,
    pub orphaned_removals: Vec<String>,
}

/// Rapport complet d'une commande
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    /// Statistiques par rôle (`points`, `polygons`) ou par jeu de données
    pub datasets: BTreeMap<String, DatasetStats>,

    pub join: Option<JoinStats>,
    pub lifecycle: Option<LifecycleSummary>,

    /// Erreurs fatales
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            datasets: BTreeMap::new(),
            join: None,
            lifecycle: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Enregistre les statistiques d'un lot normalisé sous `key`
    pub fn record_dataset(
        &mut self,
        key: &str,
        name: &str,
        stats: &NormalizeStats,
        dropped_invalid: usize,
    ) {
        if stats.crs_defaulted > 0 {
            self.warnings.push(format!(
                "{}: {} rows without declared CRS, EPSG:4326 assumed",
                key, stats.crs_defaulted
            ));
        }
        self.datasets.insert(
            key.to_string(),
            DatasetStats {
                dataset: name.to_string(),
                read: stats.read,
                filtered: stats.filtered,
                written: stats.written - dropped_invalid,
                dropped_invalid,
                crs_defaulted: stats.crs_defaulted,
                invalid_by_defect: stats
                    .invalid
                    .iter()
                    .map(|(kind, count)| (kind.to_string(), *count))
                    .collect(),
            },
        );
    }

    pub fn record_join(&mut self, stats: &JoinStats) {
        if stats.multi_matched_points > 0 {
            self.warnings.push(format!(
                "{} points fall inside several polygons",
                stats.multi_matched_points
            ));
        }
        self.join = Some(stats.clone());
    }

    pub fn record_lifecycle(&mut self, outcome: &LifecycleOutcome) {
        self.lifecycle = Some(LifecycleSummary {
            installations: outcome.installations.len(),
            removals: outcome.removals,
            ignored: outcome.ignored,
            superseded: outcome.reconciliation.superseded_count(),
            matches: outcome.reconciliation.matches.clone(),
            orphaned_removals: outcome.reconciliation.orphaned_removals.clone(),
        });
    }

    /// Enregistre une erreur fatale
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Nombre total de géométries invalides
    pub fn invalid_geometries(&self) -> usize {
        self.datasets
            .values()
            .flat_map(|d| d.invalid_by_defect.values())
            .sum()
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if !self.errors.is_empty() {
            RunStatus::Failed
        } else if self.invalid_geometries() > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT - {}", self.command);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        if !self.datasets.is_empty() {
            println!("\n--- DATASETS ---");
            for (name, stats) in &self.datasets {
                println!(
                    "  {} [{}]: {} read, {} filtered, {} written, {} CRS defaulted",
                    name, stats.dataset, stats.read, stats.filtered, stats.written, stats.crs_defaulted
                );
                for (defect, count) in &stats.invalid_by_defect {
                    println!("    invalid {}: {}", defect, count);
                }
                if stats.dropped_invalid > 0 {
                    println!("    dropped (only valid): {}", stats.dropped_invalid);
                }
            }
        }

        if let Some(join) = &self.join {
            println!("\n--- JOIN ---");
            println!(
                "  {} points x {} polygons: {} matched, {} unmatched, {} pairs",
                join.points, join.polygons, join.matched_points, join.unmatched_points, join.pairs
            );
        }

        if let Some(lifecycle) = &self.lifecycle {
            println!("\n--- LIFECYCLE ---");
            println!(
                "  {} installations, {} removals, {} superseded, {} orphaned removals",
                lifecycle.installations,
                lifecycle.removals,
                lifecycle.superseded,
                lifecycle.orphaned_removals.len()
            );
            for m in lifecycle.matches.iter().take(10) {
                println!("    {} superseded by {}", m.installation_id, m.removal_id);
            }
            if lifecycle.matches.len() > 10 {
                println!("    ... and {} more", lifecycle.matches.len() - 10);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  {}", w);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in &self.errors {
                println!("  {}", e);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write report to {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let written: usize = self.datasets.values().map(|d| d.written).sum();
        format!(
            "{}: {} written, {} invalid geometries, {} errors",
            self.command,
            written,
            self.invalid_geometries(),
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geonorm::DefectKind;

    fn stats(invalid: usize) -> NormalizeStats {
        let mut s = NormalizeStats {
            read: 10,
            filtered: 2,
            written: 8,
            crs_defaulted: 0,
            ..Default::default()
        };
        if invalid > 0 {
            s.invalid.insert(DefectKind::SelfIntersection, invalid);
        }
        s
    }

    #[test]
    fn test_finalize_success() {
        let mut report = RunReport::new("normalize");
        report.record_dataset("zoning", "zoning", &stats(0), 0);
        report.finalize();
        assert_eq!(report.status, RunStatus::Success);
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = RunReport::new("normalize");
        report.record_dataset("zoning", "zoning", &stats(3), 3);
        report.finalize();

        assert_eq!(report.status, RunStatus::PartialSuccess);
        let zoning = &report.datasets["zoning"];
        assert_eq!(zoning.written, 5);
        assert_eq!(zoning.invalid_by_defect["SelfIntersection"], 3);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = RunReport::new("join");
        report.record_error("Row 4: Missing column: LONGITUDE");
        report.finalize();
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_crs_default_warning() {
        let mut report = RunReport::new("normalize");
        let mut s = stats(0);
        s.crs_defaulted = 8;
        report.record_dataset("zoning", "zoning", &s, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("EPSG:4326"));
    }

    #[test]
    fn test_summary() {
        let mut report = RunReport::new("normalize");
        report.record_dataset("permits", "permits", &stats(1), 0);
        let summary = report.summary();
        assert!(summary.contains("8 written"));
        assert!(summary.contains("1 invalid"));
    }

    #[test]
    fn test_join_inputs_keyed_by_role() {
        let mut report = RunReport::new("join");
        report.record_dataset("points", "stations", &stats(0), 0);
        report.record_dataset("polygons", "stations", &stats(1), 0);

        assert_eq!(report.datasets.len(), 2);
        assert_eq!(report.datasets["points"].dataset, "stations");
        assert_eq!(report.invalid_geometries(), 1);
    }
}
