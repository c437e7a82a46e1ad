//! Configuration des jeux de données

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use geonorm::pipeline::{GeometrySource, NormalizeOptions, RowFilter, UpdatedAt};
use geonorm::types::parse_timestamp;
use geonorm::{Crs, FieldMapping, LifecycleRule, Precision, SchemaMapping};

/// Noms des presets embarqués
pub const PRESETS: &[&str] = &[
    "permits",
    "fire_stations",
    "admin_regions",
    "zoning",
    "agricultural_zones",
    "civil_security_events",
];

/// Configuration d'un jeu de données source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Nom du jeu (utilisé dans les rapports)
    pub name: String,

    /// Référence déclarée de la source (absente: EPSG:4326 avec avertissement)
    #[serde(default)]
    pub source_crs: Option<Crs>,

    /// Colonnes portant la géométrie
    pub geometry: GeometryConfig,

    /// Clé naturelle; absente, l'identifiant est synthétisé
    #[serde(default)]
    pub id_column: Option<String>,

    /// Horodatage de l'instantané ou colonne source
    pub updated_at: UpdatedAtConfig,

    /// Colonnes source retenues
    pub wanted: Vec<String>,

    /// Mapping source -> champ canonique
    pub fields: Vec<FieldMapping>,

    /// Colonnes volontairement écartées
    #[serde(default)]
    pub excluded: Vec<String>,

    /// Ordre final des champs (vide: ordre de `wanted`)
    #[serde(default)]
    pub final_order: Vec<String>,

    #[serde(default)]
    pub filter: Option<FilterConfig>,

    /// Quantification (défaut selon la référence cible)
    #[serde(default)]
    pub precision: Option<Precision>,

    /// Règle de cycle de vie (permis)
    #[serde(default)]
    pub lifecycle: Option<LifecycleRule>,
}

/// Provenance de la géométrie
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryConfig {
    LonLat { x: String, y: String },
    Wkt { column: String },
    Wkb { column: String },
}

/// Origine de `updated_at`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatedAtConfig {
    /// Date des métadonnées, ex: `2025-08-27 06:58:00`
    Snapshot(String),
    Column(String),
}

/// Filtre d'égalité sur une colonne source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    pub column: String,
    pub equals: String,
}

impl DatasetConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read dataset config: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse dataset config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "permits" => Self::load_embedded(include_str!("presets/permits.json")),
            "fire_stations" => Self::load_embedded(include_str!("presets/fire_stations.json")),
            "admin_regions" => Self::load_embedded(include_str!("presets/admin_regions.json")),
            "zoning" => Self::load_embedded(include_str!("presets/zoning.json")),
            "agricultural_zones" => {
                Self::load_embedded(include_str!("presets/agricultural_zones.json"))
            }
            "civil_security_events" => {
                Self::load_embedded(include_str!("presets/civil_security_events.json"))
            }
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        if PRESETS.contains(&spec) {
            Self::from_preset(spec)
        } else {
            Self::load(Path::new(spec))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded dataset config")
    }

    /// Options de normalisation vers la référence cible
    pub fn to_options(&self, target: Crs, precision: Option<Precision>) -> Result<NormalizeOptions> {
        let geometry = match &self.geometry {
            GeometryConfig::LonLat { x, y } => GeometrySource::lon_lat(x, y),
            GeometryConfig::Wkt { column } => GeometrySource::Wkt {
                column: column.clone(),
            },
            GeometryConfig::Wkb { column } => GeometrySource::Wkb {
                column: column.clone(),
            },
        };

        let updated_at = match &self.updated_at {
            UpdatedAtConfig::Snapshot(raw) => UpdatedAt::Snapshot(
                parse_timestamp(raw)
                    .with_context(|| format!("Invalid snapshot timestamp in {}: {}", self.name, raw))?,
            ),
            UpdatedAtConfig::Column(column) => UpdatedAt::Column(column.clone()),
        };

        let mapping =
            SchemaMapping::new(self.fields.clone()).with_excluded(self.excluded.iter().cloned());
        mapping
            .check_targets()
            .with_context(|| format!("Invalid mapping in dataset {}", self.name))?;

        let mut options = NormalizeOptions::new(geometry, updated_at)
            .with_mapping(mapping, self.wanted.clone())
            .with_target_crs(target)
            .with_final_order(self.final_order.clone());
        options.source_crs = self.source_crs;
        options.id_column = self.id_column.clone();
        options.precision = precision.or(self.precision);
        options.filter = self
            .filter
            .as_ref()
            .map(|f| RowFilter::new(&f.column, &f.equals));

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_parse() {
        for name in PRESETS {
            let config = DatasetConfig::from_preset(name).unwrap();
            assert_eq!(config.name, *name);
            config.to_options(Crs::WGS84, None).unwrap();
        }
    }

    #[test]
    fn test_unknown_preset() {
        assert!(DatasetConfig::from_preset("parcels").is_err());
    }

    #[test]
    fn test_permits_lifecycle_rule() {
        let config = DatasetConfig::from_preset("permits").unwrap();
        let rule = config.lifecycle.unwrap();
        assert_eq!(rule.flag, "is_demolished");
        assert_eq!(rule.key_fields, vec!["work_address", "affected_lots", "borough"]);
    }

    #[test]
    fn test_admin_regions_filter_and_grid() {
        let config = DatasetConfig::from_preset("admin_regions").unwrap();
        let options = config.to_options(Crs::WGS84, None).unwrap();
        assert_eq!(options.filter.unwrap().equals, "Capitale-Nationale");
        assert_eq!(options.precision, Some(Precision::Grid(0.0000001)));
    }

    #[test]
    fn test_zoning_has_no_declared_crs() {
        let config = DatasetConfig::from_preset("zoning").unwrap();
        assert!(config.source_crs.is_none());
        assert!(config.excluded.contains(&"ID".to_string()));
    }

    #[test]
    fn test_duplicate_target_rejected_at_load() {
        let json = r#"{
            "name": "stations",
            "geometry": { "kind": "lon_lat", "x": "X", "y": "Y" },
            "updated_at": { "snapshot": "2025-08-27 06:58:00" },
            "wanted": ["NOM", "NOM_COURT"],
            "fields": [
                { "source": "NOM", "target": "name" },
                { "source": "NOM_COURT", "target": "name" }
            ]
        }"#;
        let config: DatasetConfig = serde_json::from_str(json).unwrap();
        let err = config.to_options(Crs::WGS84, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Duplicate target field name"));
    }
}
