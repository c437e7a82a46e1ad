//! Réconciliation du cycle de vie d'entités ponctuelles
//!
//! Une installation est remplacée (`superseded`) quand un retrait désigne la
//! même propriété. Faute d'identifiant de propriété stable dans les sources,
//! l'identité est approximative: chaque champ clé doit se contenir
//! mutuellement (sous-chaîne, sans casse) dans un sens ou dans l'autre.
//!
//! Politique: les retraits sont parcourus dans l'ordre d'entrée, chacun
//! prend la première installation libre qui correspond. Une installation
//! n'est appariée qu'une seule fois.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::{FeatureRecord, GeoError, Value};

/// Appariement installation / retrait
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleMatch {
    pub installation_id: String,
    pub removal_id: String,
    pub superseded: bool,
}

/// Résultat de réconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Paires appariées, dans l'ordre des retraits
    pub matches: Vec<LifecycleMatch>,
    /// Retraits sans installation correspondante (informatif)
    pub orphaned_removals: Vec<String>,
    /// Drapeau par installation, dans l'ordre d'entrée
    #[serde(skip)]
    pub superseded: Vec<bool>,
}

impl Reconciliation {
    pub fn superseded_count(&self) -> usize {
        self.superseded.iter().filter(|s| **s).count()
    }
}

/// Égalité approximative de deux valeurs d'attribut
///
/// Une valeur nulle ou vide ne correspond jamais.
pub fn approx_matches(a: &Value, b: &Value) -> bool {
    match (normalized(a), normalized(b)) {
        (Some(a), Some(b)) => key_matches(&a, &b),
        _ => false,
    }
}

fn normalized(value: &Value) -> Option<String> {
    value
        .as_text()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn key_matches(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Clés normalisées d'un enregistrement
///
/// `Ok(None)` si un champ est nul ou vide; un champ absent est une erreur.
fn keys_of(record: &FeatureRecord, key_fields: &[String]) -> Result<Option<Vec<String>>> {
    let mut keys = Vec::with_capacity(key_fields.len());
    for field in key_fields {
        let value = record
            .attributes
            .get(field)
            .ok_or_else(|| GeoError::missing_column(field))?;
        match normalized(value) {
            Some(key) => keys.push(key),
            None => return Ok(None),
        }
    }
    Ok(Some(keys))
}

/// Apparie les retraits aux installations (première correspondance)
pub fn reconcile(
    installations: &[FeatureRecord],
    removals: &[FeatureRecord],
    key_fields: &[String],
) -> Result<Reconciliation> {
    let installation_keys = installations
        .iter()
        .enumerate()
        .map(|(i, r)| keys_of(r, key_fields).map_err(|e| e.at_row(i)))
        .collect::<Result<Vec<_>>>()?;
    let mut superseded = vec![false; installations.len()];
    let mut result = Reconciliation::default();

    for (index, removal) in removals.iter().enumerate() {
        let removal_keys = keys_of(removal, key_fields).map_err(|e| e.at_row(index))?;
        let found = removal_keys.and_then(|removal_keys| {
            installation_keys.iter().enumerate().position(|(i, keys)| {
                !superseded[i]
                    && keys.as_ref().is_some_and(|keys| {
                        keys.iter()
                            .zip(&removal_keys)
                            .all(|(a, b)| key_matches(a, b))
                    })
            })
        });

        match found {
            Some(i) => {
                superseded[i] = true;
                debug!(installation = %installations[i].id, removal = %removal.id, "Lifecycle match");
                result.matches.push(LifecycleMatch {
                    installation_id: installations[i].id.clone(),
                    removal_id: removal.id.clone(),
                    superseded: true,
                });
            }
            None => result.orphaned_removals.push(removal.id.clone()),
        }
    }

    result.superseded = superseded;
    Ok(result)
}

/// Règle de cycle de vie d'un jeu de données (ex: piscines des permis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    /// Champ portant la raison du permis
    pub reason_field: String,
    /// Motif de la catégorie suivie (`piscine`)
    pub category: String,
    /// Motif des retraits dans la catégorie (`démolition`)
    pub removal: String,
    /// Champs d'identité approximative, dans l'ordre
    pub key_fields: Vec<String>,
    /// Attribut booléen écrit sur chaque installation
    pub flag: String,
}

/// Partition d'un lot selon une règle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecyclePartition {
    pub installations: Vec<FeatureRecord>,
    pub removals: Vec<FeatureRecord>,
    /// Enregistrements hors catégorie
    pub ignored: usize,
}

/// Installations annotées et statistiques
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleOutcome {
    pub installations: Vec<FeatureRecord>,
    pub removals: usize,
    pub ignored: usize,
    pub reconciliation: Reconciliation,
}

impl LifecycleRule {
    fn pattern(pattern: &str) -> Result<Regex> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| GeoError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sépare installations et retraits de la catégorie suivie
    pub fn partition(&self, records: &[FeatureRecord]) -> Result<LifecyclePartition> {
        let category = Self::pattern(&self.category)?;
        let removal = Self::pattern(&self.removal)?;
        let mut out = LifecyclePartition::default();

        for (index, record) in records.iter().enumerate() {
            let reason = record
                .attributes
                .get(&self.reason_field)
                .ok_or_else(|| GeoError::missing_column(&self.reason_field).at_row(index))?
                .as_text()
                .unwrap_or_default();
            if !category.is_match(&reason) {
                out.ignored += 1;
            } else if removal.is_match(&reason) {
                out.removals.push(record.clone());
            } else {
                out.installations.push(record.clone());
            }
        }
        Ok(out)
    }

    /// Partitionne, réconcilie et écrit le drapeau sur chaque installation
    pub fn apply(&self, records: &[FeatureRecord]) -> Result<LifecycleOutcome> {
        let LifecyclePartition {
            mut installations,
            removals,
            ignored,
        } = self.partition(records)?;

        let reconciliation = reconcile(&installations, &removals, &self.key_fields)?;
        for (record, superseded) in installations.iter_mut().zip(&reconciliation.superseded) {
            record.attributes.insert(self.flag.clone(), Value::Boolean(*superseded));
        }

        info!(
            installations = installations.len(),
            removals = removals.len(),
            superseded = reconciliation.superseded_count(),
            orphaned = reconciliation.orphaned_removals.len(),
            "Lifecycle reconciliation complete"
        );

        Ok(LifecycleOutcome {
            installations,
            removals: removals.len(),
            ignored,
            reconciliation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attributes, Crs, Geometry, Shape};
    use chrono::Utc;
    use geo::Point;

    fn permit(id: &str, address: &str, lot: &str, borough: &str, reason: &str) -> FeatureRecord {
        let attributes: Attributes = [
            ("address", address),
            ("lot", lot),
            ("borough", borough),
            ("reason", reason),
        ]
        .into_iter()
        .map(|(k, v)| {
            let value = if v.is_empty() { Value::Null } else { Value::Text(v.to_string()) };
            (k.to_string(), value)
        })
        .collect();

        FeatureRecord {
            id: id.to_string(),
            geometry: Geometry::new(Shape::Point(Point::new(-71.2, 46.8)), Crs::WGS84),
            attributes,
            updated_at: Utc::now(),
            is_valid_geometry: true,
            defect: None,
        }
    }

    fn keys() -> Vec<String> {
        vec!["address".into(), "lot".into(), "borough".into()]
    }

    #[test]
    fn test_substring_match_supersedes() {
        let installs = vec![permit("1", "10 Main", "L1", "X", "Installation de piscine")];
        let removals = vec![permit("2", "10 Main St", "L1", "X", "Démolition")];

        let result = reconcile(&installs, &removals, &keys()).unwrap();
        assert_eq!(
            result.matches,
            vec![LifecycleMatch {
                installation_id: "1".into(),
                removal_id: "2".into(),
                superseded: true,
            }]
        );
        assert!(result.orphaned_removals.is_empty());
    }

    #[test]
    fn test_first_match_wins() {
        let installs = vec![
            permit("A", "10 Main", "L1", "X", ""),
            permit("B", "10 Main", "L1", "X", ""),
        ];
        let removals = vec![permit("R", "10 main", "l1", "x", "")];

        let result = reconcile(&installs, &removals, &keys()).unwrap();
        assert_eq!(result.superseded, vec![true, false]);
        assert_eq!(result.matches[0].installation_id, "A");
    }

    #[test]
    fn test_installation_matched_once() {
        let installs = vec![
            permit("A", "10 Main", "L1", "X", ""),
            permit("B", "10 Main", "L1", "X", ""),
        ];
        let removals = vec![
            permit("R1", "10 Main", "L1", "X", ""),
            permit("R2", "10 Main", "L1", "X", ""),
            permit("R3", "10 Main", "L1", "X", ""),
        ];

        let result = reconcile(&installs, &removals, &keys()).unwrap();
        assert_eq!(result.superseded, vec![true, true]);
        assert_eq!(result.orphaned_removals, vec!["R3".to_string()]);
    }

    #[test]
    fn test_empty_key_never_matches() {
        let installs = vec![permit("A", "10 Main", "", "X", "")];
        let removals = vec![permit("R", "10 Main", "", "X", "")];

        let result = reconcile(&installs, &removals, &keys()).unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.orphaned_removals, vec!["R".to_string()]);
    }

    #[test]
    fn test_every_key_must_match() {
        let installs = vec![permit("A", "10 Main", "L1", "X", "")];
        let removals = vec![permit("R", "10 Main", "L1", "Y", "")];
        assert!(reconcile(&installs, &removals, &keys()).unwrap().matches.is_empty());
    }

    #[test]
    fn test_approx_matches_values() {
        assert!(approx_matches(&Value::Text("Lot 123".into()), &Value::Text("123".into())));
        assert!(approx_matches(&Value::Integer(42), &Value::Text("42".into())));
        assert!(!approx_matches(&Value::Null, &Value::Null));
        assert!(!approx_matches(&Value::Text(" ".into()), &Value::Text("a".into())));
    }

    #[test]
    fn test_rule_sets_flag_on_installations_only() {
        let rule = LifecycleRule {
            reason_field: "reason".into(),
            category: "piscine".into(),
            removal: "démolition".into(),
            key_fields: keys(),
            flag: "is_demolished".into(),
        };
        let records = vec![
            permit("1", "10 Main", "L1", "X", "Installation de PISCINE"),
            permit("2", "20 Oak", "L2", "X", "Installation de piscine"),
            permit("3", "10 Main St", "L1", "X", "Démolition de piscine"),
            permit("4", "5 Elm", "L3", "X", "Construction d'un garage"),
        ];

        let outcome = rule.apply(&records).unwrap();
        assert_eq!(outcome.installations.len(), 2);
        assert_eq!(outcome.removals, 1);
        assert_eq!(outcome.ignored, 1);
        assert_eq!(
            outcome.installations[0].attributes.get("is_demolished"),
            Some(&Value::Boolean(true))
        );
        assert_eq!(
            outcome.installations[1].attributes.get("is_demolished"),
            Some(&Value::Boolean(false))
        );
    }

    #[test]
    fn test_absent_key_field_is_fatal() {
        let installs = vec![permit("1", "10 Main", "L1", "X", "")];
        let removals = vec![permit("2", "10 Main", "L1", "X", "")];
        let typo = vec!["adress".to_string(), "lot".to_string()];

        match reconcile(&installs, &removals, &typo) {
            Err(GeoError::Row { index, source }) => {
                assert_eq!(index, 0);
                assert!(matches!(*source, GeoError::MissingColumn { ref column } if column == "adress"));
            }
            other => panic!("Expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_null_key_field_is_unmatchable_not_fatal() {
        let installs = vec![permit("1", "10 Main", "", "X", "")];
        let removals = vec![permit("2", "10 Main", "L1", "X", "")];

        let result = reconcile(&installs, &removals, &keys()).unwrap();
        assert!(result.matches.is_empty());
        assert_eq!(result.superseded, vec![false]);
    }

    #[test]
    fn test_absent_reason_field_is_fatal() {
        let rule = LifecycleRule {
            reason_field: "raison".into(),
            category: "piscine".into(),
            removal: "démolition".into(),
            key_fields: keys(),
            flag: "is_demolished".into(),
        };
        let records = vec![
            permit("1", "10 Main", "L1", "X", "Installation de piscine"),
            permit("2", "10 Main", "L1", "X", "Démolition de piscine"),
        ];

        let err = rule.apply(&records).unwrap_err();
        assert!(err.to_string().contains("raison"));
    }

    #[test]
    fn test_invalid_pattern() {
        let rule = LifecycleRule {
            reason_field: "reason".into(),
            category: "(".into(),
            removal: "x".into(),
            key_fields: vec![],
            flag: "f".into(),
        };
        assert!(matches!(rule.partition(&[]), Err(GeoError::Pattern { .. })));
    }
}
