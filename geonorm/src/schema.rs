//! Mapping déclaratif des colonnes source vers les champs canoniques
//!
//! Trois phases strictes: sélection des colonnes voulues, renommage via le
//! mapping, puis réordonnancement. Chaque phase échoue avec le nom de la
//! colonne fautive pour localiser une dérive du schéma source.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::types::{parse_date, parse_timestamp};
use crate::{Attributes, GeoError, RawRecord, RawValue, Value};

/// Type cible d'un champ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Text,
    Integer,
    Float,
    Date,
    #[serde(alias = "timestamp")]
    DateTime,
    Boolean,
}

/// Une entrée du mapping: colonne source -> champ canonique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
    #[serde(default, rename = "type")]
    pub data_type: DataType,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>, data_type: DataType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            data_type,
        }
    }
}

/// Mapping d'un type de jeu de données
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub fields: Vec<FieldMapping>,
    /// Colonnes volontairement écartées
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl SchemaMapping {
    pub fn new(fields: Vec<FieldMapping>) -> Self {
        Self {
            fields,
            excluded: Vec::new(),
        }
    }

    pub fn with_excluded(mut self, excluded: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded.extend(excluded.into_iter().map(Into::into));
        self
    }

    /// Entrée de mapping pour une colonne source
    pub fn field(&self, source: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.source == source)
    }

    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded.iter().any(|c| c == column)
    }

    /// Noms canoniques produits, dans l'ordre du mapping
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.target.as_str())
    }

    /// Refuse deux entrées qui produisent le même champ canonique
    pub fn check_targets(&self) -> Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if let Some(first) = self.fields[..i].iter().find(|f| f.target == field.target) {
                return Err(duplicate_target(&field.target, &first.source, &field.source));
            }
        }
        Ok(())
    }

    /// Vérifie que le mapping couvre toutes les colonnes d'intérêt
    pub fn check_total<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for column in columns {
            if self.field(column).is_none() && !self.is_excluded(column) {
                return Err(GeoError::unmapped_column(column));
            }
        }
        Ok(())
    }
}

/// Applique le mapping à une ligne source
///
/// `final_order` vide conserve l'ordre de `wanted`. Sinon, seuls les champs
/// qu'il nomme sont conservés, dans cet ordre.
pub fn map_record(
    record: &RawRecord,
    mapping: &SchemaMapping,
    wanted: &[String],
    final_order: &[String],
) -> Result<Attributes> {
    // Phase 1: sélection
    let mut selected = Vec::with_capacity(wanted.len());
    for column in wanted {
        let value = record
            .get(column)
            .ok_or_else(|| GeoError::missing_column(column))?;
        selected.push((column.as_str(), value));
    }

    // Phase 2: renommage et typage
    let mut renamed = Attributes::with_capacity(selected.len());
    let mut sources: Vec<(&str, &str)> = Vec::with_capacity(selected.len());
    for (column, raw) in selected {
        match mapping.field(column) {
            Some(field) => {
                if let Some((_, first)) = sources.iter().find(|(t, _)| *t == field.target) {
                    return Err(duplicate_target(&field.target, first, column));
                }
                sources.push((field.target.as_str(), column));
                renamed.insert(field.target.clone(), coerce(raw, field.data_type));
            }
            None if mapping.is_excluded(column) => {
                trace!(column, "Excluded column dropped");
            }
            None => return Err(GeoError::unmapped_column(column)),
        }
    }

    // Phase 3: ordre final
    if final_order.is_empty() {
        return Ok(renamed);
    }
    let mut ordered = Attributes::with_capacity(final_order.len());
    for name in final_order {
        let value = renamed
            .remove(name)
            .ok_or_else(|| GeoError::UnknownOrderField { field: name.clone() })?;
        ordered.insert(name.clone(), value);
    }
    Ok(ordered)
}

fn duplicate_target(target: &str, first: &str, second: &str) -> GeoError {
    GeoError::DuplicateTarget {
        target: target.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

/// Convertit une valeur brute vers le type cible
///
/// Une valeur illisible devient nulle (comme une date invalide dans la
/// source); seule l'absence de colonne est fatale.
pub fn coerce(raw: &RawValue, data_type: DataType) -> Value {
    let Some(text) = raw.as_text() else {
        return Value::Null;
    };

    let value = match data_type {
        DataType::Text => Some(Value::Text(text.trim().to_string())),
        DataType::Integer => match raw {
            RawValue::Number(n) if n.fract() == 0.0 => Some(Value::Integer(*n as i64)),
            _ => parse_integer(&text).map(Value::Integer),
        },
        DataType::Float => raw.as_f64().filter(|f| f.is_finite()).map(Value::Float),
        DataType::Date => parse_date(&text).map(Value::Date),
        DataType::DateTime => parse_timestamp(&text).map(Value::DateTime),
        DataType::Boolean => parse_bool(&text).map(Value::Boolean),
    };

    value.unwrap_or_else(|| {
        trace!(value = %text, ?data_type, "Unparsable value coerced to null");
        Value::Null
    })
}

fn parse_integer(text: &str) -> Option<i64> {
    let t = text.trim();
    t.parse::<i64>().ok().or_else(|| {
        // "12.0" issu d'un export tableur
        t.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "oui" | "o" | "vrai" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "non" | "faux" => Some(false),
        _ => None,
    }
}
