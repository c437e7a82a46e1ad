//! Types d'erreurs pour le crate geonorm

use thiserror::Error;

/// Erreurs structurelles pouvant survenir lors de la normalisation
///
/// Les géométries invalides ne sont pas des erreurs: elles sont portées
/// par [`crate::DefectKind`] sur chaque enregistrement.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Géométrie WKT/WKB malformée
    #[error("Parse error at offset {offset} near `{token}`: {reason}")]
    Parse {
        offset: usize,
        token: String,
        reason: String,
    },

    /// Système de référence inconnu ou non supporté
    #[error("Unknown coordinate reference: {0}")]
    UnknownReference(String),

    /// Échec de la transformation de coordonnées
    #[error("Reprojection failed: {reason}")]
    Reprojection { reason: String },

    /// Colonne voulue absente de la ligne source
    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    /// Colonne voulue sans entrée dans le mapping
    #[error("Unmapped column: {column}")]
    UnmappedColumn { column: String },

    /// Deux colonnes renommées vers le même champ canonique
    #[error("Duplicate target field {target}: mapped from {first} and {second}")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    /// L'ordre final référence un champ non produit par le mapping
    #[error("Final order references unknown field: {field}")]
    UnknownOrderField { field: String },

    /// Coordonnée non numérique dans une colonne longitude/latitude
    #[error("Invalid coordinate in column {column}: {value:?}")]
    InvalidCoordinate { column: String, value: String },

    /// Horodatage illisible dans la colonne `updated_at` configurée
    #[error("Invalid timestamp in column {column}: {value:?}")]
    InvalidTimestamp { column: String, value: String },

    /// Type de géométrie inattendu (ex: polygone fourni comme point)
    #[error("Feature {id}: expected a {expected} geometry")]
    GeometryKind { id: String, expected: &'static str },

    /// Les deux jeux d'une jointure ne partagent pas la même référence
    #[error("CRS mismatch: {left} vs {right}")]
    CrsMismatch { left: String, right: String },

    /// Expression régulière invalide dans une règle de cycle de vie
    #[error("Invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Erreur fatale sur une ligne d'un lot
    #[error("Row {index}: {source}")]
    Row {
        index: usize,
        #[source]
        source: Box<GeoError>,
    },
}

impl GeoError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse(offset: usize, token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Attache l'index de ligne à une erreur
    pub fn at_row(self, index: usize) -> Self {
        Self::Row {
            index,
            source: Box::new(self),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn unmapped_column(column: impl Into<String>) -> Self {
        Self::UnmappedColumn {
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_keeps_source_message() {
        let err = GeoError::missing_column("LONGITUDE").at_row(12);
        let msg = err.to_string();
        assert!(msg.contains("Row 12"));
        assert!(msg.contains("LONGITUDE"));
    }

    #[test]
    fn test_parse_error_names_token() {
        let err = GeoError::parse(6, "POLYGN", "unknown geometry type");
        assert!(err.to_string().contains("`POLYGN`"));
        assert!(err.to_string().contains("offset 6"));
    }
}
