//! Lecture des instantanés CSV
//!
//! Les exports des portails ouverts arrivent en UTF-8 (parfois avec BOM)
//! ou en Windows-1252. Chaque cellule vide devient nulle.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use geonorm::{RawRecord, RawValue};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
/// BOM UTF-8 relu en Latin-1 par un export précédent
const BOM_ARTEFACT: &str = "ï»¿";

/// Lit un fichier CSV complet en lignes brutes
pub fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let text = decode(&bytes);
    let records = parse_csv(&text).with_context(|| format!("Invalid CSV in {}", path.display()))?;
    info!(path = %path.display(), rows = records.len(), "CSV loaded");
    Ok(records)
}

/// Décode en UTF-8, repli Windows-1252
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match simdutf8::basic::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("Input is not valid UTF-8, decoding as Windows-1252");
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// Parse un texte CSV avec en-tête
pub fn parse_csv(text: &str) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| {
            h.trim_start_matches(BOM_ARTEFACT)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_owned()
        })
        .collect();

    if headers.is_empty() {
        anyhow::bail!("CSV file contains no header row");
    }
    debug!(columns = ?headers, "CSV header");

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: RawRecord = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = match record.get(i).map(str::trim) {
                    Some(v) if !v.is_empty() => RawValue::Text(v.to_owned()),
                    _ => RawValue::Null,
                };
                (header.clone(), value)
            })
            .collect();
        records.push(row);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_nulls_and_quotes() {
        let rows = parse_csv("ID,NOM,GEOM\n1,,\"POINT (1 2)\"\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("NOM"), Some(&RawValue::Null));
        assert_eq!(rows[0].get("GEOM"), Some(&RawValue::from("POINT (1 2)")));
    }

    #[test]
    fn test_bom_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"ID,SURFACE\n7,12.5\n");
        let rows = parse_csv(&decode(&bytes)).unwrap();
        assert!(rows[0].contains_key("ID"));
    }

    #[test]
    fn test_latin1_artefact_header() {
        let rows = parse_csv("ï»¿ID,SURFACE\n7,12.5\n").unwrap();
        assert_eq!(rows[0].get("ID"), Some(&RawValue::from("7")));
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "Québec" en Windows-1252
        let bytes = b"NOM\nQu\xE9bec\n";
        let rows = parse_csv(&decode(bytes)).unwrap();
        assert_eq!(rows[0].get("NOM"), Some(&RawValue::from("Québec")));
    }
}
