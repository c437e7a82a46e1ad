//! Types de données pour le crate geonorm

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use geo::{BoundingRect, Coord, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::validate::DefectKind;
use crate::GeoError;

/// Système de référence de coordonnées, identifié par son code EPSG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    /// Référence géographique canonique (WGS84)
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub const fn epsg(code: u32) -> Self {
        Self { epsg: code }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = GeoError;

    /// Accepte `EPSG:4326`, `4326`, `urn:ogc:def:crs:EPSG::4326`,
    /// `http://www.opengis.net/def/crs/EPSG/0/4326` et `CRS84`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let upper = raw.to_ascii_uppercase();

        if upper == "CRS84" || upper == "OGC:CRS84" || upper.ends_with("OGC:1.3:CRS84") {
            return Ok(Self::WGS84);
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().unwrap_or("")
        } else if upper.contains("/DEF/CRS/EPSG/") {
            upper.rsplit('/').next().unwrap_or("")
        } else {
            upper.as_str()
        };

        code.parse::<u32>()
            .ok()
            .filter(|&c| c > 0)
            .map(Self::epsg)
            .ok_or_else(|| GeoError::UnknownReference(raw.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = GeoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Anneaux d'un polygone, tels que lus dans la source
///
/// Contrairement à [`geo::Polygon::new`], aucun anneau n'est refermé
/// automatiquement: le validateur doit pouvoir signaler un anneau ouvert.
#[derive(Debug, Clone, PartialEq)]
pub struct Rings {
    exterior: LineString<f64>,
    interiors: Vec<LineString<f64>>,
}

impl Rings {
    pub fn new(exterior: LineString<f64>, interiors: Vec<LineString<f64>>) -> Self {
        Self { exterior, interiors }
    }

    pub fn exterior(&self) -> &LineString<f64> {
        &self.exterior
    }

    pub fn interiors(&self) -> &[LineString<f64>] {
        &self.interiors
    }

    /// Extérieur puis trous
    pub fn iter(&self) -> impl Iterator<Item = &LineString<f64>> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    /// Conversion vers `geo` (les anneaux ouverts y sont refermés)
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(self.exterior.clone(), self.interiors.clone())
    }
}

impl From<Polygon<f64>> for Rings {
    fn from(p: Polygon<f64>) -> Self {
        let (exterior, interiors) = p.into_inner();
        Self { exterior, interiors }
    }
}

/// Valeur géométrique: un point ou un polygone (premier anneau = extérieur)
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    Polygon(Rings),
}

impl Shape {
    /// Nom du type, tel qu'écrit en WKT
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Point(_) => "point",
            Shape::Polygon(_) => "polygon",
        }
    }

    pub fn as_point(&self) -> Option<&Point<f64>> {
        match self {
            Shape::Point(p) => Some(p),
            Shape::Polygon(_) => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Rings> {
        match self {
            Shape::Polygon(p) => Some(p),
            Shape::Point(_) => None,
        }
    }

    /// Itère sur toutes les coordonnées (anneaux dans l'ordre)
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord<f64>> + '_> {
        match self {
            Shape::Point(p) => Box::new(std::iter::once(&p.0)),
            Shape::Polygon(rings) => Box::new(rings.iter().flat_map(|r| r.0.iter())),
        }
    }

    /// Applique une transformation faillible à chaque coordonnée
    pub fn try_map_coords<E>(
        &self,
        mut f: impl FnMut(Coord<f64>) -> Result<Coord<f64>, E>,
    ) -> Result<Shape, E> {
        match self {
            Shape::Point(p) => Ok(Shape::Point(Point::from(f(p.0)?))),
            Shape::Polygon(rings) => {
                let mut ring = |ls: &LineString<f64>| -> Result<LineString<f64>, E> {
                    ls.0.iter().map(|c| f(*c)).collect::<Result<Vec<_>, E>>().map(LineString::new)
                };
                let exterior = ring(rings.exterior())?;
                let interiors = rings
                    .interiors()
                    .iter()
                    .map(&mut ring)
                    .collect::<Result<Vec<_>, E>>()?;
                Ok(Shape::Polygon(Rings::new(exterior, interiors)))
            }
        }
    }

    /// Applique une transformation à chaque coordonnée
    pub fn map_coords(&self, mut f: impl FnMut(Coord<f64>) -> Coord<f64>) -> Shape {
        match self.try_map_coords(|c| Ok::<_, std::convert::Infallible>(f(c))) {
            Ok(shape) => shape,
            Err(never) => match never {},
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Shape::Point(p) => Some(p.bounding_rect()),
            Shape::Polygon(rings) => rings.exterior().bounding_rect(),
        }
    }

    /// Conversion vers le type `geo` générique
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Shape::Point(p) => geo::Geometry::Point(*p),
            Shape::Polygon(rings) => geo::Geometry::Polygon(rings.to_polygon()),
        }
    }
}

impl From<Point<f64>> for Shape {
    fn from(p: Point<f64>) -> Self {
        Shape::Point(p)
    }
}

impl From<Polygon<f64>> for Shape {
    fn from(p: Polygon<f64>) -> Self {
        Shape::Polygon(p.into())
    }
}

impl From<Rings> for Shape {
    fn from(r: Rings) -> Self {
        Shape::Polygon(r)
    }
}

/// Géométrie canonique: une forme et sa référence déclarée
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub shape: Shape,
    pub crs: Crs,
}

impl Geometry {
    pub fn new(shape: impl Into<Shape>, crs: Crs) -> Self {
        Self {
            shape: shape.into(),
            crs,
        }
    }
}

/// Valeur brute d'une cellule source
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Null,
}

impl RawValue {
    /// Texte de la cellule, `None` si nulle ou vide
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            RawValue::Text(s) if s.trim().is_empty() => None,
            RawValue::Text(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
            RawValue::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
            RawValue::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

/// Ligne source: nom de colonne -> valeur brute
pub type RawRecord = HashMap<String, RawValue>;

/// Valeur scalaire canonique d'un attribut
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Représentation textuelle (utilisée pour la comparaison approximative)
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.to_string()),
            Value::DateTime(dt) => Some(dt.to_rfc3339()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => f.write_str(&s),
            None => f.write_str("null"),
        }
    }
}

/// Attributs ordonnés d'un enregistrement (nom canonique -> valeur)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(n: usize) -> Self {
        Self(Vec::with_capacity(n))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insère ou remplace une valeur en conservant la position existante
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// Une ligne de jeu de données après normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Clé naturelle de la source, ou identifiant synthétisé
    pub id: String,

    /// Géométrie canonique avec sa référence
    pub geometry: Geometry,

    /// Attributs renommés et ordonnés
    pub attributes: Attributes,

    /// Dernière vérité connue de la source (pas l'heure d'ingestion)
    pub updated_at: DateTime<Utc>,

    /// Posé par le validateur; les géométries invalides sont conservées
    pub is_valid_geometry: bool,

    /// Défaut détecté quand la géométrie est invalide
    pub defect: Option<DefectKind>,
}

/// Parse un horodatage de métadonnées source
///
/// Formats rencontrés: `2025-08-27 06:58:00`, `2025-08-03 03:08:00+00:00`,
/// `2025-05-09 09:40Z`, RFC 3339, ou date seule. Sans décalage, UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = match s.strip_suffix('Z') {
        Some(head) => format!("{}+00:00", head),
        None => s.to_string(),
    };

    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

/// Parse une date (`2024-01-15`, `2024/01/15`, ou le préfixe date d'un horodatage)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    s.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}
