//! Lecture et écriture WKB / EWKB (POINT et POLYGON 2D)

use geo::{Coord, LineString, Point};

use crate::error::Result;
use crate::{Crs, GeoError, Rings, Shape};

const WKB_POINT: u32 = 1;
const WKB_POLYGON: u32 = 3;

/// Drapeaux EWKB (PostGIS)
const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Parse un WKB (un SRID EWKB éventuel est ignoré)
pub fn from_wkb(bytes: &[u8]) -> Result<Shape> {
    from_ewkb(bytes).map(|(_, shape)| shape)
}

/// Parse un WKB encodé en hexadécimal (format des exports PostGIS)
pub fn from_wkb_hex(text: &str) -> Result<(Option<Crs>, Shape)> {
    let trimmed = text.trim();
    let raw = trimmed
        .strip_prefix("\\x")
        .or_else(|| trimmed.strip_prefix("0x"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(raw).map_err(|e| {
        let offset = match e {
            hex::FromHexError::InvalidHexCharacter { index, .. } => index,
            _ => raw.len(),
        };
        let token: String = raw.get(offset..).unwrap_or("").chars().take(8).collect();
        GeoError::parse(offset, token, format!("invalid hex: {}", e))
    })?;
    from_ewkb(&bytes)
}

/// Parse un EWKB et retourne le SRID embarqué s'il existe
pub fn from_ewkb(bytes: &[u8]) -> Result<(Option<Crs>, Shape)> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let (srid, shape) = reader.geometry()?;
    if reader.pos != bytes.len() {
        return Err(GeoError::parse(
            reader.pos,
            format!("{} bytes", bytes.len() - reader.pos),
            "trailing bytes after geometry",
        ));
    }
    Ok((srid.map(Crs::epsg), shape))
}

/// Encode une forme en WKB ISO (little endian)
///
/// Les anneaux sont écrits tels quels, sans fermeture implicite.
pub fn to_wkb(shape: &Shape) -> Vec<u8> {
    write_wkb(shape, None)
}

/// Encode en EWKB PostGIS (drapeau SRID + code EPSG)
pub fn to_ewkb(shape: &Shape, crs: Crs) -> Vec<u8> {
    write_wkb(shape, Some(crs.epsg))
}

fn write_wkb(shape: &Shape, srid: Option<u32>) -> Vec<u8> {
    let coord_count = shape.coords().count();
    let mut out = Vec::with_capacity(13 + coord_count * 16 + 8);
    out.push(1u8);

    let base = match shape {
        Shape::Point(_) => WKB_POINT,
        Shape::Polygon(_) => WKB_POLYGON,
    };
    match srid {
        Some(code) => {
            out.extend_from_slice(&(base | EWKB_SRID).to_le_bytes());
            out.extend_from_slice(&code.to_le_bytes());
        }
        None => out.extend_from_slice(&base.to_le_bytes()),
    }

    match shape {
        Shape::Point(p) => push_coord(&mut out, p.0),
        Shape::Polygon(rings) => {
            out.extend_from_slice(&(rings.iter().count() as u32).to_le_bytes());
            for ring in rings.iter() {
                out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
                for c in &ring.0 {
                    push_coord(&mut out, *c);
                }
            }
        }
    }
    out
}

fn push_coord(out: &mut Vec<u8>, c: Coord<f64>) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let buf = self.buf;
        match buf.get(self.pos..self.pos + n) {
            Some(slice) => {
                self.pos += n;
                Ok(slice)
            }
            None => Err(GeoError::parse(
                self.pos,
                "<end of input>",
                format!("truncated buffer while reading {}", what),
            )),
        }
    }

    fn u32(&mut self, little: bool, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        let arr = [b[0], b[1], b[2], b[3]];
        Ok(if little {
            u32::from_le_bytes(arr)
        } else {
            u32::from_be_bytes(arr)
        })
    }

    fn f64(&mut self, little: bool) -> Result<f64> {
        let b = self.take(8, "coordinate")?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(if little {
            f64::from_le_bytes(arr)
        } else {
            f64::from_be_bytes(arr)
        })
    }

    fn coord(&mut self, little: bool) -> Result<Coord<f64>> {
        Ok(Coord {
            x: self.f64(little)?,
            y: self.f64(little)?,
        })
    }

    fn geometry(&mut self) -> Result<(Option<u32>, Shape)> {
        let order_offset = self.pos;
        let little = match self.take(1, "byte order")?[0] {
            0 => false,
            1 => true,
            other => {
                return Err(GeoError::parse(
                    order_offset,
                    format!("0x{:02x}", other),
                    "invalid byte order marker",
                ))
            }
        };

        let type_offset = self.pos;
        let raw_type = self.u32(little, "geometry type")?;
        if raw_type & (EWKB_Z | EWKB_M) != 0 {
            return Err(GeoError::parse(
                type_offset,
                format!("0x{:08x}", raw_type),
                "only 2D coordinates are supported",
            ));
        }

        let srid = if raw_type & EWKB_SRID != 0 {
            Some(self.u32(little, "SRID")?)
        } else {
            None
        };

        let shape = match raw_type & 0x0FFF_FFFF {
            WKB_POINT => {
                let c = self.coord(little)?;
                // Convention WKB: POINT EMPTY = NaN NaN
                if c.x.is_nan() && c.y.is_nan() {
                    return Err(GeoError::parse(type_offset, "POINT", "empty geometries are not supported"));
                }
                Shape::Point(Point::from(c))
            }
            WKB_POLYGON => {
                let ring_count = self.u32(little, "ring count")? as usize;
                if ring_count == 0 {
                    return Err(GeoError::parse(type_offset, "POLYGON", "empty geometries are not supported"));
                }
                let mut rings = Vec::with_capacity(ring_count.min(self.remaining() / 4));
                for _ in 0..ring_count {
                    rings.push(self.ring(little)?);
                }
                let mut rings = rings.into_iter();
                let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
                Shape::Polygon(Rings::new(exterior, rings.collect()))
            }
            other => {
                let reason = if other >= 1000 {
                    "only 2D coordinates are supported"
                } else {
                    "unsupported geometry type (only POINT and POLYGON)"
                };
                return Err(GeoError::parse(type_offset, format!("type {}", other), reason));
            }
        };

        Ok((srid, shape))
    }

    fn ring(&mut self, little: bool) -> Result<LineString<f64>> {
        let count_offset = self.pos;
        let n = self.u32(little, "point count")? as usize;
        // Refuse un compteur qui dépasse le tampon avant d'allouer
        if n.saturating_mul(16) > self.remaining() {
            return Err(GeoError::parse(
                count_offset,
                n.to_string(),
                "truncated buffer: point count exceeds remaining bytes",
            ));
        }
        let mut coords = Vec::with_capacity(n);
        for _ in 0..n {
            coords.push(self.coord(little)?);
        }
        Ok(LineString::new(coords))
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}
