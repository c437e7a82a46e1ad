//! Lecture et écriture WKT / EWKT (POINT et POLYGON)

use std::fmt::Write as _;

use geo::{Coord, LineString, Point};

use crate::error::Result;
use crate::{Crs, GeoError, Geometry, Rings, Shape};

/// Parse un WKT (un préfixe `SRID=...;` éventuel est ignoré)
pub fn from_wkt(text: &str) -> Result<Shape> {
    from_ewkt(text).map(|(_, shape)| shape)
}

/// Parse un EWKT et retourne la référence déclarée par le préfixe `SRID=`
pub fn from_ewkt(text: &str) -> Result<(Option<Crs>, Shape)> {
    let mut parser = Parser::new(text);
    let crs = parser.srid_prefix()?;
    let shape = parser.geometry()?;
    parser.expect_end()?;
    Ok((crs, shape))
}

/// Sérialise une forme en WKT
///
/// Les flottants utilisent la représentation la plus courte qui se relit
/// à l'identique, d'où `from_wkt(to_wkt(g)) == g`. Le lecteur refuse les
/// valeurs non finies: seules les formes issues du WKB ou de colonnes
/// longitude/latitude peuvent en porter.
pub fn to_wkt(shape: &Shape) -> String {
    let mut out = String::new();
    match shape {
        Shape::Point(p) => {
            out.push_str("POINT(");
            push_coord(&mut out, p.0);
            out.push(')');
        }
        Shape::Polygon(rings) => {
            out.push_str("POLYGON(");
            push_ring(&mut out, rings.exterior());
            for hole in rings.interiors() {
                out.push(',');
                push_ring(&mut out, hole);
            }
            out.push(')');
        }
    }
    out
}

/// Sérialise en EWKT (`SRID=4326;POINT(...)`)
pub fn to_ewkt(geometry: &Geometry) -> String {
    format!("SRID={};{}", geometry.crs.epsg, to_wkt(&geometry.shape))
}

fn push_coord(out: &mut String, c: Coord<f64>) {
    let _ = write!(out, "{} {}", c.x, c.y);
}

fn push_ring(out: &mut String, ring: &LineString<f64>) {
    out.push('(');
    for (i, c) in ring.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_coord(out, *c);
    }
    out.push(')');
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Number(f64),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
    End,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Jeton lu d'avance et son offset
    peeked: Option<(usize, Token<'a>)>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    fn lex(&mut self) -> Result<(usize, Token<'a>)> {
        let src = self.src;
        let bytes = src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(&b) = bytes.get(start) else {
            return Ok((start, Token::End));
        };

        let single = match b {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            b';' => Some(Token::Semicolon),
            b'=' => Some(Token::Equals),
            _ => None,
        };
        if let Some(tok) = single {
            self.pos += 1;
            return Ok((start, tok));
        }

        if b.is_ascii_alphabetic() {
            let len = bytes[start..]
                .iter()
                .position(|c| !c.is_ascii_alphanumeric() && *c != b'_')
                .unwrap_or(bytes.len() - start);
            self.pos += len;
            return Ok((start, Token::Word(&src[start..start + len])));
        }

        if b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.' {
            return match fast_float::parse_partial::<f64, _>(&bytes[start..]) {
                Ok((value, len)) if len > 0 && !value.is_finite() => Err(GeoError::parse(
                    start,
                    &src[start..start + len],
                    "coordinate is not finite",
                )),
                Ok((value, len)) if len > 0 => {
                    self.pos += len;
                    Ok((start, Token::Number(value)))
                }
                _ => Err(GeoError::parse(start, self.snippet(start), "invalid number")),
            };
        }

        Err(GeoError::parse(start, self.snippet(start), "unexpected character"))
    }

    fn next(&mut self) -> Result<(usize, Token<'a>)> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lex(),
        }
    }

    fn peek(&mut self) -> Result<(usize, Token<'a>)> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lex()?);
        }
        // peeked vient d'être rempli
        Ok(self.peeked.unwrap_or((self.pos, Token::End)))
    }

    /// Texte à afficher pour un jeton fautif
    fn snippet(&self, offset: usize) -> String {
        let rest = self.src.get(offset..).unwrap_or("");
        if rest.is_empty() {
            return "<end of input>".to_string();
        }
        let word: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | ';' | '='))
            .take(24)
            .collect();
        if word.is_empty() {
            // Ponctuation isolée
            rest.chars().take(1).collect()
        } else {
            word
        }
    }

    fn unexpected(&self, offset: usize, expected: &str) -> GeoError {
        GeoError::parse(offset, self.snippet(offset), format!("expected {}", expected))
    }

    fn expect(&mut self, want: Token<'static>, label: &str) -> Result<()> {
        let (offset, tok) = self.next()?;
        if tok == want {
            Ok(())
        } else {
            Err(self.unexpected(offset, label))
        }
    }

    fn srid_prefix(&mut self) -> Result<Option<Crs>> {
        match self.peek()? {
            (_, Token::Word(w)) if w.eq_ignore_ascii_case("SRID") => {
                self.next()?;
                self.expect(Token::Equals, "`=` after SRID")?;
                let (offset, tok) = self.next()?;
                let code = match tok {
                    Token::Number(n) if n.fract() == 0.0 && n > 0.0 && n <= u32::MAX as f64 => {
                        n as u32
                    }
                    _ => return Err(self.unexpected(offset, "a positive integer SRID")),
                };
                self.expect(Token::Semicolon, "`;` after SRID")?;
                Ok(Some(Crs::epsg(code)))
            }
            _ => Ok(None),
        }
    }

    fn geometry(&mut self) -> Result<Shape> {
        let (offset, tok) = self.next()?;
        let Token::Word(kind) = tok else {
            return Err(self.unexpected(offset, "a geometry type"));
        };

        let is_point = kind.eq_ignore_ascii_case("POINT");
        let is_polygon = kind.eq_ignore_ascii_case("POLYGON");
        if !is_point && !is_polygon {
            return Err(GeoError::parse(
                offset,
                kind,
                "unsupported geometry type (only POINT and POLYGON)",
            ));
        }

        // Dimensions Z/M et EMPTY ne sont pas représentables
        if let (mod_offset, Token::Word(modifier)) = self.peek()? {
            let reason = if modifier.eq_ignore_ascii_case("EMPTY") {
                "empty geometries are not supported"
            } else {
                "only 2D coordinates are supported"
            };
            return Err(GeoError::parse(mod_offset, modifier, reason));
        }

        if is_point {
            self.expect(Token::LParen, "`(`")?;
            let c = self.coord()?;
            self.expect(Token::RParen, "`)`")?;
            Ok(Shape::Point(Point::from(c)))
        } else {
            self.expect(Token::LParen, "`(`")?;
            let exterior = self.ring()?;
            let mut interiors = Vec::new();
            loop {
                let (offset, tok) = self.next()?;
                match tok {
                    Token::Comma => interiors.push(self.ring()?),
                    Token::RParen => break,
                    _ => return Err(self.unexpected(offset, "`,` or `)`")),
                }
            }
            Ok(Shape::Polygon(Rings::new(exterior, interiors)))
        }
    }

    fn ring(&mut self) -> Result<LineString<f64>> {
        self.expect(Token::LParen, "`(` opening a ring")?;
        let mut coords = vec![self.coord()?];
        loop {
            let (offset, tok) = self.next()?;
            match tok {
                Token::Comma => coords.push(self.coord()?),
                Token::RParen => break,
                _ => return Err(self.unexpected(offset, "`,` or `)`")),
            }
        }
        Ok(LineString::new(coords))
    }

    fn coord(&mut self) -> Result<Coord<f64>> {
        let x = self.number()?;
        let y = self.number()?;
        if let (offset, Token::Number(_)) = self.peek()? {
            return Err(GeoError::parse(
                offset,
                self.snippet(offset),
                "only 2D coordinates are supported",
            ));
        }
        Ok(Coord { x, y })
    }

    fn number(&mut self) -> Result<f64> {
        let (offset, tok) = self.next()?;
        match tok {
            Token::Number(n) => Ok(n),
            _ => Err(self.unexpected(offset, "a number")),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.next()? {
            (_, Token::End) => Ok(()),
            (offset, _) => Err(GeoError::parse(
                offset,
                self.snippet(offset),
                "trailing characters after geometry",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let shape = from_wkt("POINT (-71.2080 46.8139)").unwrap();
        assert_eq!(shape, Shape::Point(Point::new(-71.2080, 46.8139)));
    }

    #[test]
    fn test_parse_lowercase_and_compact() {
        let shape = from_wkt("point(1 2)").unwrap();
        assert_eq!(shape, Shape::Point(Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_parse_polygon_with_hole() {
        let shape = from_wkt(
            "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 4 2, 4 4, 2 4, 2 2))",
        )
        .unwrap();
        let poly = shape.as_polygon().unwrap();
        assert_eq!(poly.exterior().0.len(), 5);
        assert_eq!(poly.interiors().len(), 1);
    }

    #[test]
    fn test_parse_ewkt_srid() {
        let (crs, shape) = from_ewkt("SRID=32198;POINT(-206300.41 317060.36)").unwrap();
        assert_eq!(crs, Some(Crs::epsg(32198)));
        assert_eq!(shape.kind(), "point");
    }

    #[test]
    fn test_unsupported_type_names_token() {
        match from_wkt("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)))") {
            Err(GeoError::Parse { offset, token, .. }) => {
                assert_eq!(offset, 0);
                assert_eq!(token, "MULTIPOLYGON");
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_number_reports_offset() {
        match from_wkt("POINT (1 abc)") {
            Err(GeoError::Parse { offset, token, .. }) => {
                assert_eq!(offset, 9);
                assert_eq!(token, "abc");
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_3d_rejected() {
        assert!(from_wkt("POINT EMPTY").is_err());
        assert!(from_wkt("POINT Z (1 2 3)").is_err());
        assert!(from_wkt("POINT (1 2 3)").is_err());
    }

    #[test]
    fn test_unclosed_and_trailing() {
        assert!(from_wkt("POLYGON ((0 0, 1 0, 1 1, 0 0)").is_err());
        assert!(from_wkt("POINT (1 2) extra").is_err());
        assert!(from_wkt("").is_err());
    }

    #[test]
    fn test_round_trip() {
        let src = "POLYGON((0.1 0.2,4.123456789 0,4 4,0 4,0.1 0.2),(1 1,2 1,2 2,1 1))";
        let shape = from_wkt(src).unwrap();
        let text = to_wkt(&shape);
        assert_eq!(text, src);
        assert_eq!(from_wkt(&text).unwrap(), shape);
    }

    #[test]
    fn test_non_finite_literals_rejected() {
        for (src, token) in [("POINT(1 1e400)", "1e400"), ("POINT(1 -nan)", "-nan"), ("POINT(+inf 2)", "+inf")] {
            match from_wkt(src) {
                Err(GeoError::Parse { token: t, reason, .. }) => {
                    assert_eq!(t, token);
                    assert!(reason.contains("not finite"), "{}", reason);
                }
                other => panic!("Expected Parse error for {}, got {:?}", src, other),
            }
        }
        assert!(from_wkt("POINT(1 inf)").is_err());
        assert!(from_wkt("POINT(1 NaN)").is_err());
    }

    #[test]
    fn test_open_ring_kept_as_is() {
        let shape = from_wkt("POLYGON((0 0,4 0,4 4,0 4))").unwrap();
        assert_eq!(shape.as_polygon().unwrap().exterior().0.len(), 4);
        assert_eq!(to_wkt(&shape), "POLYGON((0 0,4 0,4 4,0 4))");
    }

    #[test]
    fn test_to_ewkt() {
        let g = Geometry::new(Point::new(-71.5, 46.75), Crs::WGS84);
        assert_eq!(to_ewkt(&g), "SRID=4326;POINT(-71.5 46.75)");
    }
}
