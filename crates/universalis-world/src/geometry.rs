//! WKT parsing and spatial predicates.
//!
//! Terrain geometry arrives as WKT `POLYGON` / `MULTIPOLYGON` text and is
//! parsed into [`geo_types`] values once, at the store boundary. All
//! predicates work in plain euclidean degree space: the simulation treats
//! coordinates as a flat plane and leaves any kilometre conversion
//! (~111 km per degree at the equator) to callers.

use geo::{Contains, Intersects};
use geo_types::{Coord, Line, LineString, MultiPolygon, Point, Polygon};

/// Errors raised while parsing or validating WKT geometry.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// The WKT text did not parse.
    #[error("malformed WKT: {reason}")]
    Parse {
        /// What went wrong.
        reason: String,
    },

    /// The WKT parsed but is not a supported geometry type.
    #[error("unsupported WKT geometry: expected POLYGON or MULTIPOLYGON, found {found}")]
    Unsupported {
        /// The geometry keyword that was found.
        found: String,
    },

    /// A polygon ring is not closed or has too few points.
    #[error("invalid ring: {reason}")]
    InvalidRing {
        /// What is wrong with the ring.
        reason: String,
    },
}

/// Parse a WKT `POLYGON` or `MULTIPOLYGON` into a [`MultiPolygon`].
///
/// Single polygons are lifted into a one-element multipolygon so callers
/// only deal with one geometry type. Every ring must be explicitly
/// closed (first coordinate equals last) and contain at least four
/// coordinates.
///
/// # Errors
///
/// Returns [`GeometryError`] for malformed text, unsupported geometry
/// keywords, or open rings.
pub fn parse_wkt(wkt: &str) -> Result<MultiPolygon<f64>, GeometryError> {
    let trimmed = wkt.trim();
    let upper = trimmed.to_uppercase();

    if let Some(rest) = upper.strip_prefix("MULTIPOLYGON") {
        let body = body_of(trimmed, trimmed.len().saturating_sub(rest.len()))?;
        let polygons = split_top_level(body)
            .into_iter()
            .map(|part| parse_polygon_body(strip_parens(part)?))
            .collect::<Result<Vec<_>, _>>()?;
        if polygons.is_empty() {
            return Err(GeometryError::Parse {
                reason: String::from("MULTIPOLYGON with no polygons"),
            });
        }
        return Ok(MultiPolygon::new(polygons));
    }

    if let Some(rest) = upper.strip_prefix("POLYGON") {
        let body = body_of(trimmed, trimmed.len().saturating_sub(rest.len()))?;
        let polygon = parse_polygon_body(body)?;
        return Ok(MultiPolygon::new(vec![polygon]));
    }

    let found = upper
        .split(['(', ' '])
        .next()
        .unwrap_or_default()
        .to_owned();
    Err(GeometryError::Unsupported { found })
}

/// Test whether any polygon of `geometry` contains the point `(lon, lat)`.
pub fn contains_point(geometry: &MultiPolygon<f64>, lon: f64, lat: f64) -> bool {
    geometry.contains(&Point::new(lon, lat))
}

/// Test whether the straight segment from `start` to `end` (both
/// `(lon, lat)`) intersects any polygon of `geometry`.
pub fn segment_intersects(
    geometry: &MultiPolygon<f64>,
    start: (f64, f64),
    end: (f64, f64),
) -> bool {
    let line = Line::new(
        Coord {
            x: start.0,
            y: start.1,
        },
        Coord { x: end.0, y: end.1 },
    );
    geometry.intersects(&line)
}

/// Euclidean distance between two `(lon, lat)` points, in degrees.
pub fn distance_degrees(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx.hypot(dy)
}

/// Extract the parenthesized body of a WKT expression, given the offset
/// where the keyword ends in the original (case-preserved) text.
fn body_of(original: &str, keyword_len: usize) -> Result<&str, GeometryError> {
    let rest = original.get(keyword_len..).unwrap_or_default().trim();
    strip_parens(rest)
}

/// Strip exactly one level of balanced outer parentheses.
fn strip_parens(s: &str) -> Result<&str, GeometryError> {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| GeometryError::Parse {
            reason: format!("expected parenthesized group, found '{trimmed}'"),
        })?;
    Ok(inner.trim())
}

/// Split a string on commas that sit at parenthesis depth zero.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: u32 = 0;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth = depth.saturating_add(1),
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(s.get(start..idx).unwrap_or_default().trim());
                start = idx.saturating_add(1);
            }
            _ => {}
        }
    }
    parts.push(s.get(start..).unwrap_or_default().trim());
    parts
}

/// Parse a polygon body of the form `(ring),(hole),...`.
fn parse_polygon_body(body: &str) -> Result<Polygon<f64>, GeometryError> {
    let rings = split_top_level(body)
        .into_iter()
        .map(|part| parse_ring(strip_parens(part)?))
        .collect::<Result<Vec<_>, _>>()?;

    let mut iter = rings.into_iter();
    let exterior = iter.next().ok_or_else(|| GeometryError::Parse {
        reason: String::from("polygon with no rings"),
    })?;
    Ok(Polygon::new(exterior, iter.collect()))
}

/// Parse a coordinate sequence `x y, x y, ...` into a closed ring.
fn parse_ring(seq: &str) -> Result<LineString<f64>, GeometryError> {
    let coords = split_top_level(seq)
        .into_iter()
        .map(parse_coord)
        .collect::<Result<Vec<_>, _>>()?;

    if coords.len() < 4 {
        return Err(GeometryError::InvalidRing {
            reason: format!("ring has {} coordinates, need at least 4", coords.len()),
        });
    }
    let ring = LineString::new(coords);
    if !ring.is_closed() {
        return Err(GeometryError::InvalidRing {
            reason: String::from("ring is not closed (first and last coordinates differ)"),
        });
    }
    Ok(ring)
}

/// Parse a single `x y` coordinate pair.
fn parse_coord(pair: &str) -> Result<Coord<f64>, GeometryError> {
    let mut numbers = pair.split_whitespace();
    let x = numbers
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .ok_or_else(|| GeometryError::Parse {
            reason: format!("bad coordinate pair '{pair}'"),
        })?;
    let y = numbers
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .ok_or_else(|| GeometryError::Parse {
            reason: format!("bad coordinate pair '{pair}'"),
        })?;
    if numbers.next().is_some() {
        return Err(GeometryError::Parse {
            reason: format!("coordinate pair '{pair}' has more than two numbers"),
        });
    }
    Ok(Coord { x, y })
}
