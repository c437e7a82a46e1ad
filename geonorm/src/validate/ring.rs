//! Contrôles sur les anneaux: aire signée et auto-intersection

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line, LineString};

/// Aire signée (formule du lacet); positive si anti-horaire
pub fn ring_signed_area(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|l| l.determinant()).sum::<f64>() / 2.0
}

/// Nombre de sommets distincts (le point de fermeture n'est pas compté)
pub fn distinct_vertices(ring: &LineString<f64>) -> usize {
    let coords = open_coords(ring);
    let mut seen: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if !seen.contains(c) {
            seen.push(*c);
        }
    }
    seen.len()
}

/// Sommets sans le point de fermeture
fn open_coords(ring: &LineString<f64>) -> &[Coord<f64>] {
    match ring.0.as_slice() {
        [head @ .., last] if !head.is_empty() && head[0] == *last => head,
        all => all,
    }
}

/// Détecte une auto-intersection par balayage sur l'axe x
///
/// Les segments sont triés par x minimal; chaque segment n'est comparé
/// qu'aux segments dont l'intervalle en x le chevauche. Deux segments
/// consécutifs se touchent à leur sommet commun; seul un recouvrement
/// colinéaire entre eux est un défaut.
pub fn self_intersects(ring: &LineString<f64>) -> bool {
    // Segments de longueur nulle (sommets répétés) ignorés
    let segments: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = segments.len();
    if n < 3 {
        return false;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| min_x(&segments[a]).total_cmp(&min_x(&segments[b])));

    for (pos, &i) in order.iter().enumerate() {
        let max_xi = max_x(&segments[i]);
        for &j in &order[pos + 1..] {
            if min_x(&segments[j]) > max_xi {
                break;
            }
            if crosses(&segments, i, j) {
                return true;
            }
        }
    }
    false
}

fn crosses(segments: &[Line<f64>], i: usize, j: usize) -> bool {
    let n = segments.len();
    let (a, b) = (segments[i], segments[j]);
    let adjacent = (i + 1) % n == j || (j + 1) % n == i;

    match line_intersection(a, b) {
        None => false,
        Some(LineIntersection::Collinear { .. }) => true,
        Some(LineIntersection::SinglePoint { intersection, .. }) => {
            if !adjacent {
                return true;
            }
            // Les voisins partagent exactement un sommet
            let shared = if (i + 1) % n == j { a.end } else { a.start };
            intersection != shared
        }
    }
}

fn min_x(l: &Line<f64>) -> f64 {
    l.start.x.min(l.end.x)
}

fn max_x(l: &Line<f64>) -> f64 {
    l.start.x.max(l.end.x)
}
