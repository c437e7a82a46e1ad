//! Identifiants synthétisés par hash
//!
//! Le hash de géométrie est normalisé pour être indépendant de l'ordre de
//! départ des anneaux (un polygone qui commence à un vertex différent aura
//! le même hash).

use blake3::Hasher;
use geo::{Coord, LineString};

use crate::{Attributes, Shape};

/// Calcule un hash stable d'une forme
///
/// Les anneaux de polygones sont normalisés pour commencer au vertex
/// lexicographiquement le plus petit (min x, puis min y).
pub fn geometry_hash(shape: &Shape) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hash_shape(&mut hasher, shape);
    *hasher.finalize().as_bytes()
}

/// Identifiant stable d'un enregistrement sans clé naturelle
///
/// Combine la géométrie normalisée et les valeurs d'attributs; deux lignes
/// identiques d'un même instantané reçoivent le même identifiant.
pub fn synthesize_id(shape: &Shape, attributes: &Attributes) -> String {
    let mut hasher = Hasher::new();
    hash_shape(&mut hasher, shape);
    for (name, value) in attributes.iter() {
        hasher.update(name.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(value.to_string().as_bytes());
        hasher.update(&[0x1e]);
    }
    // 16 octets suffisent pour un identifiant lisible
    hex::encode(&hasher.finalize().as_bytes()[..16])
}

fn hash_shape(hasher: &mut Hasher, shape: &Shape) {
    match shape {
        Shape::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(hasher, p.0);
        }
        Shape::Polygon(rings) => {
            hasher.update(b"POLYGON");
            hasher.update(b"EXT");
            hash_ring_normalized(hasher, rings.exterior());
            for interior in rings.interiors() {
                hasher.update(b"INT");
                hash_ring_normalized(hasher, interior);
            }
        }
    }
}

/// Hash un anneau en le normalisant pour commencer au vertex
/// lexicographiquement le plus petit.
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString<f64>) {
    // Le dernier point d'un anneau fermé est ignoré
    let len = if ring.0.len() > 1 && ring.0.first() == ring.0.last() {
        ring.0.len() - 1
    } else {
        ring.0.len()
    };

    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            let ca = &ring.0[a];
            let cb = &ring.0[b];
            ca.x.total_cmp(&cb.x).then_with(|| ca.y.total_cmp(&cb.y))
        })
        .unwrap_or(0);

    for i in 0..len {
        let idx = (min_idx + i) % len;
        hash_coord(hasher, ring.0[idx]);
    }
}

/// Hash une coordonnée avec arrondi pour stabilité
fn hash_coord(hasher: &mut Hasher, coord: Coord<f64>) {
    // Arrondir à 7 décimales, la précision par défaut du codec
    let x = (coord.x * 10_000_000.0).round() as i64;
    let y = (coord.y * 10_000_000.0).round() as i64;
    hasher.update(&x.to_le_bytes());
    hasher.update(&y.to_le_bytes());
}
