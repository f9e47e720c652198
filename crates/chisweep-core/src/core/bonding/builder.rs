use super::grid::NeighborGrid;
use crate::core::forcefield::params::{ParameterSet, DEFAULT_LENGTH_ERROR};
use crate::core::geometry;
use crate::core::models::atom::AtomId;
use crate::core::models::store::AtomStore;
use itertools::iproduct;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Infers the covalent bond graph from coordinates alone.
///
/// Every atom pair within the same 3×3×3 cell block of the neighbor grid
/// is tested against the candidate bond lengths ℓ formed by summing one
/// covalent radius of each atom (Cartesian product over the two
/// per-element radius triples). A pair is bonded when its distance falls
/// inside `(ℓ − ε, ℓ + ε)` for any candidate; the first matching candidate
/// wins. Atoms whose element carries no covalent entry infer no bonds.
#[derive(Debug, Clone)]
pub struct BondBuilder<'a> {
    params: &'a ParameterSet,
    length_error: f64,
}

impl<'a> BondBuilder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self {
            params,
            length_error: DEFAULT_LENGTH_ERROR,
        }
    }

    /// Overrides the matching tolerance ε (Å).
    pub fn with_length_error(mut self, length_error: f64) -> Self {
        self.length_error = length_error;
        self
    }

    /// Writes symmetric, sorted `connections` lists into the store.
    #[instrument(skip_all, name = "bond_inference", fields(atoms = store.len()))]
    pub fn infer_connections(&self, store: &mut AtomStore) {
        let grid = NeighborGrid::build(store, self.params.max_bond_length());
        let mut connections: BTreeMap<AtomId, Vec<AtomId>> = BTreeMap::new();

        let mut skipped = 0usize;
        for (id, atom) in store.iter() {
            let Some(cov_i) = self.params.covalent(atom.element) else {
                skipped += 1;
                continue;
            };

            let mut neighbors = Vec::new();
            let mut candidates = grid.neighborhood(&atom.position);
            candidates.sort_unstable();
            for other_id in candidates {
                if other_id == id {
                    continue;
                }
                let other = store.get(other_id).expect("grid ids come from the store");
                let Some(cov_j) = self.params.covalent(other.element) else {
                    continue;
                };

                let dist_sq = geometry::distance_squared(&atom.position, &other.position);
                if self.lengths_match(&cov_i.bond_length, &cov_j.bond_length, dist_sq) {
                    neighbors.push(other_id);
                }
            }
            connections.insert(id, neighbors);
        }

        if skipped > 0 {
            debug!(skipped, "atoms without covalent parameters infer no bonds");
        }

        // Symmetrize: a one-sided match still bonds both atoms.
        let snapshot = connections.clone();
        for (&id, neighbors) in &snapshot {
            for &other_id in neighbors {
                let back = connections.entry(other_id).or_default();
                if !back.contains(&id) {
                    back.push(id);
                }
            }
        }

        for (id, mut neighbors) in connections {
            neighbors.sort_unstable();
            neighbors.dedup();
            if let Some(atom) = store.get_mut(id) {
                atom.connections = neighbors;
            }
        }
    }

    fn lengths_match(&self, radii_i: &[f64; 3], radii_j: &[f64; 3], dist_sq: f64) -> bool {
        iproduct!(radii_i, radii_j).any(|(&ri, &rj)| {
            let length = ri + rj;
            let lower = (length - self.length_error).max(0.0);
            let upper = length + self.length_error;
            dist_sq >= lower * lower && dist_sq <= upper * upper
        })
    }
}
