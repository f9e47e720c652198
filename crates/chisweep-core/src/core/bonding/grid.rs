use crate::core::models::atom::AtomId;
use crate::core::models::store::AtomStore;
use nalgebra::Point3;
use std::collections::HashMap;

/// Uniform spatial hash over atom positions.
///
/// The cell size is chosen as the largest covalent bond length the
/// parameter tables can produce, so any bonded pair is guaranteed to lie
/// in the same cell or in one of the 26 adjacent cells. Expected lookup
/// cost is O(1) for uniform atom densities.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    cell_size: f64,
    origin: Point3<f64>,
    cells: HashMap<(i32, i32, i32), Vec<AtomId>>,
}

impl NeighborGrid {
    /// Indexes every atom of the store into its cell.
    pub fn build(store: &AtomStore, cell_size: f64) -> Self {
        // A non-positive cell size can only come from an empty covalent
        // table; any positive value keeps the hash well formed.
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };

        let origin = store
            .iter()
            .map(|(_, a)| a.position)
            .fold(
                Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                |min, p| Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
            );

        let mut grid = Self {
            cell_size,
            origin,
            cells: HashMap::new(),
        };
        for (id, atom) in store.iter() {
            let cell = grid.cell_of(&atom.position);
            grid.cells.entry(cell).or_default().push(id);
        }
        grid
    }

    /// Cell coordinates of a point, offset by one so the minimum corner
    /// lands at (1, 1, 1).
    pub fn cell_of(&self, p: &Point3<f64>) -> (i32, i32, i32) {
        (
            ((p.x - self.origin.x) / self.cell_size).floor() as i32 + 1,
            ((p.y - self.origin.y) / self.cell_size).floor() as i32 + 1,
            ((p.z - self.origin.z) / self.cell_size).floor() as i32 + 1,
        )
    }

    /// Atom ids in the 3×3×3 block of cells around (and including) the
    /// cell containing `p`.
    pub fn neighborhood(&self, p: &Point3<f64>) -> Vec<AtomId> {
        let (cx, cy, cz) = self.cell_of(p);
        let mut ids = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(cell) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        ids.extend_from_slice(cell);
                    }
                }
            }
        }
        ids
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;

    fn store_with_positions(positions: &[[f64; 3]]) -> AtomStore {
        let mut store = AtomStore::new();
        for (i, p) in positions.iter().enumerate() {
            store.insert(Atom::new(
                AtomId(i as u32 + 1),
                Element::C,
                "C",
                Point3::new(p[0], p[1], p[2]),
            ));
        }
        store
    }

    #[test]
    fn atoms_in_the_same_cell_share_a_neighborhood() {
        let store = store_with_positions(&[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
        let grid = NeighborGrid::build(&store, 2.0);

        let hood = grid.neighborhood(&Point3::new(0.1, 0.1, 0.1));
        assert!(hood.contains(&AtomId(1)));
        assert!(hood.contains(&AtomId(2)));
    }

    #[test]
    fn neighborhood_spans_adjacent_cells_only() {
        let store = store_with_positions(&[[0.0, 0.0, 0.0], [3.5, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        let grid = NeighborGrid::build(&store, 2.0);

        let hood = grid.neighborhood(&Point3::origin());
        assert!(hood.contains(&AtomId(1)));
        assert!(hood.contains(&AtomId(2))); // one cell over
        assert!(!hood.contains(&AtomId(3))); // five cells over
    }

    #[test]
    fn minimum_corner_cell_is_one_one_one() {
        let store = store_with_positions(&[[-4.0, 2.0, 7.0], [0.0, 8.0, 9.0]]);
        let grid = NeighborGrid::build(&store, 2.0);
        assert_eq!(grid.cell_of(&Point3::new(-4.0, 2.0, 7.0)), (1, 1, 1));
    }

    #[test]
    fn non_positive_cell_size_falls_back_to_unit_cells() {
        let store = store_with_positions(&[[0.0, 0.0, 0.0]]);
        let grid = NeighborGrid::build(&store, 0.0);
        assert_eq!(grid.cell_size(), 1.0);
    }
}
