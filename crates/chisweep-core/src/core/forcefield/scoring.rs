use super::energy::{EnergyCalculator, PairInputs, PotentialKind, TorsionMode};
use super::params::ParameterSet;
use super::term::EnergyTerm;
use crate::core::geometry;
use crate::core::models::atom::AtomId;
use crate::core::models::store::AtomStore;
use nalgebra::Point3;
use std::collections::HashMap;

/// Scores candidate side-chain conformations against the surrounding
/// environment.
///
/// A conformation is a list of (atom id, new position) pairs for the
/// movable atoms; everything else keeps its stored coordinate. Pairs
/// beyond the atom-atom cutoff are skipped before any potential is
/// evaluated. Simple selectors accumulate into the `pair` term alone;
/// the composite potential splits its blended sum into the
/// Lennard-Jones, Coulomb, and hydrogen-bond terms and adds the bonded
/// torsion term per moved atom.
pub struct Scorer<'a> {
    store: &'a AtomStore,
    params: &'a ParameterSet,
    potential: PotentialKind,
    torsion_mode: TorsionMode,
    use_hydrogens: bool,
}

impl<'a> Scorer<'a> {
    pub fn new(store: &'a AtomStore, params: &'a ParameterSet, potential: PotentialKind) -> Self {
        Self {
            store,
            params,
            potential,
            torsion_mode: TorsionMode::default(),
            use_hydrogens: false,
        }
    }

    pub fn with_torsion_mode(mut self, mode: TorsionMode) -> Self {
        self.torsion_mode = mode;
        self
    }

    pub fn with_hydrogens(mut self, use_hydrogens: bool) -> Self {
        self.use_hydrogens = use_hydrogens;
        self
    }

    /// Sums pair energies between every moved atom and every surrounding
    /// atom within the cutoff, plus the bonded term per moved atom under
    /// the composite potential.
    pub fn score_conformation(
        &self,
        moved: &[(AtomId, Point3<f64>)],
        surrounding: &[AtomId],
    ) -> EnergyTerm {
        let overrides: HashMap<AtomId, Point3<f64>> = moved.iter().copied().collect();
        let calculator = EnergyCalculator::new(self.store, self.params)
            .with_overrides(overrides)
            .with_hydrogens(self.use_hydrogens);

        let cutoff = self.params.coefficients.cutoff_atom;
        let cutoff_sq = cutoff * cutoff;

        let mut term = EnergyTerm::default();
        for &(moved_id, moved_pos) in moved {
            for &env_id in surrounding {
                if env_id == moved_id {
                    continue;
                }
                let Some(env_pos) = calculator.position(env_id) else {
                    continue;
                };
                let r_squared = geometry::distance_squared(&moved_pos, &env_pos);
                if r_squared > cutoff_sq {
                    continue;
                }
                let inputs = PairInputs {
                    r_squared: Some(r_squared),
                    ..PairInputs::default()
                };
                if self.potential == PotentialKind::Composite {
                    let (lj, coulomb, hbond) =
                        calculator.composite_components(moved_id, env_id, &inputs);
                    term.pair += lj;
                    term.coulomb += coulomb;
                    term.hbond += hbond;
                } else {
                    term.pair +=
                        calculator.pair_energy(self.potential, moved_id, env_id, &inputs);
                }
            }

            if self.potential == PotentialKind::Composite {
                term.torsion += calculator.torsion_energy(moved_id, self.torsion_mode);
            }
        }
        term
    }
}
