use super::cancel::CancelToken;
use super::config::SweepConfig;
use super::error::EngineError;
use crate::core::forcefield::params::ParameterSet;
use crate::core::forcefield::scoring::Scorer;
use crate::core::forcefield::term::EnergyTerm;
use crate::core::models::atom::{AtomId, ResidueKey};
use crate::core::models::store::AtomStore;
use crate::core::rotation::model::RotamerModel;
use nalgebra::Point3;
use std::cmp::Ordering;
use tracing::instrument;

/// Odometer over an n-dimensional index space; the last axis advances
/// fastest, so combinations appear in row-major order.
struct CartesianIndices {
    lengths: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CartesianIndices {
    fn new(lengths: Vec<usize>) -> Self {
        let next = if lengths.iter().all(|&len| len > 0) {
            Some(vec![0; lengths.len()])
        } else {
            None
        };
        Self { lengths, next }
    }
}

impl Iterator for CartesianIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.clone()?;
        let mut bumped = current.clone();
        let mut axis = bumped.len();
        loop {
            if axis == 0 {
                self.next = None;
                break;
            }
            axis -= 1;
            bumped[axis] += 1;
            if bumped[axis] < self.lengths[axis] {
                self.next = Some(bumped);
                break;
            }
            bumped[axis] = 0;
        }
        Some(current)
    }
}

/// One scored and ranked rotamer of a residue sweep.
#[derive(Debug, Clone)]
pub struct RankedRotamer {
    /// 1-based competition rank; equal energies share a rank.
    pub rank: usize,
    pub energy: EnergyTerm,
    /// Absolute χ values of this rotamer, in χ order.
    pub chi_values: Vec<f64>,
    /// New Cartesian positions of the movable atoms.
    pub positions: Vec<(AtomId, Point3<f64>)>,
}

/// The outcome of sweeping one residue.
#[derive(Debug, Clone)]
pub struct ResidueSweep {
    pub residue: ResidueKey,
    pub comp_id: String,
    pub chi_names: Vec<String>,
    /// Number of angle combinations evaluated.
    pub evaluated: usize,
    /// Ranked rotamers, best first, truncated to the configured top-K.
    pub rotamers: Vec<RankedRotamer>,
}

/// Sweeps the angle grid of one residue and ranks every candidate.
///
/// User angles are rebased against the measured torsions, so the
/// all-zero delta reproduces the input coordinates exactly. Returns
/// `None` when the residue type has no rotatable-bond entry. The store
/// is never mutated here; pseudo-atom materialization happens at the
/// workflow layer so ids stay deterministic under parallel sweeps.
#[instrument(skip_all, name = "residue_sweep", fields(residue = %residue))]
pub fn sweep_residue(
    store: &AtomStore,
    params: &ParameterSet,
    config: &SweepConfig,
    residue: &ResidueKey,
    surrounding: &[AtomId],
    cancel: &CancelToken,
) -> Result<Option<ResidueSweep>, EngineError> {
    let model = RotamerModel::build(store, params, residue).map_err(|source| {
        EngineError::Model {
            residue: residue.clone(),
            source,
        }
    })?;
    let Some(model) = model else {
        return Ok(None);
    };

    let value_lists: Vec<Vec<f64>> = model
        .chis
        .iter()
        .map(|chi| config.angles.values_for(&chi.name, chi.current_angle))
        .collect();
    let current = model.current_angles();

    let scorer = Scorer::new(store, params, config.potential)
        .with_torsion_mode(config.torsion_mode)
        .with_hydrogens(config.use_hydrogens);

    struct Candidate {
        order: usize,
        chi_values: Vec<f64>,
        positions: Vec<(AtomId, Point3<f64>)>,
        energy: EnergyTerm,
    }

    let mut candidates = Vec::new();
    for (order, indices) in
        CartesianIndices::new(value_lists.iter().map(Vec::len).collect()).enumerate()
    {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let chi_values: Vec<f64> = indices
            .iter()
            .zip(&value_lists)
            .map(|(&i, values)| values[i])
            .collect();
        let deltas: Vec<f64> = chi_values
            .iter()
            .zip(&current)
            .map(|(user, measured)| user - measured)
            .collect();

        let positions: Vec<(AtomId, Point3<f64>)> = model
            .movable
            .iter()
            .map(|movable| {
                let original = store
                    .get(movable.id)
                    .expect("movable atoms come from the store")
                    .position;
                (movable.id, movable.transform.eval_point(&deltas, &original))
            })
            .collect();

        let energy = scorer.score_conformation(&positions, surrounding);
        candidates.push(Candidate {
            order,
            chi_values,
            positions,
            energy,
        });
    }

    let evaluated = candidates.len();

    // Rank: energy ascending, ties by the lexicographic χ tuple, then by
    // evaluation order. +∞ clashes compare as worst.
    candidates.sort_by(|a, b| {
        a.energy
            .total()
            .total_cmp(&b.energy.total())
            .then_with(|| compare_chi_tuples(&a.chi_values, &b.chi_values))
            .then_with(|| a.order.cmp(&b.order))
    });

    let mut rotamers = Vec::with_capacity(evaluated);
    let mut previous: Option<(f64, usize)> = None;
    for (position, candidate) in candidates.into_iter().enumerate() {
        let total = candidate.energy.total();
        let rank = match previous {
            Some((prev_total, prev_rank)) if prev_total == total => prev_rank,
            _ => position + 1,
        };
        previous = Some((total, rank));
        rotamers.push(RankedRotamer {
            rank,
            energy: candidate.energy,
            chi_values: candidate.chi_values,
            positions: candidate.positions,
        });
    }

    if let Some(k) = config.top_rank {
        rotamers.truncate(k);
    }

    Ok(Some(ResidueSweep {
        residue: residue.clone(),
        comp_id: model.comp_id,
        chi_names: model.chis.iter().map(|c| c.name.clone()).collect(),
        evaluated,
        rotamers,
    }))
}

fn compare_chi_tuples(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
