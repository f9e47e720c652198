use crate::core::bonding::builder::BondBuilder;
use crate::core::bonding::hybridization::assign_hybridization;
use crate::core::forcefield::params::ParameterSet;
use crate::core::models::atom::{AtomId, ResidueKey, SelectionState};
use crate::core::models::store::AtomStore;
use crate::engine::cancel::CancelToken;
use crate::engine::config::{ResidueSelection, SweepConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sampler::{sweep_residue, ResidueSweep};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-residue outcome of a sweep run.
#[derive(Debug, Clone)]
pub struct ResidueSummary {
    pub residue: ResidueKey,
    pub comp_id: String,
    /// Angle combinations evaluated.
    pub evaluated: usize,
    /// Rotamers kept after ranking and truncation.
    pub emitted: usize,
    pub best_energy: Option<f64>,
    /// Ids of the pseudo-atoms appended for this residue.
    pub pseudo_atom_ids: Vec<AtomId>,
}

/// The result of a sweep run: what was swept, what was appended, and
/// which residues were skipped and why.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub residues: Vec<ResidueSummary>,
    pub warnings: Vec<String>,
}

struct SweepJob {
    residue: ResidueKey,
    target_ids: Vec<AtomId>,
    surrounding: Vec<AtomId>,
}

enum JobOutcome {
    Swept(Option<ResidueSweep>),
    Failed(EngineError),
    TimedOut,
}

/// Runs the complete procedure: covalent-graph reconstruction,
/// hybridization assignment, selection marking, one dihedral sweep per
/// selected residue, and pseudo-atom materialization.
///
/// Residue sweeps are pure in the frozen store and may run in parallel
/// (`parallel` feature); pseudo-atom ids are assigned in a final
/// single-threaded merge, in residue-key order, so identical inputs
/// always produce identical output ids. Configuration problems surface
/// before any sampling; per-residue failures become report warnings.
#[instrument(skip_all, name = "sweep_workflow")]
pub fn run(
    store: &mut AtomStore,
    params: &ParameterSet,
    config: &SweepConfig,
    selection: &ResidueSelection,
    reporter: &ProgressReporter,
    cancel: &CancelToken,
) -> Result<SweepReport, EngineError> {
    config.validate(&params.coefficients)?;

    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    BondBuilder::new(params)
        .with_length_error(config.length_error)
        .infer_connections(store);
    assign_hybridization(store, params);
    let jobs = prepare_jobs(store, params, selection);
    reporter.report(Progress::PhaseFinish);

    info!(residues = jobs.len(), "starting dihedral sweeps");
    reporter.report(Progress::PhaseStart { name: "Sweep" });
    reporter.report(Progress::SweepStart {
        total_residues: jobs.len() as u64,
    });

    let deadline = config.timeout.map(|budget| Instant::now() + budget);
    let frozen: &AtomStore = store;

    let sweep_one = |job: &SweepJob| -> JobOutcome {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return JobOutcome::TimedOut;
        }
        let outcome = match sweep_residue(
            frozen,
            params,
            config,
            &job.residue,
            &job.surrounding,
            cancel,
        ) {
            Ok(sweep) => JobOutcome::Swept(sweep),
            Err(error) => JobOutcome::Failed(error),
        };
        reporter.report(Progress::ResidueDone);
        outcome
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<JobOutcome> = jobs.par_iter().map(sweep_one).collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<JobOutcome> = jobs.iter().map(sweep_one).collect();

    reporter.report(Progress::SweepFinish);
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Materialization",
    });
    let mut report = SweepReport::default();
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            JobOutcome::Swept(Some(sweep)) => {
                let summary = materialize(store, &sweep);
                report.residues.push(summary);
            }
            JobOutcome::Swept(None) => {
                let message = format!(
                    "residue {} has no rotatable-bond entry; emitted zero rotamers",
                    job.residue
                );
                warn!("{message}");
                report.warnings.push(message);
            }
            JobOutcome::Failed(EngineError::Cancelled) => {
                return Err(EngineError::Cancelled);
            }
            JobOutcome::Failed(error) => {
                let message = format!("sweep aborted for residue {}: {error}", job.residue);
                warn!("{message}");
                report.warnings.push(message);
            }
            JobOutcome::TimedOut => {
                let message = format!(
                    "residue {} skipped: sweep budget exhausted",
                    job.residue
                );
                warn!("{message}");
                report.warnings.push(message);
            }
        }
    }
    reporter.report(Progress::PhaseFinish);

    info!(
        swept = report.residues.len(),
        warnings = report.warnings.len(),
        "sweep workflow complete"
    );
    Ok(report)
}

/// Resolves the target residues, computes each one's surrounding set,
/// and writes the combined selection tags into the store.
fn prepare_jobs(
    store: &mut AtomStore,
    params: &ParameterSet,
    selection: &ResidueSelection,
) -> Vec<SweepJob> {
    let targets: Vec<ResidueKey> = match selection {
        ResidueSelection::Keys(keys) => keys.clone(),
        ResidueSelection::All => store
            .residue_keys()
            .into_iter()
            .filter(|key| {
                store
                    .atoms_in_residue(key)
                    .first()
                    .and_then(|&id| store.get(id))
                    .is_some_and(|atom| params.chi_bonds(&atom.comp_id).is_some())
            })
            .collect(),
    };

    let all_ids: Vec<AtomId> = store.ids().collect();
    let cutoff = params.coefficients.cutoff_residue;

    let jobs: Vec<SweepJob> = targets
        .into_iter()
        .map(|residue| {
            let target_ids = store.atoms_in_residue(&residue);
            let surrounding = store.surrounding_of(&target_ids, &all_ids, cutoff);
            SweepJob {
                residue,
                target_ids,
                surrounding,
            }
        })
        .collect();

    // Combined tags for the output: surroundings first, then targets so
    // a target of one sweep never degrades to another sweep's
    // surrounding.
    for (_, atom) in store.iter_mut() {
        atom.selection_state = SelectionState::Ignored;
        atom.selection_group = None;
    }
    for (group, job) in jobs.iter().enumerate() {
        for &id in &job.surrounding {
            if let Some(atom) = store.get_mut(id) {
                if atom.selection_state != SelectionState::Target {
                    atom.selection_state = SelectionState::Surrounding;
                    atom.selection_group = Some(group as u32);
                }
            }
        }
    }
    for (group, job) in jobs.iter().enumerate() {
        for &id in &job.target_ids {
            if let Some(atom) = store.get_mut(id) {
                atom.selection_state = SelectionState::Target;
                atom.selection_group = Some(group as u32);
            }
        }
    }

    jobs
}

/// Appends the ranked rotamers of one residue as pseudo-atoms and
/// returns the residue summary.
fn materialize(store: &mut AtomStore, sweep: &ResidueSweep) -> ResidueSummary {
    let mut pseudo_atom_ids = Vec::new();
    for rotamer in &sweep.rotamers {
        let dihedral_angles: BTreeMap<String, f64> = sweep
            .chi_names
            .iter()
            .cloned()
            .zip(rotamer.chi_values.iter().copied())
            .collect();

        for &(source_id, position) in &rotamer.positions {
            let Some(source) = store.get(source_id).cloned() else {
                continue;
            };
            let id = store.next_id();
            let mut pseudo = source.to_pseudo(id, position);
            pseudo.rotamer_energy = Some(rotamer.energy.total());
            pseudo.rotamer_rank = Some(rotamer.rank);
            pseudo.dihedral_angles = dihedral_angles.clone();
            store.insert(pseudo);
            pseudo_atom_ids.push(id);
        }
    }

    ResidueSummary {
        residue: sweep.residue.clone(),
        comp_id: sweep.comp_id.clone(),
        evaluated: sweep.evaluated,
        emitted: sweep.rotamers.len(),
        best_energy: sweep.rotamers.first().map(|r| r.energy.total()),
        pseudo_atom_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::energy::PotentialKind;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use crate::engine::config::AngleSpec;
    use nalgebra::Point3;
    use std::collections::BTreeMap as Map;
    use std::f64::consts::{PI, TAU};

    fn add_atom(
        store: &mut AtomStore,
        id: u32,
        element: Element,
        name: &str,
        comp: &str,
        seq: isize,
        pos: [f64; 3],
    ) {
        let mut atom = Atom::new(AtomId(id), element, name, Point3::new(pos[0], pos[1], pos[2]));
        atom.comp_id = comp.to_string();
        atom.chain_id = "A".to_string();
        atom.entity_id = "1".to_string();
        atom.seq_id = seq;
        store.insert(atom);
    }

    /// A lone serine; coordinates chosen so the bond builder recovers
    /// the canonical graph.
    fn serine_store() -> AtomStore {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "N", "SER", 1, [-0.53, 1.36, 0.0]);
        add_atom(&mut store, 2, Element::C, "CA", "SER", 1, [0.0, 0.0, 0.0]);
        add_atom(&mut store, 3, Element::C, "C", "SER", 1, [1.29, -0.09, 0.79]);
        add_atom(&mut store, 4, Element::O, "O", "SER", 1, [1.74, -1.09, 1.35]);
        add_atom(&mut store, 5, Element::C, "CB", "SER", 1, [-1.03, -1.07, 0.39]);
        add_atom(&mut store, 6, Element::O, "OG", "SER", 1, [-2.28, -0.88, -0.26]);
        store
    }

    /// An arginine side chain laid out as an all-trans zig-zag.
    fn arginine_store() -> AtomStore {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "N", "ARG", 1, [-0.75, 1.299, 0.0]);
        add_atom(&mut store, 2, Element::C, "CA", "ARG", 1, [0.0, 0.0, 0.0]);
        add_atom(&mut store, 3, Element::C, "C", "ARG", 1, [-0.75, -1.299, 0.0]);
        add_atom(&mut store, 4, Element::O, "O", "ARG", 1, [-0.75, -2.529, 0.0]);
        add_atom(&mut store, 5, Element::C, "CB", "ARG", 1, [1.299, 0.75, 0.0]);
        add_atom(&mut store, 6, Element::C, "CG", "ARG", 1, [2.598, 0.0, 0.0]);
        add_atom(&mut store, 7, Element::C, "CD", "ARG", 1, [3.897, 0.75, 0.0]);
        add_atom(&mut store, 8, Element::N, "NE", "ARG", 1, [5.196, 0.0, 0.0]);
        add_atom(&mut store, 9, Element::C, "CZ", "ARG", 1, [6.495, 0.75, 0.0]);
        store
    }

    #[test]
    fn serine_sweep_appends_ranked_pseudo_atoms() {
        let mut store = serine_store();
        let params = ParameterSet::default();

        let mut angles = Map::new();
        angles.insert("chi0".to_string(), vec![0.0, PI]);
        let config = SweepConfig {
            potential: PotentialKind::HardSphere,
            angles: AngleSpec::PerChi(angles),
            ..SweepConfig::default()
        };

        let report = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.residues.len(), 1);
        let summary = &report.residues[0];
        assert_eq!(summary.comp_id, "SER");
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.best_energy, Some(0.0));
        // One movable atom (OG) per rotamer, appended past the input ids.
        assert_eq!(summary.pseudo_atom_ids, vec![AtomId(7), AtomId(8)]);

        for &id in &summary.pseudo_atom_ids {
            let pseudo = store.get(id).unwrap();
            assert!(pseudo.is_pseudo);
            assert_eq!(pseudo.element, Element::O);
            assert_eq!(pseudo.rotamer_energy, Some(0.0));
            assert_eq!(pseudo.rotamer_rank, Some(1));
            assert!(pseudo.dihedral_angles.contains_key("chi0"));
        }

        // The grid order survives into the emission order.
        assert_eq!(store.get(AtomId(7)).unwrap().dihedral_angles["chi0"], 0.0);
        assert_eq!(store.get(AtomId(8)).unwrap().dihedral_angles["chi0"], PI);

        // Input atoms are tagged as the sweep target.
        for id in 1..=6 {
            assert_eq!(
                store.get(AtomId(id)).unwrap().selection_state,
                SelectionState::Target
            );
        }
    }

    #[test]
    fn arginine_grid_considers_256_rotamers_and_keeps_the_best() {
        let mut store = arginine_store();
        let params = ParameterSet::default();

        let config = SweepConfig {
            potential: PotentialKind::Composite,
            angles: AngleSpec::Step(TAU / 4.0),
            top_rank: Some(1),
            ..SweepConfig::default()
        };

        let report = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.residues.len(), 1);
        let summary = &report.residues[0];
        assert_eq!(summary.evaluated, 256, "4 chis × 4 values each");
        assert_eq!(summary.emitted, 1);
        // Movable atoms: CG, CD, NE, CZ.
        assert_eq!(summary.pseudo_atom_ids.len(), 4);
        for &id in &summary.pseudo_atom_ids {
            assert_eq!(store.get(id).unwrap().rotamer_rank, Some(1));
        }
    }

    #[test]
    fn explicit_hydrogens_ride_the_rotation_exactly() {
        use crate::core::geometry;
        use nalgebra::{Rotation3, Unit};

        let mut store = serine_store();
        // Hydroxyl hydrogen 0.97 Å from OG, bonded by the builder.
        add_atom(&mut store, 7, Element::H, "HG", "SER", 1, [-2.57, -1.47, -0.96]);

        let params = ParameterSet::default();
        let delta = 2.0 * PI / 3.0;

        // Measure the current chi so the swept value is current + delta.
        let positions: Vec<Point3<f64>> = [1, 2, 5, 6]
            .map(|id| store.get(AtomId(id)).unwrap().position)
            .to_vec();
        let current =
            geometry::dihedral_angle(&positions[0], &positions[1], &positions[2], &positions[3]);

        let mut angles = Map::new();
        angles.insert("chi0".to_string(), vec![current + delta]);
        let config = SweepConfig {
            potential: PotentialKind::HardSphere,
            angles: AngleSpec::PerChi(angles),
            use_hydrogens: true,
            ..SweepConfig::default()
        };

        let hg_before = store.get(AtomId(7)).unwrap().position;
        let ca = store.get(AtomId(2)).unwrap().position;
        let cb = store.get(AtomId(5)).unwrap().position;

        let report = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &CancelToken::new(),
        )
        .unwrap();

        // Movable atoms: OG and HG, one rotamer.
        let summary = &report.residues[0];
        assert_eq!(summary.pseudo_atom_ids.len(), 2);

        let pseudo_hg = summary
            .pseudo_atom_ids
            .iter()
            .map(|&id| store.get(id).unwrap())
            .find(|a| a.name == "HG")
            .expect("hydrogen pseudo-atom emitted");

        let axis = Unit::new_normalize(cb - ca);
        let reference = ca + Rotation3::from_axis_angle(&axis, delta) * (hg_before - ca);
        assert!(
            (pseudo_hg.position - reference).norm() < 1e-6,
            "hydrogen must match the analytically rotated coordinate"
        );
    }

    #[test]
    fn residues_without_topology_produce_warnings_not_errors() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::C, "CA", "GLY", 1, [0.0, 0.0, 0.0]);
        let key = store.get(AtomId(1)).unwrap().residue_key();

        let params = ParameterSet::default();
        let config = SweepConfig::default();
        let report = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::Keys(vec![key]),
            &ProgressReporter::new(),
            &CancelToken::new(),
        )
        .unwrap();

        assert!(report.residues.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("no rotatable-bond entry"));
    }

    #[test]
    fn invalid_cutoffs_fail_before_any_sampling() {
        let mut store = serine_store();
        let mut params = ParameterSet::default();
        params.coefficients.cutoff_start = 6.0;
        let config = SweepConfig::default();

        let result = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(EngineError::Config { .. })));
        // No partial output: the store still holds only the input atoms.
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn neighboring_residue_atoms_are_tagged_surrounding() {
        let mut store = serine_store();
        // A water oxygen 4 Å from the serine.
        add_atom(&mut store, 9, Element::O, "O", "HOH", 99, [0.0, 4.0, 0.0]);

        let params = ParameterSet::default();
        let mut angles = Map::new();
        angles.insert("chi0".to_string(), vec![0.0]);
        let config = SweepConfig {
            potential: PotentialKind::HardSphere,
            angles: AngleSpec::PerChi(angles),
            ..SweepConfig::default()
        };

        run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(
            store.get(AtomId(9)).unwrap().selection_state,
            SelectionState::Surrounding
        );
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let run_once = || {
            let mut store = serine_store();
            let params = ParameterSet::default();
            let mut angles = Map::new();
            angles.insert("chi0".to_string(), vec![0.0, 1.0, 2.0, 3.0]);
            let config = SweepConfig {
                potential: PotentialKind::Composite,
                angles: AngleSpec::PerChi(angles),
                ..SweepConfig::default()
            };
            run(
                &mut store,
                &params,
                &config,
                &ResidueSelection::All,
                &ProgressReporter::new(),
                &CancelToken::new(),
            )
            .unwrap();
            store
        };

        let first = run_once();
        let second = run_once();
        assert_eq!(first.len(), second.len());
        for ((id_a, atom_a), (id_b, atom_b)) in first.iter().zip(second.iter()) {
            assert_eq!(id_a, id_b);
            assert_eq!(
                atom_a.rotamer_energy.map(f64::to_bits),
                atom_b.rotamer_energy.map(f64::to_bits)
            );
            assert_eq!(atom_a.rotamer_rank, atom_b.rotamer_rank);
        }
    }

    #[test]
    fn cancellation_aborts_the_whole_run() {
        let mut store = serine_store();
        let params = ParameterSet::default();
        let config = SweepConfig::default();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = run(
            &mut store,
            &params,
            &config,
            &ResidueSelection::All,
            &ProgressReporter::new(),
            &cancel,
        );
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
