use super::params::{ParameterSet, DEFAULT_TORSION_EPSILON};
use super::potentials;
use crate::core::bonding::hybridization::{donor_hydrogens, implied_dh_length, HydrogenSite};
use crate::core::geometry;
use crate::core::models::atom::{Atom, AtomId, Hybridization};
use crate::core::models::store::AtomStore;
use nalgebra::Point3;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::trace;

/// Soft-sphere repulsion strength ε_s.
const SOFT_SPHERE_EPSILON: f64 = 1.0;

/// Pair-potential selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PotentialKind {
    HardSphere,
    SoftSphere,
    LennardJones,
    Coulomb,
    HBond,
    #[default]
    Composite,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown potential name: '{0}'")]
pub struct ParsePotentialError(pub String);

impl FromStr for PotentialKind {
    type Err = ParsePotentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hard_sphere" => Ok(PotentialKind::HardSphere),
            "soft_sphere" => Ok(PotentialKind::SoftSphere),
            "lennard_jones" => Ok(PotentialKind::LennardJones),
            "coulomb" => Ok(PotentialKind::Coulomb),
            "h_bond" => Ok(PotentialKind::HBond),
            "composite" => Ok(PotentialKind::Composite),
            unknown => Err(ParsePotentialError(unknown.to_string())),
        }
    }
}

impl PotentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PotentialKind::HardSphere => "hard_sphere",
            PotentialKind::SoftSphere => "soft_sphere",
            PotentialKind::LennardJones => "lennard_jones",
            PotentialKind::Coulomb => "coulomb",
            PotentialKind::HBond => "h_bond",
            PotentialKind::Composite => "composite",
        }
    }
}

impl fmt::Display for PotentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Torsion treatment for the bonded term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorsionMode {
    /// Fixed threefold periodicity, no window.
    #[default]
    Classical,
    /// Per-name-pair well depths, windowed to ω ∈ [−π/3, π/3].
    Tabulated,
}

/// Torsion window divisor and periodicity. Fixed at 3 for every
/// hybridization; see the parameter registry for the per-pair depths.
pub const TORSION_PHASE: f64 = 3.0;

/// Precomputed pair quantities; anything absent is derived on the fly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairInputs {
    pub r: Option<f64>,
    pub r_squared: Option<f64>,
    pub sigma: Option<f64>,
}

/// Evaluates pair and bonded energies over the atom store.
///
/// Position overrides let the sampler score candidate rotamer
/// coordinates without mutating the shared store: every lookup goes
/// through [`EnergyCalculator::position`], which prefers the override.
/// Missing table entries never fail; the affected contribution is zero,
/// reported through the trace sink.
pub struct EnergyCalculator<'a> {
    store: &'a AtomStore,
    params: &'a ParameterSet,
    overrides: HashMap<AtomId, Point3<f64>>,
    use_hydrogens: bool,
}

impl<'a> EnergyCalculator<'a> {
    pub fn new(store: &'a AtomStore, params: &'a ParameterSet) -> Self {
        Self {
            store,
            params,
            overrides: HashMap::new(),
            use_hydrogens: false,
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<AtomId, Point3<f64>>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_hydrogens(mut self, use_hydrogens: bool) -> Self {
        self.use_hydrogens = use_hydrogens;
        self
    }

    /// Effective position of an atom: the override if present, the
    /// stored coordinate otherwise.
    pub fn position(&self, id: AtomId) -> Option<Point3<f64>> {
        self.overrides
            .get(&id)
            .copied()
            .or_else(|| self.store.get(id).map(|a| a.position))
    }

    fn sigma_of(&self, atom_i: &Atom, atom_j: &Atom) -> Option<f64> {
        let vdw_i = self.params.vdw_radius(atom_i.element);
        let vdw_j = self.params.vdw_radius(atom_j.element);
        match (vdw_i, vdw_j) {
            (Some(a), Some(b)) => Some(a + b),
            _ => {
                trace!(
                    i = %atom_i.name,
                    j = %atom_j.name,
                    "missing van-der-Waals radius; pair contributes zero"
                );
                None
            }
        }
    }

    /// Energy of an (i, j) pair under the selected potential.
    pub fn pair_energy(
        &self,
        kind: PotentialKind,
        i: AtomId,
        j: AtomId,
        inputs: &PairInputs,
    ) -> f64 {
        let (Some(atom_i), Some(atom_j)) = (self.store.get(i), self.store.get(j)) else {
            return 0.0;
        };
        let (Some(pos_i), Some(pos_j)) = (self.position(i), self.position(j)) else {
            return 0.0;
        };

        let r_squared = inputs
            .r_squared
            .or(inputs.r.map(|r| r * r))
            .unwrap_or_else(|| geometry::distance_squared(&pos_i, &pos_j));
        let r = inputs.r.unwrap_or_else(|| r_squared.sqrt());
        let sigma = inputs.sigma.or_else(|| self.sigma_of(atom_i, atom_j));

        let coefficients = &self.params.coefficients;
        match kind {
            PotentialKind::HardSphere => match sigma {
                Some(sigma) => potentials::hard_sphere(r_squared, sigma),
                None => 0.0,
            },
            PotentialKind::SoftSphere => match sigma {
                Some(sigma) => potentials::soft_sphere(
                    r,
                    sigma,
                    SOFT_SPHERE_EPSILON,
                    coefficients.r_sigma,
                ),
                None => 0.0,
            },
            PotentialKind::LennardJones => match sigma {
                Some(sigma) => potentials::lennard_jones(r, sigma, coefficients.lj_epsilon),
                None => 0.0,
            },
            PotentialKind::Coulomb => self.coulomb_term(atom_i, atom_j, r_squared),
            PotentialKind::HBond => self.hbond_pair(i, j),
            PotentialKind::Composite => {
                let (lj, coulomb, hbond) = self.composite_components(i, j, inputs);
                lj + coulomb + hbond
            }
        }
    }

    /// The tapered composite contributions of a pair, split by term:
    /// `(Lennard-Jones, Coulomb, hydrogen bond)`, each already weighted
    /// and multiplied by the cosine blending factor.
    pub fn composite_components(
        &self,
        i: AtomId,
        j: AtomId,
        inputs: &PairInputs,
    ) -> (f64, f64, f64) {
        let (Some(atom_i), Some(atom_j)) = (self.store.get(i), self.store.get(j)) else {
            return (0.0, 0.0, 0.0);
        };
        let (Some(pos_i), Some(pos_j)) = (self.position(i), self.position(j)) else {
            return (0.0, 0.0, 0.0);
        };

        let r_squared = inputs
            .r_squared
            .or(inputs.r.map(|r| r * r))
            .unwrap_or_else(|| geometry::distance_squared(&pos_i, &pos_j));
        let r = inputs.r.unwrap_or_else(|| r_squared.sqrt());
        let Some(sigma) = inputs.sigma.or_else(|| self.sigma_of(atom_i, atom_j)) else {
            return (0.0, 0.0, 0.0);
        };

        let coefficients = &self.params.coefficients;
        if r >= coefficients.cutoff_end * sigma {
            return (0.0, 0.0, 0.0);
        }
        let taper = potentials::taper_factor(
            r,
            sigma,
            coefficients.cutoff_start,
            coefficients.cutoff_end,
        );

        (
            coefficients.lj_k
                * potentials::lennard_jones(r, sigma, coefficients.lj_epsilon)
                * taper,
            coefficients.c_k * self.coulomb_term(atom_i, atom_j, r_squared) * taper,
            coefficients.h_k * self.hbond_pair(i, j) * taper,
        )
    }

    fn coulomb_term(&self, atom_i: &Atom, atom_j: &Atom, r_squared: f64) -> f64 {
        let q_i = self.params.partial_charge(atom_i.element);
        let q_j = self.params.partial_charge(atom_j.element);
        match (q_i, q_j) {
            (Some(q_i), Some(q_j)) => {
                potentials::coulomb(r_squared, q_i, q_j, self.params.coefficients.c_epsilon)
            }
            _ => {
                trace!(
                    i = %atom_i.name,
                    j = %atom_j.name,
                    "missing partial charge; Coulomb term contributes zero"
                );
                0.0
            }
        }
    }

    /// Hydrogen-bond energy of a pair, summed over both donor/acceptor
    /// orderings and over the donor's hydrogens.
    pub fn hbond_pair(&self, i: AtomId, j: AtomId) -> f64 {
        self.hbond_directed(i, j) + self.hbond_directed(j, i)
    }

    fn hbond_directed(&self, donor_id: AtomId, acceptor_id: AtomId) -> f64 {
        let (Some(donor), Some(acceptor)) =
            (self.store.get(donor_id), self.store.get(acceptor_id))
        else {
            return 0.0;
        };
        if !donor.element.is_hbond_capable() || !acceptor.element.is_hbond_capable() {
            return 0.0;
        }
        if !self.params.is_protonatable(&donor.comp_id, &donor.name) {
            return 0.0;
        }

        let (Some(donor_pos), Some(acceptor_pos)) =
            (self.position(donor_id), self.position(acceptor_id))
        else {
            return 0.0;
        };
        let dist_da = geometry::distance(&donor_pos, &acceptor_pos);

        let epsilon = self.params.coefficients.h_epsilon;
        let mut energy = 0.0;
        for site in donor_hydrogens(self.store, self.params, donor_id, self.use_hydrogens) {
            let (r_dh, cos_theta) = match site {
                HydrogenSite::Explicit(h_id) => {
                    let Some(h_pos) = self.position(h_id) else {
                        continue;
                    };
                    let theta = geometry::bond_angle(&acceptor_pos, &h_pos, &donor_pos);
                    (geometry::distance(&donor_pos, &h_pos), theta.cos())
                }
                HydrogenSite::Implied { .. } => {
                    let Some(r_dh) = implied_dh_length(self.params, donor) else {
                        continue;
                    };
                    let cos_theta = self.implied_cos_theta(
                        donor,
                        &donor_pos,
                        &acceptor_pos,
                        r_dh,
                        dist_da,
                    );
                    (r_dh, cos_theta)
                }
            };
            energy += potentials::hbond_12_10(dist_da, r_dh, epsilon, cos_theta);
        }
        energy
    }

    /// Analytic acceptor–hydrogen–donor cosine for a table-implied
    /// hydrogen: the donor places the hydrogen at its ideal angle α,
    /// tightened by the smallest angle any heavy neighbor already makes
    /// with the acceptor, then the triangle with the donor–acceptor
    /// separation fixes θ.
    fn implied_cos_theta(
        &self,
        donor: &Atom,
        donor_pos: &Point3<f64>,
        acceptor_pos: &Point3<f64>,
        r_dh: f64,
        dist_da: f64,
    ) -> f64 {
        let alpha = donor
            .hybridization
            .unwrap_or(Hybridization::Sp3)
            .donor_angle();

        let smallest_neighbor_angle = donor
            .connections
            .iter()
            .filter_map(|&id| self.store.get(id))
            .filter(|n| !n.element.is_hydrogen())
            .filter_map(|n| {
                let pos = self.position(n.id)?;
                Some(geometry::bond_angle(&pos, donor_pos, acceptor_pos))
            })
            .fold(f64::INFINITY, f64::min);

        let phi = if smallest_neighbor_angle.is_finite() {
            (alpha - smallest_neighbor_angle).max(0.0)
        } else {
            alpha
        };

        let r_ha_sq = r_dh * r_dh + dist_da * dist_da - 2.0 * r_dh * dist_da * phi.cos();
        let r_ha = r_ha_sq.max(0.0).sqrt();
        if r_ha < 1e-9 {
            return -1.0;
        }
        ((r_dh * r_dh + r_ha_sq - dist_da * dist_da) / (2.0 * r_dh * r_ha)).clamp(-1.0, 1.0)
    }

    /// Torsion energy of one atom, summed over every 1-2-3-4 chain that
    /// starts at it.
    pub fn torsion_energy(&self, id: AtomId, mode: TorsionMode) -> f64 {
        let Some(atom) = self.store.get(id) else {
            return 0.0;
        };
        let Some(pos_i) = self.position(id) else {
            return 0.0;
        };
        let k = self.params.coefficients.t_k;

        let mut energy = 0.0;
        for &n1 in &atom.connections {
            let Some(atom_n1) = self.store.get(n1) else {
                continue;
            };
            for &n2 in &atom_n1.connections {
                if n2 == id {
                    continue;
                }
                let Some(atom_n2) = self.store.get(n2) else {
                    continue;
                };
                for &n3 in &atom_n2.connections {
                    if n3 == n1 || n3 == id {
                        continue;
                    }
                    let Some(atom_n3) = self.store.get(n3) else {
                        continue;
                    };
                    let (Some(p1), Some(p2), Some(p3)) =
                        (self.position(n1), self.position(n2), self.position(n3))
                    else {
                        continue;
                    };
                    let omega = geometry::dihedral_angle(&pos_i, &p1, &p2, &p3);
                    energy += match mode {
                        TorsionMode::Classical => {
                            potentials::torsion_classical(omega, k, DEFAULT_TORSION_EPSILON)
                        }
                        TorsionMode::Tabulated => {
                            let epsilon =
                                self.params.torsion_epsilon(&atom.name, &atom_n3.name);
                            potentials::torsion_windowed(omega, k, epsilon, TORSION_PHASE)
                        }
                    };
                }
            }
        }
        energy
    }
}
