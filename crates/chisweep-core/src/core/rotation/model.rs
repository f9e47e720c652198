use crate::core::forcefield::params::ParameterSet;
use crate::core::geometry;
use crate::core::models::atom::{AtomId, ResidueKey};
use crate::core::models::store::AtomStore;
use crate::core::symbolic::matrix::SymMatrix4;
use nalgebra::{Matrix4, Point3};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Residue {residue} is missing atom '{atom}' required by {chi}")]
    MissingAtom {
        residue: ResidueKey,
        atom: String,
        chi: String,
    },
    #[error("Degenerate geometry on {chi} of residue {residue}: coincident or collinear bond atoms")]
    DegenerateBond { residue: ResidueKey, chi: String },
}

/// One rotatable bond of a residue, resolved to concrete atoms.
#[derive(Debug, Clone)]
pub struct ChiBond {
    pub index: usize,
    pub name: String,
    pub atom_ids: [AtomId; 4],
    /// Torsion measured from the input structure, radians.
    pub current_angle: f64,
}

/// A side-chain atom together with its compiled symbolic transform.
///
/// Evaluating the transform on a Δχ tuple yields the atom's rotated
/// Cartesian position; the all-zero tuple reproduces the input position.
#[derive(Debug, Clone)]
pub struct MovableAtom {
    pub id: AtomId,
    pub transform: SymMatrix4,
}

/// The symbolic rotamer model of one residue instance.
#[derive(Debug, Clone)]
pub struct RotamerModel {
    pub residue: ResidueKey,
    pub comp_id: String,
    pub chis: Vec<ChiBond>,
    pub movable: Vec<MovableAtom>,
}

impl RotamerModel {
    /// Builds the model for a residue, or `None` when the residue type
    /// carries no rotatable-bond entry (zero rotamers, not an error).
    pub fn build(
        store: &AtomStore,
        params: &ParameterSet,
        residue: &ResidueKey,
    ) -> Result<Option<RotamerModel>, ModelError> {
        let member_ids = store.atoms_in_residue(residue);
        let Some(&first_id) = member_ids.first() else {
            return Ok(None);
        };
        let comp_id = store.get(first_id).expect("member of store").comp_id.clone();

        let Some(chi_quads) = params.chi_bonds(&comp_id) else {
            debug!(%residue, comp = %comp_id, "no rotatable-bond entry; residue yields zero rotamers");
            return Ok(None);
        };

        let members: BTreeSet<AtomId> = member_ids.iter().copied().collect();

        let mut chis = Vec::with_capacity(chi_quads.len());
        let mut chi_transforms = Vec::with_capacity(chi_quads.len());
        let mut moved_by: BTreeMap<AtomId, Vec<usize>> = BTreeMap::new();

        for (index, quad) in chi_quads.iter().enumerate() {
            let name = format!("chi{index}");
            let mut atom_ids = [AtomId(0); 4];
            for (slot, atom_name) in quad.iter().enumerate() {
                atom_ids[slot] = store.find_in_residue(residue, atom_name).ok_or_else(|| {
                    ModelError::MissingAtom {
                        residue: residue.clone(),
                        atom: atom_name.clone(),
                        chi: name.clone(),
                    }
                })?;
            }

            let [a, b, c, d] = atom_ids.map(|id| store.get(id).expect("resolved id").position);
            let current_angle = geometry::dihedral_angle(&a, &b, &c, &d);
            if !current_angle.is_finite() {
                return Err(ModelError::DegenerateBond {
                    residue: residue.clone(),
                    chi: name,
                });
            }

            let transform = axis_rotation_transform(&a, &b, &c, index).ok_or_else(|| {
                ModelError::DegenerateBond {
                    residue: residue.clone(),
                    chi: name.clone(),
                }
            })?;

            for id in downstream_atoms(store, &members, atom_ids[1], atom_ids[2]) {
                moved_by.entry(id).or_default().push(index);
            }

            chis.push(ChiBond {
                index,
                name,
                atom_ids,
                current_angle,
            });
            chi_transforms.push(transform);
        }

        let movable = moved_by
            .into_iter()
            .map(|(id, chi_indices)| {
                // Outermost bond first: the χ0 transform pre-multiplies χ1,
                // which pre-multiplies χ2, and so on.
                let transform = chi_indices
                    .iter()
                    .fold(SymMatrix4::identity(), |acc, &i| {
                        acc.mul(&chi_transforms[i])
                    });
                MovableAtom { id, transform }
            })
            .collect();

        Ok(Some(RotamerModel {
            residue: residue.clone(),
            comp_id,
            chis,
            movable,
        }))
    }

    /// Current χ values in chi order, for rebasing user angles.
    pub fn current_angles(&self) -> Vec<f64> {
        self.chis.iter().map(|c| c.current_angle).collect()
    }
}

/// The sandwich `translate(mid)·A⁻¹·Rz(χ)·A·translate(−mid)` rotating
/// downstream atoms about the b→c bond axis by a symbolic angle.
fn axis_rotation_transform(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    var: usize,
) -> Option<SymMatrix4> {
    let (pre, post) = bond_axis_sandwich(a, b, c)?;
    Some(
        SymMatrix4::from_numeric(&post)
            .mul(&SymMatrix4::rotation_z_var(var))
            .mul(&SymMatrix4::from_numeric(&pre)),
    )
}

/// Bond-length stretch along the b→c axis with a symbolic length, the
/// `[0, 0, 1, r]` insertion in the local frame.
pub fn bond_length_transform(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    var: usize,
) -> Option<SymMatrix4> {
    let (pre, post) = bond_axis_sandwich(a, b, c)?;
    Some(
        SymMatrix4::from_numeric(&post)
            .mul(&SymMatrix4::translation_z_var(var))
            .mul(&SymMatrix4::from_numeric(&pre)),
    )
}

/// Bond-angle change as θ and ψ rotations in the local frame.
pub fn bond_angle_transform(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    theta_var: usize,
    psi_var: usize,
) -> Option<SymMatrix4> {
    let (pre, post) = bond_axis_sandwich(a, b, c)?;
    Some(
        SymMatrix4::from_numeric(&post)
            .mul(&SymMatrix4::rotation_x_var(theta_var))
            .mul(&SymMatrix4::rotation_y_var(psi_var))
            .mul(&SymMatrix4::from_numeric(&pre)),
    )
}

/// Numeric halves of the local-frame sandwich: `pre` carries the world
/// into the bond-aligned frame at the origin, `post` carries it back.
fn bond_axis_sandwich(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<(Matrix4<f64>, Matrix4<f64>)> {
    let mid = nalgebra::center(b, c);
    let frame = geometry::create_ref_frame(&mid, c, a);
    if !frame.x.iter().chain(frame.z.iter()).all(|v| v.is_finite()) {
        return None;
    }

    let angles = geometry::euler_angles(&frame);
    let align = geometry::frame_alignment(&angles);
    let align_inv = geometry::frame_alignment_inverse(&angles);

    let pre = align * geometry::translate(&(Point3::origin() - mid));
    let post = geometry::translate(&(mid - Point3::origin())) * align_inv;
    Some((pre, post))
}

/// Atoms that rotate with the (b, c) bond: everything reachable from `c`
/// without passing through `b`, restricted to the residue's own atoms.
fn downstream_atoms(
    store: &AtomStore,
    members: &BTreeSet<AtomId>,
    b: AtomId,
    c: AtomId,
) -> Vec<AtomId> {
    let mut visited: BTreeSet<AtomId> = [b, c].into();
    let mut queue: VecDeque<AtomId> = VecDeque::from([c]);
    let mut downstream = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(atom) = store.get(current) else {
            continue;
        };
        for &neighbor in &atom.connections {
            if !members.contains(&neighbor) || !visited.insert(neighbor) {
                continue;
            }
            downstream.push(neighbor);
            queue.push_back(neighbor);
        }
    }

    downstream.sort_unstable();
    downstream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::element::Element;
    use nalgebra::{Rotation3, Unit};

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

    fn connect(store: &mut AtomStore, a: u32, b: u32) {
        store.get_mut(AtomId(a)).unwrap().connections.push(AtomId(b));
        store.get_mut(AtomId(b)).unwrap().connections.push(AtomId(a));
    }

    /// A serine with a roughly tetrahedral side chain.
    fn serine_store() -> (AtomStore, ResidueKey) {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "N", "SER", 1, [-0.53, 1.36, 0.0]);
        add_atom(&mut store, 2, Element::C, "CA", "SER", 1, [0.0, 0.0, 0.0]);
        add_atom(&mut store, 3, Element::C, "C", "SER", 1, [1.29, -0.09, 0.79]);
        add_atom(&mut store, 4, Element::O, "O", "SER", 1, [1.33, -0.84, 1.77]);
        add_atom(&mut store, 5, Element::C, "CB", "SER", 1, [-1.03, -1.07, 0.39]);
        add_atom(&mut store, 6, Element::O, "OG", "SER", 1, [-2.28, -0.88, -0.26]);
        connect(&mut store, 1, 2);
        connect(&mut store, 2, 3);
        connect(&mut store, 3, 4);
        connect(&mut store, 2, 5);
        connect(&mut store, 5, 6);
        let key = store.get(AtomId(1)).unwrap().residue_key();
        (store, key)
    }

    #[test]
    fn unknown_residue_type_builds_no_model() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::C, "CA", "GLY", 1, [0.0, 0.0, 0.0]);
        let key = store.get(AtomId(1)).unwrap().residue_key();

        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap();
        assert!(model.is_none());
    }

    #[test]
    fn missing_chi_atom_is_an_error() {
        let (mut store, key) = serine_store();
        // Remove OG by rebuilding without it.
        let mut truncated = AtomStore::new();
        for (_, atom) in store.iter_mut() {
            if atom.name != "OG" {
                let mut copy = atom.clone();
                copy.connections.retain(|&n| n != AtomId(6));
                truncated.insert(copy);
            }
        }

        let params = ParameterSet::default();
        let result = RotamerModel::build(&truncated, &params, &key);
        assert!(matches!(
            result,
            Err(ModelError::MissingAtom { atom, .. }) if atom == "OG"
        ));
    }

    #[test]
    fn serine_model_has_one_chi_and_moves_only_og() {
        let (store, key) = serine_store();
        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap().unwrap();

        assert_eq!(model.comp_id, "SER");
        assert_eq!(model.chis.len(), 1);
        assert_eq!(model.chis[0].name, "chi0");
        let movable_ids: Vec<AtomId> = model.movable.iter().map(|m| m.id).collect();
        assert_eq!(movable_ids, vec![AtomId(6)]);
    }

    #[test]
    fn zero_delta_reproduces_input_coordinates() {
        let (store, key) = serine_store();
        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap().unwrap();

        for movable in &model.movable {
            let original = store.get(movable.id).unwrap().position;
            let evaluated = movable.transform.eval_point(&[0.0], &original);
            assert!(
                (evaluated - original).norm() < 1e-9,
                "identity rotamer must reproduce the input"
            );
        }
    }

    #[test]
    fn chi_rotation_matches_axis_angle_reference() {
        let (store, key) = serine_store();
        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap().unwrap();

        let delta = 1.1;
        let og = store.get(AtomId(6)).unwrap().position;
        let rotated = model.movable[0].transform.eval_point(&[delta], &og);

        // Reference: axis-angle rotation about the CA→CB axis line.
        let ca = store.get(AtomId(2)).unwrap().position;
        let cb = store.get(AtomId(5)).unwrap().position;
        let axis = Unit::new_normalize(cb - ca);
        let reference = ca + Rotation3::from_axis_angle(&axis, delta) * (og - ca);

        assert!((rotated - reference).norm() < 1e-9);
    }

    #[test]
    fn chi_rotation_shifts_the_measured_dihedral_by_delta() {
        let (store, key) = serine_store();
        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap().unwrap();

        let chi = &model.chis[0];
        let delta = 0.7;
        let og_new = model.movable[0]
            .transform
            .eval_point(&[delta], &store.get(AtomId(6)).unwrap().position);

        let [n, ca, cb, _] = chi.atom_ids.map(|id| store.get(id).unwrap().position);
        let new_angle = geometry::dihedral_angle(&n, &ca, &cb, &og_new);
        let mut diff = new_angle - chi.current_angle - delta;
        while diff > std::f64::consts::PI {
            diff -= 2.0 * std::f64::consts::PI;
        }
        while diff < -std::f64::consts::PI {
            diff += 2.0 * std::f64::consts::PI;
        }
        assert!(diff.abs() < 1e-9);
    }

    #[test]
    fn nested_chis_compose_outermost_first() {
        // An isoleucine-like two-chi chain along x.
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "N", "ILE", 1, [-0.5, 1.4, 0.2]);
        add_atom(&mut store, 2, Element::C, "CA", "ILE", 1, [0.0, 0.0, 0.0]);
        add_atom(&mut store, 3, Element::C, "C", "ILE", 1, [1.0, -0.3, -1.1]);
        add_atom(&mut store, 4, Element::O, "O", "ILE", 1, [1.1, -1.5, -1.3]);
        add_atom(&mut store, 5, Element::C, "CB", "ILE", 1, [1.0, 0.6, 1.0]);
        add_atom(&mut store, 6, Element::C, "CG1", "ILE", 1, [2.3, 1.1, 0.4]);
        add_atom(&mut store, 7, Element::C, "CG2", "ILE", 1, [0.3, 1.8, 1.7]);
        add_atom(&mut store, 8, Element::C, "CD1", "ILE", 1, [3.3, 1.7, 1.4]);
        connect(&mut store, 1, 2);
        connect(&mut store, 2, 3);
        connect(&mut store, 3, 4);
        connect(&mut store, 2, 5);
        connect(&mut store, 5, 6);
        connect(&mut store, 5, 7);
        connect(&mut store, 6, 8);
        let key = store.get(AtomId(1)).unwrap().residue_key();

        let params = ParameterSet::default();
        let model = RotamerModel::build(&store, &params, &key).unwrap().unwrap();
        assert_eq!(model.chis.len(), 2);

        // CD1 is downstream of both bonds; CG2 only of the first.
        let cd1 = model.movable.iter().find(|m| m.id == AtomId(8)).unwrap();
        let cg2 = model.movable.iter().find(|m| m.id == AtomId(7)).unwrap();
        assert_eq!(cd1.transform.vars().into_iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(cg2.transform.vars().into_iter().collect::<Vec<_>>(), vec![0]);

        // Composition reference: rotate about χ1's axis first, then χ0's.
        let delta = [0.8, -0.5];
        let cd1_pos = store.get(AtomId(8)).unwrap().position;
        let ca = store.get(AtomId(2)).unwrap().position;
        let cb = store.get(AtomId(5)).unwrap().position;
        let cg1 = store.get(AtomId(6)).unwrap().position;

        let axis1 = Unit::new_normalize(cg1 - cb);
        let step1 = cb + Rotation3::from_axis_angle(&axis1, delta[1]) * (cd1_pos - cb);
        let axis0 = Unit::new_normalize(cb - ca);
        let reference = ca + Rotation3::from_axis_angle(&axis0, delta[0]) * (step1 - ca);

        let evaluated = cd1.transform.eval_point(&delta, &cd1_pos);
        assert!((evaluated - reference).norm() < 1e-9);
    }

    #[test]
    fn bond_length_transform_stretches_along_the_axis() {
        let a = Point3::new(-1.0, 0.3, 0.0);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(1.5, 0.0, 0.0);
        let t = bond_length_transform(&a, &b, &c, 0).unwrap();

        let stretched = t.eval_point(&[0.4], &c);
        assert!((geometry::distance(&b, &stretched) - 1.9).abs() < 1e-9);

        let unchanged = t.eval_point(&[0.0], &c);
        assert!((unchanged - c).norm() < 1e-12);
    }

    #[test]
    fn bond_angle_transform_is_identity_at_zero() {
        let a = Point3::new(-0.4, 1.0, 0.2);
        let b = Point3::new(0.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.5, 0.1);
        let t = bond_angle_transform(&a, &b, &c, 0, 1).unwrap();

        let p = Point3::new(0.3, 2.0, 0.5);
        let unchanged = t.eval_point(&[0.0, 0.0], &p);
        assert!((unchanged - p).norm() < 1e-12);

        let bent = t.eval_point(&[0.3, 0.0], &p);
        assert!((bent - p).norm() > 1e-3);
    }
}
