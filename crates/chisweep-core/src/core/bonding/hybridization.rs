use crate::core::forcefield::params::ParameterSet;
use crate::core::models::atom::{Atom, AtomId, Hybridization};
use crate::core::models::element::Element;
use crate::core::models::store::AtomStore;
use phf::{phf_map, phf_set};
use tracing::instrument;

/// Backbone atoms that sit in the amide plane in every residue type.
static PLANAR_BACKBONE_NAMES: phf::Set<&'static str> = phf_set! {
    "C", "O", "OXT", "N",
};

/// Side-chain atoms that are part of an aromatic ring or a conjugated
/// group, per residue type. Membership forces sp² regardless of how many
/// neighbors the coordinate-derived graph found.
static PLANAR_SIDECHAIN_NAMES: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "ARG" => &["CZ", "NE", "NH1", "NH2"],
    "ASN" => &["CG", "OD1", "ND2"],
    "ASP" => &["CG", "OD1", "OD2"],
    "GLN" => &["CD", "OE1", "NE2"],
    "GLU" => &["CD", "OE1", "OE2"],
    "HIS" => &["CG", "ND1", "CD2", "CE1", "NE2"],
    "PHE" => &["CG", "CD1", "CD2", "CE1", "CE2", "CZ"],
    "TRP" => &["CG", "CD1", "CD2", "NE1", "CE2", "CE3", "CZ2", "CZ3", "CH2"],
    "TYR" => &["CG", "CD1", "CD2", "CE1", "CE2", "CZ"],
};

fn is_planar_by_convention(atom: &Atom) -> bool {
    if PLANAR_BACKBONE_NAMES.contains(atom.name.as_str()) {
        return true;
    }
    PLANAR_SIDECHAIN_NAMES
        .get(atom.comp_id.as_str())
        .is_some_and(|names| names.contains(&atom.name.as_str()))
}

fn sigma_count(store: &AtomStore, params: &ParameterSet, atom: &Atom) -> usize {
    let has_explicit_h = atom
        .connections
        .iter()
        .filter_map(|&id| store.get(id))
        .any(|n| n.element.is_hydrogen());

    if has_explicit_h {
        atom.connections.len()
    } else {
        let implied = params
            .hydrogen_names(&atom.comp_id, &atom.name)
            .map_or(0, |names| names.len());
        atom.connections.len() + implied
    }
}

/// Assigns sp/sp²/sp³ to every heavy atom of the store.
///
/// Atoms listed in the planar name tables are sp². Otherwise the count of
/// σ-neighbors decides, with hydrogens implied from the per-residue
/// hydrogen-name table when none are present in the input: four or more
/// neighbors is sp³, exactly two on carbon or nitrogen is sp, everything
/// else saturates to sp³.
#[instrument(skip_all, name = "hybridization_assignment")]
pub fn assign_hybridization(store: &mut AtomStore, params: &ParameterSet) {
    let assignments: Vec<(AtomId, Hybridization)> = store
        .iter()
        .filter(|(_, atom)| !atom.element.is_hydrogen())
        .map(|(id, atom)| {
            let hybridization = if is_planar_by_convention(atom) {
                Hybridization::Sp2
            } else {
                let sigma = sigma_count(store, params, atom);
                match (atom.element, sigma) {
                    (_, n) if n >= 4 => Hybridization::Sp3,
                    (Element::O, 1) => Hybridization::Sp2,
                    (Element::C | Element::N, 2) if atom.connections.len() == 2 => {
                        Hybridization::Sp
                    }
                    _ => Hybridization::Sp3,
                }
            };
            (id, hybridization)
        })
        .collect();

    for (id, hybridization) in assignments {
        if let Some(atom) = store.get_mut(id) {
            atom.hybridization = Some(hybridization);
        }
    }
}

/// Where a donor's hydrogen lives: a concrete atom from the input, or a
/// table-implied site that only exists by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrogenSite {
    Explicit(AtomId),
    Implied { name: String },
}

/// Enumerates the hydrogens of a donor heavy atom.
///
/// When `use_hydrogens` is set and the input carries explicit hydrogens
/// bonded to the donor, those are returned. Otherwise the per-residue
/// hydrogen-name table supplies implied sites; a donor absent from the
/// table has no hydrogens and cannot donate.
pub fn donor_hydrogens(
    store: &AtomStore,
    params: &ParameterSet,
    donor_id: AtomId,
    use_hydrogens: bool,
) -> Vec<HydrogenSite> {
    let Some(donor) = store.get(donor_id) else {
        return Vec::new();
    };

    if use_hydrogens {
        let explicit: Vec<HydrogenSite> = donor
            .connections
            .iter()
            .filter(|&&id| store.get(id).is_some_and(|n| n.element.is_hydrogen()))
            .map(|&id| HydrogenSite::Explicit(id))
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
    }

    params
        .hydrogen_names(&donor.comp_id, &donor.name)
        .map(|names| {
            names
                .iter()
                .map(|name| HydrogenSite::Implied { name: name.clone() })
                .collect()
        })
        .unwrap_or_default()
}

/// Covalent donor–hydrogen bond length for an implied hydrogen, from the
/// covalent radii of the donor (at its hybridization) and hydrogen.
pub fn implied_dh_length(params: &ParameterSet, donor: &Atom) -> Option<f64> {
    let donor_radii = params.covalent(donor.element)?;
    let h_radii = params.covalent(Element::H)?;
    let index = donor
        .hybridization
        .map_or(0, |h| h.radius_index());
    Some(donor_radii.bond_length[index] + h_radii.bond_length[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn add_atom(
        store: &mut AtomStore,
        id: u32,
        element: Element,
        name: &str,
        comp: &str,
        pos: [f64; 3],
    ) {
        let mut atom = Atom::new(AtomId(id), element, name, Point3::new(pos[0], pos[1], pos[2]));
        atom.comp_id = comp.to_string();
        atom.chain_id = "A".to_string();
        atom.seq_id = 1;
        store.insert(atom);
    }

    fn connect(store: &mut AtomStore, a: u32, b: u32) {
        store.get_mut(AtomId(a)).unwrap().connections.push(AtomId(b));
        store.get_mut(AtomId(b)).unwrap().connections.push(AtomId(a));
    }

    #[test]
    fn backbone_amide_atoms_are_sp2() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "N", "SER", [0.0, 0.0, 0.0]);
        add_atom(&mut store, 2, Element::C, "C", "SER", [1.3, 0.0, 0.0]);
        add_atom(&mut store, 3, Element::O, "O", "SER", [1.9, 1.1, 0.0]);
        connect(&mut store, 2, 3);

        let params = ParameterSet::default();
        assign_hybridization(&mut store, &params);

        for id in [1, 2, 3] {
            assert_eq!(
                store.get(AtomId(id)).unwrap().hybridization,
                Some(Hybridization::Sp2)
            );
        }
    }

    #[test]
    fn aromatic_ring_carbons_are_sp2_but_aliphatic_are_sp3() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::C, "CG", "PHE", [0.0, 0.0, 0.0]);
        add_atom(&mut store, 2, Element::C, "CG", "LEU", [5.0, 0.0, 0.0]);

        let params = ParameterSet::default();
        assign_hybridization(&mut store, &params);

        assert_eq!(
            store.get(AtomId(1)).unwrap().hybridization,
            Some(Hybridization::Sp2)
        );
        assert_eq!(
            store.get(AtomId(2)).unwrap().hybridization,
            Some(Hybridization::Sp3)
        );
    }

    #[test]
    fn hydroxyl_oxygen_is_sp3_and_carbonyl_like_lone_oxygen_is_sp2() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::O, "OG", "SER", [0.0, 0.0, 0.0]);
        add_atom(&mut store, 2, Element::C, "CB", "SER", [1.4, 0.0, 0.0]);
        // A het-group oxygen with one bond and no hydrogen-table entry.
        add_atom(&mut store, 3, Element::O, "O1", "LIG", [9.0, 0.0, 0.0]);
        add_atom(&mut store, 4, Element::C, "C1", "LIG", [10.2, 0.0, 0.0]);
        connect(&mut store, 1, 2);
        connect(&mut store, 3, 4);

        let params = ParameterSet::default();
        assign_hybridization(&mut store, &params);

        assert_eq!(
            store.get(AtomId(1)).unwrap().hybridization,
            Some(Hybridization::Sp3)
        );
        assert_eq!(
            store.get(AtomId(3)).unwrap().hybridization,
            Some(Hybridization::Sp2)
        );
    }

    #[test]
    fn lysine_ammonium_nitrogen_saturates_to_sp3() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::N, "NZ", "LYS", [0.0, 0.0, 0.0]);
        add_atom(&mut store, 2, Element::C, "CE", "LYS", [1.5, 0.0, 0.0]);
        connect(&mut store, 1, 2);

        let params = ParameterSet::default();
        assign_hybridization(&mut store, &params);

        // One heavy neighbor + three implied hydrogens.
        assert_eq!(
            store.get(AtomId(1)).unwrap().hybridization,
            Some(Hybridization::Sp3)
        );
    }

    #[test]
    fn hydrogens_themselves_are_not_assigned() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::H, "HG", "SER", [0.0, 0.0, 0.0]);
        let params = ParameterSet::default();
        assign_hybridization(&mut store, &params);
        assert_eq!(store.get(AtomId(1)).unwrap().hybridization, None);
    }

    #[test]
    fn donor_hydrogens_prefer_explicit_atoms() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::O, "OG", "SER", [0.0, 0.0, 0.0]);
        add_atom(&mut store, 2, Element::H, "HG", "SER", [0.95, 0.0, 0.0]);
        connect(&mut store, 1, 2);

        let params = ParameterSet::default();
        let sites = donor_hydrogens(&store, &params, AtomId(1), true);
        assert_eq!(sites, vec![HydrogenSite::Explicit(AtomId(2))]);
    }

    #[test]
    fn donor_hydrogens_fall_back_to_table_names() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::O, "OG", "SER", [0.0, 0.0, 0.0]);

        let params = ParameterSet::default();
        let sites = donor_hydrogens(&store, &params, AtomId(1), true);
        assert_eq!(
            sites,
            vec![HydrogenSite::Implied {
                name: "HG".to_string()
            }]
        );

        // Hydrogens disabled: always generalized.
        add_atom(&mut store, 2, Element::H, "HG", "SER", [0.95, 0.0, 0.0]);
        connect(&mut store, 1, 2);
        let sites = donor_hydrogens(&store, &params, AtomId(1), false);
        assert!(matches!(sites[0], HydrogenSite::Implied { .. }));
    }

    #[test]
    fn non_donor_heavy_atom_has_no_hydrogen_sites() {
        let mut store = AtomStore::new();
        add_atom(&mut store, 1, Element::C, "CB", "SER", [0.0, 0.0, 0.0]);
        let params = ParameterSet::default();
        assert!(donor_hydrogens(&store, &params, AtomId(1), true).is_empty());
    }

    #[test]
    fn implied_dh_length_tracks_donor_hybridization() {
        let params = ParameterSet::default();
        let mut donor = Atom::new(AtomId(1), Element::N, "N", Point3::origin());
        donor.hybridization = Some(Hybridization::Sp3);
        assert!((implied_dh_length(&params, &donor).unwrap() - 1.02).abs() < 1e-12);

        donor.hybridization = Some(Hybridization::Sp2);
        assert!((implied_dh_length(&params, &donor).unwrap() - 0.91).abs() < 1e-12);
    }
}
