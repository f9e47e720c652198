use super::element::Element;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;

/// Atom serial from the `id` column; pseudo-atoms continue the sequence
/// from `max(existing) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `group_PDB` record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordGroup {
    #[default]
    Atom,
    HetAtm,
}

impl RecordGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordGroup::Atom => "ATOM",
            RecordGroup::HetAtm => "HETATM",
        }
    }
}

/// Orbital hybridization of a heavy atom, inferred from its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hybridization {
    Sp3,
    Sp2,
    Sp,
}

impl Hybridization {
    /// Index into the per-element covalent-radius triple [sp³, sp², sp].
    #[inline]
    pub fn radius_index(self) -> usize {
        match self {
            Hybridization::Sp3 => 0,
            Hybridization::Sp2 => 1,
            Hybridization::Sp => 2,
        }
    }

    /// Ideal donor angle for hydrogen placement, in radians
    /// (109.47° tetrahedral, 120° trigonal, 180° linear).
    pub fn donor_angle(self) -> f64 {
        match self {
            Hybridization::Sp3 => 109.471_220_634_490_69_f64.to_radians(),
            Hybridization::Sp2 => 120.0_f64.to_radians(),
            Hybridization::Sp => 180.0_f64.to_radians(),
        }
    }
}

/// Role of an atom in a sweep, written out as `T`/`S`/`I`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SelectionState {
    Target,
    Surrounding,
    #[default]
    Ignored,
}

impl SelectionState {
    pub fn as_char(self) -> char {
        match self {
            SelectionState::Target => 'T',
            SelectionState::Surrounding => 'S',
            SelectionState::Ignored => 'I',
        }
    }
}

/// The 4-tuple uniquely identifying a residue instance, including its
/// alternate-location conformer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub seq_id: isize,
    pub chain_id: String,
    pub entity_id: String,
    pub alt_id: String,
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.chain_id, self.seq_id, self.entity_id, self.alt_id
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    // --- Identity (from the atom_site columns) ---
    pub id: AtomId,
    pub group: RecordGroup,     // group_PDB
    pub element: Element,       // type_symbol
    pub name: String,           // label_atom_id (e.g. "CA", "OG")
    pub alt_id: String,         // label_alt_id, "." when absent
    pub comp_id: String,        // label_comp_id (e.g. "SER")
    pub chain_id: String,       // label_asym_id
    pub entity_id: String,      // label_entity_id, "?" when absent
    pub seq_id: isize,          // label_seq_id
    pub model_num: i32,         // pdbx_PDB_model_num
    pub position: Point3<f64>,

    // --- Computed by the bond builder ---
    pub connections: Vec<AtomId>, // sorted neighbor ids, symmetric
    pub hybridization: Option<Hybridization>,

    // --- Sweep bookkeeping ---
    pub selection_state: SelectionState,
    pub selection_group: Option<u32>,

    // --- Rotamer output ---
    pub is_pseudo: bool,
    pub rotamer_energy: Option<f64>,
    pub rotamer_rank: Option<usize>,
    pub dihedral_angles: BTreeMap<String, f64>, // χ name → value (radians)
}

impl Atom {
    pub fn new(id: AtomId, element: Element, name: &str, position: Point3<f64>) -> Self {
        Self {
            id,
            group: RecordGroup::Atom,
            element,
            name: name.to_string(),
            alt_id: ".".to_string(),
            comp_id: String::new(),
            chain_id: String::new(),
            entity_id: "?".to_string(),
            seq_id: 0,
            model_num: 1,
            position,
            connections: Vec::new(),
            hybridization: None,
            selection_state: SelectionState::default(),
            selection_group: None,
            is_pseudo: false,
            rotamer_energy: None,
            rotamer_rank: None,
            dihedral_angles: BTreeMap::new(),
        }
    }

    pub fn residue_key(&self) -> ResidueKey {
        ResidueKey {
            seq_id: self.seq_id,
            chain_id: self.chain_id.clone(),
            entity_id: self.entity_id.clone(),
            alt_id: self.alt_id.clone(),
        }
    }

    /// Spawns a pseudo-atom copy of this atom at a new position, carrying
    /// the same identity fields.
    pub fn to_pseudo(&self, id: AtomId, position: Point3<f64>) -> Self {
        let mut pseudo = self.clone();
        pseudo.id = id;
        pseudo.position = position;
        pseudo.is_pseudo = true;
        pseudo.connections = Vec::new();
        pseudo.rotamer_energy = None;
        pseudo.rotamer_rank = None;
        pseudo.dihedral_angles = BTreeMap::new();
        pseudo
    }
}
