use super::atom::{Atom, AtomId, ResidueKey, SelectionState};
use super::element::Element;
use kiddo::{KdTree, SquaredEuclidean};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Central in-memory store for atom records, keyed by their file serial.
///
/// Iteration order is always ascending by id, which makes every derived
/// listing (filters, projections, residue groupings) deterministic. The
/// store is mutated in two places only: the bond builder fills
/// `connections`/`hybridization`, and the sampler appends pseudo-atoms;
/// coordinates of pre-existing atoms are never rewritten.
#[derive(Debug, Clone, Default)]
pub struct AtomStore {
    atoms: BTreeMap<AtomId, Atom>,
}

/// A single attribute constraint: the atom's value must be in the set.
#[derive(Debug, Clone)]
pub enum Criterion {
    Element(HashSet<Element>),
    Name(HashSet<String>),
    CompId(HashSet<String>),
    ChainId(HashSet<String>),
    EntityId(HashSet<String>),
    SeqId(HashSet<isize>),
    AltId(HashSet<String>),
    ModelNum(HashSet<i32>),
    Selection(HashSet<SelectionState>),
}

impl Criterion {
    fn matches(&self, atom: &Atom) -> bool {
        match self {
            Criterion::Element(set) => set.contains(&atom.element),
            Criterion::Name(set) => set.contains(&atom.name),
            Criterion::CompId(set) => set.contains(&atom.comp_id),
            Criterion::ChainId(set) => set.contains(&atom.chain_id),
            Criterion::EntityId(set) => set.contains(&atom.entity_id),
            Criterion::SeqId(set) => set.contains(&atom.seq_id),
            Criterion::AltId(set) => set.contains(&atom.alt_id),
            Criterion::ModelNum(set) => set.contains(&atom.model_num),
            Criterion::Selection(set) => set.contains(&atom.selection_state),
        }
    }
}

/// Include/exclude predicate over atom attributes.
///
/// An atom passes `include` iff every listed criterion matches, and passes
/// `exclude` iff no listed criterion matches.
#[derive(Debug, Clone, Default)]
pub struct AtomFilter {
    pub include: Vec<Criterion>,
    pub exclude: Vec<Criterion>,
}

impl AtomFilter {
    pub fn matches(&self, atom: &Atom) -> bool {
        self.include.iter().all(|c| c.matches(atom))
            && !self.exclude.iter().any(|c| c.matches(atom))
    }
}

/// Identity attribute selectable in a projection or grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKey {
    Id,
    Element,
    Name,
    CompId,
    ChainId,
    EntityId,
    SeqId,
    AltId,
    ModelNum,
    SelectionState,
    SelectionGroup,
    IsPseudo,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrValue {
    Int(i64),
    Text(String),
    Flag(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(v) => v.fmt(f),
            AttrValue::Text(v) => v.fmt(f),
            AttrValue::Flag(v) => v.fmt(f),
        }
    }
}

fn attr_of(atom: &Atom, key: AttrKey) -> AttrValue {
    match key {
        AttrKey::Id => AttrValue::Int(atom.id.0 as i64),
        AttrKey::Element => AttrValue::Text(atom.element.symbol().to_string()),
        AttrKey::Name => AttrValue::Text(atom.name.clone()),
        AttrKey::CompId => AttrValue::Text(atom.comp_id.clone()),
        AttrKey::ChainId => AttrValue::Text(atom.chain_id.clone()),
        AttrKey::EntityId => AttrValue::Text(atom.entity_id.clone()),
        AttrKey::SeqId => AttrValue::Int(atom.seq_id as i64),
        AttrKey::AltId => AttrValue::Text(atom.alt_id.clone()),
        AttrKey::ModelNum => AttrValue::Int(atom.model_num as i64),
        AttrKey::SelectionState => AttrValue::Text(atom.selection_state.as_char().to_string()),
        AttrKey::SelectionGroup => AttrValue::Int(atom.selection_group.map_or(-1, |g| g as i64)),
        AttrKey::IsPseudo => AttrValue::Flag(atom.is_pseudo),
    }
}

impl AtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an atom under its own id, replacing any previous record.
    pub fn insert(&mut self, atom: Atom) -> Option<Atom> {
        self.atoms.insert(atom.id, atom)
    }

    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(&id)
    }

    pub fn get_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(&id)
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.atoms.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Iterates all atoms in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter().map(|(&id, atom)| (id, atom))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AtomId, &mut Atom)> {
        self.atoms.iter_mut().map(|(&id, atom)| (id, atom))
    }

    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms.keys().copied()
    }

    /// Highest id currently present; pseudo-atom allocation starts past it.
    pub fn max_id(&self) -> Option<AtomId> {
        self.atoms.keys().next_back().copied()
    }

    pub fn next_id(&self) -> AtomId {
        AtomId(self.max_id().map_or(1, |id| id.0 + 1))
    }

    /// All distinct residue keys, in ascending key order.
    pub fn residue_keys(&self) -> BTreeSet<ResidueKey> {
        self.atoms.values().map(|a| a.residue_key()).collect()
    }

    /// Ids of the atoms belonging to one residue instance, ascending.
    pub fn atoms_in_residue(&self, key: &ResidueKey) -> Vec<AtomId> {
        self.atoms
            .iter()
            .filter(|(_, a)| &a.residue_key() == key)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Finds an atom of a residue by its `label_atom_id`, lowest id first.
    pub fn find_in_residue(&self, key: &ResidueKey, name: &str) -> Option<AtomId> {
        self.atoms
            .iter()
            .find(|(_, a)| a.name == name && &a.residue_key() == key)
            .map(|(&id, _)| id)
    }

    /// Ids of atoms passing the filter, in ascending id order.
    pub fn filter(&self, filter: &AtomFilter) -> Vec<AtomId> {
        self.atoms
            .iter()
            .filter(|(_, a)| filter.matches(a))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Projects the requested attributes of the given atoms, one row per
    /// atom in ascending id order. Unknown ids are skipped.
    pub fn project(&self, ids: &[AtomId], keys: &[AttrKey]) -> Vec<Vec<AttrValue>> {
        let mut sorted: Vec<AtomId> = ids.to_vec();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .filter_map(|id| self.atoms.get(&id))
            .map(|atom| keys.iter().map(|&k| attr_of(atom, k)).collect())
            .collect()
    }

    /// Groups the given atoms by one attribute, ids ascending per group.
    pub fn group_by(&self, ids: &[AtomId], key: AttrKey) -> BTreeMap<AttrValue, Vec<AtomId>> {
        let mut sorted: Vec<AtomId> = ids.to_vec();
        sorted.sort_unstable();
        let mut groups: BTreeMap<AttrValue, Vec<AtomId>> = BTreeMap::new();
        for id in sorted {
            if let Some(atom) = self.atoms.get(&id) {
                groups.entry(attr_of(atom, key)).or_default().push(id);
            }
        }
        groups
    }

    /// Members of `select_ids` lying within `cutoff` Å of any atom in
    /// `target_ids`, ascending, targets themselves excluded.
    pub fn surrounding_of(
        &self,
        target_ids: &[AtomId],
        select_ids: &[AtomId],
        cutoff: f64,
    ) -> Vec<AtomId> {
        let targets: HashSet<AtomId> = target_ids.iter().copied().collect();

        let mut tree: KdTree<f64, 3> = KdTree::new();
        for &id in target_ids {
            if let Some(atom) = self.atoms.get(&id) {
                let p = atom.position;
                tree.add(&[p.x, p.y, p.z], id.0 as u64);
            }
        }
        if tree.size() == 0 {
            return Vec::new();
        }

        let cutoff_sq = cutoff * cutoff;
        let mut surrounding: Vec<AtomId> = select_ids
            .iter()
            .copied()
            .filter(|id| !targets.contains(id))
            .filter(|id| {
                self.atoms.get(id).is_some_and(|atom| {
                    let p = atom.position;
                    let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
                    nearest.distance <= cutoff_sq
                })
            })
            .collect();
        surrounding.sort_unstable();
        surrounding.dedup();
        surrounding
    }

    /// Tags every atom with a selection state: members of `target_ids`
    /// become `Target`; members of `select_ids` within `cutoff` Å of any
    /// target become `Surrounding`; everything else becomes `Ignored`.
    ///
    /// Tagged atoms also receive `group` as their selection group.
    pub fn mark_selection(
        &mut self,
        target_ids: &[AtomId],
        select_ids: &[AtomId],
        cutoff: f64,
        group: u32,
    ) {
        let targets: HashSet<AtomId> = target_ids.iter().copied().collect();
        let surrounding: HashSet<AtomId> = self
            .surrounding_of(target_ids, select_ids, cutoff)
            .into_iter()
            .collect();

        for (id, atom) in self.atoms.iter_mut() {
            if targets.contains(id) {
                atom.selection_state = SelectionState::Target;
                atom.selection_group = Some(group);
            } else if surrounding.contains(id) {
                atom.selection_state = SelectionState::Surrounding;
                atom.selection_group = Some(group);
            } else {
                atom.selection_state = SelectionState::Ignored;
                atom.selection_group = None;
            }
        }
    }

    /// Ids currently tagged with the given selection state, ascending.
    pub fn ids_in_state(&self, state: SelectionState) -> Vec<AtomId> {
        self.atoms
            .iter()
            .filter(|(_, a)| a.selection_state == state)
            .map(|(&id, _)| id)
            .collect()
    }
}
