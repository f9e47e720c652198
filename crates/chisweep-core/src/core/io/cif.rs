use crate::core::models::atom::{Atom, AtomId, RecordGroup};
use crate::core::models::element::Element;
use crate::core::models::store::AtomStore;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: CifParseErrorKind,
    },
    #[error("Missing required atom_site column: {0}")]
    MissingColumn(&'static str),
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
}

#[derive(Debug, Error)]
pub enum CifParseErrorKind {
    #[error("Invalid integer in column '{column}': {source}")]
    InvalidInt {
        column: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Invalid float in column '{column}': {source}")]
    InvalidFloat {
        column: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("Invalid element symbol '{symbol}'")]
    InvalidElement { symbol: String },
    #[error("Row has {found} values but the loop declares {expected} columns")]
    RowLength { expected: usize, found: usize },
}

/// Everything from the input file that is not an atom record, preserved
/// for re-emission: lines outside the `atom_site` loop and the values of
/// unrecognized `_atom_site.*` columns keyed by atom id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CifMetadata {
    pub leading_lines: Vec<String>,
    pub trailing_lines: Vec<String>,
    pub extra_tags: Vec<String>,
    pub extra_values: HashMap<AtomId, Vec<String>>,
}

/// Zero-based column positions of the recognized `_atom_site` tags.
#[derive(Debug, Default)]
struct AtomSiteIndices {
    group_pdb: Option<usize>,
    id: Option<usize>,
    type_symbol: Option<usize>,
    label_atom_id: Option<usize>,
    label_alt_id: Option<usize>,
    label_comp_id: Option<usize>,
    label_asym_id: Option<usize>,
    label_entity_id: Option<usize>,
    label_seq_id: Option<usize>,
    cartn_x: Option<usize>,
    cartn_y: Option<usize>,
    cartn_z: Option<usize>,
    model_num: Option<usize>,
    extras: Vec<(String, usize)>,
}

impl AtomSiteIndices {
    fn map(tags: &[String]) -> Self {
        let mut indices = Self::default();
        for (position, tag) in tags.iter().enumerate() {
            match tag.as_str() {
                "_atom_site.group_PDB" => indices.group_pdb = Some(position),
                "_atom_site.id" => indices.id = Some(position),
                "_atom_site.type_symbol" => indices.type_symbol = Some(position),
                "_atom_site.label_atom_id" => indices.label_atom_id = Some(position),
                "_atom_site.label_alt_id" => indices.label_alt_id = Some(position),
                "_atom_site.label_comp_id" => indices.label_comp_id = Some(position),
                "_atom_site.label_asym_id" => indices.label_asym_id = Some(position),
                "_atom_site.label_entity_id" => indices.label_entity_id = Some(position),
                "_atom_site.label_seq_id" => indices.label_seq_id = Some(position),
                "_atom_site.Cartn_x" => indices.cartn_x = Some(position),
                "_atom_site.Cartn_y" => indices.cartn_y = Some(position),
                "_atom_site.Cartn_z" => indices.cartn_z = Some(position),
                "_atom_site.pdbx_PDB_model_num" => indices.model_num = Some(position),
                other => indices.extras.push((other.to_string(), position)),
            }
        }
        indices
    }

    fn require(&self) -> Result<(), CifError> {
        for (name, present) in [
            ("id", self.id.is_some()),
            ("type_symbol", self.type_symbol.is_some()),
            ("label_atom_id", self.label_atom_id.is_some()),
            ("label_comp_id", self.label_comp_id.is_some()),
            ("label_asym_id", self.label_asym_id.is_some()),
            ("label_seq_id", self.label_seq_id.is_some()),
            ("Cartn_x", self.cartn_x.is_some()),
            ("Cartn_y", self.cartn_y.is_some()),
            ("Cartn_z", self.cartn_z.is_some()),
        ] {
            if !present {
                return Err(CifError::MissingColumn(match name {
                    "id" => "_atom_site.id",
                    "type_symbol" => "_atom_site.type_symbol",
                    "label_atom_id" => "_atom_site.label_atom_id",
                    "label_comp_id" => "_atom_site.label_comp_id",
                    "label_asym_id" => "_atom_site.label_asym_id",
                    "label_seq_id" => "_atom_site.label_seq_id",
                    "Cartn_x" => "_atom_site.Cartn_x",
                    "Cartn_y" => "_atom_site.Cartn_y",
                    _ => "_atom_site.Cartn_z",
                }));
            }
        }
        Ok(())
    }
}

enum ParserState {
    Base,
    InLoopHeader(Vec<String>),
    InAtomSiteLoop,
    InOtherLoop,
}

/// Reader and writer for the PDBx/mmCIF `atom_site` loop.
pub struct CifFile;

impl CifFile {
    /// Parses the first `_atom_site` loop of the stream into an atom
    /// store. Lines outside the loop and unrecognized columns are kept
    /// in the metadata for faithful re-emission.
    pub fn read_from(reader: &mut impl BufRead) -> Result<(AtomStore, CifMetadata), CifError> {
        let mut store = AtomStore::new();
        let mut metadata = CifMetadata::default();
        let mut indices = AtomSiteIndices::default();
        let mut state = ParserState::Base;
        let mut seen_atom_loop = false;

        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = line_index + 1;
            let trimmed = line.trim();

            let tokens = tokenize(trimmed);
            if tokens.is_empty() {
                keep_line(&mut metadata, seen_atom_loop, &line);
                continue;
            }

            match state {
                ParserState::Base => {
                    if tokens[0] == "loop_" {
                        state = ParserState::InLoopHeader(Vec::new());
                    } else {
                        keep_line(&mut metadata, seen_atom_loop, &line);
                    }
                }
                ParserState::InLoopHeader(ref mut tags) => {
                    if tokens[0].starts_with('_') {
                        tags.push(tokens[0].clone());
                    } else if tags.iter().any(|t| t.starts_with("_atom_site."))
                        && !seen_atom_loop
                    {
                        indices = AtomSiteIndices::map(tags);
                        indices.require()?;
                        metadata.extra_tags =
                            indices.extras.iter().map(|(tag, _)| tag.clone()).collect();
                        seen_atom_loop = true;
                        parse_atom_row(&tokens, &indices, line_num, &mut store, &mut metadata)?;
                        state = ParserState::InAtomSiteLoop;
                    } else {
                        // Replay the unrelated loop verbatim.
                        keep_line(&mut metadata, seen_atom_loop, "loop_");
                        for tag in tags.iter() {
                            keep_line(&mut metadata, seen_atom_loop, tag);
                        }
                        keep_line(&mut metadata, seen_atom_loop, &line);
                        state = ParserState::InOtherLoop;
                    }
                }
                ParserState::InAtomSiteLoop => {
                    if tokens[0].starts_with('_') || tokens[0] == "loop_" {
                        state = if tokens[0] == "loop_" {
                            ParserState::InLoopHeader(Vec::new())
                        } else {
                            keep_line(&mut metadata, seen_atom_loop, &line);
                            ParserState::Base
                        };
                    } else if tokens[0] == "#" {
                        keep_line(&mut metadata, seen_atom_loop, &line);
                        state = ParserState::Base;
                    } else {
                        parse_atom_row(&tokens, &indices, line_num, &mut store, &mut metadata)?;
                    }
                }
                ParserState::InOtherLoop => {
                    if tokens[0] == "loop_" {
                        state = ParserState::InLoopHeader(Vec::new());
                    } else {
                        keep_line(&mut metadata, seen_atom_loop, &line);
                        if tokens[0].starts_with('_') {
                            state = ParserState::Base;
                        }
                    }
                }
            }
        }

        Ok((store, metadata))
    }

    /// Emits every input column plus the augmentation columns:
    /// selection state and group, rotamer energy and rank, the χ tuple,
    /// and the pseudo-atom marker.
    pub fn write_to(
        writer: &mut impl Write,
        store: &AtomStore,
        metadata: &CifMetadata,
    ) -> Result<(), CifError> {
        if metadata.leading_lines.is_empty() {
            writeln!(writer, "data_chisweep")?;
            writeln!(writer, "#")?;
        } else {
            for line in &metadata.leading_lines {
                writeln!(writer, "{line}")?;
            }
        }

        writeln!(writer, "loop_")?;
        for tag in [
            "_atom_site.group_PDB",
            "_atom_site.id",
            "_atom_site.type_symbol",
            "_atom_site.label_atom_id",
            "_atom_site.label_alt_id",
            "_atom_site.label_comp_id",
            "_atom_site.label_asym_id",
            "_atom_site.label_entity_id",
            "_atom_site.label_seq_id",
            "_atom_site.Cartn_x",
            "_atom_site.Cartn_y",
            "_atom_site.Cartn_z",
            "_atom_site.pdbx_PDB_model_num",
        ] {
            writeln!(writer, "{tag}")?;
        }
        for tag in &metadata.extra_tags {
            writeln!(writer, "{tag}")?;
        }
        for tag in [
            "_atom_site_local.selection_state",
            "_atom_site_local.selection_group",
            "_atom_site_local.rotamer_energy",
            "_atom_site_local.rotamer_rank",
            "_atom_site_local.dihedral_angles",
            "_atom_site_local.is_pseudo_atom",
        ] {
            writeln!(writer, "{tag}")?;
        }

        for (id, atom) in store.iter() {
            let extras = metadata.extra_values.get(&id);
            write_atom_row(writer, atom, extras, metadata.extra_tags.len())?;
        }
        writeln!(writer, "#")?;

        for line in &metadata.trailing_lines {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }
}

fn keep_line(metadata: &mut CifMetadata, seen_atom_loop: bool, line: &str) {
    if seen_atom_loop {
        metadata.trailing_lines.push(line.to_string());
    } else {
        metadata.leading_lines.push(line.to_string());
    }
}

fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;

    for c in line.chars() {
        match in_quote {
            Some(q) => {
                if c == q {
                    in_quote = None;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c.is_whitespace() {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                } else if (c == '\'' || c == '"') && current.is_empty() {
                    in_quote = Some(c);
                } else {
                    current.push(c);
                }
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn value<'a>(tokens: &'a [String], index: Option<usize>) -> Option<&'a str> {
    index.and_then(|i| tokens.get(i)).map(String::as_str)
}

fn parse_atom_row(
    tokens: &[String],
    indices: &AtomSiteIndices,
    line_num: usize,
    store: &mut AtomStore,
    metadata: &mut CifMetadata,
) -> Result<(), CifError> {
    let max_index = [
        indices.group_pdb,
        indices.id,
        indices.type_symbol,
        indices.label_atom_id,
        indices.label_alt_id,
        indices.label_comp_id,
        indices.label_asym_id,
        indices.label_entity_id,
        indices.label_seq_id,
        indices.cartn_x,
        indices.cartn_y,
        indices.cartn_z,
        indices.model_num,
    ]
    .into_iter()
    .flatten()
    .chain(indices.extras.iter().map(|&(_, i)| i))
    .max()
    .unwrap_or(0);
    if tokens.len() <= max_index {
        return Err(CifError::Parse {
            line: line_num,
            kind: CifParseErrorKind::RowLength {
                expected: max_index + 1,
                found: tokens.len(),
            },
        });
    }

    let id: u32 = value(tokens, indices.id)
        .expect("checked by require()")
        .parse()
        .map_err(|source| CifError::Parse {
            line: line_num,
            kind: CifParseErrorKind::InvalidInt {
                column: "id",
                source,
            },
        })?;
    let atom_id = AtomId(id);
    if store.contains(atom_id) {
        return Err(CifError::Inconsistency(format!(
            "duplicate atom id {id} on line {line_num}"
        )));
    }

    let symbol = value(tokens, indices.type_symbol).expect("checked by require()");
    let element: Element = symbol.parse().map_err(|_| CifError::Parse {
        line: line_num,
        kind: CifParseErrorKind::InvalidElement {
            symbol: symbol.to_string(),
        },
    })?;

    let parse_float = |index: Option<usize>, column: &'static str| -> Result<f64, CifError> {
        value(tokens, index)
            .expect("checked by require()")
            .parse()
            .map_err(|source| CifError::Parse {
                line: line_num,
                kind: CifParseErrorKind::InvalidFloat { column, source },
            })
    };
    let x = parse_float(indices.cartn_x, "Cartn_x")?;
    let y = parse_float(indices.cartn_y, "Cartn_y")?;
    let z = parse_float(indices.cartn_z, "Cartn_z")?;

    let name = value(tokens, indices.label_atom_id).expect("checked by require()");
    let mut atom = Atom::new(atom_id, element, name, Point3::new(x, y, z));

    atom.group = match value(tokens, indices.group_pdb) {
        Some("HETATM") => RecordGroup::HetAtm,
        _ => RecordGroup::Atom,
    };
    atom.comp_id = value(tokens, indices.label_comp_id)
        .expect("checked by require()")
        .to_string();
    atom.chain_id = value(tokens, indices.label_asym_id)
        .expect("checked by require()")
        .to_string();
    atom.alt_id = match value(tokens, indices.label_alt_id) {
        None | Some(".") | Some("?") => ".".to_string(),
        Some(alt) => alt.to_string(),
    };
    atom.entity_id = match value(tokens, indices.label_entity_id) {
        None | Some("?") => "?".to_string(),
        Some(entity) => entity.to_string(),
    };
    atom.seq_id = value(tokens, indices.label_seq_id)
        .expect("checked by require()")
        .parse()
        .map_err(|source| CifError::Parse {
            line: line_num,
            kind: CifParseErrorKind::InvalidInt {
                column: "label_seq_id",
                source,
            },
        })?;
    atom.model_num = match value(tokens, indices.model_num) {
        None | Some(".") | Some("?") => 1,
        Some(raw) => raw.parse().map_err(|source| CifError::Parse {
            line: line_num,
            kind: CifParseErrorKind::InvalidInt {
                column: "pdbx_PDB_model_num",
                source,
            },
        })?,
    };

    if !indices.extras.is_empty() {
        let extras: Vec<String> = indices
            .extras
            .iter()
            .map(|&(_, i)| tokens[i].clone())
            .collect();
        metadata.extra_values.insert(atom_id, extras);
    }

    store.insert(atom);
    Ok(())
}

fn write_atom_row(
    writer: &mut impl Write,
    atom: &Atom,
    extras: Option<&Vec<String>>,
    extra_count: usize,
) -> Result<(), CifError> {
    let energy = atom
        .rotamer_energy
        .map_or(".".to_string(), |e| format!("{e:.6}"));
    let rank = atom
        .rotamer_rank
        .map_or(".".to_string(), |r| r.to_string());
    let group = atom
        .selection_group
        .map_or(".".to_string(), |g| g.to_string());
    let dihedrals = if atom.dihedral_angles.is_empty() {
        ".".to_string()
    } else {
        atom.dihedral_angles
            .iter()
            .map(|(name, value)| format!("{name}={value:.6}"))
            .join(",")
    };

    write!(
        writer,
        "{} {} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {}",
        atom.group.as_str(),
        atom.id,
        atom.element,
        atom.name,
        atom.alt_id,
        atom.comp_id,
        atom.chain_id,
        atom.entity_id,
        atom.seq_id,
        atom.position.x,
        atom.position.y,
        atom.position.z,
        atom.model_num,
    )?;

    match extras {
        Some(values) => {
            for extra in values {
                write!(writer, " {extra}")?;
            }
        }
        None => {
            for _ in 0..extra_count {
                write!(writer, " .")?;
            }
        }
    }

    writeln!(
        writer,
        " {} {} {} {} {} {}",
        atom.selection_state.as_char(),
        group,
        energy,
        rank,
        dihedrals,
        if atom.is_pseudo { "1" } else { "0" },
    )?;
    Ok(())
}
