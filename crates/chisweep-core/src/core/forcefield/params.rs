use crate::core::models::element::Element;
use phf::phf_map;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Van-der-Waals radii in Å, per element symbol (Bondi set).
static VDW_RADII: phf::Map<&'static str, f64> = phf_map! {
    "H" => 1.20,
    "C" => 1.70,
    "N" => 1.55,
    "O" => 1.52,
    "F" => 1.47,
    "P" => 1.80,
    "S" => 1.80,
    "CL" => 1.75,
    "SE" => 1.90,
    "BR" => 1.85,
};

/// Covalent radii in Å indexed by hybridization [sp³, sp², sp].
static COVALENT_RADII: phf::Map<&'static str, [f64; 3]> = phf_map! {
    "H" => [0.31, 0.31, 0.31],
    "C" => [0.76, 0.67, 0.60],
    "N" => [0.71, 0.60, 0.54],
    "O" => [0.66, 0.57, 0.53],
    "F" => [0.57, 0.59, 0.53],
    "P" => [1.07, 1.02, 0.94],
    "S" => [1.05, 0.94, 0.95],
    "CL" => [1.02, 0.99, 0.93],
    "SE" => [1.20, 1.07, 1.07],
    "BR" => [1.20, 1.09, 1.10],
};

/// Element-level partial charges in units of e.
static PARTIAL_CHARGES: phf::Map<&'static str, f64> = phf_map! {
    "H" => 0.31,
    "C" => 0.07,
    "N" => -0.47,
    "O" => -0.51,
    "F" => -0.25,
    "P" => 0.78,
    "S" => -0.23,
    "CL" => -0.18,
    "SE" => -0.16,
    "BR" => -0.14,
};

/// Ordered χ quadruples (a, b, c, d) per residue type. Atoms downstream of
/// the (b, c) bond rotate with the angle.
static CHI_TOPOLOGY: phf::Map<&'static str, &'static [[&'static str; 4]]> = phf_map! {
    "ARG" => &[
        ["N", "CA", "CB", "CG"],
        ["CA", "CB", "CG", "CD"],
        ["CB", "CG", "CD", "NE"],
        ["CG", "CD", "NE", "CZ"],
    ],
    "ASN" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "OD1"]],
    "ASP" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "OD1"]],
    "CYS" => &[["N", "CA", "CB", "SG"]],
    "GLN" => &[
        ["N", "CA", "CB", "CG"],
        ["CA", "CB", "CG", "CD"],
        ["CB", "CG", "CD", "OE1"],
    ],
    "GLU" => &[
        ["N", "CA", "CB", "CG"],
        ["CA", "CB", "CG", "CD"],
        ["CB", "CG", "CD", "OE1"],
    ],
    "HIS" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "ND1"]],
    "ILE" => &[["N", "CA", "CB", "CG1"], ["CA", "CB", "CG1", "CD1"]],
    "LEU" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "CD1"]],
    "LYS" => &[
        ["N", "CA", "CB", "CG"],
        ["CA", "CB", "CG", "CD"],
        ["CB", "CG", "CD", "CE"],
        ["CG", "CD", "CE", "NZ"],
    ],
    "MET" => &[
        ["N", "CA", "CB", "CG"],
        ["CA", "CB", "CG", "SD"],
        ["CB", "CG", "SD", "CE"],
    ],
    "PHE" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "CD1"]],
    "PRO" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "CD"]],
    "SER" => &[["N", "CA", "CB", "OG"]],
    "THR" => &[["N", "CA", "CB", "OG1"]],
    "TRP" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "CD1"]],
    "TYR" => &[["N", "CA", "CB", "CG"], ["CA", "CB", "CG", "CD1"]],
    "VAL" => &[["N", "CA", "CB", "CG1"]],
};

/// Hydrogen names attached to each heavy atom, per residue type. Drives
/// both implicit-hydrogen saturation and hydrogen-bond donor enumeration.
static HYDROGEN_NAMES: phf::Map<
    &'static str,
    &'static [(&'static str, &'static [&'static str])],
> = phf_map! {
    "ALA" => &[("N", &["H"]), ("CA", &["HA"]), ("CB", &["HB1", "HB2", "HB3"])],
    "ARG" => &[
        ("N", &["H"]),
        ("NE", &["HE"]),
        ("NH1", &["HH11", "HH12"]),
        ("NH2", &["HH21", "HH22"]),
    ],
    "ASN" => &[("N", &["H"]), ("ND2", &["HD21", "HD22"])],
    "ASP" => &[("N", &["H"])],
    "CYS" => &[("N", &["H"]), ("SG", &["HG"])],
    "GLN" => &[("N", &["H"]), ("NE2", &["HE21", "HE22"])],
    "GLU" => &[("N", &["H"])],
    "GLY" => &[("N", &["H"]), ("CA", &["HA2", "HA3"])],
    "HIS" => &[("N", &["H"]), ("ND1", &["HD1"]), ("NE2", &["HE2"])],
    "ILE" => &[("N", &["H"])],
    "LEU" => &[("N", &["H"])],
    "LYS" => &[("N", &["H"]), ("NZ", &["HZ1", "HZ2", "HZ3"])],
    "MET" => &[("N", &["H"])],
    "PHE" => &[("N", &["H"])],
    "PRO" => &[],
    "SER" => &[("N", &["H"]), ("OG", &["HG"])],
    "THR" => &[("N", &["H"]), ("OG1", &["HG1"])],
    "TRP" => &[("N", &["H"]), ("NE1", &["HE1"])],
    "TYR" => &[("N", &["H"]), ("OH", &["HH"])],
    "VAL" => &[("N", &["H"])],
};

/// Covalent-radius triple and matching tolerance for one element.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CovalentRadius {
    pub bond_length: [f64; 3],
    pub length_error: f64,
}

/// Force-field coefficients and cutoffs, overridable from tables or
/// `KEY=VAL` pairs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Coefficients {
    /// Per-term weights applied on summation.
    pub lj_k: f64,
    pub c_k: f64,
    pub h_k: f64,
    pub t_k: f64,
    /// Lennard-Jones well depth ε.
    pub lj_epsilon: f64,
    /// Hydrogen-bond well depth ε_H.
    pub h_epsilon: f64,
    /// Soft-sphere repulsion exponent n.
    pub r_sigma: f64,
    /// Coulomb dielectric constant.
    pub c_epsilon: f64,
    /// Hard prefilter on atom-pair distance, Å.
    pub cutoff_atom: f64,
    /// Surrounding-atom selection radius, Å.
    pub cutoff_residue: f64,
    /// Composite taper onset, as a multiple of σ.
    pub cutoff_start: f64,
    /// Composite taper end, as a multiple of σ.
    pub cutoff_end: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            lj_k: 1.0,
            c_k: 1.0,
            h_k: 1.0,
            t_k: 1.0,
            lj_epsilon: 0.2,
            h_epsilon: 1.0,
            r_sigma: 12.0,
            c_epsilon: 1.0,
            cutoff_atom: 10.0,
            cutoff_residue: 12.0,
            cutoff_start: 2.5,
            cutoff_end: 5.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Unknown coefficient key: '{0}'")]
    UnknownCoefficient(String),
    #[error("Invalid value '{value}' for coefficient '{key}'")]
    InvalidCoefficient { key: String, value: String },
}

#[derive(Debug, Deserialize)]
struct ChargeRow {
    element: String,
    charge: f64,
}

/// Process-wide parameter registry, immutable after construction.
///
/// Holds the covalent and van-der-Waals radii, element-level partial
/// charges, the per-residue rotatable-bond topology, the per-residue
/// hydrogen-name map, and the force-field coefficients. Compiled-in
/// defaults cover the biologically common elements and the twenty
/// standard amino acids; tables loaded from disk overlay them.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    covalent: HashMap<Element, CovalentRadius>,
    vdw: HashMap<Element, f64>,
    charges: HashMap<Element, f64>,
    chi_bonds: HashMap<String, Vec<[String; 4]>>,
    hydrogen_names: HashMap<String, HashMap<String, Vec<String>>>,
    torsion_epsilons: HashMap<(String, String), f64>,
    pub coefficients: Coefficients,
}

impl Default for ParameterSet {
    fn default() -> Self {
        let mut covalent = HashMap::new();
        for (symbol, &bond_length) in COVALENT_RADII.entries() {
            if let Ok(element) = symbol.parse::<Element>() {
                covalent.insert(
                    element,
                    CovalentRadius {
                        bond_length,
                        length_error: DEFAULT_LENGTH_ERROR,
                    },
                );
            }
        }

        let vdw = VDW_RADII
            .entries()
            .filter_map(|(s, &r)| s.parse::<Element>().ok().map(|e| (e, r)))
            .collect();
        let charges = PARTIAL_CHARGES
            .entries()
            .filter_map(|(s, &q)| s.parse::<Element>().ok().map(|e| (e, q)))
            .collect();

        let chi_bonds = CHI_TOPOLOGY
            .entries()
            .map(|(&comp, &quads)| {
                let list = quads
                    .iter()
                    .map(|q| {
                        [
                            q[0].to_string(),
                            q[1].to_string(),
                            q[2].to_string(),
                            q[3].to_string(),
                        ]
                    })
                    .collect();
                (comp.to_string(), list)
            })
            .collect();

        let hydrogen_names = HYDROGEN_NAMES
            .entries()
            .map(|(&comp, &pairs)| {
                let per_heavy = pairs
                    .iter()
                    .map(|&(heavy, hs)| {
                        (
                            heavy.to_string(),
                            hs.iter().map(|h| h.to_string()).collect(),
                        )
                    })
                    .collect();
                (comp.to_string(), per_heavy)
            })
            .collect();

        Self {
            covalent,
            vdw,
            charges,
            chi_bonds,
            hydrogen_names,
            torsion_epsilons: HashMap::new(),
            coefficients: Coefficients::default(),
        }
    }
}

/// Matching tolerance ε applied by the bond builder, Å.
pub const DEFAULT_LENGTH_ERROR: f64 = 0.1;

/// Torsion well depth used when a name pair is absent from the table.
pub const DEFAULT_TORSION_EPSILON: f64 = 1.0;

impl ParameterSet {
    /// Loads a table directory over the compiled-in defaults. Recognized
    /// files: `covalent_radii.toml`, `vdw_radii.toml`, `charges.csv`,
    /// `rotatable_bonds.toml`, `hydrogen_names.toml`,
    /// `coefficients.toml`. Absent files keep the defaults.
    pub fn load_dir(base_path: &Path) -> Result<Self, ParamLoadError> {
        let mut params = Self::default();

        let covalent_path = base_path.join("covalent_radii.toml");
        if covalent_path.is_file() {
            let table: HashMap<String, CovalentRadius> = read_toml(&covalent_path)?;
            for (symbol, radius) in table {
                if let Ok(element) = symbol.parse::<Element>() {
                    params.covalent.insert(element, radius);
                }
            }
        }

        let vdw_path = base_path.join("vdw_radii.toml");
        if vdw_path.is_file() {
            let table: HashMap<String, f64> = read_toml(&vdw_path)?;
            for (symbol, radius) in table {
                if let Ok(element) = symbol.parse::<Element>() {
                    params.vdw.insert(element, radius);
                }
            }
        }

        let charges_path = base_path.join("charges.csv");
        if charges_path.is_file() {
            let mut reader =
                csv::Reader::from_path(&charges_path).map_err(|e| ParamLoadError::Csv {
                    path: charges_path.to_string_lossy().to_string(),
                    source: e,
                })?;
            for row in reader.deserialize::<ChargeRow>() {
                let row = row.map_err(|e| ParamLoadError::Csv {
                    path: charges_path.to_string_lossy().to_string(),
                    source: e,
                })?;
                if let Ok(element) = row.element.parse::<Element>() {
                    params.charges.insert(element, row.charge);
                }
            }
        }

        let chi_path = base_path.join("rotatable_bonds.toml");
        if chi_path.is_file() {
            let table: HashMap<String, Vec<[String; 4]>> = read_toml(&chi_path)?;
            params.chi_bonds.extend(table);
        }

        let hydrogen_path = base_path.join("hydrogen_names.toml");
        if hydrogen_path.is_file() {
            let table: HashMap<String, HashMap<String, Vec<String>>> =
                read_toml(&hydrogen_path)?;
            params.hydrogen_names.extend(table);
        }

        let torsion_path = base_path.join("torsion_epsilon.toml");
        if torsion_path.is_file() {
            // Keys are dash-joined atom-name pairs, e.g. "CA-CD1".
            let table: HashMap<String, f64> = read_toml(&torsion_path)?;
            for (pair, epsilon) in table {
                if let Some((first, second)) = pair.split_once('-') {
                    params
                        .torsion_epsilons
                        .insert((first.to_string(), second.to_string()), epsilon);
                }
            }
        }

        let coeff_path = base_path.join("coefficients.toml");
        if coeff_path.is_file() {
            params.coefficients = read_toml(&coeff_path)?;
        }

        Ok(params)
    }

    /// Applies `KEY=VAL` coefficient overrides on top of this set.
    pub fn with_overrides<'a, I>(mut self, pairs: I) -> Result<Self, ParamLoadError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            let parsed: f64 = value
                .trim()
                .parse()
                .map_err(|_| ParamLoadError::InvalidCoefficient {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            let c = &mut self.coefficients;
            match key.trim() {
                "lj_k" => c.lj_k = parsed,
                "c_k" => c.c_k = parsed,
                "h_k" => c.h_k = parsed,
                "t_k" => c.t_k = parsed,
                "lj_epsilon" => c.lj_epsilon = parsed,
                "h_epsilon" => c.h_epsilon = parsed,
                "r_sigma" => c.r_sigma = parsed,
                "c_epsilon" => c.c_epsilon = parsed,
                "cutoff_atom" => c.cutoff_atom = parsed,
                "cutoff_residue" => c.cutoff_residue = parsed,
                "cutoff_start" => c.cutoff_start = parsed,
                "cutoff_end" => c.cutoff_end = parsed,
                unknown => {
                    return Err(ParamLoadError::UnknownCoefficient(unknown.to_string()));
                }
            }
        }
        Ok(self)
    }

    pub fn covalent(&self, element: Element) -> Option<&CovalentRadius> {
        self.covalent.get(&element)
    }

    pub fn vdw_radius(&self, element: Element) -> Option<f64> {
        self.vdw.get(&element).copied()
    }

    pub fn partial_charge(&self, element: Element) -> Option<f64> {
        self.charges.get(&element).copied()
    }

    /// Ordered χ quadruples for a residue type, if it is rotatable.
    pub fn chi_bonds(&self, comp_id: &str) -> Option<&[[String; 4]]> {
        self.chi_bonds.get(comp_id).map(|v| v.as_slice())
    }

    /// Hydrogen names that should exist on one heavy atom of a residue.
    pub fn hydrogen_names(&self, comp_id: &str, heavy_name: &str) -> Option<&[String]> {
        self.hydrogen_names
            .get(comp_id)?
            .get(heavy_name)
            .map(|v| v.as_slice())
    }

    /// Whether the heavy atom appears in the hydrogen-name table at all
    /// (the gate for hydrogen-bond donor/acceptor eligibility).
    pub fn is_protonatable(&self, comp_id: &str, heavy_name: &str) -> bool {
        self.hydrogen_names(comp_id, heavy_name)
            .is_some_and(|names| !names.is_empty())
    }

    /// Torsion well depth for a 1-4 atom-name pair, symmetric in order.
    pub fn torsion_epsilon(&self, name_i: &str, name_j: &str) -> f64 {
        self.torsion_epsilons
            .get(&(name_i.to_string(), name_j.to_string()))
            .or_else(|| {
                self.torsion_epsilons
                    .get(&(name_j.to_string(), name_i.to_string()))
            })
            .copied()
            .unwrap_or(DEFAULT_TORSION_EPSILON)
    }

    /// Largest covalent bond length the tables can produce, used as the
    /// neighbor-grid cell size.
    pub fn max_bond_length(&self) -> f64 {
        let max_radius = |cov: &CovalentRadius| {
            cov.bond_length
                .iter()
                .fold(f64::NEG_INFINITY, |m, &r| m.max(r))
        };
        let mut lengths = self.covalent.values().map(max_radius);
        let first = match lengths.next() {
            Some(r) => r,
            None => return 0.0,
        };
        let largest = lengths.fold(first, f64::max);
        let max_error = self
            .covalent
            .values()
            .fold(0.0_f64, |m, c| m.max(c.length_error));
        2.0 * largest + max_error
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ParamLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_tables_cover_protein_elements() {
        let params = ParameterSet::default();
        for element in [Element::H, Element::C, Element::N, Element::O, Element::S] {
            assert!(params.covalent(element).is_some());
            assert!(params.vdw_radius(element).is_some());
            assert!(params.partial_charge(element).is_some());
        }
        assert!(params.vdw_radius(Element::Fe).is_none());
    }

    #[test]
    fn default_chi_topology_orders_serine_chain() {
        let params = ParameterSet::default();
        let chis = params.chi_bonds("SER").unwrap();
        assert_eq!(chis.len(), 1);
        assert_eq!(chis[0], ["N", "CA", "CB", "OG"].map(String::from));

        assert_eq!(params.chi_bonds("ARG").unwrap().len(), 4);
        assert!(params.chi_bonds("GLY").is_none());
    }

    #[test]
    fn hydrogen_names_expose_donor_hydrogens() {
        let params = ParameterSet::default();
        assert_eq!(params.hydrogen_names("SER", "OG").unwrap(), ["HG"]);
        assert_eq!(
            params.hydrogen_names("LYS", "NZ").unwrap(),
            ["HZ1", "HZ2", "HZ3"]
        );
        assert!(params.hydrogen_names("SER", "CB").is_none());
        assert!(params.is_protonatable("TYR", "OH"));
        assert!(!params.is_protonatable("PHE", "CZ"));
    }

    #[test]
    fn max_bond_length_is_twice_largest_radius_plus_tolerance() {
        let params = ParameterSet::default();
        // Largest default radius is Se/Br at 1.20 Å.
        let expected = 2.0 * 1.20 + DEFAULT_LENGTH_ERROR;
        assert!((params.max_bond_length() - expected).abs() < 1e-12);
    }

    #[test]
    fn overrides_update_known_coefficients() {
        let params = ParameterSet::default()
            .with_overrides([("cutoff_start", "2.0"), ("lj_epsilon", "0.5")])
            .unwrap();
        assert_eq!(params.coefficients.cutoff_start, 2.0);
        assert_eq!(params.coefficients.lj_epsilon, 0.5);
        assert_eq!(params.coefficients.cutoff_end, 5.0);
    }

    #[test]
    fn overrides_reject_unknown_keys_and_bad_values() {
        let result = ParameterSet::default().with_overrides([("bogus", "1.0")]);
        assert!(matches!(
            result,
            Err(ParamLoadError::UnknownCoefficient(k)) if k == "bogus"
        ));

        let result = ParameterSet::default().with_overrides([("lj_k", "abc")]);
        assert!(matches!(
            result,
            Err(ParamLoadError::InvalidCoefficient { .. })
        ));
    }

    #[test]
    fn load_dir_overlays_tables_onto_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let mut vdw = std::fs::File::create(dir.path().join("vdw_radii.toml")).unwrap();
        writeln!(vdw, "C = 9.9").unwrap();

        let mut coeff = std::fs::File::create(dir.path().join("coefficients.toml")).unwrap();
        writeln!(coeff, "cutoff_atom = 6.5").unwrap();

        let mut charges = std::fs::File::create(dir.path().join("charges.csv")).unwrap();
        writeln!(charges, "element,charge").unwrap();
        writeln!(charges, "O,-0.9").unwrap();

        let params = ParameterSet::load_dir(dir.path()).unwrap();
        assert_eq!(params.vdw_radius(Element::C), Some(9.9));
        assert_eq!(params.vdw_radius(Element::N), Some(1.55));
        assert_eq!(params.coefficients.cutoff_atom, 6.5);
        assert_eq!(params.partial_charge(Element::O), Some(-0.9));
    }

    #[test]
    fn load_dir_reports_malformed_tables_with_path_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = std::fs::File::create(dir.path().join("vdw_radii.toml")).unwrap();
        writeln!(bad, "this is not toml").unwrap();

        let result = ParameterSet::load_dir(dir.path());
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }
}
