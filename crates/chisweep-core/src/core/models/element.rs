use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical elements commonly present in crystallographic structures.
///
/// Parsing accepts the case-insensitive element symbol from the
/// `type_symbol` column. Elements outside this set are a parse error;
/// elements inside it may still lack force-field parameters, in which
/// case the bond builder and potentials skip them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    H,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    P,
    S,
    Cl,
    K,
    Ca,
    Fe,
    Zn,
    Se,
    Br,
    I,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct ParseElementError(pub String);

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "H" | "D" => Ok(Element::H),
            "C" => Ok(Element::C),
            "N" => Ok(Element::N),
            "O" => Ok(Element::O),
            "F" => Ok(Element::F),
            "NA" => Ok(Element::Na),
            "MG" => Ok(Element::Mg),
            "P" => Ok(Element::P),
            "S" => Ok(Element::S),
            "CL" => Ok(Element::Cl),
            "K" => Ok(Element::K),
            "CA" => Ok(Element::Ca),
            "FE" => Ok(Element::Fe),
            "ZN" => Ok(Element::Zn),
            "SE" => Ok(Element::Se),
            "BR" => Ok(Element::Br),
            "I" => Ok(Element::I),
            unknown => Err(ParseElementError(unknown.to_string())),
        }
    }
}

impl Element {
    pub fn symbol(self) -> &'static str {
        match self {
            Element::H => "H",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Na => "NA",
            Element::Mg => "MG",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "CL",
            Element::K => "K",
            Element::Ca => "CA",
            Element::Fe => "FE",
            Element::Zn => "ZN",
            Element::Se => "SE",
            Element::Br => "BR",
            Element::I => "I",
        }
    }

    #[inline]
    pub fn is_hydrogen(self) -> bool {
        self == Element::H
    }

    /// Heavy atoms eligible as hydrogen-bond donors or acceptors.
    #[inline]
    pub fn is_hbond_capable(self) -> bool {
        matches!(self, Element::N | Element::O | Element::F)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
