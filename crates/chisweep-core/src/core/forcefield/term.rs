use std::ops::{Add, AddAssign};

/// Per-term energy breakdown of one scored conformation.
///
/// Under a simple pair selector everything lands in `pair`; the
/// composite potential splits its blended sum across `pair`
/// (Lennard-Jones), `coulomb`, and `hbond`, each already tapered.
/// Infinity from a hard-sphere clash propagates through every sum and
/// dominates the total, so a clashing rotamer always ranks last.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    pub pair: f64,
    pub coulomb: f64,
    pub hbond: f64,
    pub torsion: f64,
}

impl EnergyTerm {
    pub fn new(pair: f64, coulomb: f64, hbond: f64, torsion: f64) -> Self {
        Self {
            pair,
            coulomb,
            hbond,
            torsion,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.pair + self.coulomb + self.hbond + self.torsion
    }

    #[inline]
    pub fn is_clash(&self) -> bool {
        self.total() == f64::INFINITY
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            pair: self.pair + rhs.pair,
            coulomb: self.coulomb + rhs.coulomb,
            hbond: self.hbond + rhs.hbond,
            torsion: self.torsion + rhs.torsion,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.pair += rhs.pair;
        self.coulomb += rhs.coulomb;
        self.hbond += rhs.hbond;
        self.torsion += rhs.torsion;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_all_terms() {
        let term = EnergyTerm::new(1.5, -2.0, 0.5, 0.25);
        assert_eq!(term.total(), 0.25);
    }

    #[test]
    fn add_and_add_assign_accumulate_fields() {
        let a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        let b = EnergyTerm::new(-0.5, 0.5, 1.0, -4.0);
        assert_eq!(a + b, EnergyTerm::new(0.5, 2.5, 4.0, 0.0));

        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn infinity_dominates_the_total() {
        let mut term = EnergyTerm::new(f64::INFINITY, -10.0, 0.0, 0.0);
        assert!(term.is_clash());
        term += EnergyTerm::new(-1e9, 0.0, 0.0, 0.0);
        assert_eq!(term.total(), f64::INFINITY);
    }

    #[test]
    fn default_is_all_zero() {
        let term = EnergyTerm::default();
        assert_eq!(term.total(), 0.0);
        assert!(!term.is_clash());
    }
}
