use crate::core::forcefield::energy::{PotentialKind, TorsionMode};
use crate::core::forcefield::params::{Coefficients, DEFAULT_LENGTH_ERROR};
use crate::core::models::atom::ResidueKey;
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Cutoffs must satisfy start < end, got start = {start}, end = {end}")]
    NonMonotoneCutoffs { start: f64, end: f64 },

    #[error("Cutoff '{name}' must be positive, got {value}")]
    NonPositiveCutoff { name: &'static str, value: f64 },

    #[error("Angle step must be positive and below a full turn, got {0} rad")]
    InvalidAngleStep(f64),

    #[error("Angle list for '{0}' is empty")]
    EmptyAngleList(String),
}

/// How the per-χ angle values are generated.
#[derive(Debug, Clone, PartialEq)]
pub enum AngleSpec {
    /// The same explicit value list (radians) for every χ.
    Explicit(Vec<f64>),
    /// A uniform grid `0, step, 2·step, …` below a full turn.
    Step(f64),
    /// Per-χ value lists keyed by name; a χ absent from the map keeps
    /// its current value.
    PerChi(BTreeMap<String, Vec<f64>>),
}

impl Default for AngleSpec {
    fn default() -> Self {
        // A 90° grid per χ.
        AngleSpec::Step(TAU / 4.0)
    }
}

impl AngleSpec {
    /// Values to sweep for the χ with the given name, in radians. The
    /// fallback is the current value alone, which pins the angle.
    pub fn values_for(&self, chi_name: &str, current: f64) -> Vec<f64> {
        match self {
            AngleSpec::Explicit(values) => values.clone(),
            AngleSpec::Step(step) => {
                let mut values = Vec::new();
                let mut angle = 0.0;
                while angle < TAU - 1e-12 {
                    values.push(angle);
                    angle += step;
                }
                values
            }
            AngleSpec::PerChi(map) => map
                .get(chi_name)
                .cloned()
                .unwrap_or_else(|| vec![current]),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            AngleSpec::Explicit(values) => {
                if values.is_empty() {
                    return Err(ConfigError::EmptyAngleList("*".to_string()));
                }
            }
            AngleSpec::Step(step) => {
                if !(*step > 0.0 && *step <= TAU) {
                    return Err(ConfigError::InvalidAngleStep(*step));
                }
            }
            AngleSpec::PerChi(map) => {
                for (name, values) in map {
                    if values.is_empty() {
                        return Err(ConfigError::EmptyAngleList(name.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Which residues a sweep targets.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResidueSelection {
    /// Every residue with a rotatable-bond entry.
    #[default]
    All,
    /// An explicit list of residue keys.
    Keys(Vec<ResidueKey>),
}

/// Validated sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub potential: PotentialKind,
    pub torsion_mode: TorsionMode,
    pub angles: AngleSpec,
    /// Keep only the first K ranked rotamers; `None` keeps all.
    pub top_rank: Option<usize>,
    pub use_hydrogens: bool,
    /// Bond-builder matching tolerance, Å.
    pub length_error: f64,
    /// Wall-clock budget enforced at residue-sweep boundaries.
    pub timeout: Option<Duration>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            potential: PotentialKind::default(),
            torsion_mode: TorsionMode::default(),
            angles: AngleSpec::default(),
            top_rank: None,
            use_hydrogens: false,
            length_error: DEFAULT_LENGTH_ERROR,
            timeout: None,
        }
    }
}

impl SweepConfig {
    /// Checks the configuration against the loaded coefficients. Runs
    /// before any sampling; a failure here never produces partial
    /// output.
    pub fn validate(&self, coefficients: &Coefficients) -> Result<(), ConfigError> {
        self.angles.validate()?;

        for (name, value) in [
            ("cutoff_atom", coefficients.cutoff_atom),
            ("cutoff_residue", coefficients.cutoff_residue),
            ("cutoff_start", coefficients.cutoff_start),
            ("cutoff_end", coefficients.cutoff_end),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveCutoff { name, value });
            }
        }

        if coefficients.cutoff_start >= coefficients.cutoff_end {
            return Err(ConfigError::NonMonotoneCutoffs {
                start: coefficients.cutoff_start,
                end: coefficients.cutoff_end,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn default_config_passes_validation() {
        let config = SweepConfig::default();
        assert!(config.validate(&Coefficients::default()).is_ok());
    }

    #[test]
    fn non_monotone_cutoffs_are_rejected() {
        let config = SweepConfig::default();
        let mut coefficients = Coefficients::default();
        coefficients.cutoff_start = 5.0;
        coefficients.cutoff_end = 2.5;
        assert_eq!(
            config.validate(&coefficients),
            Err(ConfigError::NonMonotoneCutoffs {
                start: 5.0,
                end: 2.5
            })
        );
    }

    #[test]
    fn negative_cutoffs_are_rejected() {
        let config = SweepConfig::default();
        let mut coefficients = Coefficients::default();
        coefficients.cutoff_atom = -1.0;
        assert!(matches!(
            config.validate(&coefficients),
            Err(ConfigError::NonPositiveCutoff {
                name: "cutoff_atom",
                ..
            })
        ));
    }

    #[test]
    fn step_spec_generates_a_uniform_grid_below_a_full_turn() {
        let spec = AngleSpec::Step(PI / 2.0);
        let values = spec.values_for("chi0", 0.3);
        assert_eq!(values.len(), 4);
        assert!((values[0] - 0.0).abs() < 1e-12);
        assert!((values[3] - 3.0 * PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn per_chi_spec_pins_missing_names_to_their_current_value() {
        let mut map = BTreeMap::new();
        map.insert("chi0".to_string(), vec![0.0, PI]);
        let spec = AngleSpec::PerChi(map);

        assert_eq!(spec.values_for("chi0", 1.0), vec![0.0, PI]);
        assert_eq!(spec.values_for("chi1", 1.0), vec![1.0]);
    }

    #[test]
    fn empty_angle_lists_fail_validation() {
        let config = SweepConfig {
            angles: AngleSpec::Explicit(vec![]),
            ..SweepConfig::default()
        };
        assert!(matches!(
            config.validate(&Coefficients::default()),
            Err(ConfigError::EmptyAngleList(_))
        ));

        let mut map = BTreeMap::new();
        map.insert("chi1".to_string(), vec![]);
        let config = SweepConfig {
            angles: AngleSpec::PerChi(map),
            ..SweepConfig::default()
        };
        assert!(matches!(
            config.validate(&Coefficients::default()),
            Err(ConfigError::EmptyAngleList(name)) if name == "chi1"
        ));
    }

    #[test]
    fn zero_or_negative_steps_fail_validation() {
        for step in [0.0, -1.0] {
            let config = SweepConfig {
                angles: AngleSpec::Step(step),
                ..SweepConfig::default()
            };
            assert!(matches!(
                config.validate(&Coefficients::default()),
                Err(ConfigError::InvalidAngleStep(_))
            ));
        }
    }
}
