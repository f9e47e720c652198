use crate::error::{CliError, Result};
use crate::parse::{parse_angle_list_degrees, parse_key_value_list, parse_residue_list};
use crate::progress::terminal_progress;
use chisweep::core::forcefield::energy::{PotentialKind, TorsionMode};
use chisweep::core::forcefield::params::ParameterSet;
use chisweep::core::io::cif::CifFile;
use chisweep::core::models::atom::ResidueKey;
use chisweep::core::models::store::AtomStore;
use chisweep::engine::cancel::CancelToken;
use chisweep::engine::config::{AngleSpec, ResidueSelection, SweepConfig};
use chisweep::engine::progress::ProgressReporter;
use chisweep::workflows::sweep as sweep_workflow;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    /// Input structure (PDBx/mmCIF atom_site loop).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output structure with appended rotamer pseudo-atoms.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Pair potential: hard_sphere, soft_sphere, lennard_jones,
    /// coulomb, h_bond, or composite.
    #[arg(long, default_value = "composite")]
    pub potential: String,

    /// Explicit angle values in degrees, applied to every χ.
    #[arg(long, value_name = "DEG,...", conflicts_with = "angle_step")]
    pub angles: Option<String>,

    /// Uniform angle step in degrees.
    #[arg(long, value_name = "DEG")]
    pub angle_step: Option<f64>,

    /// Keep only the K best-ranked rotamers per residue.
    #[arg(long, value_name = "K")]
    pub top_rank: Option<usize>,

    /// Atom-atom distance cutoff in Å (overrides `cutoff_atom`).
    #[arg(short = 'c', long = "cutoff", value_name = "ANGSTROM")]
    pub cutoff: Option<f64>,

    /// Use explicit hydrogens from the input for hydrogen-bond scoring.
    #[arg(short = 'H', long = "use-hydrogens")]
    pub use_hydrogens: bool,

    /// Tabulated, windowed torsion well depths instead of the classical
    /// threefold form.
    #[arg(long)]
    pub tabulated_torsions: bool,

    /// Force-field coefficient overrides.
    #[arg(long, value_name = "KEY=VAL,...")]
    pub parameters: Option<String>,

    /// Parameter-table directory overlaying the built-in defaults.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Residues to sweep; default is every rotatable residue.
    #[arg(long, value_name = "CHAIN/SEQ,...")]
    pub residues: Option<String>,

    /// Wall-clock budget in seconds, enforced between residues.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

pub fn run(args: &SweepArgs, quiet: bool) -> Result<()> {
    let params = load_parameters(args)?;
    let config = build_config(args)?;

    let file = File::open(&args.input)?;
    let (mut store, metadata) = CifFile::read_from(&mut BufReader::new(file)).map_err(
        |source| CliError::FileParsing {
            path: args.input.clone(),
            source,
        },
    )?;
    info!(atoms = store.len(), "structure loaded");

    let selection = resolve_selection(args, &store)?;

    let (bar, callback) = terminal_progress(quiet);
    let reporter = ProgressReporter::with_callback(callback);
    let report = sweep_workflow::run(
        &mut store,
        &params,
        &config,
        &selection,
        &reporter,
        &CancelToken::new(),
    )?;
    bar.finish_and_clear();

    for warning in &report.warnings {
        warn!("{warning}");
    }
    for summary in &report.residues {
        info!(
            residue = %summary.residue,
            comp = %summary.comp_id,
            evaluated = summary.evaluated,
            emitted = summary.emitted,
            best = summary.best_energy.unwrap_or(f64::NAN),
            "residue swept"
        );
    }

    let out = File::create(&args.output)?;
    let mut writer = BufWriter::new(out);
    CifFile::write_to(&mut writer, &store, &metadata).map_err(|source| match source {
        chisweep::core::io::cif::CifError::Io(e) => CliError::Io(e),
        other => CliError::FileParsing {
            path: args.output.clone(),
            source: other,
        },
    })?;

    info!(
        residues = report.residues.len(),
        output = %args.output.display(),
        "rotamer library written"
    );
    Ok(())
}

fn load_parameters(args: &SweepArgs) -> Result<ParameterSet> {
    let mut params = match &args.data_dir {
        Some(dir) => ParameterSet::load_dir(dir)?,
        None => ParameterSet::default(),
    };

    if let Some(raw) = &args.parameters {
        let pairs = parse_key_value_list(raw)?;
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params = params.with_overrides(borrowed)?;
    }
    if let Some(cutoff) = args.cutoff {
        params.coefficients.cutoff_atom = cutoff;
    }
    Ok(params)
}

fn build_config(args: &SweepArgs) -> Result<SweepConfig> {
    let potential: PotentialKind = args
        .potential
        .parse()
        .map_err(|e| CliError::Config(format!("{e}")))?;

    let angles = if let Some(raw) = &args.angles {
        AngleSpec::Explicit(parse_angle_list_degrees(raw)?)
    } else if let Some(step) = args.angle_step {
        AngleSpec::Step(step.to_radians())
    } else {
        AngleSpec::default()
    };

    Ok(SweepConfig {
        potential,
        torsion_mode: if args.tabulated_torsions {
            TorsionMode::Tabulated
        } else {
            TorsionMode::Classical
        },
        angles,
        top_rank: args.top_rank,
        use_hydrogens: args.use_hydrogens,
        timeout: args.timeout.map(Duration::from_secs),
        ..SweepConfig::default()
    })
}

fn resolve_selection(args: &SweepArgs, store: &AtomStore) -> Result<ResidueSelection> {
    let Some(raw) = &args.residues else {
        return Ok(ResidueSelection::All);
    };

    let selectors = parse_residue_list(raw)?;
    let mut keys: Vec<ResidueKey> = Vec::new();
    for (chain, seq) in &selectors {
        let mut matched: Vec<ResidueKey> = store
            .residue_keys()
            .into_iter()
            .filter(|key| &key.chain_id == chain && key.seq_id == *seq)
            .collect();
        if matched.is_empty() {
            return Err(CliError::Config(format!(
                "residue {chain}/{seq} not found in the input structure"
            )));
        }
        keys.append(&mut matched);
    }
    Ok(ResidueSelection::Keys(keys))
}
