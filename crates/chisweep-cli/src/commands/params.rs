use crate::error::Result;
use crate::parse::parse_key_value_list;
use chisweep::core::forcefield::params::ParameterSet;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct ParamsArgs {
    /// Parameter-table directory overlaying the built-in defaults.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Force-field coefficient overrides.
    #[arg(long, value_name = "KEY=VAL,...")]
    pub parameters: Option<String>,
}

/// Prints the effective force-field coefficient table after overrides,
/// one `key = value` line per coefficient.
pub fn run(args: &ParamsArgs) -> Result<()> {
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

    let c = &params.coefficients;
    for (key, value) in [
        ("lj_k", c.lj_k),
        ("c_k", c.c_k),
        ("h_k", c.h_k),
        ("t_k", c.t_k),
        ("lj_epsilon", c.lj_epsilon),
        ("h_epsilon", c.h_epsilon),
        ("r_sigma", c.r_sigma),
        ("c_epsilon", c.c_epsilon),
        ("cutoff_atom", c.cutoff_atom),
        ("cutoff_residue", c.cutoff_residue),
        ("cutoff_start", c.cutoff_start),
        ("cutoff_end", c.cutoff_end),
    ] {
        println!("{key} = {value}");
    }
    Ok(())
}
