mod commands;
mod error;
mod logging;
mod parse;
mod progress;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    name = "chisweep",
    author = "Caltech Materials and Process Simulation Center",
    version,
    about = "CHISWEEP - dihedral-sweep rotamer libraries for protein side chains, \
             ranked under a physics-inspired potential.",
    help_template = HELP_TEMPLATE,
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all logging and progress output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Mirror logs into a file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep side-chain dihedrals and emit ranked rotamer pseudo-atoms.
    Sweep(commands::sweep::SweepArgs),
    /// Print the effective force-field coefficients.
    Params(commands::params::ParamsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(2);
    }

    let result = match &cli.command {
        Commands::Sweep(args) => commands::sweep::run(args, cli.quiet),
        Commands::Params(args) => commands::params::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
