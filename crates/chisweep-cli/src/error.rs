use chisweep::core::forcefield::params::ParamLoadError;
use chisweep::core::io::cif::CifError;
use chisweep::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Params(#[from] ParamLoadError),

    #[error("Failed to parse '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: CifError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Configuration problems exit with 1, runtime failures with 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => 1,
            CliError::Engine(EngineError::Config { .. }) => 1,
            CliError::Params(
                ParamLoadError::UnknownCoefficient(_)
                | ParamLoadError::InvalidCoefficient { .. },
            ) => 1,
            _ => 2,
        }
    }
}
