use super::config::ConfigError;
use crate::core::models::atom::ResidueKey;
use crate::core::rotation::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration rejected: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Rotamer model failed for residue {residue}: {source}")]
    Model {
        residue: ResidueKey,
        source: ModelError,
    },

    #[error("Sweep cancelled")]
    Cancelled,
}
