use popmd::core::geometry::domain::DomainError;
use popmd::core::geometry::lattice::LatticeError;
use popmd::core::models::template::TemplateError;
use popmd::engine::config::ConfigError;
use popmd::engine::error::PopulateError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Populate(#[from] PopulateError),

    #[error("Invalid populate settings: {0}")]
    PopulateConfig(#[from] ConfigError),

    #[error("Invalid simulation box: {0}")]
    Domain(#[from] DomainError),

    #[error("Invalid lattice: {0}")]
    Lattice(#[from] LatticeError),

    #[error("Invalid molecule template: {0}")]
    Template(#[from] TemplateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
