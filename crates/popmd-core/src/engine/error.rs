use thiserror::Error;

use super::config::ConfigError;
use crate::core::expression::ExpressionError;
use crate::core::geometry::lattice::LatticeStyle;
use crate::core::models::store::StoreError;

#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Lattice style '{style}' is incompatible with a {dimension}d simulation")]
    IncompatibleLattice { style: LatticeStyle, dimension: u8 },

    #[error("Cannot create atoms with an undefined lattice")]
    UndefinedLattice,

    #[error("Invalid atom type {atom_type}; valid types are 1..={atom_types}")]
    InvalidType { atom_type: i64, atom_types: u32 },

    #[error("Invalid basis setting: basis {basis} does not exist (lattice has {basis_count})")]
    InvalidBasis { basis: usize, basis_count: usize },

    #[error("Molecule template '{0}' must have coordinates")]
    TemplateMissingCoords(String),

    #[error("Molecule template '{0}' must have atom types")]
    TemplateMissingTypes(String),

    #[error("Subset size {requested} exceeds the number of lattice sites ({available})")]
    SubsetTooLarge { requested: i64, available: i64 },

    #[error("Too many total atoms ({0})")]
    TooManyAtoms(i64),

    #[error("Lattice site count overflowed on one or more ranks")]
    LatticeOverflow,

    #[error("No overlap of box and region for random placement")]
    NoRegionOverlap,

    #[error("Expression filter needs a variable store, none was given")]
    MissingVariableStore,

    #[error("Expression filter failed: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Particle store error: {0}")]
    Store(#[from] StoreError),

    #[error("Decomposition has {grid} ranks but the communicator has {comm}")]
    RankMismatch { grid: usize, comm: usize },
}
