use popmd::core::geometry::domain::{Decomposition, SimulationBox};
use popmd::core::geometry::lattice::Lattice;
use popmd::core::models::store::AtomStyle;
use popmd::engine::config::PopulateConfig;
use std::path::PathBuf;

/// A fully resolved run: everything each rank needs, shared read-only between ranks.
pub struct AppConfig {
    pub ranks: usize,
    pub domain: SimulationBox,
    pub decomposition: Decomposition,
    pub lattice: Lattice,
    pub atom_types: u32,
    pub style: AtomStyle,
    pub populate: PopulateConfig,
    pub output: Option<PathBuf>,
}
