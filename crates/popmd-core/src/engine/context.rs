use super::progress::ProgressReporter;
use crate::comm::Communicator;
use crate::core::geometry::domain::{Decomposition, SimulationBox};
use crate::core::geometry::lattice::Lattice;
use crate::core::models::store::ParticleStore;

/// Everything a rank needs to know about the run it takes part in.
#[derive(Clone, Copy)]
pub struct PopulateContext<'a> {
    pub comm: &'a dyn Communicator,
    pub domain: &'a SimulationBox,
    pub decomposition: &'a Decomposition,
    pub lattice: &'a Lattice,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> PopulateContext<'a> {
    pub fn new(
        comm: &'a dyn Communicator,
        domain: &'a SimulationBox,
        decomposition: &'a Decomposition,
        lattice: &'a Lattice,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            comm,
            domain,
            decomposition,
            lattice,
            reporter,
        }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn is_root(&self) -> bool {
        self.comm.is_root()
    }
}

/// Counters captured when a population run starts, used to tell new atoms from old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionState {
    /// Global atom count before the run.
    pub natoms_previous: i64,
    /// Local atom count before the run.
    pub nlocal_previous: usize,
}

impl InsertionState {
    pub fn begin(store: &ParticleStore) -> Self {
        Self {
            natoms_previous: store.global().atoms,
            nlocal_previous: store.len(),
        }
    }

    /// Atoms this rank has appended since the run started.
    pub fn created_local(&self, store: &ParticleStore) -> usize {
        store.len().saturating_sub(self.nlocal_previous)
    }
}
