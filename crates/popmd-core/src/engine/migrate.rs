use crate::comm::Communicator;
use crate::core::geometry::domain::{Decomposition, SimulationBox};
use crate::core::models::atom::Atom;
use crate::core::models::store::ParticleStore;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationSummary {
    pub sent: usize,
    pub received: usize,
}

/// Wraps every atom back into the periodic box and moves it to the rank owning its position.
///
/// Stamped molecules can hang over the edge of the sub-box that created them; after this
/// call each atom sits on the rank of the grid cell containing it. Atoms that stay keep
/// their relative order, received atoms are appended in source-rank order. This is a
/// collective call.
pub fn run(
    comm: &dyn Communicator,
    domain: &SimulationBox,
    decomposition: &Decomposition,
    store: &mut ParticleStore,
) -> MigrationSummary {
    for atom in store.atoms_mut() {
        let Atom {
            position, image, ..
        } = atom;
        domain.remap(position, image);
    }

    let rank = comm.rank();
    let owner = |atom: &Atom| decomposition.owner_of(&domain.to_fractional(&atom.position));

    let leaving = store.take_where(|a| owner(a) != rank);
    let sent = leaving.len();

    let mut outgoing: Vec<Vec<Atom>> = vec![Vec::new(); comm.size()];
    for atom in leaving {
        outgoing[owner(&atom)].push(atom);
    }

    let incoming = comm.exchange(outgoing);
    let received = incoming.len();
    store.reserve(received);
    for atom in incoming {
        store.push(atom);
    }

    debug!(rank, sent, received, "Migrated atoms to their owning ranks.");
    MigrationSummary { sent, received }
}
