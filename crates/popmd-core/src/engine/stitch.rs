use super::context::InsertionState;
use crate::comm::Communicator;
use crate::core::models::atom::TemplateSlot;
use crate::core::models::store::{ParticleStore, TopologyStyle};
use crate::core::models::template::MoleculeTemplate;
use crate::core::models::topology::Rebase;
use tracing::debug;

/// What stitching did on this rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchSummary {
    /// Molecules created on this rank.
    pub molecules_local: usize,
    /// Molecules created across all ranks.
    pub molecules_global: i64,
    /// Special neighbor lists must be rebuilt from the bonds by the caller.
    pub special_rebuild: bool,
}

/// Turns template-local molecule IDs and bonded references of freshly stamped molecules
/// into global ones.
///
/// Must run after tags were assigned and before any atom migrates, while every new molecule
/// still sits contiguously at the end of its creating rank's store. `template_index` is the
/// slot template-style atoms are linked to. This is a collective call.
pub fn run(
    comm: &dyn Communicator,
    store: &mut ParticleStore,
    template: &MoleculeTemplate,
    template_index: usize,
    state: &InsertionState,
) -> StitchSummary {
    let n = template.atom_count();
    let molecules_local = if n == 0 {
        0
    } else {
        state.created_local(store) / n
    };
    let molecules_global = comm.sum_i64(molecules_local as i64);

    let style = store.style();
    store.global_mut().topology += template.counts() * molecules_global;

    if style.molecule_ids {
        let max_existing = comm.max_i64(store.max_molecule_id(state.nlocal_previous));
        let per_copy = template.molecule_count();
        let mut offset =
            comm.exclusive_scan_i64(molecules_local as i64 * per_copy) + max_existing;
        for molecule in 0..molecules_local {
            let first = state.nlocal_previous + molecule * n;
            for atom in &mut store.atoms_mut()[first..first + n] {
                atom.molecule += offset;
            }
            offset += per_copy;
        }
    }

    match style.topology {
        TopologyStyle::Atomic => {}
        TopologyStyle::Template => {
            for molecule in 0..molecules_local {
                let first = state.nlocal_previous + molecule * n;
                for (member, atom) in store.atoms_mut()[first..first + n].iter_mut().enumerate() {
                    atom.template_slot = Some(TemplateSlot {
                        template: template_index,
                        member,
                    });
                }
            }
        }
        TopologyStyle::Molecular => {
            let flags = template.flags();
            for molecule in 0..molecules_local {
                let first = state.nlocal_previous + molecule * n;
                let atoms = &mut store.atoms_mut()[first..first + n];
                let offset = atoms[0].tag - 1;
                for atom in atoms.iter_mut() {
                    atom.bonds.iter_mut().for_each(|b| b.rebase(offset));
                    atom.angles.iter_mut().for_each(|a| a.rebase(offset));
                    atom.dihedrals.iter_mut().for_each(|d| d.rebase(offset));
                    atom.impropers.iter_mut().for_each(|i| i.rebase(offset));
                    if flags.special {
                        atom.special.rebase(offset);
                    }
                }
            }
        }
    }

    let special_rebuild = style.topology == TopologyStyle::Molecular
        && template.flags().bonds
        && !template.flags().special;

    debug!(
        rank = comm.rank(),
        molecules_local, molecules_global, special_rebuild, "Stitched molecules."
    );

    StitchSummary {
        molecules_local,
        molecules_global,
        special_rebuild,
    }
}
