use super::atom::Atom;
use super::ids::{MAX_TAG, MoleculeId, Tag};
use super::template::MoleculeTemplate;
use super::topology::TopologyCounts;
use crate::comm::Communicator;
use nalgebra::Point3;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("New atom IDs exceed the largest allowed ID ({max_tag} + {new_atoms} > {limit})")]
    TagOverflow {
        max_tag: Tag,
        new_atoms: i64,
        limit: Tag,
    },
}

/// How bonded topology of molecules is kept on the atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyStyle {
    /// Point particles with no bonded data.
    #[default]
    Atomic,
    /// Every atom carries its own bonds, angles, dihedrals, impropers and special list.
    Molecular,
    /// Atoms only point into a molecule template that holds the topology.
    Template,
}

/// Per-atom fields the store maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtomStyle {
    /// Whether atoms carry a molecule ID.
    pub molecule_ids: bool,
    pub topology: TopologyStyle,
}

/// Totals across all ranks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalCounts {
    pub atoms: i64,
    pub topology: TopologyCounts,
}

/// The per-rank particle container.
///
/// Atoms are kept in creation order. The engine relies on this: the atoms of one stamped
/// molecule occupy consecutive slots, in template order.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    atoms: Vec<Atom>,
    atom_types: u32,
    style: AtomStyle,
    global: GlobalCounts,
}

impl ParticleStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `atom_types` - Number of atom types defined; valid types are `1..=atom_types`.
    /// * `style` - Which per-atom fields are maintained.
    pub fn new(atom_types: u32, style: AtomStyle) -> Self {
        Self {
            atoms: Vec::new(),
            atom_types,
            style,
            global: GlobalCounts::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn atom_types(&self) -> u32 {
        self.atom_types
    }

    pub fn style(&self) -> AtomStyle {
        self.style
    }

    pub fn global(&self) -> &GlobalCounts {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalCounts {
        &mut self.global
    }

    pub fn is_valid_type(&self, atom_type: u32) -> bool {
        atom_type >= 1 && atom_type <= self.atom_types
    }

    /// Grows capacity so that `additional` atoms can be appended without reallocating.
    pub fn reserve(&mut self, additional: usize) {
        self.atoms.reserve(additional);
    }

    /// Appends one untagged atom and returns its local index.
    pub fn create_atom(&mut self, atom_type: u32, position: Point3<f64>) -> usize {
        self.atoms.push(Atom::new(atom_type, position));
        self.atoms.len() - 1
    }

    /// Appends an atom that already exists elsewhere, e.g. one received from another rank.
    pub fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Copies the template data of `member` onto the atom at `index`.
    ///
    /// Molecule IDs and bonded references are copied with template-local values; they are
    /// made global once every rank has created its atoms. Template-style stores copy no
    /// topology, the atom is linked to its template slot when stitched.
    pub fn add_molecule_atom(&mut self, template: &MoleculeTemplate, member: usize, index: usize) {
        let style = self.style;
        let atom = &mut self.atoms[index];
        if style.molecule_ids {
            atom.molecule = template.sub_molecule(member);
        }
        match style.topology {
            TopologyStyle::Atomic | TopologyStyle::Template => {}
            TopologyStyle::Molecular => {
                let topology = template.topology(member);
                atom.bonds = topology.bonds.clone();
                atom.angles = topology.angles.clone();
                atom.dihedrals = topology.dihedrals.clone();
                atom.impropers = topology.impropers.clone();
                if template.flags().special {
                    atom.special = topology.special.clone();
                }
            }
        }
    }

    /// Removes and returns every atom matching `predicate`, keeping the others in order.
    pub fn take_where<F>(&mut self, mut predicate: F) -> Vec<Atom>
    where
        F: FnMut(&Atom) -> bool,
    {
        let (taken, kept): (Vec<Atom>, Vec<Atom>) = std::mem::take(&mut self.atoms)
            .into_iter()
            .partition(|a| predicate(a));
        self.atoms = kept;
        taken
    }

    /// Largest molecule ID among the first `count` atoms.
    pub fn max_molecule_id(&self, count: usize) -> MoleculeId {
        self.atoms[..count.min(self.atoms.len())]
            .iter()
            .map(|a| a.molecule)
            .max()
            .unwrap_or(0)
    }

    /// Assigns IDs to every untagged atom on every rank.
    ///
    /// New IDs start above the largest existing ID on any rank and are handed out in rank
    /// order, so the IDs of one rank form a contiguous block. This is a collective call.
    pub fn extend_tags(&mut self, comm: &dyn Communicator) -> Result<(), StoreError> {
        let local_max = self.atoms.iter().map(|a| a.tag).max().unwrap_or(0);
        let untagged = self.atoms.iter().filter(|a| a.tag == 0).count() as i64;

        let max_tag = comm.max_i64(local_max);
        let total_untagged = comm.sum_i64(untagged);
        if max_tag.saturating_add(total_untagged) > MAX_TAG {
            return Err(StoreError::TagOverflow {
                max_tag,
                new_atoms: total_untagged,
                limit: MAX_TAG,
            });
        }

        let mut next = max_tag + comm.exclusive_scan_i64(untagged) + 1;
        for atom in self.atoms.iter_mut().filter(|a| a.tag == 0) {
            atom.tag = next;
            next += 1;
        }
        debug!(
            rank = comm.rank(),
            first = next - untagged,
            count = untagged,
            "Assigned atom IDs."
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::serial::SerialComm;
    use crate::comm::threaded::ThreadComm;
    use crate::core::models::topology::{BondRef, SpecialList};

    fn dimer() -> MoleculeTemplate {
        MoleculeTemplate::builder("dimer")
            .coords(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)])
            .types(vec![1, 2])
            .bond(3, [1, 2])
            .special(1, SpecialList::new(&[2], &[], &[]))
            .special(2, SpecialList::new(&[1], &[], &[]))
            .build()
            .unwrap()
    }

    #[test]
    fn create_atom_appends_in_order() {
        let mut store = ParticleStore::new(2, AtomStyle::default());
        assert!(store.is_empty());
        assert_eq!(store.create_atom(1, Point3::new(1.0, 0.0, 0.0)), 0);
        assert_eq!(store.create_atom(2, Point3::new(2.0, 0.0, 0.0)), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.atoms()[1].atom_type, 2);
        assert!(store.is_valid_type(2));
        assert!(!store.is_valid_type(0));
        assert!(!store.is_valid_type(3));
    }

    #[test]
    fn molecular_style_copies_template_local_topology() {
        let style = AtomStyle {
            molecule_ids: true,
            topology: TopologyStyle::Molecular,
        };
        let mut store = ParticleStore::new(2, style);
        let t = dimer();
        let i = store.create_atom(1, Point3::origin());
        store.add_molecule_atom(&t, 0, i);

        let atom = &store.atoms()[0];
        assert_eq!(atom.bonds, vec![BondRef::new(3, 2)]);
        assert_eq!(atom.special.partners, vec![2]);
        assert_eq!(atom.molecule, 1);
        assert!(atom.template_slot.is_none());
    }

    #[test]
    fn template_style_copies_no_topology() {
        let style = AtomStyle {
            molecule_ids: false,
            topology: TopologyStyle::Template,
        };
        let mut store = ParticleStore::new(2, style);
        let t = dimer();
        let i = store.create_atom(2, Point3::origin());
        store.add_molecule_atom(&t, 1, i);

        let atom = &store.atoms()[0];
        assert!(atom.bonds.is_empty());
        assert!(atom.special.is_empty());
        assert!(atom.template_slot.is_none());
        assert_eq!(atom.molecule, 0);
    }

    #[test]
    fn take_where_preserves_order_of_kept_atoms() {
        let mut store = ParticleStore::new(1, AtomStyle::default());
        for x in 0..5 {
            store.create_atom(1, Point3::new(x as f64, 0.0, 0.0));
        }
        let taken = store.take_where(|a| a.position.x >= 3.0);
        assert_eq!(taken.len(), 2);
        let xs: Vec<f64> = store.atoms().iter().map(|a| a.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn extend_tags_numbers_after_existing_ids() {
        let mut store = ParticleStore::new(1, AtomStyle::default());
        store.create_atom(1, Point3::origin());
        store.atoms_mut()[0].tag = 7;
        store.create_atom(1, Point3::origin());
        store.create_atom(1, Point3::origin());

        store.extend_tags(&SerialComm::new()).unwrap();
        let tags: Vec<Tag> = store.atoms().iter().map(|a| a.tag).collect();
        assert_eq!(tags, vec![7, 8, 9]);
    }

    #[test]
    fn extend_tags_gives_each_rank_a_contiguous_block() {
        let results = ThreadComm::launch(3, |comm| {
            let mut store = ParticleStore::new(1, AtomStyle::default());
            for _ in 0..(comm.rank() + 1) {
                store.create_atom(1, Point3::origin());
            }
            store.extend_tags(comm).unwrap();
            store.atoms().iter().map(|a| a.tag).collect::<Vec<_>>()
        });
        assert_eq!(results[0], vec![1]);
        assert_eq!(results[1], vec![2, 3]);
        assert_eq!(results[2], vec![4, 5, 6]);
    }

    #[test]
    fn extend_tags_rejects_overflowing_ids() {
        let mut store = ParticleStore::new(1, AtomStyle::default());
        store.create_atom(1, Point3::origin());
        store.atoms_mut()[0].tag = MAX_TAG;
        store.create_atom(1, Point3::origin());
        let err = store.extend_tags(&SerialComm::new()).unwrap_err();
        assert!(matches!(err, StoreError::TagOverflow { new_atoms: 1, .. }));
    }

    #[test]
    fn max_molecule_id_only_looks_at_prefix() {
        let mut store = ParticleStore::new(1, AtomStyle::default());
        for m in [3, 9, 4] {
            let i = store.create_atom(1, Point3::origin());
            store.atoms_mut()[i].molecule = m;
        }
        assert_eq!(store.max_molecule_id(1), 3);
        assert_eq!(store.max_molecule_id(3), 9);
        assert_eq!(store.max_molecule_id(0), 0);
    }
}
