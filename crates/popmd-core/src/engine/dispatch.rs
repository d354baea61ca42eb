use crate::core::geometry::domain::Dimension;
use crate::core::geometry::rotation::random_orientation;
use crate::core::models::store::ParticleStore;
use crate::core::models::template::MoleculeTemplate;
use crate::core::random::SeededRandom;
use nalgebra::{Point3, UnitQuaternion};

/// How stamped molecules are oriented.
#[derive(Debug, Clone)]
pub enum Orientation {
    /// Every molecule gets the same rotation.
    Fixed(UnitQuaternion<f64>),
    /// Every molecule gets a fresh random rotation from this generator.
    Random(SeededRandom),
}

impl Orientation {
    fn next(&mut self, dimension: Dimension) -> UnitQuaternion<f64> {
        match self {
            Orientation::Fixed(q) => *q,
            Orientation::Random(rng) => random_orientation(rng, dimension),
        }
    }
}

#[derive(Debug)]
enum Mode<'a> {
    Atom {
        atom_type: u32,
        basis_types: Vec<u32>,
    },
    Molecule {
        template: &'a MoleculeTemplate,
        base_type: u32,
        orientation: Orientation,
    },
}

/// Turns an accepted position into stored atoms.
#[derive(Debug)]
pub struct Dispatcher<'a> {
    mode: Mode<'a>,
    dimension: Dimension,
}

impl<'a> Dispatcher<'a> {
    /// Single atoms of `atom_type`; lattice sites use `basis_types[basis]` instead.
    pub fn atoms(atom_type: u32, basis_types: Vec<u32>, dimension: Dimension) -> Self {
        Self {
            mode: Mode::Atom {
                atom_type,
                basis_types,
            },
            dimension,
        }
    }

    pub fn molecules(
        template: &'a MoleculeTemplate,
        base_type: u32,
        orientation: Orientation,
        dimension: Dimension,
    ) -> Self {
        Self {
            mode: Mode::Molecule {
                template,
                base_type,
                orientation,
            },
            dimension,
        }
    }

    /// Creates the entity at `position` and returns the number of atoms appended.
    pub fn place(&mut self, store: &mut ParticleStore, position: &Point3<f64>) -> usize {
        match &mut self.mode {
            Mode::Atom { atom_type, .. } => {
                store.create_atom(*atom_type, *position);
                1
            }
            Mode::Molecule {
                template,
                base_type,
                orientation,
            } => {
                let q = orientation.next(self.dimension);
                stamp_molecule(store, template, *base_type, position, &q)
            }
        }
    }

    /// Like [`Dispatcher::place`], with the atom type taken from the lattice basis point.
    pub fn place_at_site(
        &mut self,
        store: &mut ParticleStore,
        position: &Point3<f64>,
        basis: usize,
    ) -> usize {
        if let Mode::Atom { basis_types, .. } = &self.mode {
            store.create_atom(basis_types[basis], *position);
            return 1;
        }
        self.place(store, position)
    }
}

/// Appends a rotated copy of `template` centered on `center`.
///
/// Members are appended contiguously in template order with type `base_type + member type`.
/// Bonded references keep their template-local indices until the copy is stitched.
pub fn stamp_molecule(
    store: &mut ParticleStore,
    template: &MoleculeTemplate,
    base_type: u32,
    center: &Point3<f64>,
    rotation: &UnitQuaternion<f64>,
) -> usize {
    let n = template.atom_count();
    store.reserve(n);
    for m in 0..n {
        let position = center + rotation * template.offset(m);
        let index = store.create_atom(base_type + template.member_type(m), position);
        store.add_molecule_atom(template, m, index);
    }
    n
}
