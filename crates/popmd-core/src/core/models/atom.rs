use super::ids::{MoleculeId, Tag};
use super::topology::{AngleRef, BondRef, DihedralRef, ImproperRef, SpecialList};
use nalgebra::Point3;

/// Position of an atom inside a molecule template, for stores that keep topology on the
/// template instead of on every atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateSlot {
    /// Index of the template in the store's template list.
    pub template: usize,
    /// Zero-based member index within the template.
    pub member: usize,
}

/// A single particle owned by one rank.
///
/// Atoms are created with tag 0 and molecule ID 0. Tags are assigned once every rank has
/// finished creating atoms; molecule IDs and bonded references are stitched afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Global ID, 0 until assigned.
    pub tag: Tag,
    /// Atom type, 1-based.
    pub atom_type: u32,
    /// Cartesian position in box units.
    pub position: Point3<f64>,
    /// Number of periodic box lengths the atom has been wrapped across, per axis.
    pub image: [i32; 3],
    /// Molecule ID, 0 for none.
    pub molecule: MoleculeId,
    pub bonds: Vec<BondRef>,
    pub angles: Vec<AngleRef>,
    pub dihedrals: Vec<DihedralRef>,
    pub impropers: Vec<ImproperRef>,
    pub special: SpecialList,
    pub template_slot: Option<TemplateSlot>,
}

impl Atom {
    /// Creates an untagged atom with no bonded data.
    ///
    /// # Arguments
    ///
    /// * `atom_type` - The 1-based atom type.
    /// * `position` - Cartesian coordinates in box units.
    pub fn new(atom_type: u32, position: Point3<f64>) -> Self {
        Self {
            tag: 0,
            atom_type,
            position,
            image: [0; 3],
            molecule: 0,
            bonds: Vec::new(),
            angles: Vec::new(),
            dihedrals: Vec::new(),
            impropers: Vec::new(),
            special: SpecialList::default(),
            template_slot: None,
        }
    }
}
