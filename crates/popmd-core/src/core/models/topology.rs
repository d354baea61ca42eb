use super::ids::Tag;
use std::ops::{AddAssign, Mul};

/// Shifts every atom reference held by a bonded record by a fixed amount.
///
/// Templates describe their bonded topology with 1-based indices local to the template.
/// Once the created atoms have global IDs, adding `first_tag - 1` turns those local indices
/// into global IDs.
pub trait Rebase {
    fn rebase(&mut self, offset: Tag);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BondRef {
    pub bond_type: u32,
    pub partner: Tag,
}

impl BondRef {
    pub fn new(bond_type: u32, partner: Tag) -> Self {
        Self { bond_type, partner }
    }
}

impl Rebase for BondRef {
    fn rebase(&mut self, offset: Tag) {
        self.partner += offset;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AngleRef {
    pub angle_type: u32,
    pub atoms: [Tag; 3],
}

impl AngleRef {
    pub fn new(angle_type: u32, atoms: [Tag; 3]) -> Self {
        Self { angle_type, atoms }
    }
}

impl Rebase for AngleRef {
    fn rebase(&mut self, offset: Tag) {
        self.atoms.iter_mut().for_each(|t| *t += offset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DihedralRef {
    pub dihedral_type: u32,
    pub atoms: [Tag; 4],
}

impl DihedralRef {
    pub fn new(dihedral_type: u32, atoms: [Tag; 4]) -> Self {
        Self {
            dihedral_type,
            atoms,
        }
    }
}

impl Rebase for DihedralRef {
    fn rebase(&mut self, offset: Tag) {
        self.atoms.iter_mut().for_each(|t| *t += offset);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImproperRef {
    pub improper_type: u32,
    pub atoms: [Tag; 4],
}

impl ImproperRef {
    pub fn new(improper_type: u32, atoms: [Tag; 4]) -> Self {
        Self {
            improper_type,
            atoms,
        }
    }
}

impl Rebase for ImproperRef {
    fn rebase(&mut self, offset: Tag) {
        self.atoms.iter_mut().for_each(|t| *t += offset);
    }
}

/// Short-range bonded neighbors of an atom.
///
/// `counts` holds cumulative counts: `counts[0]` 1-2 neighbors, `counts[1]` 1-2 plus 1-3,
/// `counts[2]` all of 1-2, 1-3 and 1-4. `partners` has `counts[2]` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialList {
    pub counts: [usize; 3],
    pub partners: Vec<Tag>,
}

impl SpecialList {
    pub fn new(one_two: &[Tag], one_three: &[Tag], one_four: &[Tag]) -> Self {
        let mut partners = Vec::with_capacity(one_two.len() + one_three.len() + one_four.len());
        partners.extend_from_slice(one_two);
        partners.extend_from_slice(one_three);
        partners.extend_from_slice(one_four);
        Self {
            counts: [
                one_two.len(),
                one_two.len() + one_three.len(),
                partners.len(),
            ],
            partners,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

impl Rebase for SpecialList {
    fn rebase(&mut self, offset: Tag) {
        self.partners.iter_mut().for_each(|t| *t += offset);
    }
}

/// Number of bonded interactions of each class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyCounts {
    pub bonds: i64,
    pub angles: i64,
    pub dihedrals: i64,
    pub impropers: i64,
}

impl AddAssign for TopologyCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.bonds += rhs.bonds;
        self.angles += rhs.angles;
        self.dihedrals += rhs.dihedrals;
        self.impropers += rhs.impropers;
    }
}

impl Mul<i64> for TopologyCounts {
    type Output = Self;

    fn mul(self, n: i64) -> Self {
        Self {
            bonds: self.bonds * n,
            angles: self.angles * n,
            dihedrals: self.dihedrals * n,
            impropers: self.impropers * n,
        }
    }
}

/// Which bonded classes a template defines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyFlags {
    pub bonds: bool,
    pub angles: bool,
    pub dihedrals: bool,
    pub impropers: bool,
    pub special: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_shifts_every_reference() {
        let mut bond = BondRef::new(1, 2);
        let mut angle = AngleRef::new(1, [1, 2, 3]);
        let mut dihedral = DihedralRef::new(2, [1, 2, 3, 4]);
        let mut improper = ImproperRef::new(3, [4, 3, 2, 1]);

        bond.rebase(10);
        angle.rebase(10);
        dihedral.rebase(10);
        improper.rebase(10);

        assert_eq!(bond.partner, 12);
        assert_eq!(bond.bond_type, 1);
        assert_eq!(angle.atoms, [11, 12, 13]);
        assert_eq!(dihedral.atoms, [11, 12, 13, 14]);
        assert_eq!(improper.atoms, [14, 13, 12, 11]);
    }

    #[test]
    fn special_list_counts_are_cumulative() {
        let special = SpecialList::new(&[2], &[3, 4], &[5]);
        assert_eq!(special.counts, [1, 3, 4]);
        assert_eq!(special.partners, vec![2, 3, 4, 5]);
        assert!(!special.is_empty());
        assert!(SpecialList::default().is_empty());
    }

    #[test]
    fn special_list_rebase_shifts_partners() {
        let mut special = SpecialList::new(&[2], &[3], &[]);
        special.rebase(100);
        assert_eq!(special.partners, vec![102, 103]);
        assert_eq!(special.counts, [1, 2, 2]);
    }

    #[test]
    fn topology_counts_scale_and_accumulate() {
        let per_molecule = TopologyCounts {
            bonds: 2,
            angles: 1,
            dihedrals: 0,
            impropers: 0,
        };
        let mut total = TopologyCounts::default();
        total += per_molecule * 5;
        total += per_molecule;
        assert_eq!(total.bonds, 12);
        assert_eq!(total.angles, 6);
        assert_eq!(total.dihedrals, 0);
    }
}
