use super::ids::{MoleculeId, Tag};
use super::topology::{
    AngleRef, BondRef, DihedralRef, ImproperRef, SpecialList, TopologyCounts, TopologyFlags,
};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TemplateError {
    #[error("Molecule template '{0}' defines neither coordinates nor atom types")]
    Empty(String),

    #[error("Molecule template '{id}' has {found} {field} entries but {expected} atoms")]
    LengthMismatch {
        id: String,
        field: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Molecule template '{id}' references atom {index}, valid range is 1..={count}")]
    InvalidReference { id: String, index: Tag, count: usize },

    #[error("Molecule template '{id}' uses type 0 for {what}; types are 1-based")]
    ZeroType { id: String, what: &'static str },
}

/// Bonded data attached to one template member, in 1-based template-local indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberTopology {
    pub bonds: Vec<BondRef>,
    pub angles: Vec<AngleRef>,
    pub dihedrals: Vec<DihedralRef>,
    pub impropers: Vec<ImproperRef>,
    pub special: SpecialList,
}

/// An immutable prototype of a molecule.
///
/// Offsets are measured from the geometric center of the member coordinates, which is
/// computed once when the template is built. The engine never mutates a template;
/// orientation is passed explicitly whenever a copy is stamped.
#[derive(Debug, Clone)]
pub struct MoleculeTemplate {
    id: String,
    atom_count: usize,
    coords: Option<Vec<Point3<f64>>>,
    types: Option<Vec<u32>>,
    sub_molecules: Option<Vec<MoleculeId>>,
    topology: Vec<MemberTopology>,
    counts: TopologyCounts,
    flags: TopologyFlags,
    sets: usize,
    center: Point3<f64>,
    offsets: Vec<Vector3<f64>>,
    radius: f64,
}

impl MoleculeTemplate {
    pub fn builder(id: &str) -> TemplateBuilder {
        TemplateBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    pub fn has_coords(&self) -> bool {
        self.coords.is_some()
    }

    pub fn has_types(&self) -> bool {
        self.types.is_some()
    }

    /// Type of member `m`, 0 when the template carries no types.
    pub fn member_type(&self, m: usize) -> u32 {
        self.types.as_ref().map_or(0, |t| t[m])
    }

    /// Largest member type, i.e. the number of atom types the template spans.
    pub fn max_type(&self) -> u32 {
        self.types
            .as_ref()
            .and_then(|t| t.iter().copied().max())
            .unwrap_or(0)
    }

    /// Offset of member `m` from the template center.
    pub fn offset(&self, m: usize) -> &Vector3<f64> {
        &self.offsets[m]
    }

    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    /// Distance from the center to the farthest member.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn topology(&self, m: usize) -> &MemberTopology {
        &self.topology[m]
    }

    /// Per-molecule count of each bonded class.
    pub fn counts(&self) -> TopologyCounts {
        self.counts
    }

    pub fn flags(&self) -> TopologyFlags {
        self.flags
    }

    pub fn has_sub_molecules(&self) -> bool {
        self.sub_molecules.is_some()
    }

    /// 1-based sub-molecule ID of member `m`, 1 when the template has no sub-molecules.
    pub fn sub_molecule(&self, m: usize) -> MoleculeId {
        self.sub_molecules.as_ref().map_or(1, |s| s[m])
    }

    /// Number of distinct molecule IDs one stamped copy consumes.
    pub fn molecule_count(&self) -> MoleculeId {
        self.sub_molecules
            .as_ref()
            .and_then(|s| s.iter().copied().max())
            .unwrap_or(1)
    }

    /// Number of molecule definitions bundled in this template.
    pub fn sets(&self) -> usize {
        self.sets
    }
}

/// Assembles a [`MoleculeTemplate`] and validates it.
///
/// Bonded interactions are given with 1-based member indices. A bond is stored on its first
/// atom; angles, dihedrals and impropers are stored on their second atom.
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    id: String,
    coords: Option<Vec<Point3<f64>>>,
    types: Option<Vec<u32>>,
    sub_molecules: Option<Vec<MoleculeId>>,
    bonds: Vec<(u32, [Tag; 2])>,
    angles: Vec<(u32, [Tag; 3])>,
    dihedrals: Vec<(u32, [Tag; 4])>,
    impropers: Vec<(u32, [Tag; 4])>,
    special: Vec<(usize, SpecialList)>,
    sets: usize,
}

impl TemplateBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            sets: 1,
            ..Default::default()
        }
    }

    pub fn coords(mut self, coords: Vec<Point3<f64>>) -> Self {
        self.coords = Some(coords);
        self
    }
    pub fn types(mut self, types: Vec<u32>) -> Self {
        self.types = Some(types);
        self
    }
    pub fn sub_molecules(mut self, ids: Vec<MoleculeId>) -> Self {
        self.sub_molecules = Some(ids);
        self
    }
    pub fn bond(mut self, bond_type: u32, atoms: [Tag; 2]) -> Self {
        self.bonds.push((bond_type, atoms));
        self
    }
    pub fn angle(mut self, angle_type: u32, atoms: [Tag; 3]) -> Self {
        self.angles.push((angle_type, atoms));
        self
    }
    pub fn dihedral(mut self, dihedral_type: u32, atoms: [Tag; 4]) -> Self {
        self.dihedrals.push((dihedral_type, atoms));
        self
    }
    pub fn improper(mut self, improper_type: u32, atoms: [Tag; 4]) -> Self {
        self.impropers.push((improper_type, atoms));
        self
    }
    /// Sets the special-neighbor list of a 1-based member.
    pub fn special(mut self, member: usize, list: SpecialList) -> Self {
        self.special.push((member, list));
        self
    }
    pub fn sets(mut self, sets: usize) -> Self {
        self.sets = sets.max(1);
        self
    }

    pub fn build(self) -> Result<MoleculeTemplate, TemplateError> {
        let id = self.id;
        let atom_count = match (&self.coords, &self.types) {
            (Some(c), _) => c.len(),
            (None, Some(t)) => t.len(),
            (None, None) => return Err(TemplateError::Empty(id)),
        };
        if atom_count == 0 {
            return Err(TemplateError::Empty(id));
        }

        let check_len = |field: &'static str, found: usize| {
            if found == atom_count {
                Ok(())
            } else {
                Err(TemplateError::LengthMismatch {
                    id: id.clone(),
                    field,
                    found,
                    expected: atom_count,
                })
            }
        };
        if let Some(t) = &self.types {
            check_len("type", t.len())?;
            if t.contains(&0) {
                return Err(TemplateError::ZeroType {
                    id: id.clone(),
                    what: "an atom",
                });
            }
        }
        if let Some(s) = &self.sub_molecules {
            check_len("molecule", s.len())?;
        }

        let check_ref = |index: Tag| {
            if index >= 1 && index as usize <= atom_count {
                Ok(index as usize - 1)
            } else {
                Err(TemplateError::InvalidReference {
                    id: id.clone(),
                    index,
                    count: atom_count,
                })
            }
        };
        let check_type = |t: u32, what: &'static str| {
            if t == 0 {
                Err(TemplateError::ZeroType {
                    id: id.clone(),
                    what,
                })
            } else {
                Ok(())
            }
        };

        let mut topology = vec![MemberTopology::default(); atom_count];
        let mut counts = TopologyCounts::default();

        for (bond_type, atoms) in &self.bonds {
            check_type(*bond_type, "a bond")?;
            let owner = check_ref(atoms[0])?;
            check_ref(atoms[1])?;
            topology[owner]
                .bonds
                .push(BondRef::new(*bond_type, atoms[1]));
            counts.bonds += 1;
        }
        for (angle_type, atoms) in &self.angles {
            check_type(*angle_type, "an angle")?;
            for &a in atoms {
                check_ref(a)?;
            }
            topology[atoms[1] as usize - 1]
                .angles
                .push(AngleRef::new(*angle_type, *atoms));
            counts.angles += 1;
        }
        for (dihedral_type, atoms) in &self.dihedrals {
            check_type(*dihedral_type, "a dihedral")?;
            for &a in atoms {
                check_ref(a)?;
            }
            topology[atoms[1] as usize - 1]
                .dihedrals
                .push(DihedralRef::new(*dihedral_type, *atoms));
            counts.dihedrals += 1;
        }
        for (improper_type, atoms) in &self.impropers {
            check_type(*improper_type, "an improper")?;
            for &a in atoms {
                check_ref(a)?;
            }
            topology[atoms[1] as usize - 1]
                .impropers
                .push(ImproperRef::new(*improper_type, *atoms));
            counts.impropers += 1;
        }
        let mut has_special = false;
        for (member, list) in self.special {
            let slot = check_ref(member as Tag)?;
            for &partner in &list.partners {
                check_ref(partner)?;
            }
            has_special = true;
            topology[slot].special = list;
        }

        let flags = TopologyFlags {
            bonds: counts.bonds > 0,
            angles: counts.angles > 0,
            dihedrals: counts.dihedrals > 0,
            impropers: counts.impropers > 0,
            special: has_special,
        };

        let (center, offsets, radius) = match &self.coords {
            Some(coords) => geometric_frame(coords),
            None => (Point3::origin(), vec![Vector3::zeros(); atom_count], 0.0),
        };

        Ok(MoleculeTemplate {
            id,
            atom_count,
            coords: self.coords,
            types: self.types,
            sub_molecules: self.sub_molecules,
            topology,
            counts,
            flags,
            sets: self.sets,
            center,
            offsets,
            radius,
        })
    }
}

fn geometric_frame(coords: &[Point3<f64>]) -> (Point3<f64>, Vec<Vector3<f64>>, f64) {
    let sum = coords
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    let center = Point3::from(sum / coords.len() as f64);
    let offsets: Vec<Vector3<f64>> = coords.iter().map(|p| p - center).collect();
    let radius = offsets.iter().map(|d| d.norm()).fold(0.0, f64::max);
    (center, offsets, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> MoleculeTemplate {
        MoleculeTemplate::builder("water")
            .coords(vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
            ])
            .types(vec![1, 2, 2])
            .bond(1, [1, 2])
            .bond(1, [1, 3])
            .angle(1, [2, 1, 3])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_computes_center_offsets_and_radius() {
        let t = MoleculeTemplate::builder("pair")
            .coords(vec![Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 1.0, 1.0)])
            .types(vec![1, 1])
            .build()
            .unwrap();
        assert_eq!(*t.center(), Point3::new(2.0, 1.0, 1.0));
        assert_eq!(*t.offset(0), Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(*t.offset(1), Vector3::new(1.0, 0.0, 0.0));
        assert!((t.radius() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bonded_terms_are_stored_on_their_owner_and_counted() {
        let t = water();
        assert_eq!(t.atom_count(), 3);
        assert_eq!(t.topology(0).bonds.len(), 2);
        assert_eq!(t.topology(0).angles.len(), 1);
        assert!(t.topology(1).bonds.is_empty());
        assert_eq!(t.counts().bonds, 2);
        assert_eq!(t.counts().angles, 1);
        assert!(t.flags().bonds && t.flags().angles);
        assert!(!t.flags().dihedrals && !t.flags().special);
        assert_eq!(t.max_type(), 2);
    }

    #[test]
    fn sub_molecules_set_the_molecule_count() {
        let t = MoleculeTemplate::builder("dimer")
            .types(vec![1, 1, 1, 1])
            .sub_molecules(vec![1, 1, 2, 2])
            .build()
            .unwrap();
        assert!(t.has_sub_molecules());
        assert_eq!(t.molecule_count(), 2);
        assert_eq!(t.sub_molecule(2), 2);
        assert!(!t.has_coords());
        assert_eq!(water().molecule_count(), 1);
        assert_eq!(water().sub_molecule(1), 1);
    }

    #[test]
    fn empty_template_is_rejected() {
        let err = MoleculeTemplate::builder("nothing").build().unwrap_err();
        assert_eq!(err, TemplateError::Empty("nothing".to_string()));
    }

    #[test]
    fn mismatched_types_length_is_rejected() {
        let err = MoleculeTemplate::builder("bad")
            .coords(vec![Point3::origin(), Point3::origin()])
            .types(vec![1])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::LengthMismatch {
                field: "type",
                found: 1,
                expected: 2,
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_bond_reference_is_rejected() {
        let err = MoleculeTemplate::builder("bad")
            .types(vec![1, 1])
            .bond(1, [1, 3])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateError::InvalidReference { index: 3, count: 2, .. }
        ));
    }

    #[test]
    fn special_lists_are_validated_and_flagged() {
        let t = MoleculeTemplate::builder("pair")
            .types(vec![1, 1])
            .special(1, SpecialList::new(&[2], &[], &[]))
            .special(2, SpecialList::new(&[1], &[], &[]))
            .build()
            .unwrap();
        assert!(t.flags().special);
        assert_eq!(t.topology(1).special.partners, vec![1]);

        let err = MoleculeTemplate::builder("pair")
            .types(vec![1, 1])
            .special(1, SpecialList::new(&[5], &[], &[]))
            .build()
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidReference { index: 5, .. }));
    }
}
