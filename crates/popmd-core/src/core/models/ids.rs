/// Global atom identifier. Zero marks an atom whose ID has not been assigned yet.
pub type Tag = i64;

/// Global molecule identifier. Zero means the atom belongs to no molecule.
pub type MoleculeId = i64;

/// Largest identifier the engine will hand out.
pub const MAX_TAG: Tag = i64::MAX - 1;
