use crate::error::Result;
use popmd::core::models::store::ParticleStore;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// One row of the particle CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomRecord {
    pub tag: i64,
    #[serde(rename = "type")]
    pub atom_type: u32,
    pub molecule: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ix: i32,
    pub iy: i32,
    pub iz: i32,
    /// Rank that owns the atom after the run.
    pub rank: usize,
}

/// Flattens the per-rank stores into one list ordered by atom ID.
///
/// `stores` must be in rank order.
pub fn collect_records(stores: &[ParticleStore]) -> Vec<AtomRecord> {
    let mut records: Vec<AtomRecord> = stores
        .iter()
        .enumerate()
        .flat_map(|(rank, store)| {
            store.atoms().iter().map(move |atom| AtomRecord {
                tag: atom.tag,
                atom_type: atom.atom_type,
                molecule: atom.molecule,
                x: atom.position.x,
                y: atom.position.y,
                z: atom.position.z,
                ix: atom.image[0],
                iy: atom.image[1],
                iz: atom.image[2],
                rank,
            })
        })
        .collect();
    records.sort_by_key(|r| r.tag);
    records
}

pub fn write_csv(path: &Path, records: &[AtomRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    debug!("Wrote {} atoms to {:?}", records.len(), path);
    Ok(())
}
