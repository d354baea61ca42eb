use crate::error::{CliError, Result};
use popmd::core::geometry::lattice::LatticeStyle;
use popmd::core::models::store::TopologyStyle;
use popmd::engine::config::Units;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBoxConfig {
    pub lo: [f64; 3],
    pub hi: [f64; 3],
    /// `[xy, xz, yz]`; a box with tilt factors is triclinic even when they are all zero.
    pub tilt: Option<[f64; 3]>,
    pub periodic: Option<[bool; 3]>,
    pub dimension: Option<u8>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileLatticeConfig {
    pub style: LatticeStyle,
    pub scale: Option<f64>,
    pub origin: Option<[f64; 3]>,
    pub orient_x: Option<[f64; 3]>,
    pub orient_y: Option<[f64; 3]>,
    pub orient_z: Option<[f64; 3]>,
    pub a1: Option<[f64; 3]>,
    pub a2: Option<[f64; 3]>,
    pub a3: Option<[f64; 3]>,
    #[serde(default)]
    pub basis: Vec<[f64; 3]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileStoreConfig {
    pub atom_types: Option<u32>,
    pub molecule_ids: Option<bool>,
    pub topology: Option<TopologyStyle>,
}

/// One region definition. Which fields apply depends on `style`:
/// `block` uses `lo`/`hi`, `sphere` uses `center`/`radius`, `cylinder` uses
/// `axis`/`center` (two values)/`radius`/`lo`/`hi` (one value each).
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRegionConfig {
    pub id: String,
    pub style: String,
    pub lo: Option<Vec<f64>>,
    pub hi: Option<Vec<f64>>,
    pub center: Option<Vec<f64>>,
    pub radius: Option<f64>,
    pub axis: Option<String>,
    #[serde(default)]
    pub outside: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMoleculeConfig {
    pub id: String,
    pub coords: Option<Vec<[f64; 3]>>,
    pub types: Option<Vec<u32>>,
    pub sub_molecules: Option<Vec<i64>>,
    /// `[type, atom1, atom2]` with 1-based member indices.
    #[serde(default)]
    pub bonds: Vec<[i64; 3]>,
    #[serde(default)]
    pub angles: Vec<[i64; 4]>,
    #[serde(default)]
    pub dihedrals: Vec<[i64; 5]>,
    #[serde(default)]
    pub impropers: Vec<[i64; 5]>,
    pub sets: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileRotation {
    pub angle: f64,
    pub axis: [f64; 3],
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileSubset {
    pub count: i64,
    pub seed: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileRatio {
    pub fraction: f64,
    pub seed: u64,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePopulateConfig {
    pub style: Option<String>,
    #[serde(rename = "type")]
    pub atom_type: Option<u32>,
    pub region: Option<String>,
    pub position: Option<[f64; 3]>,
    pub remap: Option<bool>,
    pub count: Option<i64>,
    pub seed: Option<u64>,
    pub max_tries: Option<usize>,
    pub overlap: Option<f64>,
    pub molecule: Option<String>,
    pub molecule_seed: Option<u64>,
    /// `[basis index, atom type]` pairs, basis indices 1-based.
    #[serde(default)]
    pub basis: Vec<[u32; 2]>,
    pub units: Option<Units>,
    pub rotate: Option<FileRotation>,
    pub subset: Option<FileSubset>,
    pub ratio: Option<FileRatio>,
    pub load_balance_factor: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub ranks: Option<usize>,
    pub grid: Option<[usize; 3]>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(rename = "box")]
    pub domain: FileBoxConfig,
    pub lattice: Option<FileLatticeConfig>,
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub regions: Vec<FileRegionConfig>,
    #[serde(default)]
    pub molecules: Vec<FileMoleculeConfig>,
    #[serde(default)]
    pub populate: FilePopulateConfig,
    #[serde(default)]
    pub run: FileRunConfig,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_run_file() {
        let config = FileConfig::from_toml(
            r#"
            [box]
            lo = [0.0, 0.0, 0.0]
            hi = [10.0, 10.0, 10.0]
            periodic = [true, true, false]

            [lattice]
            style = "fcc"
            scale = 1.5
            orient-x = [1.0, 1.0, 0.0]

            [store]
            atom-types = 2
            molecule-ids = true
            topology = "molecular"

            [[regions]]
            id = "ball"
            style = "sphere"
            center = [5.0, 5.0, 5.0]
            radius = 2.0
            outside = true

            [[molecules]]
            id = "dimer"
            coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]
            types = [1, 2]
            bonds = [[1, 1, 2]]

            [populate]
            style = "region"
            type = 1
            region = "ball"
            basis = [[2, 2]]
            subset = { count = 10, seed = 7 }

            [run]
            ranks = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.domain.periodic, Some([true, true, false]));
        let lattice = config.lattice.unwrap();
        assert_eq!(lattice.style, LatticeStyle::Fcc);
        assert_eq!(lattice.orient_x, Some([1.0, 1.0, 0.0]));
        assert_eq!(config.store.topology, Some(TopologyStyle::Molecular));
        assert!(config.regions[0].outside);
        assert_eq!(config.molecules[0].bonds, vec![[1, 1, 2]]);
        assert_eq!(config.populate.atom_type, Some(1));
        assert_eq!(config.populate.basis, vec![[2, 2]]);
        assert_eq!(
            config.populate.subset,
            Some(FileSubset { count: 10, seed: 7 })
        );
        assert_eq!(config.run.ranks, Some(4));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = FileConfig::from_toml(
            r#"
            [box]
            lo = [0.0, 0.0, 0.0]
            hi = [1.0, 1.0, 1.0]
            colour = "red"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn box_section_is_required() {
        assert!(FileConfig::from_toml("[populate]\nstyle = \"box\"\n").is_err());
    }

    #[test]
    fn from_file_reports_the_path_on_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[box]\nlo = 1\n").unwrap();
        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { path: p, .. } if p == path));
    }
}
