use crate::core::expression::PositionExpression;
use crate::core::geometry::domain::Dimension;
use crate::core::geometry::region::Region;
use crate::core::geometry::rotation;
use crate::core::models::template::MoleculeTemplate;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_MAX_TRIES: usize = 1000;
pub const DEFAULT_LOAD_BALANCE_FACTOR: f64 = 1.1;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

/// Parameters of rejection-sampled placement.
#[derive(Debug, Clone)]
pub struct RandomPlacement {
    /// Number of particles to attempt.
    pub count: i64,
    /// Seed shared by all ranks.
    pub seed: u64,
    /// Candidates must fall inside this region.
    pub region: Option<Arc<dyn Region>>,
    /// Draws per particle before giving up on it.
    pub max_tries: usize,
    /// Minimum distance from every existing atom.
    pub overlap: Option<f64>,
}

impl RandomPlacement {
    pub fn new(count: i64, seed: u64) -> Self {
        Self {
            count,
            seed,
            region: None,
            max_tries: DEFAULT_MAX_TRIES,
            overlap: None,
        }
    }

    pub fn within(mut self, region: Arc<dyn Region>) -> Self {
        self.region = Some(region);
        self
    }
}

/// Where candidate positions come from.
#[derive(Debug, Clone)]
pub enum Placement {
    /// One particle at a fixed position, optionally wrapped into the periodic box first.
    Single { position: Point3<f64>, remap: bool },
    /// Every lattice site in the box.
    Box,
    /// Every lattice site inside a region.
    Region(Arc<dyn Region>),
    Random(RandomPlacement),
}

impl Placement {
    pub fn uses_lattice(&self) -> bool {
        matches!(self, Placement::Box | Placement::Region(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Placement::Single { .. } => "single",
            Placement::Box => "box",
            Placement::Region(_) => "region",
            Placement::Random(_) => "random",
        }
    }
}

/// What is created at each accepted position.
#[derive(Debug, Clone)]
pub enum EntityKind {
    Atom,
    /// A rigid copy of the template centered on the position. `seed` drives random
    /// orientations; each rank offsets it by its rank index.
    Molecule {
        template: Arc<MoleculeTemplate>,
        seed: u64,
    },
}

/// Units of single positions and the overlap distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Box,
    /// Multiples of the lattice spacings.
    #[default]
    Lattice,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubsetSpec {
    /// A fraction of all lattice sites, rounded down.
    Ratio { fraction: f64, seed: u64 },
    /// An exact number of lattice sites.
    Count { count: i64, seed: u64 },
}

impl SubsetSpec {
    pub fn seed(&self) -> u64 {
        match self {
            SubsetSpec::Ratio { seed, .. } | SubsetSpec::Count { seed, .. } => *seed,
        }
    }
}

/// A fixed orientation for every stamped molecule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub angle_degrees: f64,
    pub axis: Vector3<f64>,
}

impl Rotation {
    pub fn quaternion(&self) -> Option<UnitQuaternion<f64>> {
        rotation::from_axis_angle_degrees(&self.axis, self.angle_degrees)
    }
}

#[derive(Debug, Clone)]
pub struct PopulateConfig {
    pub placement: Placement,
    /// Atom type in atom mode, type offset added to template types in molecule mode.
    pub base_type: u32,
    pub entity: EntityKind,
    /// `(basis index, atom type)` overrides, basis indices 1-based.
    pub basis_types: Vec<(usize, u32)>,
    pub units: Units,
    pub rotation: Option<Rotation>,
    pub expression: Option<PositionExpression>,
    pub subset: Option<SubsetSpec>,
    /// Head room applied to per-rank storage estimates on multi-rank runs.
    pub load_balance_factor: f64,
}

impl PopulateConfig {
    pub fn builder() -> PopulateConfigBuilder {
        PopulateConfigBuilder::new()
    }

    pub fn template(&self) -> Option<&MoleculeTemplate> {
        match &self.entity {
            EntityKind::Atom => None,
            EntityKind::Molecule { template, .. } => Some(template),
        }
    }

    /// Checks that depend on the simulation dimension.
    pub fn validate_for(&self, dimension: Dimension) -> Result<(), ConfigError> {
        if let Some(r) = &self.rotation {
            if dimension.is_2d() && (r.axis.x != 0.0 || r.axis.y != 0.0) {
                return Err(invalid("rotate", "a 2d rotation axis must be along z"));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PopulateConfigBuilder {
    placement: Option<Placement>,
    base_type: Option<u32>,
    entity: Option<EntityKind>,
    basis_types: Vec<(usize, u32)>,
    units: Option<Units>,
    rotation: Option<Rotation>,
    expression: Option<PositionExpression>,
    subset: Option<SubsetSpec>,
    overlap: Option<f64>,
    max_tries: Option<usize>,
    load_balance_factor: Option<f64>,
}

impl PopulateConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }
    pub fn base_type(mut self, atom_type: u32) -> Self {
        self.base_type = Some(atom_type);
        self
    }
    pub fn molecule(mut self, template: Arc<MoleculeTemplate>, seed: u64) -> Self {
        self.entity = Some(EntityKind::Molecule { template, seed });
        self
    }
    pub fn basis_type(mut self, basis: usize, atom_type: u32) -> Self {
        self.basis_types.push((basis, atom_type));
        self
    }
    pub fn units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }
    pub fn rotation(mut self, angle_degrees: f64, axis: Vector3<f64>) -> Self {
        self.rotation = Some(Rotation {
            angle_degrees,
            axis,
        });
        self
    }
    pub fn expression(mut self, expression: PositionExpression) -> Self {
        self.expression = Some(expression);
        self
    }
    pub fn subset(mut self, subset: SubsetSpec) -> Self {
        self.subset = Some(subset);
        self
    }
    /// Minimum distance for random placement.
    pub fn overlap(mut self, distance: f64) -> Self {
        self.overlap = Some(distance);
        self
    }
    /// Retry budget for random placement.
    pub fn max_tries(mut self, tries: usize) -> Self {
        self.max_tries = Some(tries);
        self
    }
    pub fn load_balance_factor(mut self, factor: f64) -> Self {
        self.load_balance_factor = Some(factor);
        self
    }

    pub fn build(self) -> Result<PopulateConfig, ConfigError> {
        let mut placement = self
            .placement
            .ok_or(ConfigError::MissingParameter("placement"))?;
        let base_type = self
            .base_type
            .ok_or(ConfigError::MissingParameter("base_type"))?;
        let entity = self.entity.unwrap_or(EntityKind::Atom);

        match &mut placement {
            Placement::Random(random) => {
                if let Some(overlap) = self.overlap {
                    random.overlap = Some(overlap);
                }
                if let Some(tries) = self.max_tries {
                    random.max_tries = tries;
                }
                if random.count < 0 {
                    return Err(invalid("count", "must not be negative"));
                }
                if random.seed == 0 {
                    return Err(invalid("seed", "must be positive"));
                }
                if random.max_tries == 0 {
                    return Err(invalid("max_tries", "must be positive"));
                }
                if let Some(d) = random.overlap {
                    if !(d > 0.0) {
                        return Err(invalid("overlap", "must be positive"));
                    }
                }
            }
            other => {
                if self.overlap.is_some() {
                    return Err(invalid(
                        "overlap",
                        "can only be used with random placement",
                    ));
                }
                if self.max_tries.is_some() {
                    return Err(invalid(
                        "max_tries",
                        "can only be used with random placement",
                    ));
                }
                if self.subset.is_some() && !other.uses_lattice() {
                    return Err(invalid(
                        "subset",
                        "only applies to box or region placement",
                    ));
                }
            }
        }
        if self.subset.is_some() && matches!(placement, Placement::Random(_)) {
            return Err(invalid("subset", "only applies to box or region placement"));
        }

        if let Some(expression) = &self.expression {
            if matches!(placement, Placement::Single { .. }) {
                return Err(invalid(
                    "expression",
                    "cannot be combined with single placement",
                ));
            }
            if expression.x.is_none() && expression.y.is_none() && expression.z.is_none() {
                return Err(invalid("expression", "binds no coordinate"));
            }
        }

        match &entity {
            EntityKind::Atom => {
                if self.rotation.is_some() {
                    return Err(invalid("rotate", "only applies to molecules"));
                }
            }
            EntityKind::Molecule { seed, .. } => {
                if *seed == 0 {
                    return Err(invalid("molecule_seed", "must be positive"));
                }
            }
        }

        if let Some(r) = &self.rotation {
            if r.axis.norm_squared() == 0.0 {
                return Err(invalid("rotate", "axis must be non-zero"));
            }
        }

        match self.subset {
            Some(SubsetSpec::Ratio { fraction, seed }) => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(invalid("ratio", "fraction must be in (0, 1]"));
                }
                if seed == 0 {
                    return Err(invalid("ratio", "seed must be positive"));
                }
            }
            Some(SubsetSpec::Count { count, seed }) => {
                if count <= 0 {
                    return Err(invalid("subset", "count must be positive"));
                }
                if seed == 0 {
                    return Err(invalid("subset", "seed must be positive"));
                }
            }
            None => {}
        }

        let load_balance_factor = self
            .load_balance_factor
            .unwrap_or(DEFAULT_LOAD_BALANCE_FACTOR);
        if !(load_balance_factor >= 1.0) {
            return Err(invalid("load_balance_factor", "must be at least 1"));
        }

        Ok(PopulateConfig {
            placement,
            base_type,
            entity,
            basis_types: self.basis_types,
            units: self.units.unwrap_or_default(),
            rotation: self.rotation,
            expression: self.expression,
            subset: self.subset,
            load_balance_factor,
        })
    }
}
