use super::defaults::DefaultsConfig;
use super::file::{
    FileBoxConfig, FileConfig, FileLatticeConfig, FileMoleculeConfig, FilePopulateConfig,
    FileRegionConfig,
};
use super::models::AppConfig;
use crate::cli::PopulateArgs;
use crate::error::{CliError, Result};
use nalgebra::{Point3, Vector3};
use popmd::core::geometry::domain::{Decomposition, Dimension, SimulationBox};
use popmd::core::geometry::lattice::Lattice;
use popmd::core::geometry::region::{
    Axis, BlockRegion, CylinderRegion, Outside, Region, SphereRegion,
};
use popmd::core::models::store::AtomStyle;
use popmd::core::models::template::MoleculeTemplate;
use popmd::engine::config::{
    Placement, PopulateConfig, PopulateConfigBuilder, RandomPlacement, SubsetSpec, Units,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub fn build_config(args: &PopulateArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let file_config = apply_set_values(file_config, &args.set_values)?;

    let domain = build_domain(&file_config.domain, &defaults)?;
    let lattice = match &file_config.lattice {
        Some(section) => build_lattice(section, domain.dimension(), &defaults)?,
        None => Lattice::none(),
    };

    let ranks = args
        .ranks
        .or(file_config.run.ranks)
        .unwrap_or(defaults.ranks);
    if ranks == 0 {
        return Err(CliError::Argument(
            "The number of ranks must be at least 1.".to_string(),
        ));
    }
    let decomposition = match file_config.run.grid {
        Some(grid) => {
            let decomposition = Decomposition::new(grid)?;
            if decomposition.size() != ranks {
                return Err(CliError::Config(format!(
                    "`run.grid` {:?} has {} ranks but the run uses {}",
                    grid,
                    decomposition.size(),
                    ranks
                )));
            }
            decomposition
        }
        None => Decomposition::for_ranks(ranks, &domain)?,
    };
    debug!(
        "Using {} rank(s) on a {:?} grid.",
        ranks,
        decomposition.grid()
    );

    let populate = build_populate(&file_config, args.seed, &defaults)?;
    populate.validate_for(domain.dimension())?;

    let style = AtomStyle {
        molecule_ids: file_config
            .store
            .molecule_ids
            .unwrap_or(populate.template().is_some()),
        topology: file_config.store.topology.unwrap_or_default(),
    };

    Ok(AppConfig {
        ranks,
        domain,
        decomposition,
        lattice,
        atom_types: file_config.store.atom_types.unwrap_or(defaults.atom_types),
        style,
        populate,
        output: args.output.clone(),
    })
}

fn build_domain(section: &FileBoxConfig, defaults: &DefaultsConfig) -> Result<SimulationBox> {
    let dimension = Dimension::try_from(section.dimension.unwrap_or(defaults.dimension))
        .map_err(CliError::Config)?;
    let lo = Point3::from(section.lo);
    let hi = Point3::from(section.hi);
    let periodic = section.periodic.unwrap_or(defaults.periodic);
    let domain = match section.tilt {
        Some(tilt) => SimulationBox::triclinic(lo, hi, tilt, periodic, dimension)?,
        None => SimulationBox::orthogonal(lo, hi, periodic, dimension)?,
    };
    Ok(domain)
}

fn build_lattice(
    section: &FileLatticeConfig,
    dimension: Dimension,
    defaults: &DefaultsConfig,
) -> Result<Lattice> {
    let mut builder =
        Lattice::builder(section.style, section.scale.unwrap_or(defaults.lattice_scale));
    if let Some(origin) = section.origin {
        builder = builder.origin(Vector3::from(origin));
    }
    if section.orient_x.is_some() || section.orient_y.is_some() || section.orient_z.is_some() {
        builder = builder.orient(
            Vector3::from(section.orient_x.unwrap_or([1.0, 0.0, 0.0])),
            Vector3::from(section.orient_y.unwrap_or([0.0, 1.0, 0.0])),
            Vector3::from(section.orient_z.unwrap_or([0.0, 0.0, 1.0])),
        );
    }
    match (section.a1, section.a2, section.a3) {
        (Some(a1), Some(a2), Some(a3)) => {
            builder = builder.cell(Vector3::from(a1), Vector3::from(a2), Vector3::from(a3));
        }
        (None, None, None) => {}
        _ => {
            return Err(CliError::Config(
                "`lattice.a1`, `lattice.a2` and `lattice.a3` must be given together".to_string(),
            ));
        }
    }
    for point in &section.basis {
        builder = builder.basis(Vector3::from(*point));
    }
    Ok(builder.build(dimension)?)
}

fn with_outside<R: Region + 'static>(region: R, outside: bool) -> Arc<dyn Region> {
    if outside {
        Arc::new(Outside::new(region))
    } else {
        Arc::new(region)
    }
}

fn fixed<const N: usize>(values: Option<&Vec<f64>>, id: &str, field: &str) -> Result<[f64; N]> {
    let values = values.ok_or_else(|| {
        CliError::Config(format!("Region '{}' requires `{}`", id, field))
    })?;
    values.as_slice().try_into().map_err(|_| {
        CliError::Config(format!(
            "Region '{}': `{}` must have {} values, got {}",
            id,
            field,
            N,
            values.len()
        ))
    })
}

fn build_region(section: &FileRegionConfig) -> Result<Arc<dyn Region>> {
    let id = section.id.as_str();
    let radius = || {
        section
            .radius
            .ok_or_else(|| CliError::Config(format!("Region '{}' requires `radius`", id)))
    };
    let region = match section.style.to_ascii_lowercase().as_str() {
        "block" => {
            let lo = fixed::<3>(section.lo.as_ref(), id, "lo")?;
            let hi = fixed::<3>(section.hi.as_ref(), id, "hi")?;
            with_outside(
                BlockRegion::new(Point3::from(lo), Point3::from(hi)),
                section.outside,
            )
        }
        "sphere" => {
            let center = fixed::<3>(section.center.as_ref(), id, "center")?;
            with_outside(
                SphereRegion::new(Point3::from(center), radius()?),
                section.outside,
            )
        }
        "cylinder" => {
            let axis = parse_axis(section.axis.as_deref().unwrap_or("z"))?;
            let center = fixed::<2>(section.center.as_ref(), id, "center")?;
            let [lo] = fixed::<1>(section.lo.as_ref(), id, "lo")?;
            let [hi] = fixed::<1>(section.hi.as_ref(), id, "hi")?;
            with_outside(
                CylinderRegion::new(axis, center, radius()?, lo, hi),
                section.outside,
            )
        }
        other => {
            return Err(CliError::Config(format!(
                "Region '{}' has unknown style '{}'",
                id, other
            )));
        }
    };
    Ok(region)
}

fn parse_axis(s: &str) -> Result<Axis> {
    match s.to_ascii_lowercase().as_str() {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        "z" => Ok(Axis::Z),
        other => Err(CliError::Config(format!(
            "Cylinder axis must be x, y or z, got '{}'",
            other
        ))),
    }
}

fn interaction_type(value: i64, id: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        CliError::Config(format!(
            "Molecule '{}' uses invalid interaction type {}",
            id, value
        ))
    })
}

fn build_template(section: &FileMoleculeConfig) -> Result<MoleculeTemplate> {
    let id = section.id.as_str();
    let mut builder = MoleculeTemplate::builder(id);
    if let Some(coords) = &section.coords {
        builder = builder.coords(coords.iter().map(|c| Point3::from(*c)).collect());
    }
    if let Some(types) = &section.types {
        builder = builder.types(types.clone());
    }
    if let Some(ids) = &section.sub_molecules {
        builder = builder.sub_molecules(ids.clone());
    }
    for &[t, a, b] in &section.bonds {
        builder = builder.bond(interaction_type(t, id)?, [a, b]);
    }
    for &[t, a, b, c] in &section.angles {
        builder = builder.angle(interaction_type(t, id)?, [a, b, c]);
    }
    for &[t, a, b, c, d] in &section.dihedrals {
        builder = builder.dihedral(interaction_type(t, id)?, [a, b, c, d]);
    }
    for &[t, a, b, c, d] in &section.impropers {
        builder = builder.improper(interaction_type(t, id)?, [a, b, c, d]);
    }
    if let Some(sets) = section.sets {
        builder = builder.sets(sets);
    }
    Ok(builder.build()?)
}

fn find_region(config: &FileConfig, id: &str) -> Result<Arc<dyn Region>> {
    let section = config
        .regions
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| CliError::Config(format!("Create atoms region '{}' does not exist", id)))?;
    build_region(section)
}

fn build_placement(config: &FileConfig, cli_seed: Option<u64>) -> Result<Placement> {
    let populate = &config.populate;
    let style = populate
        .style
        .as_deref()
        .ok_or_else(|| CliError::Config("`populate.style` is required".to_string()))?;
    if cli_seed.is_some() && style != "random" {
        return Err(CliError::Argument(
            "--seed only applies to random placement".to_string(),
        ));
    }

    let placement = match style {
        "single" => Placement::Single {
            position: Point3::from(populate.position.ok_or_else(|| {
                CliError::Config("Single placement requires `populate.position`".to_string())
            })?),
            remap: populate.remap.unwrap_or(false),
        },
        "box" => Placement::Box,
        "region" => {
            let id = populate.region.as_deref().ok_or_else(|| {
                CliError::Config("Region placement requires `populate.region`".to_string())
            })?;
            Placement::Region(find_region(config, id)?)
        }
        "random" => {
            let count = populate.count.ok_or_else(|| {
                CliError::Config("Random placement requires `populate.count`".to_string())
            })?;
            let seed = cli_seed.or(populate.seed).ok_or_else(|| {
                CliError::Config("Random placement requires `populate.seed`".to_string())
            })?;
            let mut random = RandomPlacement::new(count, seed);
            if let Some(id) = populate.region.as_deref() {
                random = random.within(find_region(config, id)?);
            }
            Placement::Random(random)
        }
        other => {
            return Err(CliError::Config(format!(
                "Unknown populate style '{}'; expected single, box, region or random",
                other
            )));
        }
    };
    Ok(placement)
}

fn build_populate(
    config: &FileConfig,
    cli_seed: Option<u64>,
    defaults: &DefaultsConfig,
) -> Result<PopulateConfig> {
    let populate = &config.populate;
    let placement = build_placement(config, cli_seed)?;
    let is_random = matches!(placement, Placement::Random(_));

    let mut builder = PopulateConfigBuilder::new()
        .placement(placement)
        .base_type(populate.atom_type.ok_or_else(|| {
            CliError::Config("`populate.type` is required".to_string())
        })?)
        .units(populate.units.unwrap_or_default())
        .load_balance_factor(
            populate
                .load_balance_factor
                .unwrap_or(defaults.load_balance_factor),
        );

    if let Some(distance) = populate.overlap {
        builder = builder.overlap(distance);
    }
    match populate.max_tries {
        Some(tries) => builder = builder.max_tries(tries),
        None if is_random => builder = builder.max_tries(defaults.max_tries),
        None => {}
    }

    if let Some(id) = populate.molecule.as_deref() {
        let section = config
            .molecules
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| {
                CliError::Config(format!("Molecule template ID '{}' does not exist", id))
            })?;
        let seed = populate.molecule_seed.ok_or_else(|| {
            CliError::Config("`populate.molecule` requires `populate.molecule-seed`".to_string())
        })?;
        builder = builder.molecule(Arc::new(build_template(section)?), seed);
    }

    for &[basis, atom_type] in &populate.basis {
        builder = builder.basis_type(basis as usize, atom_type);
    }
    if let Some(rotation) = populate.rotate {
        builder = builder.rotation(rotation.angle, Vector3::from(rotation.axis));
    }
    match (populate.subset, populate.ratio) {
        (Some(_), Some(_)) => {
            return Err(CliError::Config(
                "`populate.subset` and `populate.ratio` cannot be combined".to_string(),
            ));
        }
        (Some(subset), None) => {
            builder = builder.subset(SubsetSpec::Count {
                count: subset.count,
                seed: subset.seed,
            });
        }
        (None, Some(ratio)) => {
            builder = builder.subset(SubsetSpec::Ratio {
                fraction: ratio.fraction,
                seed: ratio.seed,
            });
        }
        (None, None) => {}
    }

    Ok(builder.build()?)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_units(key: &str, value: &str) -> Result<Units> {
    match value {
        "box" => Ok(Units::Box),
        "lattice" => Ok(Units::Lattice),
        _ => Err(CliError::Config(format!(
            "Invalid value for {}: {} (expected box or lattice)",
            key, value
        ))),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let populate: &mut FilePopulateConfig = &mut config.populate;

        match key {
            "run.ranks" => config.run.ranks = Some(parse_value(key, value)?),
            "store.atom-types" => config.store.atom_types = Some(parse_value(key, value)?),
            "populate.style" => populate.style = Some(value.to_string()),
            "populate.type" => populate.atom_type = Some(parse_value(key, value)?),
            "populate.region" => populate.region = Some(value.to_string()),
            "populate.count" => populate.count = Some(parse_value(key, value)?),
            "populate.seed" => populate.seed = Some(parse_value(key, value)?),
            "populate.max-tries" => populate.max_tries = Some(parse_value(key, value)?),
            "populate.overlap" => populate.overlap = Some(parse_value(key, value)?),
            "populate.remap" => populate.remap = Some(parse_value(key, value)?),
            "populate.molecule" => populate.molecule = Some(value.to_string()),
            "populate.molecule-seed" => populate.molecule_seed = Some(parse_value(key, value)?),
            "populate.units" => populate.units = Some(parse_units(key, value)?),
            "populate.load-balance-factor" => {
                populate.load_balance_factor = Some(parse_value(key, value)?)
            }
            "lattice.scale" => {
                let lattice = config.lattice.as_mut().ok_or_else(|| {
                    CliError::Config(format!("{} needs a [lattice] section", key))
                })?;
                lattice.scale = Some(parse_value(key, value)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
