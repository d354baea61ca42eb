use crate::comm::consensus_any;
use crate::core::expression::VariableStore;
use crate::core::geometry::region::Region;
use crate::core::geometry::subbox::{EdgePolicy, SubBox};
use crate::core::models::ids::MAX_TAG;
use crate::core::models::store::ParticleStore;
use crate::core::models::template::MoleculeTemplate;
use crate::core::random::SeededRandom;
use crate::engine::config::{EntityKind, Placement, PopulateConfig, Units};
use crate::engine::context::{InsertionState, PopulateContext};
use crate::engine::dispatch::{Dispatcher, Orientation};
use crate::engine::enumerate::{
    EnumerationCursor, InsertAll, InsertSelected, LatticeWalk, SiteCounter,
};
use crate::engine::error::PopulateError;
use crate::engine::filter::CandidateFilter;
use crate::engine::sampler::{self, SampleOutcome};
use crate::engine::{migrate, stitch, subset};
use nalgebra::Point3;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// A condition that did not stop the run but that the caller should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateWarning {
    /// Random placement ran out of retries before reaching the requested count.
    Shortfall { inserted: i64, requested: i64 },
    /// The template bundles several molecule definitions; only the first is used.
    MultipleTemplateSets { template: String, sets: usize },
}

/// Outcome of one population run. Every field except `elapsed` is identical on all ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateReport {
    /// Atoms created across all ranks.
    pub atoms_created: i64,
    /// Molecules created across all ranks, 0 in atom mode.
    pub molecules_created: i64,
    /// Requested and inserted counts of random placement.
    pub random: Option<SampleOutcome>,
    /// Atoms moved to another rank after stamping molecules, summed over ranks.
    pub migrated: i64,
    /// Special neighbor lists must be rebuilt from the new bonds.
    pub special_rebuild: bool,
    pub warnings: Vec<PopulateWarning>,
    /// Wall time between the entry and exit barriers.
    pub elapsed: Duration,
}

impl PopulateReport {
    pub fn shortfall(&self) -> i64 {
        self.random.map_or(0, |r| r.shortfall())
    }
}

/// Creates atoms or molecules on every rank of `ctx` and stitches them into a globally
/// consistent state.
///
/// Every rank must call this with an identical `config`; `store` and `variables` are the
/// rank's own. The expression filter of `config`, if any, is evaluated against
/// `variables`. On success, new atoms carry unique tags, new molecules carry unique
/// molecule IDs and global bonded references, and each atom sits on the rank owning its
/// position.
#[instrument(skip_all, name = "populate_workflow", fields(placement = config.placement.name()))]
pub fn run<'a>(
    ctx: &PopulateContext<'_>,
    store: &mut ParticleStore,
    variables: Option<&'a mut dyn VariableStore>,
    config: &'a PopulateConfig,
) -> Result<PopulateReport, PopulateError> {
    let comm = ctx.comm;
    let domain = ctx.domain;
    let lattice = ctx.lattice;

    // === Phase 0: Validation ===
    if ctx.decomposition.size() != comm.size() {
        return Err(PopulateError::RankMismatch {
            grid: ctx.decomposition.size(),
            comm: comm.size(),
        });
    }
    let dimension = domain.dimension();
    if !lattice.style().supports(dimension) {
        return Err(PopulateError::IncompatibleLattice {
            style: lattice.style(),
            dimension: dimension.count(),
        });
    }
    config.validate_for(dimension)?;

    let mut warnings = Vec::new();
    let template = config.template();
    let basis_types = match template {
        None => resolve_basis_types(store, config, lattice.basis_len())?,
        Some(template) => {
            check_template(store, config, template)?;
            if template.sets() > 1 {
                if ctx.is_root() {
                    warn!(
                        template = template.id(),
                        "Molecule template has multiple molecules; only the first is used."
                    );
                }
                ctx.reporter.message(|| {
                    format!(
                        "Molecule template {} has {} molecules; only the first is used",
                        template.id(),
                        template.sets()
                    )
                });
                warnings.push(PopulateWarning::MultipleTemplateSets {
                    template: template.id().to_string(),
                    sets: template.sets(),
                });
            }
            Vec::new()
        }
    };

    if config.placement.uses_lattice() && lattice.basis_len() == 0 {
        return Err(PopulateError::UndefinedLattice);
    }

    let spacing = *lattice.spacing();
    let scale_lattice = config.units == Units::Lattice && !config.placement.uses_lattice();

    let policy = if config.placement.uses_lattice() {
        EdgePolicy::ShrinkPeriodic
    } else {
        EdgePolicy::Exact
    };
    let sub_box = SubBox::new(domain, ctx.decomposition, comm.rank(), policy);

    let mut dispatcher = match &config.entity {
        EntityKind::Atom => Dispatcher::atoms(config.base_type, basis_types, dimension),
        EntityKind::Molecule { template, seed } => {
            let orientation = match config.rotation.as_ref().and_then(|r| r.quaternion()) {
                Some(q) => Orientation::Fixed(q),
                None => Orientation::Random(SeededRandom::new(
                    seed.wrapping_add(comm.rank() as u64),
                )),
            };
            Dispatcher::molecules(template, config.base_type, orientation, dimension)
        }
    };

    comm.barrier();
    let started = Instant::now();
    let state = InsertionState::begin(store);

    // === Phase 1: Insertion ===
    let inserting = ctx.reporter.phase("Inserting");
    let mut random = None;
    match &config.placement {
        Placement::Single { position, remap } => {
            let mut x = *position;
            if scale_lattice {
                x = Point3::from(x.coords.component_mul(&spacing));
            }
            insert_single(ctx, &sub_box, x, *remap, &mut dispatcher, store);
        }
        Placement::Random(request) => {
            let region = request.region.as_deref();
            let mut filter =
                CandidateFilter::new(region, config.expression.as_ref(), variables)?;
            let overlap = request.overlap.map(|d| {
                let d = if scale_lattice { d * spacing.x } else { d };
                d + template.map_or(0.0, |t| t.radius())
            });
            let outcome = sampler::sample(
                ctx,
                request,
                overlap,
                &sub_box,
                &mut filter,
                &mut dispatcher,
                store,
            )?;
            if outcome.inserted < outcome.requested {
                if ctx.is_root() {
                    warn!(
                        "Only inserted {} particles out of {}",
                        outcome.inserted, outcome.requested
                    );
                }
                ctx.reporter.message(|| {
                    format!(
                        "Only inserted {} particles out of {}",
                        outcome.inserted, outcome.requested
                    )
                });
                warnings.push(PopulateWarning::Shortfall {
                    inserted: outcome.inserted,
                    requested: outcome.requested,
                });
            }
            random = Some(outcome);
        }
        Placement::Box | Placement::Region(_) => {
            let region: Option<&dyn Region> = match &config.placement {
                Placement::Region(r) => Some(&**r),
                _ => None,
            };
            let mut filter =
                CandidateFilter::new(region, config.expression.as_ref(), variables)?;
            insert_lattice(ctx, config, &sub_box, region, &mut filter, &mut dispatcher, store)?;
        }
    }
    inserting.finish();

    // === Phase 2: Global counts and IDs ===
    let natoms = comm.sum_i64(store.len() as i64);
    if !(0..MAX_TAG).contains(&natoms) {
        return Err(PopulateError::TooManyAtoms(natoms));
    }
    store.global_mut().atoms = natoms;
    store.extend_tags(comm)?;

    // === Phase 3: Molecule stitching and migration ===
    let mut molecules_created = 0;
    let mut migrated = 0;
    let mut special_rebuild = false;
    if let Some(template) = template {
        let stitching = ctx.reporter.phase("Stitching Molecules");
        let stitched = stitch::run(comm, store, template, 0, &state);
        molecules_created = stitched.molecules_global;
        special_rebuild = stitched.special_rebuild;

        let moved = migrate::run(comm, domain, ctx.decomposition, store);
        migrated = comm.sum_i64(moved.sent as i64);
        stitching.finish();
    }

    comm.barrier();
    let elapsed = started.elapsed();
    let atoms_created = natoms - state.natoms_previous;
    if ctx.is_root() {
        info!("Created {} atoms", atoms_created);
        info!(
            units = if scale_lattice { "lattice" } else { "box" },
            seconds = elapsed.as_secs_f64(),
            "Population finished."
        );
    }

    Ok(PopulateReport {
        atoms_created,
        molecules_created,
        random,
        migrated,
        special_rebuild,
        warnings,
        elapsed,
    })
}

/// Per-basis atom types: `base_type` everywhere, then the 1-based overrides.
fn resolve_basis_types(
    store: &ParticleStore,
    config: &PopulateConfig,
    basis_count: usize,
) -> Result<Vec<u32>, PopulateError> {
    if !store.is_valid_type(config.base_type) {
        return Err(PopulateError::InvalidType {
            atom_type: config.base_type as i64,
            atom_types: store.atom_types(),
        });
    }
    let mut types = vec![config.base_type; basis_count];
    for &(basis, atom_type) in &config.basis_types {
        if basis == 0 || basis > basis_count {
            return Err(PopulateError::InvalidBasis { basis, basis_count });
        }
        if !store.is_valid_type(atom_type) {
            return Err(PopulateError::InvalidType {
                atom_type: atom_type as i64,
                atom_types: store.atom_types(),
            });
        }
        types[basis - 1] = atom_type;
    }
    Ok(types)
}

fn check_template(
    store: &ParticleStore,
    config: &PopulateConfig,
    template: &MoleculeTemplate,
) -> Result<(), PopulateError> {
    if !template.has_coords() {
        return Err(PopulateError::TemplateMissingCoords(template.id().to_string()));
    }
    if !template.has_types() {
        return Err(PopulateError::TemplateMissingTypes(template.id().to_string()));
    }
    let highest = config.base_type as i64 + template.max_type() as i64;
    if highest <= 0 || highest > store.atom_types() as i64 {
        return Err(PopulateError::InvalidType {
            atom_type: highest,
            atom_types: store.atom_types(),
        });
    }
    Ok(())
}

/// Creates one entity at `x` on the rank owning it.
fn insert_single(
    ctx: &PopulateContext<'_>,
    sub_box: &SubBox,
    mut x: Point3<f64>,
    remap: bool,
    dispatcher: &mut Dispatcher<'_>,
    store: &mut ParticleStore,
) {
    let domain = ctx.domain;
    if remap {
        let mut image = [0; 3];
        domain.remap(&mut x, &mut image);
    }

    let coord = if domain.is_triclinic() {
        let mut s = domain.to_fractional(&x);
        if remap {
            let periodic = domain.periodic();
            for axis in 0..3 {
                if periodic[axis] && !(0.0..1.0).contains(&s[axis]) {
                    s[axis] = 0.0;
                }
            }
        }
        s
    } else {
        x
    };

    if sub_box.owns(&coord) {
        dispatcher.place(store, &x);
    }
}

/// Counts the local lattice sites, then fills all of them or a random subset.
fn insert_lattice(
    ctx: &PopulateContext<'_>,
    config: &PopulateConfig,
    sub_box: &SubBox,
    region: Option<&dyn Region>,
    filter: &mut CandidateFilter<'_>,
    dispatcher: &mut Dispatcher<'_>,
    store: &mut ParticleStore,
) -> Result<(), PopulateError> {
    let comm = ctx.comm;
    let walk =
        LatticeWalk::new(ctx.lattice, ctx.domain, sub_box, region).reporting(ctx.reporter);
    let mut cursor = EnumerationCursor::new();

    let local_sites = walk.run(filter, &mut cursor, &mut SiteCounter)?;
    if consensus_any(comm, || cursor.overflowed()) {
        return Err(PopulateError::LatticeOverflow);
    }

    let atoms_per_site = config.template().map_or(1, |t| t.atom_count());
    match &config.subset {
        None => {
            let estimate =
                subset::storage_estimate(comm, local_sites, config.load_balance_factor);
            store.reserve(estimate * atoms_per_site);
            walk.run(filter, &mut cursor, &mut InsertAll { dispatcher, store })?;
        }
        Some(spec) => {
            let plan = subset::select(comm, spec, local_sites, config.load_balance_factor)?;
            store.reserve(plan.estimated_local * atoms_per_site);
            walk.run(
                filter,
                &mut cursor,
                &mut InsertSelected {
                    dispatcher,
                    store,
                    flags: &plan.flags,
                },
            )?;
        }
    }
    Ok(())
}
