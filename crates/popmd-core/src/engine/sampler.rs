use super::config::RandomPlacement;
use super::context::PopulateContext;
use super::dispatch::Dispatcher;
use super::error::PopulateError;
use super::filter::CandidateFilter;
use crate::comm::consensus_any;
use crate::core::geometry::Aabb;
use crate::core::geometry::domain::SimulationBox;
use crate::core::geometry::subbox::SubBox;
use crate::core::models::atom::Atom;
use crate::core::models::store::ParticleStore;
use crate::core::random::{SeededRandom, WARM_UP_DRAWS};
use nalgebra::Point3;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of random placement, identical on every rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOutcome {
    pub requested: i64,
    pub inserted: i64,
}

impl SampleOutcome {
    pub fn shortfall(&self) -> i64 {
        self.requested - self.inserted
    }
}

/// Box candidates are drawn from: the real bounding box of the simulation box, intersected
/// with the region's extent when it has one.
pub fn draw_bounds(
    domain: &SimulationBox,
    request: &RandomPlacement,
) -> Result<Aabb, PopulateError> {
    let mut bounds = domain.bounds();
    if let Some(extent) = request.region.as_ref().and_then(|r| r.extent()) {
        bounds = bounds.intersect(&extent);
        if (0..3).any(|axis| bounds.min[axis] > bounds.max[axis]) {
            return Err(PopulateError::NoRegionOverlap);
        }
    }
    Ok(bounds)
}

/// Whether some atom in `atoms` lies closer than `distance` to `x` under minimum image.
pub fn too_close(atoms: &[Atom], domain: &SimulationBox, x: &Point3<f64>, distance: f64) -> bool {
    let cutoff_sq = distance * distance;
    let near = |atom: &Atom| domain.minimum_image(&(x - atom.position)).norm_squared() < cutoff_sq;

    #[cfg(feature = "parallel")]
    {
        atoms.par_iter().any(near)
    }
    #[cfg(not(feature = "parallel"))]
    {
        atoms.iter().any(near)
    }
}

/// Places up to `request.count` particles at random positions.
///
/// All ranks draw the same candidates from a generator seeded with the shared seed, so
/// every acceptance decision is made identically everywhere; the overlap test is settled by
/// consensus over all ranks. Only the rank owning an accepted position creates it.
/// `overlap` is the final minimum distance, already in box units and including any
/// template radius. This is a collective call.
#[instrument(skip_all, name = "random_placement", fields(count = request.count))]
pub fn sample(
    ctx: &PopulateContext<'_>,
    request: &RandomPlacement,
    overlap: Option<f64>,
    sub_box: &SubBox,
    filter: &mut CandidateFilter<'_>,
    dispatcher: &mut Dispatcher<'_>,
    store: &mut ParticleStore,
) -> Result<SampleOutcome, PopulateError> {
    let domain = ctx.domain;
    let bounds = draw_bounds(domain, request)?;
    let extent = bounds.extent();
    let planar = domain.dimension().is_2d();
    let z_mid = domain.mid_plane_z();

    let mut rng = SeededRandom::new(request.seed);
    rng.warm_up(WARM_UP_DRAWS);

    let task = ctx.reporter.task(request.count.max(0) as u64);

    let mut inserted = 0i64;
    for _ in 0..request.count {
        let mut accepted = None;
        for _ in 0..request.max_tries {
            let mut x = Point3::new(
                bounds.min.x + rng.uniform() * extent.x,
                bounds.min.y + rng.uniform() * extent.y,
                bounds.min.z + rng.uniform() * extent.z,
            );
            if planar {
                x.z = z_mid;
            }

            if !filter.accepts(&x)? {
                continue;
            }
            if domain.is_triclinic() && !domain.fractional_inside(&domain.to_fractional(&x)) {
                continue;
            }
            if let Some(distance) = overlap {
                if consensus_any(ctx.comm, || too_close(store.atoms(), domain, &x, distance)) {
                    continue;
                }
            }
            accepted = Some(x);
            break;
        }

        if let Some(x) = accepted {
            inserted += 1;
            if sub_box.owns_position(domain, &x) {
                dispatcher.place(store, &x);
            }
        }
        task.advance(1);
    }
    task.finish();

    debug!(inserted, requested = request.count, "Random placement finished.");

    Ok(SampleOutcome {
        requested: request.count,
        inserted,
    })
}
