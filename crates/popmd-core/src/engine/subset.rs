use super::config::SubsetSpec;
use super::error::PopulateError;
use crate::comm::Communicator;
use crate::core::random::SeededRandom;
use tracing::debug;

/// Which of this rank's lattice sites receive an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetPlan {
    /// One flag per local lattice site, indexed by enumeration sequence.
    pub flags: Vec<bool>,
    /// Sites selected across all ranks.
    pub selected_global: i64,
    /// Sites selected on this rank.
    pub selected_local: usize,
    /// Storage to reserve on this rank.
    pub estimated_local: usize,
}

/// Storage estimate for `local_sites` lattice sites when no subset is drawn.
///
/// Multi-rank runs pad the estimate by `load_balance_factor`.
pub fn storage_estimate(comm: &dyn Communicator, local_sites: usize, load_balance_factor: f64) -> usize {
    if comm.size() == 1 {
        local_sites
    } else {
        (load_balance_factor * local_sites as f64) as usize
    }
}

/// Draws a random subset of lattice sites without replacement.
///
/// Every rank draws the same global selection from a generator seeded with the subset seed,
/// then keeps the part that falls in its own block of the global site numbering (ranks in
/// order, sites in enumeration order). The total selected is therefore exact and
/// independent of the number of ranks. This is a collective call.
pub fn select(
    comm: &dyn Communicator,
    spec: &SubsetSpec,
    local_sites: usize,
    load_balance_factor: f64,
) -> Result<SubsetPlan, PopulateError> {
    let local = local_sites as i64;
    let global_sites = comm.sum_i64(local);
    let offset = comm.exclusive_scan_i64(local);

    let requested = match *spec {
        SubsetSpec::Ratio { fraction, .. } => (fraction * global_sites as f64) as i64,
        SubsetSpec::Count { count, .. } => count,
    };
    if requested > global_sites {
        return Err(PopulateError::SubsetTooLarge {
            requested,
            available: global_sites,
        });
    }

    let mut rng = SeededRandom::new(spec.seed());
    let mut flags = vec![false; local_sites];
    let mut selected_local = 0;
    for index in rng.sample_indices(global_sites as usize, requested as usize) {
        let index = index as i64;
        if index >= offset && index < offset + local {
            flags[(index - offset) as usize] = true;
            selected_local += 1;
        }
    }

    let estimated_local = if comm.size() == 1 || global_sites == 0 {
        requested as usize
    } else {
        (load_balance_factor * requested as f64 / global_sites as f64 * local_sites as f64)
            as usize
    };

    debug!(
        rank = comm.rank(),
        requested,
        global_sites,
        selected_local,
        "Selected lattice subset."
    );

    Ok(SubsetPlan {
        flags,
        selected_global: requested,
        selected_local,
        estimated_local,
    })
}
