use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Draws discarded after seeding, so that consecutive seeds do not start out correlated.
pub const WARM_UP_DRAWS: usize = 30;

/// A reproducible uniform generator.
///
/// Ranks that construct it from the same seed draw identical sequences.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A uniform draw from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    pub fn warm_up(&mut self, draws: usize) {
        for _ in 0..draws {
            self.uniform();
        }
    }

    /// `n_pick` distinct indices from `0..n_total`, in no particular order.
    ///
    /// # Panics
    ///
    /// Panics if `n_pick > n_total`; callers validate the subset size first.
    pub fn sample_indices(&mut self, n_total: usize, n_pick: usize) -> Vec<usize> {
        index::sample(&mut self.rng, n_total, n_pick).into_vec()
    }
}
