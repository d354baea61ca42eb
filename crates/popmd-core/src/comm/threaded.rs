use super::Communicator;
use crate::core::models::atom::Atom;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};
use std::thread;

#[derive(Debug)]
struct Shared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<i64>>,
    /// `mailboxes[dest][src]`
    mailboxes: Mutex<Vec<Vec<Vec<Atom>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One rank of an in-process group whose ranks run on separate threads.
///
/// All ranks of a group must issue the same collectives in the same order. A rank that
/// panics leaves the others waiting at the next barrier, so [`ThreadComm::launch`] is the
/// preferred way to drive a group.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Creates the `size` rank handles of a new group, in rank order.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![0; size]),
            mailboxes: Mutex::new(vec![vec![Vec::new(); size]; size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Runs `f` on `size` ranks concurrently and returns the results in rank order.
    ///
    /// Rank `r` runs on a thread named `rank-r`. A panic on any rank is re-raised on the
    /// calling thread.
    pub fn launch<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&ThreadComm) -> T + Sync,
    {
        let comms = Self::group(size);
        let f = &f;
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank))
                        .spawn_scoped(scope, move || f(comm))
                        .expect("failed to spawn rank thread")
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    fn all_gather(&self, value: i64) -> Vec<i64> {
        lock(&self.shared.slots)[self.rank] = value;
        self.shared.barrier.wait();
        let values = lock(&self.shared.slots).clone();
        // Nobody may overwrite a slot until every rank has read it.
        self.shared.barrier.wait();
        values
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn sum_i64(&self, value: i64) -> i64 {
        self.all_gather(value)
            .into_iter()
            .fold(0i64, |acc, v| acc.saturating_add(v))
    }

    fn max_i64(&self, value: i64) -> i64 {
        self.all_gather(value)
            .into_iter()
            .max()
            .unwrap_or(value)
    }

    fn any(&self, flag: bool) -> bool {
        self.all_gather(flag as i64).into_iter().any(|v| v != 0)
    }

    fn exclusive_scan_i64(&self, value: i64) -> i64 {
        self.all_gather(value)[..self.rank]
            .iter()
            .fold(0i64, |acc, v| acc.saturating_add(*v))
    }

    fn exchange(&self, outgoing: Vec<Vec<Atom>>) -> Vec<Atom> {
        {
            let mut mailboxes = lock(&self.shared.mailboxes);
            for (dest, atoms) in outgoing.into_iter().enumerate().take(self.shared.size) {
                mailboxes[dest][self.rank] = atoms;
            }
        }
        self.shared.barrier.wait();
        let received: Vec<Atom> = {
            let mut mailboxes = lock(&self.shared.mailboxes);
            mailboxes[self.rank]
                .iter_mut()
                .flat_map(std::mem::take)
                .collect()
        };
        self.shared.barrier.wait();
        received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn launch_returns_results_in_rank_order() {
        let ranks = ThreadComm::launch(4, |comm| (comm.rank(), comm.size()));
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn reductions_agree_on_every_rank() {
        let results = ThreadComm::launch(3, |comm| {
            let r = comm.rank() as i64;
            (
                comm.sum_i64(r + 1),
                comm.max_i64(10 - r),
                comm.exclusive_scan_i64(r + 1),
                comm.any(r == 1),
            )
        });
        assert_eq!(results[0], (6, 10, 0, true));
        assert_eq!(results[1], (6, 10, 1, true));
        assert_eq!(results[2], (6, 10, 3, true));
    }

    #[test]
    fn ranks_run_on_named_threads() {
        let names = ThreadComm::launch(2, |_| thread::current().name().map(str::to_string));
        assert_eq!(
            names,
            vec![Some("rank-0".to_string()), Some("rank-1".to_string())]
        );
    }

    #[test]
    fn sum_saturates_instead_of_wrapping() {
        let sums = ThreadComm::launch(2, |comm| comm.sum_i64(i64::MAX));
        assert_eq!(sums, vec![i64::MAX, i64::MAX]);
    }

    #[test]
    fn exchange_delivers_atoms_to_their_destination() {
        let received = ThreadComm::launch(3, |comm| {
            let mut outgoing = vec![Vec::new(); comm.size()];
            let dest = (comm.rank() + 1) % comm.size();
            outgoing[dest].push(Atom::new(comm.rank() as u32 + 1, Point3::origin()));
            comm.exchange(outgoing)
                .into_iter()
                .map(|a| a.atom_type)
                .collect::<Vec<_>>()
        });
        assert_eq!(received, vec![vec![3], vec![1], vec![2]]);
    }

    #[test]
    fn repeated_collectives_do_not_interfere() {
        let results = ThreadComm::launch(4, |comm| {
            (0..50)
                .map(|i| comm.sum_i64(i + comm.rank() as i64))
                .sum::<i64>()
        });
        let expected: i64 = (0..50).map(|i| 4 * i + 6).sum();
        assert!(results.iter().all(|&r| r == expected));
    }
}
