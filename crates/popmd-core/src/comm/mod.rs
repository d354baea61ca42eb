//! # Communication Module
//!
//! Collective operations between the cooperating ranks of one population run.
//!
//! Every rank executes the same sequence of collective calls. A rank that skips a call, or
//! calls them in a different order, deadlocks the group; the engine guarantees a matching
//! order by making every collective unconditional within a phase.
//!
//! - [`serial::SerialComm`] - a single rank, all collectives are identities
//! - [`threaded::ThreadComm`] - N ranks as OS threads in one process

use crate::core::models::atom::Atom;

pub mod serial;
pub mod threaded;

/// Collective interface shared by all ranks of a run.
pub trait Communicator {
    /// Index of this rank, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    fn barrier(&self);

    /// Global sum, saturating at `i64::MAX`.
    fn sum_i64(&self, value: i64) -> i64;

    fn max_i64(&self, value: i64) -> i64;

    /// Global logical OR.
    fn any(&self, flag: bool) -> bool;

    /// Sum of `value` over all ranks below this one. Rank 0 receives 0.
    fn exclusive_scan_i64(&self, value: i64) -> i64;

    /// All-to-all transfer of atoms.
    ///
    /// `outgoing[r]` is sent to rank `r`; it must have exactly `size()` entries. Returns
    /// everything sent to this rank, ordered by source rank.
    fn exchange(&self, outgoing: Vec<Vec<Atom>>) -> Vec<Atom>;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Evaluates `local` on this rank and returns whether it held on any rank.
///
/// This is how a decision that depends on state partitioned across ranks (for instance
/// "some atom is too close to this point") is made identically everywhere.
pub fn consensus_any<F>(comm: &dyn Communicator, local: F) -> bool
where
    F: FnOnce() -> bool,
{
    comm.any(local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::serial::SerialComm;
    use crate::comm::threaded::ThreadComm;

    #[test]
    fn consensus_is_true_when_any_rank_holds() {
        let results = ThreadComm::launch(4, |comm| consensus_any(comm, || comm.rank() == 2));
        assert_eq!(results, vec![true; 4]);
    }

    #[test]
    fn consensus_is_false_when_no_rank_holds() {
        let results = ThreadComm::launch(3, |comm| consensus_any(comm, || false));
        assert_eq!(results, vec![false; 3]);
        assert!(!consensus_any(&SerialComm::new(), || false));
        assert!(consensus_any(&SerialComm::new(), || true));
    }
}
