use super::Communicator;
use crate::core::models::atom::Atom;

/// A group of exactly one rank.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl SerialComm {
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn sum_i64(&self, value: i64) -> i64 {
        value
    }

    fn max_i64(&self, value: i64) -> i64 {
        value
    }

    fn any(&self, flag: bool) -> bool {
        flag
    }

    fn exclusive_scan_i64(&self, _value: i64) -> i64 {
        0
    }

    fn exchange(&self, outgoing: Vec<Vec<Atom>>) -> Vec<Atom> {
        outgoing.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn collectives_are_identities() {
        let comm = SerialComm::new();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert!(comm.is_root());
        assert_eq!(comm.sum_i64(5), 5);
        assert_eq!(comm.max_i64(-3), -3);
        assert_eq!(comm.exclusive_scan_i64(9), 0);
        assert!(comm.any(true));
    }

    #[test]
    fn exchange_returns_the_outgoing_atoms() {
        let comm = SerialComm::new();
        let atoms = vec![Atom::new(1, Point3::origin()), Atom::new(2, Point3::origin())];
        let received = comm.exchange(vec![atoms.clone()]);
        assert_eq!(received, atoms);
    }
}
