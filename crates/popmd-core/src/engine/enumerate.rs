//! Enumeration of lattice sites owned by one rank.
//!
//! A walk visits every lattice site whose cell lies in an [`IndexBox`], in a fixed order:
//! cell index along the third lattice axis outermost, then the second, then the first, and
//! basis points innermost. Sites rejected by the candidate filter or owned by another rank
//! are skipped; every accepted site is handed to a [`SiteVisitor`] together with its
//! sequence number among accepted sites. Because the order is fixed, two walks over the
//! same inputs assign the same sequence numbers to the same sites, which is what lets a
//! counting pass size the subset flags consumed by a later inserting pass.

use super::dispatch::Dispatcher;
use super::error::PopulateError;
use super::filter::CandidateFilter;
use super::progress::ProgressReporter;
use crate::core::geometry::Aabb;
use crate::core::geometry::domain::SimulationBox;
use crate::core::geometry::lattice::Lattice;
use crate::core::geometry::region::Region;
use crate::core::geometry::subbox::SubBox;
use crate::core::models::store::ParticleStore;
use nalgebra::Point3;

/// Accepted-site count at which a rank's lattice count is considered overflowed.
pub const SITE_COUNT_LIMIT: usize = i32::MAX as usize;

/// Inclusive range of unit-cell indices to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBox {
    pub lo: [i64; 3],
    pub hi: [i64; 3],
}

impl IndexBox {
    /// Cells covering a box given in lattice coordinates.
    ///
    /// Bounds are truncated toward zero and widened by one cell each way. A negative
    /// minimum is widened once more, since truncation rounds it up.
    pub fn covering(bounds: &Aabb) -> Self {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        for axis in 0..3 {
            lo[axis] = bounds.min[axis].trunc() as i64 - 1;
            hi[axis] = bounds.max[axis].trunc() as i64 + 1;
            if bounds.min[axis] < 0.0 {
                lo[axis] -= 1;
            }
        }
        Self { lo, hi }
    }

    /// Number of cells in the box.
    pub fn cell_count(&self) -> u64 {
        (0..3)
            .map(|axis| (self.hi[axis] - self.lo[axis] + 1).max(0) as u64)
            .product()
    }
}

/// Real-space box a rank searches for lattice sites.
///
/// This is the rank's sub-box (its real bounding box for sheared boxes), narrowed towards
/// the region's extent when a bounded region restricts placement.
pub fn search_bounds(sub_box: &SubBox, region: Option<&dyn Region>) -> Aabb {
    let bounds = *sub_box.real_bounds();
    match region.and_then(|r| r.extent()) {
        Some(extent) => bounds.narrow_to(&extent),
        None => bounds,
    }
}

/// Position of a walk among accepted sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationCursor {
    sequence: usize,
    overflow: bool,
}

impl EnumerationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of sites accepted so far, which is also the index of the next one.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn flag_overflow(&mut self) {
        self.overflow = true;
    }

    fn advance(&mut self) {
        self.sequence += 1;
    }
}

/// A lattice site that passed every test on this rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeSite {
    pub cell: [i64; 3],
    pub basis: usize,
    pub position: Point3<f64>,
}

/// Action performed on each accepted site.
pub trait SiteVisitor {
    fn visit(
        &mut self,
        site: &LatticeSite,
        cursor: &mut EnumerationCursor,
    ) -> Result<(), PopulateError>;
}

/// Counts accepted sites and flags an overflow at [`SITE_COUNT_LIMIT`].
#[derive(Debug, Default)]
pub struct SiteCounter;

impl SiteVisitor for SiteCounter {
    fn visit(
        &mut self,
        _site: &LatticeSite,
        cursor: &mut EnumerationCursor,
    ) -> Result<(), PopulateError> {
        if cursor.sequence() == SITE_COUNT_LIMIT {
            cursor.flag_overflow();
        }
        Ok(())
    }
}

/// Creates an entity at every accepted site.
pub struct InsertAll<'d, 'a> {
    pub dispatcher: &'d mut Dispatcher<'a>,
    pub store: &'d mut ParticleStore,
}

impl SiteVisitor for InsertAll<'_, '_> {
    fn visit(
        &mut self,
        site: &LatticeSite,
        _cursor: &mut EnumerationCursor,
    ) -> Result<(), PopulateError> {
        self.dispatcher
            .place_at_site(self.store, &site.position, site.basis);
        Ok(())
    }
}

/// Creates an entity only at sites whose sequence number is flagged.
pub struct InsertSelected<'d, 'a> {
    pub dispatcher: &'d mut Dispatcher<'a>,
    pub store: &'d mut ParticleStore,
    pub flags: &'d [bool],
}

impl SiteVisitor for InsertSelected<'_, '_> {
    fn visit(
        &mut self,
        site: &LatticeSite,
        cursor: &mut EnumerationCursor,
    ) -> Result<(), PopulateError> {
        if self.flags.get(cursor.sequence()).copied().unwrap_or(false) {
            self.dispatcher
                .place_at_site(self.store, &site.position, site.basis);
        }
        Ok(())
    }
}

/// The fixed inputs of a lattice walk on one rank.
pub struct LatticeWalk<'a> {
    pub lattice: &'a Lattice,
    pub domain: &'a SimulationBox,
    pub sub_box: &'a SubBox,
    pub cells: IndexBox,
    reporter: Option<&'a ProgressReporter<'a>>,
}

impl<'a> LatticeWalk<'a> {
    pub fn new(
        lattice: &'a Lattice,
        domain: &'a SimulationBox,
        sub_box: &'a SubBox,
        region: Option<&dyn Region>,
    ) -> Self {
        let bounds = search_bounds(sub_box, region);
        let cells = IndexBox::covering(&lattice.lattice_bounds_of(&bounds));
        Self {
            lattice,
            domain,
            sub_box,
            cells,
            reporter: None,
        }
    }

    /// Reports each walk as a task with one step per plane of cells along the third axis.
    pub fn reporting(mut self, reporter: &'a ProgressReporter<'a>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Walks every site, resetting `cursor` first, and returns the number accepted.
    pub fn run<V: SiteVisitor>(
        &self,
        filter: &mut CandidateFilter<'_>,
        cursor: &mut EnumerationCursor,
        visitor: &mut V,
    ) -> Result<usize, PopulateError> {
        cursor.reset();
        let IndexBox { lo, hi } = self.cells;
        let nbasis = self.lattice.basis_len();
        let task = self
            .reporter
            .map(|r| r.task((hi[2] - lo[2] + 1).max(0) as u64));

        for k in lo[2]..=hi[2] {
            for j in lo[1]..=hi[1] {
                for i in lo[0]..=hi[0] {
                    for basis in 0..nbasis {
                        let cell = [i, j, k];
                        let position = self.lattice.site(cell, basis);
                        if !filter.accepts(&position)? {
                            continue;
                        }
                        if !self.sub_box.owns_position(self.domain, &position) {
                            continue;
                        }
                        let site = LatticeSite {
                            cell,
                            basis,
                            position,
                        };
                        visitor.visit(&site, cursor)?;
                        cursor.advance();
                    }
                }
            }
            if let Some(task) = &task {
                task.advance(1);
            }
        }
        Ok(cursor.sequence())
    }
}
