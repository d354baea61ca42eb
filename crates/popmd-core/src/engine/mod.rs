//! # Engine Module
//!
//! The population algorithms. Each stage works on one rank's share of the simulation
//! domain and synchronizes with the other ranks only through the collectives of
//! [`crate::comm::Communicator`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Placement style, entity kind, units, subset and filters
//! - **Run Context** ([`context`]) - Communicator, domain, lattice and progress for one run
//! - **Candidate Filtering** ([`filter`]) - Region and expression tests on candidate positions
//! - **Lattice Enumeration** ([`enumerate`]) - One walk over the local lattice sites with
//!   pluggable count and insert visitors
//! - **Subset Selection** ([`subset`]) - Exact random subsets of the global lattice sites
//! - **Rejection Sampling** ([`sampler`]) - Synchronized random draws with cross-rank overlap
//!   consensus
//! - **Insertion** ([`dispatch`]) - Creating atoms and stamping rotated molecule templates
//! - **Topology Stitching** ([`stitch`]) - Global molecule IDs and bonded references
//! - **Migration** ([`migrate`]) - Moving atoms to the rank that owns their position
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod context;
pub mod dispatch;
pub mod enumerate;
pub mod error;
pub mod filter;
pub mod migrate;
pub mod progress;
pub mod sampler;
pub mod stitch;
pub mod subset;
