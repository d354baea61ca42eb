//! # Core Models Module
//!
//! Data structures for the particles the engine creates and the templates it stamps.
//!
//! ## Key Components
//!
//! - [`atom`] - A single particle record with its type, position, image flags and bonded data
//! - [`store`] - The per-rank growable particle container and the global counters
//! - [`template`] - Immutable molecule prototypes with offsets, types and topology
//! - [`topology`] - Bond, angle, dihedral, improper and special-neighbor references
//! - [`ids`] - Global identifier types
//!
//! ## Usage
//!
//! ```ignore
//! use popmd::core::models::store::{AtomStyle, ParticleStore};
//! use nalgebra::Point3;
//!
//! let mut store = ParticleStore::new(2, AtomStyle::default());
//! store.create_atom(1, Point3::new(0.0, 0.0, 0.0));
//! ```

pub mod atom;
pub mod ids;
pub mod store;
pub mod template;
pub mod topology;
