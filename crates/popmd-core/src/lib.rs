//! # popmd Core Library
//!
//! A parallel particle-population engine: it creates atoms, or rigid molecules stamped
//! from a template, at a single point, on every site of a periodic lattice, or at
//! rejection-sampled random positions, across a simulation domain that is split into
//! sub-boxes owned by cooperating ranks.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered architecture so that every piece can be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ParticleStore`, `MoleculeTemplate`),
//!   simulation box and lattice geometry, regions, the expression filter interface and the
//!   seeded random source.
//!
//! - **[`comm`]: The Collective Layer.** The `Communicator` trait that every rank calls in
//!   lock-step (sums, maxima, logical OR, prefix sums, atom exchange), with a serial and an
//!   in-process threaded implementation.
//!
//! - **[`engine`]: The Logic Core.** Lattice enumeration, rejection sampling with cross-rank
//!   overlap consensus, subset selection, insertion, topology stitching and migration.
//!
//! - **[`workflows`]: The Public API.** The `populate` workflow ties the engine together and is
//!   the single entry point for callers.

pub mod comm;
pub mod core;
pub mod engine;
pub mod workflows;
