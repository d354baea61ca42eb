//! # Core Module
//!
//! Stateless building blocks the population engine works with: the particle data model,
//! box and lattice geometry, the seeded random source, and the expression filter
//! interface.

pub mod expression;
pub mod geometry;
pub mod models;
pub mod random;
