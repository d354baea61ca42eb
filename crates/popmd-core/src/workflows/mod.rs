//! # Workflows Module
//!
//! High-level entry points that run the engine stages in order.
//!
//! - **Populate Workflow** ([`populate`]) - Creates atoms or molecules at a point, on a
//!   lattice, or at random positions, then assigns IDs, stitches topology and migrates.

pub mod populate;
