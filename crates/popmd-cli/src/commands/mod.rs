pub mod lattices;
pub mod populate;
