use popmd::engine::config::{DEFAULT_LOAD_BALANCE_FACTOR, DEFAULT_MAX_TRIES};

pub struct DefaultsConfig {
    pub ranks: usize,
    pub dimension: u8,
    pub periodic: [bool; 3],
    pub lattice_scale: f64,
    pub atom_types: u32,
    pub max_tries: usize,
    pub load_balance_factor: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ranks: 1,
            dimension: 3,
            periodic: [true; 3],
            lattice_scale: 1.0,
            atom_types: 1,
            max_tries: DEFAULT_MAX_TRIES,
            load_balance_factor: DEFAULT_LOAD_BALANCE_FACTOR,
        }
    }
}
