//! Command handlers for the `segwit-light` binary

pub mod commands;

pub use commands::{
    cmd_config, cmd_config_save, cmd_simulate, cmd_zone, simulate_offset, AppState, CliResult,
    SimulationRow, SIMULATION_OFFSETS,
};
