// Library exports for power-automaton
// This allows the headless binary and main binary to use the modules

pub mod power;
pub mod grid;
pub mod mutation;
pub mod fight;
pub mod config;
pub mod simulation;
pub mod ticker;
pub mod diagnostics;
pub mod ui;
pub mod debug;
