//! Common functionality for greenopt.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod demand;
pub mod finance;
pub mod input;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod settings;
pub mod technology;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the path to the folder where greenopt's program settings are stored
pub fn get_greenopt_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("greenopt");

    path
}
