//! The model represents the static input data provided by the user.
use crate::demand::DemandSeries;
use crate::technology::TechnologyProfiles;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Hourly demand for heat, light and CO2
    pub demand: DemandSeries,
}

impl Model {
    /// Compute the capability profile of every technology for this model's demand
    pub fn technology_profiles(&self) -> TechnologyProfiles {
        TechnologyProfiles::new(
            &self.demand,
            &self.parameters.disabled_technologies,
            self.parameters.capacity_margin,
        )
    }
}
