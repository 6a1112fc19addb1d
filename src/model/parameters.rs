//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{input_err_msg, read_toml};
use crate::optimisation::PenaltyWeights;
use crate::optimisation::annealing::AnnealingOptions;
use crate::technology::TechnologyID;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_demand_file, String, "demand.csv".into());
define_param_default!(default_capacity_margin, f64, 0.0);
define_param_default!(default_max_iterations, u32, 50);
define_param_default!(default_initial_temperature, f64, 500.0);
define_param_default!(default_restart_temperature_ratio, f64, 2e-5);
define_param_default!(default_visit, f64, 1.01);
define_param_default!(default_accept, f64, -5.0);
define_param_default!(default_seed, u64, 42);
define_param_default!(default_max_evaluations, u64, 10_000_000);
define_param_default!(default_convergence_window, usize, 100);
define_param_default!(default_improvement_threshold, f64, 1e-4);
define_param_default!(default_heat_penalty_weight, f64, 1e12);
define_param_default!(default_light_penalty_weight, f64, 1e12);
define_param_default!(default_co2_penalty_weight, f64, 1e10);

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Name of the CSV file containing hourly demand, relative to the model folder
    #[serde(default = "default_demand_file")]
    pub demand_file: String,
    /// Technologies which the optimiser may not use
    #[serde(default)]
    pub disabled_technologies: Vec<TechnologyID>,
    /// How far beyond its rated power each technology may be sized, as a proportion
    #[serde(default = "default_capacity_margin")]
    pub capacity_margin: f64,
    /// Number of annealing iterations per starting point
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Starting temperature for annealing
    #[serde(default = "default_initial_temperature")]
    pub initial_temperature: f64,
    /// The annealer restarts from a random point when the temperature falls below this
    /// proportion of the initial temperature
    #[serde(default = "default_restart_temperature_ratio")]
    pub restart_temperature_ratio: f64,
    /// Parameter of the visiting distribution. Higher values give a heavier tail.
    #[serde(default = "default_visit")]
    pub visit: f64,
    /// Parameter of the acceptance distribution. Lower values make uphill moves less likely.
    #[serde(default = "default_accept")]
    pub accept: f64,
    /// Seed for the first annealing run. Subsequent runs use consecutive seeds.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Maximum number of objective evaluations in a single annealing run
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: u64,
    /// Number of consecutive local minima considered when checking for convergence
    #[serde(default = "default_convergence_window")]
    pub convergence_window: usize,
    /// The search has converged when the relative improvement across the convergence window
    /// falls below this value
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f64,
    /// Penalty per MW squared of unmet peak heat demand
    #[serde(default = "default_heat_penalty_weight")]
    pub heat_penalty_weight: f64,
    /// Penalty per MW squared of unmet peak light demand
    #[serde(default = "default_light_penalty_weight")]
    pub light_penalty_weight: f64,
    /// Penalty per (kg/h) squared of unmet peak CO2 demand
    #[serde(default = "default_co2_penalty_weight")]
    pub co2_penalty_weight: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            demand_file: default_demand_file(),
            disabled_technologies: Vec::new(),
            capacity_margin: default_capacity_margin(),
            max_iterations: default_max_iterations(),
            initial_temperature: default_initial_temperature(),
            restart_temperature_ratio: default_restart_temperature_ratio(),
            visit: default_visit(),
            accept: default_accept(),
            seed: default_seed(),
            max_evaluations: default_max_evaluations(),
            convergence_window: default_convergence_window(),
            improvement_threshold: default_improvement_threshold(),
            heat_penalty_weight: default_heat_penalty_weight(),
            light_penalty_weight: default_light_penalty_weight(),
            co2_penalty_weight: default_co2_penalty_weight(),
        }
    }
}

/// Check that the `capacity_margin` parameter is valid
fn check_capacity_margin(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "capacity_margin must be a finite number greater than or equal to zero"
    );

    Ok(())
}

/// Check that the `initial_temperature` parameter is valid
fn check_initial_temperature(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "initial_temperature must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `restart_temperature_ratio` parameter is valid
fn check_restart_temperature_ratio(value: f64) -> Result<()> {
    ensure!(
        value > 0.0 && value < 1.0,
        "restart_temperature_ratio must be between 0 and 1 (exclusive)"
    );

    Ok(())
}

/// Check that the `visit` parameter is valid
fn check_visit(value: f64) -> Result<()> {
    ensure!(
        value > 1.0 && value <= 3.0,
        "visit must be greater than 1 and no greater than 3"
    );

    Ok(())
}

/// Check that the `accept` parameter is valid
fn check_accept(value: f64) -> Result<()> {
    ensure!(
        value > -1e4 && value <= -5.0,
        "accept must be greater than -10000 and no greater than -5"
    );

    Ok(())
}

/// Check that the `convergence_window` parameter is valid
fn check_convergence_window(value: usize) -> Result<()> {
    ensure!(value >= 2, "convergence_window must be at least 2");

    Ok(())
}

/// Check that the `improvement_threshold` parameter is valid
fn check_improvement_threshold(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "improvement_threshold must be a finite number greater than or equal to zero"
    );

    Ok(())
}

/// Check that a penalty weight is valid
fn check_penalty_weight(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite number greater than zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_capacity_margin(self.capacity_margin)?;
        ensure!(self.max_iterations > 0, "max_iterations cannot be zero");
        check_initial_temperature(self.initial_temperature)?;
        check_restart_temperature_ratio(self.restart_temperature_ratio)?;
        check_visit(self.visit)?;
        check_accept(self.accept)?;
        ensure!(self.max_evaluations > 0, "max_evaluations cannot be zero");
        check_convergence_window(self.convergence_window)?;
        check_improvement_threshold(self.improvement_threshold)?;
        check_penalty_weight("heat_penalty_weight", self.heat_penalty_weight)?;
        check_penalty_weight("light_penalty_weight", self.light_penalty_weight)?;
        check_penalty_weight("co2_penalty_weight", self.co2_penalty_weight)?;

        Ok(())
    }

    /// Options for each annealing run
    pub fn annealing_options(&self) -> AnnealingOptions {
        AnnealingOptions {
            max_iterations: self.max_iterations,
            initial_temperature: self.initial_temperature,
            restart_temperature_ratio: self.restart_temperature_ratio,
            visit: self.visit,
            accept: self.accept,
            max_evaluations: self.max_evaluations,
        }
    }

    /// Weights for the undersupply penalties
    pub fn penalty_weights(&self) -> PenaltyWeights {
        PenaltyWeights {
            heat: self.heat_penalty_weight,
            light: self.light_penalty_weight,
            co2: self.co2_penalty_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fmt::Display;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Helper function to assert validation result based on expected validity
    fn assert_validation_result<T, U: Display>(
        result: Result<T>,
        expected_valid: bool,
        value: U,
        expected_error_fragment: &str,
    ) {
        if expected_valid {
            assert!(
                result.is_ok(),
                "Expected value {} to be valid, but got error: {:?}",
                value,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Expected value {value} to be invalid, but it was accepted",
            );
            let error_message = result.err().unwrap().to_string();
            assert!(
                error_message.contains(expected_error_fragment),
                "Error message should mention the validation constraint, got: {error_message}",
            );
        }
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "disabled_technologies = [\"solar\", \"co2_import\"]\nseed = 7"
            )
            .unwrap();
        }

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            model_params.disabled_technologies,
            [TechnologyID::Solar, TechnologyID::Co2Import]
        );
        assert_eq!(model_params.seed, 7);
        assert_eq!(model_params.max_iterations, 50);
        assert_eq!(model_params.demand_file, "demand.csv");
        assert_eq!(model_params.capacity_margin, 0.0);
    }

    #[test]
    fn test_model_params_from_path_empty_file() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
        assert_eq!(
            ModelParameters::from_path(dir.path()).unwrap(),
            ModelParameters::default()
        );
    }

    #[test]
    fn test_model_params_from_path_unknown_technology() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "disabled_technologies = [\"nuclear\"]").unwrap();
        }
        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_default_parameters_are_valid() {
        assert!(ModelParameters::default().validate().is_ok());
    }

    #[rstest]
    #[case(0.0, true)] // Default
    #[case(0.1, true)]
    #[case(2.0, true)]
    #[case(-0.1, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_capacity_margin(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_capacity_margin(value),
            expected_valid,
            value,
            "capacity_margin must be a finite number greater than or equal to zero",
        );
    }

    #[rstest]
    #[case(1.01, true)] // Default
    #[case(2.62, true)]
    #[case(3.0, true)]
    #[case(1.0, false)]
    #[case(3.5, false)]
    #[case(f64::NAN, false)]
    fn test_check_visit(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_visit(value),
            expected_valid,
            value,
            "visit must be greater than 1 and no greater than 3",
        );
    }

    #[rstest]
    #[case(-5.0, true)] // Default
    #[case(-100.0, true)]
    #[case(-4.0, false)]
    #[case(-1e4, false)]
    #[case(f64::NAN, false)]
    fn test_check_accept(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_accept(value),
            expected_valid,
            value,
            "accept must be greater than -10000 and no greater than -5",
        );
    }

    #[rstest]
    #[case(2e-5, true)] // Default
    #[case(0.5, true)]
    #[case(0.0, false)]
    #[case(1.0, false)]
    fn test_check_restart_temperature_ratio(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_restart_temperature_ratio(value),
            expected_valid,
            value,
            "restart_temperature_ratio must be between 0 and 1 (exclusive)",
        );
    }

    #[rstest]
    #[case(2, true)]
    #[case(100, true)] // Default
    #[case(1, false)]
    #[case(0, false)]
    fn test_check_convergence_window(#[case] value: usize, #[case] expected_valid: bool) {
        assert_validation_result(
            check_convergence_window(value),
            expected_valid,
            value,
            "convergence_window must be at least 2",
        );
    }

    #[rstest]
    #[case(1e12, true)] // Default
    #[case(1.0, true)]
    #[case(0.0, false)]
    #[case(-1.0, false)]
    #[case(f64::INFINITY, false)]
    fn test_check_penalty_weight(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_penalty_weight("heat_penalty_weight", value),
            expected_valid,
            value,
            "heat_penalty_weight must be a finite number greater than zero",
        );
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(1e-4, true)] // Default
    #[case(-1e-4, false)]
    #[case(f64::NAN, false)]
    fn test_check_improvement_threshold(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_improvement_threshold(value),
            expected_valid,
            value,
            "improvement_threshold must be a finite number greater than or equal to zero",
        );
    }

    #[test]
    fn test_check_initial_temperature() {
        assert!(check_initial_temperature(500.0).is_ok());
        assert!(check_initial_temperature(0.0).is_err());
        assert!(check_initial_temperature(f64::INFINITY).is_err());
    }
}
