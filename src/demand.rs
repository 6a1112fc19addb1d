//! Code for working with the greenhouse's hourly demand for heat, light and CO2.
use crate::input::{input_err_msg, read_csv};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The number of hours in a (non-leap) year
pub const HOURS_PER_YEAR: usize = 8760;

/// A row of the demand CSV file
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct DemandRow {
    hour: u32,
    heat: f64,
    light: f64,
    co2: f64,
}

/// Hourly demand for heat (MWh), light (MWh of electricity) and CO2 (kg)
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    /// The hour each entry refers to
    pub hours: Vec<u32>,
    /// Heat demand
    pub heat: Vec<f64>,
    /// Electricity demand for lighting
    pub light: Vec<f64>,
    /// CO2 demand
    pub co2: Vec<f64>,
}

/// The peak demand which the supply portfolio has to meet
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Requirements {
    /// Peak heat demand (MW)
    pub heat: f64,
    /// Peak light demand (MW)
    pub light: f64,
    /// Peak CO2 demand (kg/h)
    pub co2: f64,
}

/// Check that every value in a series is finite and not negative
fn check_series(name: &str, values: &[f64]) -> Result<()> {
    for (i, value) in values.iter().enumerate() {
        ensure!(
            value.is_finite() && *value >= 0.0,
            "Invalid {name} demand at row {i}: {value} (must be a finite number >= 0)"
        );
    }

    Ok(())
}

impl DemandSeries {
    /// Create a new demand series, checking that it is valid
    pub fn new(hours: Vec<u32>, heat: Vec<f64>, light: Vec<f64>, co2: Vec<f64>) -> Result<Self> {
        ensure!(!hours.is_empty(), "Demand series cannot be empty");
        ensure!(
            heat.len() == hours.len() && light.len() == hours.len() && co2.len() == hours.len(),
            "Heat, light and CO2 demand must cover the same hours"
        );
        ensure!(
            hours.windows(2).all(|w| w[0] < w[1]),
            "Hours must be in strictly increasing order"
        );
        check_series("heat", &heat)?;
        check_series("light", &light)?;
        check_series("CO2", &co2)?;

        Ok(Self {
            hours,
            heat,
            light,
            co2,
        })
    }

    /// The number of hours covered
    pub fn len(&self) -> usize {
        self.hours.len()
    }

    /// Whether the series covers no hours (never true for a validated series)
    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// The peak of each demand series
    pub fn requirements(&self) -> Requirements {
        let peak = |values: &[f64]| values.iter().copied().fold(0.0, f64::max);
        Requirements {
            heat: peak(&self.heat),
            light: peak(&self.light),
            co2: peak(&self.co2),
        }
    }
}

/// Read the demand series from the specified CSV file
pub fn read_demand(file_path: &Path) -> Result<DemandSeries> {
    let rows = read_csv(file_path)?;
    let demand = read_demand_from_iter(rows).with_context(|| input_err_msg(file_path))?;

    if demand.len() != HOURS_PER_YEAR {
        warn!(
            "Demand file {} covers {} hours rather than a full year ({HOURS_PER_YEAR} hours). \
            Annual costs will be calculated over the hours given.",
            file_path.display(),
            demand.len()
        );
    }

    Ok(demand)
}

fn read_demand_from_iter<I>(iter: I) -> Result<DemandSeries>
where
    I: Iterator<Item = DemandRow>,
{
    let (mut hours, mut heat, mut light, mut co2) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for row in iter {
        hours.push(row.hour);
        heat.push(row.heat);
        light.push(row.light);
        co2.push(row.co2);
    }

    DemandSeries::new(hours, heat, light, co2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn row(hour: u32, heat: f64, light: f64, co2: f64) -> DemandRow {
        DemandRow {
            hour,
            heat,
            light,
            co2,
        }
    }

    #[test]
    fn test_read_demand_from_iter() {
        let demand = read_demand_from_iter(
            [row(0, 1.0, 2.0, 30.0), row(1, 4.0, 0.5, 10.0)].into_iter(),
        )
        .unwrap();
        assert_eq!(demand.len(), 2);
        assert_eq!(demand.heat, [1.0, 4.0]);
        assert_eq!(
            demand.requirements(),
            Requirements {
                heat: 4.0,
                light: 2.0,
                co2: 30.0
            }
        );
    }

    #[test]
    fn test_read_demand_from_iter_bad_order() {
        assert_error!(
            read_demand_from_iter([row(1, 1.0, 1.0, 1.0), row(1, 1.0, 1.0, 1.0)].into_iter()),
            "Hours must be in strictly increasing order"
        );
    }

    #[test]
    fn test_read_demand_from_iter_negative() {
        assert_error!(
            read_demand_from_iter([row(0, 1.0, -1.0, 1.0)].into_iter()),
            "Invalid light demand at row 0: -1 (must be a finite number >= 0)"
        );
    }

    #[test]
    fn test_demand_series_mismatched_lengths() {
        assert!(DemandSeries::new(vec![0, 1], vec![1.0], vec![1.0, 1.0], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_read_demand() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("demand.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "hour,heat,light,co2\n0,1.5,0.5,20\n1,2.5,0.0,25").unwrap();
        }

        let demand = read_demand(&file_path).unwrap();
        assert_eq!(demand.hours, [0, 1]);
        assert_eq!(demand.co2, [20.0, 25.0]);
    }
}
