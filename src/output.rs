//! The module responsible for writing output data to disk.
use crate::demand::{DemandSeries, Requirements};
use crate::finance::CostBreakdown;
use crate::optimisation::convergence::LocalMinimum;
use crate::optimisation::cost::CostEvaluator;
use crate::optimisation::objective::EvaluationRecord;
use crate::optimisation::search::BestResult;
use crate::optimisation::{CapacityVector, SupplyTotals, aggregate_supply};
use crate::technology::{TechnologyID, TechnologyProfiles};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "greenopt_results";

/// The output file name for the best solution
pub const RESULTS_FILE_NAME: &str = "results.json";

/// The output file name for the hourly dispatch of the best solution
pub const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// Format of the timestamp in the names of the local minima and evaluation files
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Undersupply up to this proportion of a requirement still counts as meeting it.
///
/// The penalties leave the cheapest solution a hair short of any requirement it meets exactly.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Get the default output folder for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// A folder which already exists and isn't empty is only replaced if `allow_overwrite` is set.
///
/// # Returns
///
/// True if an existing folder was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The name of a timestamped output file, e.g. `local_minima_20250101_120000.csv`
pub fn timestamped_file_name(stem: &str, timestamp: &str) -> String {
    format!("{stem}_{timestamp}.csv")
}

/// One value per technology, as columns of a CSV file
#[derive(Serialize, Debug, PartialEq)]
struct TechnologyColumns {
    chp: f64,
    geothermal: f64,
    gshp: f64,
    solar: f64,
    waste_heat: f64,
    grid: f64,
    boiler: f64,
    co2_import: f64,
}

impl From<&CapacityVector> for TechnologyColumns {
    fn from(values: &CapacityVector) -> Self {
        let [chp, geothermal, gshp, solar, waste_heat, grid, boiler, co2_import] = values.0;

        Self {
            chp,
            geothermal,
            gshp,
            solar,
            waste_heat,
            grid,
            boiler,
            co2_import,
        }
    }
}

/// Represents a row of the local minima CSV file.
///
/// This will be written along with the capacity of each technology.
#[derive(Serialize, Debug, PartialEq)]
struct LocalMinimumRow {
    iteration: u64,
    cost: f64,
}

/// Represents a row of the evaluations CSV file.
///
/// This will be written along with the capacity of each technology, then each component of each
/// technology's cost.
#[derive(Serialize, Debug, PartialEq)]
struct EvaluationRow {
    evaluation: u64,
    heat_penalty: f64,
    light_penalty: f64,
    co2_penalty: f64,
    base_cost: f64,
    total: f64,
}

/// The header of the evaluations CSV file
fn evaluations_header() -> Vec<String> {
    let fixed = [
        "evaluation",
        "heat_penalty",
        "light_penalty",
        "co2_penalty",
        "base_cost",
        "total",
    ];
    let capacities = TechnologyID::iter().map(|id| id.to_string());
    let costs = TechnologyID::iter()
        .cartesian_product(CostBreakdown::COMPONENT_NAMES)
        .map(|(id, component)| format!("{id}_{component}"));

    fixed
        .into_iter()
        .map(String::from)
        .chain(capacities)
        .chain(costs)
        .collect()
}

/// Each component of each technology's cost, in header order.
///
/// The fields are left empty for an evaluation which couldn't be costed.
fn cost_columns(costs: &IndexMap<TechnologyID, CostBreakdown>) -> Vec<Option<f64>> {
    TechnologyID::iter()
        .flat_map(|id| match costs.get(&id) {
            Some(cost) => cost.components().map(|x| Some(x.value())),
            None => [None; CostBreakdown::COMPONENT_NAMES.len()],
        })
        .collect()
}

/// Represents a row of the dispatch CSV file.
///
/// This will be written along with the output of each technology in that hour.
#[derive(Serialize, Debug, PartialEq)]
struct DispatchRow {
    hour: u32,
}

/// For writing the search history to CSV files
pub struct DataWriter {
    local_minima_writer: csv::Writer<File>,
    evaluations_writer: csv::Writer<File>,
    dispatch_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `timestamp` - Included in the names of the history files
    /// * `save_debug_info` - Whether to write the hourly dispatch of the best solution
    pub fn create(output_path: &Path, timestamp: &str, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name: &str| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        let dispatch_writer = if save_debug_info {
            Some(new_writer(DISPATCH_FILE_NAME)?)
        } else {
            None
        };

        // The cost columns can't be named by serde, so this header is written by hand
        let file_path = output_path.join(timestamped_file_name("evaluations", timestamp));
        let mut evaluations_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))?;
        evaluations_writer.write_record(evaluations_header())?;

        Ok(Self {
            local_minima_writer: new_writer(&timestamped_file_name("local_minima", timestamp))?,
            evaluations_writer,
            dispatch_writer,
        })
    }

    /// Write local minima to a CSV file
    pub fn write_local_minima(&mut self, minima: &[LocalMinimum]) -> Result<()> {
        for minimum in minima {
            let row = LocalMinimumRow {
                iteration: minimum.iteration,
                cost: minimum.cost,
            };
            self.local_minima_writer
                .serialize((row, TechnologyColumns::from(&minimum.capacities)))?;
        }

        Ok(())
    }

    /// Write every evaluation of the objective to a CSV file
    pub fn write_evaluations(&mut self, evaluations: &[EvaluationRecord]) -> Result<()> {
        for record in evaluations {
            let row = EvaluationRow {
                evaluation: record.evaluation,
                heat_penalty: record.penalties.heat,
                light_penalty: record.penalties.light,
                co2_penalty: record.penalties.co2,
                base_cost: record.base_cost,
                total: record.total,
            };
            self.evaluations_writer.serialize((
                row,
                TechnologyColumns::from(&record.capacities),
                cost_columns(&record.costs),
            ))?;
        }

        Ok(())
    }

    /// Write the hourly output of each technology to a CSV file, if debug output is enabled
    pub fn write_dispatch(
        &mut self,
        demand: &DemandSeries,
        profiles: &TechnologyProfiles,
        capacities: &CapacityVector,
    ) -> Result<()> {
        let Some(wtr) = &mut self.dispatch_writer else {
            return Ok(());
        };

        let mut outputs: Vec<_> = capacities
            .iter()
            .map(|(id, capacity)| profiles[id].hourly_output(capacity))
            .collect();
        for &hour in &demand.hours {
            let mut hourly = CapacityVector::default();
            for (value, output) in hourly.0.iter_mut().zip(outputs.iter_mut()) {
                *value = output.next().unwrap_or_default();
            }
            wtr.serialize((DispatchRow { hour }, TechnologyColumns::from(&hourly)))?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.local_minima_writer.flush()?;
        self.evaluations_writer.flush()?;
        if let Some(wtr) = &mut self.dispatch_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

/// The contents of the results file
#[derive(Serialize, Debug)]
pub struct Results {
    /// Annual cost plus penalties of the best solution
    pub total_cost: f64,
    /// Annual cost of the best solution without penalties
    pub annual_cost: Option<f64>,
    /// Whether the best solution meets every peak demand
    pub feasible: bool,
    /// Whether the search converged
    pub converged: bool,
    /// Number of recorded evaluations of the objective
    pub evaluations: u64,
    /// Chosen capacity of each technology
    pub capacities: IndexMap<TechnologyID, f64>,
    /// Largest capacity the optimiser could have chosen
    pub upper_bounds: IndexMap<TechnologyID, f64>,
    /// Capacity needed by each technology to meet peak demand alone
    pub rated_powers: IndexMap<TechnologyID, f64>,
    /// Whether each technology was available to the optimiser
    pub enabled: IndexMap<TechnologyID, bool>,
    /// Annual cost of each technology. Empty if the best solution couldn't be costed.
    pub costs: IndexMap<TechnologyID, CostBreakdown>,
    /// Annual direct CO2 emissions of each technology (kg)
    pub emissions: IndexMap<TechnologyID, f64>,
    /// Annual CO2 emitted generating the grid electricity each technology uses (kg)
    pub related_emissions: IndexMap<TechnologyID, f64>,
    /// Peak supply of the best solution
    pub supply: SupplyTotals,
    /// Peak demand
    pub requirements: Requirements,
}

impl Results {
    /// Gather the results for the best solution
    pub fn new(
        best: &BestResult,
        profiles: &TechnologyProfiles,
        requirements: Requirements,
    ) -> Self {
        let supply = aggregate_supply(&best.capacities);
        let meets = |supplied: f64, required: f64| {
            supplied >= required * (1.0 - FEASIBILITY_TOLERANCE)
        };
        let feasible = meets(supply.heat, requirements.heat)
            && meets(supply.light, requirements.light)
            && meets(supply.co2, requirements.co2);
        let cost = CostEvaluator::new(profiles).evaluate(&best.capacities).ok();
        let per_technology = |f: &dyn Fn(TechnologyID, f64) -> f64| {
            best.capacities
                .iter()
                .map(|(id, capacity)| (id, f(id, capacity)))
                .collect::<IndexMap<_, _>>()
        };

        Self {
            total_cost: best.cost,
            annual_cost: cost.as_ref().map(|cost| cost.total.value()),
            feasible,
            converged: best.converged,
            evaluations: best.evaluations,
            capacities: best.capacities.to_map(),
            upper_bounds: per_technology(&|id, _| profiles[id].upper_bound),
            rated_powers: per_technology(&|id, _| profiles[id].rated_power),
            enabled: profiles.iter().map(|p| (p.id, p.enabled)).collect(),
            costs: cost.map(|cost| cost.breakdown).unwrap_or_default(),
            emissions: per_technology(&|id, capacity| {
                profiles[id]
                    .operation(capacity)
                    .map_or(0.0, |operation| operation.direct_emissions)
            }),
            related_emissions: per_technology(&|id, capacity| {
                profiles[id].related_emissions(capacity).unwrap_or(0.0)
            }),
            supply,
            requirements,
        }
    }
}

/// Write the results to a JSON file in the output folder
pub fn write_results(output_path: &Path, results: &Results) -> Result<()> {
    let file_path = output_path.join(RESULTS_FILE_NAME);
    let json = serde_json::to_string_pretty(results)?;
    fs::write(&file_path, json)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{demand, profiles};
    use crate::optimisation::objective::Penalties;
    use crate::units::Money;
    use rstest::rstest;
    use tempfile::tempdir;

    const TIMESTAMP: &str = "20250101_120000";

    fn capacities() -> CapacityVector {
        CapacityVector([1.0, 2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 4.0])
    }

    /// Read a CSV file into a header and rows of strings
    fn read_csv_file(file_path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(file_path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|record| record.unwrap().iter().map(String::from).collect())
            .collect();

        (header, rows)
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");

        // New folder
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing empty folder
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Existing non-empty folder
        fs::write(output_dir.join("file.txt"), "").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("file.txt").exists());
    }

    #[test]
    fn test_write_local_minima() {
        let dir = tempdir().unwrap();
        let minimum = LocalMinimum {
            iteration: 7,
            cost: 1234.5,
            capacities: capacities(),
        };
        {
            let mut writer = DataWriter::create(dir.path(), TIMESTAMP, false).unwrap();
            writer.write_local_minima(&[minimum]).unwrap();
            writer.flush().unwrap();
        }

        let (header, rows) = read_csv_file(&dir.path().join("local_minima_20250101_120000.csv"));
        assert_eq!(
            header,
            [
                "iteration",
                "cost",
                "chp",
                "geothermal",
                "gshp",
                "solar",
                "waste_heat",
                "grid",
                "boiler",
                "co2_import"
            ]
        );
        assert_eq!(
            rows,
            [["7", "1234.5", "1.0", "2.0", "0.0", "0.0", "0.0", "3.0", "0.0", "4.0"]]
        );
        assert!(!dir.path().join(DISPATCH_FILE_NAME).exists());
    }

    #[test]
    fn test_write_evaluations() {
        let dir = tempdir().unwrap();
        let chp_cost = CostBreakdown {
            capex: Money(1.0),
            opex: Money(2.0),
            fuel: Money(3.0),
            co2_tax: Money(4.0),
            total: Money(10.0),
        };
        let costed = EvaluationRecord {
            evaluation: 3,
            capacities: capacities(),
            penalties: Penalties {
                heat: 1.0,
                light: 0.0,
                co2: 2.0,
            },
            costs: TechnologyID::iter()
                .map(|id| (id, CostBreakdown::default()))
                .chain([(TechnologyID::Chp, chp_cost)])
                .collect(),
            base_cost: 10.0,
            total: 13.0,
        };
        let uncosted = EvaluationRecord {
            evaluation: 4,
            costs: IndexMap::new(),
            ..costed.clone()
        };
        {
            let mut writer = DataWriter::create(dir.path(), TIMESTAMP, false).unwrap();
            writer.write_evaluations(&[costed, uncosted]).unwrap();
            writer.flush().unwrap();
        }

        let (header, rows) = read_csv_file(&dir.path().join("evaluations_20250101_120000.csv"));
        assert_eq!(header.len(), 6 + 8 + 8 * 5);
        assert_eq!(
            header[..7],
            [
                "evaluation",
                "heat_penalty",
                "light_penalty",
                "co2_penalty",
                "base_cost",
                "total",
                "chp"
            ]
        );
        assert_eq!(
            header[14..20],
            [
                "chp_capex",
                "chp_opex",
                "chp_fuel",
                "chp_co2_tax",
                "chp_total",
                "geothermal_capex"
            ]
        );
        assert_eq!(header.last().unwrap(), "co2_import_total");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][..6], ["3", "1.0", "0.0", "2.0", "10.0", "13.0"]);
        assert_eq!(rows[0][11], "3.0");
        assert_eq!(rows[0][14..20], ["1.0", "2.0", "3.0", "4.0", "10.0", "0.0"]);

        // No costs are written when the evaluation couldn't be costed
        assert_eq!(rows[1][0], "4");
        assert_eq!(rows[1].len(), header.len());
        assert!(rows[1][14..].iter().all(String::is_empty));
    }

    #[rstest]
    fn test_write_dispatch(demand: DemandSeries, profiles: TechnologyProfiles) {
        let dir = tempdir().unwrap();
        let grid = profiles[TechnologyID::Grid].rated_power;
        let capacities: CapacityVector = [(TechnologyID::Grid, grid)].into_iter().collect();
        {
            let mut writer = DataWriter::create(dir.path(), TIMESTAMP, true).unwrap();
            writer
                .write_dispatch(&demand, &profiles, &capacities)
                .unwrap();
            writer.flush().unwrap();
        }

        let (header, rows) = read_csv_file(&dir.path().join(DISPATCH_FILE_NAME));
        assert_eq!(header[..3], ["hour", "chp", "geothermal"]);
        assert_eq!(rows.len(), demand.len());
        for ((row, hour), light) in rows.iter().zip(&demand.hours).zip(&demand.light) {
            assert_eq!(row[0], hour.to_string());
            assert_eq!(row[1], "0.0");
            let grid: f64 = row[6].parse().unwrap();
            assert!((grid - light).abs() < 1e-9, "hour {hour}");
        }
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(1.0 - 1e-9, true)]
    #[case(0.99, false)]
    fn test_results_feasible(
        demand: DemandSeries,
        profiles: TechnologyProfiles,
        #[case] fraction: f64,
        #[case] expected: bool,
    ) {
        let requirements = demand.requirements();
        let capacities: CapacityVector = [
            (TechnologyID::Geothermal, requirements.heat * fraction),
            (TechnologyID::Grid, requirements.light),
            (TechnologyID::Co2Import, requirements.co2),
        ]
        .into_iter()
        .collect();
        let best = BestResult {
            capacities,
            cost: 1e6,
            converged: true,
            evaluations: 1,
        };
        assert_eq!(Results::new(&best, &profiles, requirements).feasible, expected);
    }

    #[rstest]
    fn test_write_results(demand: DemandSeries, profiles: TechnologyProfiles) {
        let requirements = demand.requirements();
        let capacities: CapacityVector = [
            TechnologyID::Geothermal,
            TechnologyID::Grid,
            TechnologyID::Co2Import,
        ]
        .into_iter()
        .map(|id| (id, profiles[id].upper_bound))
        .collect();
        let best = BestResult {
            capacities,
            cost: 1e6,
            converged: false,
            evaluations: 10,
        };
        let results = Results::new(&best, &profiles, requirements);
        assert!(results.feasible);
        assert!(results.annual_cost.is_some());
        assert_eq!(results.costs.len(), 8);

        let dir = tempdir().unwrap();
        write_results(dir.path(), &results).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(RESULTS_FILE_NAME)).unwrap())
                .unwrap();
        assert_eq!(json["capacities"]["grid"], profiles[TechnologyID::Grid].upper_bound);
        assert_eq!(json["capacities"]["chp"], 0.0);
        assert_eq!(json["enabled"]["waste_heat"], true);
        assert_eq!(json["evaluations"], 10);
        assert!(json["costs"]["geothermal"]["capex"].as_f64().unwrap() > 0.0);
        assert!(json["related_emissions"]["grid"].as_f64().unwrap() > 0.0);
        assert_eq!(json["related_emissions"]["co2_import"], 0.0);
    }
}
