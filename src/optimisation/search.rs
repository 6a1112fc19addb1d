//! Multi-start global search over capacity vectors.
//!
//! The annealer is run once from each of a set of hand-picked starting mixes. All runs share the
//! same [`PenalisedObjective`], so the best solution seen in any run is available at the end and
//! takes precedence over what the individual runs report.
use super::annealing::{self, AnnealingOptions, AnnealingResult};
use super::cost::SENTINEL_COST;
use super::objective::{OptimiserState, PenalisedObjective};
use super::{CapacityVector, aggregate_supply};
use crate::model::Model;
use crate::technology::TechnologyID::{
    Chp, Co2Import, Geothermal, Grid, Gshp, Solar, WasteHeat,
};
use crate::technology::{N_TECHNOLOGIES, TechnologyID, TechnologyProfiles};
use log::{debug, info, warn};
use serde::Serialize;
use Level::{ChpForCo2, Fraction, Max};

/// How big a starting mix makes a technology
#[derive(Debug, Clone, Copy, PartialEq)]
enum Level {
    /// As large as the search bounds allow
    Max,
    /// A proportion of the upper bound
    Fraction(f64),
    /// CHP just large enough to cover peak CO2 demand
    ChpForCo2,
}

/// A named combination of technologies used as the starting point of an annealing run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartingMix {
    /// A short description of the mix
    pub name: &'static str,
    levels: &'static [(TechnologyID, Level)],
}

/// The starting mixes, in the order they are run.
///
/// Technologies not listed start at zero. The boiler is in no mix, but the annealer is still free
/// to build one.
const STARTING_MIXES: [StartingMix; 15] = [
    StartingMix {
        name: "CHP (CO2) + geothermal + grid",
        levels: &[(Chp, ChpForCo2), (Geothermal, Max), (Grid, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + GSHP + grid",
        levels: &[(Chp, ChpForCo2), (Gshp, Max), (Grid, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + geothermal + solar",
        levels: &[(Chp, ChpForCo2), (Geothermal, Max), (Solar, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + GSHP + solar",
        levels: &[(Chp, ChpForCo2), (Gshp, Max), (Solar, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + solar + waste heat",
        levels: &[(Chp, ChpForCo2), (Solar, Max), (WasteHeat, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + waste heat + grid",
        levels: &[(Chp, ChpForCo2), (WasteHeat, Max), (Grid, Max)],
    },
    StartingMix {
        name: "CHP (CO2) + 45% solar + waste heat",
        levels: &[(Chp, ChpForCo2), (Solar, Fraction(0.45)), (WasteHeat, Max)],
    },
    StartingMix {
        name: "CHP",
        levels: &[(Chp, Max)],
    },
    StartingMix {
        name: "CHP + grid",
        levels: &[(Chp, Max), (Grid, Max)],
    },
    StartingMix {
        name: "geothermal + grid + CO2",
        levels: &[(Geothermal, Max), (Grid, Max), (Co2Import, Max)],
    },
    StartingMix {
        name: "geothermal + solar + CO2",
        levels: &[(Geothermal, Max), (Solar, Max), (Co2Import, Max)],
    },
    StartingMix {
        name: "GSHP + solar + CO2",
        levels: &[(Gshp, Max), (Solar, Max), (Co2Import, Max)],
    },
    StartingMix {
        name: "GSHP + grid + CO2",
        levels: &[(Gshp, Max), (Grid, Max), (Co2Import, Max)],
    },
    StartingMix {
        name: "solar + waste heat + CO2",
        levels: &[(Solar, Max), (WasteHeat, Max), (Co2Import, Max)],
    },
    StartingMix {
        name: "waste heat + grid + CO2",
        levels: &[(WasteHeat, Max), (Grid, Max), (Co2Import, Max)],
    },
];

impl StartingMix {
    /// The capacity vector for this mix, clamped into the search bounds
    pub fn capacities(&self, profiles: &TechnologyProfiles) -> CapacityVector {
        let capacities: CapacityVector = self
            .levels
            .iter()
            .map(|&(id, level)| {
                let upper = profiles[id].upper_bound;
                let capacity = match level {
                    Max => upper,
                    Fraction(fraction) => fraction * upper,
                    ChpForCo2 => profiles.chp_co2_power(),
                };
                (id, capacity)
            })
            .collect();

        capacities.clamp(&profiles.bounds())
    }
}

/// All starting mixes
pub fn starting_mixes() -> &'static [StartingMix] {
    &STARTING_MIXES
}

/// The best solution found by a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestResult {
    /// The capacity of each technology
    pub capacities: CapacityVector,
    /// Annual cost plus penalties
    pub cost: f64,
    /// Whether the search converged before it ran out of iterations
    pub converged: bool,
    /// The number of recorded evaluations of the objective
    pub evaluations: u64,
}

impl BestResult {
    /// Whether no solution could be costed
    pub fn is_sentinel(&self) -> bool {
        self.cost >= SENTINEL_COST
    }
}

/// Finds the cheapest capacity vector which meets peak demand
pub struct Optimiser<'a> {
    profiles: &'a TechnologyProfiles,
    objective: PenalisedObjective<'a>,
    options: AnnealingOptions,
    seed: u64,
}

impl<'a> Optimiser<'a> {
    /// Create an optimiser for the given model
    pub fn new(model: &Model, profiles: &'a TechnologyProfiles) -> Self {
        let parameters = &model.parameters;
        let objective = PenalisedObjective::new(
            profiles,
            model.demand.requirements(),
            parameters.penalty_weights(),
            parameters.convergence_window,
            parameters.improvement_threshold,
        );

        Self {
            profiles,
            objective,
            options: parameters.annealing_options(),
            seed: parameters.seed,
        }
    }

    /// The state left behind by the last search
    pub fn state(&self) -> &OptimiserState {
        self.objective.state()
    }

    /// Consume the optimiser, returning the state left behind by the last search
    pub fn into_state(self) -> OptimiserState {
        self.objective.into_state()
    }

    /// Run the annealer from every starting mix and return the best solution found.
    ///
    /// A run which fails is logged and skipped. If no solution could be evaluated at all, the
    /// result is the empty capacity vector at [`SENTINEL_COST`].
    pub fn optimise(&mut self) -> BestResult {
        self.objective.state_mut().reset();
        let bounds = self.profiles.bounds();

        let mut best_run: Option<AnnealingResult<N_TECHNOLOGIES>> = None;
        for (run, mix) in starting_mixes().iter().enumerate() {
            let seed = self.seed.wrapping_add(run as u64);
            let x0 = mix.capacities(self.profiles);
            info!(
                "Annealing run {}/{} from {} (seed {seed})",
                run + 1,
                STARTING_MIXES.len(),
                mix.name
            );

            let objective = &mut self.objective;
            let result = annealing::minimise(
                |x| objective.evaluate(&CapacityVector(*x)),
                &bounds,
                Some(x0.0),
                &self.options,
                seed,
            );
            match result {
                Ok(result) => {
                    debug!(
                        "Run {} finished after {} iterations and {} evaluations with cost {:.6e}",
                        run + 1,
                        result.iterations,
                        result.evaluations,
                        result.fun
                    );
                    if best_run.as_ref().is_none_or(|best| result.fun < best.fun) {
                        best_run = Some(result);
                    }
                }
                Err(err) => warn!("Annealing run {} ({}) failed: {err}", run + 1, mix.name),
            }
        }

        let best = self.reconcile(best_run);
        if best.is_sentinel() {
            warn!(
                "No solution could be costed. Reporting the best point found at cost {:.6e}.",
                best.cost
            );
        } else {
            info!("Best cost found: {:.6e}", best.cost);
        }

        best
    }

    /// Combine the best annealing run with the best solution the objective has seen.
    ///
    /// After convergence the objective returns the frozen cost for any point, so an annealing run
    /// can report the best cost at a point other than the one which achieved it. The tracked best
    /// wins ties for that reason.
    fn reconcile(&self, best_run: Option<AnnealingResult<N_TECHNOLOGIES>>) -> BestResult {
        let state = self.objective.state();
        let (mut capacities, mut cost) = best_run.map_or_else(
            || (CapacityVector::default(), SENTINEL_COST),
            |run| (CapacityVector(run.x), run.fun),
        );

        if let Some(tracked) = state.best_capacities.filter(|_| state.best_cost <= cost) {
            capacities = tracked;
            cost = state.best_cost;
        }

        let supply = aggregate_supply(&capacities);
        debug!(
            "Best solution supplies {:.4} MW heat, {:.4} MW light and {:.4} kg/h CO2",
            supply.heat, supply.light, supply.co2
        );

        BestResult {
            capacities,
            cost,
            converged: state.is_converged(),
            evaluations: state.iteration,
        }
    }
}
