//! The penalised objective function minimised by the annealer.
//!
//! The objective is the annual cost of a capacity vector plus quadratic penalties for peak demand
//! it fails to meet. Every call is recorded, as is every new best solution, and once the best
//! solutions stop improving the objective returns the frozen best cost for the rest of the run.
use super::convergence::{LocalMinimaTracker, LocalMinimum};
use super::cost::{CostEvaluator, SENTINEL_COST};
use super::{CapacityVector, PenaltyWeights, SupplyTotals, aggregate_supply};
use crate::demand::Requirements;
use crate::finance::CostBreakdown;
use crate::technology::{TechnologyID, TechnologyProfiles};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

/// New best costs are logged at info level when they improve on the last by more than this
const LOG_IMPROVEMENT_RATIO: f64 = 0.01;

/// Penalties for unmet peak demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Penalties {
    /// Penalty for unmet heat demand
    pub heat: f64,
    /// Penalty for unmet light demand
    pub light: f64,
    /// Penalty for unmet CO2 demand
    pub co2: f64,
}

impl Penalties {
    /// Calculate the penalties for the given supply.
    ///
    /// Only undersupply is penalised.
    pub fn new(
        supply: &SupplyTotals,
        requirements: &Requirements,
        weights: &PenaltyWeights,
    ) -> Self {
        let penalty = |required: f64, supplied: f64, weight: f64| {
            let undersupply = (required - supplied).max(0.0);
            weight * undersupply * undersupply
        };

        Self {
            heat: penalty(requirements.heat, supply.heat, weights.heat),
            light: penalty(requirements.light, supply.light, weights.light),
            co2: penalty(requirements.co2, supply.co2, weights.co2),
        }
    }

    /// The sum of all penalties
    pub fn total(&self) -> f64 {
        self.heat + self.light + self.co2
    }
}

/// A single evaluation of the objective
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    /// Index of the evaluation, counting from zero
    pub evaluation: u64,
    /// The capacity vector evaluated
    pub capacities: CapacityVector,
    /// Penalties for unmet demand
    pub penalties: Penalties,
    /// Cost of each technology. Empty if the capacity vector couldn't be costed.
    pub costs: IndexMap<TechnologyID, CostBreakdown>,
    /// Annual cost, or [`SENTINEL_COST`] if it couldn't be calculated
    pub base_cost: f64,
    /// Base cost plus penalties
    pub total: f64,
}

/// Everything the objective has learned during a search
#[derive(Debug, Clone)]
pub struct OptimiserState {
    /// The best capacity vector found so far
    pub best_capacities: Option<CapacityVector>,
    /// The penalised cost of the best capacity vector
    pub best_cost: f64,
    /// Every evaluation which wasn't skipped because the search had converged
    pub evaluations: Vec<EvaluationRecord>,
    /// The number of evaluations so far
    pub iteration: u64,
    /// New best solutions and convergence state
    pub tracker: LocalMinimaTracker,
}

impl OptimiserState {
    /// Create an empty state
    pub fn new(convergence_window: usize, improvement_threshold: f64) -> Self {
        Self {
            best_capacities: None,
            best_cost: f64::INFINITY,
            evaluations: Vec::new(),
            iteration: 0,
            tracker: LocalMinimaTracker::new(convergence_window, improvement_threshold),
        }
    }

    /// Forget everything learned so far
    pub fn reset(&mut self) {
        self.best_capacities = None;
        self.best_cost = f64::INFINITY;
        self.evaluations.clear();
        self.iteration = 0;
        self.tracker.reset();
    }

    /// The local minima found so far
    pub fn local_minima(&self) -> &[LocalMinimum] {
        self.tracker.minima()
    }

    /// Whether the search has converged
    pub fn is_converged(&self) -> bool {
        self.tracker.is_converged()
    }
}

/// Annual cost plus penalties for unmet demand
pub struct PenalisedObjective<'a> {
    costs: CostEvaluator<'a>,
    requirements: Requirements,
    weights: PenaltyWeights,
    state: OptimiserState,
}

impl<'a> PenalisedObjective<'a> {
    /// Create a new objective with an empty state
    pub fn new(
        profiles: &'a TechnologyProfiles,
        requirements: Requirements,
        weights: PenaltyWeights,
        convergence_window: usize,
        improvement_threshold: f64,
    ) -> Self {
        Self {
            costs: CostEvaluator::new(profiles),
            requirements,
            weights,
            state: OptimiserState::new(convergence_window, improvement_threshold),
        }
    }

    /// The state accumulated so far
    pub fn state(&self) -> &OptimiserState {
        &self.state
    }

    /// Mutable access to the state
    pub fn state_mut(&mut self) -> &mut OptimiserState {
        &mut self.state
    }

    /// Consume the objective, returning its state
    pub fn into_state(self) -> OptimiserState {
        self.state
    }

    /// Evaluate the objective for the given capacities.
    ///
    /// Once the search has converged this returns the frozen best cost without recording
    /// anything.
    pub fn evaluate(&mut self, capacities: &CapacityVector) -> f64 {
        if let Some(frozen_cost) = self.state.tracker.frozen_cost() {
            return frozen_cost;
        }

        let supply = aggregate_supply(capacities);
        let penalties = Penalties::new(&supply, &self.requirements, &self.weights);
        let (base_cost, costs) = match self.costs.evaluate(capacities) {
            Ok(cost) => (cost.total.value(), cost.breakdown),
            Err(err) => {
                debug!("Evaluation {}: {err}", self.state.iteration);
                (SENTINEL_COST, IndexMap::new())
            }
        };
        let total = base_cost + penalties.total();

        self.state.evaluations.push(EvaluationRecord {
            evaluation: self.state.iteration,
            capacities: *capacities,
            penalties,
            costs,
            base_cost,
            total,
        });

        if total < self.state.best_cost {
            self.record_best(capacities, total);
        }
        self.state.iteration += 1;

        total
    }

    fn record_best(&mut self, capacities: &CapacityVector, cost: f64) {
        let previous = self.state.best_cost;
        if !previous.is_finite() || (previous - cost) / previous > LOG_IMPROVEMENT_RATIO {
            info!("New best cost {cost:.6e} at evaluation {}", self.state.iteration);
        }

        self.state.best_cost = cost;
        self.state.best_capacities = Some(*capacities);
        self.state.tracker.record(LocalMinimum {
            iteration: self.state.iteration,
            cost,
            capacities: *capacities,
        });
    }
}
