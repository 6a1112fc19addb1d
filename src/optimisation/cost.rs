//! Annual cost of a whole capacity vector.
use super::CapacityVector;
use crate::finance::{CostBreakdown, annualised_cost};
use crate::technology::cost::cost_inputs;
use crate::technology::{TechnologyID, TechnologyProfiles};
use crate::units::Money;
use indexmap::IndexMap;

/// The base cost given to a capacity vector which can't be costed.
///
/// It is large enough to lose against any real solution but small enough that the penalties for
/// unmet demand still steer the search.
pub const SENTINEL_COST: f64 = 1e10;

/// Technologies at or below this capacity are treated as not built and cost nothing
pub const ACTIVATION_THRESHOLD: f64 = 0.0;

/// Reasons why the cost of a technology can't be calculated
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum EvaluationError {
    /// The technology has no demand to serve, so its operation can't be scaled
    #[display("{_0} has zero rated power, so its operation is undefined")]
    ZeroRatedPower(TechnologyID),
    /// The technology has a fixed operating cost but produces nothing
    #[display("{_0} produces no output, so its operating cost is undefined")]
    ZeroOutput(TechnologyID),
    /// The cost model returned a value which is not a finite number
    #[display("The cost of {_0} is not a finite number")]
    NonFinite(TechnologyID),
}

impl std::error::Error for EvaluationError {}

/// The cost of every technology in a capacity vector
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityCost {
    /// Sum of the technologies' annual costs
    pub total: Money,
    /// Annual cost of each technology, in capacity vector order
    pub breakdown: IndexMap<TechnologyID, CostBreakdown>,
}

/// Calculates the annual cost of capacity vectors
pub struct CostEvaluator<'a> {
    profiles: &'a TechnologyProfiles,
}

impl<'a> CostEvaluator<'a> {
    /// Create a new [`CostEvaluator`]
    pub fn new(profiles: &'a TechnologyProfiles) -> Self {
        Self { profiles }
    }

    /// The annual cost of a single technology at the given capacity
    fn technology_cost(
        &self,
        id: TechnologyID,
        capacity: f64,
    ) -> Result<CostBreakdown, EvaluationError> {
        if capacity <= ACTIVATION_THRESHOLD {
            return Ok(CostBreakdown::default());
        }

        let operation = self.profiles[id].operation(capacity)?;
        let cost = annualised_cost(&cost_inputs(id, capacity, &operation)?);
        if !cost.is_finite() {
            return Err(EvaluationError::NonFinite(id));
        }

        Ok(cost)
    }

    /// Sum the annual costs of all technologies in the capacity vector.
    ///
    /// Fails if any single technology can't be costed.
    pub fn evaluate(&self, capacities: &CapacityVector) -> Result<CapacityCost, EvaluationError> {
        let breakdown = capacities
            .iter()
            .map(|(id, capacity)| Ok((id, self.technology_cost(id, capacity)?)))
            .collect::<Result<IndexMap<_, _>, _>>()?;
        let total = breakdown.values().map(|cost| cost.total).sum();

        Ok(CapacityCost { total, breakdown })
    }
}
