//! Tracks the best solutions found so far and decides when the search has stopped improving.
use super::CapacityVector;
use log::info;
use serde::Serialize;

/// A capacity vector which improved on every solution found before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalMinimum {
    /// The iteration of the objective at which this minimum was found
    pub iteration: u64,
    /// The penalised cost
    pub cost: f64,
    /// The capacity of each technology
    pub capacities: CapacityVector,
}

/// Whether the search is still making progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceState {
    /// New minima are still improving on older ones
    Searching,
    /// Progress has stalled and the best cost has been frozen
    Converged {
        /// The cost returned for every later evaluation
        frozen_cost: f64,
    },
}

/// Records local minima and detects when they stop improving.
///
/// The search has converged when the most recent `window` minima improve on one another by less
/// than `threshold` in relative terms. Once converged it stays converged until [`reset`] is
/// called.
///
/// [`reset`]: LocalMinimaTracker::reset
#[derive(Debug, Clone)]
pub struct LocalMinimaTracker {
    window: usize,
    threshold: f64,
    minima: Vec<LocalMinimum>,
    state: ConvergenceState,
}

impl LocalMinimaTracker {
    /// Create a new tracker
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window,
            threshold,
            minima: Vec::new(),
            state: ConvergenceState::Searching,
        }
    }

    /// Forget all minima and start searching again
    pub fn reset(&mut self) {
        self.minima.clear();
        self.state = ConvergenceState::Searching;
    }

    /// The minima found so far, in the order they were found
    pub fn minima(&self) -> &[LocalMinimum] {
        &self.minima
    }

    /// The current state
    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    /// Whether the search has converged
    pub fn is_converged(&self) -> bool {
        matches!(self.state, ConvergenceState::Converged { .. })
    }

    /// The frozen best cost, if the search has converged
    pub fn frozen_cost(&self) -> Option<f64> {
        match self.state {
            ConvergenceState::Converged { frozen_cost } => Some(frozen_cost),
            ConvergenceState::Searching => None,
        }
    }

    /// Relative improvement across the most recent window of minima.
    ///
    /// Returns `None` until a full window of minima has been seen.
    fn window_improvement(&self) -> Option<f64> {
        if self.window == 0 || self.minima.len() < self.window {
            return None;
        }

        let recent = &self.minima[self.minima.len() - self.window..];
        let first = recent[0].cost;
        let last = recent[recent.len() - 1].cost;
        if first.abs() <= f64::EPSILON {
            return Some(0.0);
        }

        Some((first - last) / first)
    }

    /// Record a new local minimum and check whether the search has converged.
    ///
    /// Minima recorded after convergence are kept but can't change the frozen cost.
    pub fn record(&mut self, minimum: LocalMinimum) {
        let cost = minimum.cost;
        self.minima.push(minimum);
        if self.is_converged() {
            return;
        }

        let Some(improvement) = self.window_improvement() else {
            return;
        };
        if improvement < self.threshold {
            info!(
                "Search converged: last {} local minima improved by {:.3e} \
                (threshold {:.3e}). Best cost frozen at {cost:.6e}.",
                self.window, improvement, self.threshold
            );
            self.state = ConvergenceState::Converged { frozen_cost: cost };
        }
    }
}
