//! Generalised simulated annealing.
//!
//! This is the Tsallis-Stariolo flavour of simulated annealing: new points are drawn from a
//! distorted Cauchy-Lorentz visiting distribution whose width shrinks with the temperature, and
//! uphill moves are accepted with a generalised Metropolis probability. There is no local search
//! phase. Each run draws all of its random numbers from a single seeded [`StdRng`], so a run is
//! fully determined by its seed, starting point and objective.
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::{LN_2, PI};

/// Visits beyond this distance are redrawn uniformly within it
const TAIL_LIMIT: f64 = 1e8;

/// Visits closer than this to a lower bound are nudged away from it
const MIN_VISIT_BOUND: f64 = 1e-10;

/// How many random starting points to try before giving up on a non-finite objective
const MAX_REINIT_COUNT: u32 = 1000;

/// Options for a single annealing run
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingOptions {
    /// Maximum number of annealing iterations
    pub max_iterations: u32,
    /// Temperature at the first iteration
    pub initial_temperature: f64,
    /// Restart from a random point when the temperature falls below this proportion of the
    /// initial temperature
    pub restart_temperature_ratio: f64,
    /// Visiting distribution parameter, in (1, 3]
    pub visit: f64,
    /// Acceptance distribution parameter, negative
    pub accept: f64,
    /// Stop once the objective has been evaluated this many times
    pub max_evaluations: u64,
}

impl Default for AnnealingOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            initial_temperature: 500.0,
            restart_temperature_ratio: 2e-5,
            visit: 1.01,
            accept: -5.0,
            max_evaluations: 10_000_000,
        }
    }
}

/// The outcome of an annealing run
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingResult<const N: usize> {
    /// The best point visited
    pub x: [f64; N],
    /// The objective value at `x`
    pub fun: f64,
    /// Number of completed iterations
    pub iterations: u32,
    /// Number of objective evaluations
    pub evaluations: u64,
}

/// Reasons an annealing run can fail
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum AnnealingError {
    /// The visiting parameter is outside (1, 3]
    #[display("visiting parameter must be in (1, 3], got {_0}")]
    InvalidVisit(f64),
    /// A lower bound is above its upper bound or a bound is not finite
    #[display("invalid bounds for dimension {_0}")]
    InvalidBounds(usize),
    /// The objective never returned a finite value
    #[display("objective returned non-finite values even after 1000 random restarts")]
    NonFiniteObjective,
}

impl std::error::Error for AnnealingError {}

/// The natural log of the absolute value of the gamma function.
///
/// Uses the Lanczos approximation, with the reflection formula for arguments below one half.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        return (PI / (PI * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEFFICIENTS[1..]
        .iter()
        .enumerate()
        .fold(COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// The Tsallis visiting distribution, wrapped into the search bounds
struct VisitingDistribution<const N: usize> {
    lower: [f64; N],
    range: [f64; N],
    qv: f64,
    ln_factor4_p: f64,
    ln_factor6: f64,
}

impl<const N: usize> VisitingDistribution<N> {
    fn new(bounds: &[(f64, f64); N], qv: f64) -> Self {
        let lower = bounds.map(|(lower, _)| lower);
        let range = bounds.map(|(lower, upper)| upper - lower);

        // Constant factors of the distribution, kept in log space as they over- or underflow
        // for visiting parameters close to one
        let ln_factor2 = (4.0 - qv) * (qv - 1.0).ln();
        let ln_factor3 = (2.0 - qv) * LN_2 / (qv - 1.0);
        let ln_factor4_p = 0.5 * PI.ln() + ln_factor2 - ln_factor3 - (3.0 - qv).ln();
        let factor5 = 1.0 / (qv - 1.0) - 0.5;
        let d1 = 2.0 - factor5;
        let ln_factor6 =
            (PI * (1.0 - factor5) / (PI * (1.0 - factor5)).sin()).abs().ln() - ln_gamma(d1);

        Self {
            lower,
            range,
            qv,
            ln_factor4_p,
            ln_factor6,
        }
    }

    /// Draw a single step from the distribution at the given temperature
    fn sample(&self, temperature: f64, rng: &mut StdRng) -> f64 {
        let x: f64 = rng.sample(StandardNormal);
        let y: f64 = rng.sample(StandardNormal);

        let ln_factor4 = self.ln_factor4_p + temperature.ln() / (self.qv - 1.0);
        let scale = (-(self.qv - 1.0) * (self.ln_factor6 - ln_factor4) / (3.0 - self.qv)).exp();
        let den = ((self.qv - 1.0) * y.abs().ln() / (3.0 - self.qv)).exp();

        x * scale / den
    }

    /// Move `value` back into the bounds of dimension `i` with modular arithmetic
    fn wrap(&self, i: usize, value: f64) -> f64 {
        let range = self.range[i];
        if range <= 0.0 {
            // Pinned dimension
            return self.lower[i];
        }

        let a = value - self.lower[i];
        let b = a % range + range;
        let wrapped = b % range + self.lower[i];

        if (wrapped - self.lower[i]).abs() < MIN_VISIT_BOUND {
            wrapped + MIN_VISIT_BOUND
        } else {
            wrapped
        }
    }

    /// Visit a new point.
    ///
    /// The first `N` steps of a chain move every coordinate. The next `N` steps move coordinate
    /// `step - N` only.
    fn visit(&self, x: &[f64; N], step: usize, temperature: f64, rng: &mut StdRng) -> [f64; N] {
        let mut visit = *x;

        if step < N {
            let visits: [f64; N] = std::array::from_fn(|_| self.sample(temperature, rng));
            let upper_sample: f64 = rng.r#gen();
            let lower_sample: f64 = rng.r#gen();
            for (i, v) in visits.into_iter().enumerate() {
                let v = if v > TAIL_LIMIT {
                    TAIL_LIMIT * upper_sample
                } else if v < -TAIL_LIMIT {
                    -TAIL_LIMIT * lower_sample
                } else {
                    v
                };
                visit[i] = self.wrap(i, v + x[i]);
            }
        } else {
            let index = step - N;
            let mut v = self.sample(temperature, rng);
            if v > TAIL_LIMIT {
                v = TAIL_LIMIT * rng.r#gen::<f64>();
            } else if v < -TAIL_LIMIT {
                v = -TAIL_LIMIT * rng.r#gen::<f64>();
            }
            visit[index] = self.wrap(index, v + x[index]);
        }

        visit
    }

    /// A point drawn uniformly from within the bounds
    fn uniform(&self, rng: &mut StdRng) -> [f64; N] {
        std::array::from_fn(|i| self.lower[i] + rng.r#gen::<f64>() * self.range[i])
    }
}

/// The current and best points of a run
struct EnergyState<const N: usize> {
    current: [f64; N],
    current_energy: f64,
    best: [f64; N],
    best_energy: f64,
}

/// Counts objective evaluations
struct CountingObjective<F> {
    objective: F,
    evaluations: u64,
}

impl<F> CountingObjective<F> {
    fn call<const N: usize>(&mut self, x: &[f64; N]) -> f64
    where
        F: FnMut(&[f64; N]) -> f64,
    {
        self.evaluations += 1;
        (self.objective)(x)
    }
}

/// Evaluate the starting point, drawing random replacements while the objective is not finite
fn initial_state<F, const N: usize>(
    objective: &mut CountingObjective<F>,
    visiting: &VisitingDistribution<N>,
    rng: &mut StdRng,
    x0: Option<[f64; N]>,
) -> Result<([f64; N], f64), AnnealingError>
where
    F: FnMut(&[f64; N]) -> f64,
{
    let mut location = x0.unwrap_or_else(|| visiting.uniform(rng));
    for _ in 0..MAX_REINIT_COUNT {
        let energy = objective.call(&location);
        if energy.is_finite() {
            return Ok((location, energy));
        }
        location = visiting.uniform(rng);
    }

    Err(AnnealingError::NonFiniteObjective)
}

/// Minimise `objective` within `bounds` by generalised simulated annealing.
///
/// # Arguments
///
/// * `objective` - The function to minimise
/// * `bounds` - Lower and upper bound for each dimension. Dimensions whose bounds coincide are
///   held at the lower bound.
/// * `x0` - The starting point, or `None` to start from a random point
/// * `options` - Annealing options
/// * `seed` - Seed for the random number generator
pub fn minimise<F, const N: usize>(
    objective: F,
    bounds: &[(f64, f64); N],
    x0: Option<[f64; N]>,
    options: &AnnealingOptions,
    seed: u64,
) -> Result<AnnealingResult<N>, AnnealingError>
where
    F: FnMut(&[f64; N]) -> f64,
{
    let qv = options.visit;
    if qv.is_nan() || qv <= 1.0 || qv > 3.0 {
        return Err(AnnealingError::InvalidVisit(qv));
    }
    for (i, (lower, upper)) in bounds.iter().enumerate() {
        if !lower.is_finite() || !upper.is_finite() || lower > upper {
            return Err(AnnealingError::InvalidBounds(i));
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let visiting = VisitingDistribution::new(bounds, qv);
    let mut objective = CountingObjective {
        objective,
        evaluations: 0,
    };

    let (current, current_energy) = initial_state(&mut objective, &visiting, &mut rng, x0)?;
    let mut state = EnergyState {
        current,
        current_energy,
        best: current,
        best_energy: current_energy,
    };

    let t1 = ((qv - 1.0) * LN_2).exp() - 1.0;
    let restart_temperature = options.initial_temperature * options.restart_temperature_ratio;
    let mut iteration = 0;

    'search: while iteration < options.max_iterations {
        for i in 0..options.max_iterations {
            if iteration >= options.max_iterations {
                break 'search;
            }

            let s = i as f64 + 2.0;
            let t2 = ((qv - 1.0) * s.ln()).exp() - 1.0;
            let temperature = options.initial_temperature * t1 / t2;

            if temperature < restart_temperature {
                debug!("Temperature {temperature} below restart threshold; restarting");
                let (current, current_energy) =
                    initial_state(&mut objective, &visiting, &mut rng, None)?;
                state.current = current;
                state.current_energy = current_energy;
                continue 'search;
            }

            // Run the Markov chain for this temperature
            let temperature_step = temperature / (i as f64 + 1.0);
            for j in 0..2 * N {
                let x_visit = visiting.visit(&state.current, j, temperature, &mut rng);
                let energy = objective.call(&x_visit);

                if energy < state.current_energy {
                    state.current = x_visit;
                    state.current_energy = energy;
                    if energy < state.best_energy {
                        state.best = x_visit;
                        state.best_energy = energy;
                    }
                } else {
                    // Generalised Metropolis criterion
                    let r: f64 = rng.r#gen();
                    let pqv_temp = 1.0
                        - ((1.0 - options.accept) * (energy - state.current_energy)
                            / temperature_step);
                    let pqv = if pqv_temp <= 0.0 {
                        0.0
                    } else {
                        (pqv_temp.ln() / (1.0 - options.accept)).exp()
                    };
                    if r <= pqv {
                        state.current = x_visit;
                        state.current_energy = energy;
                    }
                }

                if objective.evaluations >= options.max_evaluations {
                    debug!("Maximum number of evaluations reached during annealing");
                    break 'search;
                }
            }

            iteration += 1;
            trace!(
                "Iteration {iteration}: temperature {temperature:.3}, best {}",
                state.best_energy
            );
        }
    }

    Ok(AnnealingResult {
        x: state.best,
        fun: state.best_energy,
        iterations: iteration,
        evaluations: objective.evaluations,
    })
}
