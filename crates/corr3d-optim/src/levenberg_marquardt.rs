//! Levenberg-Marquardt optimizer for small dense nonlinear least-squares problems.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` and accepts the step only if it lowers
//! the cost `Σ r_i²`. Accepted steps shrink λ, rejected steps grow it.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{CancellationToken, LeastSquaresProblem, OptimizerError};

/// Reason why the optimizer terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Relative cost decrease fell below the cost tolerance.
    CostConverged,
    /// The step length fell below the step tolerance.
    StepConverged,
    /// The gradient norm fell below the gradient tolerance.
    GradientConverged,
    /// Maximum number of iterations reached.
    MaxIterations,
    /// Damping exceeded its maximum without finding a descent step.
    LambdaMaxExceeded,
    /// The wall-clock budget of the solve ran out.
    TimeBudgetExceeded,
    /// Cancellation was requested through a [`CancellationToken`].
    Cancelled,
}

impl TerminationReason {
    /// Stable integer status code of the termination reason.
    ///
    /// Codes `1..=4` denote convergence, larger codes denote an early stop.
    pub fn code(&self) -> i32 {
        match self {
            TerminationReason::CostConverged => 1,
            TerminationReason::StepConverged => 2,
            TerminationReason::GradientConverged => 4,
            TerminationReason::MaxIterations => 5,
            TerminationReason::LambdaMaxExceeded => 6,
            TerminationReason::TimeBudgetExceeded => 7,
            TerminationReason::Cancelled => 8,
        }
    }

    /// Whether the solver stopped because it converged.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TerminationReason::CostConverged
                | TerminationReason::StepConverged
                | TerminationReason::GradientConverged
        )
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerResult {
    /// Parameters at termination (the best accepted iterate).
    pub params: Vec<f64>,
    /// Cost `Σ r_i²` at the initial parameters.
    pub initial_cost: f64,
    /// Cost `Σ r_i²` at the returned parameters.
    pub final_cost: f64,
    /// Number of iterations performed (accepted and rejected steps).
    pub iterations: usize,
    /// Reason for termination.
    pub termination_reason: TerminationReason,
}

impl OptimizerResult {
    /// Whether the solver converged.
    pub fn success(&self) -> bool {
        self.termination_reason.is_success()
    }
}

/// Levenberg-Marquardt optimizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevenbergMarquardt {
    /// Initial damping parameter.
    pub lambda_init: f64,
    /// Maximum damping parameter.
    pub lambda_max: f64,
    /// Factor for lambda adaptation.
    pub lambda_factor: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the relative cost decrease.
    pub cost_tolerance: f64,
    /// Convergence threshold on the gradient norm `‖Jᵀr‖`.
    pub gradient_tolerance: f64,
    /// Convergence threshold on the step length relative to the parameter norm.
    pub step_tolerance: f64,
    /// Optional wall-clock budget for a single solve.
    pub time_budget: Option<Duration>,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            lambda_init: 1e-3,
            lambda_max: 1e10,
            lambda_factor: 10.0,
            max_iterations: 200,
            cost_tolerance: 1e-12,
            gradient_tolerance: 1e-10,
            step_tolerance: 1e-12,
            time_budget: None,
        }
    }
}

impl LevenbergMarquardt {
    /// Cost below which the problem is considered solved exactly.
    const ABSOLUTE_COST_TOLERANCE: f64 = 1e-24;

    /// Lower bound on the diagonal used for damping.
    const MIN_DIAGONAL: f64 = 1e-9;

    /// Create a new optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    pub fn with_max_iterations(mut self, max_iters: usize) -> Self {
        self.max_iterations = max_iters;
        self
    }

    /// Set cost tolerance.
    pub fn with_cost_tolerance(mut self, tol: f64) -> Self {
        self.cost_tolerance = tol;
        self
    }

    /// Set gradient tolerance.
    pub fn with_gradient_tolerance(mut self, tol: f64) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Set step tolerance.
    pub fn with_step_tolerance(mut self, tol: f64) -> Self {
        self.step_tolerance = tol;
        self
    }

    /// Set initial lambda.
    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.lambda_init = lambda;
        self
    }

    /// Set the wall-clock budget of a single solve.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Minimize `problem` starting from `initial`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The least-squares problem.
    /// * `initial` - Initial parameter vector of length `problem.num_params()`.
    /// * `cancel` - Optional token checked on every iteration.
    ///
    /// # Returns
    ///
    /// The best accepted parameters together with the termination reason. Early
    /// stops (iteration/time budget, cancellation) are reported through
    /// [`OptimizerResult::termination_reason`], not as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are inconsistent, the problem is
    /// underdetermined, or the residuals at `initial` are not finite.
    pub fn optimize<P: LeastSquaresProblem + ?Sized>(
        &self,
        problem: &P,
        initial: &[f64],
        cancel: Option<&CancellationToken>,
    ) -> Result<OptimizerResult, OptimizerError> {
        let n = problem.num_params();
        let m = problem.num_residuals();

        if initial.len() != n {
            return Err(OptimizerError::DimensionMismatch {
                expected: n,
                actual: initial.len(),
            });
        }
        if m < n {
            return Err(OptimizerError::Underdetermined {
                residuals: m,
                parameters: n,
            });
        }

        let start = Instant::now();

        let mut params = DVector::from_column_slice(initial);
        let mut residual = DVector::<f64>::zeros(m);
        problem.residuals(params.as_slice(), residual.as_mut_slice())?;
        if !residual.iter().all(|r| r.is_finite()) {
            return Err(OptimizerError::NonFiniteResidual);
        }

        let initial_cost = residual.norm_squared();
        let mut cost = initial_cost;
        let mut lambda = self.lambda_init;
        let mut iterations = 0;

        let mut jac = DMatrix::<f64>::zeros(m, n);
        let mut jtj = DMatrix::<f64>::zeros(n, n);
        let mut jtr = DVector::<f64>::zeros(n);
        let mut relinearize = true;

        let mut candidate_residual = DVector::<f64>::zeros(m);

        let termination_reason = loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                break TerminationReason::Cancelled;
            }
            if self.time_budget.is_some_and(|b| start.elapsed() >= b) {
                break TerminationReason::TimeBudgetExceeded;
            }
            if cost <= Self::ABSOLUTE_COST_TOLERANCE {
                break TerminationReason::CostConverged;
            }
            if iterations >= self.max_iterations {
                break TerminationReason::MaxIterations;
            }

            if relinearize {
                problem.jacobian(params.as_slice(), &mut jac)?;
                jtj = jac.tr_mul(&jac);
                jtr = jac.tr_mul(&residual);
                relinearize = false;

                if jtr.norm() < self.gradient_tolerance {
                    break TerminationReason::GradientConverged;
                }
            }

            iterations += 1;

            let Some(delta) = self.solve_damped_system(&jtj, &jtr, lambda) else {
                lambda *= self.lambda_factor;
                if lambda > self.lambda_max {
                    break TerminationReason::LambdaMaxExceeded;
                }
                continue;
            };

            let step_norm = delta.norm();
            if step_norm <= self.step_tolerance * (params.norm() + self.step_tolerance) {
                break TerminationReason::StepConverged;
            }

            let candidate = &params + &delta;
            problem.residuals(candidate.as_slice(), candidate_residual.as_mut_slice())?;
            let new_cost = if candidate_residual.iter().all(|r| r.is_finite()) {
                candidate_residual.norm_squared()
            } else {
                f64::INFINITY
            };

            log::trace!(
                "lm iteration {}: cost {:.6e} -> {:.6e}, lambda {:.3e}",
                iterations,
                cost,
                new_cost,
                lambda
            );

            if new_cost < cost {
                let relative_decrease = (cost - new_cost) / cost;
                params = candidate;
                std::mem::swap(&mut residual, &mut candidate_residual);
                cost = new_cost;
                lambda = (lambda / self.lambda_factor).max(1e-12);
                relinearize = true;

                if relative_decrease < self.cost_tolerance {
                    break TerminationReason::CostConverged;
                }
            } else {
                lambda *= self.lambda_factor;
                if lambda > self.lambda_max {
                    break TerminationReason::LambdaMaxExceeded;
                }
            }
        };

        log::debug!(
            "lm terminated after {} iterations ({:?}): cost {:.6e} -> {:.6e}",
            iterations,
            termination_reason,
            initial_cost,
            cost
        );

        Ok(OptimizerResult {
            params: params.as_slice().to_vec(),
            initial_cost,
            final_cost: cost,
            iterations,
            termination_reason,
        })
    }

    /// Solve the damped system `(JᵀJ + λ·D) δ = -Jᵀr` with `D = diag(JᵀJ)`.
    fn solve_damped_system(
        &self,
        jtj: &DMatrix<f64>,
        jtr: &DVector<f64>,
        lambda: f64,
    ) -> Option<DVector<f64>> {
        let mut h = jtj.clone();
        for i in 0..h.nrows() {
            h[(i, i)] += lambda * jtj[(i, i)].max(Self::MIN_DIAGONAL);
        }

        let rhs = -jtr.clone();
        let delta = match h.clone().cholesky() {
            Some(chol) => Some(chol.solve(&rhs)),
            None => h.lu().solve(&rhs),
        };
        delta.filter(|d| d.iter().all(|v| v.is_finite()))
    }
}
