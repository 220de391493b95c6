use nalgebra::DMatrix;

use crate::OptimizerError;

/// A nonlinear least-squares problem `min_p Σ r_i(p)²`.
///
/// Implementors provide the residual function; the Jacobian defaults to
/// central finite differences and can be overridden with an analytic one.
pub trait LeastSquaresProblem: Sync {
    /// Number of free parameters.
    fn num_params(&self) -> usize;

    /// Number of residuals.
    fn num_residuals(&self) -> usize;

    /// Evaluate the residual vector at `params` into `out`.
    ///
    /// PRECONDITION: `params.len() == num_params()` and `out.len() == num_residuals()`.
    fn residuals(&self, params: &[f64], out: &mut [f64]) -> Result<(), OptimizerError>;

    /// Evaluate the Jacobian `∂r/∂p` (shape `num_residuals × num_params`) into `jac`.
    fn jacobian(&self, params: &[f64], jac: &mut DMatrix<f64>) -> Result<(), OptimizerError> {
        numerical_jacobian(self, params, jac)
    }
}

/// Compute the Jacobian of `problem` at `params` using central differences.
///
/// The step for each parameter is relative to its magnitude so that both
/// small angles and large intensities are differentiated accurately.
pub fn numerical_jacobian<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    params: &[f64],
    jac: &mut DMatrix<f64>,
) -> Result<(), OptimizerError> {
    const EPS: f64 = 1e-6;

    let m = problem.num_residuals();
    let n = problem.num_params();
    if params.len() != n {
        return Err(OptimizerError::DimensionMismatch {
            expected: n,
            actual: params.len(),
        });
    }
    if jac.nrows() != m || jac.ncols() != n {
        *jac = DMatrix::zeros(m, n);
    }

    let mut r_plus = vec![0.0; m];
    let mut r_minus = vec![0.0; m];
    let mut perturbed = params.to_vec();

    for j in 0..n {
        let h = EPS * params[j].abs().max(1.0);

        perturbed[j] = params[j] + h;
        problem.residuals(&perturbed, &mut r_plus)?;
        perturbed[j] = params[j] - h;
        problem.residuals(&perturbed, &mut r_minus)?;
        perturbed[j] = params[j];

        let inv_2h = 1.0 / (2.0 * h);
        for i in 0..m {
            jac[(i, j)] = (r_plus[i] - r_minus[i]) * inv_2h;
        }
    }

    Ok(())
}
