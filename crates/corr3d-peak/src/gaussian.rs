//! Sub-pixel lateral localization by fitting an elliptical 2D Gaussian
//!
//! `I(x, y) = offset + amplitude · exp(-(x - cx)² / 2σx² - (y - cy)² / 2σy²)`
//!
//! to the samples of a square window around an integer peak.

use corr3d_optim::{LeastSquaresProblem, LevenbergMarquardt, OptimizerError, TerminationReason};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{PeakError, VolumeView};

/// Parameters for [`fit_gaussian_2d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianFitParams {
    /// Half size of the fit window; the window is `2 · half_window + 1` wide.
    pub half_window: usize,
    /// Initial width of the Gaussian in pixels.
    pub initial_sigma: f64,
    /// Largest accepted distance between the fitted center and the seed pixel.
    pub max_center_shift: f64,
    /// Nonlinear solver configuration.
    pub solver: LevenbergMarquardt,
}

impl Default for GaussianFitParams {
    fn default() -> Self {
        Self {
            half_window: 3,
            initial_sigma: 1.5,
            max_center_shift: 2.0,
            solver: LevenbergMarquardt::default(),
        }
    }
}

impl GaussianFitParams {
    /// Set the half window size.
    pub fn with_half_window(mut self, half_window: usize) -> Self {
        self.half_window = half_window;
        self
    }

    /// Set the initial Gaussian width.
    pub fn with_initial_sigma(mut self, sigma: f64) -> Self {
        self.initial_sigma = sigma;
        self
    }

    /// Set the largest accepted center shift.
    pub fn with_max_center_shift(mut self, shift: f64) -> Self {
        self.max_center_shift = shift;
        self
    }

    /// Set the solver configuration.
    pub fn with_solver(mut self, solver: LevenbergMarquardt) -> Self {
        self.solver = solver;
        self
    }
}

/// A fitted 2D Gaussian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gaussian2d {
    /// Peak height above the offset.
    pub amplitude: f64,
    /// Center `[x, y]` in pixel coordinates of the slice.
    pub center: [f64; 2],
    /// Widths `[σx, σy]` in pixels.
    pub sigma: [f64; 2],
    /// Background level.
    pub offset: f64,
    /// RMS of the fit residuals.
    pub rms_residual: f64,
}

impl Gaussian2d {
    /// Evaluate the Gaussian at `(x, y)`.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        gaussian(
            &[
                self.amplitude,
                self.center[0],
                self.center[1],
                self.sigma[0],
                self.sigma[1],
                self.offset,
            ],
            x,
            y,
        )
    }
}

/// Samples of the fit window: `(x, y, intensity)`.
struct GaussianProblem {
    samples: Vec<(f64, f64, f64)>,
}

/// Number of model parameters `[amplitude, cx, cy, σx, σy, offset]`.
const NUM_PARAMS: usize = 6;

fn gaussian(p: &[f64], x: f64, y: f64) -> f64 {
    let dx = x - p[1];
    let dy = y - p[2];
    p[5] + p[0] * (-0.5 * (dx * dx / (p[3] * p[3]) + dy * dy / (p[4] * p[4]))).exp()
}

impl LeastSquaresProblem for GaussianProblem {
    fn num_params(&self) -> usize {
        NUM_PARAMS
    }

    fn num_residuals(&self) -> usize {
        self.samples.len()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) -> Result<(), OptimizerError> {
        for (r, &(x, y, value)) in out.iter_mut().zip(&self.samples) {
            *r = gaussian(params, x, y) - value;
        }
        Ok(())
    }

    fn jacobian(&self, params: &[f64], jac: &mut DMatrix<f64>) -> Result<(), OptimizerError> {
        if jac.shape() != (self.samples.len(), NUM_PARAMS) {
            *jac = DMatrix::zeros(self.samples.len(), NUM_PARAMS);
        }
        let (a, cx, cy, sx, sy) = (params[0], params[1], params[2], params[3], params[4]);
        for (i, &(x, y, _)) in self.samples.iter().enumerate() {
            let dx = x - cx;
            let dy = y - cy;
            let e = (-0.5 * (dx * dx / (sx * sx) + dy * dy / (sy * sy))).exp();
            jac[(i, 0)] = e;
            jac[(i, 1)] = a * e * dx / (sx * sx);
            jac[(i, 2)] = a * e * dy / (sy * sy);
            jac[(i, 3)] = a * e * dx * dx / (sx * sx * sx);
            jac[(i, 4)] = a * e * dy * dy / (sy * sy * sy);
            jac[(i, 5)] = 1.0;
        }
        Ok(())
    }
}

/// Fit a 2D Gaussian to slice `z` of `volume` around the pixel `seed = [x, y]`.
///
/// The window is clipped at the slice border.
///
/// # Errors
///
/// [`PeakError::OutOfBounds`] if the seed is outside the slice, and
/// [`PeakError::FitFailure`] if the window is too small, the solver does not
/// converge, or the fitted center or widths are implausible.
pub fn fit_gaussian_2d(
    volume: &VolumeView<'_>,
    z: usize,
    seed: [usize; 2],
    params: &GaussianFitParams,
) -> Result<Gaussian2d, PeakError> {
    let [nx, ny, _] = volume.shape();
    volume.try_get(seed[0], seed[1], z)?;

    let h = params.half_window;
    let (x_lo, x_hi) = (seed[0].saturating_sub(h), (seed[0] + h).min(nx - 1));
    let (y_lo, y_hi) = (seed[1].saturating_sub(h), (seed[1] + h).min(ny - 1));

    let mut samples = Vec::with_capacity((x_hi - x_lo + 1) * (y_hi - y_lo + 1));
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let value = volume.try_get(x, y, z)?;
            samples.push((x as f64, y as f64, f64::from(value)));
        }
    }
    if samples.len() <= NUM_PARAMS {
        return Err(PeakError::FitFailure(format!(
            "window of {} pixels is too small for a Gaussian fit",
            samples.len()
        )));
    }

    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.2), hi.max(s.2))
        });
    let initial = [
        max - min,
        seed[0] as f64,
        seed[1] as f64,
        params.initial_sigma,
        params.initial_sigma,
        min,
    ];

    let problem = GaussianProblem { samples };
    let result = params
        .solver
        .optimize(&problem, &initial, None)
        .map_err(|e| PeakError::FitFailure(e.to_string()))?;
    // a stall at maximal damping means no descent direction is left
    let stalled = result.termination_reason == TerminationReason::LambdaMaxExceeded;
    if !result.success() && !stalled {
        return Err(PeakError::FitFailure(format!(
            "solver stopped with {:?}",
            result.termination_reason
        )));
    }

    let p = &result.params;
    let fit = Gaussian2d {
        amplitude: p[0],
        center: [p[1], p[2]],
        sigma: [p[3].abs(), p[4].abs()],
        offset: p[5],
        rms_residual: (result.final_cost / problem.samples.len() as f64).sqrt(),
    };

    let shift = (fit.center[0] - seed[0] as f64).hypot(fit.center[1] - seed[1] as f64);
    if !shift.is_finite() || shift > params.max_center_shift {
        return Err(PeakError::FitFailure(format!(
            "fitted center moved {shift:.2} px from the seed"
        )));
    }
    if fit.sigma.iter().any(|s| !s.is_finite() || *s < 1e-6) || fit.amplitude <= 0.0 {
        return Err(PeakError::FitFailure(format!(
            "implausible Gaussian: amplitude {}, sigma {:?}",
            fit.amplitude, fit.sigma
        )));
    }
    Ok(fit)
}
