//! Multi-start estimation of a scaled rigid transform from 3D markers to
//! their 2D images.
//!
//! Every run minimizes the projection residuals with Levenberg-Marquardt from
//! its own initial guess. Run 0 starts from the configured initial rotation
//! and scale, later runs from random perturbations of it. Runs are
//! independent and execute in parallel; each one draws from its own
//! generator seeded with `seed + run`, so the result does not depend on
//! thread scheduling and adding runs never makes it worse.

use std::f64::consts::PI;

use corr3d_geometry::rotation::{axis_angle_to_rotation, rotation_about_z};
use corr3d_geometry::{Affine2, RigidTransform3, RotationParams};
use corr3d_optim::{CancellationToken, TerminationReason};
use nalgebra::{DMatrix, Quaternion, Rotation3, UnitQuaternion, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::{Find32Problem, ParamLayout};
use crate::{Find32Params, InitialRotation, RigidError, RotationMode, ScaleMode};

/// Relative singular value below which the marker spread is rank deficient.
const RANK_TOLERANCE: f64 = 1e-9;

/// Spread below which a marker set is considered a single point.
const MIN_SPREAD: f64 = 1e-12;

/// Largest factor by which a randomized scale differs from the initial scale.
const SCALE_RANDOMIZATION_FACTOR: f64 = 2.0;

/// Outcome of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Index of the run.
    pub run: usize,
    /// Transform at termination.
    pub transform: RigidTransform3,
    /// RMS projection error of the transform.
    pub rms_error: f64,
    /// Why the solver stopped.
    pub termination_reason: TerminationReason,
    /// Solver iterations.
    pub iterations: usize,
    /// Scale the run started from.
    pub initial_scale: f64,
}

/// Result of [`find32`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Find32Result {
    /// Best transform over all runs.
    pub transform: RigidTransform3,
    /// Rotation of the best transform in the optimized parametrization.
    pub rotation_params: RotationParams,
    /// RMS distance between the projected 3D markers and the 2D markers.
    pub rms_error: f64,
    /// Whether the solver of the best run converged.
    pub success: bool,
    /// Status code of the best run, see [`TerminationReason::code`].
    pub status: i32,
    /// Why the solver of the best run stopped.
    pub termination_reason: TerminationReason,
    /// Index of the best run.
    pub best_run: usize,
    /// Number of runs requested.
    pub num_runs: usize,
    /// Every run that produced a result, ordered by run index.
    pub runs: Vec<RunSummary>,
}

impl Find32Result {
    /// Translation of the best transform about a rotation center.
    ///
    /// See [`RigidTransform3::recalculate_translation`].
    pub fn recalculate_translation(&self, center: &[f64; 3]) -> Vector3<f64> {
        self.transform.recalculate_translation(center)
    }
}

enum RunOutcome {
    Completed(RunSummary),
    Cancelled,
    Failed(String),
}

/// Find the scaled rotation and translation mapping 3D markers onto 2D markers.
///
/// The forward map is `y = P(s · R · x + t)` where `P` keeps the first two
/// components. The z component of `t` is not observable and is set to zero.
///
/// # Arguments
///
/// * `markers_3d` - Marker positions in the 3D volume.
/// * `markers_2d` - Corresponding marker positions in the 2D image.
/// * `params` - Estimation parameters.
/// * `cancel` - Optional token; checked before every run and on every solver
///   iteration.
///
/// # Returns
///
/// The best of all runs. As long as some run converged, the best run is
/// returned even if it did not converge itself, with `success == false`.
///
/// # Errors
///
/// * [`RigidError::DegenerateConfiguration`] for fewer than three markers,
///   markers without spread, or when every run failed. Collinear 3D markers
///   and runs of which none converged carry the best result as `partial`.
/// * [`RigidError::Cancelled`] if every run was cancelled before it
///   produced a result or converged.
pub fn find32(
    markers_3d: &[[f64; 3]],
    markers_2d: &[[f64; 2]],
    params: &Find32Params,
    cancel: Option<&CancellationToken>,
) -> Result<Find32Result, RigidError> {
    validate_params(params)?;
    if markers_3d.len() != markers_2d.len() {
        return Err(RigidError::MismatchedLengths {
            markers_3d: markers_3d.len(),
            markers_2d: markers_2d.len(),
        });
    }
    let n = markers_3d.len();
    if n < 3 {
        return Err(degenerate(format!("{n} markers, at least 3 are required")));
    }

    let rank_3d = marker_rank(markers_3d);
    if rank_3d == 0 {
        return Err(degenerate("3D markers coincide".to_string()));
    }
    if max_spread_2d(markers_2d) < MIN_SPREAD {
        return Err(degenerate("2D markers coincide".to_string()));
    }

    let layout = ParamLayout {
        rotation: params.rotation_mode,
        fixed_scale: match params.scale {
            ScaleMode::Fixed(s) => Some(s),
            ScaleMode::Free => None,
        },
    };
    let problem = Find32Problem::new(layout, markers_3d, markers_2d);
    let base_rotation = initial_rotation(params, markers_3d, markers_2d)?;
    let base_scale = params.base_scale();

    let outcomes: Vec<RunOutcome> = (0..params.num_runs)
        .into_par_iter()
        .map(|run| {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return RunOutcome::Cancelled;
            }
            let (rotation, scale) = run_initial_guess(run, &base_rotation, base_scale, params);
            run_once(run, &problem, &rotation, scale, markers_3d, markers_2d, params, cancel)
        })
        .collect();

    let mut runs = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut cancelled = 0;
    for outcome in outcomes {
        match outcome {
            RunOutcome::Completed(summary) => runs.push(summary),
            RunOutcome::Cancelled => cancelled += 1,
            RunOutcome::Failed(e) => failures.push(e),
        }
    }

    // ordered scan: lowest RMS wins, the lower run index on ties
    let mut best: Option<&RunSummary> = None;
    for summary in &runs {
        if best.map_or(true, |b| summary.rms_error < b.rms_error) {
            best = Some(summary);
        }
    }
    let Some(best) = best.cloned() else {
        if cancelled > 0 && failures.is_empty() {
            return Err(RigidError::Cancelled);
        }
        let reason = failures
            .first()
            .cloned()
            .unwrap_or_else(|| "no run produced a result".to_string());
        return Err(degenerate(format!("all {} runs failed: {reason}", params.num_runs)));
    };

    log::info!(
        "find32: best run {} of {} with rms {:.6e} ({:?})",
        best.run,
        params.num_runs,
        best.rms_error,
        best.termination_reason
    );
    let any_converged = runs.iter().any(|r| r.termination_reason.is_success());
    if any_converged && !best.termination_reason.is_success() {
        log::warn!(
            "find32: best run {} did not converge: {:?}",
            best.run,
            best.termination_reason
        );
    }

    let rotation_params = match params.rotation_mode {
        RotationMode::CayleyKlein => RotationParams::CayleyKlein(best.transform.cayley_klein()),
        RotationMode::Euler(convention) => {
            RotationParams::Euler(best.transform.euler_angles(convention))
        }
    };
    let result = Find32Result {
        transform: best.transform,
        rotation_params,
        rms_error: best.rms_error,
        success: best.termination_reason.is_success(),
        status: best.termination_reason.code(),
        termination_reason: best.termination_reason,
        best_run: best.run,
        num_runs: params.num_runs,
        runs,
    };

    if rank_3d < 2 {
        return Err(RigidError::DegenerateConfiguration {
            reason: "3D markers are collinear, the rotation about their line is undetermined"
                .to_string(),
            partial: Some(Box::new(result)),
        });
    }
    if !any_converged {
        let interrupted = result
            .runs
            .iter()
            .all(|r| r.termination_reason == TerminationReason::Cancelled);
        if interrupted && failures.is_empty() {
            return Err(RigidError::Cancelled);
        }
        log::warn!(
            "find32: none of the {} runs converged, best rms {:.6e}",
            params.num_runs,
            result.rms_error
        );
        return Err(RigidError::DegenerateConfiguration {
            reason: format!(
                "none of the {} runs converged, the best stopped with {:?}",
                params.num_runs, result.termination_reason
            ),
            partial: Some(Box::new(result)),
        });
    }
    Ok(result)
}

fn degenerate(reason: String) -> RigidError {
    RigidError::DegenerateConfiguration {
        reason,
        partial: None,
    }
}

fn validate_params(params: &Find32Params) -> Result<(), RigidError> {
    if params.num_runs == 0 {
        return Err(RigidError::InvalidParameter(
            "num_runs must be at least 1".to_string(),
        ));
    }
    if let ScaleMode::Fixed(s) = params.scale {
        if !s.is_finite() || s == 0.0 {
            return Err(RigidError::InvalidParameter(format!(
                "fixed scale {s} must be finite and non-zero"
            )));
        }
    }
    if !params.initial_scale.is_finite() || params.initial_scale == 0.0 {
        return Err(RigidError::InvalidParameter(format!(
            "initial scale {} must be finite and non-zero",
            params.initial_scale
        )));
    }
    if let Some(fraction) = params.restrict_rotation {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(RigidError::InvalidParameter(format!(
                "restrict_rotation {fraction} must lie in (0, 1]"
            )));
        }
    }
    Ok(())
}

/// Numerical rank of the centered 3D markers.
fn marker_rank(points: &[[f64; 3]]) -> usize {
    let n = points.len() as f64;
    let mean = points.iter().fold([0.0; 3], |acc, p| {
        [acc[0] + p[0] / n, acc[1] + p[1] / n, acc[2] + p[2] / n]
    });
    let centered = DMatrix::from_fn(points.len(), 3, |i, j| points[i][j] - mean[j]);
    let singular_values = centered.singular_values();
    let max = singular_values.max();
    if max < MIN_SPREAD {
        return 0;
    }
    singular_values
        .iter()
        .filter(|s| **s > RANK_TOLERANCE * max)
        .count()
}

fn max_spread_2d(points: &[[f64; 2]]) -> f64 {
    let first = points[0];
    points
        .iter()
        .map(|p| (p[0] - first[0]).hypot(p[1] - first[1]))
        .fold(0.0, f64::max)
}

/// Rotation the first run starts from.
fn initial_rotation(
    params: &Find32Params,
    markers_3d: &[[f64; 3]],
    markers_2d: &[[f64; 2]],
) -> Result<Rotation3<f64>, RigidError> {
    match &params.initial_rotation {
        InitialRotation::Identity => Ok(Rotation3::identity()),
        InitialRotation::Euler(euler) => Ok(euler.to_rotation()),
        InitialRotation::Parameters(rotation) => Ok(rotation.to_rotation()?),
        InitialRotation::FromAffine2D => {
            let in_plane: Vec<[f64; 2]> = markers_3d.iter().map(|p| [p[0], p[1]]).collect();
            match Affine2::fit(&in_plane, markers_2d).and_then(|a| a.decompose()) {
                Ok(decomposition) => {
                    log::debug!(
                        "find32: affine seed angle {:.4} rad, scales {:?}",
                        decomposition.angle,
                        decomposition.scale
                    );
                    Ok(rotation_about_z(decomposition.angle))
                }
                Err(e) => {
                    log::warn!("find32: affine seed unavailable ({e}), starting from identity");
                    Ok(Rotation3::identity())
                }
            }
        }
    }
}

/// Initial rotation and scale of `run`.
fn run_initial_guess(
    run: usize,
    base_rotation: &Rotation3<f64>,
    base_scale: f64,
    params: &Find32Params,
) -> (Rotation3<f64>, f64) {
    if run == 0 {
        return (*base_rotation, base_scale);
    }
    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(run as u64));

    let rotation = if params.randomize_rotation {
        match params.restrict_rotation {
            Some(fraction) => random_rotation_near(&mut rng, fraction * PI) * base_rotation,
            None => uniform_random_rotation(&mut rng),
        }
    } else {
        *base_rotation
    };

    let scale = match params.scale {
        ScaleMode::Free if params.randomize_scale => {
            let exponent: f64 = rng.random_range(-1.0..=1.0);
            base_scale * SCALE_RANDOMIZATION_FACTOR.powf(exponent)
        }
        _ => base_scale,
    };
    (rotation, scale)
}

/// Rotation about a uniformly random axis by an angle up to `max_angle`.
fn random_rotation_near(rng: &mut StdRng, max_angle: f64) -> Rotation3<f64> {
    let z: f64 = rng.random_range(-1.0..=1.0);
    let phi: f64 = rng.random_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).max(0.0).sqrt();
    let angle = rng.random_range(0.0..=max_angle);
    let axis = Vector3::new(r * phi.cos(), r * phi.sin(), z);
    axis_angle_to_rotation(&[axis.x, axis.y, axis.z], angle)
        .unwrap_or_else(|_| Rotation3::identity())
}

/// Rotation drawn uniformly from SO(3) (Shoemake's method).
fn uniform_random_rotation(rng: &mut StdRng) -> Rotation3<f64> {
    let u1: f64 = rng.random();
    let u2: f64 = rng.random_range(0.0..2.0 * PI);
    let u3: f64 = rng.random_range(0.0..2.0 * PI);
    let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
    let q = Quaternion::new(b * u3.cos(), a * u2.sin(), a * u2.cos(), b * u3.sin());
    UnitQuaternion::new_normalize(q).to_rotation_matrix()
}

#[allow(clippy::too_many_arguments)]
fn run_once(
    run: usize,
    problem: &Find32Problem,
    rotation: &Rotation3<f64>,
    scale: f64,
    markers_3d: &[[f64; 3]],
    markers_2d: &[[f64; 2]],
    params: &Find32Params,
    cancel: Option<&CancellationToken>,
) -> RunOutcome {
    let initial = problem.layout().encode(rotation, scale);
    let result = match params.solver.optimize(problem, &initial, cancel) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("find32 run {run}: solver error: {e}");
            return RunOutcome::Failed(e.to_string());
        }
    };

    let transform = match problem.transform(&result.params) {
        Ok(transform) => transform,
        Err(e) => {
            log::debug!("find32 run {run}: invalid final parameters: {e}");
            return RunOutcome::Failed(format!("invalid final parameters: {e}"));
        }
    };
    let rms_error = match transform.rms_error(markers_3d, markers_2d) {
        Ok(rms) if rms.is_finite() => rms,
        _ => return RunOutcome::Failed("rms error is not finite".to_string()),
    };

    log::debug!(
        "find32 run {run}: scale {scale:.4} -> {:.4}, rms {rms_error:.6e} after {} iterations ({:?})",
        transform.scale,
        result.iterations,
        result.termination_reason
    );

    RunOutcome::Completed(RunSummary {
        run,
        transform,
        rms_error,
        termination_reason: result.termination_reason,
        iterations: result.iterations,
        initial_scale: scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use corr3d_geometry::rotation::rotation_distance;
    use corr3d_geometry::{EulerAngles, EulerConvention};
    use corr3d_optim::LevenbergMarquardt;

    const MARKERS: [[f64; 3]; 6] = [
        [0.0, 0.0, 0.0],
        [10.0, 0.0, 2.0],
        [0.0, 8.0, -3.0],
        [6.0, 7.0, 5.0],
        [-4.0, 3.0, 1.0],
        [3.0, -5.0, -2.0],
    ];

    fn truth() -> Result<RigidTransform3, RigidError> {
        Ok(RigidTransform3::new(
            axis_angle_to_rotation(&[0.4, -0.3, 1.0], 0.7)?,
            1.8,
            Vector3::new(12.0, -4.0, 0.0),
        ))
    }

    #[test]
    fn test_noiseless_recovery() -> Result<(), RigidError> {
        let truth = truth()?;
        let y = truth.project_points(&MARKERS);
        let params = Find32Params::default().with_num_runs(1);
        let result = find32(&MARKERS, &y, &params, None)?;

        assert!(result.success);
        assert!(result.rms_error < 1e-6);
        assert_eq!(result.best_run, 0);
        assert!(rotation_distance(&result.transform.rotation, &truth.rotation) < 1e-6);
        assert_relative_eq!(result.transform.scale, 1.8, epsilon = 1e-6);
        assert_relative_eq!(result.transform.translation, truth.translation, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_more_runs_never_worse() -> Result<(), RigidError> {
        let truth = RigidTransform3::new(
            axis_angle_to_rotation(&[1.0, 1.0, 0.2], 2.2)?,
            0.5,
            Vector3::new(-3.0, 4.0, 0.0),
        );
        let y = truth.project_points(&MARKERS);
        let mut previous = f64::INFINITY;
        for num_runs in [1, 4, 12] {
            let params = Find32Params::default().with_num_runs(num_runs).with_seed(42);
            let result = find32(&MARKERS, &y, &params, None)?;
            assert_eq!(result.runs.len(), num_runs);
            assert!(result.rms_error <= previous);
            previous = result.rms_error;
        }
        assert!(previous < 1e-3);
        Ok(())
    }

    #[test]
    fn test_runs_are_deterministic() -> Result<(), RigidError> {
        let y = truth()?.project_points(&MARKERS);
        let params = Find32Params::default().with_num_runs(6).with_seed(7);
        let a = find32(&MARKERS, &y, &params, None)?;
        let b = find32(&MARKERS, &y, &params, None)?;
        assert_eq!(a.best_run, b.best_run);
        for (ra, rb) in a.runs.iter().zip(&b.runs) {
            assert_eq!(ra.rms_error, rb.rms_error);
            assert_eq!(ra.initial_scale, rb.initial_scale);
        }
        Ok(())
    }

    #[test]
    fn test_square_rotated_30_degrees() -> Result<(), RigidError> {
        let square = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let truth = RigidTransform3::new(
            rotation_about_z(30f64.to_radians()),
            2.0,
            Vector3::zeros(),
        );
        let y = truth.project_points(&square);
        let result = find32(&square, &y, &Find32Params::default(), None)?;

        assert!(result.rms_error < 1e-6);
        assert!(rotation_distance(&result.transform.rotation, &truth.rotation) < 1e-5);
        assert_relative_eq!(result.transform.scale, 2.0, epsilon = 1e-6);
        let euler = result.transform.euler_angles(EulerConvention::ZXZ_EXTRINSIC);
        let total_z = euler.angles[0] + euler.angles[2];
        assert_relative_eq!(euler.angles[1], 0.0, epsilon = 1e-5);
        assert_relative_eq!(total_z.to_degrees(), 30.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_no_converged_run_returns_partial() -> Result<(), RigidError> {
        let y = truth()?.project_points(&MARKERS);
        let params = Find32Params::default()
            .with_num_runs(3)
            .with_solver(LevenbergMarquardt::default().with_max_iterations(0));
        match find32(&MARKERS, &y, &params, None) {
            Err(RigidError::DegenerateConfiguration {
                partial: Some(partial),
                ..
            }) => {
                assert!(!partial.success);
                assert_eq!(partial.status, TerminationReason::MaxIterations.code());
                assert_eq!(partial.runs.len(), 3);
                assert!(partial.runs.iter().all(|r| !r.termination_reason.is_success()));
                assert!(partial.rms_error.is_finite());
            }
            other => panic!("expected a degenerate configuration, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_fixed_scale() -> Result<(), RigidError> {
        let truth = truth()?;
        let y = truth.project_points(&MARKERS);
        let params = Find32Params::default()
            .with_scale(ScaleMode::Fixed(1.8))
            .with_num_runs(2);
        let result = find32(&MARKERS, &y, &params, None)?;
        assert_eq!(result.transform.scale, 1.8);
        assert!(result.rms_error < 1e-6);
        Ok(())
    }

    #[test]
    fn test_affine_seed() -> Result<(), RigidError> {
        // large in-plane rotation, small tilt
        let rotation = rotation_about_z(2.8) * axis_angle_to_rotation(&[1.0, 0.0, 0.0], 0.1)?;
        let truth = RigidTransform3::new(rotation, 3.0, Vector3::new(1.0, 2.0, 0.0));
        let y = truth.project_points(&MARKERS);
        let params = Find32Params::default()
            .with_initial_rotation(InitialRotation::FromAffine2D)
            .with_initial_scale(3.0)
            .with_num_runs(1);
        let result = find32(&MARKERS, &y, &params, None)?;
        assert!(result.rms_error < 1e-6);
        assert!(rotation_distance(&result.transform.rotation, &rotation) < 1e-5);
        Ok(())
    }

    #[test]
    fn test_euler_mode() -> Result<(), RigidError> {
        let convention = EulerConvention::ZXZ_INTRINSIC;
        let truth = RigidTransform3::new(
            EulerAngles::from_degrees(convention, [20.0, 35.0, -15.0]).to_rotation(),
            1.2,
            Vector3::new(0.5, 0.5, 0.0),
        );
        let y = truth.project_points(&MARKERS);
        let initial = EulerAngles::from_degrees(convention, [10.0, 30.0, -5.0]);
        let params = Find32Params::default()
            .with_rotation_mode(RotationMode::Euler(convention))
            .with_initial_rotation(InitialRotation::Euler(initial))
            .with_restrict_rotation(Some(0.1))
            .with_num_runs(4);
        let result = find32(&MARKERS, &y, &params, None)?;

        assert!(result.rms_error < 1e-6);
        let RotationParams::Euler(angles) = result.rotation_params else {
            panic!("expected Euler parameters");
        };
        assert_eq!(angles.convention, convention);
        let degrees = angles.to_degrees();
        assert_relative_eq!(degrees[0], 20.0, epsilon = 1e-3);
        assert_relative_eq!(degrees[1], 35.0, epsilon = 1e-3);
        assert_relative_eq!(degrees[2], -15.0, epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn test_cancelled() -> Result<(), RigidError> {
        let y = truth()?.project_points(&MARKERS);
        let token = CancellationToken::new();
        token.cancel();
        let result = find32(&MARKERS, &y, &Find32Params::default(), Some(&token));
        assert!(matches!(result, Err(RigidError::Cancelled)));
        Ok(())
    }

    #[test]
    fn test_too_few_markers() {
        let result = find32(
            &MARKERS[..2],
            &[[0.0, 0.0], [1.0, 1.0]],
            &Find32Params::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(RigidError::DegenerateConfiguration { partial: None, .. })
        ));
    }

    #[test]
    fn test_coincident_markers() {
        let x = [[1.0, 1.0, 1.0]; 4];
        let y = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        assert!(matches!(
            find32(&x, &y, &Find32Params::default(), None),
            Err(RigidError::DegenerateConfiguration { partial: None, .. })
        ));
    }

    #[test]
    fn test_collinear_markers_return_partial() -> Result<(), RigidError> {
        let x = [
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 1.0],
            [2.0, 2.0, 2.0],
            [4.0, 4.0, 4.0],
        ];
        let y = truth()?.project_points(&x);
        let params = Find32Params::default().with_num_runs(4);
        match find32(&x, &y, &params, None) {
            Err(RigidError::DegenerateConfiguration {
                partial: Some(partial),
                ..
            }) => {
                assert!(partial.rms_error < 1e-3);
                assert_eq!(partial.num_runs, 4);
            }
            other => panic!("expected a degenerate configuration, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_mismatched_and_invalid() {
        assert!(matches!(
            find32(&MARKERS, &[[0.0, 0.0]; 5], &Find32Params::default(), None),
            Err(RigidError::MismatchedLengths {
                markers_3d: 6,
                markers_2d: 5
            })
        ));
        let y = [[0.0, 0.0]; 6];
        for params in [
            Find32Params::default().with_num_runs(0),
            Find32Params::default().with_scale(ScaleMode::Fixed(0.0)),
            Find32Params::default().with_restrict_rotation(Some(1.5)),
        ] {
            assert!(matches!(
                find32(&MARKERS, &y, &params, None),
                Err(RigidError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_recalculate_translation() -> Result<(), RigidError> {
        let truth = truth()?;
        let y = truth.project_points(&MARKERS);
        let result = find32(&MARKERS, &y, &Find32Params::default().with_num_runs(1), None)?;
        assert_relative_eq!(
            result.recalculate_translation(&[0.0; 3]),
            result.transform.translation
        );

        // re-fitting markers expressed about the center gives the re-based translation
        let center = [5.0, -2.0, 1.0];
        let shifted: Vec<[f64; 3]> = MARKERS
            .iter()
            .map(|p| [p[0] - center[0], p[1] - center[1], p[2] - center[2]])
            .collect();
        let y_shifted: Vec<[f64; 2]> = y
            .iter()
            .map(|p| [p[0] - center[0], p[1] - center[1]])
            .collect();
        let refit = find32(&shifted, &y_shifted, &Find32Params::default().with_num_runs(1), None)?;
        let rebased = result.recalculate_translation(&center);
        assert_relative_eq!(refit.transform.translation.x, rebased.x, epsilon = 1e-5);
        assert_relative_eq!(refit.transform.translation.y, rebased.y, epsilon = 1e-5);
        Ok(())
    }
}
