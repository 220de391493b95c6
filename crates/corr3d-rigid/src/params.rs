use corr3d_geometry::{EulerAngles, EulerConvention, RotationParams};
use corr3d_optim::LevenbergMarquardt;
use serde::{Deserialize, Serialize};

/// Whether the scale is estimated or held constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScaleMode {
    /// The scale is fixed to the given value and not optimized.
    Fixed(f64),
    /// The scale is a free parameter.
    Free,
}

/// Where the first run starts its rotation from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitialRotation {
    /// No rotation.
    Identity,
    /// In-plane rotation of a 2D affine fit between the xy components of the
    /// 3D markers and the 2D markers.
    FromAffine2D,
    /// Explicit Euler angles.
    Euler(EulerAngles),
    /// Explicit rotation in any parametrization.
    Parameters(RotationParams),
}

/// Rotation parametrization used by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RotationMode {
    /// Four Cayley-Klein parameters with a unit norm constraint.
    CayleyKlein,
    /// Three Euler angles of the given convention.
    Euler(EulerConvention),
}

/// Parameters of [`find32`](crate::find32).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Find32Params {
    /// Fixed or free scale.
    pub scale: ScaleMode,
    /// Initial rotation of the first run.
    pub initial_rotation: InitialRotation,
    /// Rotation parametrization of the optimizer.
    pub rotation_mode: RotationMode,
    /// Bound on random rotation perturbations as a fraction of a half turn,
    /// in `(0, 1]`. `None` draws rotations uniformly.
    pub restrict_rotation: Option<f64>,
    /// Perturb the initial rotation in runs after the first.
    pub randomize_rotation: bool,
    /// Perturb the initial scale in runs after the first (free scale only).
    pub randomize_scale: bool,
    /// Initial scale of a free-scale fit.
    pub initial_scale: f64,
    /// Number of optimization runs.
    pub num_runs: usize,
    /// Seed of the per-run random generators.
    pub seed: u64,
    /// Solver configuration of every run.
    pub solver: LevenbergMarquardt,
}

impl Default for Find32Params {
    fn default() -> Self {
        Self {
            scale: ScaleMode::Free,
            initial_rotation: InitialRotation::Identity,
            rotation_mode: RotationMode::CayleyKlein,
            restrict_rotation: None,
            randomize_rotation: true,
            randomize_scale: true,
            initial_scale: 1.0,
            num_runs: 10,
            seed: 0,
            solver: LevenbergMarquardt::default(),
        }
    }
}

impl Find32Params {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scale mode.
    pub fn with_scale(mut self, scale: ScaleMode) -> Self {
        self.scale = scale;
        self
    }

    /// Set the initial rotation.
    pub fn with_initial_rotation(mut self, initial: InitialRotation) -> Self {
        self.initial_rotation = initial;
        self
    }

    /// Set the rotation parametrization.
    pub fn with_rotation_mode(mut self, mode: RotationMode) -> Self {
        self.rotation_mode = mode;
        self
    }

    /// Restrict random rotations to a fraction of a half turn.
    pub fn with_restrict_rotation(mut self, fraction: Option<f64>) -> Self {
        self.restrict_rotation = fraction;
        self
    }

    /// Enable or disable rotation randomization.
    pub fn with_randomize_rotation(mut self, randomize: bool) -> Self {
        self.randomize_rotation = randomize;
        self
    }

    /// Enable or disable scale randomization.
    pub fn with_randomize_scale(mut self, randomize: bool) -> Self {
        self.randomize_scale = randomize;
        self
    }

    /// Set the initial scale.
    pub fn with_initial_scale(mut self, scale: f64) -> Self {
        self.initial_scale = scale;
        self
    }

    /// Set the number of runs.
    pub fn with_num_runs(mut self, num_runs: usize) -> Self {
        self.num_runs = num_runs;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the solver configuration.
    pub fn with_solver(mut self, solver: LevenbergMarquardt) -> Self {
        self.solver = solver;
        self
    }

    /// Scale the first run starts from.
    pub(crate) fn base_scale(&self) -> f64 {
        match self.scale {
            ScaleMode::Fixed(s) => s,
            ScaleMode::Free => self.initial_scale,
        }
    }
}
