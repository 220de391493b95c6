//! Residual model of the 3D-to-2D fit.
//!
//! For centered markers `x̃ = x - x̄` and `ỹ = y - ȳ` the residual of marker
//! `i` is `P(s · R · x̃_i) - ỹ_i`, where `P` keeps the first two components.
//! The optimal translation `ȳ - P(s · R · x̄)` is eliminated in closed form,
//! so only the rotation and, when free, the scale are optimized.

use corr3d_geometry::rotation::{cayley_klein_to_rotation, rotation_to_cayley_klein};
use corr3d_geometry::{EulerAngles, GeometryError, RigidTransform3};
use corr3d_optim::{LeastSquaresProblem, OptimizerError};
use nalgebra::{Rotation3, Vector2, Vector3};

use crate::RotationMode;

/// Layout of the optimizer parameter vector.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParamLayout {
    pub rotation: RotationMode,
    /// `Some` when the scale is held constant.
    pub fixed_scale: Option<f64>,
}

impl ParamLayout {
    fn rotation_len(&self) -> usize {
        match self.rotation {
            RotationMode::CayleyKlein => 4,
            RotationMode::Euler(_) => 3,
        }
    }

    pub fn num_params(&self) -> usize {
        self.rotation_len() + usize::from(self.fixed_scale.is_none())
    }

    /// Unit norm constraint of the Cayley-Klein parameters.
    fn num_constraints(&self) -> usize {
        match self.rotation {
            RotationMode::CayleyKlein => 1,
            RotationMode::Euler(_) => 0,
        }
    }

    pub fn encode(&self, rotation: &Rotation3<f64>, scale: f64) -> Vec<f64> {
        let mut params = match self.rotation {
            RotationMode::CayleyKlein => rotation_to_cayley_klein(rotation).to_vec(),
            RotationMode::Euler(convention) => {
                EulerAngles::from_rotation(rotation, convention).angles.to_vec()
            }
        };
        if self.fixed_scale.is_none() {
            params.push(scale);
        }
        params
    }

    pub fn decode(&self, params: &[f64]) -> Result<(Rotation3<f64>, f64), GeometryError> {
        let rotation = match self.rotation {
            RotationMode::CayleyKlein => {
                cayley_klein_to_rotation(&[params[0], params[1], params[2], params[3]])?
            }
            RotationMode::Euler(convention) => {
                EulerAngles::new(convention, [params[0], params[1], params[2]]).to_rotation()
            }
        };
        let scale = match self.fixed_scale {
            Some(s) => s,
            None => params[self.rotation_len()],
        };
        Ok((rotation, scale))
    }
}

/// Markers of one fit, centered on their centroids.
pub(crate) struct Find32Problem {
    layout: ParamLayout,
    x: Vec<Vector3<f64>>,
    y: Vec<Vector2<f64>>,
    x_mean: Vector3<f64>,
    y_mean: Vector2<f64>,
}

impl Find32Problem {
    pub fn new(layout: ParamLayout, x: &[[f64; 3]], y: &[[f64; 2]]) -> Self {
        let n = x.len().max(1) as f64;
        let x_mean = x.iter().map(|p| Vector3::new(p[0], p[1], p[2])).sum::<Vector3<f64>>() / n;
        let y_mean = y.iter().map(|p| Vector2::new(p[0], p[1])).sum::<Vector2<f64>>() / n;
        Self {
            layout,
            x: x.iter()
                .map(|p| Vector3::new(p[0], p[1], p[2]) - x_mean)
                .collect(),
            y: y.iter().map(|p| Vector2::new(p[0], p[1]) - y_mean).collect(),
            x_mean,
            y_mean,
        }
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    /// Transform with the closed-form translation for the given parameters.
    ///
    /// The unobservable z translation is set to zero and a negative scale is
    /// folded into the rotation.
    pub fn transform(&self, params: &[f64]) -> Result<RigidTransform3, GeometryError> {
        let (rotation, scale) = self.layout.decode(params)?;
        let transform =
            RigidTransform3::new(rotation, scale, Vector3::zeros()).with_positive_scale();
        let moved_mean = transform.gl() * self.x_mean;
        let t = self.y_mean - moved_mean.xy();
        Ok(RigidTransform3 {
            translation: Vector3::new(t.x, t.y, 0.0),
            ..transform
        })
    }
}

impl LeastSquaresProblem for Find32Problem {
    fn num_params(&self) -> usize {
        self.layout.num_params()
    }

    fn num_residuals(&self) -> usize {
        2 * self.x.len() + self.layout.num_constraints()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) -> Result<(), OptimizerError> {
        let Ok((rotation, scale)) = self.layout.decode(params) else {
            // invalid parameters make the step non-finite and it gets rejected
            out.fill(f64::NAN);
            return Ok(());
        };

        let gl = rotation.matrix() * scale;
        for (i, (x, y)) in self.x.iter().zip(&self.y).enumerate() {
            let p = gl * x;
            out[2 * i] = p.x - y.x;
            out[2 * i + 1] = p.y - y.y;
        }
        if let RotationMode::CayleyKlein = self.layout.rotation {
            let norm_sq: f64 = params[..4].iter().map(|e| e * e).sum();
            out[2 * self.x.len()] = norm_sq - 1.0;
        }
        Ok(())
    }
}
