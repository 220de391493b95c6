use nalgebra::{DMatrix, Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::decompose::{GlDecomposition, SvdDecomposition};
use crate::utils::{centroid2, check_lengths, rms_distance2};
use crate::GeometryError;

/// Relative singular value below which a centered point set is rank deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// A 2D affine transformation `y = gl · x + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    /// General linear part.
    pub gl: Matrix2<f64>,
    /// Translation.
    pub translation: Vector2<f64>,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine2 {
    /// Create an affine transformation from its GL matrix and translation.
    pub fn new(gl: Matrix2<f64>, translation: Vector2<f64>) -> Self {
        Self { gl, translation }
    }

    /// The identity transformation.
    pub fn identity() -> Self {
        Self::new(Matrix2::identity(), Vector2::zeros())
    }

    /// Least-squares affine transformation mapping `x` onto `y`.
    ///
    /// The solution is exact for three non-collinear points and the
    /// least-squares optimum for more.
    ///
    /// # Arguments
    ///
    /// * `x` - Source points.
    /// * `y` - Destination points, `y[i]` corresponds to `x[i]`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::SingularConfiguration`] if the source points are fewer
    /// than three, coincident or collinear.
    pub fn fit(x: &[[f64; 2]], y: &[[f64; 2]]) -> Result<Self, GeometryError> {
        check_lengths("source points", x.len(), "destination points", y.len())?;
        let gl = fit_gl(x, y)?;
        let translation = mean_translation(&gl, x, y);
        Ok(Self::new(gl, translation))
    }

    /// Two-stage fit: GL matrix from one correspondence set, translation from another.
    ///
    /// The GL matrix is estimated from `x_gl`/`y_gl`, which only need to share
    /// shape and orientation. The translation is then the least-squares
    /// displacement of `x_d`/`y_d` with the GL matrix held fixed.
    pub fn fit_separate(
        x_gl: &[[f64; 2]],
        y_gl: &[[f64; 2]],
        x_d: &[[f64; 2]],
        y_d: &[[f64; 2]],
    ) -> Result<Self, GeometryError> {
        check_lengths("gl source points", x_gl.len(), "gl destination points", y_gl.len())?;
        check_lengths(
            "translation source points",
            x_d.len(),
            "translation destination points",
            y_d.len(),
        )?;
        if x_d.is_empty() {
            return Err(GeometryError::SingularConfiguration { points: 0, rank: 0 });
        }
        let gl = fit_gl(x_gl, y_gl)?;
        let translation = mean_translation(&gl, x_d, y_d);
        Ok(Self::new(gl, translation))
    }

    /// Apply the transformation to a point.
    pub fn transform_point(&self, p: &[f64; 2]) -> [f64; 2] {
        let v = self.gl * Vector2::new(p[0], p[1]) + self.translation;
        [v.x, v.y]
    }

    /// Apply the transformation to a set of points.
    pub fn transform_points(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// The inverse transformation.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NonInvertible`] if the GL matrix is singular.
    pub fn inverse(&self) -> Result<Self, GeometryError> {
        let gl_inv = self
            .gl
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or_else(|| GeometryError::NonInvertible("GL matrix is singular".to_string()))?;
        Ok(Self::new(gl_inv, -(gl_inv * self.translation)))
    }

    /// Map points back through the inverse transformation.
    pub fn inverse_transform_points(
        &self,
        points: &[[f64; 2]],
    ) -> Result<Vec<[f64; 2]>, GeometryError> {
        Ok(self.inverse()?.transform_points(points))
    }

    /// The transformation applying `self` first and then `after`.
    pub fn then(&self, after: &Affine2) -> Affine2 {
        Affine2::new(
            after.gl * self.gl,
            after.gl * self.translation + after.translation,
        )
    }

    /// Per-point residuals `transform(x[i]) - y[i]`.
    pub fn residuals(
        &self,
        x: &[[f64; 2]],
        y: &[[f64; 2]],
    ) -> Result<Vec<[f64; 2]>, GeometryError> {
        check_lengths("source points", x.len(), "destination points", y.len())?;
        Ok(self
            .transform_points(x)
            .iter()
            .zip(y)
            .map(|(p, q)| [p[0] - q[0], p[1] - q[1]])
            .collect())
    }

    /// Root-mean-square distance between `transform(x)` and `y`.
    pub fn rms_error(&self, x: &[[f64; 2]], y: &[[f64; 2]]) -> Result<f64, GeometryError> {
        check_lengths("source points", x.len(), "destination points", y.len())?;
        Ok(rms_distance2(&self.transform_points(x), y))
    }

    /// Decompose the GL matrix into rotation, scales, parity and shear.
    pub fn decompose(&self) -> Result<GlDecomposition, GeometryError> {
        GlDecomposition::from_gl(&self.gl)
    }

    /// Decompose the GL matrix by singular values.
    pub fn decompose_svd(&self) -> Result<SvdDecomposition, GeometryError> {
        SvdDecomposition::from_gl(&self.gl)
    }
}

/// Least-squares GL matrix on centered coordinates.
fn fit_gl(x: &[[f64; 2]], y: &[[f64; 2]]) -> Result<Matrix2<f64>, GeometryError> {
    let n = x.len();
    let cx = centroid2(x);
    let cy = centroid2(y);

    let xc = DMatrix::from_fn(n, 2, |i, j| x[i][j] - cx[j]);
    let yc = DMatrix::from_fn(n, 2, |i, j| y[i][j] - cy[j]);

    let svd = xc.svd(true, true);
    let rank = numerical_rank(svd.singular_values.as_slice());
    if n < 3 || rank < 2 {
        return Err(GeometryError::SingularConfiguration { points: n, rank });
    }

    // xc · glᵀ = yc
    let gl_t = svd
        .solve(&yc, 0.0)
        .map_err(|_| GeometryError::SingularConfiguration { points: n, rank })?;

    Ok(Matrix2::new(
        gl_t[(0, 0)],
        gl_t[(1, 0)],
        gl_t[(0, 1)],
        gl_t[(1, 1)],
    ))
}

fn numerical_rank(singular_values: &[f64]) -> usize {
    let max = singular_values.iter().cloned().fold(0.0, f64::max);
    if max <= f64::EPSILON {
        return 0;
    }
    singular_values
        .iter()
        .filter(|s| **s > RANK_TOLERANCE * max)
        .count()
}

/// Translation minimizing `Σ |gl · x + t - y|²` for a fixed `gl`.
fn mean_translation(gl: &Matrix2<f64>, x: &[[f64; 2]], y: &[[f64; 2]]) -> Vector2<f64> {
    let cx = centroid2(x);
    let cy = centroid2(y);
    Vector2::new(cy[0], cy[1]) - gl * Vector2::new(cx[0], cx[1])
}
