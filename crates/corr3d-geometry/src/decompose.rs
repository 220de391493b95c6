use nalgebra::{Matrix2, Rotation2};
use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Relative magnitude below which a scale factor is treated as zero.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Fixed-order factorization of a 2x2 GL matrix.
///
/// `gl = R(angle) · diag(scale[0], ±scale[1]) · [[1, shear], [0, 1]]`, where
/// the second scale carries a negative sign when `parity` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlDecomposition {
    /// Rotation angle in radians, in `(-π, π]`.
    pub angle: f64,
    /// Positive scale factors along the first and second axis.
    pub scale: [f64; 2],
    /// Whether the map contains a reflection (negative determinant).
    pub parity: bool,
    /// Shear coefficient.
    pub shear: f64,
}

impl GlDecomposition {
    /// Factor a GL matrix.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NonInvertible`] if the matrix is singular.
    pub fn from_gl(gl: &Matrix2<f64>) -> Result<Self, GeometryError> {
        check_finite(gl)?;
        let s1 = gl.column(0).norm();
        let magnitude = gl.amax();
        if s1 <= SINGULAR_TOLERANCE * magnitude.max(1.0) {
            return Err(GeometryError::NonInvertible(
                "first column of the GL matrix vanishes".to_string(),
            ));
        }

        let angle = gl[(1, 0)].atan2(gl[(0, 0)]);
        // upper triangular remainder [[s1, s1 * shear], [0, ±s2]]
        let b = Rotation2::new(angle).matrix().transpose() * gl;
        let signed_s2 = b[(1, 1)];
        if signed_s2.abs() <= SINGULAR_TOLERANCE * magnitude.max(1.0) {
            return Err(GeometryError::NonInvertible(
                "GL matrix has a zero determinant".to_string(),
            ));
        }

        Ok(Self {
            angle,
            scale: [s1, signed_s2.abs()],
            parity: signed_s2 < 0.0,
            shear: b[(0, 1)] / s1,
        })
    }

    /// Rebuild the GL matrix.
    pub fn compose(&self) -> Matrix2<f64> {
        let sign = if self.parity { -1.0 } else { 1.0 };
        let scale = Matrix2::new(self.scale[0], 0.0, 0.0, sign * self.scale[1]);
        let shear = Matrix2::new(1.0, self.shear, 0.0, 1.0);
        Rotation2::new(self.angle).matrix() * scale * shear
    }
}

/// Singular value factorization of a 2x2 GL matrix.
///
/// `gl = R(u_angle) · P · diag(scale[0], scale[1]) · R(v_angle)` with
/// `P = diag(1, -1)` when `parity` is set and the identity otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvdDecomposition {
    /// Angle of the left rotation in radians.
    pub u_angle: f64,
    /// Singular values, largest first.
    pub scale: [f64; 2],
    /// Whether the map contains a reflection.
    pub parity: bool,
    /// Angle of the right rotation in radians.
    pub v_angle: f64,
}

impl SvdDecomposition {
    /// Factor a GL matrix by singular values.
    pub fn from_gl(gl: &Matrix2<f64>) -> Result<Self, GeometryError> {
        check_finite(gl)?;
        let svd = gl.svd(true, true);
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(GeometryError::NonInvertible(
                "singular value decomposition failed".to_string(),
            ));
        };
        let (s_max, s_min) = (
            svd.singular_values[0].max(svd.singular_values[1]),
            svd.singular_values[0].min(svd.singular_values[1]),
        );
        if s_max <= f64::EPSILON || s_min <= SINGULAR_TOLERANCE * s_max {
            return Err(GeometryError::NonInvertible(
                "GL matrix has a zero singular value".to_string(),
            ));
        }

        let flip = Matrix2::new(1.0, 0.0, 0.0, -1.0);
        let u_reflects = u.determinant() < 0.0;
        let v_reflects = v_t.determinant() < 0.0;
        // u = R_u · F and v_t = F · R_v; F commutes with the diagonal
        let r_u = if u_reflects { u * flip } else { u };
        let r_v = if v_reflects { flip * v_t } else { v_t };

        Ok(Self {
            u_angle: r_u[(1, 0)].atan2(r_u[(0, 0)]),
            scale: [svd.singular_values[0], svd.singular_values[1]],
            parity: u_reflects != v_reflects,
            v_angle: r_v[(1, 0)].atan2(r_v[(0, 0)]),
        })
    }

    /// Rebuild the GL matrix.
    pub fn compose(&self) -> Matrix2<f64> {
        let sign = if self.parity { -1.0 } else { 1.0 };
        let parity = Matrix2::new(1.0, 0.0, 0.0, sign);
        let scale = Matrix2::new(self.scale[0], 0.0, 0.0, self.scale[1]);
        Rotation2::new(self.u_angle).matrix() * parity * scale * Rotation2::new(self.v_angle).matrix()
    }
}

fn check_finite(gl: &Matrix2<f64>) -> Result<(), GeometryError> {
    if gl.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GeometryError::NonInvertible(
            "GL matrix has non-finite entries".to_string(),
        ))
    }
}
