use nalgebra::{Matrix2x3, Matrix3, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::affine::Affine2;
use crate::rotation::{self, EulerAngles, EulerConvention};
use crate::utils::{check_lengths, rms_distance2};
use crate::GeometryError;

/// Scaled rigid-body transform `y = scale · R · x + translation`.
///
/// Points mapped into the 2D target space are projected orthographically
/// along z, i.e. only the first two components of `y` are kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform3 {
    /// Rotation.
    pub rotation: Rotation3<f64>,
    /// Uniform scale.
    pub scale: f64,
    /// Translation. The z component is not observable through projection.
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform3 {
    /// Create a transform from its parts.
    pub fn new(rotation: Rotation3<f64>, scale: f64, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            scale,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Rotation3::identity(), 1.0, Vector3::zeros())
    }

    /// Linear part `scale · R`.
    pub fn gl(&self) -> Matrix3<f64> {
        self.rotation.matrix() * self.scale
    }

    /// Map a 3D point.
    pub fn transform_point(&self, p: &[f64; 3]) -> [f64; 3] {
        let v = self.gl() * Vector3::new(p[0], p[1], p[2]) + self.translation;
        [v.x, v.y, v.z]
    }

    /// Map 3D points.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        let gl = self.gl();
        points
            .iter()
            .map(|p| {
                let v = gl * Vector3::new(p[0], p[1], p[2]) + self.translation;
                [v.x, v.y, v.z]
            })
            .collect()
    }

    /// Map 3D points and project them onto the xy plane.
    pub fn project_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 2]> {
        self.transform_points(points)
            .into_iter()
            .map(|p| [p[0], p[1]])
            .collect()
    }

    /// RMS distance between projected `x` and the 2D targets `y`.
    pub fn rms_error(&self, x: &[[f64; 3]], y: &[[f64; 2]]) -> Result<f64, GeometryError> {
        check_lengths("3D points", x.len(), "2D points", y.len())?;
        Ok(rms_distance2(&self.project_points(x), y))
    }

    /// The inverse 3D transform.
    ///
    /// # Errors
    ///
    /// [`GeometryError::NonInvertible`] if the scale is zero or not finite.
    pub fn inverse(&self) -> Result<Self, GeometryError> {
        if !self.scale.is_finite() || self.scale.abs() < f64::EPSILON {
            return Err(GeometryError::NonInvertible(format!(
                "scale {} has no inverse",
                self.scale
            )));
        }
        let rotation = self.rotation.inverse();
        let scale = 1.0 / self.scale;
        let translation = -(rotation.matrix() * self.translation) * scale;
        Ok(Self::new(rotation, scale, translation))
    }

    /// Map 3D points back through the inverse transform.
    pub fn inverse_transform_points(
        &self,
        points: &[[f64; 3]],
    ) -> Result<Vec<[f64; 3]>, GeometryError> {
        Ok(self.inverse()?.transform_points(points))
    }

    /// Translation of the same transform written about a rotation center.
    ///
    /// Returns `t_c` such that `y = scale · R · (x - center) + center + t_c`
    /// maps every point exactly as `y = scale · R · x + translation`. A zero
    /// center returns the translation unchanged.
    pub fn recalculate_translation(&self, center: &[f64; 3]) -> Vector3<f64> {
        let c = Vector3::new(center[0], center[1], center[2]);
        self.translation + (self.gl() - Matrix3::identity()) * c
    }

    /// Whether the rotation matrix is orthonormal within `tol`.
    pub fn is_orthonormal(&self, tol: f64) -> bool {
        rotation::is_orthonormal(self.rotation.matrix(), tol)
            && (self.rotation.matrix().determinant() - 1.0).abs() <= tol
    }

    /// Rotation as Euler angles of `convention`.
    pub fn euler_angles(&self, convention: EulerConvention) -> EulerAngles {
        EulerAngles::from_rotation(&self.rotation, convention)
    }

    /// Rotation as Cayley-Klein parameters.
    pub fn cayley_klein(&self) -> [f64; 4] {
        rotation::rotation_to_cayley_klein(&self.rotation)
    }

    /// Equivalent transform with a non-negative scale.
    ///
    /// A negative scale is folded into a half turn about z. The projected 2D
    /// image is unchanged; the z component of mapped points flips sign.
    pub fn with_positive_scale(&self) -> Self {
        if self.scale >= 0.0 {
            return *self;
        }
        let half_turn = rotation::rotation_about_z(std::f64::consts::PI);
        Self::new(half_turn * self.rotation, -self.scale, self.translation)
    }

    /// The projected map as a 3D-to-2D affine transform.
    pub fn to_affine_3to2(&self) -> Affine3To2 {
        let gl = self.gl();
        Affine3To2 {
            matrix: gl.fixed_rows::<2>(0).into_owned(),
            translation: self.translation.xy(),
        }
    }
}

/// Affine map from 3D to 2D, `y = matrix · x + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine3To2 {
    /// 2x3 linear part.
    pub matrix: Matrix2x3<f64>,
    /// 2D translation.
    pub translation: Vector2<f64>,
}

impl Affine3To2 {
    /// Map 3D points into 2D.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 2]> {
        points
            .iter()
            .map(|p| {
                let v = self.matrix * Vector3::new(p[0], p[1], p[2]) + self.translation;
                [v.x, v.y]
            })
            .collect()
    }

    /// Apply `self` and then a 2D affine transform.
    pub fn then(&self, after: &Affine2) -> Affine3To2 {
        Affine3To2 {
            matrix: after.gl * self.matrix,
            translation: after.gl * self.translation + after.translation,
        }
    }
}
