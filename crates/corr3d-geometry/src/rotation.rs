//! Rotation parametrizations.
//!
//! A 3D rotation is carried either as a rotation matrix ([`Rotation3`]), as
//! Cayley-Klein parameters `[e0, e1, e2, e3]` (a unit quaternion with the
//! scalar part first), or as three Euler angles under an explicit
//! [`EulerConvention`]. [`RotationParams`] is the tagged variant used by the
//! estimators; every variant converts to and from a rotation matrix.
//!
//! All rotations are active: they move points, not coordinate frames.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// Sequence of rotation axes of an Euler convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EulerAxes {
    /// z, x', z'' (Goldstein's "x-convention").
    Zxz,
    /// z, y', z'' (the "y-convention").
    Zyz,
}

/// Whether successive Euler rotations are about moving or fixed axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Each rotation is about an axis of the already rotated body frame.
    Intrinsic,
    /// Each rotation is about an axis of the fixed laboratory frame.
    Extrinsic,
}

/// An Euler angle convention: axis sequence plus frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EulerConvention {
    /// Axis sequence.
    pub axes: EulerAxes,
    /// Intrinsic or extrinsic composition.
    pub frame: Frame,
}

impl EulerConvention {
    /// ZXZ about fixed axes.
    pub const ZXZ_EXTRINSIC: Self = Self {
        axes: EulerAxes::Zxz,
        frame: Frame::Extrinsic,
    };
    /// ZXZ about moving axes.
    pub const ZXZ_INTRINSIC: Self = Self {
        axes: EulerAxes::Zxz,
        frame: Frame::Intrinsic,
    };
    /// ZYZ about fixed axes.
    pub const ZYZ_EXTRINSIC: Self = Self {
        axes: EulerAxes::Zyz,
        frame: Frame::Extrinsic,
    };
    /// ZYZ about moving axes.
    pub const ZYZ_INTRINSIC: Self = Self {
        axes: EulerAxes::Zyz,
        frame: Frame::Intrinsic,
    };
}

impl Default for EulerConvention {
    fn default() -> Self {
        Self::ZXZ_EXTRINSIC
    }
}

impl FromStr for EulerConvention {
    type Err = String;

    /// Parse `zxz_ex`, `zxz_in`, `zyz_ex`, `zyz_in`, or the short forms
    /// `x` (ZXZ extrinsic) and `y` (ZYZ extrinsic).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" | "zxz" | "zxz_ex" | "zxz_extrinsic" => Ok(Self::ZXZ_EXTRINSIC),
            "zxz_in" | "zxz_intrinsic" => Ok(Self::ZXZ_INTRINSIC),
            "y" | "zyz" | "zyz_ex" | "zyz_extrinsic" => Ok(Self::ZYZ_EXTRINSIC),
            "zyz_in" | "zyz_intrinsic" => Ok(Self::ZYZ_INTRINSIC),
            _ => Err(format!("Unsupported Euler convention '{s}'")),
        }
    }
}

impl fmt::Display for EulerConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axes = match self.axes {
            EulerAxes::Zxz => "zxz",
            EulerAxes::Zyz => "zyz",
        };
        let frame = match self.frame {
            Frame::Intrinsic => "in",
            Frame::Extrinsic => "ex",
        };
        write!(f, "{axes}_{frame}")
    }
}

/// Euler angles `[phi, theta, psi]` in radians, in the order the rotations are applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Convention the angles are expressed in.
    pub convention: EulerConvention,
    /// `[phi, theta, psi]` in radians.
    pub angles: [f64; 3],
}

impl EulerAngles {
    /// Create Euler angles from radians.
    pub fn new(convention: EulerConvention, angles: [f64; 3]) -> Self {
        Self { convention, angles }
    }

    /// Create Euler angles from degrees.
    pub fn from_degrees(convention: EulerConvention, degrees: [f64; 3]) -> Self {
        Self::new(convention, degrees.map(f64::to_radians))
    }

    /// The angles in degrees.
    pub fn to_degrees(&self) -> [f64; 3] {
        self.angles.map(f64::to_degrees)
    }

    /// Rotation matrix of these angles.
    pub fn to_rotation(&self) -> Rotation3<f64> {
        let [phi, theta, psi] = self.angles;
        let second = second_axis(self.convention.axes);
        let z = Vector3::z_axis();
        let rz = |a: f64| Rotation3::from_axis_angle(&z, a);
        let r2 = Rotation3::from_axis_angle(&second, theta);

        match self.convention.frame {
            // moving axes: R = Rz(phi) R2(theta) Rz(psi)
            Frame::Intrinsic => rz(phi) * r2 * rz(psi),
            // fixed axes: R = Rz(psi) R2(theta) Rz(phi)
            Frame::Extrinsic => rz(psi) * r2 * rz(phi),
        }
    }

    /// Decompose a rotation into Euler angles of the given convention.
    ///
    /// In gimbal lock (`theta` = 0 or π) the split between the two z
    /// rotations is arbitrary; the whole z rotation is assigned to the
    /// leftmost z factor of the matrix product, i.e. `phi` for intrinsic and
    /// `psi` for extrinsic conventions, and the other z angle is zero.
    pub fn from_rotation(rotation: &Rotation3<f64>, convention: EulerConvention) -> Self {
        let [a, theta, b] = intrinsic_angles(rotation.matrix(), convention.axes);
        let angles = match convention.frame {
            Frame::Intrinsic => [a, theta, b],
            Frame::Extrinsic => [b, theta, a],
        };
        Self { convention, angles }
    }
}

/// Tagged rotation parametrization used by the estimators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RotationParams {
    /// Cayley-Klein parameters `[e0, e1, e2, e3]`; normalized on conversion.
    CayleyKlein([f64; 4]),
    /// Euler angles under an explicit convention.
    Euler(EulerAngles),
}

impl RotationParams {
    /// Identity rotation as Cayley-Klein parameters.
    pub fn identity() -> Self {
        Self::CayleyKlein([1.0, 0.0, 0.0, 0.0])
    }

    /// Rotation matrix of these parameters.
    pub fn to_rotation(&self) -> Result<Rotation3<f64>, GeometryError> {
        match self {
            Self::CayleyKlein(e) => cayley_klein_to_rotation(e),
            Self::Euler(euler) => Ok(euler.to_rotation()),
        }
    }

    /// Convert to normalized Cayley-Klein parameters.
    pub fn to_cayley_klein(&self) -> Result<[f64; 4], GeometryError> {
        Ok(rotation_to_cayley_klein(&self.to_rotation()?))
    }

    /// Convert to Euler angles of `convention`.
    pub fn to_euler(&self, convention: EulerConvention) -> Result<EulerAngles, GeometryError> {
        Ok(EulerAngles::from_rotation(&self.to_rotation()?, convention))
    }
}

impl Default for RotationParams {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rotation matrix from Cayley-Klein parameters.
///
/// The parameters are normalized first; a zero vector is rejected.
pub fn cayley_klein_to_rotation(e: &[f64; 4]) -> Result<Rotation3<f64>, GeometryError> {
    let norm = e.iter().map(|v| v * v).sum::<f64>().sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return Err(GeometryError::InvalidRotation(format!(
            "Cayley-Klein parameters {e:?} have no direction"
        )));
    }
    let [e0, e1, e2, e3] = e.map(|v| v / norm);

    #[rustfmt::skip]
    let m = Matrix3::new(
        e0 * e0 + e1 * e1 - e2 * e2 - e3 * e3, 2.0 * (e1 * e2 - e0 * e3), 2.0 * (e1 * e3 + e0 * e2),
        2.0 * (e1 * e2 + e0 * e3), e0 * e0 - e1 * e1 + e2 * e2 - e3 * e3, 2.0 * (e2 * e3 - e0 * e1),
        2.0 * (e1 * e3 - e0 * e2), 2.0 * (e2 * e3 + e0 * e1), e0 * e0 - e1 * e1 - e2 * e2 + e3 * e3,
    );
    Ok(Rotation3::from_matrix_unchecked(m))
}

/// Cayley-Klein parameters of a rotation, with `e0 >= 0`.
pub fn rotation_to_cayley_klein(rotation: &Rotation3<f64>) -> [f64; 4] {
    let q = UnitQuaternion::from_rotation_matrix(rotation).into_inner();
    let e = [q.w, q.i, q.j, q.k];
    if e[0] < 0.0 {
        e.map(|v| -v)
    } else {
        e
    }
}

/// Rotation by `angle` radians about the z (optical) axis.
pub fn rotation_about_z(angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle)
}

/// Compute the rotation from an axis and angle.
///
/// The axis does not need to be normalized but must not be zero.
pub fn axis_angle_to_rotation(axis: &[f64; 3], angle: f64) -> Result<Rotation3<f64>, GeometryError> {
    let axis = Vector3::new(axis[0], axis[1], axis[2]);
    let magnitude = axis.norm();
    if magnitude < 1e-10 {
        return Err(GeometryError::InvalidRotation(
            "cannot compute rotation matrix from a zero vector".to_string(),
        ));
    }
    let unit = nalgebra::Unit::new_unchecked(axis / magnitude);
    Ok(Rotation3::from_axis_angle(&unit, angle))
}

/// Geodesic angle in radians between two rotations, in `[0, π]`.
///
/// Evaluated as `atan2(sin, cos)` of the relative rotation, which stays
/// finite and accurate for nearly equal rotations.
pub fn rotation_distance(a: &Rotation3<f64>, b: &Rotation3<f64>) -> f64 {
    let m = a.matrix().transpose() * b.matrix();
    let cos = (m.trace() - 1.0) / 2.0;
    let sin = Vector3::new(
        m[(2, 1)] - m[(1, 2)],
        m[(0, 2)] - m[(2, 0)],
        m[(1, 0)] - m[(0, 1)],
    )
    .norm()
        / 2.0;
    sin.atan2(cos)
}

/// Whether `m` is orthonormal within `tol`, i.e. `‖MᵀM − I‖∞ ≤ tol`.
pub fn is_orthonormal(m: &Matrix3<f64>, tol: f64) -> bool {
    (m.transpose() * m - Matrix3::identity()).amax() <= tol
}

fn second_axis(axes: EulerAxes) -> nalgebra::Unit<Vector3<f64>> {
    match axes {
        EulerAxes::Zxz => Vector3::x_axis(),
        EulerAxes::Zyz => Vector3::y_axis(),
    }
}

/// Angles `[a, theta, b]` with `R = Rz(a) R2(theta) Rz(b)`.
fn intrinsic_angles(m: &Matrix3<f64>, axes: EulerAxes) -> [f64; 3] {
    const GIMBAL_TOL: f64 = 1e-12;

    let cos_theta = m[(2, 2)].clamp(-1.0, 1.0);
    let theta = cos_theta.acos();

    if 1.0 - cos_theta.abs() > GIMBAL_TOL {
        return match axes {
            EulerAxes::Zxz => [
                m[(0, 2)].atan2(-m[(1, 2)]),
                theta,
                m[(2, 0)].atan2(m[(2, 1)]),
            ],
            EulerAxes::Zyz => [
                m[(1, 2)].atan2(m[(0, 2)]),
                theta,
                m[(2, 1)].atan2(-m[(2, 0)]),
            ],
        };
    }

    // gimbal lock: only the combined z rotation is observable
    let a = if cos_theta > 0.0 {
        m[(1, 0)].atan2(m[(0, 0)])
    } else {
        match axes {
            EulerAxes::Zxz => m[(1, 0)].atan2(m[(0, 0)]),
            EulerAxes::Zyz => (-m[(1, 0)]).atan2(-m[(0, 0)]),
        }
    };
    [a, theta, 0.0]
}
