#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// 2D affine transformations and their least-squares estimation.
pub mod affine;

/// Decompositions of 2x2 general linear matrices.
pub mod decompose;

/// Scaled rigid-body transforms in 3D and their projection to 2D.
pub mod rigid;

/// Rotation parametrizations and conversions between them.
pub mod rotation;

mod utils;

pub use affine::Affine2;
pub use decompose::{GlDecomposition, SvdDecomposition};
pub use rigid::{Affine3To2, RigidTransform3};
pub use rotation::{EulerAngles, EulerAxes, EulerConvention, Frame, RotationParams};
pub use utils::{centroid2, centroid3, rms_distance2};

use thiserror::Error;

/// Error types for geometric estimation and transforms.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Two point sets that must correspond have different lengths.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedLengths {
        /// Label for the left-hand slice.
        left_name: &'static str,
        /// Length of the left-hand slice.
        left_len: usize,
        /// Label for the right-hand slice.
        right_name: &'static str,
        /// Length of the right-hand slice.
        right_len: usize,
    },

    /// The points do not span the plane (too few, coincident or collinear).
    #[error("Singular configuration: {points} points span a rank {rank} subspace, rank 2 required")]
    SingularConfiguration {
        /// Number of points provided.
        points: usize,
        /// Numerical rank of the centered point set.
        rank: usize,
    },

    /// The transform has no inverse.
    #[error("Transform is not invertible: {0}")]
    NonInvertible(String),

    /// The rotation parameters do not describe a rotation.
    #[error("Invalid rotation: {0}")]
    InvalidRotation(String),
}
