#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use corr3d_geometry as geometry;

#[doc(inline)]
pub use corr3d_optim as optim;

#[doc(inline)]
pub use corr3d_peak as peak;

#[doc(inline)]
pub use corr3d_rigid as rigid;

/// Correlation of marker sets and transfer of spots between coordinate systems.
pub mod pipeline;

pub use pipeline::{
    compose, correlate, correlate_2d, inverse_transform, refine_markers_3d, Correlation2dResult,
    CorrelationMode, CorrelationParams, CorrelationResult,
};

use thiserror::Error;

/// Errors that can occur while correlating marker sets.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// Error from the 3D-to-2D rigid estimator.
    #[error(transparent)]
    Rigid(#[from] corr3d_rigid::RigidError),

    /// Error from the 2D affine estimator or the transforms.
    #[error(transparent)]
    Geometry(#[from] corr3d_geometry::GeometryError),

    /// Error from marker localization.
    #[error(transparent)]
    Peak(#[from] corr3d_peak::PeakError),

    /// The transform cannot be inverted.
    #[error("Transform is not invertible: {0}")]
    NonInvertible(String),
}
