#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod find32;
pub use find32::{find32, Find32Result, RunSummary};

mod model;

mod params;
pub use params::{Find32Params, InitialRotation, RotationMode, ScaleMode};

use corr3d_geometry::GeometryError;
use thiserror::Error;

/// Errors that can occur while estimating a 3D-to-2D rigid transform.
#[derive(Debug, Error)]
pub enum RigidError {
    /// The 3D and 2D marker sets have different lengths.
    #[error("Mismatched marker counts: {markers_3d} 3D markers, {markers_2d} 2D markers")]
    MismatchedLengths {
        /// Number of 3D markers.
        markers_3d: usize,
        /// Number of 2D markers.
        markers_2d: usize,
    },

    /// The markers do not determine a transform.
    ///
    /// When the optimization could still be run, `partial` carries its best
    /// result for diagnostics.
    #[error("Degenerate configuration: {reason}")]
    DegenerateConfiguration {
        /// What makes the configuration degenerate.
        reason: String,
        /// Best result obtained despite the degeneracy.
        partial: Option<Box<Find32Result>>,
    },

    /// Every run was cancelled before it produced a result.
    #[error("Estimation was cancelled")]
    Cancelled,

    /// A parameter is outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from the geometry primitives.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
