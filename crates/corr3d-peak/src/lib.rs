#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Two-dimensional Gaussian fit of a blob around an integer peak.
pub mod gaussian;

/// Marker localization in an intensity volume.
pub mod localize;

/// One-dimensional parabolic peak refinement.
pub mod parabolic;

/// Borrowed view of a z-stack of intensity images.
pub mod volume;

pub use gaussian::{fit_gaussian_2d, Gaussian2d, GaussianFitParams};
pub use localize::{
    find_discrete_max, localize_marker, localize_marker_or_discrete, MarkerLocalizationParams,
    MarkerPeak,
};
pub use parabolic::{argmax, find_peak, find_peak_max, parabolic_vertex_offset, PeakEstimate};
pub use volume::VolumeView;

use thiserror::Error;

/// Errors that can occur during peak localization.
#[derive(Debug, Error)]
pub enum PeakError {
    /// The nonlinear fit did not produce a usable peak.
    #[error("Peak fit failed: {0}")]
    FitFailure(String),

    /// An index lies outside the sampled data.
    #[error("Index {index:?} is out of bounds for shape {shape:?}")]
    OutOfBounds {
        /// Offending index as `[x, y, z]` (`[i, 0, 0]` for profiles).
        index: [usize; 3],
        /// Extent of the data as `[nx, ny, nz]`.
        shape: [usize; 3],
    },

    /// The data buffer does not match the declared shape.
    #[error("Invalid shape: expected {expected} samples, got {actual}")]
    InvalidShape {
        /// Number of samples implied by the shape.
        expected: usize,
        /// Number of samples provided.
        actual: usize,
    },

    /// The profile has no samples.
    #[error("Empty intensity profile")]
    EmptyProfile,
}
