use std::fmt;
use std::str::FromStr;

use corr3d_geometry::{
    rotation, Affine2, Affine3To2, GlDecomposition, GeometryError, RigidTransform3,
};
use corr3d_optim::CancellationToken;
use corr3d_peak::{localize_marker_or_discrete, MarkerLocalizationParams, VolumeView};
use corr3d_rigid::{find32, Find32Params, Find32Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::CorrelationError;

/// Largest deviation of `RᵀR` from the identity accepted for inversion.
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// How the caller overlays the correlated images.
///
/// The mode does not change the estimation; it is carried through to the
/// result for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CorrelationMode {
    /// The search image is moved onto the overview.
    #[default]
    MoveSearch,
    /// The overview is moved onto the search image.
    MoveOverview,
    /// Both images are shown side by side.
    Collage,
}

impl FromStr for CorrelationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "move search" => Ok(Self::MoveSearch),
            "move overview" => Ok(Self::MoveOverview),
            "collage" => Ok(Self::Collage),
            _ => Err(format!("Unsupported correlation mode '{s}'")),
        }
    }
}

impl fmt::Display for CorrelationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MoveSearch => "move search",
            Self::MoveOverview => "move overview",
            Self::Collage => "collage",
        };
        f.write_str(name)
    }
}

/// Parameters of [`correlate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationParams {
    /// Rigid estimator configuration.
    pub find32: Find32Params,
    /// Point about which the translation is additionally reported.
    pub rotation_center: Option<[f64; 3]>,
    /// Overlay mode.
    pub mode: CorrelationMode,
}

impl CorrelationParams {
    /// Set the rigid estimator configuration.
    pub fn with_find32(mut self, find32: Find32Params) -> Self {
        self.find32 = find32;
        self
    }

    /// Set the rotation center.
    pub fn with_rotation_center(mut self, center: Option<[f64; 3]>) -> Self {
        self.rotation_center = center;
        self
    }

    /// Set the overlay mode.
    pub fn with_mode(mut self, mode: CorrelationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Result of a 3D-to-2D correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Fitted transform from the 3D volume to the 2D image.
    pub transform: RigidTransform3,
    /// Estimator diagnostics.
    pub fit: Find32Result,
    /// 3D markers mapped into the 2D image.
    pub transformed_markers: Vec<[f64; 2]>,
    /// Per-marker residual `transformed - target`.
    pub residuals: Vec<[f64; 2]>,
    /// RMS of the residuals.
    pub rms_error: f64,
    /// Spots mapped by the full 3D transform.
    pub transformed_spots: Vec<[f64; 3]>,
    /// Spots mapped into the 2D image.
    pub projected_spots: Vec<[f64; 2]>,
    /// Translation about [`CorrelationParams::rotation_center`], if set.
    pub translation_about_center: Option<Vector3<f64>>,
    /// Overlay mode.
    pub mode: CorrelationMode,
}

/// Result of a 2D-to-2D correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation2dResult {
    /// Fitted affine transform.
    pub transform: Affine2,
    /// Decomposition of its GL matrix.
    pub decomposition: GlDecomposition,
    /// Source markers mapped into the destination image.
    pub transformed_markers: Vec<[f64; 2]>,
    /// Per-marker residual `transformed - target`.
    pub residuals: Vec<[f64; 2]>,
    /// RMS of the residuals.
    pub rms_error: f64,
    /// Spots mapped into the destination image.
    pub transformed_spots: Vec<[f64; 2]>,
    /// Overlay mode.
    pub mode: CorrelationMode,
}

/// Correlate 3D markers with their 2D images and map the spots.
///
/// # Arguments
///
/// * `markers_3d` - Marker positions in the 3D volume.
/// * `markers_2d` - Corresponding marker positions in the 2D image.
/// * `spots_3d` - Points of interest to transfer into the 2D image.
/// * `params` - Correlation parameters.
/// * `cancel` - Optional cancellation token forwarded to the estimator.
pub fn correlate(
    markers_3d: &[[f64; 3]],
    markers_2d: &[[f64; 2]],
    spots_3d: &[[f64; 3]],
    params: &CorrelationParams,
    cancel: Option<&CancellationToken>,
) -> Result<CorrelationResult, CorrelationError> {
    let fit = find32(markers_3d, markers_2d, &params.find32, cancel)?;
    let transform = fit.transform;

    let transformed_markers = transform.project_points(markers_3d);
    let residuals = differences(&transformed_markers, markers_2d);
    let rms_error = transform.rms_error(markers_3d, markers_2d)?;

    let transformed_spots = transform.transform_points(spots_3d);
    let projected_spots = transformed_spots.iter().map(|p| [p[0], p[1]]).collect();

    let translation_about_center = params
        .rotation_center
        .map(|center| transform.recalculate_translation(&center));

    log::info!(
        "correlated {} markers and {} spots, rms {:.4} ({})",
        markers_3d.len(),
        spots_3d.len(),
        rms_error,
        params.mode
    );

    Ok(CorrelationResult {
        transform,
        fit,
        transformed_markers,
        residuals,
        rms_error,
        transformed_spots,
        projected_spots,
        translation_about_center,
        mode: params.mode,
    })
}

/// Correlate two 2D marker sets with an affine transform and map the spots.
pub fn correlate_2d(
    markers_src: &[[f64; 2]],
    markers_dst: &[[f64; 2]],
    spots: &[[f64; 2]],
    mode: CorrelationMode,
) -> Result<Correlation2dResult, CorrelationError> {
    let transform = Affine2::fit(markers_src, markers_dst)?;
    let decomposition = transform.decompose()?;

    let transformed_markers = transform.transform_points(markers_src);
    let residuals = differences(&transformed_markers, markers_dst);
    let rms_error = transform.rms_error(markers_src, markers_dst)?;

    Ok(Correlation2dResult {
        transform,
        decomposition,
        transformed_markers,
        residuals,
        rms_error,
        transformed_spots: transform.transform_points(spots),
        mode,
    })
}

/// Chain a 3D-to-2D rigid transform with a subsequent 2D affine transform.
///
/// The stages are composed algebraically, `y = G · P(s · R · x + t) + d`,
/// without re-fitting.
pub fn compose(rigid: &RigidTransform3, then: &Affine2) -> Affine3To2 {
    rigid.to_affine_3to2().then(then)
}

/// Map points back through the inverse of a rigid transform.
///
/// # Errors
///
/// [`CorrelationError::NonInvertible`] if the rotation is not orthonormal or
/// the scale is zero.
pub fn inverse_transform(
    transform: &RigidTransform3,
    points: &[[f64; 3]],
) -> Result<Vec<[f64; 3]>, CorrelationError> {
    if !rotation::is_orthonormal(transform.rotation.matrix(), ORTHONORMAL_TOLERANCE) {
        return Err(CorrelationError::NonInvertible(
            "rotation matrix is not orthonormal".to_string(),
        ));
    }
    match transform.inverse_transform_points(points) {
        Ok(points) => Ok(points),
        Err(GeometryError::NonInvertible(reason)) => Err(CorrelationError::NonInvertible(reason)),
        Err(e) => Err(e.into()),
    }
}

/// Sub-voxel positions of markers picked at integer voxels of a volume.
///
/// Markers whose fit fails keep their discrete maximum.
pub fn refine_markers_3d(
    volume: &VolumeView<'_>,
    seeds: &[[usize; 3]],
    params: &MarkerLocalizationParams,
) -> Result<Vec<[f64; 3]>, CorrelationError> {
    seeds
        .iter()
        .map(|seed| Ok(localize_marker_or_discrete(volume, *seed, params)?.position))
        .collect()
}

fn differences(a: &[[f64; 2]], b: &[[f64; 2]]) -> Vec<[f64; 2]> {
    a.iter()
        .zip(b)
        .map(|(p, q)| [p[0] - q[0], p[1] - q[1]])
        .collect()
}
