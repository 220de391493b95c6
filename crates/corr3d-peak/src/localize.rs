use serde::{Deserialize, Serialize};

use crate::gaussian::{fit_gaussian_2d, Gaussian2d, GaussianFitParams};
use crate::parabolic::{argmax, find_peak};
use crate::{PeakError, VolumeView};

/// Parameters for [`localize_marker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerLocalizationParams {
    /// Half size of the box searched for the discrete maximum around the seed.
    pub search_radius: usize,
    /// Lateral Gaussian fit configuration.
    pub gaussian: GaussianFitParams,
}

impl Default for MarkerLocalizationParams {
    fn default() -> Self {
        Self {
            search_radius: 2,
            gaussian: GaussianFitParams::default(),
        }
    }
}

impl MarkerLocalizationParams {
    /// Set the discrete search radius.
    pub fn with_search_radius(mut self, radius: usize) -> Self {
        self.search_radius = radius;
        self
    }

    /// Set the Gaussian fit configuration.
    pub fn with_gaussian(mut self, gaussian: GaussianFitParams) -> Self {
        self.gaussian = gaussian;
        self
    }
}

/// Location of a marker in a volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPeak {
    /// Position `[x, y, z]` in voxel coordinates.
    pub position: [f64; 3],
    /// Discrete maximum `[x, y, z]` the refinement started from.
    pub discrete: [usize; 3],
    /// Lateral fit, absent when the discrete position was kept.
    pub gaussian: Option<Gaussian2d>,
    /// Whether the z coordinate was refined by a parabola.
    pub z_refined: bool,
}

impl MarkerPeak {
    fn discrete(index: [usize; 3]) -> Self {
        Self {
            position: index.map(|v| v as f64),
            discrete: index,
            gaussian: None,
            z_refined: false,
        }
    }

    /// Whether any sub-voxel refinement was applied.
    pub fn is_refined(&self) -> bool {
        self.gaussian.is_some() || self.z_refined
    }
}

/// Brightest voxel within `radius` of `seed = [x, y, z]`.
///
/// Voxels are scanned in z, y, x order and the first maximum wins ties.
pub fn find_discrete_max(
    volume: &VolumeView<'_>,
    seed: [usize; 3],
    radius: usize,
) -> Result<[usize; 3], PeakError> {
    volume.try_get(seed[0], seed[1], seed[2])?;
    let shape = volume.shape();
    let range = |axis: usize| {
        let lo = seed[axis].saturating_sub(radius);
        let hi = (seed[axis] + radius).min(shape[axis] - 1);
        lo..=hi
    };

    let mut best = (seed, f32::NEG_INFINITY);
    for z in range(2) {
        for y in range(1) {
            for x in range(0) {
                if let Some(v) = volume.get(x, y, z) {
                    if v > best.1 {
                        best = ([x, y, z], v);
                    }
                }
            }
        }
    }
    Ok(best.0)
}

/// Sub-voxel marker position near `seed = [x, y, z]`.
///
/// The discrete maximum around the seed is refined laterally by a 2D
/// Gaussian fit in its slice, then axially by a parabola through the
/// intensity profile sampled along z at the refined lateral position.
///
/// # Errors
///
/// [`PeakError::OutOfBounds`] for a seed outside the volume and
/// [`PeakError::FitFailure`] when the lateral fit fails.
pub fn localize_marker(
    volume: &VolumeView<'_>,
    seed: [usize; 3],
    params: &MarkerLocalizationParams,
) -> Result<MarkerPeak, PeakError> {
    let discrete = find_discrete_max(volume, seed, params.search_radius)?;
    let [x0, y0, z0] = discrete;
    let fit = fit_gaussian_2d(volume, z0, [x0, y0], &params.gaussian)?;
    let [x, y] = fit.center;

    let nz = volume.shape()[2];
    let radius = params.search_radius.max(1);
    let (z_lo, z_hi) = (z0.saturating_sub(radius), (z0 + radius).min(nz - 1));
    let profile = (z_lo..=z_hi)
        .map(|z| volume.bilinear(x, y, z))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| {
            PeakError::FitFailure(format!("fitted center ({x:.2}, {y:.2}) left the slice"))
        })?;

    let center = argmax(&profile).ok_or(PeakError::EmptyProfile)?;
    let z_peak = find_peak(&profile, center)?;

    Ok(MarkerPeak {
        position: [x, y, z_lo as f64 + z_peak.position],
        discrete,
        gaussian: Some(fit),
        z_refined: z_peak.refined,
    })
}

/// Like [`localize_marker`], but keeps the discrete maximum when the fit fails.
pub fn localize_marker_or_discrete(
    volume: &VolumeView<'_>,
    seed: [usize; 3],
    params: &MarkerLocalizationParams,
) -> Result<MarkerPeak, PeakError> {
    match localize_marker(volume, seed, params) {
        Err(PeakError::FitFailure(reason)) => {
            let discrete = find_discrete_max(volume, seed, params.search_radius)?;
            log::debug!("keeping discrete peak {discrete:?} for seed {seed:?}: {reason}");
            Ok(MarkerPeak::discrete(discrete))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Volume with a separable Gaussian blob.
    fn blob_volume(shape: [usize; 3], center: [f64; 3], sigma: [f64; 3]) -> Vec<f32> {
        let [nx, ny, nz] = shape;
        let mut data = Vec::with_capacity(nx * ny * nz);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let d = [x as f64 - center[0], y as f64 - center[1], z as f64 - center[2]];
                    let e: f64 = (0..3).map(|k| d[k] * d[k] / (2.0 * sigma[k] * sigma[k])).sum();
                    data.push((10.0 + 200.0 * (-e).exp()) as f32);
                }
            }
        }
        data
    }

    #[test]
    fn test_discrete_max() -> Result<(), PeakError> {
        let data = blob_volume([12, 12, 8], [6.0, 5.0, 3.0], [1.5, 1.5, 1.0]);
        let volume = VolumeView::new(&data, 12, 12, 8)?;
        assert_eq!(find_discrete_max(&volume, [5, 6, 4], 2)?, [6, 5, 3]);
        // the true maximum is out of reach
        assert_eq!(find_discrete_max(&volume, [1, 1, 0], 1)?, [2, 2, 1]);
        Ok(())
    }

    #[test]
    fn test_discrete_max_ties() -> Result<(), PeakError> {
        let data = vec![1.0f32; 27];
        let volume = VolumeView::new(&data, 3, 3, 3)?;
        assert_eq!(find_discrete_max(&volume, [1, 1, 1], 1)?, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_localize_marker() -> Result<(), PeakError> {
        let data = blob_volume([16, 16, 9], [7.3, 8.6, 4.0], [1.6, 1.6, 1.2]);
        let volume = VolumeView::new(&data, 16, 16, 9)?;
        let peak = localize_marker(&volume, [8, 8, 4], &MarkerLocalizationParams::default())?;

        assert_eq!(peak.discrete, [7, 9, 4]);
        assert!(peak.is_refined());
        assert_relative_eq!(peak.position[0], 7.3, epsilon = 1e-3);
        assert_relative_eq!(peak.position[1], 8.6, epsilon = 1e-3);
        // symmetric z profile around an integer center
        assert_relative_eq!(peak.position[2], 4.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_single_slice_keeps_z() -> Result<(), PeakError> {
        let data = blob_volume([12, 12, 1], [5.5, 6.2, 0.0], [1.5, 1.5, 1.0]);
        let image = VolumeView::from_image(&data, 12, 12)?;
        let peak = localize_marker(&image, [6, 6, 0], &MarkerLocalizationParams::default())?;
        assert_relative_eq!(peak.position[0], 5.5, epsilon = 1e-3);
        assert_relative_eq!(peak.position[1], 6.2, epsilon = 1e-3);
        assert_eq!(peak.position[2], 0.0);
        assert!(!peak.z_refined);
        Ok(())
    }

    #[test]
    fn test_fallback_to_discrete() -> Result<(), PeakError> {
        // featureless volume: there is no blob to fit
        let data = vec![1.0f32; 5 * 5 * 3];
        let volume = VolumeView::new(&data, 5, 5, 3)?;
        let params = MarkerLocalizationParams::default();

        assert!(matches!(
            localize_marker(&volume, [2, 2, 1], &params),
            Err(PeakError::FitFailure(_))
        ));
        let peak = localize_marker_or_discrete(&volume, [2, 2, 1], &params)?;
        assert_eq!(peak.discrete, [0, 0, 0]);
        assert_eq!(peak.position, [0.0, 0.0, 0.0]);
        assert!(!peak.is_refined());
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_seed_is_an_error() -> Result<(), PeakError> {
        let data = vec![0.0f32; 8];
        let volume = VolumeView::new(&data, 2, 2, 2)?;
        assert!(matches!(
            localize_marker_or_discrete(&volume, [0, 0, 5], &MarkerLocalizationParams::default()),
            Err(PeakError::OutOfBounds { .. })
        ));
        Ok(())
    }
}
