use serde::{Deserialize, Serialize};

use crate::PeakError;

/// Curvatures with a smaller magnitude are treated as a flat or linear profile.
const MIN_CURVATURE: f64 = 1e-12;

/// Sub-pixel estimate of a peak in a 1D profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakEstimate {
    /// Refined position in sample units, `center + offset`.
    pub position: f64,
    /// Offset from the discrete center.
    pub offset: f64,
    /// Interpolated value at the vertex, when a parabola was fitted.
    pub amplitude: Option<f64>,
    /// Whether the parabola was fitted. `false` means the discrete center
    /// was kept because of a boundary or a degenerate profile.
    pub refined: bool,
}

impl PeakEstimate {
    fn unrefined(center: usize) -> Self {
        Self {
            position: center as f64,
            offset: 0.0,
            amplitude: None,
            refined: false,
        }
    }
}

/// Vertex offset of the parabola through `(-1, ym1)`, `(0, y0)`, `(1, yp1)`.
///
/// Returns `None` when the three samples are collinear.
pub fn parabolic_vertex_offset(ym1: f64, y0: f64, yp1: f64) -> Option<f64> {
    let curvature = ym1 - 2.0 * y0 + yp1;
    if !curvature.is_finite() || curvature.abs() < MIN_CURVATURE {
        return None;
    }
    let offset = 0.5 * (ym1 - yp1) / curvature;
    offset.is_finite().then_some(offset)
}

/// Refine the extremum of `samples` located at `center`.
///
/// The parabola through the samples at `center - 1`, `center` and
/// `center + 1` gives the sub-sample offset. At the profile boundary, or for
/// a flat or linear neighborhood, the discrete center is returned with a zero
/// offset and `refined == false`.
///
/// # Errors
///
/// [`PeakError::EmptyProfile`] for an empty profile and
/// [`PeakError::OutOfBounds`] when `center` is not a valid index.
pub fn find_peak(samples: &[f64], center: usize) -> Result<PeakEstimate, PeakError> {
    if samples.is_empty() {
        return Err(PeakError::EmptyProfile);
    }
    if center >= samples.len() {
        return Err(PeakError::OutOfBounds {
            index: [center, 0, 0],
            shape: [samples.len(), 1, 1],
        });
    }
    if center == 0 || center + 1 == samples.len() {
        return Ok(PeakEstimate::unrefined(center));
    }

    let (ym1, y0, yp1) = (samples[center - 1], samples[center], samples[center + 1]);
    let Some(offset) = parabolic_vertex_offset(ym1, y0, yp1) else {
        return Ok(PeakEstimate::unrefined(center));
    };

    Ok(PeakEstimate {
        position: center as f64 + offset,
        offset,
        amplitude: Some(y0 - 0.25 * (ym1 - yp1) * offset),
        refined: true,
    })
}

/// Locate the maximum of `samples` and refine it.
pub fn find_peak_max(samples: &[f64]) -> Result<PeakEstimate, PeakError> {
    let center = argmax(samples).ok_or(PeakError::EmptyProfile)?;
    find_peak(samples, center)
}

/// Index of the largest sample; the lowest index wins ties and NaN is skipped.
pub fn argmax(samples: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in samples.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
