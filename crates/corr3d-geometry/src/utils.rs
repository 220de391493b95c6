use crate::GeometryError;

/// Centroid of a 2D point set. Returns the origin for an empty set.
pub fn centroid2(points: &[[f64; 2]]) -> [f64; 2] {
    if points.is_empty() {
        return [0.0; 2];
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    [sx / n, sy / n]
}

/// Centroid of a 3D point set. Returns the origin for an empty set.
pub fn centroid3(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let n = points.len() as f64;
    let mut c = [0.0; 3];
    for p in points {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    [c[0] / n, c[1] / n, c[2] / n]
}

/// Root-mean-square Euclidean distance between corresponding 2D points.
///
/// PRECONDITION: `a.len() == b.len()`. Returns 0 for empty sets.
pub fn rms_distance2(a: &[[f64; 2]], b: &[[f64; 2]]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2))
        .sum();
    (sum_sq / a.len() as f64).sqrt()
}

pub(crate) fn check_lengths(
    left_name: &'static str,
    left_len: usize,
    right_name: &'static str,
    right_len: usize,
) -> Result<(), GeometryError> {
    if left_len != right_len {
        return Err(GeometryError::MismatchedLengths {
            left_name,
            left_len,
            right_name,
            right_len,
        });
    }
    Ok(())
}
