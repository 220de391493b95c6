use crate::PeakError;

/// A borrowed, row-major z-stack of intensity images.
///
/// Samples are stored as `data[(z * ny + y) * nx + x]`. A single image is a
/// volume with `nz == 1`.
#[derive(Debug, Clone, Copy)]
pub struct VolumeView<'a> {
    data: &'a [f32],
    nx: usize,
    ny: usize,
    nz: usize,
}

impl<'a> VolumeView<'a> {
    /// Create a view over `data` with `nz` slices of `ny` rows and `nx` columns.
    ///
    /// # Errors
    ///
    /// [`PeakError::InvalidShape`] if `data.len() != nx * ny * nz` or any
    /// dimension is zero.
    pub fn new(data: &'a [f32], nx: usize, ny: usize, nz: usize) -> Result<Self, PeakError> {
        let expected = nx * ny * nz;
        if expected == 0 || data.len() != expected {
            return Err(PeakError::InvalidShape {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, nx, ny, nz })
    }

    /// Create a single-slice view of a 2D image.
    pub fn from_image(data: &'a [f32], width: usize, height: usize) -> Result<Self, PeakError> {
        Self::new(data, width, height, 1)
    }

    /// Extent as `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Whether `[x, y, z]` indexes a sample.
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.nx && y < self.ny && z < self.nz
    }

    /// Sample at `[x, y, z]`, or `None` outside the volume.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        self.contains(x, y, z)
            .then(|| self.data[(z * self.ny + y) * self.nx + x])
    }

    /// Sample at `[x, y, z]`.
    ///
    /// # Errors
    ///
    /// [`PeakError::OutOfBounds`] outside the volume.
    pub fn try_get(&self, x: usize, y: usize, z: usize) -> Result<f32, PeakError> {
        self.get(x, y, z).ok_or(PeakError::OutOfBounds {
            index: [x, y, z],
            shape: self.shape(),
        })
    }

    /// Bilinear interpolation within slice `z` at the continuous position `(x, y)`.
    ///
    /// Returns `None` when the position is outside the slice.
    pub fn bilinear(&self, x: f64, y: f64, z: usize) -> Option<f64> {
        if z >= self.nz || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let max_x = (self.nx - 1) as f64;
        let max_y = (self.ny - 1) as f64;
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return None;
        }

        let x0 = (x.floor() as usize).min(self.nx.saturating_sub(2));
        let y0 = (y.floor() as usize).min(self.ny.saturating_sub(2));
        let x1 = (x0 + 1).min(self.nx - 1);
        let y1 = (y0 + 1).min(self.ny - 1);
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let at = |xi: usize, yi: usize| f64::from(self.data[(z * self.ny + yi) * self.nx + xi]);
        let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
        let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_check() {
        let data = vec![0.0f32; 24];
        assert!(VolumeView::new(&data, 4, 3, 2).is_ok());
        assert!(matches!(
            VolumeView::new(&data, 4, 3, 3),
            Err(PeakError::InvalidShape {
                expected: 36,
                actual: 24
            })
        ));
        assert!(VolumeView::new(&[], 0, 0, 0).is_err());
    }

    #[test]
    fn test_indexing() -> Result<(), PeakError> {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let volume = VolumeView::new(&data, 4, 3, 2)?;
        assert_eq!(volume.get(1, 2, 1), Some(21.0));
        assert_eq!(volume.get(4, 0, 0), None);
        assert!(matches!(
            volume.try_get(0, 3, 0),
            Err(PeakError::OutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_bilinear() -> Result<(), PeakError> {
        // value = x + 10 y, which bilinear interpolation reproduces exactly
        let data: Vec<f32> = (0..3)
            .flat_map(|y| (0..3).map(move |x| (x + 10 * y) as f32))
            .collect();
        let image = VolumeView::from_image(&data, 3, 3)?;
        assert_relative_eq!(image.bilinear(0.5, 0.5, 0).unwrap_or(f64::NAN), 5.5);
        assert_relative_eq!(image.bilinear(2.0, 2.0, 0).unwrap_or(f64::NAN), 22.0);
        assert_relative_eq!(image.bilinear(1.25, 0.0, 0).unwrap_or(f64::NAN), 1.25);
        assert!(image.bilinear(-0.1, 0.0, 0).is_none());
        assert!(image.bilinear(0.0, 2.5, 0).is_none());
        assert!(image.bilinear(0.0, 0.0, 1).is_none());
        Ok(())
    }
}
