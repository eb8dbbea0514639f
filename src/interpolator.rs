use ndarray::{Array2, ArrayView2, Zip};

/// Largest stretch applied to either axis of a plane. Keeps a degenerate
/// (floored) spacing from blowing a plane up by orders of magnitude.
pub(crate) const MAX_UPSAMPLING: f32 = 32.0;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Output (height, width) for a plane whose pixels should all cover the
    /// finer of the two in-plane spacings.
    pub(crate) fn get_isotropic_dimensions(
        spacing: (f32, f32),
        original_dim: (usize, usize),
    ) -> (usize, usize) {
        let (v_spacing, h_spacing) = spacing;
        let min_spacing = v_spacing.min(h_spacing);
        let inv_min_spacing = 1.0 / min_spacing; // Multiply instead of divide
        let v_scale = (v_spacing * inv_min_spacing).min(MAX_UPSAMPLING);
        let h_scale = (h_spacing * inv_min_spacing).min(MAX_UPSAMPLING);

        let new_height = (original_dim.0 as f32 * v_scale).round() as usize;
        let new_width = (original_dim.1 as f32 * h_scale).round() as usize;

        (new_height.max(1), new_width.max(1))
    }

    /// Resample a plane to `height` × `width` using bilinear interpolation.
    pub(crate) fn resample(slice: &ArrayView2<'_, f32>, height: usize, width: usize) -> Array2<f32> {
        let (slice_height, slice_width) = slice.dim();
        if slice_height == 0 || slice_width == 0 {
            return Array2::zeros((0, 0));
        }

        let mut output = Array2::<f32>::zeros((height, width));
        Zip::indexed(&mut output).par_for_each(|(y, x), out| {
            // Normalized coordinates with half-pixel offset
            let norm_x = (x as f32 + 0.5) / width as f32;
            let norm_y = (y as f32 + 0.5) / height as f32;

            // Convert back to source coordinates
            let src_x = norm_x * slice_width as f32 - 0.5;
            let src_y = norm_y * slice_height as f32 - 0.5;

            // Clamp to valid range
            let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
            let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

            *out = Self::bilinear_interpolate(slice, src_y, src_x);
        });
        output
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn isotropic_dimensions_stretch_the_coarse_axis() {
        assert_eq!(
            Interpolator::get_isotropic_dimensions((5.0, 0.5), (10, 256)),
            (100, 256)
        );
        assert_eq!(
            Interpolator::get_isotropic_dimensions((1.0, 1.0), (10, 20)),
            (10, 20)
        );
    }

    #[test]
    fn degenerate_spacing_stretch_is_capped() {
        assert_eq!(
            Interpolator::get_isotropic_dimensions((1.0, 0.001), (10, 20)),
            (320, 20)
        );
        assert_eq!(
            Interpolator::get_isotropic_dimensions((0.001, 0.001), (10, 20)),
            (10, 20)
        );
    }

    #[test]
    fn bilinear_midpoint_is_the_average() {
        let plane = array![[0.0f32, 10.0], [20.0, 30.0]];
        let value = Interpolator::bilinear_interpolate(&plane.view(), 0.5, 0.5);
        assert!((value - 15.0).abs() < 1e-5);
    }

    #[test]
    fn resample_to_same_size_is_identity() {
        let plane = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let resampled = Interpolator::resample(&plane.view(), 2, 3);
        for (a, b) in resampled.iter().zip(plane.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn resample_preserves_edge_values() {
        let plane = array![[0.0f32], [100.0]];
        let resampled = Interpolator::resample(&plane.view(), 8, 1);
        assert_eq!(resampled.dim(), (8, 1));
        assert_eq!(resampled[[0, 0]], 0.0);
        assert_eq!(resampled[[7, 0]], 100.0);
        assert!(resampled.windows((2, 1)).into_iter().all(|w| w[[0, 0]] <= w[[1, 0]]));
    }
}
