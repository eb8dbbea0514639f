use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;
use crate::window::{WindowSetting, WindowedPlane, apply_windowing};

use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::Axis;

/// Smallest spacing any axis may report, in mm.
pub const MIN_SPACING: f32 = 1e-3;

/// Physical distance between neighbouring voxels along each volume axis,
/// in millimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spacing {
    pub depth: f32,
    pub row: f32,
    pub column: f32,
}

impl Spacing {
    /// Degenerate components (zero, negative, NaN) are floored to
    /// [`MIN_SPACING`].
    pub fn new(depth: f32, row: f32, column: f32) -> Self {
        Self {
            depth: depth.max(MIN_SPACING),
            row: row.max(MIN_SPACING),
            column: column.max(MIN_SPACING),
        }
    }

    /// (depth, row, column)
    pub fn as_tuple(&self) -> (f32, f32, f32) {
        (self.depth, self.row, self.column)
    }

    /// Spacing of the (vertical, horizontal) axes of a plane cut in the given
    /// orientation.
    pub fn in_plane(&self, orientation: Orientation) -> (f32, f32) {
        match orientation {
            Orientation::Axial => (self.row, self.column),
            Orientation::Coronal => (self.depth, self.column),
            Orientation::Sagittal => (self.depth, self.row),
        }
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// A reconstructed intensity volume indexed as (depth, row, column).
///
/// Volumes are never modified after construction; a new load produces a new
/// `Volume`. They are `Send + Sync` and can be shared between threads for
/// concurrent slicing.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array3<f32>,
    spacing: Spacing,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: Spacing) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (depth, rows, columns)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn into_parts(self) -> (Array3<f32>, Spacing) {
        (self.data, self.spacing)
    }

    /// Number of slices available in the given orientation.
    pub fn extent(&self, orientation: Orientation) -> usize {
        self.data.len_of(Axis(orientation.axis()))
    }

    pub fn center_index(&self, orientation: Orientation) -> usize {
        self.extent(orientation) / 2
    }

    /// Clamp a possibly out-of-range index into `[0, extent - 1]`. `None`
    /// only for an empty axis.
    pub fn clamp_index(&self, index: isize, orientation: Orientation) -> Option<usize> {
        let max_index = self.extent(orientation).checked_sub(1)?;
        Some(index.clamp(0, max_index as isize) as usize)
    }

    /// Cut the volume along one axis. Out-of-range indices select the nearest
    /// valid slice.
    pub fn get_slice_from_axis(
        &self,
        index: isize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        let index = self.clamp_index(index, orientation)?;
        Some(self.data.index_axis(Axis(orientation.axis()), index))
    }

    /// Minimum and maximum intensity, `(0.0, 0.0)` for an empty volume.
    pub fn intensity_range(&self) -> (f32, f32) {
        intensity_range(self.data.iter().copied())
    }

    /// Cut a plane and map it through a window. With
    /// [`Interpolation::Bilinear`] coronal and sagittal planes are resampled
    /// so that every output pixel covers the same physical distance in both
    /// directions.
    pub fn get_windowed_slice(
        &self,
        index: isize,
        orientation: Orientation,
        window: WindowSetting,
        interpolation: Interpolation,
    ) -> Option<WindowedPlane> {
        let slice = self.get_slice_from_axis(index, orientation)?;

        match interpolation {
            Interpolation::None => Some(WindowedPlane::new(apply_windowing(&slice, window))),
            Interpolation::Bilinear => {
                // Axial planes keep the acquisition's in-plane sampling
                if matches!(orientation, Orientation::Axial) {
                    return Some(WindowedPlane::new(apply_windowing(&slice, window)));
                }
                let resampled = self.resample_plane(&slice, orientation);
                Some(WindowedPlane::new(apply_windowing(&resampled, window)))
            }
        }
    }

    /// Resample a plane cut from this volume to isotropic pixels.
    pub fn resample_plane(&self, slice: &ArrayView2<'_, f32>, orientation: Orientation) -> Array2<f32> {
        let (height, width) = Interpolator::get_isotropic_dimensions(
            self.spacing.in_plane(orientation),
            slice.dim(),
        );
        Interpolator::resample(slice, height, width)
    }
}

pub(crate) fn intensity_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f32::min(lo, v), f32::max(hi, v))),
        })
        .unwrap_or((0.0, 0.0))
}
