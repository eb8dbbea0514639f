//! Window/level contrast mapping and the standard CT presets.

use image::{ImageBuffer, Luma};
use ndarray::{Array, Array2, ArrayBase, Data, Dimension, Zip};

/// A window/level pair. The width is treated as at least
/// [`WindowSetting::MIN_WIDTH`] whenever the window is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSetting {
    pub center: f32,
    pub width: f32,
}

impl WindowSetting {
    pub const MIN_WIDTH: f32 = 1.0;

    pub const fn new(center: f32, width: f32) -> Self {
        Self { center, width }
    }

    pub fn effective_width(&self) -> f32 {
        self.width.max(Self::MIN_WIDTH)
    }

    /// (lower, upper) input values mapped to 0 and 255.
    pub fn bounds(&self) -> (f32, f32) {
        let half = self.effective_width() / 2.0;
        (self.center - half, self.center + half)
    }

    /// Clamp the window into what an image with the given intensity range can
    /// show: the center into `[min, max]`, the width into
    /// `[1, max(1, max - min)]`.
    pub fn fit_to_range(&self, min: f32, max: f32) -> Self {
        let max_width = (max - min).max(Self::MIN_WIDTH);
        Self {
            center: self.center.max(min).min(max),
            width: self.width.max(Self::MIN_WIDTH).min(max_width),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        PresetTable::get(name)
    }

    #[inline]
    fn map_value(value: f32, lower: f32, upper: f32) -> u8 {
        let clipped = value.max(lower).min(upper);
        ((clipped - lower) / (upper - lower) * 255.0).round() as u8
    }
}

impl Default for WindowSetting {
    fn default() -> Self {
        PRESETS[0].1
    }
}

/// Map raw intensities to `0..=255`. Values at or below the lower bound
/// become 0, values at or above the upper bound become 255, everything in
/// between is scaled linearly and rounded to the nearest integer.
///
/// Rounding, rather than truncating towards zero, is deliberate: it is what
/// makes the top of a window spanning a 12-bit range (4095 through
/// `(2048, 4096)`) reach 255. Mid-window values therefore land one step
/// above a truncating mapper, e.g. the center of `(40, 400)` gives 128.
pub fn apply_windowing<S, D>(array: &ArrayBase<S, D>, window: WindowSetting) -> Array<u8, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let (lower, upper) = window.bounds();

    let mut output = Array::<u8, D>::zeros(array.raw_dim());
    Zip::from(&mut output)
        .and(array)
        .par_for_each(|out, &value| *out = WindowSetting::map_value(value, lower, upper));
    output
}

/// An 8-bit display plane produced by [`apply_windowing`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowedPlane {
    pixels: Array2<u8>,
}

impl WindowedPlane {
    pub fn new(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    pub fn into_pixels(self) -> Array2<u8> {
        self.pixels
    }

    /// (rows, columns)
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    /// Negative of the plane, `255 - v` for every pixel.
    pub fn inverted(&self) -> Self {
        Self::new(self.pixels.mapv(|v| u8::MAX - v))
    }

    /// Hand the plane to image encoders as a grayscale buffer.
    pub fn to_image(&self) -> Option<ImageBuffer<Luma<u8>, Vec<u8>>> {
        let (height, width) = self.pixels.dim();
        let pixel_data: Vec<u8> = self.pixels.iter().copied().collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

/// Named anatomical presets as (name, window), in display order.
pub static PRESETS: [(&str, WindowSetting); 8] = [
    ("Default", WindowSetting::new(40.0, 400.0)),
    ("Bone", WindowSetting::new(400.0, 1800.0)),
    ("Lung", WindowSetting::new(-600.0, 1500.0)),
    ("Soft Tissue", WindowSetting::new(50.0, 400.0)),
    ("Brain", WindowSetting::new(35.0, 80.0)),
    ("Abdomen", WindowSetting::new(60.0, 400.0)),
    ("Mediastinum", WindowSetting::new(50.0, 500.0)),
    ("Liver", WindowSetting::new(60.0, 160.0)),
];

pub struct PresetTable;

impl PresetTable {
    /// Case-insensitive lookup by preset name.
    pub fn get(name: &str) -> Option<WindowSetting> {
        PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name.trim()))
            .map(|(_, window)| *window)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }

    pub fn iter() -> impl Iterator<Item = (&'static str, WindowSetting)> {
        PRESETS.iter().copied()
    }
}
