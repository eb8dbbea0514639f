use crate::{
    metadata::{WINDOW_CENTER, WINDOW_WIDTH},
    slice_record::{ParseError, SliceRecord, read_dicom_bytes},
    volume::intensity_range,
    window::{WindowSetting, WindowedPlane, apply_windowing},
};

use dicom::object::{FileDicomObject, InMemDicomObject};
use ndarray::Array2;

/// A single projection radiograph: one rescaled plane plus the window its
/// header recommends.
#[derive(Clone, Debug)]
pub struct XrayImage {
    pub pixels: Array2<f32>,
    /// From WindowCenter/WindowWidth, (40, 400) when absent.
    pub default_window: WindowSetting,
    /// (row, column) spacing in mm.
    pub pixel_spacing: (f32, f32),
}

impl XrayImage {
    pub fn from_dicom_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let dicom_object = read_dicom_bytes(bytes)?;
        Self::from_dicom_object(&dicom_object)
    }

    pub fn from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, ParseError> {
        let record = SliceRecord::from_dicom_object(dicom_object)?;
        let default_window = WindowSetting::new(
            WINDOW_CENTER.resolve(dicom_object).value,
            WINDOW_WIDTH.resolve(dicom_object).value,
        );
        Ok(Self {
            pixels: record.pixels,
            default_window,
            pixel_spacing: record.pixel_spacing,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn intensity_range(&self) -> (f32, f32) {
        intensity_range(self.pixels.iter().copied())
    }

    pub fn windowed(&self, window: WindowSetting) -> WindowedPlane {
        WindowedPlane::new(apply_windowing(&self.pixels, window))
    }
}
