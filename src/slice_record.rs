use crate::{
    enums::KeySource,
    metadata::{
        PIXEL_SPACING, POSITION_KEY, RESCALE_INTERCEPT, RESCALE_SLOPE, Resolved, SLICE_THICKNESS,
    },
};

use dicom::{
    object::{
        FileDicomObject, InMemDicomObject, OpenFileOptions, ReadError, file::ReadPreamble,
        open_file,
    },
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use ndarray::{Array2, s};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("DICOM error: {0}")]
    Dicom(#[from] ReadError),

    #[error("No decodable pixel data: {0}")]
    PixelData(String),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),

    #[error("Not a volumetric image: {0}")]
    NotVolumetric(String),
}

/// One decoded image plane together with the metadata needed to place it in
/// a series.
#[derive(Debug, Clone)]
pub struct SliceRecord {
    /// Intensities in physical units, rescale already applied.
    pub pixels: Array2<f32>,
    pub sort_key: f32,
    pub key_source: KeySource,
    /// (row, column) spacing in mm.
    pub pixel_spacing: (f32, f32),
    pub rescale: (f32, f32),
    pub slice_thickness: Option<f32>,
}

impl SliceRecord {
    /// Parse an in-memory DICOM file. Both files with and without the
    /// 128-byte preamble are accepted.
    pub fn from_dicom_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let dicom_object = read_dicom_bytes(bytes)?;
        Self::from_dicom_object(&dicom_object)
    }

    pub fn from_dicom_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let dicom_object = open_file(path.as_ref())?;
        Self::from_dicom_object(&dicom_object)
    }

    pub fn from_dicom_object(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> Result<Self, ParseError> {
        let raw = decode_first_frame(dicom_object)?;

        let slope = RESCALE_SLOPE.resolve(dicom_object).value;
        let intercept = RESCALE_INTERCEPT.resolve(dicom_object).value;
        let pixels = raw.mapv_into(|v| v.mul_add(slope, intercept));

        let key = POSITION_KEY.resolve(dicom_object);
        if key.is_default_of(&POSITION_KEY) {
            debug!("no position metadata, using default sort key {}", key.value);
        }
        let Resolved {
            value: sort_key,
            source: key_source,
        } = key;

        let spacing = PIXEL_SPACING.resolve(dicom_object);
        if spacing.is_default_of(&PIXEL_SPACING) {
            debug!("no pixel spacing, assuming {:?} mm", spacing.value);
        }

        let thickness = SLICE_THICKNESS.resolve(dicom_object);
        let slice_thickness = (!thickness.is_default_of(&SLICE_THICKNESS)).then_some(thickness.value);

        Ok(Self {
            pixels,
            sort_key,
            key_source,
            pixel_spacing: spacing.value,
            rescale: (slope, intercept),
            slice_thickness,
        })
    }

    /// (rows, columns) of the plane.
    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }
}

pub(crate) fn read_dicom_bytes(
    bytes: &[u8],
) -> Result<FileDicomObject<InMemDicomObject>, ParseError> {
    let preamble = if bytes.get(128..132) == Some(b"DICM".as_slice()) {
        ReadPreamble::Always
    } else {
        ReadPreamble::Never
    };
    let dicom_object = OpenFileOptions::new()
        .read_preamble(preamble)
        .from_reader(bytes)?;
    Ok(dicom_object)
}

/// Decode the stored values of the first frame and first sample, with no
/// modality or VOI LUT applied.
fn decode_first_frame(
    dicom_object: &FileDicomObject<InMemDicomObject>,
) -> Result<Array2<f32>, ParseError> {
    let pixel_data = dicom_object
        .decode_pixel_data()
        .map_err(|e| ParseError::PixelData(e.to_string()))?;
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let array = pixel_data
        .to_ndarray_with_options::<f32>(&options)
        .map_err(|e| ParseError::PixelData(e.to_string()))?;
    if array.is_empty() {
        return Err(ParseError::PixelData("empty pixel array".to_string()));
    }
    Ok(array.slice_move(s![0, .., .., 0]))
}
