#![allow(dead_code)]

use std::path::Path;

use dicom::core::{DataElement, PrimitiveValue, VR, dicom_value};
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::{tags, uids};

pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

/// Attributes of a synthetic single-frame, 16-bit unsigned DICOM image.
#[derive(Clone, Debug, Default)]
pub struct SliceSpec {
    pub rows: u16,
    pub columns: u16,
    pub pixels: Vec<u16>,
    pub slice_location: Option<f32>,
    pub image_position_z: Option<f32>,
    pub instance_number: Option<i32>,
    pub pixel_spacing: Option<(f32, f32)>,
    pub rescale: Option<(f32, f32)>,
    pub slice_thickness: Option<f32>,
    pub window: Option<(&'static str, &'static str)>,
}

impl SliceSpec {
    /// A `rows` × `columns` image whose raw values are `base + index`.
    pub fn ramp(rows: u16, columns: u16, base: u16) -> Self {
        Self {
            rows,
            columns,
            pixels: (0..rows as usize * columns as usize)
                .map(|i| base + i as u16)
                .collect(),
            ..Default::default()
        }
    }

    pub fn at(mut self, slice_location: f32) -> Self {
        self.slice_location = Some(slice_location);
        self
    }

    pub fn ct(mut self) -> Self {
        self.pixel_spacing = Some((1.0, 1.0));
        self.rescale = Some((1.0, -1024.0));
        self
    }
}

fn ds(tag: dicom::core::Tag, value: f32) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, VR::DS, PrimitiveValue::from(value.to_string()))
}

fn ds_pair(tag: dicom::core::Tag, (a, b): (f32, f32)) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, VR::DS, dicom_value!(Strs, [a.to_string(), b.to_string()]))
}

fn us(tag: dicom::core::Tag, value: u16) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

pub fn dicom_object(spec: &SliceSpec, instance_uid: &str) -> FileDicomObject<InMemDicomObject> {
    let mut obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(CT_IMAGE_STORAGE)),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(instance_uid)),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        us(tags::SAMPLES_PER_PIXEL, 1),
        DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ),
        us(tags::ROWS, spec.rows),
        us(tags::COLUMNS, spec.columns),
        us(tags::BITS_ALLOCATED, 16),
        us(tags::BITS_STORED, 16),
        us(tags::HIGH_BIT, 15),
        us(tags::PIXEL_REPRESENTATION, 0),
    ]);

    if let Some(location) = spec.slice_location {
        obj.put(ds(tags::SLICE_LOCATION, location));
    }
    if let Some(z) = spec.image_position_z {
        obj.put(DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            dicom_value!(Strs, ["-100".to_string(), "-100".to_string(), z.to_string()]),
        ));
    }
    if let Some(number) = spec.instance_number {
        obj.put(DataElement::new(
            tags::INSTANCE_NUMBER,
            VR::IS,
            PrimitiveValue::from(number.to_string()),
        ));
    }
    if let Some(spacing) = spec.pixel_spacing {
        obj.put(ds_pair(tags::PIXEL_SPACING, spacing));
    }
    if let Some((slope, intercept)) = spec.rescale {
        obj.put(ds(tags::RESCALE_SLOPE, slope));
        obj.put(ds(tags::RESCALE_INTERCEPT, intercept));
    }
    if let Some(thickness) = spec.slice_thickness {
        obj.put(ds(tags::SLICE_THICKNESS, thickness));
    }
    if let Some((center, width)) = spec.window {
        obj.put(DataElement::new(tags::WINDOW_CENTER, VR::DS, PrimitiveValue::from(center)));
        obj.put(DataElement::new(tags::WINDOW_WIDTH, VR::DS, PrimitiveValue::from(width)));
    }

    let pixel_bytes: Vec<u8> = bytemuck::cast_slice(spec.pixels.as_slice()).to_vec();
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OW,
        PrimitiveValue::from(pixel_bytes),
    ));

    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(instance_uid),
    )
    .expect("should have built file meta group")
}

pub fn write_dicom(path: &Path, spec: &SliceSpec) {
    let uid = format!("1.2.826.0.1.3680043.2.1125.{}", fxhash(path));
    dicom_object(spec, &uid)
        .write_to_file(path)
        .expect("should have written DICOM file");
}

/// A well-formed header whose PixelData element is missing.
pub fn write_dicom_without_pixels(path: &Path, spec: &SliceSpec) {
    let mut obj = dicom_object(spec, "1.2.826.0.1.3680043.2.1125.1");
    assert!(obj.remove_element(tags::PIXEL_DATA));
    obj.write_to_file(path)
        .expect("should have written DICOM file");
}

/// The complete file, preamble included.
pub fn dicom_bytes(spec: &SliceSpec) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("image.dcm");
    write_dicom(&path, spec);
    std::fs::read(path).expect("should have read DICOM file back")
}

fn fxhash(path: &Path) -> u64 {
    path.to_string_lossy()
        .bytes()
        .fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
        % 1_000_000_000
}
