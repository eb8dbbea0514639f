//! Ordered attribute lookups with hard defaults.
//!
//! DICOM headers are notoriously incomplete, so every piece of geometry the
//! loader needs is described as a [`FallbackChain`]: a list of named
//! [`Strategy`] values tried in priority order, followed by a default that
//! always succeeds. The chains below are plain constants and can be
//! inspected or tested on their own.

use dicom::{core::Tag, object::InMemDicomObject};
use dicom_dictionary_std::tags;

use crate::enums::KeySource;

/// A single way of reading a value out of a DICOM data set.
pub struct Strategy<T, L> {
    pub label: L,
    pub extract: fn(&InMemDicomObject) -> Option<T>,
}

/// The outcome of a [`FallbackChain`] lookup, tagged with where it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolved<T, L> {
    pub value: T,
    pub source: L,
}

impl<T: 'static, L: PartialEq + 'static> Resolved<T, L> {
    /// Whether the value came from the chain's default rather than the data set.
    pub fn is_default_of(&self, chain: &FallbackChain<T, L>) -> bool {
        self.source == chain.default_label
    }
}

pub struct FallbackChain<T: 'static, L: 'static> {
    strategies: &'static [Strategy<T, L>],
    default_value: T,
    default_label: L,
}

impl<T: Copy + 'static, L: Copy + 'static> FallbackChain<T, L> {
    pub const fn new(
        strategies: &'static [Strategy<T, L>],
        default_value: T,
        default_label: L,
    ) -> Self {
        Self {
            strategies,
            default_value,
            default_label,
        }
    }

    /// Apply the strategies in order and return the first value found, or the
    /// default.
    pub fn resolve(&self, dicom_object: &InMemDicomObject) -> Resolved<T, L> {
        self.strategies
            .iter()
            .find_map(|strategy| {
                (strategy.extract)(dicom_object).map(|value| Resolved {
                    value,
                    source: strategy.label,
                })
            })
            .unwrap_or(Resolved {
                value: self.default_value,
                source: self.default_label,
            })
    }

    /// Labels of the strategies in priority order, default excluded.
    pub fn labels(&self) -> impl Iterator<Item = L> + '_ {
        self.strategies.iter().map(|strategy| strategy.label)
    }

    pub fn default_value(&self) -> T {
        self.default_value
    }
}

const DEFAULT: &str = "default";

fn float_attr(dicom_object: &InMemDicomObject, tag: Tag) -> Option<f32> {
    multi_float_attr(dicom_object, tag)?.first().copied()
}

fn multi_float_attr(dicom_object: &InMemDicomObject, tag: Tag) -> Option<Vec<f32>> {
    let values = dicom_object.element(tag).ok()?.to_multi_float32().ok()?;
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(values)
}

fn slice_location(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::SLICE_LOCATION)
}

fn image_position_z(dicom_object: &InMemDicomObject) -> Option<f32> {
    multi_float_attr(dicom_object, tags::IMAGE_POSITION_PATIENT)?
        .get(2)
        .copied()
}

fn instance_number(dicom_object: &InMemDicomObject) -> Option<f32> {
    dicom_object
        .element(tags::INSTANCE_NUMBER)
        .ok()?
        .to_int::<i32>()
        .ok()
        .map(|n| n as f32)
}

fn spacing_pair(dicom_object: &InMemDicomObject, tag: Tag) -> Option<(f32, f32)> {
    match multi_float_attr(dicom_object, tag)?.as_slice() {
        [row, column, ..] => Some((*row, *column)),
        _ => None,
    }
}

fn pixel_spacing(dicom_object: &InMemDicomObject) -> Option<(f32, f32)> {
    spacing_pair(dicom_object, tags::PIXEL_SPACING)
}

fn imager_pixel_spacing(dicom_object: &InMemDicomObject) -> Option<(f32, f32)> {
    spacing_pair(dicom_object, tags::IMAGER_PIXEL_SPACING)
}

fn rescale_slope(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::RESCALE_SLOPE)
}

fn rescale_intercept(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::RESCALE_INTERCEPT)
}

fn slice_thickness(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::SLICE_THICKNESS)
}

fn window_center(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::WINDOW_CENTER)
}

fn window_width(dicom_object: &InMemDicomObject) -> Option<f32> {
    float_attr(dicom_object, tags::WINDOW_WIDTH)
}

/// Per-slice ordering key: SliceLocation, then the z component of
/// ImagePositionPatient, then InstanceNumber, then 0.0.
pub const POSITION_KEY: FallbackChain<f32, KeySource> = FallbackChain::new(
    &[
        Strategy {
            label: KeySource::SliceLocation,
            extract: slice_location,
        },
        Strategy {
            label: KeySource::ImagePositionPatient,
            extract: image_position_z,
        },
        Strategy {
            label: KeySource::InstanceNumber,
            extract: instance_number,
        },
    ],
    0.0,
    KeySource::Fallback,
);

/// In-plane (row, column) spacing in mm.
pub const PIXEL_SPACING: FallbackChain<(f32, f32), &str> = FallbackChain::new(
    &[
        Strategy {
            label: "PixelSpacing",
            extract: pixel_spacing,
        },
        Strategy {
            label: "ImagerPixelSpacing",
            extract: imager_pixel_spacing,
        },
    ],
    (1.0, 1.0),
    DEFAULT,
);

pub const RESCALE_SLOPE: FallbackChain<f32, &str> = FallbackChain::new(
    &[Strategy {
        label: "RescaleSlope",
        extract: rescale_slope,
    }],
    1.0,
    DEFAULT,
);

pub const RESCALE_INTERCEPT: FallbackChain<f32, &str> = FallbackChain::new(
    &[Strategy {
        label: "RescaleIntercept",
        extract: rescale_intercept,
    }],
    0.0,
    DEFAULT,
);

pub const SLICE_THICKNESS: FallbackChain<f32, &str> = FallbackChain::new(
    &[Strategy {
        label: "SliceThickness",
        extract: slice_thickness,
    }],
    1.0,
    DEFAULT,
);

pub const WINDOW_CENTER: FallbackChain<f32, &str> = FallbackChain::new(
    &[Strategy {
        label: "WindowCenter",
        extract: window_center,
    }],
    40.0,
    DEFAULT,
);

pub const WINDOW_WIDTH: FallbackChain<f32, &str> = FallbackChain::new(
    &[Strategy {
        label: "WindowWidth",
        extract: window_width,
    }],
    400.0,
    DEFAULT,
);

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR, dicom_value};

    fn object(elements: Vec<DataElement<InMemDicomObject>>) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(elements)
    }

    fn ds(tag: Tag, value: &str) -> DataElement<InMemDicomObject> {
        DataElement::new(tag, VR::DS, PrimitiveValue::from(value))
    }

    #[test]
    fn position_key_prefers_slice_location() {
        let obj = object(vec![
            ds(tags::SLICE_LOCATION, "12.5"),
            DataElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["0", "0", "99"]),
            ),
            DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("7")),
        ]);
        let key = POSITION_KEY.resolve(&obj);
        assert_eq!(key.value, 12.5);
        assert_eq!(key.source, KeySource::SliceLocation);
    }

    #[test]
    fn position_key_falls_through_in_order() {
        let obj = object(vec![
            DataElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["-120", "-80", "-42.5"]),
            ),
            DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("7")),
        ]);
        let key = POSITION_KEY.resolve(&obj);
        assert_eq!(key.value, -42.5);
        assert_eq!(key.source, KeySource::ImagePositionPatient);

        let obj = object(vec![DataElement::new(
            tags::INSTANCE_NUMBER,
            VR::IS,
            PrimitiveValue::from("7"),
        )]);
        let key = POSITION_KEY.resolve(&obj);
        assert_eq!(key.value, 7.0);
        assert_eq!(key.source, KeySource::InstanceNumber);

        let key = POSITION_KEY.resolve(&InMemDicomObject::new_empty());
        assert_eq!(key.value, 0.0);
        assert_eq!(key.source, KeySource::Fallback);
        assert!(key.is_default_of(&POSITION_KEY));
    }

    #[test]
    fn truncated_image_position_is_skipped() {
        let obj = object(vec![
            DataElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["1", "2"]),
            ),
            DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from("3")),
        ]);
        assert_eq!(POSITION_KEY.resolve(&obj).source, KeySource::InstanceNumber);
    }

    #[test]
    fn chain_labels_are_in_priority_order() {
        let labels: Vec<_> = POSITION_KEY.labels().collect();
        assert_eq!(
            labels,
            vec![
                KeySource::SliceLocation,
                KeySource::ImagePositionPatient,
                KeySource::InstanceNumber
            ]
        );
    }

    #[test]
    fn pixel_spacing_defaults_and_fallbacks() {
        let empty = InMemDicomObject::new_empty();
        assert_eq!(PIXEL_SPACING.resolve(&empty).value, (1.0, 1.0));

        let xray = object(vec![DataElement::new(
            tags::IMAGER_PIXEL_SPACING,
            VR::DS,
            dicom_value!(Strs, ["0.139", "0.14"]),
        )]);
        let spacing = PIXEL_SPACING.resolve(&xray);
        assert_eq!(spacing.value, (0.139, 0.14));
        assert_eq!(spacing.source, "ImagerPixelSpacing");
    }

    #[test]
    fn rescale_defaults_to_identity() {
        let empty = InMemDicomObject::new_empty();
        assert_eq!(RESCALE_SLOPE.resolve(&empty).value, 1.0);
        assert_eq!(RESCALE_INTERCEPT.resolve(&empty).value, 0.0);

        let ct = object(vec![
            ds(tags::RESCALE_SLOPE, "1"),
            ds(tags::RESCALE_INTERCEPT, "-1024"),
        ]);
        assert_eq!(RESCALE_SLOPE.resolve(&ct).value, 1.0);
        assert_eq!(RESCALE_INTERCEPT.resolve(&ct).value, -1024.0);
    }

    #[test]
    fn window_uses_first_of_multiple_values() {
        let obj = object(vec![
            DataElement::new(tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, ["40", "300"])),
            DataElement::new(tags::WINDOW_WIDTH, VR::DS, dicom_value!(Strs, ["400", "1500"])),
        ]);
        assert_eq!(WINDOW_CENTER.resolve(&obj).value, 40.0);
        assert_eq!(WINDOW_WIDTH.resolve(&obj).value, 400.0);

        let empty = InMemDicomObject::new_empty();
        assert_eq!(WINDOW_CENTER.resolve(&empty).value, 40.0);
        assert_eq!(WINDOW_WIDTH.resolve(&empty).value, 400.0);
    }

    fn rows(dicom_object: &InMemDicomObject) -> Option<u16> {
        dicom_object.element(tags::ROWS).ok()?.to_int().ok()
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum RowsSource {
        Header,
        Assumed,
    }

    static ROWS_CHAIN: FallbackChain<u16, RowsSource> = FallbackChain::new(
        &[Strategy {
            label: RowsSource::Header,
            extract: rows,
        }],
        512,
        RowsSource::Assumed,
    );

    #[test]
    fn chains_work_with_any_value_and_label_type() {
        let empty = InMemDicomObject::new_empty();
        let assumed = ROWS_CHAIN.resolve(&empty);
        assert_eq!(assumed.value, 512);
        assert!(assumed.is_default_of(&ROWS_CHAIN));

        let obj = object(vec![DataElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::from(256u16),
        )]);
        let found = ROWS_CHAIN.resolve(&obj);
        assert_eq!(found.source, RowsSource::Header);
        assert_eq!(found.value, 256);
        assert!(!found.is_default_of(&ROWS_CHAIN));
        assert_eq!(ROWS_CHAIN.default_value(), 512);
    }
}
