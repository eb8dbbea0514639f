//! # medical-volume
//!
//! Reconstructs CT series, single radiographs and NIfTI files into intensity
//! volumes with physical spacing, and cuts window/levelled 8-bit planes out
//! of them.
//!
//! The pipeline is:
//!  - parse each file into a [`SliceRecord`] (rescaled intensities, a
//!    position key and pixel spacing),
//!  - order the records of a series by that key,
//!  - stack them into a [`Volume`] indexed (depth, row, column) with a
//!    matching [`Spacing`],
//!  - cut an Axial, Coronal or Sagittal plane and map it through a
//!    [`WindowSetting`] into a [`WindowedPlane`].
//!
//! DICOM metadata is read through [`metadata::FallbackChain`]s, so missing
//! attributes never abort a load: positions fall back from SliceLocation to
//! ImagePositionPatient to InstanceNumber, spacing defaults to 1 mm and the
//! rescale to the identity. Candidate files of a series are parsed in
//! parallel using rayon and then sorted, so the result does not depend on
//! directory enumeration order.
//!
//! # Examples
//!
//! ## Reading a CT series and windowing its middle slice
//!
//! ```no_run
//! # use medical_volume::{Interpolation, Orientation, PresetTable, SeriesOptions, VolumeLoader};
//! let volume = VolumeLoader::load_from_directory("dicom", &SeriesOptions::default())
//!     .expect("should have loaded files from directory");
//! let bone = PresetTable::get("Bone").expect("bone preset exists");
//! let plane = volume
//!     .get_windowed_slice(
//!         volume.center_index(Orientation::Sagittal) as isize,
//!         Orientation::Sagittal,
//!         bone,
//!         Interpolation::Bilinear,
//!     )
//!     .expect("volume is not empty");
//! plane
//!     .to_image()
//!     .expect("plane fits an image")
//!     .save("result.png")
//!     .expect("should have written image");
//! ```
//!
//! ## Reading a NIfTI file
//!
//! ```no_run
//! # use medical_volume::VolumeLoader;
//! let bytes = std::fs::read("ct.nii.gz").unwrap();
//! let volume = VolumeLoader::load_nifti(&bytes, "ct.nii.gz").unwrap();
//! let (depth, rows, columns) = volume.dim();
//! ```

pub mod enums;
mod interpolator;
pub mod metadata;
mod nifti_loader;
pub mod options;
pub mod slice_record;
pub mod volume;
pub mod volume_loader;
pub mod window;
pub mod xray;

pub use enums::{Interpolation, KeySource, Orientation};
pub use options::SeriesOptions;
pub use slice_record::{ParseError, SliceRecord};
pub use volume::{Spacing, Volume};
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
pub use window::{PresetTable, WindowSetting, WindowedPlane, apply_windowing};
pub use xray::XrayImage;
