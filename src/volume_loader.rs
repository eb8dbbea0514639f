use crate::{
    metadata::SLICE_THICKNESS,
    nifti_loader,
    options::SeriesOptions,
    slice_record::{ParseError, SliceRecord},
    volume::{Spacing, Volume},
    xray::XrayImage,
};

use ndarray::{Array3, s};
use rayon::prelude::*;
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found in {}", .0.display())]
    SeriesEmpty(PathBuf),

    #[error("No valid DICOM images among the given slices")]
    NoSlices,

    #[error("Inconsistent image dimensions: slice {index} is {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a CT series from a directory (searched recursively).
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::SeriesEmpty`] if no file could be parsed
    /// and [`VolumeLoaderError::ShapeMismatch`] if the slices differ in size.
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        options: &SeriesOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        let candidates = Self::discover_files(path, options)?;
        let records = Self::load_series(&candidates, options);
        if records.is_empty() {
            return Err(VolumeLoaderError::SeriesEmpty(path.to_path_buf()));
        }
        Self::build_volume(&records, options)
    }

    /// Load a volume from explicit file paths. Unreadable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::NoSlices`] if none of the files parse.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        options: &SeriesOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let records = Self::load_series(paths, options);
        if records.is_empty() {
            return Err(VolumeLoaderError::NoSlices);
        }
        Self::build_volume(&records, options)
    }

    /// Extract a ZIP archive into a temporary directory and load the series it
    /// contains. The directory is removed before returning, on success or
    /// failure.
    pub fn load_from_zip(
        bytes: &[u8],
        options: &SeriesOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let temp_dir = tempfile::Builder::new().prefix("ct_upload_").tempdir()?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        archive.extract(temp_dir.path())?;
        Self::load_from_directory(temp_dir.path(), options)
    }

    /// Decode a NIfTI payload; `filename` only decides whether it is gzipped.
    pub fn load_nifti(bytes: &[u8], filename: &str) -> Result<Volume, VolumeLoaderError> {
        let volume = nifti_loader::decode(bytes, filename)?;
        info!(dim = ?volume.dim(), spacing = ?volume.spacing(), "loaded NIfTI volume");
        Ok(volume)
    }

    /// Load a single radiograph. Unlike series loading, a parse failure is
    /// fatal here.
    pub fn load_xray(bytes: &[u8]) -> Result<XrayImage, VolumeLoaderError> {
        Ok(XrayImage::from_dicom_bytes(bytes)?)
    }

    /// Candidate files under `path`, sorted by path.
    ///
    /// Files with a recognized extension win; if there are none, files
    /// without any extension are returned instead.
    pub fn discover_files(
        path: &Path,
        options: &SeriesOptions,
    ) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let files = Self::collect_files(path)?;

        let (mut matching, mut extensionless): (Vec<_>, Vec<_>) = files
            .into_iter()
            .filter(|file| {
                file.extension()
                    .is_none_or(|ext| ext.to_str().is_some_and(|ext| options.matches_extension(ext)))
            })
            .partition(|file| file.extension().is_some());

        if matching.is_empty() {
            debug!(
                count = extensionless.len(),
                "no files with a known extension, trying extensionless files"
            );
            extensionless.sort();
            return Ok(extensionless);
        }
        matching.sort();
        Ok(matching)
    }

    /// Regular files below `root`. Symlinks are not followed, and entries
    /// that cannot be read are skipped; only an unreadable `root` is an error.
    fn collect_files(root: &Path) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(error) if error.depth() == 0 => return Err(std::io::Error::from(error).into()),
                Err(error) => debug!(%error, "skipping unreadable directory entry"),
            }
        }
        Ok(files)
    }

    /// Parse every candidate independently, skip the ones that fail and order
    /// the rest by their position key. The result does not depend on the
    /// order of `paths` beyond ties between equal keys.
    pub fn load_series(
        paths: &[impl AsRef<Path> + Sync],
        options: &SeriesOptions,
    ) -> Vec<SliceRecord> {
        let parse = |path: &Path| match SliceRecord::from_dicom_path(path) {
            Ok(record) => Some(record),
            Err(error) => {
                debug!(path = %path.display(), %error, "skipping candidate");
                None
            }
        };

        let mut records: Vec<SliceRecord> = if options.parallel {
            paths
                .par_iter()
                .filter_map(|path| parse(path.as_ref()))
                .collect()
        } else {
            paths.iter().filter_map(|path| parse(path.as_ref())).collect()
        };

        Self::sort_records(&mut records);
        records
    }

    /// Stable sort by position key.
    pub fn sort_records(records: &mut [SliceRecord]) {
        records.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
    }

    /// Stack ordered slices into a volume and derive its spacing.
    ///
    /// # Errors
    ///
    /// Returns error if `records` is empty or the slices differ in size
    pub fn build_volume(
        records: &[SliceRecord],
        options: &SeriesOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let Some(first) = records.first() else {
            return Err(VolumeLoaderError::NoSlices);
        };
        Self::validate_dimensions(records)?;

        let volume_array = Self::build_volume_array(records);
        let (row_spacing, column_spacing) = first.pixel_spacing;
        let spacing = Spacing::new(
            Self::depth_spacing(records, options.min_depth_spacing),
            row_spacing,
            column_spacing,
        );

        info!(dim = ?volume_array.dim(), ?spacing, "built volume");
        Ok(Volume::new(volume_array, spacing))
    }

    fn validate_dimensions(records: &[SliceRecord]) -> Result<(), VolumeLoaderError> {
        let expected = records[0].dim();
        match records
            .iter()
            .enumerate()
            .find(|(_, record)| record.dim() != expected)
        {
            Some((index, record)) => Err(VolumeLoaderError::ShapeMismatch {
                index,
                expected,
                found: record.dim(),
            }),
            None => Ok(()),
        }
    }

    fn build_volume_array(records: &[SliceRecord]) -> Array3<f32> {
        let (height, width) = records[0].dim();
        let depth = records.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, record) in records.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&record.pixels);
        }

        volume
    }

    /// Distance between the first two slices when both carry a physical
    /// position, otherwise the first slice's thickness (1 mm if unknown).
    /// Never below `min_spacing`.
    pub fn depth_spacing(records: &[SliceRecord], min_spacing: f32) -> f32 {
        let measured = match records {
            [first, second, ..] if first.key_source.is_spatial() && second.key_source.is_spatial() => {
                Some((second.sort_key - first.sort_key).abs()).filter(|d| d.is_finite())
            }
            _ => None,
        };

        let spacing = measured.unwrap_or_else(|| {
            let thickness = records
                .first()
                .and_then(|record| record.slice_thickness)
                .unwrap_or(SLICE_THICKNESS.default_value());
            debug!(thickness, "slice distance unavailable, using slice thickness");
            thickness
        });

        spacing.max(min_spacing)
    }
}
