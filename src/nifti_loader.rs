//! NIfTI-1 decoding into a canonically oriented [`Volume`].
//!
//! The voxel grid is reoriented to the closest RAS+ orientation (the first
//! voxel axis runs towards the patient's right, the second anterior, the
//! third superior), the fourth and further axes are dropped, and the
//! (x, y, z) layout is transposed to (depth, row, column).

use crate::{
    slice_record::ParseError,
    volume::{Spacing, Volume},
};

use flate2::read::GzDecoder;
use ndarray::{Array3, ArrayD, Axis, Ix3, IxDyn};
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject, volume::ndarray::IntoNdArray};
use tracing::{debug, warn};

/// Relative tolerance between header pixdim and affine column norms.
const SPACING_TOLERANCE: f64 = 1e-3;

/// Decode a `.nii` or `.nii.gz` payload. `filename` is only used to detect
/// gzip compression.
pub(crate) fn decode(bytes: &[u8], filename: &str) -> Result<Volume, ParseError> {
    let object = if is_gzip_name(filename) {
        InMemNiftiObject::from_reader(GzDecoder::new(bytes))?
    } else {
        InMemNiftiObject::from_reader(bytes)?
    };
    let header = object.header().clone();

    let voxels = object.into_volume().into_ndarray::<f32>()?;
    // Rebuilt through a Vec so the decoder's ndarray version need not match ours.
    let shape = voxels.shape().to_vec();
    let values: Vec<f32> = voxels.iter().copied().collect();
    drop(voxels);
    let array = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| ParseError::NotVolumetric(e.to_string()))?;
    let array = first_volume(array)?;

    let affine = Affine::from_header(&header);
    let orientation = affine.closest_canonical();
    debug!(?orientation, "reorienting NIfTI volume to RAS+");
    let canonical = reorient(array, &orientation);
    let (x_spacing, y_spacing, z_spacing) = canonical_spacing(&affine, &header, &orientation);

    let data = canonical
        .permuted_axes([2, 1, 0])
        .as_standard_layout()
        .into_owned();
    Ok(Volume::new(
        data,
        Spacing::new(z_spacing as f32, y_spacing as f32, x_spacing as f32),
    ))
}

fn is_gzip_name(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".gz")
}

/// Keep index 0 along every axis past the third.
fn first_volume(mut array: ArrayD<f32>) -> Result<Array3<f32>, ParseError> {
    if array.ndim() < 3 {
        return Err(ParseError::NotVolumetric(format!(
            "expected at least 3 dimensions, found {}",
            array.ndim()
        )));
    }
    while array.ndim() > 3 {
        let last = Axis(array.ndim() - 1);
        if array.len_of(last) == 0 {
            return Err(ParseError::NotVolumetric("empty trailing axis".to_string()));
        }
        array = array.index_axis_move(last, 0);
    }
    if array.is_empty() {
        return Err(ParseError::NotVolumetric("empty volume".to_string()));
    }
    array
        .into_dimensionality::<Ix3>()
        .map_err(|e| ParseError::NotVolumetric(e.to_string()))
}

/// Rotation/zoom part of the voxel-to-world transform; `m[world][voxel]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    m: [[f64; 3]; 3],
}

/// For each world axis (R, A, S): the voxel axis that runs along it and
/// whether that voxel axis points the opposite way.
type AxisMapping = [(usize, bool); 3];

impl Affine {
    fn from_header(header: &NiftiHeader) -> Self {
        if header.sform_code > 0 {
            let rows = [header.srow_x, header.srow_y, header.srow_z];
            let mut m = [[0.0; 3]; 3];
            for (world, row) in rows.iter().enumerate() {
                for voxel in 0..3 {
                    m[world][voxel] = f64::from(row[voxel]);
                }
            }
            Self { m }
        } else if header.qform_code > 0 {
            Self::from_quaternion(header)
        } else {
            let p = &header.pixdim;
            Self {
                m: [
                    [f64::from(p[1]), 0.0, 0.0],
                    [0.0, f64::from(p[2]), 0.0],
                    [0.0, 0.0, f64::from(p[3])],
                ],
            }
        }
    }

    #[allow(clippy::many_single_char_names)]
    fn from_quaternion(header: &NiftiHeader) -> Self {
        let (b, c, d) = (
            f64::from(header.quatern_b),
            f64::from(header.quatern_c),
            f64::from(header.quatern_d),
        );
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let (i, j, k) = (
            f64::from(header.pixdim[1]).abs(),
            f64::from(header.pixdim[2]).abs(),
            f64::from(header.pixdim[3]).abs() * qfac,
        );
        Self {
            m: [
                [
                    (a * a + b * b - c * c - d * d) * i,
                    2.0 * (b * c - a * d) * j,
                    2.0 * (b * d + a * c) * k,
                ],
                [
                    2.0 * (b * c + a * d) * i,
                    (a * a - b * b + c * c - d * d) * j,
                    2.0 * (c * d - a * b) * k,
                ],
                [
                    2.0 * (b * d - a * c) * i,
                    2.0 * (c * d + a * b) * j,
                    (a * a - b * b - c * c + d * d) * k,
                ],
            ],
        }
    }

    /// Length of each voxel axis in world units.
    fn column_norms(&self) -> [f64; 3] {
        std::array::from_fn(|voxel| {
            (0..3)
                .map(|world| self.m[world][voxel].powi(2))
                .sum::<f64>()
                .sqrt()
        })
    }

    /// Greedily pair voxel axes with world axes by largest absolute
    /// direction cosine. Degenerate columns fall back to identity order.
    fn closest_canonical(&self) -> AxisMapping {
        let norms = self.column_norms();
        let cosine = |world: usize, voxel: usize| {
            if norms[voxel] > 0.0 {
                self.m[world][voxel] / norms[voxel]
            } else {
                0.0
            }
        };

        let mut mapping: [Option<(usize, bool)>; 3] = [None; 3];
        let mut voxel_used = [false; 3];
        for _ in 0..3 {
            let best = (0..3)
                .filter(|&world| mapping[world].is_none())
                .flat_map(|world| (0..3).map(move |voxel| (world, voxel)))
                .filter(|&(_, voxel)| !voxel_used[voxel])
                .max_by(|&(w1, v1), &(w2, v2)| {
                    cosine(w1, v1)
                        .abs()
                        .total_cmp(&cosine(w2, v2).abs())
                        // prefer the lowest indices on ties
                        .then_with(|| (w2, v2).cmp(&(w1, v1)))
                });
            if let Some((world, voxel)) = best {
                mapping[world] = Some((voxel, cosine(world, voxel) < 0.0));
                voxel_used[voxel] = true;
            }
        }

        std::array::from_fn(|world| mapping[world].unwrap_or((world, false)))
    }
}

fn reorient(array: Array3<f32>, mapping: &AxisMapping) -> Array3<f32> {
    let mut canonical = array.permuted_axes([mapping[0].0, mapping[1].0, mapping[2].0]);
    for (world, &(_, flipped)) in mapping.iter().enumerate() {
        if flipped {
            canonical.invert_axis(Axis(world));
        }
    }
    canonical
}

/// Voxel size along the canonical (x, y, z) axes.
///
/// Taken from the same affine that drove the reorientation and checked
/// against the header's pixdim, which some writers leave stale.
fn canonical_spacing(
    affine: &Affine,
    header: &NiftiHeader,
    mapping: &AxisMapping,
) -> (f64, f64, f64) {
    let norms = affine.column_norms();
    let spacing: [f64; 3] = std::array::from_fn(|world| {
        let voxel = mapping[world].0;
        let from_header = f64::from(header.pixdim[voxel + 1]).abs();
        let from_affine = norms[voxel];
        if !from_affine.is_finite() || from_affine <= 0.0 {
            return from_header;
        }
        if (from_affine - from_header).abs() > SPACING_TOLERANCE * from_affine.max(from_header) {
            warn!(
                voxel_axis = voxel,
                from_affine, from_header, "NIfTI pixdim disagrees with the affine, using the affine"
            );
        }
        from_affine
    });
    (spacing[0], spacing[1], spacing[2])
}
