/// The three orthogonal planes a [`Volume`](crate::volume::Volume) can be
/// cut along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// Cut along the depth axis, yields (row × column).
    Axial,
    /// Cut along the row axis, yields (depth × column).
    Coronal,
    /// Cut along the column axis, yields (depth × row).
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// Index of the volume axis this orientation slices through.
    pub fn axis(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Resample coronal and sagittal planes to isotropic pixels.
    Bilinear,
    #[default]
    None,
}

/// Which attribute produced a slice's sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    SliceLocation,
    ImagePositionPatient,
    InstanceNumber,
    /// No ordering metadata at all, the key is the constant default.
    Fallback,
}

impl KeySource {
    /// Whether the key is a physical position in millimeters, usable for
    /// deriving the distance between slices.
    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            KeySource::SliceLocation | KeySource::ImagePositionPatient
        )
    }
}
