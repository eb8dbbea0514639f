use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use medical_volume::{
    Interpolation, Orientation, PresetTable, SeriesOptions, Volume, VolumeLoader, WindowSetting,
    WindowedPlane,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Plane {
    Axial,
    Coronal,
    Sagittal,
}

impl From<Plane> for Orientation {
    fn from(plane: Plane) -> Self {
        match plane {
            Plane::Axial => Orientation::Axial,
            Plane::Coronal => Orientation::Coronal,
            Plane::Sagittal => Orientation::Sagittal,
        }
    }
}

/// Render one window/levelled plane of a CT series, NIfTI volume or X-ray.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Series directory, .zip archive, .nii/.nii.gz file or single DICOM file
    input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Plane::Axial)]
    plane: Plane,

    /// Slice index along the plane's axis, the middle slice when omitted
    #[arg(short, long, allow_negative_numbers = true)]
    index: Option<isize>,

    /// Named preset, e.g. "Bone" or "Lung"
    #[arg(long, conflicts_with_all = ["center", "width"])]
    preset: Option<String>,

    #[arg(long, requires = "width", allow_negative_numbers = true)]
    center: Option<f32>,

    #[arg(long, requires = "center")]
    width: Option<f32>,

    /// Resample coronal and sagittal planes to square pixels
    #[arg(long)]
    isotropic: bool,

    /// Invert the output (X-ray display convention)
    #[arg(long)]
    invert: bool,

    /// Parse series files on a single thread
    #[arg(long)]
    sequential: bool,

    #[arg(short, long, default_value = "result.png")]
    output: PathBuf,
}

impl Args {
    fn explicit_window(&self) -> Result<Option<WindowSetting>> {
        if let Some(name) = &self.preset {
            let window = PresetTable::get(name).with_context(|| {
                let known: Vec<_> = PresetTable::names().collect();
                format!("unknown preset {name:?}, expected one of {known:?}")
            })?;
            return Ok(Some(window));
        }
        Ok(self
            .center
            .zip(self.width)
            .map(|(center, width)| WindowSetting::new(center, width)))
    }
}

fn load_volume(args: &Args, options: &SeriesOptions) -> Result<Option<Volume>> {
    let path = &args.input;
    if path.is_dir() {
        let volume = VolumeLoader::load_from_directory(path, options)
            .with_context(|| format!("failed to load series from {}", path.display()))?;
        return Ok(Some(volume));
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if name.ends_with(".zip") {
        let bytes = std::fs::read(path)?;
        return Ok(Some(VolumeLoader::load_from_zip(&bytes, options)?));
    }
    if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        let bytes = std::fs::read(path)?;
        return Ok(Some(VolumeLoader::load_nifti(&bytes, &name)?));
    }
    Ok(None)
}

fn render(args: &Args) -> Result<WindowedPlane> {
    let mut options = SeriesOptions::default();
    if args.sequential {
        options = options.sequential();
    }
    let interpolation = if args.isotropic {
        Interpolation::Bilinear
    } else {
        Interpolation::None
    };

    if let Some(volume) = load_volume(args, &options)? {
        let orientation = Orientation::from(args.plane);
        let (min, max) = volume.intensity_range();
        let window = args
            .explicit_window()?
            .unwrap_or_default()
            .fit_to_range(min, max);
        let index = args
            .index
            .unwrap_or(volume.center_index(orientation) as isize);
        info!(dim = ?volume.dim(), ?orientation, index, ?window, "rendering plane");
        return volume
            .get_windowed_slice(index, orientation, window, interpolation)
            .context("volume has no slices along the requested axis");
    }

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let xray = VolumeLoader::load_xray(&bytes)
        .with_context(|| format!("{} is not a readable DICOM image", args.input.display()))?;
    let (min, max) = xray.intensity_range();
    let window = args
        .explicit_window()?
        .unwrap_or(xray.default_window)
        .fit_to_range(min, max);
    info!(dim = ?xray.dim(), ?window, "rendering radiograph");
    Ok(xray.windowed(window))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut plane = render(&args)?;
    if args.invert {
        plane = plane.inverted();
    }

    let Some(image) = plane.to_image() else {
        bail!("plane of size {:?} cannot be encoded", plane.dim());
    };
    image
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), "saved");
    Ok(())
}
