/// How a series directory is scanned and turned into a volume.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesOptions {
    /// Extensions (without the dot, case-insensitive) that mark a DICOM file.
    /// When no file matches, extensionless files are tried instead.
    pub extensions: Vec<String>,
    /// Parse candidate files on the rayon thread pool.
    pub parallel: bool,
    /// Floor applied to the derived distance between slices, in mm.
    pub min_depth_spacing: f32,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["dcm".to_string(), "dicom".to_string()],
            parallel: true,
            min_depth_spacing: 0.1,
        }
    }
}

impl SeriesOptions {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn min_depth_spacing(mut self, spacing: f32) -> Self {
        self.min_depth_spacing = spacing;
        self
    }

    pub(crate) fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    }
}
