use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The design's extents cannot be represented in 32-bit internal units.
    #[error(
        "The design is too large and cannot be imported. \
         Current design size: {width_mm:.2}, {height_mm:.2} millimeters. \
         Maximum permitted design size: {max_mm:.2}, {max_mm:.2} millimeters."
    )]
    DesignTooLarge { width_mm: f64, height_mm: f64, max_mm: f64 },

    /// A reference inside the archive does not resolve; the file is corrupt.
    #[error("The file appears to be corrupt: {0}")]
    Corrupt(String),

    /// The progress observer asked to stop.
    #[error("import canceled by user")]
    Canceled,
}
