use ecad_core::Location;
use ecad_sexpr::SexprError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchError {
    /// Malformed token stream at a specific location. Fatal except inside a
    /// library, where a per-symbol recovery boundary applies.
    #[error(transparent)]
    Parse(#[from] SexprError),

    /// A structurally valid form with invalid content.
    #[error("{text} ({location})")]
    Malformed { text: String, location: Location },

    /// The file is newer than this reader supports. No partial result.
    #[error("file requires version {required}, written by generator version {}",
            generator.as_deref().unwrap_or("unknown"))]
    FutureFormat { required: i32, generator: Option<String> },

    /// The progress observer asked to stop. No partial result.
    #[error("open canceled by user")]
    Canceled,

    /// Embedded image bytes that no decoder accepts.
    #[error("failed to read image data ({location})")]
    BadImage { location: Location },
}

impl SchError {
    pub fn malformed(text: impl Into<String>, location: Location) -> Self {
        SchError::Malformed { text: text.into(), location }
    }

    /// True for errors that abort the whole parse even inside a recovery
    /// scope (future format, cancellation).
    pub fn is_global(&self) -> bool {
        matches!(self, SchError::FutureFormat { .. } | SchError::Canceled)
    }
}
