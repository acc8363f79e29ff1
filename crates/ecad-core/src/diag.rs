use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a diagnostic was raised in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source name (usually a file path, or a synthetic name for buffers).
    pub source: String,
    /// 1-based line number.
    pub line: u32,
    /// Byte offset within the line.
    pub offset: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub text: String,
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.severity, &self.location) {
            (Severity::Error, Some(loc)) => write!(f, "error at {loc}: {}", self.text),
            (Severity::Error, None) => write!(f, "error: {}", self.text),
            (Severity::Warning, _) => write!(f, "warning: {}", self.text),
            (Severity::Message, _) => write!(f, "{}", self.text),
        }
    }
}

/// Sink for messages, warnings and errors raised while parsing or importing.
///
/// Owned by the caller and passed in by `&mut`; appended to by the running
/// thread only, so no synchronization is required of the caller. A caller
/// that wants abort-on-first-warning semantics can check [`Diagnostics::len`]
/// between operations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{text}");
        self.entries.push(Diagnostic { severity: Severity::Message, text, location: None });
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::warn!("{text}");
        self.entries.push(Diagnostic { severity: Severity::Warning, text, location: None });
    }

    pub fn error(&mut self, text: impl Into<String>, location: Option<Location>) {
        let text = text.into();
        log::error!("{text}");
        self.entries.push(Diagnostic { severity: Severity::Error, text, location });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_by_severity() {
        let mut diag = Diagnostics::new();
        diag.message("imported ok");
        diag.warn("approximated a thing");
        diag.warn("dropped a thing");
        assert_eq!(diag.len(), 3);
        assert_eq!(diag.warnings().count(), 2);
        assert!(!diag.has_errors());
    }
}
