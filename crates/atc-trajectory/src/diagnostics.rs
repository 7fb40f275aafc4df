//! Per-plan diagnostic list.
//!
//! Each [`crate::Plan`] owns one. Operators append to it; callers query and
//! clear it explicitly. Entries are also emitted through `tracing`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Vertex the message refers to, if any.
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>, index: Option<usize>) {
        let message = message.into();
        tracing::debug!(?index, "plan warning: {}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message,
            index,
        });
    }

    pub fn error(&mut self, message: impl Into<String>, index: Option<usize>) {
        let message = message.into();
        tracing::warn!(?index, "plan error: {}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message,
            index,
        });
    }

    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn has_message(&self) -> bool {
        !self.entries.is_empty()
    }

    /// All messages joined with "; ", errors first.
    pub fn message(&self) -> String {
        let errors = self.entries.iter().filter(|d| d.severity == Severity::Error);
        let warnings = self.entries.iter().filter(|d| d.severity == Severity::Warning);
        errors
            .chain(warnings)
            .map(|d| match d.index {
                Some(ix) => format!("[{ix}] {}", d.message),
                None => d.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move every entry of `other` into this list.
    pub fn absorb(&mut self, other: &mut Diagnostics) {
        self.entries.append(&mut other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_listed_first() {
        let mut d = Diagnostics::new();
        d.warn("short leg", Some(3));
        assert!(d.has_message());
        assert!(!d.has_error());
        d.error("no EGS found", None);
        assert!(d.has_error());
        assert_eq!(d.message(), "no EGS found; [3] short leg");
        d.clear();
        assert!(d.is_empty());
    }
}
