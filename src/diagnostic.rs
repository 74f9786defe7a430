use std::ops::Range;

use thiserror::Error;

/// Category of a binding failure. None are retryable: the caller must
/// change the call before building again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindErrorKind {
    /// More explicit overrides than arguments, or an unknown keyword.
    OverrideArity,
    /// An explicit override that cannot be applied to its variable.
    MalformedOverride,
    /// A host value or field with no kernel-side counterpart.
    BindingLookup,
    /// Strict broadcasting rejected a variable's dimensionality.
    StrictBroadcasting,
    /// A top-level output bound to a read-only value.
    NonWritableWrite,
    /// A variable has more dimensions than the dispatch.
    DispatchRank,
    /// A marshall failed while resolving or emitting a variable.
    Marshall,
}

impl BindErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            BindErrorKind::OverrideArity => "override arity",
            BindErrorKind::MalformedOverride => "malformed override",
            BindErrorKind::BindingLookup => "binding lookup",
            BindErrorKind::StrictBroadcasting => "strict broadcasting",
            BindErrorKind::NonWritableWrite => "non-writable write",
            BindErrorKind::DispatchRank => "dispatch rank",
            BindErrorKind::Marshall => "marshall",
        }
    }
}

/// A binding, vectorization or generation failure for one variable.
#[derive(Clone, Debug, Error)]
#[error("{}: {message}", .kind.label())]
pub struct BindError {
    pub kind: BindErrorKind,
    /// Path of the offending variable; empty for call-level failures.
    pub path: String,
    pub message: String,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

pub type Result<T> = std::result::Result<T, BindError>;

impl BindError {
    pub fn new(kind: BindErrorKind, path: &str, message: String) -> Self {
        Self {
            kind,
            path: path.to_string(),
            message,
            notes: Vec::new(),
            help: None,
        }
    }

    /// A failure not tied to a particular variable.
    pub fn call(kind: BindErrorKind, message: String) -> Self {
        Self::new(kind, "", message)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Locate the variable inside a rendered call such as `add(a, b.x)`.
    fn span_in(&self, call_text: &str) -> Range<usize> {
        if self.path.is_empty() {
            return 0..call_text.len();
        }
        let bytes = call_text.as_bytes();
        let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'.';
        for (start, _) in call_text.match_indices(self.path.as_str()) {
            let end = start + self.path.len();
            let clean_left = start == 0 || !is_ident(bytes[start - 1]);
            let clean_right = end == bytes.len() || !is_ident(bytes[end]);
            if clean_left && clean_right {
                return start..end;
            }
        }
        0..call_text.len()
    }

    /// Render the error to stderr using ariadne, labelling the variable
    /// inside `call_text` (see `BoundCall::describe`).
    pub fn render(&self, filename: &str, call_text: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let span = self.span_in(call_text);
        let label_message = if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("'{}': {}", self.path, self.message)
        };

        let mut report = Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(label_message)
                    .with_color(Color::Red),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        let _ = report
            .finish()
            .eprint((filename, Source::from(call_text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = BindError::new(
            BindErrorKind::StrictBroadcasting,
            "a",
            "dimensionality 1 is neither 0 nor 3".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "strict broadcasting: dimensionality 1 is neither 0 nor 3"
        );
    }

    #[test]
    fn test_span_matches_whole_path() {
        let err = BindError::new(BindErrorKind::BindingLookup, "b.x", String::new());
        let text = "f(b.xx, b.x)";
        assert_eq!(&text[err.span_in(text)], "b.x");

        let missing = BindError::new(BindErrorKind::BindingLookup, "c", String::new());
        assert_eq!(missing.span_in(text), 0..text.len());
    }

    #[test]
    fn test_builder_methods() {
        let err = BindError::call(BindErrorKind::OverrideArity, "too many".to_string())
            .with_note("2 arguments declared".to_string())
            .with_help("remove the extra override".to_string());
        assert!(err.path.is_empty());
        assert_eq!(err.notes.len(), 1);
        assert!(err.help.is_some());
    }
}
