//! Error types for MIME decoding.
//!
//! Only caller mistakes and I/O surface as [`Error`]. Malformed mail never
//! does: a field that cannot be decoded is dropped or defaulted and reported
//! as a [`ParseIssue`] instead.

use std::fmt;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An empty buffer was handed to a message constructor.
    #[error("Message buffer is empty")]
    EmptyMessage,

    /// I/O error while loading or saving a message.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Base64 decode error from the strict decoder.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

/// A header field or body that could not be decoded as written.
///
/// The decoder recovers from every issue; this only tells the caller what
/// was dropped or replaced with a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// Header name or part location the issue belongs to.
    pub field: String,
    /// The offending raw input.
    pub input: String,
    /// What went wrong and what was used instead.
    pub description: String,
}

impl ParseIssue {
    /// Creates a new issue.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        input: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            input: input.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({:?})", self.field, self.description, self.input)
    }
}

/// Observer for recoverable decoding problems.
///
/// Any `Fn(&ParseIssue) + Send + Sync` closure is a handler.
pub trait ParseIssueHandler: Send + Sync {
    /// Called once per issue, in the order issues are found.
    fn on_issue(&self, issue: &ParseIssue);
}

impl<F> ParseIssueHandler for F
where
    F: Fn(&ParseIssue) + Send + Sync,
{
    fn on_issue(&self, issue: &ParseIssue) {
        self(issue);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_handler() {
        let seen = Mutex::new(Vec::new());
        let handler = |issue: &ParseIssue| seen.lock().unwrap().push(issue.field.clone());

        handler.on_issue(&ParseIssue::new("Date", "foo", "unparsable date"));
        handler.on_issue(&ParseIssue::new("To", "bar", "invalid address"));

        assert_eq!(*seen.lock().unwrap(), vec!["Date", "To"]);
    }

    #[test]
    fn test_issue_display() {
        let issue = ParseIssue::new("Date", "foo", "unparsable date");
        assert_eq!(issue.to_string(), "Date: unparsable date (\"foo\")");
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::other("disk gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
