//! Decoding options.

use std::fmt;
use std::sync::Arc;

use crate::charset::CharsetResolver;
use crate::error::{ParseIssue, ParseIssueHandler};
use crate::params::ParameterPrecedence;

/// Default multipart nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// File name used for parts that do not name themselves.
pub const DEFAULT_FILE_NAME: &str = "(no name)";

/// Options controlling how messages are decoded.
///
/// `DecodeOptions::default()` is what the zero-config entry points such as
/// [`Message::parse`](crate::Message::parse) use.
#[derive(Clone)]
pub struct DecodeOptions {
    /// Charset name resolution.
    pub charsets: CharsetResolver,
    /// Maximum multipart nesting depth. Deeper parts are kept undecoded.
    pub max_depth: usize,
    /// File name for parts without a `filename` or `name` parameter.
    pub default_file_name: String,
    /// Whether to build the body part tree at all.
    pub parse_body: bool,
    /// Which form of a doubly specified parameter wins.
    pub parameter_precedence: ParameterPrecedence,
    /// Observer for recoverable problems.
    pub issue_handler: Option<Arc<dyn ParseIssueHandler>>,
}

impl DecodeOptions {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> DecodeOptionsBuilder {
        DecodeOptionsBuilder::new()
    }

    /// Logs a recoverable problem and passes it to the issue handler.
    pub(crate) fn report(&self, field: &str, input: &str, description: &str) {
        tracing::debug!(field, input, description, "parse issue");
        if let Some(handler) = &self.issue_handler {
            handler.on_issue(&ParseIssue::new(field, input, description));
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            charsets: CharsetResolver::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            default_file_name: DEFAULT_FILE_NAME.to_string(),
            parse_body: true,
            parameter_precedence: ParameterPrecedence::default(),
            issue_handler: None,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("charsets", &self.charsets)
            .field("max_depth", &self.max_depth)
            .field("default_file_name", &self.default_file_name)
            .field("parse_body", &self.parse_body)
            .field("parameter_precedence", &self.parameter_precedence)
            .field("issue_handler", &self.issue_handler.is_some())
            .finish()
    }
}

/// Builder for decoding options.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptionsBuilder {
    options: DecodeOptions,
}

impl DecodeOptionsBuilder {
    /// Creates a new builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the charset resolver.
    #[must_use]
    pub fn charsets(mut self, charsets: CharsetResolver) -> Self {
        self.options.charsets = charsets;
        self
    }

    /// Sets the multipart nesting limit.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Sets the placeholder file name.
    #[must_use]
    pub fn default_file_name(mut self, name: impl Into<String>) -> Self {
        self.options.default_file_name = name.into();
        self
    }

    /// Sets whether the body is decoded.
    #[must_use]
    pub const fn parse_body(mut self, parse_body: bool) -> Self {
        self.options.parse_body = parse_body;
        self
    }

    /// Sets the parameter precedence policy.
    #[must_use]
    pub const fn parameter_precedence(mut self, precedence: ParameterPrecedence) -> Self {
        self.options.parameter_precedence = precedence;
        self
    }

    /// Sets the issue handler.
    #[must_use]
    pub fn issue_handler<H>(mut self, handler: H) -> Self
    where
        H: ParseIssueHandler + 'static,
    {
        self.options.issue_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> DecodeOptions {
        self.options
    }
}
