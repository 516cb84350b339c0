//! MIME content type handling.

use std::fmt;

use crate::config::DecodeOptions;
use crate::params::{self, Parameters};

const DEFAULT_MEDIA_TYPE: &str = "text/plain";
const DEFAULT_CHARSET: &str = "us-ascii";

/// Parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContentType {
    /// Lowercase `type/subtype`, e.g. `text/html`.
    pub media_type: String,
    /// Decoded parameters (e.g. charset=utf-8, boundary=xxx).
    pub parameters: Parameters,
}

impl ContentType {
    /// Creates a content type without parameters.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            parameters: Parameters::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Parses a content type string with default options.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self::parse_with(s, &DecodeOptions::default())
    }

    /// Parses a content type string.
    ///
    /// Never fails: a missing or malformed media type becomes `text/plain`,
    /// and a defaulted type without a charset gets `charset=us-ascii`
    /// (RFC 2045 section 5.2).
    #[must_use]
    pub fn parse_with(s: &str, options: &DecodeOptions) -> Self {
        let (primary, parameters) =
            params::parse(s, &options.charsets, options.parameter_precedence);

        let mut content_type = Self {
            media_type: primary.to_ascii_lowercase(),
            parameters,
        };

        if !is_valid_media_type(&content_type.media_type) {
            if !content_type.media_type.is_empty() {
                options.report("Content-Type", s, "malformed media type, using text/plain");
            }
            content_type.media_type = DEFAULT_MEDIA_TYPE.to_string();
            content_type
                .parameters
                .entry("charset".to_string())
                .or_insert_with(|| DEFAULT_CHARSET.to_string());
        }

        content_type
    }

    /// Main type, e.g. `text`.
    #[must_use]
    pub fn main_type(&self) -> &str {
        self.media_type
            .split_once('/')
            .map_or(self.media_type.as_str(), |(main, _)| main)
    }

    /// Subtype, e.g. `plain`.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        self.media_type
            .split_once('/')
            .map_or("", |(_, sub)| sub)
    }

    /// Returns a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns the name parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    /// Checks if this is text: any `text/*` type, or `message/rfc822`.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.media_type.starts_with("text/") || self.media_type == "message/rfc822"
    }
}

impl Default for ContentType {
    /// `text/plain; charset=us-ascii`
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_TYPE).with_parameter("charset", DEFAULT_CHARSET)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        for (key, value) in &self.parameters {
            if value.is_empty() || value.contains(|c: char| " ;\"=()<>@,:\\/[]?".contains(c)) {
                write!(f, "; {key}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }
        Ok(())
    }
}

fn is_valid_media_type(media_type: &str) -> bool {
    media_type.split_once('/').is_some_and(|(main, sub)| {
        let token = |s: &str| !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '/');
        token(main) && token(sub)
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect
)]
mod tests {
    use super::*;
    use crate::error::ParseIssue;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_content_type() {
        let ct = ContentType::parse("text/plain; charset=utf-8");
        assert_eq!(ct.media_type, "text/plain");
        assert_eq!(ct.main_type(), "text");
        assert_eq!(ct.sub_type(), "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_parse_lowercases_media_type() {
        let ct = ContentType::parse("Multipart/Mixed; BOUNDARY=\"AbC\"");
        assert_eq!(ct.media_type, "multipart/mixed");
        assert_eq!(ct.boundary(), Some("AbC"));
        assert!(ct.is_multipart());
    }

    #[test]
    fn test_parse_with_quoted_params() {
        let ct = ContentType::parse(r#"multipart/mixed; boundary="----=_Part_123""#);
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_name_parameter() {
        let ct = ContentType::parse("application/pdf; name=\"report.pdf\"");
        assert_eq!(ct.name(), Some("report.pdf"));
        assert_eq!(ct.parameter("NAME"), Some("report.pdf"));
    }

    #[test]
    fn test_missing_subtype_defaults() {
        let ct = ContentType::parse("text");
        assert_eq!(ct.media_type, "text/plain");
        assert_eq!(ct.charset(), Some("us-ascii"));

        let ct = ContentType::parse("");
        assert_eq!(ct, ContentType::default());
    }

    #[test]
    fn test_defaulted_type_keeps_given_charset() {
        let ct = ContentType::parse("text/; charset=utf-8");
        assert_eq!(ct.media_type, "text/plain");
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_malformed_type_reported() {
        let issues = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&issues);
        let options = DecodeOptions::builder()
            .issue_handler(move |issue: &ParseIssue| sink.lock().unwrap().push(issue.clone()))
            .build();

        let ct = ContentType::parse_with("garbage", &options);
        assert_eq!(ct.media_type, "text/plain");
        assert_eq!(issues.lock().unwrap()[0].field, "Content-Type");
    }

    #[test]
    fn test_is_text() {
        assert!(ContentType::new("text/html").is_text());
        assert!(ContentType::new("message/rfc822").is_text());
        assert!(!ContentType::new("message/delivery-status").is_text());
        assert!(!ContentType::new("application/pdf").is_text());
    }

    #[test]
    fn test_default() {
        let ct = ContentType::default();
        assert_eq!(ct.media_type, "text/plain");
        assert_eq!(ct.charset(), Some("us-ascii"));
        assert!(!ct.is_multipart());
    }

    #[test]
    fn test_display() {
        let ct = ContentType::new("multipart/mixed").with_parameter("boundary", "a b");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");

        let ct = ContentType::new("text/plain").with_parameter("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }
}
