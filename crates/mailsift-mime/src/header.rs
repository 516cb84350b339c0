//! Raw header extraction.
//!
//! Splits a message buffer into its header block and body, and unfolds the
//! header block into an ordered list of name/value pairs.

use std::fmt;

use crate::charset::Charset;

/// One raw header field as it appeared in the message, unfolded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderField {
    /// Header name with its original casing.
    pub name: String,
    /// Unfolded, trimmed value. Encoded words are not decoded.
    pub value: String,
}

/// Ordered collection of raw header fields.
///
/// Duplicate names are kept in arrival order. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Gets the last value for a header.
    #[must_use]
    pub fn get_last(&self, name: &str) -> Option<&str> {
        self.get_all(name).last()
    }

    /// Gets all values for a header, in arrival order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |field| field.name.eq_ignore_ascii_case(name))
            .map(|field| field.value.as_str())
    }

    /// Returns true if at least one header has this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns an iterator over all headers in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|field| (field.name.as_str(), field.value.as_str()))
    }

    /// Number of header fields, counting duplicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no header fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses an unfolded header block.
    ///
    /// Parsing stops at the first empty line. A line starting with a space
    /// or tab continues the previous header; the line break is dropped and
    /// the leading whitespace character becomes a single space. Inside an
    /// unfinished encoded word the fold and all its leading whitespace are
    /// dropped instead. Lines with no `:` that are not continuations are
    /// skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    if inside_encoded_word(value) {
                        value.push_str(line.trim_start());
                    } else {
                        value.push(' ');
                        value.push_str(&line[1..]);
                    }
                } else {
                    tracing::trace!(line, "continuation line without a header");
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value.trim());
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    current = Some((name.trim().to_string(), value.trim_start().to_string()));
                }
                _ => tracing::debug!(line, "skipping malformed header line"),
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value.trim());
        }

        headers
    }
}

/// True when the value ends inside an `=?charset?X?...` word that has not
/// been closed with `?=` yet.
fn inside_encoded_word(value: &str) -> bool {
    let Some(start) = value.rfind("=?") else {
        return false;
    };
    let Some((charset, rest)) = value[start + 2..].split_once('?') else {
        return false;
    };
    let Some((encoding, payload)) = rest.split_once('?') else {
        return false;
    };
    !charset.is_empty()
        && !charset.contains(char::is_whitespace)
        && encoding.len() == 1
        && !payload.contains("?=")
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write!(f, "{}: {}\r\n", field.name, field.value)?;
        }
        Ok(())
    }
}

/// Splits a raw message into its headers and body.
///
/// The header block ends at the first empty line; the body starts right
/// after that line's line break. Without an empty line the whole buffer is
/// header and the body is empty. Bare LF line endings are accepted.
///
/// Header bytes are read as UTF-8 when valid and as ISO-8859-1 otherwise.
#[must_use]
pub fn extract(raw: &[u8]) -> (Headers, &[u8]) {
    let (header_bytes, body) = split_at_blank_line(raw);
    let text = match std::str::from_utf8(header_bytes) {
        Ok(text) => text.to_string(),
        Err(_) => Charset::Latin1.decode(header_bytes),
    };
    (Headers::parse(&text), body)
}

fn split_at_blank_line(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut line_start = 0;
    while line_start < raw.len() {
        let line_end = raw[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| line_start + i);
        let line = &raw[line_start..line_end];
        if line.is_empty() || line == b"\r" {
            let body_start = (line_end + 1).min(raw.len());
            return (&raw[..line_start], &raw[body_start..]);
        }
        line_start = line_end + 1;
    }
    (raw, &raw[raw.len()..])
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
        assert!(headers.contains("CONTENT-TYPE"));
        assert!(!headers.contains("Subject"));
    }

    #[test]
    fn test_headers_keep_duplicates_in_order() {
        let mut headers = Headers::new();
        headers.add("Received", "first");
        headers.add("Subject", "s");
        headers.add("received", "second");

        let received: Vec<_> = headers.get_all("Received").collect();
        assert_eq!(received, vec!["first", "second"]);
        assert_eq!(headers.get_last("RECEIVED"), Some("second"));
        assert_eq!(headers.len(), 3);

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Received", "Subject", "received"]);
    }

    #[test]
    fn test_headers_parse_folding() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test\r\n",
            "\tMessage\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_fold_inside_encoded_word() {
        let headers = Headers::parse("Subject: =?utf-8?Q?Br=C3=B8\r\n d?=\r\n");
        assert_eq!(headers.get("Subject"), Some("=?utf-8?Q?Br=C3=B8d?="));

        let headers = Headers::parse("Subject: =?utf-8?B?SGVs\r\n\t  bG8=?= world\r\n");
        assert_eq!(headers.get("Subject"), Some("=?utf-8?B?SGVsbG8=?= world"));
    }

    #[test]
    fn test_headers_parse_fold_after_closed_word() {
        let headers = Headers::parse("Subject: =?utf-8?Q?a?=\r\n =?utf-8?Q?b?=\r\n");
        assert_eq!(headers.get("Subject"), Some("=?utf-8?Q?a?= =?utf-8?Q?b?="));

        let headers = Headers::parse("Subject: what =?\r\n next\r\n");
        assert_eq!(headers.get("Subject"), Some("what =? next"));
    }

    #[test]
    fn test_headers_parse_empty_value() {
        let headers = Headers::parse("X-Empty:\r\nX-Spaces:   \r\n");
        assert_eq!(headers.get("X-Empty"), Some(""));
        assert_eq!(headers.get("X-Spaces"), Some(""));
    }

    #[test]
    fn test_headers_parse_splits_at_first_colon() {
        let headers = Headers::parse("Date: Mon, 1 Jan 2001 10:20:30 +0000\r\n");
        assert_eq!(headers.get("Date"), Some("Mon, 1 Jan 2001 10:20:30 +0000"));
    }

    #[test]
    fn test_headers_parse_skips_garbage_lines() {
        let headers = Headers::parse(" orphan\r\nnot a header\r\nTo: a@b.c\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("To"), Some("a@b.c"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");
        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nTo: recipient@example.com\r\n"
        );
    }

    #[test]
    fn test_extract_splits_header_and_body() {
        let raw = b"Subject: Hi\r\nTo: a@b.c\r\n\r\nBody line\r\n";
        let (headers, body) = extract(raw);
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.get("To"), Some("a@b.c"));
        assert_eq!(body, b"Body line\r\n");
    }

    #[test]
    fn test_extract_without_blank_line_is_all_header() {
        let (headers, body) = extract(b"Subject: Hi\r\nTo: a@b.c");
        assert_eq!(headers.len(), 2);
        assert!(body.is_empty());
    }

    #[test]
    fn test_extract_leading_blank_line_means_no_headers() {
        let (headers, body) = extract(b"\r\nThis is implicitly typed plain US-ASCII text.");
        assert!(headers.is_empty());
        assert_eq!(body, b"This is implicitly typed plain US-ASCII text.");
    }

    #[test]
    fn test_extract_body_keeps_leading_line_break() {
        let (_, body) = extract(b"A: b\r\n\r\n\r\nHello");
        assert_eq!(body, b"\r\nHello");
    }

    #[test]
    fn test_extract_bare_lf() {
        let (headers, body) = extract(b"Subject: Hi\n continued\n\nBody");
        assert_eq!(headers.get("Subject"), Some("Hi continued"));
        assert_eq!(body, b"Body");
    }

    #[test]
    fn test_extract_latin1_header_bytes() {
        let (headers, _) = extract(b"Subject: Bl\xE5b\xE6r\r\n\r\n");
        assert_eq!(headers.get("Subject"), Some("Blåbær"));
    }

    #[test]
    fn test_extract_blank_line_at_end() {
        let (headers, body) = extract(b"Subject: Hi\r\n\r\n");
        assert_eq!(headers.len(), 1);
        assert!(body.is_empty());
    }
}
