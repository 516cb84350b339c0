//! Decoded MIME part tree.

use std::io::Write;

use crate::charset::Charset;
use crate::config::DecodeOptions;
use crate::error::Result;
use crate::header;
use crate::message_header::MessageHeader;
use crate::multipart;

/// What a part holds: decoded bytes or child parts, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PartContent {
    /// Body of a non-multipart part, transfer decoding applied.
    Leaf(Vec<u8>),
    /// Children of a `multipart/*` part in their original order.
    Multipart(Vec<MessagePart>),
}

/// One node of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MessagePart {
    /// Headers of this part.
    pub header: MessageHeader,
    /// Disposition `filename`, else Content-Type `name`, else the configured
    /// placeholder.
    pub file_name: String,
    /// Charset used to turn the body into text.
    pub body_encoding: Charset,
    /// Body or children.
    pub content: PartContent,
}

impl MessagePart {
    /// Decodes a part (headers and body) from raw bytes with default
    /// options.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_with(raw, &DecodeOptions::default())
    }

    /// Decodes a part (headers and body) from raw bytes.
    #[must_use]
    pub fn parse_with(raw: &[u8], options: &DecodeOptions) -> Self {
        let (headers, body) = header::extract(raw);
        let header = MessageHeader::from_headers_with(&headers, options);
        Self::build(header, body, options, 0)
    }

    pub(crate) fn build(
        header: MessageHeader,
        body: &[u8],
        options: &DecodeOptions,
        depth: usize,
    ) -> Self {
        let file_name = header
            .content_disposition
            .as_ref()
            .and_then(|cd| cd.file_name.clone())
            .or_else(|| header.content_type.name().map(str::to_string))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| options.default_file_name.clone());

        let body_encoding = options.charsets.resolve(header.content_type.charset());

        let content = if header.content_type.is_multipart() {
            PartContent::Multipart(Self::split_children(&header, body, options, depth))
        } else {
            PartContent::Leaf(header.content_transfer_encoding.decode(body))
        };

        Self {
            header,
            file_name,
            body_encoding,
            content,
        }
    }

    fn split_children(
        header: &MessageHeader,
        body: &[u8],
        options: &DecodeOptions,
        depth: usize,
    ) -> Vec<Self> {
        let media_type = header.content_type.media_type.as_str();
        if depth >= options.max_depth {
            tracing::warn!(depth, media_type, "multipart nesting limit reached");
            options.report("Content-Type", media_type, "multipart nesting limit reached");
            return Vec::new();
        }

        let Some(boundary) = header.content_type.boundary().filter(|b| !b.is_empty()) else {
            options.report("Content-Type", media_type, "multipart without boundary");
            return Vec::new();
        };

        multipart::split(body, boundary)
            .into_iter()
            .map(|raw| {
                let (headers, body) = header::extract(raw);
                let header = MessageHeader::from_headers_with(&headers, options);
                Self::build(header, body, options, depth + 1)
            })
            .collect()
    }

    /// Returns true for `multipart/*` parts.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.header.content_type.is_multipart()
    }

    /// Returns true for `text/*` and `message/rfc822` parts.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.header.content_type.is_text()
    }

    /// Returns true for parts that are neither text nor multipart, and for
    /// any part with a non-inline Content-Disposition.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        let non_inline = self
            .header
            .content_disposition
            .as_ref()
            .is_some_and(|cd| !cd.is_inline());
        (!self.is_text() && !self.is_multipart()) || non_inline
    }

    /// Returns the decoded body of a leaf part.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        match &self.content {
            PartContent::Leaf(body) => Some(body),
            PartContent::Multipart(_) => None,
        }
    }

    /// Returns the children of a multipart part.
    #[must_use]
    pub fn children(&self) -> Option<&[Self]> {
        match &self.content {
            PartContent::Leaf(_) => None,
            PartContent::Multipart(children) => Some(children),
        }
    }

    /// Returns the body as text using [`MessagePart::body_encoding`].
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.body().map(|body| self.body_encoding.decode(body))
    }

    /// Iterates over this part and all its descendants in pre-order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Writes the decoded body. Multipart parts write nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn save(&self, mut writer: impl Write) -> Result<()> {
        if let Some(body) = self.body() {
            writer.write_all(body)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Pre-order iterator over a part tree. See [`MessagePart::walk`].
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<&'a MessagePart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MessagePart;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        if let Some(children) = part.children() {
            self.stack.extend(children.iter().rev());
        }
        Some(part)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use crate::encoding::TransferEncoding;
    use crate::error::ParseIssue;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_plain_leaf() {
        let part = MessagePart::parse(b"Content-Type: text/plain; charset=utf-8\r\n\r\nHej med dig \xc3\xb8");
        assert!(part.is_text());
        assert!(!part.is_multipart());
        assert!(!part.is_attachment());
        assert_eq!(part.body_text().as_deref(), Some("Hej med dig ø"));
        assert_eq!(part.file_name, "(no name)");
        assert!(part.children().is_none());
    }

    #[test]
    fn test_default_content_type_is_ascii_text() {
        let part = MessagePart::parse(b"Subject: x\r\n\r\nhello");
        assert_eq!(part.header.content_type.media_type, "text/plain");
        assert_eq!(part.body_encoding, Charset::Ascii);
        assert_eq!(part.body(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_base64_body_decoded() {
        let part = MessagePart::parse(b"Content-Transfer-Encoding: base64\r\n\r\nVGVz\r\ndA==\r\n");
        assert_eq!(part.header.content_transfer_encoding, TransferEncoding::Base64);
        assert_eq!(part.body(), Some(&b"Test"[..]));
    }

    #[test]
    fn test_latin1_quoted_printable_text() {
        let part = MessagePart::parse(
            b"Content-Type: text/plain; charset=iso-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nBr=F8drene=\r\n er her",
        );
        assert_eq!(part.body_text().as_deref(), Some("Brødrene er her"));
    }

    #[test]
    fn test_file_name_sources() {
        let part = MessagePart::parse(
            b"Content-Type: application/pdf; name=\"type.pdf\"\r\nContent-Disposition: attachment; filename=\"disp.pdf\"\r\n\r\n",
        );
        assert_eq!(part.file_name, "disp.pdf");
        assert!(part.is_attachment());

        let part = MessagePart::parse(b"Content-Type: application/pdf; name=\"type.pdf\"\r\n\r\n");
        assert_eq!(part.file_name, "type.pdf");

        let options = DecodeOptions::builder().default_file_name("unnamed").build();
        let part = MessagePart::parse_with(b"Content-Type: image/png\r\n\r\n", &options);
        assert_eq!(part.file_name, "unnamed");
    }

    #[test]
    fn test_text_with_attachment_disposition_is_attachment() {
        let part = MessagePart::parse(b"Content-Type: text/plain\r\nContent-Disposition: attachment\r\n\r\nx");
        assert!(part.is_text());
        assert!(part.is_attachment());
    }

    #[test]
    fn test_nested_multipart_walk_order() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: image/png\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "iVBORw==\r\n",
            "--outer--\r\n"
        );
        let part = MessagePart::parse(raw.as_bytes());
        assert!(part.body().is_none());
        assert_eq!(part.children().unwrap().len(), 2);

        let types: Vec<_> = part
            .walk()
            .map(|p| p.header.content_type.media_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["multipart/mixed", "multipart/alternative", "text/plain", "text/html", "image/png"]
        );

        let image = part.walk().last().unwrap();
        assert_eq!(image.body(), Some(&[0x89, b'P', b'N', b'G'][..]));
    }

    #[test]
    fn test_multipart_without_boundary_reports() {
        let issues = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&issues);
        let options = DecodeOptions::builder()
            .issue_handler(move |issue: &ParseIssue| {
                sink.lock().unwrap().push(issue.description.clone());
            })
            .build();

        let part = MessagePart::parse_with(b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--", &options);
        assert_eq!(part.children(), Some(&[][..]));
        assert_eq!(*issues.lock().unwrap(), vec!["multipart without boundary"]);
    }

    #[test]
    fn test_nesting_limit() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=a\r\n\r\n",
            "--a\r\n",
            "Content-Type: multipart/mixed; boundary=b\r\n\r\n",
            "--b\r\n",
            "\r\n",
            "deep\r\n",
            "--b--\r\n",
            "--a--\r\n"
        );
        let options = DecodeOptions::builder().max_depth(1).build();
        let part = MessagePart::parse_with(raw.as_bytes(), &options);

        let child = &part.children().unwrap()[0];
        assert!(child.is_multipart());
        assert_eq!(child.children().unwrap().len(), 0);

        let unlimited = MessagePart::parse(raw.as_bytes());
        let child = &unlimited.children().unwrap()[0];
        assert_eq!(child.children().unwrap()[0].body(), Some(&b"deep"[..]));
    }

    #[test]
    fn test_save_writes_decoded_body() {
        let part = MessagePart::parse(b"Content-Transfer-Encoding: base64\r\n\r\naGVsbG8=");
        let mut out = Vec::new();
        part.save(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }
}
