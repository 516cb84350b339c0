//! Whole-message decoding, search and persistence.

use std::io::{Read, Write};

use crate::config::DecodeOptions;
use crate::error::{Error, Result};
use crate::header;
use crate::message_header::MessageHeader;
use crate::part::MessagePart;

/// A decoded email message.
///
/// The raw bytes are kept untouched, so [`Message::save`] always reproduces
/// the input exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Message {
    /// Top-level headers. Equal to the root part's header.
    pub header: MessageHeader,
    /// Body tree. `None` when decoded with `parse_body` disabled.
    pub root_part: Option<MessagePart>,
    #[cfg_attr(feature = "serde", serde(skip))]
    raw: Vec<u8>,
}

impl Message {
    /// Decodes a message with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyMessage`] if `raw` is empty.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Result<Self> {
        Self::parse_with(raw, &DecodeOptions::default())
    }

    /// Decodes a message.
    ///
    /// Malformed fields and parts never fail the decode; they are defaulted
    /// and reported to the options' issue handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyMessage`] if `raw` is empty.
    pub fn parse_with(raw: impl Into<Vec<u8>>, options: &DecodeOptions) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let (headers, body) = header::extract(&raw);
        let header = MessageHeader::from_headers_with(&headers, options);
        let root_part = options
            .parse_body
            .then(|| MessagePart::build(header.clone(), body, options, 0));

        tracing::trace!(
            size = raw.len(),
            parts = root_part.as_ref().map_or(0, |p| p.walk().count()),
            "decoded message"
        );

        Ok(Self {
            header,
            root_part,
            raw,
        })
    }

    /// Decodes only the header block of a message with default options.
    #[must_use]
    pub fn parse_headers(raw: &[u8]) -> MessageHeader {
        Self::parse_headers_with(raw, &DecodeOptions::default())
    }

    /// Decodes only the header block of a message. The body is not split or
    /// decoded.
    #[must_use]
    pub fn parse_headers_with(raw: &[u8], options: &DecodeOptions) -> MessageHeader {
        let (headers, _) = header::extract(raw);
        MessageHeader::from_headers_with(&headers, options)
    }

    /// Reads a message from `reader` and decodes it.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or nothing was read.
    pub fn load(mut reader: impl Read, options: &DecodeOptions) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Self::parse_with(raw, options)
    }

    /// Writes the original bytes to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn save(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.raw)?;
        writer.flush()?;
        Ok(())
    }

    /// The bytes this message was decoded from.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Iterates over every part in pre-order.
    pub fn parts(&self) -> impl Iterator<Item = &MessagePart> {
        self.root_part.iter().flat_map(MessagePart::walk)
    }

    /// Finds the first part with the given media type, case-insensitively.
    #[must_use]
    pub fn find_first_part_with_media_type(&self, media_type: &str) -> Option<&MessagePart> {
        self.parts()
            .find(|part| part.header.content_type.media_type.eq_ignore_ascii_case(media_type))
    }

    /// Finds every part with the given media type, case-insensitively.
    #[must_use]
    pub fn find_all_parts_with_media_type(&self, media_type: &str) -> Vec<&MessagePart> {
        self.parts()
            .filter(|part| part.header.content_type.media_type.eq_ignore_ascii_case(media_type))
            .collect()
    }

    /// Finds the first `text/plain` part.
    #[must_use]
    pub fn find_first_plain_text_version(&self) -> Option<&MessagePart> {
        self.find_first_part_with_media_type("text/plain")
    }

    /// Finds the first `text/html` part.
    #[must_use]
    pub fn find_first_html_version(&self) -> Option<&MessagePart> {
        self.find_first_part_with_media_type("text/html")
    }

    /// Finds every text part, attachments included.
    #[must_use]
    pub fn find_all_text_versions(&self) -> Vec<&MessagePart> {
        self.parts().filter(|part| part.is_text()).collect()
    }

    /// Finds every attachment.
    #[must_use]
    pub fn find_all_attachments(&self) -> Vec<&MessagePart> {
        self.parts().filter(|part| part.is_attachment()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use crate::charset::{Charset, CharsetResolver};
    use crate::error::ParseIssue;
    use std::sync::{Arc, Mutex};

    const ALTERNATIVE: &str = concat!(
        "From: Alice <alice@example.com>\r\n",
        "To: bob@example.com\r\n",
        "Subject: Hello\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"mixed\"\r\n",
        "\r\n",
        "--mixed\r\n",
        "Content-Type: multipart/alternative; boundary=\"alt\"\r\n",
        "\r\n",
        "--alt\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Hi Bob\r\n",
        "--alt\r\n",
        "Content-Type: TEXT/HTML; charset=utf-8\r\n",
        "\r\n",
        "<p>Hi Bob</p>\r\n",
        "--alt--\r\n",
        "--mixed\r\n",
        "Content-Type: text/plain; name=\"notes.txt\"\r\n",
        "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
        "\r\n",
        "notes\r\n",
        "--mixed\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERg==\r\n",
        "--mixed--\r\n"
    );

    #[test]
    fn test_empty_message_is_error() {
        assert!(matches!(Message::parse(Vec::new()), Err(Error::EmptyMessage)));
    }

    #[test]
    fn test_single_part() {
        let message = Message::parse("Subject: Test\r\n\r\nHello, World!").unwrap();
        assert_eq!(message.header.subject.as_deref(), Some("Test"));
        let root = message.root_part.as_ref().unwrap();
        assert_eq!(root.body_text().as_deref(), Some("Hello, World!"));
        assert_eq!(root.header, message.header);
    }

    #[test]
    fn test_find_versions() {
        let message = Message::parse(ALTERNATIVE).unwrap();

        let plain = message.find_first_plain_text_version().unwrap();
        assert_eq!(plain.body_text().as_deref(), Some("Hi Bob"));

        let html = message.find_first_html_version().unwrap();
        assert_eq!(html.body_text().as_deref(), Some("<p>Hi Bob</p>"));

        assert_eq!(message.find_all_parts_with_media_type("text/plain").len(), 2);
        assert_eq!(message.find_all_text_versions().len(), 3);
        assert!(message.find_first_part_with_media_type("image/png").is_none());
    }

    #[test]
    fn test_find_attachments() {
        let message = Message::parse(ALTERNATIVE).unwrap();
        let attachments = message.find_all_attachments();
        let names: Vec<_> = attachments.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, vec!["notes.txt", "(no name)"]);
        assert_eq!(attachments[1].body(), Some(&b"%PDF"[..]));
    }

    #[test]
    fn test_parts_pre_order() {
        let message = Message::parse(ALTERNATIVE).unwrap();
        let types: Vec<_> = message
            .parts()
            .map(|p| p.header.content_type.media_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "text/plain",
                "application/pdf"
            ]
        );
    }

    #[test]
    fn test_headers_only() {
        let options = DecodeOptions::builder().parse_body(false).build();
        let message = Message::parse_with(ALTERNATIVE, &options).unwrap();
        assert!(message.root_part.is_none());
        assert_eq!(message.parts().count(), 0);
        assert_eq!(message.header.to[0].address, "bob@example.com");

        let header = Message::parse_headers(ALTERNATIVE.as_bytes());
        assert_eq!(header, message.header);
    }

    #[test]
    fn test_headers_only_with_options() {
        let issues = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&issues);
        let options = DecodeOptions::builder()
            .charsets(CharsetResolver::new().with_mapping("x-mac-danish", Charset::Latin1))
            .issue_handler(move |issue: &ParseIssue| sink.lock().unwrap().push(issue.clone()))
            .build();

        let raw = b"Subject: =?x-mac-danish?Q?R=E6kke?=\r\nDate: someday\r\n\r\nbody";
        let header = Message::parse_headers_with(raw, &options);
        assert_eq!(header.subject.as_deref(), Some("R\u{e6}kke"));
        assert_eq!(issues.lock().unwrap().len(), 1);
        assert_eq!(issues.lock().unwrap()[0].field, "Date");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let message = Message::parse(ALTERNATIVE).unwrap();
        let mut saved = Vec::new();
        message.save(&mut saved).unwrap();
        assert_eq!(saved, ALTERNATIVE.as_bytes());
        assert_eq!(message.raw(), ALTERNATIVE.as_bytes());

        let loaded = Message::load(saved.as_slice(), &DecodeOptions::default()).unwrap();
        assert_eq!(loaded, message);
    }

    #[test]
    fn test_load_empty_reader() {
        let result = Message::load(&b""[..], &DecodeOptions::default());
        assert!(matches!(result, Err(Error::EmptyMessage)));
    }
}
