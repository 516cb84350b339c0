//! Structured view of a message or part header block.

use chrono::{DateTime, Utc};

use crate::address::MailAddress;
use crate::config::DecodeOptions;
use crate::content_type::ContentType;
use crate::date;
use crate::disposition::ContentDisposition;
use crate::encoded_word;
use crate::encoding::TransferEncoding;
use crate::header::Headers;
use crate::received::Received;

/// Message importance from the `Importance` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Importance {
    /// `low` or `5`.
    Low,
    /// `normal`, `3`, or no header.
    #[default]
    Normal,
    /// `high` or `1`.
    High,
}

impl Importance {
    /// Parses an Importance value. Unknown values are `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "5" => Some(Self::Low),
            "normal" | "3" => Some(Self::Normal),
            "high" | "1" => Some(Self::High),
            _ => None,
        }
    }
}

/// Every header field of one message or part, decoded.
///
/// Fields that occur once by RFC take their first occurrence. Address lists,
/// `Keywords` and `Received` collect every occurrence. Headers with no field
/// here land in [`MessageHeader::unknown_headers`] unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MessageHeader {
    /// `Content-Type`, defaulted to `text/plain; charset=us-ascii`.
    pub content_type: ContentType,
    /// `Content-Transfer-Encoding`, defaulted to 7bit.
    pub content_transfer_encoding: TransferEncoding,
    /// `Content-Disposition`.
    pub content_disposition: Option<ContentDisposition>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Decoded `Content-Description`.
    pub content_description: Option<String>,
    /// Decoded `Subject`, or `Thread-Topic` when there is no subject.
    pub subject: Option<String>,
    /// `From`.
    pub from: Option<MailAddress>,
    /// `Sender`.
    pub sender: Option<MailAddress>,
    /// `Reply-To`.
    pub reply_to: Option<MailAddress>,
    /// `Return-Path`.
    pub return_path: Option<MailAddress>,
    /// `To`.
    pub to: Vec<MailAddress>,
    /// `Cc`.
    pub cc: Vec<MailAddress>,
    /// `Bcc`.
    pub bcc: Vec<MailAddress>,
    /// `Disposition-Notification-To`.
    pub disposition_notification_to: Vec<MailAddress>,
    /// Message ids from `In-Reply-To`, without angle brackets.
    pub in_reply_to: Vec<String>,
    /// Message ids from `References`, without angle brackets.
    pub references: Vec<String>,
    /// `Keywords`, unquoted.
    pub keywords: Vec<String>,
    /// `Date` exactly as written.
    pub date: Option<String>,
    /// `Date` parsed to UTC.
    pub date_sent: Option<DateTime<Utc>>,
    /// `Message-ID` without angle brackets.
    pub message_id: Option<String>,
    /// `MIME-Version`.
    pub mime_version: Option<String>,
    /// `Importance`.
    pub importance: Importance,
    /// `Received` trace records, topmost first.
    pub received: Vec<Received>,
    /// Every header not modelled above, in order.
    pub unknown_headers: Headers,
}

impl MessageHeader {
    /// Builds the structured header with default options.
    #[must_use]
    pub fn from_headers(headers: &Headers) -> Self {
        Self::from_headers_with(headers, &DecodeOptions::default())
    }

    /// Builds the structured header from raw fields.
    #[must_use]
    pub fn from_headers_with(headers: &Headers, options: &DecodeOptions) -> Self {
        let mut header = Self::default();
        let mut thread_topic = None;
        let mut content_type = None;
        let mut transfer_encoding = None;

        for (name, value) in headers.iter() {
            match name.to_ascii_lowercase().as_str() {
                "to" => header.to.extend(MailAddress::parse_list_with(value, options)),
                "cc" => header.cc.extend(MailAddress::parse_list_with(value, options)),
                "bcc" => header.bcc.extend(MailAddress::parse_list_with(value, options)),
                "disposition-notification-to" => header
                    .disposition_notification_to
                    .extend(MailAddress::parse_list_with(value, options)),
                "from" => set_once(&mut header.from, || MailAddress::parse_with(value, options)),
                "sender" => set_once(&mut header.sender, || MailAddress::parse_with(value, options)),
                "reply-to" => {
                    set_once(&mut header.reply_to, || MailAddress::parse_with(value, options));
                }
                "return-path" => {
                    set_once(&mut header.return_path, || MailAddress::parse_with(value, options));
                }
                "subject" => set_once(&mut header.subject, || {
                    encoded_word::decode_with(value, &options.charsets)
                }),
                "thread-topic" => set_once(&mut thread_topic, || {
                    encoded_word::decode_with(value, &options.charsets)
                }),
                "keywords" => header.keywords.extend(
                    value
                        .split(',')
                        .map(|k| k.trim().trim_matches('"').trim().to_string())
                        .filter(|k| !k.is_empty()),
                ),
                "received" => header.received.push(Received::parse_with(value, options)),
                "importance" => match Importance::parse(value) {
                    Some(importance) => header.importance = importance,
                    None => options.report(name, value, "unknown importance, using normal"),
                },
                "in-reply-to" => header.in_reply_to.extend(message_ids(value)),
                "references" => header.references.extend(message_ids(value)),
                "mime-version" => set_once(&mut header.mime_version, || value.trim().to_string()),
                "message-id" => set_once(&mut header.message_id, || strip_angles(value)),
                "date" => {
                    if header.date.is_none() {
                        header.date = Some(value.trim().to_string());
                        header.date_sent = date::parse(value);
                        if header.date_sent.is_none() {
                            options.report(name, value, "unparsable date");
                        }
                    }
                }
                "content-transfer-encoding" => set_once(&mut transfer_encoding, || {
                    if !TransferEncoding::is_known(value) {
                        options.report(name, value, "unknown transfer encoding, using 7bit");
                    }
                    TransferEncoding::parse(value)
                }),
                "content-description" => set_once(&mut header.content_description, || {
                    encoded_word::decode_with(value.trim(), &options.charsets)
                }),
                "content-type" => {
                    set_once(&mut content_type, || ContentType::parse_with(value, options));
                }
                "content-disposition" => set_once(&mut header.content_disposition, || {
                    ContentDisposition::parse_with(value, options)
                }),
                "content-id" => set_once(&mut header.content_id, || strip_angles(value)),
                _ => header.unknown_headers.add(name, value),
            }
        }

        if header.subject.is_none() {
            header.subject = thread_topic;
        }
        if let Some(content_type) = content_type {
            header.content_type = content_type;
        }
        header.content_transfer_encoding = transfer_encoding.unwrap_or_default();
        header
    }
}

fn set_once<T>(slot: &mut Option<T>, make: impl FnOnce() -> T) {
    if slot.is_none() {
        *slot = Some(make());
    }
}

fn strip_angles(value: &str) -> String {
    let value = value.trim();
    let value = value.strip_prefix('<').unwrap_or(value);
    let value = value.strip_suffix('>').unwrap_or(value);
    value.trim().to_string()
}

/// Extracts `<id>` tokens, or whitespace separated tokens if there are no
/// angle brackets at all.
fn message_ids(value: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let id = rest[open + 1..open + close].trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
        rest = &rest[open + close + 1..];
    }

    if ids.is_empty() && !value.contains('<') {
        ids.extend(value.split_whitespace().map(str::to_string));
    }
    ids
}
