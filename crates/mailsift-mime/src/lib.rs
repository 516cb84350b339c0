//! # mailsift-mime
//!
//! Lenient MIME message decoding for email.
//!
//! ## Features
//!
//! - **Message decoding**: Turn raw RFC 822 bytes into a tree of decoded parts
//! - **Headers**: Addresses, dates, `Received` traces, RFC 2047 encoded words
//! - **Parameters**: RFC 2231 charset tagging and continuations
//! - **Transfer encodings**: Base64 and Quoted-Printable, tolerant of bad input
//! - **Charsets**: Legacy aliases and Windows code pages via `encoding_rs`
//!
//! Malformed input never aborts a decode. A bad field is defaulted and
//! handed to the optional [`ParseIssueHandler`] in [`DecodeOptions`]; the
//! rest of the message is still decoded.
//!
//! ## Quick Start
//!
//! ### Decoding a message
//!
//! ```ignore
//! use mailsift_mime::Message;
//!
//! let raw = std::fs::read("message.eml")?;
//! let message = Message::parse(raw)?;
//!
//! println!("Subject: {}", message.header.subject.as_deref().unwrap_or("(no subject)"));
//! if let Some(plain) = message.find_first_plain_text_version() {
//!     println!("{}", plain.body_text().unwrap_or_default());
//! }
//! for attachment in message.find_all_attachments() {
//!     println!("attachment: {}", attachment.file_name);
//! }
//! ```
//!
//! ### Custom options
//!
//! ```ignore
//! use mailsift_mime::{Charset, CharsetResolver, DecodeOptions, Message, ParseIssue};
//!
//! let options = DecodeOptions::builder()
//!     .charsets(CharsetResolver::new().with_mapping("x-user-defined", Charset::Latin1))
//!     .max_depth(16)
//!     .issue_handler(|issue: &ParseIssue| eprintln!("{issue}"))
//!     .build();
//!
//! let message = Message::parse_with(raw, &options)?;
//! ```
//!
//! ### Header values
//!
//! ```ignore
//! use mailsift_mime::{encoded_word, ContentType, MailAddress};
//!
//! let subject = encoded_word::decode("=?ISO-8859-1?Q?Br=F8drene?=");
//! let ct = ContentType::parse("text/plain; charset=\"utf-8\"");
//! let from = MailAddress::parse("\"Alice\" <alice@example.com>");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod charset;
mod config;
mod content_type;
mod disposition;
mod error;
mod header;
mod message;
mod message_header;
mod multipart;
mod params;
mod part;
mod received;

pub mod date;
pub mod encoded_word;
pub mod encoding;

pub use address::MailAddress;
pub use charset::{Charset, CharsetResolver};
pub use config::{DEFAULT_FILE_NAME, DEFAULT_MAX_DEPTH, DecodeOptions, DecodeOptionsBuilder};
pub use content_type::ContentType;
pub use disposition::ContentDisposition;
pub use encoding::TransferEncoding;
pub use error::{Error, ParseIssue, ParseIssueHandler, Result};
pub use header::{HeaderField, Headers};
pub use message::Message;
pub use message_header::{Importance, MessageHeader};
pub use params::{ParameterPrecedence, Parameters};
pub use part::{MessagePart, PartContent, Walk};
pub use received::Received;
