//! RFC 2047 encoded-word decoding.
//!
//! Format: `=?charset?encoding?encoded-text?=` where encoding is `B`
//! (Base64) or `Q` (quoted-printable with `_` as space).

use crate::charset::CharsetResolver;
use crate::encoding::{decode_base64_checked, decode_q};

/// Decodes every encoded word in a header value using the built-in charsets.
///
/// Text outside encoded words is left untouched.
#[must_use]
pub fn decode(text: &str) -> String {
    decode_with(text, &CharsetResolver::default())
}

/// Decodes every encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped (RFC 2047
/// section 6.2). A token that looks like an encoded word but cannot be
/// decoded is kept verbatim.
#[must_use]
pub fn decode_with(text: &str, charsets: &CharsetResolver) -> String {
    if !text.contains("=?") {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut previous_was_word = false;
    let last_close = text.rfind("?=");

    while let Some(start) = rest.find("=?") {
        // Nothing after this opener can close a word.
        let offset = text.len() - rest.len() + start;
        if last_close.is_none_or(|close| close < offset + 2) {
            break;
        }

        let (before, candidate) = rest.split_at(start);

        match EncodedWord::scan(candidate) {
            Some((word, consumed)) => {
                let between_words =
                    previous_was_word && before.chars().all(char::is_whitespace);

                match word.decode(charsets) {
                    Some(decoded) => {
                        if !between_words {
                            result.push_str(before);
                        }
                        result.push_str(&decoded);
                        previous_was_word = true;
                    }
                    None => {
                        tracing::debug!(word = &candidate[..consumed], "undecodable encoded word");
                        result.push_str(before);
                        result.push_str(&candidate[..consumed]);
                        previous_was_word = false;
                    }
                }
                rest = &candidate[consumed..];
            }
            None => {
                result.push_str(before);
                result.push_str("=?");
                rest = &candidate[2..];
                previous_was_word = false;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Returns true if the text contains at least one well-formed encoded word.
#[must_use]
pub fn contains_encoded_word(text: &str) -> bool {
    text.match_indices("=?")
        .any(|(i, _)| EncodedWord::scan(&text[i..]).is_some())
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: char,
    content: &'a str,
}

impl<'a> EncodedWord<'a> {
    /// Recognises an encoded word at the start of `input`, returning it and
    /// the number of bytes it spans.
    fn scan(input: &'a str) -> Option<(Self, usize)> {
        let body = input.strip_prefix("=?")?;

        let charset_end = body.find('?')?;
        let charset = &body[..charset_end];
        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }

        let after_charset = &body[charset_end + 1..];
        let mut chars = after_charset.chars();
        let encoding = chars.next().filter(|c| c.is_alphanumeric() || *c == '_')?;
        let after_encoding = &after_charset[encoding.len_utf8()..];
        let payload = after_encoding.strip_prefix('?')?;

        // Payload is at least one character and never spans a line break.
        let line = &payload[..payload.find(['\r', '\n']).unwrap_or(payload.len())];
        let first_len = line.chars().next()?.len_utf8();
        let end = line[first_len..].find("?=")? + first_len;
        let content = &payload[..end];

        let consumed = 2 + charset_end + 1 + encoding.len_utf8() + 1 + end + 2;
        Some((
            Self {
                charset,
                encoding,
                content,
            },
            consumed,
        ))
    }

    fn decode(&self, charsets: &CharsetResolver) -> Option<String> {
        let bytes = match self.encoding.to_ascii_uppercase() {
            'B' => decode_base64_checked(self.content.as_bytes())?,
            'Q' => decode_q(self.content.as_bytes()),
            _ => return None,
        };
        Some(charsets.resolve(Some(self.charset)).decode(&bytes))
    }
}
