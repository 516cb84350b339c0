//! Mail address parsing for From, To, Cc and friends.

use std::fmt;

use crate::config::DecodeOptions;
use crate::encoded_word;

/// A mailbox from an address header.
///
/// Parsing never fails. Text that holds no usable address is kept with
/// [`MailAddress::is_valid`] returning false, the decoded text as display
/// name and an empty address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MailAddress {
    /// Decoded display name, quotes removed. Empty if there is none.
    pub display_name: String,
    /// The `local@domain` address. Empty when invalid.
    pub address: String,
    /// The header text this entry was parsed from.
    pub raw: String,
    valid: bool,
}

impl MailAddress {
    /// Parses a single mailbox with default options.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::parse_with(input, &DecodeOptions::default())
    }

    /// Parses a single mailbox such as `"Name" <user@example.com>`.
    #[must_use]
    pub fn parse_with(input: &str, options: &DecodeOptions) -> Self {
        let raw = input.trim();
        let decoded = encoded_word::decode_with(raw, &options.charsets);

        if let (Some(open), Some(close)) = (decoded.rfind('<'), decoded.rfind('>')) {
            if open < close {
                let address = decoded[open + 1..close].trim();
                if !address.is_empty() {
                    let display_name = unquote(decoded[..open].trim());
                    return Self::checked(display_name, address, raw, &decoded, options);
                }
            }
        }

        // RFC 822 style `user@example.com (Display Name)`.
        let (address, comments) = strip_comments(&decoded);
        let address = address.trim();
        if address.contains('@') {
            let display_name = comments.join(" ");
            return Self::checked(display_name, address, raw, &decoded, options);
        }

        // A bare name such as "Undisclosed recipients" is legal but holds
        // no address.
        Self::invalid(raw, decoded)
    }

    /// Parses a comma-separated address list with default options.
    #[must_use]
    pub fn parse_list(input: &str) -> Vec<Self> {
        Self::parse_list_with(input, &DecodeOptions::default())
    }

    /// Parses a comma-separated address list. Commas inside quotes do not
    /// split; empty entries are skipped.
    #[must_use]
    pub fn parse_list_with(input: &str, options: &DecodeOptions) -> Vec<Self> {
        split_addresses(input)
            .into_iter()
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| Self::parse_with(entry, options))
            .collect()
    }

    /// Returns true if an address was found and passed validation.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    fn checked(
        display_name: String,
        address: &str,
        raw: &str,
        decoded: &str,
        options: &DecodeOptions,
    ) -> Self {
        if let Err(reason) = validate(address) {
            options.report("address", raw, reason);
            return Self::invalid(raw, decoded.to_string());
        }
        Self {
            display_name,
            address: address.to_string(),
            raw: raw.to_string(),
            valid: true,
        }
    }

    fn invalid(raw: &str, decoded: String) -> Self {
        Self {
            display_name: decoded,
            address: String::new(),
            raw: raw.to_string(),
            valid: false,
        }
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "{}", self.raw);
        }
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "\"{}\" <{}>", self.display_name, self.address)
        }
    }
}

/// Validates an address (basic validation).
fn validate(address: &str) -> Result<(), &'static str> {
    if address.contains(char::is_whitespace) {
        return Err("address contains whitespace");
    }

    let Some((local, domain)) = address.split_once('@') else {
        return Err("address must contain @");
    };
    if domain.contains('@') && !local.starts_with('"') {
        return Err("address must have exactly one @");
    }
    if local.is_empty() || domain.is_empty() {
        return Err("local and domain parts cannot be empty");
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("malformed domain");
    }
    Ok(())
}

fn unquote(name: &str) -> String {
    let name = name.trim();
    let inner = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name);
    inner.replace("\\\"", "\"").trim().to_string()
}

/// Splits unquoted `(...)` comments out of the text. Comments may nest and
/// use backslash escapes.
fn strip_comments(text: &str) -> (String, Vec<String>) {
    let mut rest = String::with_capacity(text.len());
    let mut comments = Vec::new();
    let mut comment = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next();
                if depth > 0 {
                    comment.extend(escaped);
                } else {
                    rest.push(c);
                    rest.extend(escaped);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                rest.push(c);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(c);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let trimmed = comment.trim();
                    if !trimmed.is_empty() {
                        comments.push(trimmed.to_string());
                    }
                    comment.clear();
                } else {
                    comment.push(c);
                }
            }
            _ if depth > 0 => comment.push(c),
            _ => rest.push(c),
        }
    }

    (rest, comments)
}

fn split_addresses(input: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' if depth == 0 => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                entries.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&input[start..]);
    entries
}
