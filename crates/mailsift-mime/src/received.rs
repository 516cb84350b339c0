//! `Received` trace header parsing (RFC 5321 section 4.4).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::config::DecodeOptions;
use crate::date;

/// One `Received` header.
///
/// A typical value looks like
/// `from a.example (helo=x) by b.example with ESMTP id 123 for <u@b.example>; <date>`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Received {
    /// The header value as it appeared.
    pub raw: String,
    /// Clause values keyed by lowercase clause name (`from`, `by`, `with`,
    /// `id`, `for`, ...). Trailing comments are part of the value.
    pub names: IndexMap<String, String>,
    /// The timestamp after the last `;`, in UTC.
    pub date: Option<DateTime<Utc>>,
}

impl Received {
    /// Parses a Received value with default options.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::parse_with(value, &DecodeOptions::default())
    }

    /// Parses a Received value. Never fails; an unparsable date is `None`.
    #[must_use]
    pub fn parse_with(value: &str, options: &DecodeOptions) -> Self {
        let (clauses, date) = match value.rfind(';') {
            Some(i) => {
                let date_part = value[i + 1..].trim();
                let date = date::parse(date_part);
                if date.is_none() {
                    options.report("Received", value, "unparsable date");
                }
                (&value[..i], date)
            }
            None => (value, None),
        };

        Self {
            raw: value.to_string(),
            names: parse_clauses(clauses),
            date,
        }
    }

    /// Returns a clause value by case-insensitive name.
    #[must_use]
    pub fn name(&self, clause: &str) -> Option<&str> {
        self.names
            .get(&clause.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Comment(&'a str),
}

impl<'a> Token<'a> {
    const fn text(&self) -> &'a str {
        match self {
            Self::Word(s) | Self::Comment(s) => s,
        }
    }
}

/// Splits on whitespace, keeping each parenthesised comment (nested
/// parentheses included) as one token.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        if bytes[pos] == b'(' {
            let mut depth = 0usize;
            while pos < bytes.len() {
                match bytes[pos] {
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            pos += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                pos += 1;
            }
            tokens.push(Token::Comment(&text[start..pos]));
        } else {
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            tokens.push(Token::Word(&text[start..pos]));
        }
    }

    tokens
}

/// Pairs each clause name with the token after it plus any comments that
/// follow. The first occurrence of a name wins.
fn parse_clauses(text: &str) -> IndexMap<String, String> {
    let tokens = tokenize(text);
    let mut names = IndexMap::new();
    let mut i = 0;

    while i < tokens.len() {
        let Token::Word(name) = tokens[i] else {
            i += 1;
            continue;
        };
        let Some(first) = tokens.get(i + 1) else {
            break;
        };

        let mut value = first.text().to_string();
        let mut j = i + 2;
        while let Some(Token::Comment(comment)) = tokens.get(j) {
            value.push(' ');
            value.push_str(comment);
            j += 1;
        }

        names.entry(name.to_ascii_lowercase()).or_insert(value);
        i = j;
    }

    names
}
