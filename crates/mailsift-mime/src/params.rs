//! MIME parameter parsing shared by Content-Type and Content-Disposition.
//!
//! Handles quoted values, RFC 2231 extended values (`name*=charset'lang'%XX`)
//! and continuations (`name*0=`, `name*1*=`, ...), plus the usual sloppiness:
//! missing semicolons, stray trailing semicolons and RFC 2047 encoded words
//! used as parameter values.

use indexmap::IndexMap;
use indexmap::map::Entry;
use percent_encoding::percent_decode_str;

use crate::charset::CharsetResolver;
use crate::encoded_word;

/// Decoded parameters keyed by lowercase name, in order of first appearance.
pub type Parameters = IndexMap<String, String>;

/// Which form wins when a parameter is given both plainly and in RFC 2231
/// extended form, e.g. `filename="=?utf-8?B?...?="; filename*=utf-8''...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterPrecedence {
    /// The RFC 2231 form (`name*` or `name*N`) wins.
    #[default]
    PreferExtended,
    /// The plain `name=` form wins.
    PreferLegacy,
}

/// Splits a structured header value into its primary value and parameters.
///
/// The primary value (media type or disposition type) is trimmed but not
/// lowercased. Parameter names are lowercased.
#[must_use]
pub fn parse(
    value: &str,
    charsets: &CharsetResolver,
    precedence: ParameterPrecedence,
) -> (String, Parameters) {
    let (primary, rest) = split_primary(value);
    let raw = scan(rest);
    (primary, assemble(raw, charsets, precedence))
}

/// A parameter exactly as written, quotes removed.
#[derive(Debug, PartialEq, Eq)]
struct RawParameter<'a> {
    name: &'a str,
    value: String,
}

fn split_primary(value: &str) -> (String, &str) {
    let value = value.trim();
    let end = find_unquoted(value, b';').unwrap_or(value.len());
    let first = value[..end].trim();
    let rest = value.get(end + 1..).unwrap_or("");

    // "text/plain charset=us-ascii": the first parameter lost its semicolon.
    let first_word_end = first.find(char::is_whitespace).unwrap_or(first.len());
    if first[..first_word_end].contains('=') {
        return (String::new(), value);
    }
    if first_word_end < first.len() && first[first_word_end..].contains('=') {
        let primary = first[..first_word_end].trim_matches('"').to_string();
        let offset = value.len() - value[first_word_end..].len();
        return (primary, &value[offset..]);
    }

    (first.trim_matches('"').trim().to_string(), rest)
}

fn find_unquoted(text: &str, needle: u8) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, &b) in text.as_bytes().iter().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            _ if b == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Tokenises `name=value` pairs, tolerating missing semicolons.
fn scan(text: &str) -> Vec<RawParameter<'_>> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut params = Vec::new();
    let mut pos = 0;

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let name_start = pos;
        while pos < len && !matches!(bytes[pos], b'=' | b';') && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let name = &text[name_start..pos];
        if name.is_empty() {
            // stray '='
            pos += 1;
            continue;
        }
        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= len || bytes[pos] != b'=' {
            tracing::trace!(token = name, "ignoring parameter without a value");
            continue;
        }
        pos += 1;
        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let value = if pos < len && bytes[pos] == b'"' {
            let (value, end) = quoted_value(text, pos + 1);
            pos = end;
            value
        } else {
            let end = unquoted_value_end(text, pos);
            let value = text[pos..end].trim().to_string();
            pos = end;
            value
        };

        params.push(RawParameter { name, value });
    }

    params
}

/// Reads a quoted string starting just after the opening quote. Returns the
/// unescaped value and the position after the closing quote.
fn quoted_value(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut value = String::new();
    let mut pos = start;
    let mut run_start = start;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if matches!(bytes.get(pos + 1), Some(b'"' | b'\\')) => {
                value.push_str(&text[run_start..pos]);
                run_start = pos + 1;
                pos += 2;
            }
            b'"' => {
                value.push_str(&text[run_start..pos]);
                return (value, pos + 1);
            }
            _ => pos += 1,
        }
    }

    // unterminated quote runs to the end
    value.push_str(&text[run_start..]);
    (value, bytes.len())
}

/// An unquoted value ends at `;`, or at whitespace followed by `token=`.
fn unquoted_value_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b';' {
            return pos;
        }
        if bytes[pos].is_ascii_whitespace() && starts_parameter(&text[pos..]) {
            return pos;
        }
        pos += 1;
    }
    bytes.len()
}

fn starts_parameter(text: &str) -> bool {
    let text = text.trim_start();
    let name_len = text
        .bytes()
        .take_while(|b| !matches!(b, b'=' | b';' | b'"') && !b.is_ascii_whitespace())
        .count();
    name_len > 0 && text[name_len..].trim_start().starts_with('=')
}

/// Splits `name`, `name*`, `name*N` and `name*N*` into
/// (base name, section, extended).
fn split_name(name: &str) -> (String, Option<u32>, bool) {
    let lower = name.to_ascii_lowercase();
    let (base, extended) = match lower.strip_suffix('*') {
        Some(base) => (base.to_string(), true),
        None => (lower, false),
    };
    if let Some((stem, section)) = base.rsplit_once('*') {
        if !section.is_empty() && section.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(section) = section.parse() {
                return (stem.to_string(), Some(section), extended);
            }
        }
    }
    (base, None, extended)
}

#[derive(Default)]
struct Collected {
    plain: Option<String>,
    extended: Option<String>,
    sections: Vec<(u32, bool, String)>,
}

fn assemble(
    raw: Vec<RawParameter<'_>>,
    charsets: &CharsetResolver,
    precedence: ParameterPrecedence,
) -> Parameters {
    let mut collected: IndexMap<String, Collected> = IndexMap::new();

    for RawParameter { name, value } in raw {
        let (base, section, extended) = split_name(name);
        let entry = collected.entry(base).or_default();
        match (section, extended) {
            (Some(n), _) => entry.sections.push((n, extended, value)),
            (None, true) => {
                entry.extended.get_or_insert(value);
            }
            (None, false) => {
                entry.plain.get_or_insert(value);
            }
        }
    }

    let mut params = Parameters::new();
    for (name, item) in collected {
        let extended = if item.sections.is_empty() {
            item.extended.map(|v| decode_extended(&v, charsets))
        } else {
            Some(join_sections(item.sections, charsets))
        };
        let legacy = item.plain;

        let chosen = match precedence {
            ParameterPrecedence::PreferExtended => extended.or(legacy),
            ParameterPrecedence::PreferLegacy => legacy.or(extended),
        };
        let Some(mut value) = chosen else { continue };

        if encoded_word::contains_encoded_word(&value) {
            value = encoded_word::decode_with(&value, charsets);
        }

        if let Entry::Vacant(slot) = params.entry(name) {
            slot.insert(value);
        }
    }
    params
}

/// Decodes a single `charset'lang'percent-encoded` value.
fn decode_extended(value: &str, charsets: &CharsetResolver) -> String {
    let (charset, encoded) = split_charset(value);
    let bytes: Vec<u8> = percent_decode_str(encoded).collect();
    decode_bytes(&bytes, charset, charsets)
}

/// Concatenates continuation sections in order, decoding the charset once.
fn join_sections(mut sections: Vec<(u32, bool, String)>, charsets: &CharsetResolver) -> String {
    sections.sort_by_key(|(n, _, _)| *n);
    sections.dedup_by_key(|(n, _, _)| *n);

    let mut charset = None;
    let mut bytes = Vec::new();
    for (n, extended, value) in &sections {
        if *extended {
            let encoded = if *n == 0 {
                let (name, encoded) = split_charset(value);
                charset = name;
                encoded
            } else {
                value.as_str()
            };
            bytes.extend(percent_decode_str(encoded));
        } else {
            bytes.extend_from_slice(value.as_bytes());
        }
    }

    decode_bytes(&bytes, charset, charsets)
}

fn split_charset(value: &str) -> (Option<&str>, &str) {
    let mut parts = value.splitn(3, '\'');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_language), Some(encoded)) => {
            (Some(charset).filter(|c| !c.is_empty()), encoded)
        }
        _ => (None, value),
    }
}

fn decode_bytes(bytes: &[u8], charset: Option<&str>, charsets: &CharsetResolver) -> String {
    match charset {
        Some(name) => charsets.resolve(Some(name)).decode(bytes),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse_default(value: &str) -> (String, Parameters) {
        parse(value, &CharsetResolver::new(), ParameterPrecedence::default())
    }

    #[test]
    fn test_simple_parameters() {
        let (primary, params) = parse_default("text/plain; charset=utf-8; format=flowed");
        assert_eq!(primary, "text/plain");
        assert_eq!(params.get("charset").unwrap(), "utf-8");
        assert_eq!(params.get("format").unwrap(), "flowed");
    }

    #[test]
    fn test_names_lowercased_and_order_kept() {
        let (_, params) = parse_default("attachment; Filename=a.txt; X-Vendor=1; Size=3");
        let names: Vec<_> = params.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["filename", "x-vendor", "size"]);
    }

    #[test]
    fn test_quoted_value_keeps_semicolon() {
        let (_, params) = parse_default("application/msword; name=\"NUMMER; 251478.doc\"");
        assert_eq!(params.get("name").unwrap(), "NUMMER; 251478.doc");
    }

    #[test]
    fn test_quoted_value_escapes() {
        let (_, params) = parse_default(r#"attachment; filename="say \"hi\".txt""#);
        assert_eq!(params.get("filename").unwrap(), "say \"hi\".txt");
    }

    #[test]
    fn test_missing_semicolons() {
        let (primary, params) =
            parse_default("text/plain; charset   =   \"iso-8859-1\" name   =   \"somefile.txt\"");
        assert_eq!(primary, "text/plain");
        assert_eq!(params.get("charset").unwrap(), "iso-8859-1");
        assert_eq!(params.get("name").unwrap(), "somefile.txt");

        let (primary, params) = parse_default("text/plain charset=us-ascii format=flowed");
        assert_eq!(primary, "text/plain");
        assert_eq!(params.get("charset").unwrap(), "us-ascii");
        assert_eq!(params.get("format").unwrap(), "flowed");
    }

    #[test]
    fn test_trailing_semicolon_and_whitespace() {
        let (primary, params) = parse_default("multipart/mixed; boundary=abc;  ");
        assert_eq!(primary, "multipart/mixed");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("boundary").unwrap(), "abc");
    }

    #[test]
    fn test_unquoted_boundary_with_equals() {
        let (_, params) = parse_default("multipart/alternative; boundary=----=_NextPart_000_0001");
        assert_eq!(params.get("boundary").unwrap(), "----=_NextPart_000_0001");
    }

    #[test]
    fn test_extended_value() {
        let (_, params) = parse_default("attachment; filename*=iso-8859-1'da'%E6bler.txt");
        assert_eq!(params.get("filename").unwrap(), "æbler.txt");
    }

    #[test]
    fn test_extended_value_in_quotes() {
        let (_, params) = parse_default("attachment; filename*=\"utf-8''foobar.jpg\"");
        assert_eq!(params.get("filename").unwrap(), "foobar.jpg");
    }

    #[test]
    fn test_continuations_plain() {
        let (_, params) = parse_default("attachment; filename*0=\"abc\"; filename*1=\"def\"");
        assert_eq!(params.get("filename").unwrap(), "abcdef");

        let (_, params) =
            parse_default("multipart/mixed; boundary*0=\"----=_Part_1\"; boundary*1=\"_2.3\"");
        assert_eq!(params.get("boundary").unwrap(), "----=_Part_1_2.3");
    }

    #[test]
    fn test_continuations_mixed_extended_and_plain() {
        let (_, params) = parse_default(concat!(
            "message/external-body; access-type=URL;",
            " title*0*=us-ascii'en'This%20is%20even%20more%20;",
            " title*1*=%2A%2A%2Afun%2A%2A%2A%20;",
            " title*2=\"isn't it!\""
        ));
        assert_eq!(params.get("access-type").unwrap(), "URL");
        assert_eq!(params.get("title").unwrap(), "This is even more ***fun*** isn't it!");
    }

    #[test]
    fn test_continuations_out_of_order() {
        let (_, params) =
            parse_default("attachment; filename*1*=%C5%2E%74%78%74; filename*0*=ISO-8859-1''%C6%D8");
        assert_eq!(params.get("filename").unwrap(), "ÆØÅ.txt");
    }

    #[test]
    fn test_charset_applied_once_to_joined_bytes() {
        // the two bytes of "ø" in UTF-8 are split across sections
        let (_, params) = parse_default("attachment; filename*0*=utf-8''Br%C3; filename*1*=%B8d.txt");
        assert_eq!(params.get("filename").unwrap(), "Brød.txt");
    }

    #[test]
    fn test_encoded_word_value_fallback() {
        let (_, params) = parse_default("attachment; filename=\"=?utf-8?B?w5huc2tlLmRvYw==?=\"");
        assert_eq!(params.get("filename").unwrap(), "Ønske.doc");
    }

    #[test]
    fn test_precedence_policy() {
        let value = "attachment; filename=\"=?utf-8?Q?legacy.txt?=\"; filename*=utf-8''extended.txt";

        let (_, params) = parse(value, &CharsetResolver::new(), ParameterPrecedence::PreferExtended);
        assert_eq!(params.get("filename").unwrap(), "extended.txt");

        let (_, params) = parse(value, &CharsetResolver::new(), ParameterPrecedence::PreferLegacy);
        assert_eq!(params.get("filename").unwrap(), "legacy.txt");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let (_, params) = parse_default("text/plain; charset=utf-8; charset=iso-8859-1");
        assert_eq!(params.get("charset").unwrap(), "utf-8");
    }

    #[test]
    fn test_bad_percent_encoding_kept() {
        let (_, params) = parse_default("attachment; filename*=utf-8''100%zz.txt");
        assert_eq!(params.get("filename").unwrap(), "100%zz.txt");
    }

    #[test]
    fn test_missing_primary() {
        let (primary, params) = parse_default("filename=\"x.txt\"");
        assert_eq!(primary, "");
        assert_eq!(params.get("filename").unwrap(), "x.txt");
    }

    #[test]
    fn test_junk_tokens_ignored() {
        let (primary, params) = parse_default("text/html; ; garbage; charset=utf-8");
        assert_eq!(primary, "text/html");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("charset").unwrap(), "utf-8");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("filename"), ("filename".into(), None, false));
        assert_eq!(split_name("filename*"), ("filename".into(), None, true));
        assert_eq!(split_name("Filename*2"), ("filename".into(), Some(2), false));
        assert_eq!(split_name("filename*10*"), ("filename".into(), Some(10), true));
    }
}
