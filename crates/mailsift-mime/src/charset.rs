//! Character set resolution.
//!
//! Charset labels found in mail are frequently misspelled or mislabelled, so
//! resolution never fails: anything unrecognised becomes US-ASCII unless a
//! custom fallback says otherwise.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use encoding_rs::Encoding;

/// A resolved text decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// 7-bit US-ASCII. Bytes above 0x7F decode to U+FFFD.
    #[default]
    Ascii,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
    /// Any charset known to `encoding_rs`.
    Encoding(&'static Encoding),
}

impl Charset {
    /// UTF-8.
    #[must_use]
    pub fn utf8() -> Self {
        Self::Encoding(encoding_rs::UTF_8)
    }

    /// Canonical name of the charset.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ascii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
            Self::Encoding(encoding) => encoding.name(),
        }
    }

    /// Decodes bytes to text, replacing malformed sequences with U+FFFD.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Encoding(encoding) => encoding.decode_with_bom_removal(bytes).0.into_owned(),
        }
    }

    /// Looks up one of the built-in charsets by label.
    ///
    /// Accepts any WHATWG label plus the aliases seen in the wild:
    /// `utf8`, `latin1`, `ascii`, `cp-1252`, `cp1252`, `windows-950` and
    /// friends. A trailing RFC 2231 language tag (`iso-8859-1*da`) is ignored.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = normalize(label);
        if label.is_empty() {
            return None;
        }

        match label.as_str() {
            "us-ascii" | "ascii" | "us" | "ansi_x3.4-1968" | "iso646-us" | "csascii" => {
                return Some(Self::Ascii);
            }
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1"
            | "iso-ir-100" | "cp819" | "ibm819" => return Some(Self::Latin1),
            _ => {}
        }

        if let Some(code_page) = code_page(&label) {
            return windows_code_page(code_page);
        }

        Encoding::for_label_no_replacement(label.as_bytes()).map(Self::Encoding)
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Charset {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

fn normalize(label: &str) -> String {
    let label = label.trim().trim_matches('"').trim();
    let label = label.split('*').next().unwrap_or(label);
    label.trim().to_ascii_lowercase()
}

/// Extracts the number from `cp-1252`, `cp1252` and `windows-1252`.
fn code_page(label: &str) -> Option<u16> {
    let digits = label
        .strip_prefix("cp-")
        .or_else(|| label.strip_prefix("cp"))
        .or_else(|| label.strip_prefix("windows-"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn windows_code_page(code_page: u16) -> Option<Charset> {
    let encoding = match code_page {
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        20127 => return Some(Charset::Ascii),
        28591 => return Some(Charset::Latin1),
        28592 => encoding_rs::ISO_8859_2,
        28605 => encoding_rs::ISO_8859_15,
        65001 => encoding_rs::UTF_8,
        _ => return None,
    };
    Some(Charset::Encoding(encoding))
}

type Fallback = Arc<dyn Fn(&str) -> Option<Charset> + Send + Sync>;

/// Maps charset names from headers to decoders.
///
/// Custom mappings are consulted first, then the built-in table, then the
/// optional fallback. If all of them come up empty the result is
/// [`Charset::Ascii`].
///
/// # Example
///
/// ```ignore
/// use mailsift_mime::{Charset, CharsetResolver};
///
/// let resolver = CharsetResolver::new()
///     .with_mapping("x-mac-roman-ish", Charset::Latin1)
///     .with_fallback(|_| Some(Charset::utf8()));
///
/// assert_eq!(resolver.resolve(Some("iso-8859-1")), Charset::Latin1);
/// assert_eq!(resolver.resolve(Some("nonsense")), Charset::utf8());
/// ```
#[derive(Clone, Default)]
pub struct CharsetResolver {
    mappings: HashMap<String, Charset>,
    fallback: Option<Fallback>,
}

impl CharsetResolver {
    /// Creates a resolver with only the built-in table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom mapping. Names are matched case-insensitively and take
    /// precedence over built-in labels.
    #[must_use]
    pub fn with_mapping(mut self, name: &str, charset: Charset) -> Self {
        self.mappings.insert(normalize(name), charset);
        self
    }

    /// Sets the decoder used for names nothing else recognises.
    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> Option<Charset> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Resolves a charset name. Never fails.
    #[must_use]
    pub fn resolve(&self, name: Option<&str>) -> Charset {
        let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
            return Charset::Ascii;
        };

        if let Some(charset) = self.mappings.get(&normalize(name)) {
            return *charset;
        }
        if let Some(charset) = Charset::from_label(name) {
            return charset;
        }
        if let Some(charset) = self.fallback.as_ref().and_then(|f| f(name)) {
            return charset;
        }

        tracing::debug!(charset = name, "unknown charset, using us-ascii");
        Charset::Ascii
    }
}

impl fmt::Debug for CharsetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharsetResolver")
            .field("mappings", &self.mappings)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
