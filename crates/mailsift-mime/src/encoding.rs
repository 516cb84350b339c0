//! Content-transfer-encoding decoders.
//!
//! Supports Base64 and Quoted-Printable (RFC 2045), in the tolerant form
//! real mail needs: stray characters are skipped and broken escapes are kept
//! as written instead of failing the whole body.

use std::fmt;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;

use crate::error::Result;

/// Base64 engine that ignores padding and non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Like [`LENIENT`] but rejects non-zero trailing bits.
const CHECKED: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Content transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Binary data.
    Binary,
    /// Quoted-printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding value.
    ///
    /// Anything that is not one of the five known mechanisms (compared
    /// case-insensitively) yields [`TransferEncoding::SevenBit`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let value = s.trim().trim_matches('"').trim();
        match value.to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "quoted-printable" => Self::QuotedPrintable,
            "base64" => Self::Base64,
            _ => {
                if !value.is_empty() {
                    tracing::debug!(value, "unknown transfer encoding, using 7bit");
                }
                Self::SevenBit
            }
        }
    }

    /// Returns true if [`TransferEncoding::parse`] recognises the value.
    #[must_use]
    pub fn is_known(s: &str) -> bool {
        let value = s.trim().trim_matches('"').trim();
        ["7bit", "8bit", "binary", "quoted-printable", "base64"]
            .iter()
            .any(|known| value.eq_ignore_ascii_case(known))
    }

    /// Decodes a raw body according to this encoding.
    ///
    /// Identity encodings return the bytes unchanged.
    #[must_use]
    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::SevenBit | Self::EightBit | Self::Binary => body.to_vec(),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::Base64 => decode_base64_lenient(body),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Decodes strict Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid padded Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Base64 data, skipping every byte outside the Base64 alphabet.
///
/// Padding is optional. Each `=`-terminated quantum is decoded on its own,
/// so separately padded blocks joined together decode correctly. A dangling
/// final character that cannot form a byte is discarded.
#[must_use]
pub fn decode_base64_lenient(data: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(data.len() / 4 * 3);
    for mut segment in padded_segments(data) {
        if segment.len() % 4 == 1 {
            tracing::debug!(len = segment.len(), "dropping dangling base64 character");
            segment.pop();
        }
        match LENIENT.decode(&segment) {
            Ok(bytes) => decoded.extend_from_slice(&bytes),
            Err(e) => tracing::warn!(?e, "undecodable base64 payload"),
        }
    }
    decoded
}

/// Decodes a short Base64 payload such as the text of an encoded word.
///
/// Whitespace is ignored and padding is optional. Returns `None` for stray
/// characters and for a final quantum that does not end cleanly on a byte.
#[must_use]
pub fn decode_base64_checked(data: &[u8]) -> Option<Vec<u8>> {
    if data
        .iter()
        .any(|&b| !is_base64_char(b) && b != b'=' && !b.is_ascii_whitespace())
    {
        return None;
    }

    let mut decoded = Vec::new();
    for segment in padded_segments(data) {
        if segment.len() % 4 == 1 {
            return None;
        }
        decoded.extend(CHECKED.decode(&segment).ok()?);
    }
    Some(decoded)
}

const fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'+' || b == b'/'
}

/// Alphabet characters grouped into runs that end at `=` padding.
fn padded_segments(data: &[u8]) -> Vec<Vec<u8>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for &b in data {
        if is_base64_char(b) {
            current.push(b);
        } else if b == b'=' && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Decodes a Quoted-Printable body (RFC 2045 section 6.7).
///
/// - `=XY` becomes the byte `0xXY` (hex digits in either case).
/// - `=` followed by optional whitespace and a line break is a soft line
///   break and is removed.
/// - Any other `=` is kept literally.
/// - Control characters other than tab and line breaks are dropped, as is a
///   carriage return that is not followed by a line feed.
///
/// `_` is not special in bodies.
#[must_use]
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    decode_qp(input, false)
}

/// Decodes the Q encoding of RFC 2047: quoted-printable where `_` is a space.
#[must_use]
pub fn decode_q(input: &[u8]) -> Vec<u8> {
    decode_qp(input, true)
}

fn decode_qp(input: &[u8], underscore_is_space: bool) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        match byte {
            b'=' => {
                if let Some(len) = soft_line_break(&input[i + 1..]) {
                    i += 1 + len;
                    continue;
                }
                if let Some(decoded) = input.get(i + 1..i + 3).and_then(hex_pair) {
                    result.push(decoded);
                    i += 3;
                    continue;
                }
                result.push(b'=');
            }
            b'_' if underscore_is_space => result.push(b' '),
            b'\r' => {
                if input.get(i + 1) == Some(&b'\n') {
                    result.extend_from_slice(b"\r\n");
                    i += 1;
                }
            }
            b'\n' | b'\t' => result.push(byte),
            b if b < 0x20 || b == 0x7F => {}
            _ => result.push(byte),
        }
        i += 1;
    }

    result
}

/// Length of a soft line break following `=`, if there is one.
fn soft_line_break(rest: &[u8]) -> Option<usize> {
    let padding = rest.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
    match &rest[padding..] {
        [b'\r', b'\n', ..] => Some(padding + 2),
        [b'\n', ..] => Some(padding + 1),
        _ => None,
    }
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let high = char::from(pair[0]).to_digit(16)?;
    let low = char::from(pair[1]).to_digit(16)?;
    u8::try_from(high * 16 + low).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("8bit"), TransferEncoding::EightBit);
        assert_eq!(TransferEncoding::parse("binary"), TransferEncoding::Binary);
        assert_eq!(TransferEncoding::parse("7BIT"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_transfer_encoding_unknown_is_seven_bit() {
        assert_eq!(TransferEncoding::parse("ISO-8859-1"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(""), TransferEncoding::SevenBit);
        assert!(!TransferEncoding::is_known("ISO-8859-1"));
        assert!(TransferEncoding::is_known("Base64"));
    }

    #[test]
    fn test_transfer_encoding_display() {
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
        assert_eq!(TransferEncoding::SevenBit.to_string(), "7bit");
    }

    #[test]
    fn test_strict_base64() {
        assert_eq!(decode_base64("SGVsbG8=").unwrap(), b"Hello");
        assert!(decode_base64("SGVsbG8").is_err());
    }

    #[test]
    fn test_lenient_base64_skips_noise() {
        assert_eq!(decode_base64_lenient(b"VGVz\r\ndA=="), b"Test");
        assert_eq!(decode_base64_lenient(b" VG Vz dA "), b"Test");
        assert_eq!(decode_base64_lenient(b"VGVzdA"), b"Test");
        assert_eq!(decode_base64_lenient(b"VGVzdA*=!="), b"Test");
    }

    #[test]
    fn test_lenient_base64_dangling_character() {
        assert_eq!(decode_base64_lenient(b"VGVzdAQ"), b"Test\x04");
        assert_eq!(decode_base64_lenient(b"VGVzd"), b"Tes");
        assert!(decode_base64_lenient(b"").is_empty());
    }

    #[test]
    fn test_lenient_base64_concatenated_blocks() {
        assert_eq!(decode_base64_lenient(b"VGVzdA==\r\nVGVzdA=="), b"TestTest");
        assert_eq!(decode_base64_lenient(b"SGk=SGk="), b"HiHi");
    }

    #[test]
    fn test_checked_base64() {
        assert_eq!(decode_base64_checked(b"SGVsbG8=").unwrap(), b"Hello");
        assert_eq!(decode_base64_checked(b"SGVs bG8").unwrap(), b"Hello");
        assert!(decode_base64_checked(b"").unwrap().is_empty());
    }

    #[test]
    fn test_checked_base64_rejects_damage() {
        assert!(decode_base64_checked(b"SGVsbG8gV").is_none());
        assert!(decode_base64_checked(b"w5").is_none());
        assert!(decode_base64_checked(b"SGVs*bG8=").is_none());
    }

    #[test]
    fn test_qp_escapes() {
        assert_eq!(decode_quoted_printable(b"=3D"), b"=");
        assert_eq!(decode_quoted_printable(b"=3D=3D"), b"==");
        assert_eq!(decode_quoted_printable(b"=3D3D"), b"=3D");
        assert_eq!(decode_quoted_printable(b"=3d=a1"), b"=\xA1");
    }

    #[test]
    fn test_qp_soft_line_breaks() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\n"), b"Hello");
        assert_eq!(decode_quoted_printable(b"=\r\n"), b"");
        assert_eq!(
            decode_quoted_printable(b"Now is the time =\r\nfor all folk to come=\r\n to the aid"),
            b"Now is the time for all folk to come to the aid"
        );
        assert_eq!(decode_quoted_printable(b"pad=  \r\nded"), b"padded");
        assert_eq!(decode_quoted_printable(b"bare=\nlf"), b"barelf");
    }

    #[test]
    fn test_qp_invalid_escapes_pass_through() {
        assert_eq!(decode_quoted_printable(b"="), b"=");
        assert_eq!(decode_quoted_printable(b"=PK"), b"=PK");
        assert_eq!(decode_quoted_printable(b"a=4"), b"a=4");
    }

    #[test]
    fn test_qp_keeps_spaces_tabs_and_underscores() {
        assert_eq!(
            decode_quoted_printable(b"Test for space\tand\ttabs"),
            b"Test for space\tand\ttabs"
        );
        assert_eq!(decode_quoted_printable(b"a_b_c_d_e_f"), b"a_b_c_d_e_f");
    }

    #[test]
    fn test_qp_drops_control_characters() {
        let input = b"\x07\x08\x0C\x00\r\n\t\x7F";
        assert_eq!(decode_quoted_printable(input), b"\r\n\t");
        assert_eq!(decode_quoted_printable(b"\runit\red"), b"united");
    }

    #[test]
    fn test_q_underscore_is_space() {
        assert_eq!(decode_q(b"=A1Hola,_se=F1or!"), b"\xA1Hola, se\xF1or!");
        assert_eq!(decode_q(b"_"), b" ");
    }

    #[test]
    fn test_decode_by_kind() {
        assert_eq!(TransferEncoding::Base64.decode(b"VGVzdA=="), b"Test");
        assert_eq!(TransferEncoding::QuotedPrintable.decode(b"a=20b"), b"a b");
        assert_eq!(TransferEncoding::EightBit.decode(b"a=20b"), b"a=20b");
    }
}
