//! Content-Disposition header (RFC 2183).

use chrono::{DateTime, Utc};

use crate::config::DecodeOptions;
use crate::date;
use crate::params::{self, Parameters};

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContentDisposition {
    /// Lowercase disposition type, usually `inline` or `attachment`.
    pub disposition_type: String,
    /// Decoded `filename` parameter.
    pub file_name: Option<String>,
    /// `creation-date`, in UTC.
    pub creation_date: Option<DateTime<Utc>>,
    /// `modification-date`, in UTC.
    pub modification_date: Option<DateTime<Utc>>,
    /// `read-date`, in UTC.
    pub read_date: Option<DateTime<Utc>>,
    /// `size` in bytes.
    pub size: Option<u64>,
    /// All parameters, including the ones above.
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Parses a Content-Disposition value with default options.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        Self::parse_with(s, &DecodeOptions::default())
    }

    /// Parses a Content-Disposition value.
    ///
    /// Unparsable dates and sizes are left as `None` and reported.
    #[must_use]
    pub fn parse_with(s: &str, options: &DecodeOptions) -> Self {
        let (primary, parameters) =
            params::parse(s, &options.charsets, options.parameter_precedence);

        let date_param = |name: &str| {
            let raw = parameters.get(name)?;
            let parsed = date::parse(raw.trim_matches('"'));
            if parsed.is_none() {
                options.report("Content-Disposition", raw, &format!("unparsable {name}"));
            }
            parsed
        };

        let size = parameters.get("size").and_then(|raw| {
            let parsed = parse_size(raw);
            if parsed.is_none() {
                options.report("Content-Disposition", raw, "unparsable size");
            }
            parsed
        });

        Self {
            disposition_type: primary.to_ascii_lowercase(),
            file_name: parameters.get("filename").cloned(),
            creation_date: date_param("creation-date"),
            modification_date: date_param("modification-date"),
            read_date: date_param("read-date"),
            size,
            parameters,
        }
    }

    /// Returns true for the `inline` disposition type.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition_type == "inline"
    }

    /// Returns true for the `attachment` disposition type.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition_type == "attachment"
    }

    /// Returns a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parses `104710`, `"104710"` or `12 KB` style sizes. Units are 1024-based.
fn parse_size(raw: &str) -> Option<u64> {
    let value = raw.trim().trim_matches('"').trim();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let number: u64 = value[..digits_end].parse().ok()?;

    let multiplier: u64 = match value[digits_end..].trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return None,
    };
    number.checked_mul(multiplier)
}
