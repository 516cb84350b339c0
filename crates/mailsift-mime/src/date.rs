//! RFC 822 / RFC 2822 date parsing.
//!
//! Dates in the wild are messy: comments, missing seconds, two-digit years,
//! full month names, zones glued to the time and a zoo of legacy zone
//! names. Everything parseable is normalised to UTC; anything else is `None`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Parses a date header value to UTC.
///
/// Returns `None` if the value is not a recognisable date or any field is
/// out of range.
#[must_use]
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let cleaned = clean(value);
    let (weekday, rest) = split_weekday(&cleaned);

    let mut tokens: Vec<&str> = rest.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() == 1 || tokens.first().is_some_and(|t| t.contains('-') && !t.starts_with('-')) {
        // "12-Feb-1997 16:29:51 -0500"
        let first = tokens.remove(0);
        let mut dashed: Vec<&str> = first.split('-').collect();
        dashed.extend(tokens);
        tokens = dashed;
    }
    if tokens.len() < 4 {
        return None;
    }

    let day: u32 = parse_number(tokens[0], 1, 2)?;
    let month = parse_month(tokens[1])?;
    let year = parse_year(tokens[2])?;
    let (time, glued_zone) = split_glued_zone(tokens[3]);
    let time = parse_time(time)?;
    let zone = glued_zone.or_else(|| tokens.get(4).copied());

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let local = NaiveDateTime::new(date, time);

    if let Some(weekday) = weekday {
        let expected = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
        if !weekday.to_ascii_lowercase().starts_with(expected) {
            tracing::debug!(value, weekday, "weekday does not match date");
        }
    }

    let offset_minutes = zone.map_or(0, |zone| {
        zone_offset_minutes(zone).unwrap_or_else(|| {
            tracing::debug!(zone, "unknown time zone, assuming -0000");
            0
        })
    });

    let utc = local.checked_sub_signed(TimeDelta::minutes(i64::from(offset_minutes)))?;
    Some(utc.and_utc())
}

/// Removes comments (nested too), collapses whitespace and drops spaces
/// around `:`.
fn clean(value: &str) -> String {
    let mut without_comments = String::with_capacity(value.len());
    let mut depth = 0u32;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => without_comments.push(c),
            _ => {}
        }
    }

    let collapsed = without_comments.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" :", ":").replace(": ", ":")
}

fn split_weekday(value: &str) -> (Option<&str>, &str) {
    if let Some((weekday, rest)) = value.split_once(',') {
        return (Some(weekday.trim()), rest.trim());
    }
    // "Mon 12 Feb 1997 ..." without the comma
    if let Some((first, rest)) = value.split_once(' ') {
        let lower = first.to_ascii_lowercase();
        if first.len() >= 3 && WEEKDAYS.iter().any(|w| lower.starts_with(w)) {
            return (Some(first), rest);
        }
    }
    (None, value)
}

fn parse_number<T: std::str::FromStr>(token: &str, min_len: usize, max_len: usize) -> Option<T> {
    if token.len() < min_len || token.len() > max_len || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn parse_month(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?.to_ascii_lowercase();
    let index = MONTHS.iter().position(|m| *m == prefix)?;
    u32::try_from(index + 1).ok()
}

fn parse_year(token: &str) -> Option<i32> {
    let year: i32 = parse_number(token, 2, 4)?;
    Some(match token.len() {
        2 if year < 50 => 2000 + year,
        2 => 1900 + year,
        3 => 1900 + year,
        _ => year,
    })
}

/// Splits "13:24:54+0000" or "13:24:54GMT" into time and zone.
fn split_glued_zone(token: &str) -> (&str, Option<&str>) {
    match token.find(|c: char| c == '+' || c == '-' || c.is_ascii_alphabetic()) {
        Some(i) if i > 0 => (&token[..i], Some(&token[i..])),
        _ => (token, None),
    }
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    let mut parts = token.split(':');
    let hour: u32 = parse_number(parts.next()?, 1, 2)?;
    let minute: u32 = parse_number(parts.next()?, 1, 2)?;
    let second: u32 = match parts.next() {
        Some(s) => parse_number(s, 1, 2)?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    // leap second
    let second = if second == 60 { 59 } else { second };
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Offset east of UTC in minutes, or `None` for an unrecognised zone.
fn zone_offset_minutes(zone: &str) -> Option<i32> {
    let bytes = zone.as_bytes();
    if bytes.len() == 5 && matches!(bytes[0], b'+' | b'-') && bytes[1..].iter().all(u8::is_ascii_digit) {
        let hours: i32 = zone[1..3].parse().ok()?;
        let minutes: i32 = zone[3..5].parse().ok()?;
        let total = hours * 60 + minutes;
        return Some(if bytes[0] == b'-' { -total } else { total });
    }

    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        military if military.len() == 1 => return military_offset(military.as_bytes()[0]),
        _ => return None,
    };
    Some(hours * 60)
}

/// RFC 822 military zones: A-I and K-M are -1 to -12 hours, N-Y are +1 to
/// +12 hours. J is unassigned.
fn military_offset(letter: u8) -> Option<i32> {
    let hours = match letter {
        b'A'..=b'I' => -i32::from(letter - b'A' + 1),
        b'K'..=b'M' => -i32::from(letter - b'K' + 10),
        b'N'..=b'Y' => i32::from(letter - b'N' + 1),
        _ => return None,
    };
    Some(hours * 60)
}
