// 📅 Date Normalizer - many encodings in, epoch milliseconds out
//
// Upstream date cells show up as ISO strings, D/M/Y, M/Y, Y/M, compact
// YYYYMM(DD), Unix seconds, Unix milliseconds, spreadsheet serial days and,
// occasionally, Hijri years. Every recognizer here yields a UTC instant.

use crate::record::Scalar;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::OnceLock;

/// One calendar day in milliseconds
pub const MS_PER_DAY: i64 = 86_400_000;

/// Calendar years accepted on the mileage and ownership timelines
pub const PLAUSIBLE_YEARS: RangeInclusive<i32> = 1990..=2100;

/// Day 25569 of the spreadsheet calendar is 1970-01-01
const SPREADSHEET_UNIX_EPOCH: f64 = 25_569.0;

// ============================================================================
// ENCODINGS
// ============================================================================

/// Which recognizer in the cascade accepted a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateEncoding {
    UnixMillis,
    UnixSeconds,
    SpreadsheetSerial,
    Iso,
    DayMonthYear,
    MonthYear,
    YearMonth,
    Compact,
    Textual,
}

impl DateEncoding {
    pub fn name(&self) -> &str {
        match self {
            DateEncoding::UnixMillis => "unix-ms",
            DateEncoding::UnixSeconds => "unix-seconds",
            DateEncoding::SpreadsheetSerial => "spreadsheet-serial",
            DateEncoding::Iso => "iso",
            DateEncoding::DayMonthYear => "d/m/y",
            DateEncoding::MonthYear => "m/y",
            DateEncoding::YearMonth => "y/m",
            DateEncoding::Compact => "compact",
            DateEncoding::Textual => "textual",
        }
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

fn iso_re() -> &'static Regex {
    static ISO_RE: OnceLock<Regex> = OnceLock::new();
    ISO_RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4})[-./](\d{1,2})[-./](\d{1,2})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2})(?:\.\d+)?)?)?\s?(Z|[+-]\d{2}:?\d{2})?$",
        )
        .expect("valid iso date regex")
    })
}

fn day_month_year_re() -> &'static Regex {
    static DMY_RE: OnceLock<Regex> = OnceLock::new();
    DMY_RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[./-](\d{1,2})[./-](\d{4})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2}))?)?$")
            .expect("valid d/m/y regex")
    })
}

fn month_year_re() -> &'static Regex {
    static MY_RE: OnceLock<Regex> = OnceLock::new();
    MY_RE.get_or_init(|| Regex::new(r"^(\d{1,2})[./-](\d{4})$").expect("valid m/y regex"))
}

fn year_month_re() -> &'static Regex {
    static YM_RE: OnceLock<Regex> = OnceLock::new();
    YM_RE.get_or_init(|| Regex::new(r"^(\d{4})[./-](\d{1,2})$").expect("valid y/m regex"))
}

fn compact_re() -> &'static Regex {
    static COMPACT_RE: OnceLock<Regex> = OnceLock::new();
    COMPACT_RE
        .get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})?$").expect("valid compact regex"))
}

/// Textual layouts tried by the last-resort parse
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%a %b %d %Y",
];

// ============================================================================
// PUBLIC API
// ============================================================================

/// Normalize a scalar into epoch milliseconds, without the plausibility check.
pub fn normalize_date(value: Scalar<'_>) -> Option<i64> {
    detect_date(value).map(|(ts, _)| ts)
}

/// Normalize a scalar and reject anything outside [`PLAUSIBLE_YEARS`].
///
/// This is the entry point every timeline builder must use: a single corrupted
/// digit otherwise produces entries decades away from reality.
pub fn normalize_plausible_date(value: Scalar<'_>) -> Option<i64> {
    normalize_date(value).filter(|ts| is_plausible(*ts))
}

/// Run the recognizer cascade and report which encoding matched.
///
/// The cascade stops at the first recognizer whose *shape* fits; a fitting
/// shape with an impossible calendar date (e.g. `31/02/2021`) is `None`.
pub fn detect_date(value: Scalar<'_>) -> Option<(i64, DateEncoding)> {
    match value {
        Scalar::Number(n) => detect_numeric(n),
        Scalar::Text(s) => detect_text(s),
    }
}

/// Is the timestamp's UTC calendar year inside [`PLAUSIBLE_YEARS`]?
pub fn is_plausible(timestamp_ms: i64) -> bool {
    to_datetime(timestamp_ms).map_or(false, |dt| PLAUSIBLE_YEARS.contains(&dt.year()))
}

pub fn to_datetime(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
}

/// UTC midnight of a calendar date, `None` if the date does not exist
pub fn ymd_to_millis(year: i32, month: u32, day: u32) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?).timestamp_millis())
}

/// First day of the timestamp's month, at UTC midnight
pub fn start_of_month(timestamp_ms: i64) -> Option<i64> {
    let dt = to_datetime(timestamp_ms)?;
    ymd_to_millis(dt.year(), dt.month(), 1)
}

/// Whole months from `start` to `end`, counting a partial last month as full
/// once `end`'s day-of-month reaches `start`'s. Never negative.
pub fn months_between_inclusive(start_ms: i64, end_ms: i64) -> Option<i64> {
    let start = to_datetime(start_ms)?;
    let end = to_datetime(end_ms)?;

    let mut months = (end.year() as i64 - start.year() as i64) * 12
        + (end.month() as i64 - start.month() as i64);
    if end.day() >= start.day() {
        months += 1;
    }

    Some(months.max(0))
}

/// Approximate Hijri → Gregorian year shift for D/M/Y values below 1700
pub fn hijri_to_gregorian_year(year: i32) -> i32 {
    year + 622 - year.div_euclid(33)
}

// ============================================================================
// RECOGNIZERS
// ============================================================================

/// Steps 1-3: magnitude decides between ms, seconds and spreadsheet days
fn numeric_epoch(n: f64) -> Option<(i64, DateEncoding)> {
    if !n.is_finite() {
        return None;
    }

    if n > 1e12 {
        Some((n.round() as i64, DateEncoding::UnixMillis))
    } else if (1e9..1e10).contains(&n) {
        Some(((n * 1000.0).round() as i64, DateEncoding::UnixSeconds))
    } else if (20_000.0..80_000.0).contains(&n) {
        let ms = (n - SPREADSHEET_UNIX_EPOCH) * MS_PER_DAY as f64;
        Some((ms.round() as i64, DateEncoding::SpreadsheetSerial))
    } else {
        None
    }
}

fn detect_numeric(n: f64) -> Option<(i64, DateEncoding)> {
    if let Some(hit) = numeric_epoch(n) {
        return Some(hit);
    }

    // 202105 / 20210506 stored as numbers
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
        return detect_compact(&format!("{}", n as u64));
    }

    None
}

fn detect_text(raw: &str) -> Option<(i64, DateEncoding)> {
    let s = clean_text(raw);
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(hit) = s.parse::<f64>().ok().and_then(numeric_epoch) {
            return Some(hit);
        }
    }

    if let Some(caps) = iso_re().captures(&s) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Some((dt.timestamp_millis(), DateEncoding::Iso));
        }

        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        let naive = with_time(date, &caps, 4)?;
        let offset_ms = match caps.get(7) {
            Some(zone) => zone_offset_ms(zone.as_str())?,
            None => 0,
        };
        return Some((
            Utc.from_utc_datetime(&naive).timestamp_millis() - offset_ms,
            DateEncoding::Iso,
        ));
    }

    if let Some(caps) = day_month_year_re().captures(&s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 1700 {
            year = hijri_to_gregorian_year(year);
        }
        let naive = with_time(NaiveDate::from_ymd_opt(year, month, day)?, &caps, 4)?;
        return Some((Utc.from_utc_datetime(&naive).timestamp_millis(), DateEncoding::DayMonthYear));
    }

    if let Some(caps) = month_year_re().captures(&s) {
        let month: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return ymd_to_millis(year, month, 1).map(|ts| (ts, DateEncoding::MonthYear));
    }

    if let Some(caps) = year_month_re().captures(&s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return ymd_to_millis(year, month, 1).map(|ts| (ts, DateEncoding::YearMonth));
    }

    if compact_re().is_match(&s) {
        return detect_compact(&s);
    }

    detect_textual(&s)
}

/// Step 8: `YYYYMM` → first of month, `YYYYMMDD` → exact day
fn detect_compact(digits: &str) -> Option<(i64, DateEncoding)> {
    let caps = compact_re().captures(digits)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    ymd_to_millis(year, month, day).map(|ts| (ts, DateEncoding::Compact))
}

/// Step 9: generic parse over a fixed list of textual layouts
fn detect_textual(s: &str) -> Option<(i64, DateEncoding)> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some((dt.timestamp_millis(), DateEncoding::Textual));
    }

    FALLBACK_DATE_FORMATS.iter().find_map(|fmt| {
        let date = NaiveDate::parse_from_str(s, fmt).ok()?;
        let naive = date.and_hms_opt(0, 0, 0)?;
        Some((Utc.from_utc_datetime(&naive).timestamp_millis(), DateEncoding::Textual))
    })
}

/// Attach the optional `H:M[:S]` captured from group `first` onward
fn with_time(date: NaiveDate, caps: &Captures<'_>, first: usize) -> Option<NaiveDateTime> {
    let part = |idx: usize| caps.get(idx).map_or(Some(0), |m| m.as_str().parse().ok());
    date.and_hms_opt(part(first)?, part(first + 1)?, part(first + 2)?)
}

/// `Z`, `+03:00`, `-0500` → offset east of UTC in milliseconds
fn zone_offset_ms(zone: &str) -> Option<i64> {
    if zone == "Z" {
        return Some(0);
    }
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits: String = zone.chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i64 = digits.get(..2)?.parse().ok()?;
    let minutes: i64 = digits.get(2..4)?.parse().ok()?;
    Some(sign * (hours * 60 + minutes) * 60_000)
}

/// Strip bidi marks, unify dashes, collapse whitespace
fn clean_text(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .filter(|c| *c != '\u{200f}' && *c != '\u{200e}')
        .map(|c| match c {
            '\u{05be}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
