// 🔑 Ownership Interval Reconstructor
//
// Ownership-change rows → a total, gap-free partition of time:
//   [e0, e1 - 1 day] [e1, e2 - 1 day] ... [eN, open)
// The last interval is the current owner.

use crate::dates::{
    months_between_inclusive, normalize_plausible_date, start_of_month, MS_PER_DAY,
};
use crate::fields::{locate, FieldRole};
use crate::record::{RawRecord, Scalar};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// OWNERSHIP CATEGORY
// ============================================================================

/// Canonical ownership type. Text that matches no keyword is its own category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OwnershipCategory {
    Private,
    LeasingRental,
    Dealer,
    Company,
    Importer,
    Government,
    Taxi,
    Other(String),
}

impl OwnershipCategory {
    /// Stable code used in API output
    pub fn code(&self) -> &str {
        match self {
            OwnershipCategory::Private => "private",
            OwnershipCategory::LeasingRental => "leasing_rental",
            OwnershipCategory::Dealer => "dealer",
            OwnershipCategory::Company => "company",
            OwnershipCategory::Importer => "importer",
            OwnershipCategory::Government => "government",
            OwnershipCategory::Taxi => "taxi",
            OwnershipCategory::Other(text) => text,
        }
    }

    /// Label as the Israeli registry writes it
    pub fn label_he(&self) -> &str {
        match self {
            OwnershipCategory::Private => "פרטי",
            OwnershipCategory::LeasingRental => "ליסינג / השכרה",
            OwnershipCategory::Dealer => "סוחר",
            OwnershipCategory::Company => "חברה",
            OwnershipCategory::Importer => "יבואן",
            OwnershipCategory::Government => "ממשלתי",
            OwnershipCategory::Taxi => "מונית",
            OwnershipCategory::Other(text) => text,
        }
    }
}

impl From<String> for OwnershipCategory {
    fn from(code: String) -> Self {
        match code.as_str() {
            "private" => OwnershipCategory::Private,
            "leasing_rental" => OwnershipCategory::LeasingRental,
            "dealer" => OwnershipCategory::Dealer,
            "company" => OwnershipCategory::Company,
            "importer" => OwnershipCategory::Importer,
            "government" => OwnershipCategory::Government,
            "taxi" => OwnershipCategory::Taxi,
            _ => OwnershipCategory::Other(code),
        }
    }
}

impl From<OwnershipCategory> for String {
    fn from(category: OwnershipCategory) -> Self {
        category.code().to_string()
    }
}

/// Keyword table; private is checked before the institutional patterns
fn category_patterns() -> &'static [(Regex, OwnershipCategory)] {
    static PATTERNS: OnceLock<Vec<(Regex, OwnershipCategory)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(פרטי|private)", OwnershipCategory::Private),
            (r"(ליסינג|השכר|leas|\brent)", OwnershipCategory::LeasingRental),
            (r"(סוחר|סוכנות|dealer|trade)", OwnershipCategory::Dealer),
            (r"(חברה|תאגיד|company|corporate)", OwnershipCategory::Company),
            (r"(יבואן|importer)", OwnershipCategory::Importer),
            (r"(ממשל|ציבורי|צבא|משטרה|gov)", OwnershipCategory::Government),
            (r"(מונית|taxi)", OwnershipCategory::Taxi),
        ]
        .into_iter()
        .map(|(pattern, category)| {
            let re = Regex::new(&format!("(?i){}", pattern)).expect("valid category regex");
            (re, category)
        })
        .collect()
    })
}

/// Map free text onto the canonical set; unmatched text passes through
pub fn normalize_ownership_type(raw: &str) -> OwnershipCategory {
    let text = raw.trim();
    category_patterns()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, category)| category.clone())
        .unwrap_or_else(|| OwnershipCategory::Other(text.to_string()))
}

/// Registry numeric ownership codes
pub fn category_for_code(code: u32) -> Option<OwnershipCategory> {
    match code {
        1 => Some(OwnershipCategory::Private),
        2 => Some(OwnershipCategory::Company),
        3 => Some(OwnershipCategory::LeasingRental),
        4 => Some(OwnershipCategory::Taxi),
        5 => Some(OwnershipCategory::Other("השכרה".to_string())),
        6 => Some(OwnershipCategory::Dealer),
        7 => Some(OwnershipCategory::Government),
        _ => None,
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// A change of ownership, before intervals are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEvent {
    pub timestamp: i64,
    pub owner_type_raw: String,
    /// Remark column, empty when absent
    pub extra: String,
}

fn keyword_scan_re() -> &'static Regex {
    static SCAN_RE: OnceLock<Regex> = OnceLock::new();
    SCAN_RE.get_or_init(|| {
        Regex::new(
            r"(?i)(פרטי|סוחר|ליסינג|השכרה|חברה|ממשלתי|ציבורי|מונית|יבואן|private|company|leasing|rental|dealer|taxi|importer|government)",
        )
        .expect("valid ownership keyword regex")
    })
}

/// Turn one record into an event; `None` when it has no plausible date
pub fn ownership_event(record: &RawRecord) -> Option<OwnershipEvent> {
    let timestamp = [FieldRole::OwnershipDate, FieldRole::GenericDate]
        .into_iter()
        .filter_map(|role| locate(record, role))
        .find_map(|field| normalize_plausible_date(field.value))?;

    Some(OwnershipEvent {
        timestamp,
        owner_type_raw: owner_type_of(record),
        extra: locate(record, FieldRole::OwnershipRemark)
            .map(|f| f.value.to_display())
            .unwrap_or_default(),
    })
}

/// Raw ownership text: typed field (numeric codes decoded), else a keyword
/// found in any string value, else empty.
fn owner_type_of(record: &RawRecord) -> String {
    if let Some(field) = locate(record, FieldRole::OwnershipType) {
        return match owner_code(field.value) {
            Some(code) => category_for_code(code)
                .map(|c| c.label_he().to_string())
                .unwrap_or_else(|| code.to_string()),
            None => field.value.to_display(),
        };
    }

    record
        .scalars()
        .filter_map(|(_, value)| value.as_text())
        .find(|text| keyword_scan_re().is_match(text))
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn owner_code(value: Scalar<'_>) -> Option<u32> {
    match value {
        Scalar::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Some(n as u32),
        Scalar::Text(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Events from all records, sorted ascending (stable)
pub fn build_ownership_events<'a, I>(records: I) -> Vec<OwnershipEvent>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut events: Vec<OwnershipEvent> = records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let event = ownership_event(record);
            if event.is_none() {
                tracing::debug!(record = idx, "ownership record without plausible date, skipping");
            }
            event
        })
        .collect();

    events.sort_by_key(|e| e.timestamp);
    events
}

// ============================================================================
// INTERVALS
// ============================================================================

/// One span of a single ownership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipInterval {
    /// 1-based ownership ordinal ("hand")
    pub hand: usize,
    pub type_raw: String,
    pub type_norm: OwnershipCategory,
    pub start: i64,
    /// `None` for the current ownership
    pub end: Option<i64>,
    pub duration_months: Option<i64>,
    pub is_current: bool,
    pub extra: String,
}

/// Build the partition from sorted events.
///
/// Resolved from the last event backwards: each `end` is the next interval's
/// final start minus one day. When that lands before this interval's start
/// (same-period or inverted events), the start snaps to the first day of the
/// end's month instead of dropping the interval. The open interval's duration
/// is measured against `now_ms`; its `end` stays `None`.
pub fn build_intervals(events: &[OwnershipEvent], now_ms: i64) -> Vec<OwnershipInterval> {
    let mut rows: Vec<OwnershipInterval> = Vec::with_capacity(events.len());
    let mut next_start: Option<i64> = None;

    for (back, event) in events.iter().rev().enumerate() {
        let end = next_start.map(|s| s - MS_PER_DAY);

        let mut start = event.timestamp;
        if let Some(end) = end {
            if end < start {
                start = start_of_month(end).unwrap_or(end);
                tracing::debug!(original = event.timestamp, snapped = start, "inverted ownership interval, snapping start");
            }
        }

        rows.push(OwnershipInterval {
            hand: events.len() - back,
            type_raw: event.owner_type_raw.clone(),
            type_norm: normalize_ownership_type(&event.owner_type_raw),
            start,
            end,
            duration_months: months_between_inclusive(start, end.unwrap_or(now_ms)),
            is_current: end.is_none(),
            extra: event.extra.clone(),
        });

        next_start = Some(start);
    }

    rows.reverse();
    rows
}

/// Records → events → intervals
pub fn reconstruct_ownership<'a, I>(records: I, now_ms: i64) -> Vec<OwnershipInterval>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let events = build_ownership_events(records);
    build_intervals(&events, now_ms)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::ymd_to_millis;
    use proptest::prelude::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> i64 {
        ymd_to_millis(y, m, d).unwrap()
    }

    fn rec(value: serde_json::Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    fn event(ts: i64, raw: &str) -> OwnershipEvent {
        OwnershipEvent {
            timestamp: ts,
            owner_type_raw: raw.to_string(),
            extra: String::new(),
        }
    }

    #[test]
    fn test_normalize_keywords() {
        assert_eq!(normalize_ownership_type("פרטי"), OwnershipCategory::Private);
        assert_eq!(normalize_ownership_type("בעלים פרטי"), OwnershipCategory::Private);
        assert_eq!(normalize_ownership_type("ליסינג"), OwnershipCategory::LeasingRental);
        assert_eq!(normalize_ownership_type("חברת השכרה"), OwnershipCategory::LeasingRental);
        assert_eq!(normalize_ownership_type("Dealer"), OwnershipCategory::Dealer);
        assert_eq!(normalize_ownership_type("חברה"), OwnershipCategory::Company);
        assert_eq!(normalize_ownership_type("יבואן"), OwnershipCategory::Importer);
        assert_eq!(normalize_ownership_type("משטרה"), OwnershipCategory::Government);
        assert_eq!(normalize_ownership_type("מונית"), OwnershipCategory::Taxi);
    }

    #[test]
    fn test_unmatched_text_passes_through() {
        assert_eq!(
            normalize_ownership_type(" עמותה "),
            OwnershipCategory::Other("עמותה".to_string())
        );
        assert_eq!(normalize_ownership_type("").code(), "");
    }

    #[test]
    fn test_category_serializes_as_code() {
        assert_eq!(serde_json::to_value(OwnershipCategory::LeasingRental).unwrap(), json!("leasing_rental"));
        assert_eq!(serde_json::to_value(OwnershipCategory::Other("x".into())).unwrap(), json!("x"));
        let back: OwnershipCategory = serde_json::from_value(json!("dealer")).unwrap();
        assert_eq!(back, OwnershipCategory::Dealer);
    }

    #[test]
    fn test_numeric_codes() {
        let r = rec(json!({"baalut_dt": "202001", "baalut": 2}));
        assert_eq!(ownership_event(&r).unwrap().owner_type_raw, "חברה");

        let r = rec(json!({"baalut_dt": "202001", "baalut": "5"}));
        let raw = ownership_event(&r).unwrap().owner_type_raw;
        assert_eq!(normalize_ownership_type(&raw), OwnershipCategory::LeasingRental);

        let r = rec(json!({"baalut_dt": "202001", "baalut": 42}));
        assert_eq!(ownership_event(&r).unwrap().owner_type_raw, "42");
    }

    #[test]
    fn test_keyword_scan_fallback() {
        let r = rec(json!({"baalut_dt": "2020-01-01", "teur": " ליסינג "}));
        assert_eq!(ownership_event(&r).unwrap().owner_type_raw, "ליסינג");

        let r = rec(json!({"baalut_dt": "2020-01-01", "teur": "אחר"}));
        assert_eq!(ownership_event(&r).unwrap().owner_type_raw, "");
    }

    #[test]
    fn test_remark_is_carried() {
        let r = rec(json!({"baalut_dt": "2020-01-01", "baalut": "פרטי", "description": " יד שנייה "}));
        let rows = reconstruct_ownership(&[r], ymd(2021, 1, 1));
        assert_eq!(rows[0].extra, "יד שנייה");
        assert_eq!(rows[0].hand, 1);
    }

    #[test]
    fn test_event_without_plausible_date_is_skipped() {
        assert_eq!(ownership_event(&rec(json!({"baalut": "פרטי"}))), None);
        assert_eq!(ownership_event(&rec(json!({"baalut_dt": "1890-01-01", "baalut": "פרטי"}))), None);
    }

    #[test]
    fn test_alias_preferred_over_generic_date() {
        let r = rec(json!({"date_loaded": "2024-01-01", "baalut_dt": "2019-07-01", "baalut": "פרטי"}));
        assert_eq!(ownership_event(&r).unwrap().timestamp, ymd(2019, 7, 1));
    }

    #[test]
    fn test_pairwise_intervals() {
        let events = vec![
            event(ymd(2015, 3, 10), "ליסינג"),
            event(ymd(2018, 6, 1), "פרטי"),
        ];
        let now = ymd(2020, 6, 1);
        let rows = build_intervals(&events, now);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start, ymd(2015, 3, 10));
        assert_eq!(rows[0].end, Some(ymd(2018, 5, 31)));
        assert!(!rows[0].is_current);
        // 2015-03-10 → 2018-05-31: 38 months + partial
        assert_eq!(rows[0].duration_months, Some(39));
        assert_eq!(rows[0].type_norm, OwnershipCategory::LeasingRental);

        assert_eq!((rows[0].hand, rows[1].hand), (1, 2));
        assert_eq!(rows[1].start, ymd(2018, 6, 1));
        assert_eq!(rows[1].end, None);
        assert!(rows[1].is_current);
        assert_eq!(rows[1].duration_months, Some(25));
    }

    #[test]
    fn test_single_event_is_current() {
        let now = ymd(2021, 1, 1);
        let rows = reconstruct_ownership(&[rec(json!({"baalut_dt": "2020-01-01", "baalut": 1}))], now);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].end, None);
        assert!(rows[0].is_current);
        assert_eq!(rows[0].duration_months, Some(13));
        assert_eq!(rows[0].type_raw, "פרטי");
        assert_eq!(rows[0].type_norm, OwnershipCategory::Private);
    }

    #[test]
    fn test_same_day_events_snap_start() {
        let day = ymd(2020, 5, 15);
        let events = vec![event(day, "סוחר"), event(day, "פרטי")];
        let rows = build_intervals(&events, ymd(2021, 1, 1));

        assert_eq!(rows[0].end, Some(ymd(2020, 5, 14)));
        assert_eq!(rows[0].start, ymd(2020, 5, 1));
        assert_eq!(rows[0].end.unwrap() + MS_PER_DAY, rows[1].start);
    }

    #[test]
    fn test_snap_cascades_backwards() {
        // three changes on the first of the month: each earlier row snaps a month back
        let day = ymd(2020, 5, 1);
        let events = vec![event(day, "a"), event(day, "b"), event(day, "c")];
        let rows = build_intervals(&events, ymd(2021, 1, 1));

        assert_eq!(rows[2].start, day);
        assert_eq!(rows[1].end, Some(ymd(2020, 4, 30)));
        assert_eq!(rows[1].start, ymd(2020, 4, 1));
        assert_eq!(rows[0].end, Some(ymd(2020, 3, 31)));
        assert_eq!(rows[0].start, ymd(2020, 3, 1));
    }

    #[test]
    fn test_records_sorted_before_pairing() {
        let records = vec![
            rec(json!({"baalut_dt": "2019-01-01", "baalut": "פרטי"})),
            rec(json!({"baalut_dt": "2012-01-01", "baalut": "ליסינג"})),
        ];
        let rows = reconstruct_ownership(&records, ymd(2020, 1, 1));
        assert_eq!(rows[0].type_raw, "ליסינג");
        assert_eq!(rows[1].type_raw, "פרטי");
        assert!(rows[1].is_current);
    }

    #[test]
    fn test_empty_events() {
        assert!(build_intervals(&[], ymd(2020, 1, 1)).is_empty());
    }

    #[test]
    fn test_future_current_interval_clamps_duration() {
        let rows = build_intervals(&[event(ymd(2030, 1, 1), "פרטי")], ymd(2020, 1, 1));
        assert_eq!(rows[0].duration_months, Some(0));
    }

    proptest! {
        #[test]
        fn property_intervals_partition_time(
            offsets in proptest::collection::vec(0i64..12_000, 1..30),
        ) {
            // day offsets from 1995-01-01, duplicates included on purpose
            let base = ymd(1995, 1, 1);
            let mut stamps = offsets;
            stamps.sort();
            let events: Vec<OwnershipEvent> = stamps
                .iter()
                .map(|d| event(base + d * MS_PER_DAY, "פרטי"))
                .collect();

            let rows = build_intervals(&events, ymd(2030, 1, 1));
            prop_assert_eq!(rows.len(), events.len());

            for pair in rows.windows(2) {
                prop_assert_eq!(pair[0].end.map(|e| e + MS_PER_DAY), Some(pair[1].start));
                prop_assert!(pair[0].start <= pair[0].end.unwrap_or(i64::MAX));
                prop_assert!(!pair[0].is_current);
            }

            let current: Vec<&OwnershipInterval> = rows.iter().filter(|r| r.is_current).collect();
            prop_assert_eq!(current.len(), 1);
            prop_assert_eq!(rows.last().map(|r| r.end), Some(None));
            prop_assert!(rows.iter().all(|r| r.duration_months.unwrap_or(-1) >= 0));
        }
    }
}
