// 🛣️ Mileage Series Builder - inspection/history rows → sorted odometer points
//
// Each record contributes at most one point. Records with no readable odometer
// or no plausible date are dropped silently; they never fail the batch.

use crate::dates::normalize_plausible_date;
use crate::fields::{is_bookkeeping_field, is_registration_field, locate, FieldRole};
use crate::numeric::{extract_number, extract_number_from_text};
use crate::record::RawRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One odometer reading at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MileagePoint {
    /// Epoch milliseconds, UTC, calendar year within 1990..=2100
    pub timestamp: i64,
    /// Odometer value, never negative
    pub odometer: f64,
}

/// Date roles in the order they are trusted for a mileage reading
const DATE_PRIORITY: [FieldRole; 3] = [
    FieldRole::MileageUpdateDate,
    FieldRole::InspectionDate,
    FieldRole::GenericDate,
];

fn unit_token_re() -> &'static Regex {
    static UNIT_RE: OnceLock<Regex> = OnceLock::new();
    UNIT_RE.get_or_init(|| Regex::new(r#"(?i)(ק"?.?מ|\bkm\b)"#).expect("valid unit regex"))
}

// ============================================================================
// BUILDER
// ============================================================================

/// Build the canonical mileage series from any number of history sources.
///
/// Sources are concatenated before sorting, so pass every dataset's records in
/// one iterator. The sort is stable: equal timestamps keep input order. No
/// per-period deduplication happens here.
pub fn build_mileage_series<'a, I>(records: I) -> Vec<MileagePoint>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut series: Vec<MileagePoint> = Vec::new();
    let mut skipped = 0usize;

    for (idx, record) in records.into_iter().enumerate() {
        match mileage_point(record) {
            Some(point) => series.push(point),
            None => {
                skipped += 1;
                tracing::debug!(record = idx, "no usable odometer/date pair, skipping");
            }
        }
    }

    series.sort_by_key(|p| p.timestamp);

    tracing::debug!(points = series.len(), skipped, "mileage series built");
    series
}

/// Extract a single point from a record, if it has both halves
pub fn mileage_point(record: &RawRecord) -> Option<MileagePoint> {
    let (odometer_field, odometer) = odometer_of(record)?;
    let timestamp = timestamp_of(record, odometer_field)?;

    Some(MileagePoint {
        timestamp,
        odometer,
    })
}

/// Odometer value plus the field it came from.
///
/// 1. a field whose name plays the odometer role
/// 2. any string value carrying a mileage unit (`ק"מ`, `km`)
fn odometer_of(record: &RawRecord) -> Option<(&str, f64)> {
    if let Some(field) = locate(record, FieldRole::OdometerReading) {
        if let Some(km) = extract_number(field.value) {
            return Some((field.name, km));
        }
    }

    record
        .scalars()
        .filter(|(name, _)| !is_bookkeeping_field(name))
        .find_map(|(name, value)| {
            let text = value.as_text()?;
            if !unit_token_re().is_match(text) {
                return None;
            }
            extract_number_from_text(text).map(|km| (name, km))
        })
}

/// Timestamp for a mileage reading.
///
/// Mileage-update date, then inspection date, then any date field; an absent
/// or implausible candidate falls through. Last resort: the latest plausible
/// date among all remaining values, skipping registration fields, CKAN
/// bookkeeping and the odometer field itself.
fn timestamp_of(record: &RawRecord, odometer_field: &str) -> Option<i64> {
    for role in DATE_PRIORITY {
        if let Some(field) = locate(record, role) {
            if let Some(ts) = normalize_plausible_date(field.value) {
                return Some(ts);
            }
            tracing::debug!(field = field.name, role = role.code(), "implausible date, falling through");
        }
    }

    record
        .scalars()
        .filter(|(name, _)| {
            *name != odometer_field && !is_registration_field(name) && !is_bookkeeping_field(name)
        })
        .filter_map(|(_, value)| normalize_plausible_date(value))
        .max()
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

    #[test]
    fn test_named_fields() {
        let r = rec(json!({"mispar_rechev": 1234567, "kilometraz": "143,509", "date": "06/05/2021"}));
        assert_eq!(
            mileage_point(&r),
            Some(MileagePoint { timestamp: ymd(2021, 5, 6), odometer: 143509.0 })
        );
    }

    #[test]
    fn test_unit_token_in_value() {
        let r = rec(json!({"teur": "נסועה אחרונה 98,000 ק\"מ", "taarich": "2020-03-01"}));
        assert_eq!(
            mileage_point(&r),
            Some(MileagePoint { timestamp: ymd(2020, 3, 1), odometer: 98000.0 })
        );
    }

    #[test]
    fn test_unparseable_odometer_field_falls_back_to_value_scan() {
        let r = rec(json!({"km": "לא ידוע", "heara": "120000 km", "date": "2020-03-01"}));
        assert_eq!(mileage_point(&r).map(|p| p.odometer), Some(120000.0));
    }

    #[test]
    fn test_no_odometer_is_skipped() {
        let r = rec(json!({"date": "2020-03-01", "tozeret": "KIA"}));
        assert_eq!(mileage_point(&r), None);
    }

    #[test]
    fn test_update_date_beats_inspection_date() {
        let r = rec(json!({
            "mivchan_acharon_dt": "2021-01-10",
            "taarich_idkun_km": "2020-06-01",
            "kilometraz": 50000
        }));
        assert_eq!(mileage_point(&r).map(|p| p.timestamp), Some(ymd(2020, 6, 1)));
    }

    #[test]
    fn test_implausible_update_date_falls_through() {
        let r = rec(json!({
            "taarich_idkun_km": "01/01/2201",
            "mivchan_acharon_dt": "2021-01-10",
            "kilometraz": 50000
        }));
        assert_eq!(mileage_point(&r).map(|p| p.timestamp), Some(ymd(2021, 1, 10)));
    }

    #[test]
    fn test_registration_date_never_used() {
        let r = rec(json!({"moed_aliya_lakvish": "2015-01-01", "kilometraz": 50000}));
        assert_eq!(mileage_point(&r), None);
    }

    #[test]
    fn test_first_registration_column_never_used() {
        let r = rec(json!({"kilometer_test_aharon": 98000, "rishum_rishon_dt": "2015-03-01"}));
        assert_eq!(mileage_point(&r), None);

        let r = rec(json!({
            "rishum_rishon_dt": "2015-03-01",
            "kilometer_test_aharon": 98000,
            "mivchan_acharon_dt": "2021-05-06"
        }));
        assert_eq!(mileage_point(&r).map(|p| p.timestamp), Some(ymd(2021, 5, 6)));
    }

    #[test]
    fn test_fallback_takes_latest_plausible_value() {
        let r = rec(json!({
            "_id": 33000,
            "kilometraz": 44000,
            "shana": "2019/04",
            "other": "202106",
            "first_seen": "2023-01-01"
        }));
        // _id and the odometer would read as spreadsheet days; registration field excluded
        assert_eq!(mileage_point(&r).map(|p| p.timestamp), Some(ymd(2021, 6, 1)));
    }

    #[test]
    fn test_series_is_sorted_across_sources() {
        let source_a = vec![
            rec(json!({"km": 300, "date": "2022-01-01"})),
            rec(json!({"km": 100, "date": "2020-01-01"})),
        ];
        let source_b = vec![rec(json!({"km": 200, "date": "2021-01-01"}))];

        let series = build_mileage_series(source_a.iter().chain(source_b.iter()));
        let kms: Vec<f64> = series.iter().map(|p| p.odometer).collect();
        assert_eq!(kms, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let records = vec![
            rec(json!({"km": 10, "date": "2020-01-01"})),
            rec(json!({"km": 20, "date": "2020-01-01"})),
        ];
        let series = build_mileage_series(&records);
        assert_eq!(series[0].odometer, 10.0);
        assert_eq!(series[1].odometer, 20.0);
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<RawRecord> = Vec::new();
        assert!(build_mileage_series(&records).is_empty());
    }

    proptest! {
        #[test]
        fn property_series_is_chronological(
            rows in proptest::collection::vec((1990i32..2100, 1u32..13, 1u32..29, 0u32..500_000), 0..40)
        ) {
            let records: Vec<RawRecord> = rows
                .iter()
                .map(|(y, m, d, km)| rec(json!({
                    "kilometraz": km.to_string(),
                    "date": format!("{:02}/{:02}/{}", d, m, y),
                })))
                .collect();

            let series = build_mileage_series(&records);
            prop_assert_eq!(series.len(), records.len());
            for pair in series.windows(2) {
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
            for point in &series {
                prop_assert!(point.odometer >= 0.0);
            }
        }
    }
}
