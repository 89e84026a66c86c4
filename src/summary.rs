// 📊 Summary Aggregator - the only shape presentation ever sees
//
// Mileage series + ownership intervals → HistorySummary. Presentation layers
// consume this as-is and never re-derive it from raw records.

use crate::config::EngineConfig;
use crate::flags::{collect_flags, VehicleFlags};
use crate::mileage::{build_mileage_series, MileagePoint};
use crate::ownership::{reconstruct_ownership, OwnershipInterval};
use crate::record::RawRecord;
use serde::{Deserialize, Serialize};

/// Final per-vehicle history view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub last_km: Option<f64>,
    pub last_km_date: Option<i64>,
    pub max_km: Option<f64>,
    pub max_km_date: Option<i64>,
    pub ownership_count: usize,
    pub ownership_rows: Vec<OwnershipInterval>,
    pub mileage_count: usize,
    pub flags: VehicleFlags,
    /// Full sorted series, only when `EngineConfig::debug` is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<MileagePoint>>,
}

/// Reduce an already-sorted series and the ownership partition.
///
/// Last reading = chronologically last point. Max reading = greatest
/// odometer; on ties the earliest point wins.
pub fn aggregate(
    series: &[MileagePoint],
    ownership_rows: Vec<OwnershipInterval>,
    flags: VehicleFlags,
    config: &EngineConfig,
) -> HistorySummary {
    let last = series.last();

    let mut max: Option<&MileagePoint> = None;
    for point in series {
        if max.map_or(true, |m| point.odometer > m.odometer) {
            max = Some(point);
        }
    }

    HistorySummary {
        last_km: last.map(|p| p.odometer),
        last_km_date: last.map(|p| p.timestamp),
        max_km: max.map(|p| p.odometer),
        max_km_date: max.map(|p| p.timestamp),
        ownership_count: ownership_rows.len(),
        ownership_rows,
        mileage_count: series.len(),
        flags,
        series: config.debug.then(|| series.to_vec()),
    }
}

/// Engine entry point: raw mileage records (all sources, concatenated) and
/// raw ownership records in, summary out. Never fails.
pub fn summarize_history(
    mileage_records: &[RawRecord],
    ownership_records: &[RawRecord],
    config: &EngineConfig,
) -> HistorySummary {
    let series = build_mileage_series(mileage_records);
    let flags = collect_flags(mileage_records);
    let rows = reconstruct_ownership(ownership_records, config.now_ms());

    tracing::info!(
        mileage_records = mileage_records.len(),
        points = series.len(),
        ownership_records = ownership_records.len(),
        intervals = rows.len(),
        "history summarized"
    );

    aggregate(&series, rows, flags, config)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::ymd_to_millis;
    use crate::ownership::OwnershipCategory;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> i64 {
        ymd_to_millis(y, m, d).unwrap()
    }

    fn point(ts: i64, km: f64) -> MileagePoint {
        MileagePoint {
            timestamp: ts,
            odometer: km,
        }
    }

    fn config_at(y: i32, m: u32, d: u32) -> EngineConfig {
        EngineConfig::default().with_reference_time(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_max_tie_prefers_earliest() {
        let (t1, t2, t3, t4) = (ymd(2018, 1, 1), ymd(2019, 1, 1), ymd(2020, 1, 1), ymd(2021, 1, 1));
        let series = vec![point(t1, 100.0), point(t2, 200.0), point(t3, 200.0), point(t4, 150.0)];

        let summary = aggregate(&series, Vec::new(), VehicleFlags::default(), &EngineConfig::default());
        assert_eq!(summary.max_km, Some(200.0));
        assert_eq!(summary.max_km_date, Some(t2));
        assert_eq!(summary.last_km, Some(150.0));
        assert_eq!(summary.last_km_date, Some(t4));
        assert_eq!(summary.mileage_count, 4);
        assert_eq!(summary.series, None);
    }

    #[test]
    fn test_empty_inputs() {
        let summary = summarize_history(&[], &[], &EngineConfig::default());
        assert_eq!(summary.last_km, None);
        assert_eq!(summary.last_km_date, None);
        assert_eq!(summary.max_km, None);
        assert_eq!(summary.max_km_date, None);
        assert_eq!(summary.ownership_count, 0);
        assert!(summary.ownership_rows.is_empty());
    }

    #[test]
    fn test_debug_includes_series() {
        let series = vec![point(ymd(2020, 1, 1), 10.0)];
        let summary = aggregate(
            &series,
            Vec::new(),
            VehicleFlags::default(),
            &EngineConfig::default().with_debug(true),
        );
        assert_eq!(summary.series, Some(series));
    }

    #[test]
    fn test_end_to_end_summary() {
        let mileage = vec![
            RawRecord::from_value(json!({"mispar_rechev": 1234567, "kilometraz": "85,000", "mivchan_acharon_dt": "2021-03-01"})).unwrap(),
            RawRecord::from_value(json!({"mispar_rechev": 1234567, "kilometraz": "40,000", "mivchan_acharon_dt": "2018-03-01"})).unwrap(),
            RawRecord::from_value(json!({"mispar_rechev": 1234567, "kilometraz": "garbage", "mivchan_acharon_dt": "2019-03-01"})).unwrap(),
        ];
        let ownership = vec![
            RawRecord::from_value(json!({"mispar_rechev": 1234567, "baalut_dt": 201601, "baalut": "ליסינג"})).unwrap(),
            RawRecord::from_value(json!({"mispar_rechev": 1234567, "baalut_dt": 201905, "baalut": "פרטי"})).unwrap(),
        ];

        let summary = summarize_history(&mileage, &ownership, &config_at(2022, 1, 1));

        assert_eq!(summary.mileage_count, 2);
        assert_eq!(summary.last_km, Some(85000.0));
        assert_eq!(summary.last_km_date, Some(ymd(2021, 3, 1)));
        assert_eq!(summary.max_km_date, Some(ymd(2021, 3, 1)));

        assert_eq!(summary.ownership_count, 2);
        assert_eq!(summary.ownership_rows[0].type_norm, OwnershipCategory::LeasingRental);
        assert_eq!(summary.ownership_rows[0].end, Some(ymd(2019, 4, 30)));
        assert!(summary.ownership_rows[1].is_current);
    }

    #[test]
    fn test_json_shape() {
        let summary = summarize_history(
            &[],
            &[RawRecord::from_value(json!({"baalut_dt": "2020-01-01", "baalut": "פרטי"})).unwrap()],
            &config_at(2021, 1, 1),
        );
        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["last_km"], json!(null));
        assert_eq!(value["ownership_count"], json!(1));
        let row = &value["ownership_rows"][0];
        assert_eq!(row["typeRaw"], json!("פרטי"));
        assert_eq!(row["typeNorm"], json!("private"));
        assert_eq!(row["start"], json!(ymd(2020, 1, 1)));
        assert_eq!(row["end"], json!(null));
        assert_eq!(row["durationMonths"], json!(13));
        assert_eq!(row["isCurrent"], json!(true));
        assert!(value.get("series").is_none());
    }
}
