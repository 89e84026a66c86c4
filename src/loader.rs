// 📂 Record Loader - local exports of the open-data datasets
//
// The CLI summarizes files instead of calling the datastore. Accepted shapes:
//   *.json  [ {...}, ... ] | { "records": [...] } | { "result": { "records": [...] } }
//   *.csv   header row = field names, one record per line

use crate::record::RawRecord;
use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// On-disk format of a record file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Csv,
}

impl RecordFormat {
    pub fn name(&self) -> &str {
        match self {
            RecordFormat::Json => "JSON",
            RecordFormat::Csv => "CSV",
        }
    }
}

/// Detect the format from the file extension
pub fn detect_format(file_path: &Path) -> Result<RecordFormat> {
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Ok(RecordFormat::Json),
        "csv" => Ok(RecordFormat::Csv),
        _ => Err(anyhow::anyhow!(
            "Unsupported record file (expected .json or .csv): {}",
            file_path.display()
        )),
    }
}

/// Load every record from one file
pub fn load_records(file_path: &Path) -> Result<Vec<RawRecord>> {
    let format = detect_format(file_path)?;
    let records = match format {
        RecordFormat::Json => load_json(file_path)?,
        RecordFormat::Csv => load_csv(file_path)?,
    };

    tracing::debug!(
        file = %file_path.display(),
        format = format.name(),
        records = records.len(),
        "loaded record file"
    );
    Ok(records)
}

/// Load several files and concatenate them in argument order
pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for path in paths {
        records.extend(load_records(path.as_ref())?);
    }
    Ok(records)
}

// ============================================================================
// JSON
// ============================================================================

fn load_json(file_path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let json: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", file_path.display()))?;

    records_from_json(json).with_context(|| format!("No record list in {}", file_path.display()))
}

/// Pull the record list out of any of the accepted JSON shapes.
/// Array items that are not objects are dropped.
pub fn records_from_json(json: Value) -> Result<Vec<RawRecord>> {
    let items = match json {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let list = match map.remove("result") {
                Some(Value::Object(mut result)) => result.remove("records"),
                _ => map.remove("records"),
            };
            match list {
                Some(Value::Array(items)) => items,
                _ => anyhow::bail!("JSON object has no 'records' array"),
            }
        }
        _ => anyhow::bail!("JSON root must be an array or an object"),
    };

    Ok(items.into_iter().filter_map(RawRecord::from_value).collect())
}

// ============================================================================
// CSV
// ============================================================================

fn load_csv(file_path: &Path) -> Result<Vec<RawRecord>> {
    use csv::ReaderBuilder;

    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header in {}", file_path.display()))?
        .clone();

    let mut records = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let row = result.with_context(|| {
            format!("Failed to parse CSV line {} in {}", line_num + 2, file_path.display())
        })?;

        let mut fields = Map::new();
        for (name, cell) in headers.iter().zip(row.iter()) {
            // strip a UTF-8 BOM left on the first header by spreadsheet exports
            let name = name.trim_start_matches('\u{feff}').trim();
            fields.insert(name.to_string(), csv_cell(cell));
        }
        records.push(RawRecord::from_map(fields));
    }

    Ok(records)
}

/// Empty → null, plain decimal → number, anything else → text.
///
/// Leading-zero digit runs stay text (plate numbers, zero-padded codes).
fn csv_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if is_plain_decimal(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }

    Value::String(cell.to_string())
}

fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };

    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let leading_zero = int.len() > 1 && int.starts_with('0');

    all_digits(int) && !leading_zero && frac.map_or(true, all_digits)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("history.json")).unwrap(), RecordFormat::Json);
        assert_eq!(detect_format(Path::new("Ownership.CSV")).unwrap(), RecordFormat::Csv);
        assert!(detect_format(Path::new("history.xlsx")).is_err());
        assert!(detect_format(Path::new("history")).is_err());
    }

    #[test]
    fn test_json_shapes() {
        let array = records_from_json(json!([{"a": 1}, 5, {"b": 2}])).unwrap();
        assert_eq!(array.len(), 2);

        let wrapped = records_from_json(json!({"records": [{"a": 1}]})).unwrap();
        assert_eq!(wrapped.len(), 1);

        let ckan = records_from_json(json!({
            "success": true,
            "result": {"total": 1, "records": [{"mispar_rechev": 1234567}]}
        }))
        .unwrap();
        assert_eq!(ckan[0].get("mispar_rechev"), Some(&json!(1234567)));

        assert!(records_from_json(json!({"data": []})).is_err());
        assert!(records_from_json(json!("nope")).is_err());
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "mileage.json",
            r#"{"result": {"records": [{"kilometraz": 120000, "mivchan_acharon_dt": "2021-03-01"}]}}"#,
        );

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("kilometraz"), Some(&json!(120000)));
    }

    #[test]
    fn test_load_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "ownership.csv",
            "\u{feff}mispar_rechev,baalut_dt,baalut,_id\n01234567,201905,פרטי,\n7654321,2016-01,ליסינג,2\n",
        );

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);

        let names: Vec<&str> = records[0].field_names().collect();
        assert_eq!(names, vec!["mispar_rechev", "baalut_dt", "baalut", "_id"]);

        assert_eq!(records[0].get("mispar_rechev"), Some(&json!("01234567")));
        assert_eq!(records[0].get("baalut_dt"), Some(&json!(201905)));
        assert_eq!(records[0].get("_id"), Some(&Value::Null));
        assert_eq!(records[1].get("baalut_dt"), Some(&json!("2016-01")));
        assert_eq!(records[1].get("baalut"), Some(&json!("ליסינג")));
    }

    #[test]
    fn test_load_all_concatenates() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.json", r#"[{"x": 1}]"#);
        let b = write_file(&dir, "b.csv", "x\n2\n3\n");

        let records = load_all(&[a, b]).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].get("x"), Some(&json!(3)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_records(Path::new("/nonexistent/history.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/history.json"));
    }

    #[test]
    fn test_csv_cells() {
        assert_eq!(csv_cell(""), Value::Null);
        assert_eq!(csv_cell("  "), Value::Null);
        assert_eq!(csv_cell("0"), json!(0));
        assert_eq!(csv_cell("-12"), json!(-12));
        assert_eq!(csv_cell("12.5"), json!(12.5));
        assert_eq!(csv_cell("007"), json!("007"));
        assert_eq!(csv_cell("1,000"), json!("1,000"));
        assert_eq!(csv_cell("inf"), json!("inf"));
        assert_eq!(csv_cell("12."), json!("12."));
    }
}
