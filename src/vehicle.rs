// 🚙 Vehicle Profile - one registry row → normalized vehicle details
//
// Registry columns are picked by exact alias first, then by a name pattern,
// from a rule table like the history field roles. Power is read directly in
// hp or converted from kW / PS. Missing engine size or power can be filled
// from a model-spec dataset row.

use crate::dates::normalize_plausible_date;
use crate::numeric::extract_number;
use crate::query::DatastoreQuery;
use crate::record::{RawRecord, Scalar};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// Registry attributes a vehicle row can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleField {
    Plate,
    Make,
    Model,
    Year,
    Trim,
    EngineCc,
    HorsepowerHp,
    PowerKw,
    PowerPs,
    Gearbox,
    Fuel,
    Color,
    Ownership,
    FirstRegistration,
    LastTestDate,
    NextTestDate,
    ModelCode,
    ManufacturerCode,
    Chassis,
    DoorCount,
    Seating,
    KerbWeight,
    Remarks,
    TireFront,
    TireRear,
    Country,
    Drive,
}

impl VehicleField {
    pub fn code(&self) -> &str {
        match self {
            VehicleField::Plate => "plate",
            VehicleField::Make => "make",
            VehicleField::Model => "model",
            VehicleField::Year => "year",
            VehicleField::Trim => "trim",
            VehicleField::EngineCc => "engine_cc",
            VehicleField::HorsepowerHp => "horsepower",
            VehicleField::PowerKw => "power_kw",
            VehicleField::PowerPs => "power_ps",
            VehicleField::Gearbox => "gearbox",
            VehicleField::Fuel => "fuel",
            VehicleField::Color => "color",
            VehicleField::Ownership => "ownership",
            VehicleField::FirstRegistration => "first_registration",
            VehicleField::LastTestDate => "last_test_date",
            VehicleField::NextTestDate => "next_test_date",
            VehicleField::ModelCode => "model_code",
            VehicleField::ManufacturerCode => "manufacturer_code",
            VehicleField::Chassis => "chassis",
            VehicleField::DoorCount => "door_count",
            VehicleField::Seating => "seating",
            VehicleField::KerbWeight => "weight_kerb",
            VehicleField::Remarks => "remarks",
            VehicleField::TireFront => "tire_front",
            VehicleField::TireRear => "tire_rear",
            VehicleField::Country => "country",
            VehicleField::Drive => "drive",
        }
    }
}

/// `(field, exact aliases in priority order, fallback name pattern)`
const VEHICLE_RULES: &[(VehicleField, &[&str], Option<&str>)] = &[
    (VehicleField::Plate, &["mispar_rechev"], None),
    (VehicleField::Make, &["tozeret_nm", "tozeret_cd"], None),
    (VehicleField::Model, &["kinuy_mishari", "degem_nm"], None),
    (VehicleField::Year, &["shnat_yitzur", "shnat_yitzur_misparit"], None),
    (VehicleField::Trim, &["ramat_gimur"], None),
    (
        VehicleField::EngineCc,
        &["nefach_manoa", "nefah_manoa", "nefah_mnoa", "nefach_mnoa", "engine_cc"],
        Some(r"(נפח|סמ.?ק|סמק|nef(ah|ach).*m(anoa|noa)|engine.*(cc|size|volume)|^cc$|motor.*cc)"),
    ),
    (
        VehicleField::HorsepowerHp,
        &[
            "horsepower", "power_hp", "engine_power_hp", "hp", "hp_net", "hp_max",
            "koah_sus", "koach_sus", "coah_sus",
        ],
        Some(r#"((^|_)b?hp(_|$)|horse_?power|ko(ah|ach)_?sus|כ[ּ"]?ו?ח(ו?ת)?\s*סוס)"#),
    ),
    (
        VehicleField::PowerKw,
        &[
            "power_kw", "engine_kw", "kw", "kw_net", "kw_max", "max_power_kw",
            "net_power_kw", "koah_kw", "hespek_kw",
        ],
        Some(r"((^|_)(kw|kilowatt|kilo.?watt)(_|$)|הספק.*(kw|קילו.?ואט))"),
    ),
    (VehicleField::PowerPs, &["ps"], Some(r"(^|_)(ps|cv)(_|$)")),
    (VehicleField::Gearbox, &["sug_degem", "degem_manoa", "sug_tipa"], None),
    (
        VehicleField::Fuel,
        &["delek_nm", "sug_delek"],
        Some(r"(סוג.*דלק|דלק|fuel|energy|propulsion)"),
    ),
    (VehicleField::Color, &["tzeva_rechev", "tzeva_cd"], None),
    (VehicleField::Ownership, &["baalut"], None),
    (
        VehicleField::FirstRegistration,
        &["moed_aliya_lakvish", "moed_aliya_lakavish", "moed_alia_lakvish"],
        None,
    ),
    (
        VehicleField::LastTestDate,
        &["mivchan_acharon_dt", "t_mivchan_acharon", "mivchan_acharon"],
        None,
    ),
    (VehicleField::NextTestDate, &["tokef_dt", "t_okef_dt", "tokef_rishayon"], None),
    (VehicleField::ModelCode, &["degem_cd", "degem_id"], None),
    (VehicleField::ManufacturerCode, &["tozeret_cd"], None),
    (VehicleField::Chassis, &["misgeret"], None),
    (VehicleField::DoorCount, &["mispar_dlatot"], None),
    (VehicleField::Seating, &["mispar_moshavim"], None),
    (VehicleField::KerbWeight, &["mishkal_kolel", "mishkal_ker"], None),
    (VehicleField::Remarks, &["heara", "he_arot"], None),
    (
        VehicleField::TireFront,
        &["zmig_kidmi", "zmig_kedmi", "mida_zmig_kedmi", "tire_front", "front_tire"],
        Some(r"(צמיג|zmig|tire).*(קד|front)"),
    ),
    (
        VehicleField::TireRear,
        &["zmig_ahori", "zmig_achori", "mida_zmig_achori", "tire_rear", "rear_tire"],
        Some(r"(צמיג|zmig|tire).*(אחו|rear)"),
    ),
    (
        VehicleField::Country,
        &[
            "eretz_yitzur", "eretz_itzur", "eretz_yetsur", "country",
            "country_of_origin", "manufacture_country",
        ],
        Some(r"(ארץ.*ייצו?ר|מדינת.*ייצו?ר|country.*(origin|manufacture)|origin)"),
    ),
    (
        VehicleField::Drive,
        &["hanaa", "sug_hanaa", "drive", "drivetrain"],
        Some(r"(הנעה|drive|drivetrain|4x4|awd|fwd|rwd)"),
    ),
];

/// Compiled form of one `VEHICLE_RULES` row
struct VehicleRule {
    field: VehicleField,
    aliases: &'static [&'static str],
    pattern: Option<Regex>,
}

fn vehicle_rules() -> &'static [VehicleRule] {
    static RULES: OnceLock<Vec<VehicleRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        VEHICLE_RULES
            .iter()
            .map(|(field, aliases, pattern)| VehicleRule {
                field: *field,
                aliases: *aliases,
                pattern: (*pattern).map(|p| {
                    Regex::new(&format!("(?i){}", p)).expect("valid vehicle field regex")
                }),
            })
            .collect()
    })
}

/// First non-blank value for `field`: aliases in order, then the pattern over
/// fields in record order
pub fn pick(record: &RawRecord, field: VehicleField) -> Option<Scalar<'_>> {
    let rule = vehicle_rules().iter().find(|r| r.field == field)?;

    let by_alias = rule
        .aliases
        .iter()
        .filter_map(|alias| record.scalar(alias))
        .find(|value| !value.is_blank());
    if by_alias.is_some() {
        return by_alias;
    }

    let pattern = rule.pattern.as_ref()?;
    record
        .scalars()
        .find(|(name, value)| pattern.is_match(name) && !value.is_blank())
        .map(|(_, value)| value)
}

fn pick_text(record: &RawRecord, field: VehicleField) -> Option<String> {
    pick(record, field).map(|v| v.to_display())
}

/// Integer part of the first number in the value
fn pick_int(record: &RawRecord, field: VehicleField) -> Option<i64> {
    pick(record, field)
        .and_then(extract_number)
        .map(|n| n.trunc() as i64)
}

// ============================================================================
// DRIVE & POWER
// ============================================================================

/// Canonical drivetrain; unrecognized text passes through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DriveType {
    AllWheel,
    FrontWheel,
    RearWheel,
    TwoWheel,
    Other(String),
}

impl DriveType {
    pub fn code(&self) -> &str {
        match self {
            DriveType::AllWheel => "4x4",
            DriveType::FrontWheel => "fwd",
            DriveType::RearWheel => "rwd",
            DriveType::TwoWheel => "2x4",
            DriveType::Other(text) => text,
        }
    }

    pub fn label_he(&self) -> &str {
        match self {
            DriveType::AllWheel => "4×4",
            DriveType::FrontWheel => "קדמית (2×4)",
            DriveType::RearWheel => "אחורית (2×4)",
            DriveType::TwoWheel => "2×4",
            DriveType::Other(text) => text,
        }
    }

    pub fn normalize(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        if ["4x4", "awd", "4wd", "כפולה"].iter().any(|k| text.contains(k)) {
            DriveType::AllWheel
        } else if ["fwd", "front", "קדמית"].iter().any(|k| text.contains(k)) {
            DriveType::FrontWheel
        } else if ["rwd", "rear", "אחורית"].iter().any(|k| text.contains(k)) {
            DriveType::RearWheel
        } else if ["2x4", "2wd"].iter().any(|k| text.contains(k)) {
            DriveType::TwoWheel
        } else {
            DriveType::Other(raw.trim().to_string())
        }
    }
}

impl From<String> for DriveType {
    fn from(code: String) -> Self {
        match code.as_str() {
            "4x4" => DriveType::AllWheel,
            "fwd" => DriveType::FrontWheel,
            "rwd" => DriveType::RearWheel,
            "2x4" => DriveType::TwoWheel,
            _ => DriveType::Other(code),
        }
    }
}

impl From<DriveType> for String {
    fn from(drive: DriveType) -> Self {
        drive.code().to_string()
    }
}

pub const KW_TO_HP: f64 = 1.34102209;
pub const PS_TO_HP: f64 = 0.98632;

/// Where a horsepower figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    Horsepower,
    Kilowatt,
    MetricHorsepower,
    ModelSpecs,
}

/// Horsepower: a direct hp column, else kW converted, else PS converted
pub fn horsepower_of(record: &RawRecord) -> Option<(i64, PowerSource)> {
    let read = |field| pick(record, field).and_then(extract_number);

    if let Some(hp) = read(VehicleField::HorsepowerHp) {
        return Some((hp.round() as i64, PowerSource::Horsepower));
    }
    if let Some(kw) = read(VehicleField::PowerKw) {
        return Some(((kw * KW_TO_HP).round() as i64, PowerSource::Kilowatt));
    }
    read(VehicleField::PowerPs)
        .map(|ps| ((ps * PS_TO_HP).round() as i64, PowerSource::MetricHorsepower))
}

// ============================================================================
// PROFILE
// ============================================================================

/// Normalized vehicle details. Dates are UTC epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub plate: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub trim: Option<String>,
    pub engine_cc: Option<i64>,
    pub horsepower: Option<i64>,
    pub horsepower_source: Option<PowerSource>,
    pub gearbox: Option<String>,
    pub fuel: Option<String>,
    pub color: Option<String>,
    pub ownership: Option<String>,
    pub first_registration: Option<i64>,
    pub last_test_date: Option<i64>,
    pub next_test_date: Option<i64>,
    pub model_code: Option<String>,
    pub manufacturer_code: Option<String>,
    pub chassis: Option<String>,
    pub door_count: Option<i64>,
    pub seating: Option<i64>,
    pub weight_kerb: Option<i64>,
    pub remarks: Option<String>,
    pub tire_front: Option<String>,
    pub tire_rear: Option<String>,
    pub country: Option<String>,
    pub drive: Option<DriveType>,
}

impl VehicleProfile {
    /// Fill engine size / power that the registry row lacks; present values win
    pub fn enrich(&mut self, specs: &SpecExtract) {
        if self.engine_cc.is_none() {
            self.engine_cc = specs.engine_cc;
        }
        if self.horsepower.is_none() && specs.horsepower.is_some() {
            self.horsepower = specs.horsepower;
            self.horsepower_source = Some(PowerSource::ModelSpecs);
        }
    }

    /// Engine size or power still unknown
    pub fn needs_specs(&self) -> bool {
        self.engine_cc.is_none() || self.horsepower.is_none()
    }
}

/// Normalize one registry row
pub fn normalize_vehicle(record: &RawRecord) -> VehicleProfile {
    let date = |field| pick(record, field).and_then(normalize_plausible_date);
    let power = horsepower_of(record);

    let profile = VehicleProfile {
        plate: pick_text(record, VehicleField::Plate),
        make: pick_text(record, VehicleField::Make),
        model: pick_text(record, VehicleField::Model),
        year: pick_int(record, VehicleField::Year),
        trim: pick_text(record, VehicleField::Trim),
        engine_cc: pick_int(record, VehicleField::EngineCc),
        horsepower: power.map(|(hp, _)| hp),
        horsepower_source: power.map(|(_, source)| source),
        gearbox: pick_text(record, VehicleField::Gearbox),
        fuel: pick_text(record, VehicleField::Fuel),
        color: pick_text(record, VehicleField::Color),
        ownership: pick_text(record, VehicleField::Ownership),
        first_registration: date(VehicleField::FirstRegistration),
        last_test_date: date(VehicleField::LastTestDate),
        next_test_date: date(VehicleField::NextTestDate),
        model_code: pick_text(record, VehicleField::ModelCode),
        manufacturer_code: pick_text(record, VehicleField::ManufacturerCode),
        chassis: pick_text(record, VehicleField::Chassis),
        door_count: pick_int(record, VehicleField::DoorCount),
        seating: pick_int(record, VehicleField::Seating),
        weight_kerb: pick_int(record, VehicleField::KerbWeight),
        remarks: pick_text(record, VehicleField::Remarks),
        tire_front: pick_text(record, VehicleField::TireFront),
        tire_rear: pick_text(record, VehicleField::TireRear),
        country: pick_text(record, VehicleField::Country),
        drive: pick_text(record, VehicleField::Drive).map(|d| DriveType::normalize(&d)),
    };

    if profile.needs_specs() {
        let names: Vec<&str> = record.field_names().collect();
        tracing::debug!(fields = ?names, "vehicle row without engine size or power");
    }

    profile
}

// ============================================================================
// MODEL SPECS
// ============================================================================

/// Engine size and power read from a model-spec row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecExtract {
    pub engine_cc: Option<i64>,
    pub horsepower: Option<i64>,
}

impl SpecExtract {
    pub fn is_empty(&self) -> bool {
        self.engine_cc.is_none() && self.horsepower.is_none()
    }
}

/// The model-spec row that supplied missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMatch {
    /// Index into [`spec_queries`] of the query that hit
    pub attempt: usize,
    /// Rows returned by that query
    pub candidates: usize,
    pub record: RawRecord,
    pub extract: SpecExtract,
}

pub fn extract_specs(record: &RawRecord) -> SpecExtract {
    SpecExtract {
        engine_cc: pick_int(record, VehicleField::EngineCc),
        horsepower: horsepower_of(record).map(|(hp, _)| hp),
    }
}

/// First row that actually carries engine size or power
pub fn first_with_specs(records: &[RawRecord]) -> Option<(&RawRecord, SpecExtract)> {
    records.iter().find_map(|record| {
        let extract = extract_specs(record);
        (!extract.is_empty()).then_some((record, extract))
    })
}

/// Progressively looser model-spec searches for a registry row:
/// codes + year, codes, model name + year, model name, free text + year,
/// free text. Queries with no criteria and repeats are left out.
pub fn spec_queries(record: &RawRecord) -> Vec<DatastoreQuery> {
    let raw = |name: &str| record.get(name).cloned().unwrap_or(serde_json::Value::Null);
    let make_code = raw("tozeret_cd");
    let model_code = raw("degem_cd");
    let year = raw("shnat_yitzur");
    let model_name = pick_text(record, VehicleField::Model).unwrap_or_default();

    let by_codes = || {
        DatastoreQuery::new()
            .with_filter("tozeret_cd", make_code.clone())
            .with_filter("degem_cd", model_code.clone())
    };

    let mut candidates = vec![
        by_codes().with_filter("shnat_yitzur", year.clone()),
        by_codes(),
    ];
    if !model_name.is_empty() {
        candidates.extend([
            DatastoreQuery::new()
                .with_filter("degem_nm", model_name.as_str())
                .with_filter("shnat_yitzur", year.clone()),
            DatastoreQuery::new().with_filter("degem_nm", model_name.as_str()),
            DatastoreQuery::new()
                .with_text(&model_name)
                .with_filter("shnat_yitzur", year.clone()),
            DatastoreQuery::new().with_text(&model_name),
        ]);
    }

    let mut queries: Vec<DatastoreQuery> = Vec::new();
    for query in candidates {
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    }
    queries
}

// ============================================================================
// TESTS
// ============================================================================
