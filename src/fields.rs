// 🏷️ Field Locator - rules as data over drifting field names
//
// The same concept shows up as `kilometraz`, `km`, `נסועה` or `ק"מ` depending on
// the dataset revision. Each semantic role owns ordered name rules and an
// optional exclusion; one generic `locate` consumes the table.

use crate::record::{RawRecord, Scalar};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// ROLES
// ============================================================================

/// Semantic roles a field can play in a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    OdometerReading,
    GenericDate,
    InspectionDate,
    MileageUpdateDate,
    OwnershipType,
    OwnershipDate,
    OwnershipRemark,
    LpgFlag,
    ColorChangeFlag,
    TyreFlag,
}

impl FieldRole {
    pub fn code(&self) -> &str {
        match self {
            FieldRole::OdometerReading => "odometer",
            FieldRole::GenericDate => "date",
            FieldRole::InspectionDate => "inspection_date",
            FieldRole::MileageUpdateDate => "mileage_update_date",
            FieldRole::OwnershipType => "ownership_type",
            FieldRole::OwnershipDate => "ownership_date",
            FieldRole::OwnershipRemark => "ownership_remark",
            FieldRole::LpgFlag => "lpg",
            FieldRole::ColorChangeFlag => "color_change",
            FieldRole::TyreFlag => "tyre",
        }
    }
}

// ============================================================================
// RULE TABLE
// ============================================================================

/// Registration / first-registration / delivery dates are not update dates
const REGISTRATION_FIELDS: &str =
    r"(first|ראשונ|rishon|מסירה|mesira|registration|רישו?ם|rishum|aliya|alia|עלייה)";

/// Names that carry a date rather than a quantity or a category
const DATE_LIKE_FIELDS: &str = r"(תאריך|מועד|date|taarich|moed|(^|_)dt($|_))";

/// `(role, name pattern, exclusion pattern)` - order is priority
const FIELD_RULES: &[(FieldRole, &str, Option<&str>)] = &[
    // odometer
    (
        FieldRole::OdometerReading,
        r#"(ק"?.?מ|קמ|נסוע|נסועה|nes[ou]?a|kilometraz|kilo(meter|metre)?|odo(meter)?|(^|_)km($|_))"#,
        Some(DATE_LIKE_FIELDS),
    ),
    // mileage update date
    (
        FieldRole::MileageUpdateDate,
        r#"(עדכון|update|idkun).*(ק"?.?מ|km|kilometraz|odometer|נסוע|נסועה)"#,
        Some(REGISTRATION_FIELDS),
    ),
    // inspection / test date, both word orders
    (
        FieldRole::InspectionDate,
        r"(תאריך|מועד|date|dt|taarich|moed).*(מבחן|טסט|בדיק|רישוי|inspection|test|mivhan|mivchan)",
        Some(REGISTRATION_FIELDS),
    ),
    (
        FieldRole::InspectionDate,
        r"(מבחן|טסט|inspection|test|mivhan|mivchan).*(תאריך|מועד|date|dt)",
        Some(REGISTRATION_FIELDS),
    ),
    // any date
    (
        FieldRole::GenericDate,
        r"(תאריך|מועד|date|dt|taarich|moed)",
        Some(REGISTRATION_FIELDS),
    ),
    // ownership change date: canonical alias first
    (FieldRole::OwnershipDate, r"^baalut[_-]?dt$", None),
    (FieldRole::OwnershipDate, r"(תאריך|date|dt|מועד|taarich)", None),
    // ownership type: typed columns first, then Hebrew vocabulary
    (
        FieldRole::OwnershipType,
        r"(baalut.*(sug|type)|sug.*baalut|^sug$|^baalut$|owner(ship)?_?type)",
        None,
    ),
    (FieldRole::OwnershipType, r"(בעלות|סוג|type)", Some(DATE_LIKE_FIELDS)),
    // free-text remark shown next to an ownership
    (FieldRole::OwnershipRemark, r"(הער|תיאור|remark|desc)", None),
    // boolean flags
    (FieldRole::LpgFlag, r#"(גפ"?.?מ|lpg|gapam)"#, None),
    (FieldRole::ColorChangeFlag, r"(צבע|color|colour|t?zeva)", None),
    (FieldRole::TyreFlag, r"(צמיג|tyre|tire|zmig)", None),
];

/// Compiled form of one `FIELD_RULES` row
pub struct FieldRule {
    pub role: FieldRole,
    pattern: Regex,
    exclusion: Option<Regex>,
}

impl FieldRule {
    fn compile(role: FieldRole, pattern: &str, exclusion: Option<&str>) -> Self {
        FieldRule {
            role,
            pattern: case_insensitive(pattern),
            exclusion: exclusion.map(case_insensitive),
        }
    }

    /// Does a field name satisfy this rule (pattern hit, exclusion miss)?
    pub fn matches(&self, field_name: &str) -> bool {
        self.pattern.is_match(field_name)
            && !self
                .exclusion
                .as_ref()
                .map_or(false, |ex| ex.is_match(field_name))
    }
}

fn case_insensitive(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){}", pattern)).expect("valid field rule regex")
}

/// All compiled rules, in table order
pub fn field_rules() -> &'static [FieldRule] {
    static RULES: OnceLock<Vec<FieldRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        FIELD_RULES
            .iter()
            .map(|(role, pattern, exclusion)| FieldRule::compile(*role, pattern, *exclusion))
            .collect()
    })
}

/// Is this a registration / delivery field name?
pub fn is_registration_field(field_name: &str) -> bool {
    static REGISTRATION_RE: OnceLock<Regex> = OnceLock::new();
    REGISTRATION_RE
        .get_or_init(|| case_insensitive(REGISTRATION_FIELDS))
        .is_match(field_name)
}

/// CKAN bookkeeping and identifier columns that never carry history values
pub fn is_bookkeeping_field(field_name: &str) -> bool {
    field_name.starts_with('_') || field_name == "rank" || field_name == "mispar_rechev"
}

// ============================================================================
// LOCATOR
// ============================================================================

/// A field picked for a role
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedField<'a> {
    pub name: &'a str,
    pub value: Scalar<'a>,
}

/// Locate the first field playing `role` in `record`.
///
/// Rules are tried in priority order; within a rule, fields in record order.
/// Null and blank values count as absent. Two matching fields are never
/// merged, the first hit wins.
pub fn locate<'a>(record: &'a RawRecord, role: FieldRole) -> Option<LocatedField<'a>> {
    field_rules()
        .iter()
        .filter(|rule| rule.role == role)
        .find_map(|rule| {
            record
                .scalars()
                .find(|(name, value)| rule.matches(name) && !value.is_blank())
                .map(|(name, value)| LocatedField { name, value })
        })
}

/// Same as [`locate`] but returns only the value
pub fn locate_value(record: &RawRecord, role: FieldRole) -> Option<Scalar<'_>> {
    locate(record, role).map(|f| f.value)
}

// ============================================================================
// TESTS
// ============================================================================
