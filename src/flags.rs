// 🚩 Vehicle Flags - LPG conversion, color change, tyre change
// Tri-state: yes / no / whatever text the dataset used.

use crate::fields::{locate, FieldRole};
use crate::record::{RawRecord, Scalar};
use serde::{Deserialize, Serialize};

/// A flag as reported by the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    /// `1/true/כן/יש` → true, `0/false/לא/אין` → false, anything else verbatim
    pub fn interpret(value: Scalar<'_>) -> Self {
        let text = value.to_display();
        match text.to_lowercase().as_str() {
            "1" | "true" | "כן" | "יש" => FlagValue::Bool(true),
            "0" | "false" | "לא" | "אין" => FlagValue::Bool(false),
            _ => FlagValue::Text(text),
        }
    }
}

/// Flags gathered from the mileage/inspection history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleFlags {
    pub lpg: Option<FlagValue>,
    pub color_change: Option<FlagValue>,
    pub tyre: Option<FlagValue>,
}

/// First present value of each flag across the records, in record order
pub fn collect_flags<'a, I>(records: I) -> VehicleFlags
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut flags = VehicleFlags::default();

    for record in records {
        fill(&mut flags.lpg, record, FieldRole::LpgFlag);
        fill(&mut flags.color_change, record, FieldRole::ColorChangeFlag);
        fill(&mut flags.tyre, record, FieldRole::TyreFlag);
    }

    flags
}

fn fill(slot: &mut Option<FlagValue>, record: &RawRecord, role: FieldRole) {
    if slot.is_none() {
        *slot = locate(record, role).map(|f| FlagValue::interpret(f.value));
    }
}
