// 🔢 Plate Validation
// Israeli plates are 7 or 8 digits; dashes, spaces and dots are decoration.

use crate::error::{HistoryError, Result};

/// Keep digits only and require 7-8 of them
pub fn normalize_plate(input: &str) -> Result<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    if (7..=8).contains(&digits.len()) {
        Ok(digits)
    } else {
        Err(HistoryError::InvalidPlate {
            input: input.to_string(),
        })
    }
}
