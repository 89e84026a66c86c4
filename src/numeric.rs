// 🔢 Numeric Extractor - magnitudes out of human-formatted strings
// "143,509 ק\"מ" → 143509.0

use crate::record::Scalar;

/// Extract a numeric magnitude from a noisy scalar.
///
/// Text keeps only digits and `.`, then parses as `f64`. Numbers yield their
/// magnitude, which is what the same rule gives for their decimal rendering.
/// Absence is always `None`, never an error.
pub fn extract_number(value: Scalar<'_>) -> Option<f64> {
    match value {
        Scalar::Number(n) => n.is_finite().then(|| n.abs()),
        Scalar::Text(s) => extract_number_from_text(s),
    }
}

/// Same as [`extract_number`] for a bare string
pub fn extract_number_from_text(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if digits.is_empty() {
        return None;
    }

    digits.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ============================================================================
// TESTS
// ============================================================================
