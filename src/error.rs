// ⚠️ Errors - only collaborators fail; normalization never does
//
// Unparseable dates, missing fields and odd numbers are data absence and show
// up as `None` inside the engine. The variants below exist so callers can tell
// "no history exists" apart from "history could not be fetched".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Transport failure, non-success status, or a response that is not a
    /// record list. The whole summary for the request is aborted.
    #[error("upstream dataset {resource} unavailable: {reason}")]
    UpstreamUnavailable { resource: String, reason: String },

    /// Plate did not reduce to 7-8 digits
    #[error("invalid plate number {input:?}: must contain 7-8 digits")]
    InvalidPlate { input: String },

    /// The vehicle registry has no row for this plate
    #[error("no vehicle registered under plate {plate}")]
    VehicleNotFound { plate: String },
}

impl HistoryError {
    pub fn upstream(resource: impl Into<String>, reason: impl ToString) -> Self {
        HistoryError::UpstreamUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &str {
        match self {
            HistoryError::UpstreamUnavailable { .. } => "upstream_unavailable",
            HistoryError::InvalidPlate { .. } => "invalid_plate",
            HistoryError::VehicleNotFound { .. } => "vehicle_not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_kinds() {
        let err = HistoryError::upstream("56063a99", "HTTP 503");
        assert_eq!(err.kind(), "upstream_unavailable");
        assert_eq!(err.to_string(), "upstream dataset 56063a99 unavailable: HTTP 503");

        let err = HistoryError::InvalidPlate { input: "12-34".into() };
        assert_eq!(err.kind(), "invalid_plate");
        assert!(err.to_string().contains("12-34"));

        let err = HistoryError::VehicleNotFound { plate: "1234567".into() };
        assert_eq!(err.kind(), "vehicle_not_found");
        assert!(err.to_string().ends_with("1234567"));
    }
}
