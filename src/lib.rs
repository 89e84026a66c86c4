// Vehicle History - Core Library
// Normalization engine for Israeli open-data vehicle history, shared by the CLI,
// the API server and tests

pub mod record;     // Raw upstream rows
pub mod numeric;    // Odometer numbers out of free text
pub mod dates;      // Multi-format date normalization
pub mod fields;     // Field-role rule table + locator
pub mod mileage;    // Mileage series builder
pub mod flags;      // LPG / color / tyre flags
pub mod ownership;  // Ownership interval reconstruction
pub mod summary;    // HistorySummary aggregation
pub mod config;     // EngineConfig, ServerConfig, tracing setup
pub mod error;      // HistoryError
pub mod plate;      // Plate validation
pub mod loader;     // JSON / CSV record files
pub mod query;      // CKAN datastore_search queries
pub mod vehicle;    // Vehicle registry row → VehicleProfile

#[cfg(feature = "server")]
pub mod upstream;   // CKAN datastore client

// Re-export commonly used types
pub use record::{RawRecord, Scalar};
pub use numeric::{extract_number, extract_number_from_text};
pub use dates::{
    normalize_date, normalize_plausible_date, detect_date, is_plausible,
    DateEncoding, MS_PER_DAY,
};
pub use fields::{locate, locate_value, FieldRole, LocatedField};
pub use mileage::{build_mileage_series, MileagePoint};
pub use flags::{collect_flags, FlagValue, VehicleFlags};
pub use ownership::{
    build_intervals, build_ownership_events, normalize_ownership_type,
    reconstruct_ownership, OwnershipCategory, OwnershipEvent, OwnershipInterval,
};
pub use summary::{aggregate, summarize_history, HistorySummary};
pub use config::{init_tracing, EngineConfig, ServerConfig};
pub use error::{HistoryError, Result};
pub use plate::normalize_plate;
pub use loader::{load_all, load_records, RecordFormat};
pub use query::DatastoreQuery;
pub use vehicle::{
    extract_specs, first_with_specs, normalize_vehicle, spec_queries, DriveType,
    PowerSource, SpecExtract, SpecMatch, VehicleField, VehicleProfile,
};

#[cfg(feature = "server")]
pub use upstream::{CkanClient, HistoryBundle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
