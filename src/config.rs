// ⚙️ Configuration - explicit values handed to the engine and the server
// Nothing in the engine reads process state; binaries build these and pass them in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENGINE
// ============================================================================

/// Knobs for a single summary computation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Include the full mileage series in the summary
    #[serde(default)]
    pub debug: bool,

    /// "Now" for open ownership intervals; `None` = wall clock
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
}

impl EngineConfig {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_reference_time(mut self, at: DateTime<Utc>) -> Self {
        self.reference_time = Some(at);
        self
    }

    /// Reference instant in epoch milliseconds
    pub fn now_ms(&self) -> i64 {
        self.reference_time.unwrap_or_else(Utc::now).timestamp_millis()
    }
}

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_DATASTORE_URL: &str = "https://data.gov.il/api/3/action/datastore_search";
pub const DEFAULT_MILEAGE_RESOURCE: &str = "56063a99-8a3e-4ff4-912e-5966c0279bad";
pub const DEFAULT_OWNERSHIP_RESOURCE: &str = "bb2355dc-9ec7-4f06-9c3f-3344672171da";
pub const DEFAULT_VEHICLE_RESOURCE: &str = "053cea08-09bc-40ec-8f7a-156f0677aff3";
pub const DEFAULT_MODEL_SPECS_RESOURCE: &str = "142afde2-6228-49f9-8a29-9b6c3a0cbe40";
/// Rows fetched per model-spec search attempt
pub const MODEL_SPECS_LIMIT: u32 = 100;

/// Server and upstream settings, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    /// CKAN `datastore_search` endpoint
    pub datastore_url: String,
    /// Every mileage/inspection dataset; their records are concatenated
    pub mileage_resources: Vec<String>,
    pub ownership_resource: String,
    /// Vehicle registry: one row per plate
    pub vehicle_resource: String,
    /// Per-model technical specs, searched when the registry row lacks them
    pub model_specs_resource: String,
    pub record_limit: u32,
    pub request_timeout_secs: u64,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_host: "0.0.0.0".to_string(),
            port: 4000,
            datastore_url: DEFAULT_DATASTORE_URL.to_string(),
            mileage_resources: vec![DEFAULT_MILEAGE_RESOURCE.to_string()],
            ownership_resource: DEFAULT_OWNERSHIP_RESOURCE.to_string(),
            vehicle_resource: DEFAULT_VEHICLE_RESOURCE.to_string(),
            model_specs_resource: DEFAULT_MODEL_SPECS_RESOURCE.to_string(),
            record_limit: 200,
            request_timeout_secs: 20,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup; unset or malformed values
    /// keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("BIND_HOST") {
            config.bind_host = host;
        }
        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(url) = get("DATA_GOV_BASE") {
            config.datastore_url = url;
        }
        if let Some(ids) = get("DATA_GOV_HISTORY1") {
            let ids: Vec<String> = ids
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !ids.is_empty() {
                config.mileage_resources = ids;
            }
        }
        if let Some(id) = get("DATA_GOV_HISTORY2") {
            config.ownership_resource = id;
        }
        if let Some(id) = get("DATA_GOV_RESOURCE_ID") {
            config.vehicle_resource = id;
        }
        if let Some(id) = get("MODEL_SPECS_RESOURCE_ID") {
            config.model_specs_resource = id;
        }
        if let Some(limit) = get("HISTORY_RECORD_LIMIT").and_then(|v| v.parse().ok()) {
            config.record_limit = limit;
        }
        if let Some(secs) = get("HISTORY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout_secs = secs;
        }
        if let Some(flag) = get("HISTORY_DEBUG") {
            config.engine.debug = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

// ============================================================================
// LOGGING
// ============================================================================

/// Install the global `tracing` subscriber; `RUST_LOG` wins when set
pub fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,vehicle_history=debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    // a second init (tests, embedding) is not an error worth surfacing
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
