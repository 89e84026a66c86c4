// 🌐 Upstream Client - CKAN datastore_search on data.gov.il
//
// One GET per dataset, filtered by plate. Every history dataset for a request
// is fetched concurrently; the first failure aborts the whole request.
// Model-spec searches run one at a time and stop at the first useful row.

use crate::config::{ServerConfig, MODEL_SPECS_LIMIT};
use crate::error::{HistoryError, Result};
use crate::query::DatastoreQuery;
use crate::record::RawRecord;
use crate::vehicle::{first_with_specs, spec_queries, SpecMatch};
use futures::future::try_join_all;
use serde_json::Value;
use std::time::Duration;

/// Records of every dataset for one plate, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryBundle {
    /// All mileage/inspection datasets, concatenated in configured order
    pub mileage: Vec<RawRecord>,
    pub ownership: Vec<RawRecord>,
}

/// Thin client over the CKAN `datastore_search` action
#[derive(Debug, Clone)]
pub struct CkanClient {
    client: reqwest::Client,
    datastore_url: String,
    mileage_resources: Vec<String>,
    ownership_resource: String,
    vehicle_resource: String,
    model_specs_resource: String,
    record_limit: u32,
}

impl CkanClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HistoryError::upstream(&config.datastore_url, format!("http client error: {e}")))?;

        Ok(CkanClient {
            client,
            datastore_url: config.datastore_url.clone(),
            mileage_resources: config.mileage_resources.clone(),
            ownership_resource: config.ownership_resource.clone(),
            vehicle_resource: config.vehicle_resource.clone(),
            model_specs_resource: config.model_specs_resource.clone(),
            record_limit: config.record_limit,
        })
    }

    /// Run one `datastore_search` query against a dataset
    pub async fn search(
        &self,
        resource_id: &str,
        query: &DatastoreQuery,
        limit: u32,
    ) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&self.datastore_url)
            .query(&query.params(resource_id, limit))
            .send()
            .await
            .map_err(|e| self.failure(resource_id, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failure(resource_id, format!("HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.failure(resource_id, format!("invalid JSON: {e}")))?;

        let records = records_from_envelope(body).map_err(|reason| self.failure(resource_id, reason))?;

        tracing::debug!(resource = resource_id, records = records.len(), "fetched dataset");
        Ok(records)
    }

    /// Fetch one dataset's records for `plate`
    pub async fn fetch_records(&self, resource_id: &str, plate: &str) -> Result<Vec<RawRecord>> {
        self.search(resource_id, &DatastoreQuery::by_plate(plate), self.record_limit)
            .await
    }

    /// Fetch every configured dataset for `plate` concurrently
    pub async fn fetch_history(&self, plate: &str) -> Result<HistoryBundle> {
        let mileage = try_join_all(
            self.mileage_resources
                .iter()
                .map(|resource| self.fetch_records(resource, plate)),
        );
        let ownership = self.fetch_records(&self.ownership_resource, plate);

        let (mileage_sets, ownership) = tokio::try_join!(mileage, ownership)?;

        Ok(HistoryBundle {
            mileage: mileage_sets.into_iter().flatten().collect(),
            ownership,
        })
    }

    /// The registry row for `plate`, if any
    pub async fn fetch_vehicle(&self, plate: &str) -> Result<Option<RawRecord>> {
        let rows = self
            .search(&self.vehicle_resource, &DatastoreQuery::by_plate(plate), 1)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Search the model-spec dataset for a row with engine size or power,
    /// trying [`spec_queries`] loosest-last
    pub async fn fetch_model_specs(&self, vehicle: &RawRecord) -> Result<Option<SpecMatch>> {
        for (attempt, query) in spec_queries(vehicle).iter().enumerate() {
            let rows = self
                .search(&self.model_specs_resource, query, MODEL_SPECS_LIMIT)
                .await?;

            if let Some((record, extract)) = first_with_specs(&rows) {
                tracing::debug!(attempt, candidates = rows.len(), "model specs matched");
                return Ok(Some(SpecMatch {
                    attempt,
                    candidates: rows.len(),
                    record: record.clone(),
                    extract,
                }));
            }
        }

        Ok(None)
    }

    fn failure(&self, resource_id: &str, reason: String) -> HistoryError {
        tracing::warn!(resource = resource_id, %reason, "upstream dataset unavailable");
        HistoryError::upstream(resource_id, reason)
    }
}

/// `{ "success": true, "result": { "records": [...] } }` → records.
///
/// A missing or non-array `result.records`, or `success: false`, is a
/// malformed response rather than "no history".
pub fn records_from_envelope(body: Value) -> std::result::Result<Vec<RawRecord>, String> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("success=false");
        return Err(format!("datastore error: {message}"));
    }

    match body.pointer("/result/records") {
        Some(Value::Array(items)) => Ok(items.iter().cloned().filter_map(RawRecord::from_value).collect()),
        Some(_) => Err("result.records is not a list".to_string()),
        None => Err("response has no result.records".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_records() {
        let body = json!({
            "success": true,
            "result": {"total": 2, "records": [{"_id": 1, "kilometraz": 1000}, {"_id": 2}]}
        });
        let records = records_from_envelope(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("kilometraz"), Some(&json!(1000)));
    }

    #[test]
    fn test_empty_records_are_not_an_error() {
        let records = records_from_envelope(json!({"success": true, "result": {"records": []}})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_envelopes() {
        assert!(records_from_envelope(json!({"success": true, "result": {}})).is_err());
        assert!(records_from_envelope(json!({"result": {"records": "nope"}})).is_err());

        let err = records_from_envelope(json!({
            "success": false,
            "error": {"message": "Not found: Resource"}
        }))
        .unwrap_err();
        assert!(err.contains("Not found"));
    }

    #[test]
    fn test_client_builds_from_config() {
        let config = ServerConfig::default();
        let client = CkanClient::new(&config).unwrap();
        assert_eq!(client.mileage_resources, config.mileage_resources);
        assert_eq!(client.record_limit, 200);
        assert_eq!(client.model_specs_resource, config.model_specs_resource);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let config = ServerConfig {
            datastore_url: "http://127.0.0.1:9/api/3/action/datastore_search".to_string(),
            request_timeout_secs: 2,
            ..ServerConfig::default()
        };
        let client = CkanClient::new(&config).unwrap();

        let err = client.fetch_history("1234567").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[tokio::test]
    async fn test_model_specs_without_criteria_skip_the_network() {
        let config = ServerConfig {
            datastore_url: "http://127.0.0.1:9/api/3/action/datastore_search".to_string(),
            request_timeout_secs: 2,
            ..ServerConfig::default()
        };
        let client = CkanClient::new(&config).unwrap();

        // nothing to search by: no request is made, so no upstream error either
        let vehicle = RawRecord::new().with_field("mispar_rechev", 1234567);
        assert_eq!(client.fetch_model_specs(&vehicle).await.unwrap(), None);

        let vehicle = vehicle.with_field("kinuy_mishari", "SPORTAGE");
        let err = client.fetch_model_specs(&vehicle).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");

        let err = client.fetch_vehicle("1234567").await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }
}
