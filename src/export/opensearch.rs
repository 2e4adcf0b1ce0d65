//! OpenSearch exporter.
//!
//! Summary documents go through the `_create` endpoint so an existing ID is
//! reported as HTTP 409 instead of being overwritten. Timeseries documents go
//! through `_bulk`. Server errors and transport failures are retried with a
//! fixed delay; client errors fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::{BulkExportStats, CreateResult, SummaryStore, TimeseriesStore};
use crate::config::OpenSearchConfig;
use crate::types::{format_timestamp, SummaryView, TimeSeriesDocument};

/// Name recorded in `_export_metadata.exporter`.
pub const EXPORTER_NAME: &str = "zathras-opensearch-exporter";

/// Field limit set on indices this exporter creates.
pub const TOTAL_FIELDS_LIMIT: u32 = 5000;

/// Default `size` of search requests that do not set one.
pub const DEFAULT_SEARCH_SIZE: u64 = 100;

/// Errors talking to OpenSearch.
#[derive(Debug, thiserror::Error)]
pub enum OpenSearchError {
    /// HTTP 409: the document already exists.
    #[error("conflict (HTTP 409): {body}")]
    Conflict {
        /// Response body.
        body: String,
    },

    /// Any other 4xx. Not retried.
    #[error("client error {status}: {body}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// 5xx on every attempt.
    #[error("server error {status} after {attempts} attempts: {body}")]
    Server {
        /// Status of the last attempt.
        status: u16,
        /// Attempts made.
        attempts: u32,
        /// Body of the last response.
        body: String,
    },

    /// Connection, timeout or body read failure on every attempt.
    #[error("transport error after {attempts} attempts: {source}")]
    Transport {
        /// Attempts made.
        attempts: u32,
        /// Last underlying error.
        source: reqwest::Error,
    },

    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client: {0}")]
    Setup(reqwest::Error),

    /// Request or response JSON could not be handled.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

enum Body {
    Empty,
    Json(Value),
    NdJson(String),
}

/// OpenSearch client implementing both [`SummaryStore`] and [`TimeseriesStore`].
#[derive(Debug, Clone)]
pub struct OpenSearchExporter {
    http: reqwest::Client,
    base_url: String,
    config: OpenSearchConfig,
}

impl OpenSearchExporter {
    /// Create an exporter from configuration.
    pub fn new(config: OpenSearchConfig) -> Result<Self, OpenSearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(OpenSearchError::Setup)?;

        info!(
            url = %config.url,
            summary_index = %config.summary_index,
            timeseries_index = %config.timeseries_index,
            max_retries = config.max_retries,
            "Initializing OpenSearch exporter"
        );

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Create an exporter from environment variables.
    pub fn from_env() -> Result<Self, OpenSearchError> {
        Self::new(OpenSearchConfig::from_env())
    }

    /// Exporter configuration.
    pub fn config(&self) -> &OpenSearchConfig {
        &self.config
    }

    /// Check connectivity and return the cluster name.
    pub async fn test_connection(&self) -> Result<String, OpenSearchError> {
        let response = self.request(Method::GET, "/", Body::Empty).await?;
        let cluster = response
            .get("cluster_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        info!(cluster = %cluster, "Connected to OpenSearch");
        Ok(cluster)
    }

    /// Create both indices with their mappings if they do not exist.
    pub async fn ensure_indices(&self) -> Result<(), OpenSearchError> {
        self.ensure_index_exists(&self.config.summary_index, summary_mappings())
            .await?;
        self.ensure_index_exists(&self.config.timeseries_index, timeseries_mappings())
            .await
    }

    /// Create an index with a raised field limit and the given mappings
    /// unless it already exists. An existing index is left untouched.
    pub async fn ensure_index_exists(&self, index: &str, mappings: Value) -> Result<(), OpenSearchError> {
        match self.request(Method::HEAD, &format!("/{index}"), Body::Empty).await {
            Ok(_) => {
                debug!(index, "Index already exists");
                return Ok(());
            }
            Err(OpenSearchError::Client { status: 404, .. }) => {}
            Err(err) => return Err(err),
        }

        let body = index_body(mappings);
        match self.request(Method::PUT, &format!("/{index}"), Body::Json(body)).await {
            Ok(_) => {
                info!(index, "Created index");
                Ok(())
            }
            Err(OpenSearchError::Client { body, .. })
                if body.contains("resource_already_exists_exception") =>
            {
                debug!(index, "Index created concurrently");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn request(&self, method: Method, path: &str, body: Body) -> Result<Value, OpenSearchError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(ACCEPT, "application/json");
            if let Some(username) = &self.config.username {
                request = request.basic_auth(username, self.config.password.as_ref());
            }
            request = match &body {
                Body::Empty => request,
                Body::Json(value) => request.json(value),
                Body::NdJson(lines) => request
                    .header(CONTENT_TYPE, "application/x-ndjson")
                    .body(lines.clone()),
            };

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|source| OpenSearchError::Transport {
                        attempts: attempt,
                        source,
                    })?;

                    if status.is_success() {
                        debug!(%method, path, status = status.as_u16(), attempt, "Request succeeded");
                        if text.trim().is_empty() {
                            return Ok(Value::Null);
                        }
                        return Ok(serde_json::from_str(&text)?);
                    }
                    if status == StatusCode::CONFLICT {
                        warn!(path, attempt, "HTTP 409 conflict");
                        return Err(OpenSearchError::Conflict { body: text });
                    }
                    if status.is_client_error() {
                        // HEAD probes expect 404 for missing indices.
                        if method != Method::HEAD {
                            error!(path, status = status.as_u16(), body = %text, "Client error");
                        }
                        return Err(OpenSearchError::Client {
                            status: status.as_u16(),
                            body: text,
                        });
                    }

                    error!(path, status = status.as_u16(), attempt, attempts, "Server error");
                    if attempt >= attempts {
                        return Err(OpenSearchError::Server {
                            status: status.as_u16(),
                            attempts,
                            body: text,
                        });
                    }
                }
                Err(source) => {
                    error!(path, attempt, attempts, error = %source, "Connection error");
                    if attempt >= attempts {
                        return Err(OpenSearchError::Transport { attempts, source });
                    }
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
        }
    }
}

#[async_trait]
impl SummaryStore for OpenSearchExporter {
    type Error = OpenSearchError;

    async fn create_document(&self, document: &SummaryView, id: &str) -> Result<CreateResult, Self::Error> {
        let body = with_export_metadata(document)?;
        let path = format!("/{}/_create/{}", self.config.summary_index, id);

        match self.request(Method::PUT, &path, Body::Json(body)).await {
            Ok(_) => {
                info!(document_id = id, "Created summary document");
                Ok(CreateResult::created(id))
            }
            Err(OpenSearchError::Conflict { .. }) => {
                info!(document_id = id, "Summary document already exists");
                Ok(CreateResult::duplicate(id))
            }
            Err(err) => Err(err),
        }
    }

    async fn search(&self, query: &Value) -> Result<Value, Self::Error> {
        let mut query = query.clone();
        if let Some(obj) = query.as_object_mut() {
            obj.entry("size").or_insert(json!(DEFAULT_SEARCH_SIZE));
        }
        let path = format!("/{}/_search", self.config.summary_index);
        self.request(Method::POST, &path, Body::Json(query)).await
    }

    async fn delete(&self, id: &str) -> Result<bool, Self::Error> {
        let path = format!("/{}/_doc/{}", self.config.summary_index, id);
        match self.request(Method::DELETE, &path, Body::Empty).await {
            Ok(_) => {
                info!(document_id = id, "Deleted summary document");
                Ok(true)
            }
            Err(OpenSearchError::Client { status: 404, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl TimeseriesStore for OpenSearchExporter {
    type Error = OpenSearchError;

    async fn bulk_export(&self, documents: &[TimeSeriesDocument]) -> Result<BulkExportStats, Self::Error> {
        if documents.is_empty() {
            return Ok(BulkExportStats::default());
        }

        let body = bulk_body(documents)?;
        let path = format!("/{}/_bulk", self.config.timeseries_index);
        let response = self.request(Method::POST, &path, Body::NdJson(body)).await?;
        let stats = parse_bulk_response(documents.len(), &response);

        if stats.failed > 0 {
            warn!(failed = stats.failed, total = stats.total, "Bulk export completed with errors");
        } else {
            debug!(total = stats.total, "Bulk export succeeded");
        }
        Ok(stats)
    }

    async fn delete_by_parent(&self, document_id: &str) -> Result<u64, Self::Error> {
        let query = json!({"query": {"term": {"metadata.document_id": document_id}}});
        let path = format!("/{}/_delete_by_query", self.config.timeseries_index);
        let response = self.request(Method::POST, &path, Body::Json(query)).await?;
        let deleted = response.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        info!(document_id, deleted, "Deleted timeseries documents");
        Ok(deleted)
    }
}

/// Index creation body: shard settings, field limit and mappings.
fn index_body(mappings: Value) -> Value {
    json!({
        "settings": {
            "number_of_shards": 3,
            "number_of_replicas": 1,
            "index": {"mapping": {"total_fields": {"limit": TOTAL_FIELDS_LIMIT}}}
        },
        "mappings": mappings
    })
}

fn keyword() -> Value {
    json!({"type": "keyword"})
}

fn date() -> Value {
    json!({"type": "date", "ignore_malformed": true})
}

/// Strings become keywords; numbers under metric maps are always doubles so
/// an integer in the first document does not truncate later floats.
fn dynamic_templates() -> Value {
    json!([
        {"metrics_as_double": {
            "path_match": "*metrics.*",
            "match_mapping_type": "long",
            "mapping": {"type": "double"}
        }},
        {"strings_as_keywords": {
            "match_mapping_type": "string",
            "mapping": {"type": "keyword", "ignore_above": 1024}
        }}
    ])
}

fn provenance_properties() -> Value {
    json!({
        "document_id": keyword(),
        "test_timestamp": date(),
        "processing_timestamp": date(),
        "os_vendor": keyword(),
        "cloud_provider": keyword(),
        "instance_type": keyword(),
        "scenario_name": keyword(),
        "iteration": {"type": "integer"}
    })
}

/// Mappings of the summary index.
pub fn summary_mappings() -> Value {
    let mut metadata = provenance_properties();
    if let Some(fields) = metadata.as_object_mut() {
        fields.insert("document_type".into(), keyword());
        fields.insert("content_hash".into(), keyword());
        fields.insert("collection_timestamp".into(), date());
        fields.insert("zathras_version".into(), keyword());
    }

    json!({
        "dynamic_templates": dynamic_templates(),
        "properties": {
            "metadata": {"properties": metadata},
            "test": {"properties": {"name": keyword(), "version": keyword()}},
            "results": {"properties": {
                "status": keyword(),
                "total_runs": {"type": "integer"},
                "execution_time_seconds": {"type": "double"},
                "primary_metric": {"properties": {
                    "name": keyword(),
                    "value": {"type": "double"},
                    "unit": keyword()
                }}
            }},
            "_export_metadata": {"properties": {
                "exported_at": date(),
                "exporter": keyword(),
                "exporter_version": keyword()
            }}
        }
    })
}

/// Mappings of the timeseries index.
pub fn timeseries_mappings() -> Value {
    let mut metadata = provenance_properties();
    if let Some(fields) = metadata.as_object_mut() {
        fields.insert("timeseries_id".into(), keyword());
        fields.insert("timestamp".into(), date());
        fields.insert("sequence".into(), json!({"type": "long"}));
    }

    json!({
        "dynamic_templates": dynamic_templates(),
        "properties": {
            "metadata": {"properties": metadata},
            "test": {"properties": {"name": keyword(), "version": keyword()}},
            "results": {"properties": {
                "run": {"properties": {
                    "run_key": keyword(),
                    "run_number": {"type": "integer"},
                    "status": keyword(),
                    "benchmark_name": keyword()
                }},
                "value": {"type": "double"},
                "unit": keyword()
            }}
        }
    })
}

/// Summary JSON with `_export_metadata` added. Sent only, never hashed.
fn with_export_metadata(document: &SummaryView) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(document)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "_export_metadata".to_string(),
            json!({
                "exported_at": format_timestamp(Utc::now()),
                "exporter": EXPORTER_NAME,
                "exporter_version": env!("CARGO_PKG_VERSION"),
            }),
        );
    }
    Ok(value)
}

/// NDJSON body: an `index` action line then the document, per sample.
fn bulk_body(documents: &[TimeSeriesDocument]) -> Result<String, serde_json::Error> {
    let mut body = String::with_capacity(documents.len() * 1024);
    for doc in documents {
        let action = json!({"index": {"_id": doc.timeseries_id()}});
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

fn parse_bulk_response(total: usize, response: &Value) -> BulkExportStats {
    let mut stats = BulkExportStats { total, ..Default::default() };
    let items = response.get("items").and_then(Value::as_array);

    for item in items.into_iter().flatten() {
        let result = item.get("index").unwrap_or(&Value::Null);
        match result.get("status").and_then(Value::as_u64) {
            Some(200 | 201) => stats.successful += 1,
            _ => {
                let id = result.get("_id").and_then(Value::as_str).unwrap_or("?");
                let reason = result
                    .pointer("/error/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error");
                stats.record_failure(format!("Doc {id}: {reason}"));
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_document;

    #[test]
    fn test_bulk_body_shape() {
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        let points = doc.extract_timeseries_documents().unwrap();

        let body = bulk_body(&points).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), points.len() * 2);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], points[0].timeseries_id());
        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["metadata"]["timeseries_id"], points[0].timeseries_id());
    }

    #[test]
    fn test_parse_bulk_response() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 200}},
                {"index": {"_id": "c", "status": 400, "error": {"reason": "mapper_parsing_exception"}}}
            ]
        });
        let stats = parse_bulk_response(3, &response);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors, vec!["Doc c: mapper_parsing_exception".to_string()]);
    }

    #[test]
    fn test_export_metadata_added_to_payload_only() {
        let doc = sample_document();
        let summary = doc.summary();
        let payload = with_export_metadata(&summary).unwrap();
        assert_eq!(payload["_export_metadata"]["exporter"], EXPORTER_NAME);
        assert!(serde_json::to_value(&summary).unwrap().get("_export_metadata").is_none());
    }

    #[test]
    fn test_index_body_carries_mappings() {
        let body = index_body(summary_mappings());
        assert_eq!(
            body["settings"]["index"]["mapping"]["total_fields"]["limit"],
            json!(TOTAL_FIELDS_LIMIT)
        );

        let metadata = &body["mappings"]["properties"]["metadata"]["properties"];
        assert_eq!(metadata["content_hash"]["type"], "keyword");
        assert_eq!(metadata["test_timestamp"]["type"], "date");
        assert_eq!(metadata["iteration"]["type"], "integer");
        assert_eq!(
            body["mappings"]["properties"]["results"]["properties"]["primary_metric"]["properties"]["value"]["type"],
            "double"
        );
    }

    #[test]
    fn test_timeseries_mappings() {
        let mappings = timeseries_mappings();
        let props = &mappings["properties"];
        assert_eq!(props["metadata"]["properties"]["timestamp"]["type"], "date");
        assert_eq!(props["metadata"]["properties"]["timeseries_id"]["type"], "keyword");
        assert_eq!(props["results"]["properties"]["value"]["type"], "double");
        assert_eq!(props["results"]["properties"]["run"]["properties"]["run_key"]["type"], "keyword");

        let templates = mappings["dynamic_templates"].as_array().unwrap();
        assert_eq!(templates[0]["metrics_as_double"]["mapping"]["type"], "double");
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = OpenSearchConfig {
            url: "http://localhost:9200/".to_string(),
            ..Default::default()
        };
        let exporter = OpenSearchExporter::new(config).unwrap();
        assert_eq!(exporter.base_url, "http://localhost:9200");
    }
}
