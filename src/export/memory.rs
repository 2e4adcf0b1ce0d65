//! In-memory stores for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};

use super::{BulkExportStats, CreateResult, SummaryStore, TimeseriesStore};
use crate::types::{SummaryView, TimeSeriesDocument};

/// Error type for in-memory stores.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryExportError {
    /// The document could not be converted to JSON.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Only `match_all` and single-field `term` queries are understood.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

/// Summary store keeping documents as JSON, keyed by ID.
///
/// Search supports `match_all` and `{"term": {"dotted.path": value}}`,
/// optionally wrapped in `{"query": ...}`, and answers in the usual
/// `hits.hits[]._source` shape.
#[derive(Debug, Default)]
pub struct InMemorySummaryStore {
    documents: RwLock<BTreeMap<String, Value>>,
}

impl InMemorySummaryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Stored JSON for an ID.
    pub fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().get(id).cloned()
    }

    /// All stored IDs in order.
    pub fn ids(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    type Error = InMemoryExportError;

    async fn create_document(&self, document: &SummaryView, id: &str) -> Result<CreateResult, Self::Error> {
        let value = serde_json::to_value(document)?;
        let mut documents = self.documents.write();
        if documents.contains_key(id) {
            return Ok(CreateResult::duplicate(id));
        }
        documents.insert(id.to_string(), value);
        Ok(CreateResult::created(id))
    }

    async fn search(&self, query: &Value) -> Result<Value, Self::Error> {
        let filter = TermFilter::parse(query)?;
        let documents = self.documents.read();
        let hits: Vec<Value> = documents
            .iter()
            .filter(|(_, source)| filter.matches(source))
            .map(|(id, source)| json!({"_id": id, "_source": source}))
            .collect();

        Ok(json!({
            "hits": {
                "total": {"value": hits.len()},
                "hits": hits,
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, Self::Error> {
        Ok(self.documents.write().remove(id).is_some())
    }
}

/// Timeseries store keyed by `timeseries_id`. Re-exporting an ID overwrites it,
/// matching bulk-index semantics.
#[derive(Debug, Default)]
pub struct InMemoryTimeseriesStore {
    documents: RwLock<BTreeMap<String, TimeSeriesDocument>>,
}

impl InMemoryTimeseriesStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Stored sample for a timeseries ID.
    pub fn get(&self, timeseries_id: &str) -> Option<TimeSeriesDocument> {
        self.documents.read().get(timeseries_id).cloned()
    }

    /// Samples belonging to one parent document, in ID order.
    pub fn for_parent(&self, document_id: &str) -> Vec<TimeSeriesDocument> {
        self.documents
            .read()
            .values()
            .filter(|doc| doc.metadata.document_id == document_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TimeseriesStore for InMemoryTimeseriesStore {
    type Error = InMemoryExportError;

    async fn bulk_export(&self, documents: &[TimeSeriesDocument]) -> Result<BulkExportStats, Self::Error> {
        let mut store = self.documents.write();
        for doc in documents {
            store.insert(doc.metadata.timeseries_id.clone(), doc.clone());
        }
        Ok(BulkExportStats {
            total: documents.len(),
            successful: documents.len(),
            failed: 0,
            errors: Vec::new(),
        })
    }

    async fn delete_by_parent(&self, document_id: &str) -> Result<u64, Self::Error> {
        let mut store = self.documents.write();
        let before = store.len();
        store.retain(|_, doc| doc.metadata.document_id != document_id);
        Ok((before - store.len()) as u64)
    }
}

enum TermFilter {
    All,
    Term { path: Vec<String>, value: Value },
}

impl TermFilter {
    fn parse(query: &Value) -> Result<Self, InMemoryExportError> {
        let query = query.get("query").unwrap_or(query);
        let Some(clause) = query.as_object() else {
            return Err(InMemoryExportError::UnsupportedQuery(query.to_string()));
        };

        if clause.is_empty() || clause.contains_key("match_all") {
            return Ok(Self::All);
        }

        let term = clause
            .get("term")
            .and_then(Value::as_object)
            .filter(|fields| fields.len() == 1)
            .and_then(|fields| fields.iter().next());

        match term {
            Some((path, value)) => {
                // Accept both {"field": v} and {"field": {"value": v}}.
                let value = value.get("value").unwrap_or(value).clone();
                Ok(Self::Term {
                    path: path.split('.').map(str::to_string).collect(),
                    value,
                })
            }
            None => Err(InMemoryExportError::UnsupportedQuery(query.to_string())),
        }
    }

    fn matches(&self, source: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Term { path, value } => path
                .iter()
                .try_fold(source, |node, segment| node.get(segment))
                .is_some_and(|found| found == value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::CreateOutcome;
    use crate::types::fixtures::sample_document;

    #[tokio::test]
    async fn test_create_if_absent() {
        let store = InMemorySummaryStore::new();
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        let summary = doc.summary();

        let first = store.create_document(&summary, doc.document_id()).await.unwrap();
        let second = store.create_document(&summary, doc.document_id()).await.unwrap();

        assert_eq!(first.result, CreateOutcome::Created);
        assert_eq!(second.result, CreateOutcome::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_does_not_overwrite() {
        let store = InMemorySummaryStore::new();
        let doc = sample_document();
        let mut changed = doc.clone();
        changed.results.status = "FAIL".to_string();

        store.create_document(&doc.summary(), "same").await.unwrap();
        store.create_document(&changed.summary(), "same").await.unwrap();

        assert_eq!(store.get("same").unwrap()["results"]["status"], "PASS");
    }

    #[tokio::test]
    async fn test_term_search_and_delete() {
        let store = InMemorySummaryStore::new();
        let doc = sample_document();
        store.create_document(&doc.summary(), "a").await.unwrap();
        let mut other = doc.clone();
        other.metadata.os_vendor = Some("ubuntu".to_string());
        store.create_document(&other.summary(), "b").await.unwrap();

        let response = store
            .search(&json!({"query": {"term": {"metadata.os_vendor": "ubuntu"}}}))
            .await
            .unwrap();
        assert_eq!(response["hits"]["total"]["value"], 1);
        assert_eq!(response["hits"]["hits"][0]["_id"], "b");

        let all = store.search(&json!({"match_all": {}})).await.unwrap();
        assert_eq!(all["hits"]["total"]["value"], 2);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.ids(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_query() {
        let store = InMemorySummaryStore::new();
        let err = store.search(&json!({"bool": {"must": []}})).await.unwrap_err();
        assert!(matches!(err, InMemoryExportError::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn test_timeseries_bulk_and_delete_by_parent() {
        let store = InMemoryTimeseriesStore::new();
        let mut doc = sample_document();
        doc.assign_identity(None).unwrap();
        let points = doc.extract_timeseries_documents().unwrap();

        let stats = store.bulk_export(&points).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 4);
        assert_eq!(store.for_parent(doc.document_id()).len(), 4);

        // Re-export overwrites by ID.
        store.bulk_export(&points).await.unwrap();
        assert_eq!(store.len(), 4);

        assert_eq!(store.delete_by_parent(doc.document_id()).await.unwrap(), 4);
        assert!(store.is_empty());
    }
}
