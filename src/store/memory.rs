//! In-process document store.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{Document, DocumentList, DocumentStore, Query};
use crate::{Error, ErrorContext, Result};

/// Collections of documents kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        match self.collections.read() {
            Ok(guard) => guard.get(collection).map_or(0, Vec::len),
            Err(poisoned) => poisoned.into_inner().get(collection).map_or(0, Vec::len),
        }
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn lock_error() -> Error {
    Error::runtime_with_context(
        "memory store lock poisoned",
        ErrorContext::new().with_source("memory_store"),
    )
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        let mut guard = self.collections.write().map_err(|_| lock_error())?;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == id) {
            return Err(Error::Remote {
                status: 409,
                class: crate::error_code::StandardErrorCode::InvalidRequest,
                message: format!("Document with the requested ID '{}' already exists.", id),
            });
        }
        let doc = Document {
            id: id.to_string(),
            created_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            data,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let guard = self.collections.read().map_err(|_| lock_error())?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        let guard = self.collections.read().map_err(|_| lock_error())?;
        let mut docs: Vec<Document> = guard.get(collection).cloned().unwrap_or_default();
        drop(guard);

        let mut limit = None;
        let mut offset = 0usize;
        let mut select = None;
        for query in queries {
            match query {
                Query::Equal(attribute, values) => {
                    docs.retain(|d| d.get(attribute).is_some_and(|v| values.contains(v)))
                }
                Query::OrderDesc(attribute) => {
                    docs.sort_by(|a, b| compare(b.get(attribute), a.get(attribute)))
                }
                Query::OrderAsc(attribute) => {
                    docs.sort_by(|a, b| compare(a.get(attribute), b.get(attribute)))
                }
                Query::Limit(n) => limit = Some(*n as usize),
                Query::Offset(n) => offset = *n as usize,
                Query::Select(attributes) => select = Some(attributes.clone()),
            }
        }

        let total = docs.len() as u64;
        let documents = docs
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|mut d| {
                if let Some(attributes) = &select {
                    d.data.retain(|k, _| attributes.contains(k));
                }
                d
            })
            .collect();
        Ok(DocumentList { total, documents })
    }
}
