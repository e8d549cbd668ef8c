//! Read side of the trip collection: paged listing and lookup.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::parse::parse_trip_detail;
use crate::store::{Document, DocumentStore, Query};
use crate::Result;

pub const PAGE_SIZE: u64 = 4;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TripPage {
    pub trips: Vec<Value>,
    pub total: u64,
}

pub struct TripCatalog {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

/// Page number from a query value; missing, unparsable or below 1 means page 1.
pub fn page_number(raw: Option<&str>) -> u64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map_or(1, |p| p as u64)
}

/// Client view of a stored trip: the parsed detail plus `id` and `imageUrls`, which win
/// over same-named detail fields.
pub fn trip_entry(doc: &Document) -> Value {
    let mut entry = doc
        .get_str("tripDetail")
        .and_then(parse_trip_detail)
        .unwrap_or_else(Map::new);
    entry.insert("id".into(), Value::String(doc.id.clone()));
    let image_urls = match doc.get("imageUrls") {
        Some(Value::Array(urls)) => Value::Array(urls.clone()),
        _ => Value::Array(Vec::new()),
    };
    entry.insert("imageUrls".into(), image_urls);
    Value::Object(entry)
}

impl TripCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Newest trips first, [`PAGE_SIZE`] per page.
    pub async fn list_page(&self, page: u64) -> Result<TripPage> {
        // Page numbers come straight from the query string; the offset saturates.
        let offset = page.max(1).saturating_sub(1).saturating_mul(PAGE_SIZE);
        let queries = [
            Query::order_desc("createdAt"),
            Query::Limit(PAGE_SIZE),
            Query::Offset(offset),
        ];
        let list = self.store.list_documents(&self.collection, &queries).await?;
        Ok(TripPage {
            trips: list.documents.iter().map(trip_entry).collect(),
            total: list.total,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<Value>> {
        Ok(self
            .store
            .get_document(&self.collection, id)
            .await?
            .map(|doc| trip_entry(&doc)))
    }
}
