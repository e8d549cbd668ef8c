//! Document store: schema-flexible records addressed by collection and id.
//!
//! [`AppwriteStore`] talks to the hosted database over REST; [`MemoryStore`] keeps
//! everything in process and backs tests and local runs without credentials.

pub mod appwrite;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::Result;

pub use appwrite::AppwriteStore;
pub use memory::MemoryStore;

/// A stored document. System attributes (`$`-prefixed) are lifted out of `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub data: Map<String, Value>,
}

impl Document {
    /// Read the wire form: `{"$id": ..., "$createdAt": ..., <attributes>}`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        let id = match map.remove("$id") {
            Some(Value::String(id)) => id,
            _ => return None,
        };
        let created_at = match map.remove("$createdAt") {
            Some(Value::String(ts)) => Some(ts),
            _ => None,
        };
        map.retain(|k, _| !k.starts_with('$'));
        Some(Self {
            id,
            created_at,
            data: map,
        })
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.data.get(attribute)
    }

    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.data.get(attribute).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentList {
    /// Matching documents before paging.
    pub total: u64,
    pub documents: Vec<Document>,
}

/// List filter, projection, ordering and paging.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Vec<Value>),
    Select(Vec<String>),
    OrderDesc(String),
    OrderAsc(String),
    Limit(u64),
    Offset(u64),
}

impl Query {
    pub fn equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Equal(attribute.into(), vec![value.into()])
    }

    pub fn select<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Select(attributes.into_iter().map(Into::into).collect())
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Query::OrderDesc(attribute.into())
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Query::OrderAsc(attribute.into())
    }

    /// JSON query string accepted by the Appwrite REST API.
    pub fn to_appwrite(&self) -> String {
        let value = match self {
            Query::Equal(attribute, values) => {
                json!({ "method": "equal", "attribute": attribute, "values": values })
            }
            Query::Select(attributes) => json!({ "method": "select", "values": attributes }),
            Query::OrderDesc(attribute) => json!({ "method": "orderDesc", "attribute": attribute }),
            Query::OrderAsc(attribute) => json!({ "method": "orderAsc", "attribute": attribute }),
            Query::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Query::Offset(n) => json!({ "method": "offset", "values": [n] }),
        };
        value.to_string()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return it as stored.
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document>;

    /// Fetch one document; `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList>;
}

/// Fresh document id: 32 lowercase hex characters.
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
