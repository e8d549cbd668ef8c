//! Appwrite databases REST client.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use super::{Document, DocumentList, DocumentStore, Query};
use crate::config::AppwriteConfig;
use crate::error_code::StandardErrorCode;
use crate::transport::{read_json, HttpTransport};
use crate::{Error, ErrorContext, Result};

const PROJECT_HEADER: &str = "X-Appwrite-Project";
const KEY_HEADER: &str = "X-Appwrite-Key";

pub struct AppwriteStore {
    client: reqwest::Client,
    endpoint: Url,
    project_id: String,
    api_key: Option<String>,
    database_id: String,
}

impl AppwriteStore {
    pub fn new(transport: &HttpTransport, config: &AppwriteConfig) -> Result<Self> {
        let project_id = config.project_id.clone().ok_or_else(|| {
            Error::configuration_with_context(
                "APPWRITE_PROJECT_ID is not set",
                ErrorContext::new()
                    .with_field_path("appwrite.project_id")
                    .with_source("appwrite"),
            )
        })?;
        let endpoint = Url::parse(&config.endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    format!("invalid Appwrite endpoint: {}", config.endpoint),
                    ErrorContext::new()
                        .with_field_path("appwrite.endpoint")
                        .with_source("appwrite"),
                )
            })?;
        Ok(Self {
            client: transport.client(),
            endpoint,
            project_id,
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
        })
    }

    /// Each name is pushed as a single escaped path segment, so ids cannot climb out
    /// of the collection.
    fn documents_url(&self, collection: &str, id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "databases",
                self.database_id.as_str(),
                "collections",
                collection,
                "documents",
            ]);
            segments.extend(id);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(PROJECT_HEADER, &self.project_id);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.header(KEY_HEADER, key);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(Error::from)?;
        read_json(response).await
    }
}

fn document(value: Value) -> Result<Document> {
    Document::from_value(value).ok_or_else(|| {
        Error::parse_with_context(
            "document without $id",
            ErrorContext::new().with_source("appwrite"),
        )
    })
}

#[async_trait]
impl DocumentStore for AppwriteStore {
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        let body = json!({ "documentId": id, "data": data });
        let value = self
            .send(
                self.request(reqwest::Method::POST, self.documents_url(collection, None))
                    .json(&body),
            )
            .await?;
        let doc = document(value)?;
        debug!(collection, document_id = %doc.id, "document created");
        Ok(doc)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.documents_url(collection, Some(id));
        match self.send(self.request(reqwest::Method::GET, url)).await {
            Ok(value) => document(value).map(Some),
            Err(Error::Remote {
                class: StandardErrorCode::NotFound,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_appwrite()))
            .collect();
        let value = self
            .send(
                self.request(reqwest::Method::GET, self.documents_url(collection, None))
                    .query(&params),
            )
            .await?;

        let total = value.get("total").and_then(Value::as_u64).unwrap_or(0);
        let documents = value
            .get("documents")
            .and_then(Value::as_array)
            .map(|docs| docs.iter().cloned().filter_map(Document::from_value).collect())
            .unwrap_or_default();
        Ok(DocumentList { total, documents })
    }
}
