//! The `create-trip` request state machine.

use chrono::{SecondsFormat, Utc};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::parse::{parse_trip, ParsedTrip};
use super::prompt::build_prompt;
use super::retry::RetryPolicy;
use super::types::{TripGenerationRequest, TripRecord};
use crate::config::{Secrets, GEMINI_API_KEY, UNSPLASH_ACCESS_KEY};
use crate::drivers::TextModel;
use crate::images::{trip_query, ImageSearch, TRIP_IMAGE_COUNT};
use crate::store::{unique_id, DocumentStore};
use crate::{Error, ErrorContext, Result};

pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "This endpoint only accepts POST requests";

/// Status and JSON body answered to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl PipelineResponse {
    fn error(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": message }),
        }
    }
}

/// Generates, illustrates and stores trips.
///
/// Collaborators are injected at construction; the pipeline itself holds no
/// per-request state.
pub struct TripPipeline {
    secrets: Secrets,
    model: Arc<dyn TextModel>,
    images: Arc<dyn ImageSearch>,
    store: Arc<dyn DocumentStore>,
    collection: String,
    retry: RetryPolicy,
}

impl TripPipeline {
    pub fn new(
        secrets: Secrets,
        model: Arc<dyn TextModel>,
        images: Arc<dyn ImageSearch>,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            model,
            images,
            store,
            collection: collection.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Serve one request. Never fails: every error becomes a JSON body.
    pub async fn handle(&self, method: &Method, body: &[u8]) -> PipelineResponse {
        info!(%method, "create-trip called");

        if method != Method::POST {
            return PipelineResponse {
                status: StatusCode::METHOD_NOT_ALLOWED,
                body: json!({ "message": METHOD_NOT_ALLOWED_MESSAGE }),
            };
        }

        if let Err(e) = self.secrets.verify() {
            let secret = e
                .context()
                .and_then(|c| c.field_path.clone())
                .unwrap_or_default();
            error!(
                secret = %secret,
                available = ?related_env_names(&secret),
                "required secret missing"
            );
            return PipelineResponse::error(e.message());
        }

        match self.run(body).await {
            Ok(id) => PipelineResponse {
                status: StatusCode::OK,
                body: json!({ "id": id }),
            },
            Err(e) => {
                error!(
                    error = %e,
                    code = e.error_code().map(|c| c.code()).unwrap_or("-"),
                    "Error generating travel plan"
                );
                PipelineResponse::error(e.user_message())
            }
        }
    }

    async fn run(&self, body: &[u8]) -> Result<String> {
        let request: TripGenerationRequest = serde_json::from_slice(body).map_err(|e| {
            Error::validation_with_context(
                format!("invalid trip request: {}", e),
                ErrorContext::new().with_source("create_trip"),
            )
        })?;

        let text = self.generate(&request).await?;
        let ParsedTrip { trip, raw } = parse_trip(&text)?;
        debug!(name = %trip.name, days = trip.itinerary.len(), "trip parsed");

        let query = trip_query(&request.country, &request.interests, &request.travel_style);
        let mut image_urls = self.images.search(&query, TRIP_IMAGE_COUNT).await?;
        image_urls.truncate(TRIP_IMAGE_COUNT);

        let record = TripRecord {
            trip_detail: serde_json::to_string(&raw)?,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            image_urls,
            user_id: request.user_id.clone(),
        };
        let doc = self
            .store
            .create_document(&self.collection, &unique_id(), record.to_data()?)
            .await?;
        info!(trip_id = %doc.id, user_id = %request.user_id, "trip stored");
        Ok(doc.id)
    }

    /// Call the model with the trip prompt, retrying on throttling.
    pub async fn generate(&self, request: &TripGenerationRequest) -> Result<String> {
        let prompt = build_prompt(request);
        let model = self.model.clone();
        self.retry
            .run(|attempt| {
                let model = model.clone();
                let prompt = prompt.clone();
                async move {
                    debug!(attempt, model = model.model_id(), "generating trip");
                    model.generate(&prompt).await
                }
            })
            .await
    }
}

// Names only; values are never logged.
fn related_env_names(secret: &str) -> Vec<String> {
    let markers: &[&str] = match secret {
        GEMINI_API_KEY => &["GEMINI", "API"],
        UNSPLASH_ACCESS_KEY => &["UNSPLASH"],
        _ => &[],
    };
    let mut names: Vec<String> = std::env::vars_os()
        .filter_map(|(k, _)| k.into_string().ok())
        .filter(|k| markers.iter().any(|m| k.contains(m)))
        .collect();
    names.sort();
    names
}
