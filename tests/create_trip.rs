//! `create-trip` pipeline against counting mocks.

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use trip_edge::config::{GeminiConfig, HttpConfig, UnsplashConfig};
use trip_edge::drivers::{GeminiDriver, TextModel};
use trip_edge::error::RATE_LIMIT_MESSAGE;
use trip_edge::images::{ImageSearch, UnsplashClient};
use trip_edge::store::{DocumentStore, MemoryStore, Query};
use trip_edge::transport::HttpTransport;
use trip_edge::trip::{RetryPolicy, TripPipeline, METHOD_NOT_ALLOWED_MESSAGE};
use trip_edge::{Error, Result, Secrets};

const COLLECTION: &str = "trips";

struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::runtime("no scripted reply left")))
    }
}

struct FixedImages {
    urls: Vec<Option<String>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FixedImages {
    fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            urls: (1..=count)
                .map(|i| Some(format!("https://images.test/{i}.jpg")))
                .collect(),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSearch for FixedImages {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Option<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        // Deliberately ignores `limit`: the pipeline must cap the list itself.
        let _ = limit;
        Ok(self.urls.clone())
    }
}

fn secrets() -> Secrets {
    Secrets {
        gemini_api_key: Some("gemini-test".into()),
        unsplash_access_key: Some("unsplash-test".into()),
    }
}

fn trip_json() -> String {
    json!({
        "name": "Lisbon Bites",
        "description": "Five days of pastries and tiles.",
        "estimatedPrice": "$1200",
        "duration": 5,
        "budget": "Mid-range",
        "travelStyle": "Relaxed",
        "country": "Portugal",
        "interests": "Food & Culinary",
        "groupType": "Couple",
        "bestTimeToVisit": ["🌸 Spring", "☀️ Summer", "🍁 Autumn", "❄️ Winter"],
        "weatherInfo": ["☀️ 20-28°C", "🌦️ 15-20°C", "🌧️ 12-18°C", "❄️ 8-14°C"],
        "location": {
            "city": "Lisbon",
            "coordinates": [38.7223, -9.1393],
            "openStreetMap": "https://www.openstreetmap.org/#map=12/38.7223/-9.1393"
        },
        "itinerary": [{
            "day": 1,
            "location": "Lisbon",
            "activities": [{ "time": "Morning", "description": "🥐 Pastéis de Belém" }]
        }]
    })
    .to_string()
}

fn request_body() -> Vec<u8> {
    json!({
        "country": "Portugal",
        "numberOfDays": 5,
        "travelStyle": "Relaxed",
        "interests": "Food & Culinary",
        "budget": "Mid-range",
        "groupType": "Couple",
        "userId": "user-42"
    })
    .to_string()
    .into_bytes()
}

struct Fixture {
    model: Arc<ScriptedModel>,
    images: Arc<FixedImages>,
    store: Arc<MemoryStore>,
    pipeline: TripPipeline,
}

fn fixture(secrets: Secrets, replies: Vec<Result<String>>, image_count: usize) -> Fixture {
    let model = ScriptedModel::new(replies);
    let images = FixedImages::new(image_count);
    let store = Arc::new(MemoryStore::new());
    let pipeline = TripPipeline::new(
        secrets,
        model.clone(),
        images.clone(),
        store.clone(),
        COLLECTION,
    )
    .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));
    Fixture {
        model,
        images,
        store,
        pipeline,
    }
}

fn rate_limited() -> Result<String> {
    Err(Error::rate_limited("Resource has been exhausted"))
}

#[tokio::test]
async fn non_post_is_rejected_without_side_effects() {
    let f = fixture(secrets(), vec![Ok(trip_json())], 5);
    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let response = f.pipeline.handle(&method, &request_body()).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.body, json!({ "message": METHOD_NOT_ALLOWED_MESSAGE }));
    }
    assert_eq!(f.model.calls(), 0);
    assert_eq!(f.images.calls(), 0);
    assert!(f.store.is_empty(COLLECTION));
}

#[tokio::test]
async fn missing_gemini_key_fails_before_any_call() {
    let f = fixture(
        Secrets {
            gemini_api_key: None,
            unsplash_access_key: None,
        },
        vec![Ok(trip_json())],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = response.body["error"].as_str().unwrap();
    assert!(error.contains("GEMINI_API_KEY"), "{error}");
    assert_eq!(f.model.calls(), 0);
    assert_eq!(f.images.calls(), 0);
}

#[tokio::test]
async fn missing_unsplash_key_fails_before_any_call() {
    let f = fixture(
        Secrets {
            unsplash_access_key: None,
            ..secrets()
        },
        vec![Ok(trip_json())],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("UNSPLASH_ACCESS_KEY"));
    assert_eq!(f.model.calls(), 0);
}

#[tokio::test]
async fn three_rate_limits_exhaust_retries() {
    let f = fixture(
        secrets(),
        vec![rate_limited(), rate_limited(), rate_limited(), Ok(trip_json())],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({ "error": RATE_LIMIT_MESSAGE }));
    assert_eq!(f.model.calls(), 3);
    assert_eq!(f.images.calls(), 0);
    assert!(f.store.is_empty(COLLECTION));
}

#[tokio::test]
async fn untyped_429_text_is_still_retried() {
    let f = fixture(
        secrets(),
        vec![
            Err(Error::runtime("[GoogleGenerativeAI Error]: [429 Too Many Requests]")),
            Ok(trip_json()),
        ],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(f.model.calls(), 2);
}

#[tokio::test]
async fn rate_limit_then_success_stores_the_trip() {
    let f = fixture(secrets(), vec![rate_limited(), Ok(trip_json())], 5);
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(f.model.calls(), 2);
    assert_eq!(f.store.len(COLLECTION), 1);
}

#[tokio::test]
async fn other_model_failures_are_not_retried() {
    let f = fixture(
        secrets(),
        vec![Err(Error::runtime("model exploded")), Ok(trip_json())],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({ "error": "model exploded" }));
    assert_eq!(f.model.calls(), 1);
    assert!(f.store.is_empty(COLLECTION));
}

#[tokio::test]
async fn quota_failures_get_the_quota_message() {
    let f = fixture(
        secrets(),
        vec![Err(Error::Remote {
            status: 403,
            class: trip_edge::error_code::StandardErrorCode::QuotaExhausted,
            message: "Quota exceeded".into(),
        })],
        5,
    );
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(
        response.body["error"],
        trip_edge::error::QUOTA_MESSAGE
    );
    assert_eq!(f.model.calls(), 1);
}

#[tokio::test]
async fn successful_flow_persists_first_three_images() {
    let f = fixture(secrets(), vec![Ok(format!("```json\n{}\n```", trip_json()))], 5);
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::OK);
    let id = response.body["id"].as_str().unwrap().to_string();
    assert_eq!(response.body, json!({ "id": id }));

    let doc = f.store.get_document(COLLECTION, &id).await.unwrap().unwrap();
    assert_eq!(
        doc.get("imageUrls").unwrap(),
        &json!([
            "https://images.test/1.jpg",
            "https://images.test/2.jpg",
            "https://images.test/3.jpg"
        ])
    );
    assert_eq!(doc.get_str("userId"), Some("user-42"));

    let detail: Value = serde_json::from_str(doc.get_str("tripDetail").unwrap()).unwrap();
    assert_eq!(detail["location"]["city"], "Lisbon");

    let created_at = doc.get_str("createdAt").unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
    assert!(created_at.ends_with('Z'));

    assert_eq!(
        f.images.queries.lock().unwrap().as_slice(),
        ["Portugal Food & Culinary Relaxed"]
    );
    let prompts = f.model.prompts.lock().unwrap();
    assert!(prompts[0].contains("5-day travel itinerary for Portugal"));
}

#[tokio::test]
async fn fewer_images_are_tolerated() {
    let f = fixture(secrets(), vec![Ok(trip_json())], 1);
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::OK);
    let list = f
        .store
        .list_documents(COLLECTION, &[Query::Limit(1)])
        .await
        .unwrap();
    assert_eq!(
        list.documents[0].get("imageUrls").unwrap(),
        &json!(["https://images.test/1.jpg"])
    );
}

#[tokio::test]
async fn unparsable_output_writes_nothing() {
    let f = fixture(secrets(), vec![Ok("Sorry, I can't plan that trip.".into())], 5);
    let response = f.pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"].is_string());
    assert_eq!(f.model.calls(), 1);
    assert_eq!(f.images.calls(), 0);
    assert!(f.store.is_empty(COLLECTION));
}

#[tokio::test]
async fn malformed_body_fails_without_calls() {
    let f = fixture(secrets(), vec![Ok(trip_json())], 5);
    let response = f.pipeline.handle(&Method::POST, br#"{"country":"Peru"}"#).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("invalid trip request"));
    assert_eq!(f.model.calls(), 0);
}

// Nothing listens on port 1: every request fails while connecting.
const UNREACHABLE: &str = "http://127.0.0.1:1";
const GEMINI_KEY: &str = "GEMINI-SECRET-7731";
const UNSPLASH_KEY: &str = "UNSPLASH-SECRET-5520";

fn real_secrets() -> Secrets {
    Secrets {
        gemini_api_key: Some(GEMINI_KEY.into()),
        unsplash_access_key: Some(UNSPLASH_KEY.into()),
    }
}

#[tokio::test]
async fn gemini_transport_failure_does_not_leak_the_key() {
    let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
    let model = GeminiDriver::new(
        &transport,
        &GeminiConfig {
            api_key: Some(GEMINI_KEY.into()),
            base_url: UNREACHABLE.into(),
            ..GeminiConfig::default()
        },
    );
    let images = FixedImages::new(3);
    let pipeline = TripPipeline::new(
        real_secrets(),
        Arc::new(model),
        images.clone(),
        Arc::new(MemoryStore::new()),
        COLLECTION,
    )
    .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));

    let response = pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.to_string();
    assert!(!body.contains(GEMINI_KEY), "{body}");
    assert!(!body.contains("key="), "{body}");
    assert_eq!(images.calls(), 0);
}

#[tokio::test]
async fn unsplash_transport_failure_does_not_leak_the_key() {
    let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
    let images = UnsplashClient::new(
        &transport,
        &UnsplashConfig {
            access_key: Some(UNSPLASH_KEY.into()),
            base_url: UNREACHABLE.into(),
        },
    );
    let model = ScriptedModel::new(vec![Ok(trip_json())]);
    let store = Arc::new(MemoryStore::new());
    let pipeline = TripPipeline::new(
        real_secrets(),
        model.clone(),
        Arc::new(images),
        store.clone(),
        COLLECTION,
    );

    let response = pipeline.handle(&Method::POST, &request_body()).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.to_string();
    assert!(!body.contains(UNSPLASH_KEY), "{body}");
    assert_eq!(model.calls(), 1);
    assert!(store.is_empty(COLLECTION));
}
