//! Unsplash `/search/photos` client.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use super::ImageSearch;
use crate::config::{UnsplashConfig, UNSPLASH_ACCESS_KEY};
use crate::transport::{read_json, HttpTransport};
use crate::{Error, ErrorContext, Result};

const ACCEPT_VERSION: &str = "Accept-Version";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Photo {
    urls: Option<PhotoUrls>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoUrls {
    regular: Option<String>,
}

pub struct UnsplashClient {
    client: reqwest::Client,
    access_key: Option<String>,
    base_url: String,
}

impl UnsplashClient {
    pub fn new(transport: &HttpTransport, config: &UnsplashConfig) -> Self {
        Self {
            client: transport.client(),
            access_key: config.access_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl std::fmt::Debug for UnsplashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsplashClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Option<String>>> {
        let access_key = self.access_key.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                format!(
                    "{name} is not set. Please check your environment has {name}.",
                    name = UNSPLASH_ACCESS_KEY
                ),
                ErrorContext::new()
                    .with_field_path(UNSPLASH_ACCESS_KEY)
                    .with_source("unsplash"),
            )
        })?;

        let response = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .header(AUTHORIZATION, format!("Client-ID {}", access_key))
            .header(ACCEPT_VERSION, "v1")
            .query(&[("query", query)])
            .send()
            .await?;

        let body: SearchResponse = serde_json::from_value(read_json(response).await?)?;
        debug!(query, results = body.results.len(), "unsplash search");

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|photo| photo.urls.and_then(|u| u.regular))
            .collect())
    }
}
