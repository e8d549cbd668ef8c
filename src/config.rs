//! Process configuration.
//!
//! Loaded once at startup: `.env.local` / `.env` are read through `dotenv`, an optional
//! YAML file named by `TRIP_EDGE_CONFIG` provides the base, and environment variables
//! override individual keys. The two API secrets are optional here; the trip pipeline
//! enforces them per request.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const UNSPLASH_ACCESS_KEY: &str = "UNSPLASH_ACCESS_KEY";
pub const CONFIG_PATH_ENV: &str = "TRIP_EDGE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub gemini: GeminiConfig,
    pub unsplash: UnsplashConfig,
    pub appwrite: AppwriteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Render server the SSR bridge forwards page requests to.
    pub ssr_upstream_url: Option<String>,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            ssr_upstream_url: None,
            log_filter: "info,trip_edge=debug".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    pub proxy_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            proxy_url: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// Ask for `application/json` output instead of free text.
    pub json_output: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            temperature: None,
            max_output_tokens: None,
            json_output: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsplashConfig {
    pub access_key: Option<String>,
    pub base_url: String,
}

impl Default for UnsplashConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            base_url: "https://api.unsplash.com".into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppwriteConfig {
    pub endpoint: String,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub database_id: String,
    pub trip_collection_id: String,
    pub user_collection_id: String,
}

impl Default for AppwriteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloud.appwrite.io/v1".into(),
            project_id: None,
            api_key: None,
            database_id: "trips-db".into(),
            trip_collection_id: "trips".into(),
            user_collection_id: "users".into(),
        }
    }
}

impl AppwriteConfig {
    /// A project id is the minimum needed to talk to a hosted store.
    pub fn is_configured(&self) -> bool {
        self.project_id.is_some()
    }
}

// Secrets never reach logs through Debug.
fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("json_output", &self.json_output)
            .finish()
    }
}

impl fmt::Debug for UnsplashConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsplashConfig")
            .field("access_key", &redact(&self.access_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for AppwriteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppwriteConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &redact(&self.api_key))
            .field("database_id", &self.database_id)
            .field("trip_collection_id", &self.trip_collection_id)
            .field("user_collection_id", &self.user_collection_id)
            .finish()
    }
}

/// The two secrets the trip pipeline needs before it may call anything.
#[derive(Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub unsplash_access_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("unsplash_access_key", &redact(&self.unsplash_access_key))
            .finish()
    }
}

impl Secrets {
    /// Fails on the first missing secret, Gemini first.
    pub fn verify(&self) -> Result<()> {
        for (name, value) in [
            (GEMINI_API_KEY, &self.gemini_api_key),
            (UNSPLASH_ACCESS_KEY, &self.unsplash_access_key),
        ] {
            if value.is_none() {
                return Err(Error::configuration_with_context(
                    format!(
                        "{name} is not set. Please check your environment has {name}."
                    ),
                    ErrorContext::new()
                        .with_field_path(name)
                        .with_source("secrets"),
                ));
            }
        }
        Ok(())
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_none() {
            missing.push(GEMINI_API_KEY);
        }
        if self.unsplash_access_key.is_none() {
            missing.push(UNSPLASH_ACCESS_KEY);
        }
        missing
    }
}

impl AppConfig {
    /// Load `.env` files, the optional YAML file and the environment overlay.
    pub fn load() -> Result<Self> {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_field_path(path.display().to_string()),
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid configuration file: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    /// Override keys from an environment lookup. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = get("SSR_UPSTREAM_URL") {
            self.server.ssr_upstream_url = Some(v);
        }
        if let Some(v) = get("RUST_LOG") {
            self.server.log_filter = v;
        }

        if let Some(v) = get("TRIP_EDGE_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.http.timeout_secs = v;
        }
        if let Some(v) = get("TRIP_EDGE_PROXY_URL") {
            self.http.proxy_url = Some(v);
        }

        if let Some(v) = get(GEMINI_API_KEY) {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            self.gemini.base_url = v;
        }
        if let Some(v) = get("GEMINI_TEMPERATURE").and_then(|s| s.parse().ok()) {
            self.gemini.temperature = Some(v);
        }

        if let Some(v) = get(UNSPLASH_ACCESS_KEY) {
            self.unsplash.access_key = Some(v);
        }
        if let Some(v) = get("UNSPLASH_BASE_URL") {
            self.unsplash.base_url = v;
        }

        if let Some(v) = get("APPWRITE_ENDPOINT") {
            self.appwrite.endpoint = v;
        }
        if let Some(v) = get("APPWRITE_PROJECT_ID") {
            self.appwrite.project_id = Some(v);
        }
        if let Some(v) = get("APPWRITE_API_KEY") {
            self.appwrite.api_key = Some(v);
        }
        if let Some(v) = get("APPWRITE_DATABASE_ID") {
            self.appwrite.database_id = v;
        }
        if let Some(v) = get("APPWRITE_TRIP_COLLECTION_ID") {
            self.appwrite.trip_collection_id = v;
        }
        if let Some(v) = get("APPWRITE_USER_COLLECTION_ID") {
            self.appwrite.user_collection_id = v;
        }
    }

    pub fn secrets(&self) -> Secrets {
        Secrets {
            gemini_api_key: self.gemini.api_key.clone(),
            unsplash_access_key: self.unsplash.access_key.clone(),
        }
    }
}
