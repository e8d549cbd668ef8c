//! Text model drivers.
//!
//! The pipeline only needs "prompt in, text out"; the driver owns the provider's wire
//! format and turns its failures into typed errors so that throttling is a structural
//! check (`Error::RateLimited`) rather than a message match.

pub mod gemini;

use async_trait::async_trait;

use crate::Result;

pub use gemini::GeminiDriver;

/// A generative text model.
///
/// Implementations report upstream throttling as [`crate::Error::RateLimited`]; every
/// other failure is terminal for the request.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier used in logs.
    fn model_id(&self) -> &str;

    /// Generate a completion for a single-turn prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Sampling settings sent with every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// Ask the model for `application/json` output.
    pub json_output: bool,
}
