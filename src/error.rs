use crate::error_code::StandardErrorCode;
use crate::transport::TransportError;
use thiserror::Error;

/// User-facing message for exhausted rate-limit retries.
pub const RATE_LIMIT_MESSAGE: &str = "API rate limit exceeded. Please wait a minute and try again.";

/// User-facing message for quota exhaustion.
pub const QUOTA_MESSAGE: &str =
    "You've exceeded your API quota. Please wait a moment and try again.";

/// Fallback message when a failure carries no text.
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred";

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.country", "gemini.api_key")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., upstream status, finish reason)
    pub details: Option<String>,
    /// Source of the error (e.g., "ssr_bridge", "trip_parser")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the edge runtime.
///
/// Every failure of the SSR bridge and the trip pipeline ends up here; the request
/// handlers turn it into a 500 response through [`Error::user_message`].
#[derive(Debug, Error)]
pub enum Error {
    /// Render handler missing, or its result is malformed.
    #[error("SSR protocol error: {message}{}", format_context(.context))]
    Protocol {
        message: String,
        context: ErrorContext,
    },

    /// Missing secret or unusable configuration.
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Inbound request could not be decoded or normalized.
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// Upstream throttling. The only error kind the pipeline retries.
    #[error("{message}")]
    RateLimited { message: String },

    #[error("Remote error: HTTP {status} ({class}): {message}")]
    Remote {
        status: u16,
        class: StandardErrorCode,
        message: String,
    },

    /// Model output does not conform to the expected trip shape.
    #[error("Parse error: {message}{}", format_context(.context))]
    Parse {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(e))
    }
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::protocol_with_context(msg, ErrorContext::new().with_source("ssr_bridge"))
    }

    pub fn protocol_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Protocol {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn parse_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Parse {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Error::RateLimited {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Protocol { context, .. }
            | Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Parse { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The bare message, without the category prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            Error::Protocol { message, .. }
            | Error::Configuration { message, .. }
            | Error::Validation { message, .. }
            | Error::Parse { message, .. }
            | Error::Runtime { message, .. }
            | Error::RateLimited { message, .. }
            | Error::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this failure is upstream throttling.
    ///
    /// Typed signals win. Errors without structure still count when their text carries
    /// a 429 status or a `RATE_LIMIT` marker.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Remote { class, .. } => *class == StandardErrorCode::RateLimited,
            Error::Configuration { .. } | Error::Validation { .. } | Error::Protocol { .. } => {
                false
            }
            other => {
                let text = other.to_string();
                text.contains("429") || text.contains("RATE_LIMIT")
            }
        }
    }

    /// Whether this failure is an exhausted account quota.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            Error::Remote { class, .. } => *class == StandardErrorCode::QuotaExhausted,
            _ => false,
        }
    }

    /// Upstream classification, when the failure came from a remote service.
    pub fn error_code(&self) -> Option<StandardErrorCode> {
        match self {
            Error::RateLimited { .. } => Some(StandardErrorCode::RateLimited),
            Error::Remote { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// True when the consumer of a streamed response went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Closed))
    }

    /// Message returned to API clients: rate limit, quota or the failure's own message.
    pub fn user_message(&self) -> String {
        let message = self.message();
        if self.is_rate_limited()
            || message.contains("rate limit")
            || message.contains("429")
            || message.contains("RATE_LIMIT")
        {
            return RATE_LIMIT_MESSAGE.to_string();
        }
        if self.is_quota_exhausted() || message.contains("quota") {
            return QUOTA_MESSAGE.to_string();
        }
        if message.is_empty() {
            return UNKNOWN_MESSAGE.to_string();
        }
        message
    }
}
