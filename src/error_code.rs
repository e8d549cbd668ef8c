//! Typed classification of upstream failures.
//!
//! The Gemini, Unsplash and Appwrite clients map an HTTP status and, when the body
//! carries one, a provider status string onto a [`StandardErrorCode`]. The retry
//! decision in the trip pipeline is then a structural check on the code instead of
//! a text match on the error message.
//!
//! | Prefix | Category    | Description                    |
//! |--------|-------------|--------------------------------|
//! | E1xxx  | client      | Request-side errors            |
//! | E2xxx  | rate        | Rate limit and quota errors    |
//! | E3xxx  | server      | Provider-side errors           |
//! | E9xxx  | unknown     | Catch-all / unclassified       |
//!
//! ```rust
//! use trip_edge::error_code::StandardErrorCode;
//!
//! let code = StandardErrorCode::from_provider_code("RESOURCE_EXHAUSTED").unwrap();
//! assert_eq!(code.code(), "E2001");
//! assert_eq!(code.to_string(), "rate_limited");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: Malformed request, invalid parameters, or missing required fields
    InvalidRequest,
    /// E1002: Invalid, expired, or missing API key
    Authentication,
    /// E1003: Valid credentials but insufficient permissions
    PermissionDenied,
    /// E1004: Requested model, document or resource does not exist
    NotFound,
    /// E2001: Request rate limit exceeded
    RateLimited,
    /// E2002: Account usage quota or billing limit reached
    QuotaExhausted,
    /// E3001: Internal server error on provider side
    ServerError,
    /// E3002: Provider service temporarily overloaded
    Overloaded,
    /// E3003: Request timed out before response received
    Timeout,
    /// E9999: Error could not be classified
    Unknown,
}

impl StandardErrorCode {
    /// Returns the canonical code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RateLimited => "E2001",
            Self::QuotaExhausted => "E2002",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Unknown => "E9999",
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a provider status/type string onto a code.
    ///
    /// Understands the google.rpc status names returned by Gemini (`RESOURCE_EXHAUSTED`,
    /// `UNAVAILABLE`, ...) as well as the snake_case class names.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let code = match provider_code {
            "invalid_request" | "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "general_argument_invalid" => {
                Self::InvalidRequest
            }
            "authentication" | "UNAUTHENTICATED" | "user_unauthorized" => Self::Authentication,
            "permission_denied" | "PERMISSION_DENIED" => Self::PermissionDenied,
            "not_found" | "NOT_FOUND" | "document_not_found" | "collection_not_found" => {
                Self::NotFound
            }
            "rate_limited" | "RESOURCE_EXHAUSTED" | "general_rate_limit_exceeded" => {
                Self::RateLimited
            }
            "quota_exhausted" | "insufficient_quota" => Self::QuotaExhausted,
            "server_error" | "INTERNAL" | "general_unknown" => Self::ServerError,
            "overloaded" | "UNAVAILABLE" => Self::Overloaded,
            "timeout" | "DEADLINE_EXCEEDED" => Self::Timeout,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code to the most likely code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 => Self::Overloaded,
            _ => Self::Unknown,
        }
    }

    /// Provider string first, HTTP status as the fallback.
    pub fn classify(status: u16, provider_code: Option<&str>) -> Self {
        provider_code
            .and_then(Self::from_provider_code)
            .unwrap_or_else(|| Self::from_http_status(status))
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
