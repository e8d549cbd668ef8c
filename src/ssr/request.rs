//! Inbound platform requests and their normalized form.

use crate::transport::TransportError;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::fmt;
use std::sync::{Arc, Mutex};
use url::Url;

/// Raw request body as a byte stream.
pub type ByteStream = BoxStream<'static, Bytes>;

/// Take-once handle to a request body stream.
///
/// Clones share the same stream; whichever clone calls [`RequestBody::take`] first
/// gets it. This mirrors a Fetch request body, which can be read only once.
#[derive(Clone)]
pub struct RequestBody {
    inner: Arc<Mutex<Option<ByteStream>>>,
}

impl RequestBody {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(stream))),
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(Box::pin(futures::stream::once(async move { Ok(bytes) })))
    }

    pub fn empty() -> Self {
        Self::new(Box::pin(futures::stream::empty()))
    }

    /// Take the stream, leaving the handle consumed.
    pub fn take(&self) -> Option<ByteStream> {
        match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn is_consumed(&self) -> bool {
        match self.inner.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// True when both handles refer to the same underlying stream.
    pub fn same_stream(&self, other: &RequestBody) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Buffer the whole body. A consumed body collects to empty bytes.
    pub async fn collect(&self) -> Result<Bytes> {
        let Some(mut stream) = self.take() else {
            return Ok(Bytes::new());
        };
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// A request as the hosting platform delivered it.
///
/// Headers are kept as ordered name/value pairs; a header with several values
/// appears several times. Values are raw bytes, since HTTP allows non-UTF-8 octets.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    /// Path and query, e.g. `/trips?page=2`.
    pub uri: String,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: RequestBody,
}

impl InboundRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: RequestBody::empty(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Adapt an axum/hyper request. The body stays a stream.
    pub fn from_http(request: http::Request<axum::body::Body>) -> Self {
        let (parts, body) = request.into_parts();
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let mut headers: Vec<(String, Vec<u8>)> = parts
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();
        // HTTP/2 carries the host in the :authority pseudo-header only.
        if !parts.headers.contains_key(http::header::HOST) {
            if let Some(authority) = parts.uri.authority() {
                headers.push(("host".to_string(), authority.as_str().as_bytes().to_vec()));
            }
        }

        let stream = body
            .into_data_stream()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())));

        Self {
            method: parts.method,
            uri,
            headers,
            body: RequestBody::new(Box::pin(stream)),
        }
    }

    fn host(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .and_then(|(_, value)| std::str::from_utf8(value).ok())
    }
}

/// Protocol-neutral request handed to render handlers.
///
/// GET and HEAD requests never carry a body.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl NormalizedRequest {
    /// Resolve the absolute URL from the host header and copy every header value.
    pub fn from_inbound(inbound: InboundRequest) -> Result<Self> {
        let host = inbound.host().unwrap_or("localhost");
        let base = Url::parse(&format!("https://{}", host)).map_err(|e| {
            Error::validation_with_context(
                format!("invalid host header: {}", e),
                ErrorContext::new()
                    .with_field_path("headers.host")
                    .with_source("ssr_request"),
            )
        })?;
        let url = base.join(&inbound.uri).map_err(|e| {
            Error::validation_with_context(
                format!("invalid request target: {}", e),
                ErrorContext::new()
                    .with_field_path("uri")
                    .with_source("ssr_request"),
            )
        })?;

        let mut headers = HeaderMap::with_capacity(inbound.headers.len());
        for (name, value) in &inbound.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::validation_with_context(
                    format!("invalid header name: {}", e),
                    ErrorContext::new()
                        .with_field_path(name.clone())
                        .with_source("ssr_request"),
                )
            })?;
            let header_value = HeaderValue::from_bytes(value).map_err(|e| {
                Error::validation_with_context(
                    format!("invalid header value: {}", e),
                    ErrorContext::new()
                        .with_field_path(name.clone())
                        .with_source("ssr_request"),
                )
            })?;
            headers.append(header_name, header_value);
        }

        let body = if inbound.method == Method::GET || inbound.method == Method::HEAD {
            None
        } else {
            Some(inbound.body)
        };

        Ok(Self {
            method: inbound.method,
            url,
            headers,
            body,
        })
    }

    /// Path plus query string of the resolved URL.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}
