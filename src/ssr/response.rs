//! What a render handler hands back.

use super::request::ByteStream;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::fmt;
use std::future::Future;

/// Pull-based byte stream: the caller asks for each chunk.
#[async_trait]
pub trait PullReader: Send {
    /// Next chunk, or `None` once the body is exhausted.
    async fn read(&mut self) -> Result<Option<Bytes>>;

    /// Called when the consumer stops reading early.
    async fn cancel(&mut self) {}
}

/// Body representation of a render result.
pub enum ResponseBody {
    /// Absent body; the response ends with no payload.
    Empty,
    /// Pull-based stream, adapted to push chunk by chunk.
    Pull(Box<dyn PullReader>),
    /// Push-based stream connected straight to the response.
    Push(ByteStream),
    /// Body that has to be materialized as text first. Failure ends the response empty.
    Text(BoxFuture<'static, Result<String>>),
}

impl ResponseBody {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        ResponseBody::Text(Box::pin(async move { Ok(text) }))
    }

    pub fn deferred_text<F>(future: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        ResponseBody::Text(Box::pin(future))
    }

    pub fn pull(reader: impl PullReader + 'static) -> Self {
        ResponseBody::Pull(Box::new(reader))
    }

    pub fn push(stream: ByteStream) -> Self {
        ResponseBody::Push(stream)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::Empty => "empty",
            ResponseBody::Pull(_) => "pull",
            ResponseBody::Push(_) => "push",
            ResponseBody::Text(_) => "text",
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseBody::{}", self.kind())
    }
}

/// Header collection of a render result.
#[derive(Debug, Clone)]
pub enum ResultHeaders {
    /// Typed, iterable header map.
    Map(HeaderMap),
    /// Loosely typed name/value fields; copied best-effort.
    Fields(Vec<(String, String)>),
}

impl Default for ResultHeaders {
    fn default() -> Self {
        ResultHeaders::Map(HeaderMap::new())
    }
}

impl ResultHeaders {
    /// Every header that can be represented; unusable fields are reported in the second list.
    pub fn resolve(self) -> (Vec<(HeaderName, HeaderValue)>, Vec<String>) {
        match self {
            ResultHeaders::Map(map) => {
                let mut out = Vec::with_capacity(map.len());
                let mut current: Option<HeaderName> = None;
                // `into_iter` yields the name only for the first value of each header.
                for (name, value) in map {
                    if let Some(name) = name {
                        current = Some(name);
                    }
                    if let Some(name) = current.clone() {
                        out.push((name, value));
                    }
                }
                (out, Vec::new())
            }
            ResultHeaders::Fields(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                let mut skipped = Vec::new();
                for (name, value) in fields {
                    match (
                        HeaderName::from_bytes(name.as_bytes()),
                        HeaderValue::from_str(&value),
                    ) {
                        (Ok(n), Ok(v)) => out.push((n, v)),
                        _ => skipped.push(name),
                    }
                }
                (out, skipped)
            }
        }
    }
}

/// Response-like value produced by a render handler.
///
/// `body: None` means the handler's result had no body field at all, which the
/// bridge rejects; an absent payload is `Some(ResponseBody::Empty)`.
#[derive(Debug, Default)]
pub struct RenderResult {
    /// HTTP status; `0` means unset and is sent as 200.
    pub status: u16,
    pub headers: ResultHeaders,
    pub body: Option<ResponseBody>,
}

impl RenderResult {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            status: status.as_u16(),
            headers: ResultHeaders::default(),
            body: Some(body),
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        let mut result = Self::new(StatusCode::OK, ResponseBody::text(text));
        result.headers = ResultHeaders::Map(HeaderMap::from_iter([(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )]));
        result
    }

    pub fn with_headers(mut self, headers: ResultHeaders) -> Self {
        self.headers = headers;
        self
    }
}
