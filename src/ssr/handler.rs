//! Render handlers and the primary/legacy invocation negotiation.

use super::request::{ByteStream, NormalizedRequest};
use super::response::{RenderResult, ResponseBody, ResultHeaders};
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::{header, HeaderMap, StatusCode};
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tracing::debug;
use url::Url;

/// Extra positional arguments of the legacy calling convention.
#[derive(Debug, Clone)]
pub struct LegacyRenderArgs {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub load_context: Value,
    pub entry_context: Value,
}

impl Default for LegacyRenderArgs {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            load_context: json!({}),
            entry_context: json!({}),
        }
    }
}

/// A page render handler.
///
/// `Ok(None)` means the handler produced no result at all.
#[async_trait]
pub trait RenderHandler: Send + Sync {
    async fn render(&self, request: NormalizedRequest) -> Result<Option<RenderResult>>;

    /// Older entry points that take the status, headers and contexts positionally.
    async fn render_legacy(
        &self,
        request: NormalizedRequest,
        args: LegacyRenderArgs,
    ) -> Result<Option<RenderResult>> {
        let _ = (request, args);
        Err(Error::protocol(
            "legacy calling convention not supported by this handler",
        ))
    }
}

/// Call the primary convention, falling back to the legacy one on failure.
///
/// When both fail the primary error is returned; it is the more meaningful diagnostic.
pub async fn invoke(
    handler: &dyn RenderHandler,
    request: NormalizedRequest,
) -> Result<Option<RenderResult>> {
    match handler.render(request.clone()).await {
        Ok(result) => Ok(result),
        Err(primary) => {
            debug!(target: "ssr", error = %primary, "primary render failed, trying legacy convention");
            match handler
                .render_legacy(request, LegacyRenderArgs::default())
                .await
            {
                Ok(result) => Ok(result),
                Err(fallback) => {
                    debug!(target: "ssr", error = %fallback, "legacy render failed");
                    Err(primary)
                }
            }
        }
    }
}

// Hop-by-hop headers are not forwarded in either direction.
const HOP_BY_HOP: [header::HeaderName; 5] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
];

/// Render handler that forwards to a separate render server over HTTP.
///
/// The upstream body is returned as a push stream, so pages stream through
/// without being buffered.
pub struct UpstreamRenderer {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamRenderer {
    pub fn new(transport: &HttpTransport, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid SSR upstream url: {}", e),
                ErrorContext::new()
                    .with_field_path("server.ssr_upstream_url")
                    .with_source("ssr_upstream"),
            )
        })?;
        Ok(Self {
            client: transport.client(),
            base_url,
        })
    }

    fn target(&self, request: &NormalizedRequest) -> Result<Url> {
        self.base_url.join(&request.path_and_query()).map_err(|e| {
            Error::protocol_with_context(
                format!("cannot build upstream url: {}", e),
                ErrorContext::new().with_source("ssr_upstream"),
            )
        })
    }
}

/// Lends `Sync` to a request body stream for the upstream client; the stream is only
/// ever polled through `&mut`.
struct SyncStream(Mutex<ByteStream>);

impl Stream for SyncStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let stream = match self.get_mut().0.get_mut() {
            Ok(stream) => stream,
            Err(poisoned) => poisoned.into_inner(),
        };
        stream.as_mut().poll_next(cx)
    }
}

#[async_trait]
impl RenderHandler for UpstreamRenderer {
    async fn render(&self, request: NormalizedRequest) -> Result<Option<RenderResult>> {
        let url = self.target(&request)?;

        let mut headers = request.headers.clone();
        for name in HOP_BY_HOP.iter() {
            headers.remove(name);
        }
        headers.remove(header::HOST);
        if let Some(host) = request.url.host_str() {
            if let Ok(value) = host.parse::<http::HeaderValue>() {
                headers.insert("x-forwarded-host", value);
            }
        }
        headers.insert(
            "x-forwarded-proto",
            http::HeaderValue::from_static("https"),
        );

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(stream) = request.body.as_ref().and_then(|body| body.take()) {
            builder = builder.body(reqwest::Body::wrap_stream(SyncStream(Mutex::new(stream))));
        }

        let response = builder
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status().as_u16();
        let mut response_headers = response.headers().clone();
        for name in HOP_BY_HOP.iter() {
            response_headers.remove(name);
        }
        // The body is re-framed by our own server.
        response_headers.remove(header::CONTENT_LENGTH);

        let stream = response
            .bytes_stream()
            .map_err(Error::from);

        Ok(Some(RenderResult {
            status,
            headers: ResultHeaders::Map(response_headers),
            body: Some(ResponseBody::Push(Box::pin(stream))),
        }))
    }
}
