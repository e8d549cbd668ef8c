//! Server-side rendering bridge.
//!
//! [`SsrBridge::handle`] takes an [`InboundRequest`], normalizes it, asks a
//! [`RenderHandler`] for a [`RenderResult`] and writes that result into a
//! [`ResponseSink`]. It never returns an error: every failure is logged under the
//! `ssr` target and answered with a 500 when the head has not gone out yet. Once the
//! head is out, a failure aborts the body instead of ending it cleanly.

pub mod handler;
pub mod request;
pub mod response;
pub mod sink;

pub use handler::{invoke, LegacyRenderArgs, RenderHandler, UpstreamRenderer};
pub use request::{ByteStream, InboundRequest, NormalizedRequest, RequestBody};
pub use response::{PullReader, RenderResult, ResponseBody, ResultHeaders};
pub use sink::{ChannelSink, PendingResponse, ResponseSink};

use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use std::sync::Arc;
use tracing::{debug, error};

pub const HANDLER_NOT_FOUND_MESSAGE: &str =
    "SSR handler not found. Ensure the server bundle was built and configured.";
pub const INVALID_RESULT_MESSAGE: &str = "Invalid response from SSR handler";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Adapter between platform requests/responses and a render handler.
#[derive(Clone)]
pub struct SsrBridge {
    handler: Option<Arc<dyn RenderHandler>>,
}

impl SsrBridge {
    pub fn new(handler: Arc<dyn RenderHandler>) -> Self {
        Self {
            handler: Some(handler),
        }
    }

    /// A bridge with no render entry; every page request answers 500.
    pub fn without_handler() -> Self {
        Self { handler: None }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Serve one request into `sink`.
    pub async fn handle<S>(&self, inbound: InboundRequest, sink: &mut S)
    where
        S: ResponseSink + ?Sized,
    {
        let method = inbound.method.clone();
        let uri = inbound.uri.clone();

        let Err(err) = self.try_handle(inbound, sink).await else {
            return;
        };

        if err.is_disconnect() {
            debug!(target: "ssr", %method, %uri, "client went away while streaming");
            return;
        }
        error!(target: "ssr", %method, %uri, error = %err, "SSR request failed");

        if sink.head_sent() {
            sink.abort(err).await;
            return;
        }
        sink.clear_headers();
        sink.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        if let Err(e) = sink
            .end(Some(Bytes::from_static(INTERNAL_ERROR_MESSAGE.as_bytes())))
            .await
        {
            debug!(target: "ssr", error = %e, "could not deliver error response");
        }
    }

    async fn try_handle<S>(&self, inbound: InboundRequest, sink: &mut S) -> Result<()>
    where
        S: ResponseSink + ?Sized,
    {
        let Some(handler) = self.handler.as_ref() else {
            error!(target: "ssr", "{}", HANDLER_NOT_FOUND_MESSAGE);
            return answer(sink, StatusCode::INTERNAL_SERVER_ERROR, HANDLER_NOT_FOUND_MESSAGE).await;
        };

        let request = NormalizedRequest::from_inbound(inbound)?;
        let outcome = invoke(handler.as_ref(), request).await?;

        let Some(result) = outcome else {
            error!(target: "ssr", "render handler returned no result");
            return answer(sink, StatusCode::INTERNAL_SERVER_ERROR, INVALID_RESULT_MESSAGE).await;
        };
        let RenderResult {
            status,
            headers,
            body,
        } = result;
        let Some(body) = body else {
            error!(target: "ssr", "render result has no body field");
            return answer(sink, StatusCode::INTERNAL_SERVER_ERROR, INVALID_RESULT_MESSAGE).await;
        };

        let status = if status == 0 {
            StatusCode::OK
        } else {
            StatusCode::from_u16(status).map_err(|e| {
                Error::protocol_with_context(
                    format!("invalid status from render handler: {}", e),
                    ErrorContext::new()
                        .with_field_path("status")
                        .with_source("ssr"),
                )
            })?
        };
        sink.set_status(status);

        let (resolved, skipped) = headers.resolve();
        for name in skipped {
            debug!(target: "ssr", header = %name, "skipping header that cannot be represented");
        }
        for (name, value) in resolved {
            if let Err(e) = sink.append_header(name.clone(), value) {
                debug!(target: "ssr", header = %name, error = %e, "failed to copy header");
            }
        }

        deliver(body, sink).await
    }
}

impl std::fmt::Debug for SsrBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsrBridge")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

async fn answer<S>(sink: &mut S, status: StatusCode, message: &'static str) -> Result<()>
where
    S: ResponseSink + ?Sized,
{
    sink.clear_headers();
    sink.set_status(status);
    sink.end(Some(Bytes::from_static(message.as_bytes()))).await
}

async fn deliver<S>(body: ResponseBody, sink: &mut S) -> Result<()>
where
    S: ResponseSink + ?Sized,
{
    match body {
        ResponseBody::Empty => sink.end(None).await,
        ResponseBody::Pull(mut reader) => {
            while let Some(chunk) = reader.read().await? {
                if let Err(e) = sink.write(chunk).await {
                    // Consumer is gone: stop pulling.
                    reader.cancel().await;
                    return Err(e);
                }
            }
            sink.end(None).await
        }
        ResponseBody::Push(mut stream) => {
            while let Some(chunk) = stream.next().await {
                sink.write(chunk?).await?;
            }
            sink.end(None).await
        }
        ResponseBody::Text(text) => match text.await {
            Ok(text) => sink.end(Some(Bytes::from(text))).await,
            Err(e) => {
                debug!(target: "ssr", error = %e, "body could not be read as text, ending empty");
                sink.end(None).await
            }
        },
    }
}
