//! Platform response side of the bridge.

use crate::transport::TransportError;
use crate::{Error, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::sync::{mpsc, oneshot};

/// A platform response the bridge writes status, headers and body into.
///
/// Status and headers are buffered until the first body write or `end`; after that
/// the head is considered sent and header changes fail.
#[async_trait]
pub trait ResponseSink: Send {
    fn set_status(&mut self, status: StatusCode);

    /// Add a header value. Repeated names accumulate.
    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<()>;

    /// Drop every buffered header (used before answering an error).
    fn clear_headers(&mut self);

    fn head_sent(&self) -> bool;

    /// Write one chunk. Fails with a closed transport once the consumer is gone.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Finish the response, optionally with a last chunk.
    async fn end(&mut self, chunk: Option<Bytes>) -> Result<()>;

    /// Terminate a response whose head is already out so the client sees a failed
    /// transfer rather than a complete body.
    async fn abort(&mut self, error: Error);
}

/// Receiving half of a [`ChannelSink`]: resolves to the axum response once the head is sent.
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    /// Wait for the head. A sink dropped without sending one yields a bare 500.
    pub async fn into_response(self) -> Response {
        match self.head_rx.await {
            Ok(response) => response,
            Err(_) => {
                let mut response = Response::new(Body::from("Internal Server Error"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

/// [`ResponseSink`] feeding a streaming axum response through a bounded channel.
///
/// The channel holds at most `buffer` chunks, so a slow client applies backpressure
/// to the producer. Once the client goes away writes fail and the producer stops.
pub struct ChannelSink {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Response>>,
    body_tx: Option<mpsc::Sender<Result<Bytes>>>,
    body_rx: Option<mpsc::Receiver<Result<Bytes>>>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                head_tx: Some(head_tx),
                body_tx: Some(body_tx),
                body_rx: Some(body_rx),
            },
            PendingResponse { head_rx },
        )
    }

    fn send_head(&mut self) -> Result<()> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };
        let body = match self.body_rx.take() {
            Some(rx) => Body::from_stream(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })),
            None => Body::empty(),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        head_tx
            .send(response)
            .map_err(|_| Error::Transport(TransportError::Closed))
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<()> {
        if self.head_sent() {
            return Err(Error::protocol("headers already sent"));
        }
        self.headers.append(name, value);
        Ok(())
    }

    fn clear_headers(&mut self) {
        self.headers.clear();
    }

    fn head_sent(&self) -> bool {
        self.head_tx.is_none()
    }

    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.send_head()?;
        if chunk.is_empty() {
            return Ok(());
        }
        match &self.body_tx {
            Some(tx) => tx
                .send(Ok(chunk))
                .await
                .map_err(|_| Error::Transport(TransportError::Closed)),
            None => Err(Error::Transport(TransportError::Closed)),
        }
    }

    async fn end(&mut self, chunk: Option<Bytes>) -> Result<()> {
        match chunk {
            Some(chunk) if !chunk.is_empty() => self.write(chunk).await?,
            _ => self.send_head()?,
        }
        // Dropping the sender ends the body stream.
        self.body_tx.take();
        Ok(())
    }

    async fn abort(&mut self, error: Error) {
        if self.send_head().is_err() {
            return;
        }
        // An `Err` item fails the axum body; the server then resets the stream.
        if let Some(tx) = self.body_tx.take() {
            let _ = tx.send(Err(error)).await;
        }
    }
}
