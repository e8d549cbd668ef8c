//! SSR bridge behavior against a recording response sink.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trip_edge::ssr::{
    invoke, InboundRequest, LegacyRenderArgs, NormalizedRequest, PullReader, RenderHandler,
    RenderResult, RequestBody, ResponseBody, ResponseSink, ResultHeaders, SsrBridge,
    HANDLER_NOT_FOUND_MESSAGE, INTERNAL_ERROR_MESSAGE, INVALID_RESULT_MESSAGE,
};
use trip_edge::transport::TransportError;
use trip_edge::{Error, Result};

#[derive(Default)]
struct RecordingSink {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    writes: Vec<Bytes>,
    ended: bool,
    aborted: Option<String>,
    head_sent: bool,
    /// Writes beyond this many fail as if the client disconnected.
    accept_writes: Option<usize>,
}

impl RecordingSink {
    fn body(&self) -> String {
        self.writes
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<()> {
        if self.head_sent {
            return Err(Error::protocol("headers already sent"));
        }
        self.headers
            .push((name.to_string(), value.to_str().unwrap_or_default().to_string()));
        Ok(())
    }

    fn clear_headers(&mut self) {
        self.headers.clear();
    }

    fn head_sent(&self) -> bool {
        self.head_sent
    }

    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.head_sent = true;
        if let Some(limit) = self.accept_writes {
            if self.writes.len() >= limit {
                return Err(Error::Transport(TransportError::Closed));
            }
        }
        self.writes.push(chunk);
        Ok(())
    }

    async fn end(&mut self, chunk: Option<Bytes>) -> Result<()> {
        if let Some(chunk) = chunk {
            self.write(chunk).await?;
        }
        self.head_sent = true;
        self.ended = true;
        Ok(())
    }

    async fn abort(&mut self, error: Error) {
        self.aborted = Some(error.to_string());
    }
}

type RenderFn = dyn Fn(NormalizedRequest) -> Result<Option<RenderResult>> + Send + Sync;

struct FnHandler {
    render: Box<RenderFn>,
    legacy: Option<Box<RenderFn>>,
    legacy_calls: AtomicUsize,
}

impl FnHandler {
    fn new(
        render: impl Fn(NormalizedRequest) -> Result<Option<RenderResult>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            render: Box::new(render),
            legacy: None,
            legacy_calls: AtomicUsize::new(0),
        }
    }

    fn with_legacy(
        mut self,
        legacy: impl Fn(NormalizedRequest) -> Result<Option<RenderResult>> + Send + Sync + 'static,
    ) -> Self {
        self.legacy = Some(Box::new(legacy));
        self
    }
}

#[async_trait]
impl RenderHandler for FnHandler {
    async fn render(&self, request: NormalizedRequest) -> Result<Option<RenderResult>> {
        (self.render)(request)
    }

    async fn render_legacy(
        &self,
        request: NormalizedRequest,
        args: LegacyRenderArgs,
    ) -> Result<Option<RenderResult>> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(args.status, StatusCode::OK);
        assert!(args.headers.is_empty());
        match &self.legacy {
            Some(legacy) => legacy(request),
            None => Err(Error::protocol("legacy failed")),
        }
    }
}

struct VecReader {
    chunks: VecDeque<Bytes>,
    reads: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl VecReader {
    fn new(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect(),
            reads: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl PullReader for VecReader {
    async fn read(&mut self) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.pop_front())
    }

    async fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn page_request() -> InboundRequest {
    InboundRequest::new(Method::GET, "/trips?page=2").with_header("host", "planner.test")
}

async fn run(bridge: &SsrBridge, inbound: InboundRequest) -> RecordingSink {
    let mut sink = RecordingSink::default();
    bridge.handle(inbound, &mut sink).await;
    sink
}

#[tokio::test]
async fn text_body_is_written_with_status() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::text("hello"))))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::OK));
    assert_eq!(sink.body(), "hello");
    assert!(sink.ended);
}

#[tokio::test]
async fn missing_result_answers_500() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| Ok(None))));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(sink.body(), INVALID_RESULT_MESSAGE);
    assert!(sink.ended);
}

#[tokio::test]
async fn result_without_body_field_answers_500() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult {
            status: 200,
            headers: ResultHeaders::default(),
            body: None,
        }))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(sink.body(), INVALID_RESULT_MESSAGE);
}

#[tokio::test]
async fn missing_handler_answers_500() {
    let sink = run(&SsrBridge::without_handler(), page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(sink.body(), HANDLER_NOT_FOUND_MESSAGE);
}

#[tokio::test]
async fn empty_body_ends_without_payload() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult::new(StatusCode::NO_CONTENT, ResponseBody::Empty)))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::NO_CONTENT));
    assert!(sink.writes.is_empty());
    assert!(sink.ended);
}

#[tokio::test]
async fn unset_status_defaults_to_200() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult {
            status: 0,
            headers: ResultHeaders::default(),
            body: Some(ResponseBody::text("ok")),
        }))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::OK));
}

#[tokio::test]
async fn pull_body_is_written_chunk_by_chunk_in_order() {
    let reader = VecReader::new(&["A", "B", "C"]);
    let reads = reader.reads.clone();
    let reader = Mutex::new(Some(reader));
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |_| {
        let reader = reader.lock().unwrap().take().unwrap();
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::pull(reader))))
    })));

    let sink = run(&bridge, page_request()).await;
    let chunks: Vec<_> = sink.writes.iter().map(|b| b.as_ref().to_vec()).collect();
    assert_eq!(chunks, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
    assert!(sink.ended);
    // Three chunks plus the final `None`.
    assert_eq!(reads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn push_body_is_forwarded() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        let stream = futures::stream::iter(vec![
            Ok::<_, Error>(Bytes::from("<html>")),
            Ok(Bytes::from("</html>")),
        ]);
        Ok(Some(RenderResult::new(
            StatusCode::OK,
            ResponseBody::push(Box::pin(stream)),
        )))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.writes.len(), 2);
    assert_eq!(sink.body(), "<html></html>");
    assert!(sink.ended);
}

#[tokio::test]
async fn text_failure_ends_empty() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult::new(
            StatusCode::OK,
            ResponseBody::deferred_text(async { Err(Error::runtime("body unreadable")) }),
        )))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::OK));
    assert!(sink.writes.is_empty());
    assert!(sink.ended);
}

#[tokio::test]
async fn client_disconnect_stops_pulling() {
    let reader = VecReader::new(&["A", "B", "C", "D", "E"]);
    let reads = reader.reads.clone();
    let cancelled = reader.cancelled.clone();
    let reader = Mutex::new(Some(reader));
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |_| {
        let reader = reader.lock().unwrap().take().unwrap();
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::pull(reader))))
    })));

    let mut sink = RecordingSink {
        accept_writes: Some(1),
        ..Default::default()
    };
    bridge.handle(page_request(), &mut sink).await;

    assert_eq!(sink.body(), "A");
    assert_eq!(reads.load(Ordering::SeqCst), 2);
    assert!(cancelled.load(Ordering::SeqCst));
    assert!(!sink.ended);
    assert!(sink.aborted.is_none());
    assert_eq!(sink.status, Some(StatusCode::OK));
}

#[tokio::test]
async fn push_failure_after_head_aborts_the_body() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        let stream = futures::stream::iter(vec![
            Ok::<_, Error>(Bytes::from("<p>partial")),
            Err(Error::runtime("render crashed")),
            Ok(Bytes::from("</p>")),
        ]);
        Ok(Some(RenderResult::new(
            StatusCode::OK,
            ResponseBody::push(Box::pin(stream)),
        )))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.body(), "<p>partial");
    assert!(!sink.ended);
    assert!(sink.aborted.as_deref().is_some_and(|e| e.contains("render crashed")));
    assert_eq!(sink.status, Some(StatusCode::OK));
}

#[tokio::test]
async fn pull_failure_after_head_aborts_the_body() {
    struct FailingReader {
        served: bool,
    }

    #[async_trait]
    impl PullReader for FailingReader {
        async fn read(&mut self) -> Result<Option<Bytes>> {
            if self.served {
                return Err(Error::runtime("reader broke"));
            }
            self.served = true;
            Ok(Some(Bytes::from("A")))
        }
    }

    let reader = Mutex::new(Some(FailingReader { served: false }));
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |_| {
        let reader = reader.lock().unwrap().take().unwrap();
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::pull(reader))))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.body(), "A");
    assert!(!sink.ended);
    assert!(sink.aborted.is_some());
}

#[tokio::test]
async fn headers_are_copied_with_every_value() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        Ok(Some(
            RenderResult::new(StatusCode::OK, ResponseBody::text("x"))
                .with_headers(ResultHeaders::Map(headers)),
        ))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.header("set-cookie"), vec!["a=1", "b=2"]);
    assert_eq!(sink.header("content-type"), vec!["text/html"]);
}

#[tokio::test]
async fn unusable_header_fields_do_not_abort_the_response() {
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(|_| {
        Ok(Some(
            RenderResult::new(StatusCode::OK, ResponseBody::text("still here")).with_headers(
                ResultHeaders::Fields(vec![
                    ("x-good".into(), "1".into()),
                    ("bad header".into(), "2".into()),
                ]),
            ),
        ))
    })));
    let sink = run(&bridge, page_request()).await;
    assert_eq!(sink.header("x-good"), vec!["1"]);
    assert_eq!(sink.headers.len(), 1);
    assert_eq!(sink.body(), "still here");
}

#[tokio::test]
async fn legacy_convention_is_tried_when_primary_fails() {
    let handler = Arc::new(
        FnHandler::new(|_| Err(Error::protocol("primary signature rejected")))
            .with_legacy(|_| Ok(Some(RenderResult::html("<p>legacy</p>")))),
    );
    let bridge = SsrBridge::new(handler.clone());
    let sink = run(&bridge, page_request()).await;
    assert_eq!(handler.legacy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.body(), "<p>legacy</p>");
    assert_eq!(sink.header("content-type"), vec!["text/html; charset=utf-8"]);
}

#[tokio::test]
async fn legacy_is_not_tried_when_primary_succeeds() {
    let handler = Arc::new(FnHandler::new(|_| {
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::text("ok"))))
    }));
    let bridge = SsrBridge::new(handler.clone());
    run(&bridge, page_request()).await;
    assert_eq!(handler.legacy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn primary_error_wins_when_both_conventions_fail() {
    let handler = FnHandler::new(|_| Err(Error::runtime("primary boom")))
        .with_legacy(|_| Err(Error::runtime("legacy boom")));
    let request = NormalizedRequest::from_inbound(page_request()).unwrap();
    let err = invoke(&handler, request).await.unwrap_err();
    assert_eq!(err.message(), "primary boom");

    let sink = run(&SsrBridge::new(Arc::new(handler)), page_request()).await;
    assert_eq!(sink.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(sink.body(), INTERNAL_ERROR_MESSAGE);
}

#[tokio::test]
async fn get_and_head_carry_no_body() {
    for method in [Method::GET, Method::HEAD] {
        let seen = Arc::new(Mutex::new(None));
        let seen_by_handler = seen.clone();
        let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |req| {
            *seen_by_handler.lock().unwrap() = Some(req.body.is_some());
            Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::Empty)))
        })));
        let inbound = InboundRequest::new(method, "/")
            .with_header("host", "planner.test")
            .with_body(RequestBody::from_bytes("ignored"));
        run(&bridge, inbound).await;
        assert_eq!(*seen.lock().unwrap(), Some(false));
    }
}

#[tokio::test]
async fn other_methods_get_the_original_body_stream() {
    let original = RequestBody::from_bytes("name=lisbon");
    let expected = original.clone();
    let matched = Arc::new(AtomicBool::new(false));
    let matched_by_handler = matched.clone();
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |req| {
        let same = req
            .body
            .as_ref()
            .is_some_and(|body| body.same_stream(&expected) && !body.is_consumed());
        matched_by_handler.store(same, Ordering::SeqCst);
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::Empty)))
    })));
    let inbound = InboundRequest::new(Method::POST, "/trips/create")
        .with_header("host", "planner.test")
        .with_body(original);
    run(&bridge, inbound).await;
    assert!(matched.load(Ordering::SeqCst));
}

#[tokio::test]
async fn handler_sees_absolute_url_and_headers() {
    let seen = Arc::new(Mutex::new(None));
    let seen_by_handler = seen.clone();
    let bridge = SsrBridge::new(Arc::new(FnHandler::new(move |req| {
        *seen_by_handler.lock().unwrap() = Some((
            req.url.to_string(),
            req.headers.get_all("accept-language").iter().count(),
        ));
        Ok(Some(RenderResult::new(StatusCode::OK, ResponseBody::Empty)))
    })));
    let inbound = page_request()
        .with_header("accept-language", "en")
        .with_header("accept-language", "pt");
    run(&bridge, inbound).await;
    let (url, languages) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(url, "https://planner.test/trips?page=2");
    assert_eq!(languages, 2);
}
