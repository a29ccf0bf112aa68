// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP transport stage for the mq-stream client.
//!
//! [`HttpSource`] issues a request and feeds the response body downstream as
//! raw byte chunks; [`HttpSink`] streams the bytes it receives upstream out
//! as a request body and captures the response as its completion value.
//! [`fetch_json`] is the one-shot helper for administrative calls that have
//! no streaming semantics. Network failures and non-2xx statuses surface as
//! terminal transport errors; nothing here retries.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use mqs_error::MqError;
use mqs_pipeline::{Sink, Source, StageRx, StageTx};
use reqwest::header::HeaderMap;
use reqwest::{Body, Client, Method, Response, Url};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;

/// Max response-body bytes quoted in a status error.
const DETAIL_SNIPPET_LEN: usize = 200;

// ---------------------------------------------------------------------------
// RequestSpec
// ---------------------------------------------------------------------------

/// Everything needed to issue one request: url, method, headers.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Fully resolved request URL, query string included.
    pub url: Url,
    /// HTTP method.
    pub method: Method,
    /// Headers to send.
    pub headers: HeaderMap,
}

impl RequestSpec {
    /// Spec with no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
        }
    }

    /// Replace the header set.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut text = text.trim().to_string();
    if text.len() > DETAIL_SNIPPET_LEN {
        // Truncate on a char boundary.
        let mut cut = DETAIL_SNIPPET_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

async fn require_success(resp: Response) -> Result<Response, MqError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    Err(MqError::status(status.as_u16(), snippet(&body)))
}

// ---------------------------------------------------------------------------
// HttpSource
// ---------------------------------------------------------------------------

/// Pipeline source: issues a request and yields the response body as raw
/// byte chunks, in arrival order.
#[derive(Debug)]
pub struct HttpSource {
    client: Client,
    spec: RequestSpec,
}

impl HttpSource {
    /// Create a source for one request.
    pub fn new(client: Client, spec: RequestSpec) -> Self {
        Self { client, spec }
    }
}

#[async_trait]
impl Source for HttpSource {
    type Out = Bytes;

    async fn run(self, tx: StageTx<Bytes>) -> Result<(), MqError> {
        let resp = self
            .client
            .request(self.spec.method, self.spec.url)
            .headers(self.spec.headers)
            .send()
            .await?;
        let resp = require_success(resp).await?;

        let mut body = resp.bytes_stream();
        let mut total: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if total == 0 {
                tracing::debug!(target: "mqs.transport", "response body flow started");
            }
            total += chunk.len() as u64;
            tx.send(chunk).await?;
        }
        tracing::debug!(target: "mqs.transport", bytes = total, "response body flow stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HttpSink
// ---------------------------------------------------------------------------

/// Status and body of a completed request, captured by [`HttpSink`].
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// Response status code (always 2xx; anything else faulted the sink).
    pub status: u16,
    /// Full response body.
    pub body: Bytes,
}

impl HttpReply {
    /// Parse the body as one JSON value.
    pub fn json(&self) -> Result<Value, MqError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| MqError::parse(format!("response body is not valid JSON: {e}")))
    }
}

/// Pipeline sink: streams incoming bytes out as the request body and
/// resolves with the [`HttpReply`] once the service answers.
///
/// The request is only as complete as its body stream: cancellation drops
/// the in-flight request, so a faulted pipeline never delivers a
/// well-formed body to the service.
#[derive(Debug)]
pub struct HttpSink {
    client: Client,
    spec: RequestSpec,
}

impl HttpSink {
    /// Create a sink for one request.
    pub fn new(client: Client, spec: RequestSpec) -> Self {
        Self { client, spec }
    }
}

#[async_trait]
impl Sink for HttpSink {
    type In = Bytes;
    type Done = HttpReply;

    async fn run(self, rx: StageRx<Bytes>) -> Result<HttpReply, MqError> {
        let cancel = rx.cancel_token();
        let mut started = false;
        let mut total: u64 = 0;
        let body_stream = ReceiverStream::new(rx.into_inner()).map(move |chunk: Bytes| {
            if !started {
                started = true;
                tracing::debug!(target: "mqs.transport", "request body flow started");
            }
            total += chunk.len() as u64;
            Ok::<Bytes, std::convert::Infallible>(chunk)
        });

        let request = self
            .client
            .request(self.spec.method, self.spec.url)
            .headers(self.spec.headers)
            .body(Body::wrap_stream(body_stream))
            .send();

        let resp = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MqError::Aborted),
            resp = request => resp?,
        };
        tracing::debug!(target: "mqs.transport", "request body flow stopped");

        let status = resp.status();
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(MqError::Aborted),
            body = resp.bytes() => body?,
        };
        if !status.is_success() {
            return Err(MqError::status(status.as_u16(), snippet(&body)));
        }
        Ok(HttpReply {
            status: status.as_u16(),
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// One-shot helper
// ---------------------------------------------------------------------------

/// Issue one request, await the full response, and parse it as one JSON
/// value. No streaming, no backpressure; used for administrative calls.
pub async fn fetch_json(client: &Client, spec: RequestSpec) -> Result<Value, MqError> {
    let resp = client
        .request(spec.method, spec.url)
        .headers(spec.headers)
        .send()
        .await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(MqError::status(status.as_u16(), snippet(&body)));
    }
    if body.is_empty() {
        return Err(MqError::parse("response body is empty, expected JSON"));
    }
    serde_json::from_slice(&body)
        .map_err(|e| MqError::parse(format!("response body is not valid JSON: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mqs_pipeline::PipelineBuilder;
    use serde_json::json;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec_for(server: &MockServer, m: Method, p: &str) -> RequestSpec {
        let url = Url::parse(&format!("{}{p}", server.uri())).unwrap();
        RequestSpec::new(m, url)
    }

    #[tokio::test]
    async fn source_streams_response_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let source = HttpSource::new(Client::new(), spec_for(&server, Method::GET, "/data"));
        let chunks = PipelineBuilder::from_source(source)
            .into_stream()
            .collect_all()
            .await
            .unwrap();
        let body: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(body, br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn source_faults_on_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let source = HttpSource::new(Client::new(), spec_for(&server, Method::GET, "/data"));
        let err = PipelineBuilder::from_source(source)
            .into_stream()
            .collect_all()
            .await
            .unwrap_err();
        match err {
            MqError::Status { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "try later");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn source_faults_on_connection_refused() {
        // Nothing listens on this port.
        let url = Url::parse("http://127.0.0.1:1/messages").unwrap();
        let source = HttpSource::new(Client::new(), RequestSpec::new(Method::GET, url));
        let err = PipelineBuilder::from_source(source)
            .into_stream()
            .collect_all()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), mqs_error::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn sink_streams_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_string("part-one;part-two"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"msg":"ok"}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(Client::new(), spec_for(&server, Method::POST, "/messages"));
        let (head, builder) = PipelineBuilder::open(4);
        let run = builder.drive(sink);

        head.send(Bytes::from_static(b"part-one;")).await.unwrap();
        head.send(Bytes::from_static(b"part-two")).await.unwrap();
        head.close();

        let reply = run.join().await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.json().unwrap(), json!({"msg":"ok"}));
    }

    #[tokio::test]
    async fn sink_faults_on_non_2xx_after_sending() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such queue"))
            .mount(&server)
            .await;

        let sink = HttpSink::new(Client::new(), spec_for(&server, Method::DELETE, "/messages"));
        let (head, builder) = PipelineBuilder::open(4);
        let run = builder.drive(sink);
        head.send(Bytes::from_static(b"{}")).await.unwrap();
        head.close();

        let err = run.join().await.unwrap_err();
        assert!(matches!(err, MqError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn sink_delete_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/messages"))
            .and(body_string("{\n\"ids\":\n[\"1\"]\n}\n"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"msg":"Deleted"}"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(Client::new(), spec_for(&server, Method::DELETE, "/messages"));
        let (head, builder) = PipelineBuilder::open(4);
        let run = builder.drive(sink);
        head.send(Bytes::from_static(b"{\n\"ids\":\n[\"1\"]\n}\n"))
            .await
            .unwrap();
        head.close();
        run.join().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_json_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/clear"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"msg":"Cleared"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let value = fetch_json(&Client::new(), spec_for(&server, Method::POST, "/clear"))
            .await
            .unwrap();
        assert_eq!(value, json!({"msg":"Cleared"}));
    }

    #[tokio::test]
    async fn fetch_json_distinguishes_parse_from_transport() {
        let server = MockServer::start().await;
        Mock::given(path("/bad-json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = fetch_json(&client, spec_for(&server, Method::POST, "/bad-json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), mqs_error::ErrorKind::Parse);

        let err = fetch_json(&client, spec_for(&server, Method::POST, "/empty"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), mqs_error::ErrorKind::Parse);

        let err = fetch_json(&client, spec_for(&server, Method::POST, "/down"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), mqs_error::ErrorKind::Transport);
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(long.as_bytes());
        assert!(s.len() <= DETAIL_SNIPPET_LEN + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet(b"  short  "), "short");
    }
}
