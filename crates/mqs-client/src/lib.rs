// SPDX-License-Identifier: MIT OR Apache-2.0
//! Queue-level API for the mq-stream client.
//!
//! [`MqClient`] holds the authenticated connection to the queue service;
//! [`ProjectRef`] and [`Queue`] narrow it down to one queue. Each operation
//! on a [`Queue`] assembles an ephemeral, single-use pipeline:
//!
//! * [`Queue::read`] — GET, response decoded incrementally into a
//!   [`MessageStream`];
//! * [`Queue::write`] — POST, items wrapped into `{"body": ...}` envelopes
//!   and framed into one `{"messages":[...]}` body as they are sent;
//! * [`Queue::delete`] — DELETE, ids aggregated into one `{"ids":[...]}`
//!   body at batch close;
//! * [`Queue::clear`] — one-shot POST with a success-marker check.
//!
//! Validation fails fast: the token is checked at construction, the project
//! id and queue name at selection.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use mqs_codec::{DecodeStage, EncodeStage, Framing, SelectPath};
use mqs_config::ClientOptions;
use mqs_error::MqError;
use mqs_pipeline::{
    DEFAULT_STAGE_CAPACITY, DeleteAggregator, ItemStream, PipelineBuilder, PipelineHead,
    PipelineRun, WritePreparer,
};
use mqs_transport::{HttpReply, HttpSink, HttpSource, RequestSpec, fetch_json};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default batch size requested by [`Queue::read`].
pub const DEFAULT_READ_BATCH: u32 = 100;

/// Queue name used by [`ProjectRef::default_queue`].
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// Marker value the clear endpoint must answer with.
const CLEAR_MARKER: &str = "Cleared";

/// Lazy sequence of message objects produced by a read pipeline.
pub type MessageStream = ItemStream<Value>;

// ---------------------------------------------------------------------------
// QueryParams
// ---------------------------------------------------------------------------

/// Ordered query-string parameters for an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// No parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Just the read batch size, `n`.
    pub fn batch(n: u32) -> Self {
        Self::new().with("n", n)
    }

    /// Append one parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Whether any parameters are set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ---------------------------------------------------------------------------
// MqClient
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    base: Url,
    headers: HeaderMap,
}

/// Authenticated handle on the queue service.
///
/// Cheap to clone; all clones share one connection pool. Holds no mutable
/// state, so independent pipelines built from it never contend.
#[derive(Debug, Clone)]
pub struct MqClient {
    inner: Arc<ClientInner>,
}

impl MqClient {
    /// Connect to the service. Pass [`ClientOptions::default`] for the
    /// production endpoint.
    ///
    /// Fails fast on an empty or header-invalid token and on invalid
    /// options; nothing is deferred to the first request.
    pub fn new(token: &str, options: ClientOptions) -> Result<Self, MqError> {
        if token.trim().is_empty() {
            return Err(MqError::MissingToken);
        }
        options.validate()?;
        for warning in options.warnings() {
            tracing::warn!(target: "mqs.client", %warning, "suspicious endpoint configuration");
        }

        let base = Url::parse(&options.base_url())
            .map_err(|e| MqError::invalid_config(format!("invalid base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("OAuth {token}"))
            .map_err(|_| MqError::invalid_config("token is not a valid header value"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("mq-stream/", env!("CARGO_PKG_VERSION"))),
        );

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = options.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base,
                headers,
            }),
        })
    }

    /// Select a project. The id must be non-empty.
    pub fn project(&self, id: &str) -> Result<ProjectRef, MqError> {
        if id.trim().is_empty() {
            return Err(MqError::MissingProjectId);
        }
        Ok(ProjectRef {
            client: self.clone(),
            id: id.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// ProjectRef
// ---------------------------------------------------------------------------

/// One project within the queue service.
#[derive(Debug, Clone)]
pub struct ProjectRef {
    client: MqClient,
    id: String,
}

impl ProjectRef {
    /// Select a queue by name. The name must be non-empty.
    pub fn queue(&self, name: &str) -> Result<Queue, MqError> {
        if name.trim().is_empty() {
            return Err(MqError::MissingQueueName);
        }
        Ok(Queue {
            ctx: Arc::new(QueueContext {
                client: self.client.clone(),
                project: self.id.clone(),
                name: name.to_string(),
            }),
        })
    }

    /// The `"default"` queue.
    pub fn default_queue(&self) -> Queue {
        self.queue(DEFAULT_QUEUE_NAME)
            .expect("default queue name is non-empty")
    }

    /// Project id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Immutable reference to one queue: project id, queue name, base URL, and
/// header set. Shared read-only into every pipeline it creates.
#[derive(Debug)]
struct QueueContext {
    client: MqClient,
    project: String,
    name: String,
}

/// One queue, ready to build pipelines.
#[derive(Debug, Clone)]
pub struct Queue {
    ctx: Arc<QueueContext>,
}

impl Queue {
    /// Queue name.
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    fn url(&self, tail: &str, params: &QueryParams) -> Result<Url, MqError> {
        let mut url = self.ctx.client.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| MqError::invalid_config("base URL cannot carry path segments"))?
            .pop_if_empty()
            .extend(["projects", &self.ctx.project, "queues", &self.ctx.name, tail]);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    fn spec(&self, method: Method, url: Url) -> RequestSpec {
        RequestSpec::new(method, url).with_headers(self.ctx.client.inner.headers.clone())
    }

    /// Read messages with the default batch size (`n=100`).
    ///
    /// Messages read are not deleted; the service redelivers them after the
    /// visibility timeout unless [`Queue::delete`] confirms them.
    pub fn read(&self) -> Result<MessageStream, MqError> {
        self.read_with(&QueryParams::batch(DEFAULT_READ_BATCH))
    }

    /// Read messages with explicit query parameters.
    pub fn read_with(&self, params: &QueryParams) -> Result<MessageStream, MqError> {
        let url = self.url("messages", params)?;
        tracing::debug!(target: "mqs.client", queue = %self.ctx.name, %url, "starting read pipeline");
        let source = HttpSource::new(
            self.ctx.client.inner.http.clone(),
            self.spec(Method::GET, url),
        );
        let path = SelectPath::parse("messages.*")?;
        Ok(PipelineBuilder::from_source(source)
            .transform(DecodeStage::new(path))
            .into_stream())
    }

    /// Open a write pipeline.
    pub fn write(&self) -> Result<MessageWriter, MqError> {
        self.write_with(&QueryParams::new())
    }

    /// Open a write pipeline with explicit query parameters.
    pub fn write_with(&self, params: &QueryParams) -> Result<MessageWriter, MqError> {
        let url = self.url("messages", params)?;
        tracing::debug!(target: "mqs.client", queue = %self.ctx.name, %url, "starting write pipeline");
        let sink = HttpSink::new(
            self.ctx.client.inner.http.clone(),
            self.spec(Method::POST, url),
        );
        let (head, builder) = PipelineBuilder::open(DEFAULT_STAGE_CAPACITY);
        let run = builder
            .transform(WritePreparer::new())
            .transform(EncodeStage::new(Framing::messages_array()))
            .drive(sink);
        Ok(MessageWriter { head, run })
    }

    /// Open a delete pipeline.
    pub fn delete(&self) -> Result<IdBatch, MqError> {
        self.delete_with(&QueryParams::new())
    }

    /// Open a delete pipeline with explicit query parameters.
    pub fn delete_with(&self, params: &QueryParams) -> Result<IdBatch, MqError> {
        let url = self.url("messages", params)?;
        tracing::debug!(target: "mqs.client", queue = %self.ctx.name, %url, "starting delete pipeline");
        let sink = HttpSink::new(
            self.ctx.client.inner.http.clone(),
            self.spec(Method::DELETE, url),
        );
        let (head, builder) = PipelineBuilder::open(DEFAULT_STAGE_CAPACITY);
        let run = builder
            .transform(DeleteAggregator::new())
            .transform(EncodeStage::new(Framing::ids_value()))
            .drive(sink);
        Ok(IdBatch { head, run })
    }

    /// Remove every message from the queue.
    ///
    /// The service must answer `{"msg": "Cleared", ...}`; a well-formed
    /// response with any other marker is a [`MqError::Validation`] so
    /// callers can tell "request failed" apart from "request succeeded but
    /// did not clear".
    pub async fn clear(&self) -> Result<Value, MqError> {
        let url = self.url("clear", &QueryParams::new())?;
        tracing::debug!(target: "mqs.client", queue = %self.ctx.name, "clearing queue");
        let value = fetch_json(&self.ctx.client.inner.http, self.spec(Method::POST, url)).await?;
        match value.get("msg").and_then(Value::as_str) {
            Some(CLEAR_MARKER) => Ok(value),
            Some(other) => Err(MqError::validation(format!(
                "unexpected clear response marker `{other}`"
            ))),
            None => Err(MqError::validation("clear response is missing the `msg` marker")),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageWriter
// ---------------------------------------------------------------------------

/// Handle on an open write pipeline.
///
/// Items stream into the request body as they are sent; the request
/// completes when [`finish`](MessageWriter::finish) closes the frame. On any
/// error the whole write must be considered not persisted.
#[derive(Debug)]
pub struct MessageWriter {
    head: PipelineHead<Value>,
    run: PipelineRun<HttpReply>,
}

impl MessageWriter {
    /// Send one message, suspending on backpressure.
    pub async fn send<T: Serialize>(&self, item: T) -> Result<(), MqError> {
        let value = serde_json::to_value(item).map_err(MqError::Serialize)?;
        self.head.send(value).await
    }

    /// Close the body frame and await the service's acknowledgement,
    /// parsed as JSON.
    pub async fn finish(self) -> Result<Value, MqError> {
        let Self { head, run } = self;
        head.close();
        let reply = run.join().await?;
        reply.json()
    }
}

// ---------------------------------------------------------------------------
// IdBatch
// ---------------------------------------------------------------------------

/// Handle on an open delete pipeline.
///
/// Ids are buffered by the pipeline's aggregation stage and sent as one
/// array when [`finish`](IdBatch::finish) closes the batch; if anything
/// fails before that, no partial id set is ever sent.
#[derive(Debug)]
pub struct IdBatch {
    head: PipelineHead<Value>,
    run: PipelineRun<HttpReply>,
}

impl IdBatch {
    /// Add one message id to the batch. Scalars only; numbers are
    /// stringified on the wire.
    pub async fn push<T: Serialize>(&self, id: T) -> Result<(), MqError> {
        let value = serde_json::to_value(id).map_err(MqError::Serialize)?;
        self.head.send(value).await
    }

    /// Send the aggregated batch and await the service's acknowledgement,
    /// parsed as JSON.
    pub async fn finish(self) -> Result<Value, MqError> {
        let Self { head, run } = self;
        head.close();
        let reply = run.join().await?;
        reply.json()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
