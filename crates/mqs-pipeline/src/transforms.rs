// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in item-level transforms for the write and delete operations.

use crate::stage::{StageRx, StageTx, Transform};
use async_trait::async_trait;
use mqs_error::MqError;
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// WritePreparer
// ---------------------------------------------------------------------------

/// Wraps each item into the `{"body": <item>}` envelope the write endpoint
/// expects.
///
/// Structured values (objects and arrays) are serialised to a JSON string
/// first; strings and other scalars pass through unchanged. One in, one out,
/// no buffering, no reordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct WritePreparer;

impl WritePreparer {
    /// Create the transform.
    pub fn new() -> Self {
        Self
    }

    /// Wrap a single item.
    pub fn prepare(item: Value) -> Result<Value, MqError> {
        let body = match item {
            Value::Object(_) | Value::Array(_) => {
                Value::String(serde_json::to_string(&item).map_err(MqError::Serialize)?)
            }
            other => other,
        };
        Ok(json!({ "body": body }))
    }
}

#[async_trait]
impl Transform for WritePreparer {
    type In = Value;
    type Out = Value;

    async fn run(self, mut rx: StageRx<Value>, tx: StageTx<Value>) -> Result<(), MqError> {
        while let Some(item) = rx.recv().await? {
            tx.send(Self::prepare(item)?).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DeleteAggregator
// ---------------------------------------------------------------------------

/// Buffers every incoming id and emits one array of all ids at end-of-stream.
///
/// Scalars are coerced to strings (`101` becomes `"101"`); structured values
/// are rejected. The buffer is flushed exactly once, on a clean upstream
/// end-of-stream. If the pipeline faults first, the buffer is discarded so a
/// partial id set is never sent to the delete endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteAggregator;

impl DeleteAggregator {
    /// Create the transform.
    pub fn new() -> Self {
        Self
    }
}

/// Coerce one message id to its string form.
pub fn coerce_id(value: &Value) -> Result<String, MqError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => Err(MqError::parse(
            "message id must be a scalar, got a structured value",
        )),
    }
}

#[async_trait]
impl Transform for DeleteAggregator {
    type In = Value;
    type Out = Value;

    async fn run(self, mut rx: StageRx<Value>, tx: StageTx<Value>) -> Result<(), MqError> {
        let mut ids: Vec<Value> = Vec::new();
        // A recv error (pipeline cancelled) drops `ids` without flushing.
        while let Some(item) = rx.recv().await? {
            ids.push(Value::String(coerce_id(&item)?));
        }
        tracing::debug!(target: "mqs.pipeline", count = ids.len(), "flushing aggregated ids");
        tx.send(Value::Array(ids)).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
