// SPDX-License-Identifier: MIT OR Apache-2.0
//! Incremental JSON encoder with prefix/separator/suffix framing.

use bytes::Bytes;
use mqs_error::MqError;
use serde_json::Value;

/// The literal framing wrapped around a stream of encoded items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    prefix: String,
    separator: String,
    suffix: String,
}

impl Framing {
    /// Custom framing.
    pub fn new(
        prefix: impl Into<String>,
        separator: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            suffix: suffix.into(),
        }
    }

    /// Array framing for the write endpoint: `{"messages":[ item , item ]}`.
    ///
    /// The embedded newlines are part of the wire format and kept byte-exact.
    pub fn messages_array() -> Self {
        Self::new("{\n\"messages\":\n[", "\n,\n", "\n]\n}\n")
    }

    /// Single-value framing for the delete endpoint: `{"ids": value }`.
    pub fn ids_value() -> Self {
        Self::new("{\n\"ids\":\n", "", "\n}\n")
    }
}

/// Streaming encoder: emits the prefix before the first item, the separator
/// between consecutive items, and the suffix at [`finish`].
///
/// Each [`push`] returns the bytes to send for that item; output already
/// handed out is never retracted, so a serialisation failure mid-stream
/// leaves a partial body behind and the caller must treat the request as
/// failed.
///
/// [`push`]: JsonFrameEncoder::push
/// [`finish`]: JsonFrameEncoder::finish
#[derive(Debug)]
pub struct JsonFrameEncoder {
    framing: Framing,
    count: usize,
}

impl JsonFrameEncoder {
    /// Create an encoder with the given framing.
    pub fn new(framing: Framing) -> Self {
        Self { framing, count: 0 }
    }

    /// Encode one item, framed.
    pub fn push(&mut self, value: &Value) -> Result<Bytes, MqError> {
        let mut buf: Vec<u8> = if self.count == 0 {
            self.framing.prefix.clone().into_bytes()
        } else {
            self.framing.separator.clone().into_bytes()
        };
        serde_json::to_writer(&mut buf, value).map_err(MqError::Serialize)?;
        self.count += 1;
        Ok(Bytes::from(buf))
    }

    /// Close the frame. Emits the prefix too if nothing was ever pushed.
    pub fn finish(&mut self) -> Bytes {
        let mut buf = Vec::new();
        if self.count == 0 {
            buf.extend_from_slice(self.framing.prefix.as_bytes());
        }
        buf.extend_from_slice(self.framing.suffix.as_bytes());
        Bytes::from(buf)
    }

    /// Number of items encoded so far.
    pub fn items_encoded(&self) -> usize {
        self.count
    }
}
