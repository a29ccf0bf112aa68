// SPDX-License-Identifier: MIT OR Apache-2.0
//! Push-based incremental JSON decoder with path selection.

use mqs_error::MqError;
use serde_json::Value;

// ---------------------------------------------------------------------------
// SelectPath
// ---------------------------------------------------------------------------

/// A dotted key path selecting the elements of one array inside a JSON
/// document.
///
/// The path must end in `*`: `messages.*` selects each element of the array
/// under the top-level key `messages`; a bare `*` selects each element of a
/// top-level array. Intermediate segments name object keys, so `a.b.*`
/// descends through two objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPath {
    keys: Vec<String>,
}

impl SelectPath {
    /// Parse a path expression.
    pub fn parse(expr: &str) -> Result<Self, MqError> {
        let mut parts: Vec<&str> = expr.split('.').collect();
        if parts.pop() != Some("*") {
            return Err(MqError::invalid_config(format!(
                "select path `{expr}` must end in `*`"
            )));
        }
        if parts.iter().any(|p| p.is_empty() || *p == "*") {
            return Err(MqError::invalid_config(format!(
                "select path `{expr}` has an empty or wildcard intermediate segment"
            )));
        }
        Ok(Self {
            keys: parts.into_iter().map(str::to_string).collect(),
        })
    }

    /// The object keys to descend through before reaching the array.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

// ---------------------------------------------------------------------------
// Decoder internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    /// A value must come next (after `:` or `,`).
    Value,
    /// A value or `]` (right after `[`).
    ValueOrEnd,
    /// A key or `}` (right after `{`).
    KeyOrEnd,
    /// A key (after `,` in an object).
    Key,
    /// `:` after a key.
    Colon,
    /// `,` or the container's closing bracket after a complete value.
    CommaOrEnd,
    /// Top-level value complete; only whitespace may follow.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lex {
    Structural,
    Str { escape: bool },
    Scalar,
}

#[derive(Debug)]
struct Frame {
    array: bool,
    /// This array is the one selected by the path.
    target: bool,
    /// Number of path keys consumed when entering this container, if the
    /// container still lies on the match path.
    path_pos: Option<usize>,
    /// Whether the most recent key in this object equals the next path key.
    key_matches: bool,
}

// ---------------------------------------------------------------------------
// JsonStreamDecoder
// ---------------------------------------------------------------------------

/// Incremental decoder producing the JSON values at a [`SelectPath`].
///
/// Bytes are pushed in arbitrary chunks; element boundaries may fall
/// anywhere. The decoder validates the structure of the whole document as it
/// goes, but only ever buffers the element currently being captured (plus
/// constant per-nesting state), so memory stays flat for arbitrarily large
/// arrays. Call [`finish`](JsonStreamDecoder::finish) after the last chunk:
/// a document that ended early fails there instead of silently truncating.
#[derive(Debug)]
pub struct JsonStreamDecoder {
    path: SelectPath,
    stack: Vec<Frame>,
    expect: Expect,
    lex: Lex,
    collecting_key: bool,
    key_buf: Vec<u8>,
    scalar_buf: Vec<u8>,
    capture: Vec<u8>,
    capturing: bool,
    started: bool,
    offset: u64,
}

fn is_scalar_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

impl JsonStreamDecoder {
    /// Create a decoder selecting elements at `path`.
    pub fn new(path: SelectPath) -> Self {
        Self {
            path,
            stack: Vec::new(),
            expect: Expect::Value,
            lex: Lex::Structural,
            collecting_key: false,
            key_buf: Vec::new(),
            scalar_buf: Vec::new(),
            capture: Vec::new(),
            capturing: false,
            started: false,
            offset: 0,
        }
    }

    /// Feed one chunk, returning every element completed within it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, MqError> {
        let mut out = Vec::new();
        for &b in chunk {
            self.step(b, &mut out)?;
            self.offset += 1;
        }
        Ok(out)
    }

    /// Signal end of input. Fails if the document is incomplete.
    pub fn finish(&mut self) -> Result<(), MqError> {
        if self.lex == Lex::Scalar && self.stack.is_empty() {
            // A top-level scalar document ends with the input itself.
            self.validate_scalar()?;
            self.lex = Lex::Structural;
            self.started = true;
            self.expect = Expect::Done;
        }
        if !self.started || !self.stack.is_empty() || self.lex != Lex::Structural {
            return Err(MqError::parse(format!(
                "unexpected end of JSON input at byte {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Bytes currently buffered for the element being captured.
    ///
    /// Stays below one element's size regardless of document length; exposed
    /// so tests can assert the streaming property.
    pub fn buffered_len(&self) -> usize {
        self.capture.len()
    }

    // -- byte handling ---------------------------------------------------

    fn step(&mut self, b: u8, out: &mut Vec<Value>) -> Result<(), MqError> {
        match self.lex {
            Lex::Str { escape } => {
                if self.capturing {
                    self.capture.push(b);
                }
                if escape {
                    if self.collecting_key {
                        self.key_buf.push(b);
                    }
                    self.lex = Lex::Str { escape: false };
                } else if b == b'\\' {
                    if self.collecting_key {
                        self.key_buf.push(b);
                    }
                    self.lex = Lex::Str { escape: true };
                } else if b == b'"' {
                    self.lex = Lex::Structural;
                    if self.collecting_key {
                        self.collecting_key = false;
                        self.note_key();
                        self.expect = Expect::Colon;
                    } else {
                        self.end_value();
                    }
                } else if self.collecting_key {
                    self.key_buf.push(b);
                }
                Ok(())
            }
            Lex::Scalar => {
                if is_scalar_byte(b) {
                    self.scalar_buf.push(b);
                    if self.capturing {
                        self.capture.push(b);
                    }
                    Ok(())
                } else {
                    self.validate_scalar()?;
                    self.lex = Lex::Structural;
                    self.end_value();
                    self.step_structural(b, out)
                }
            }
            Lex::Structural => self.step_structural(b, out),
        }
    }

    fn step_structural(&mut self, b: u8, out: &mut Vec<Value>) -> Result<(), MqError> {
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => {
                if self.capturing {
                    self.capture.push(b);
                }
                Ok(())
            }
            b'"' => match self.expect {
                Expect::KeyOrEnd | Expect::Key => {
                    if self.capturing {
                        self.capture.push(b);
                    }
                    self.collecting_key = true;
                    self.key_buf.clear();
                    self.lex = Lex::Str { escape: false };
                    Ok(())
                }
                Expect::Value | Expect::ValueOrEnd => {
                    self.maybe_start_capture();
                    if self.capturing {
                        self.capture.push(b);
                    }
                    self.lex = Lex::Str { escape: false };
                    Ok(())
                }
                _ => Err(self.unexpected('"')),
            },
            b'{' | b'[' => {
                if !matches!(self.expect, Expect::Value | Expect::ValueOrEnd) {
                    return Err(self.unexpected(b as char));
                }
                let array = b == b'[';
                self.maybe_start_capture();
                if self.capturing {
                    self.capture.push(b);
                }
                let (path_pos, target) = self.child_disposition(array);
                self.stack.push(Frame {
                    array,
                    target,
                    path_pos,
                    key_matches: false,
                });
                self.expect = if array {
                    Expect::ValueOrEnd
                } else {
                    Expect::KeyOrEnd
                };
                Ok(())
            }
            b'}' => {
                let expect_ok = matches!(self.expect, Expect::KeyOrEnd | Expect::CommaOrEnd);
                let in_object = self.stack.last().is_some_and(|f| !f.array);
                if !expect_ok || !in_object {
                    return Err(self.unexpected('}'));
                }
                if self.capturing {
                    self.capture.push(b);
                }
                self.stack.pop();
                self.end_value();
                Ok(())
            }
            b']' => {
                let expect_ok = matches!(self.expect, Expect::ValueOrEnd | Expect::CommaOrEnd);
                let in_array = self.stack.last().is_some_and(|f| f.array);
                if !expect_ok || !in_array {
                    return Err(self.unexpected(']'));
                }
                let target = self.stack.last().is_some_and(|f| f.target);
                if target {
                    // Closing bracket of the selected array: flush the last
                    // element without including the bracket.
                    if self.capturing {
                        self.flush_element(out)?;
                    }
                } else if self.capturing {
                    self.capture.push(b);
                }
                self.stack.pop();
                self.end_value();
                Ok(())
            }
            b',' => {
                if self.expect != Expect::CommaOrEnd {
                    return Err(self.unexpected(','));
                }
                let (target, array) = match self.stack.last() {
                    Some(f) => (f.target, f.array),
                    None => return Err(self.unexpected(',')),
                };
                if target {
                    self.flush_element(out)?;
                    self.expect = Expect::Value;
                } else {
                    if self.capturing {
                        self.capture.push(b);
                    }
                    self.expect = if array { Expect::Value } else { Expect::Key };
                }
                Ok(())
            }
            b':' => {
                if self.expect != Expect::Colon {
                    return Err(self.unexpected(':'));
                }
                if self.capturing {
                    self.capture.push(b);
                }
                self.expect = Expect::Value;
                Ok(())
            }
            other => {
                if !matches!(self.expect, Expect::Value | Expect::ValueOrEnd) {
                    return Err(self.unexpected(other as char));
                }
                self.maybe_start_capture();
                if self.capturing {
                    self.capture.push(other);
                }
                self.scalar_buf.clear();
                self.scalar_buf.push(other);
                self.lex = Lex::Scalar;
                Ok(())
            }
        }
    }

    // -- helpers ---------------------------------------------------------

    /// A value just completed in the current context.
    fn end_value(&mut self) {
        if self.stack.is_empty() {
            self.started = true;
            self.expect = Expect::Done;
        } else {
            self.expect = Expect::CommaOrEnd;
        }
    }

    /// Start capturing if the next value is a direct element of the target.
    fn maybe_start_capture(&mut self) {
        if !self.capturing && self.stack.last().is_some_and(|f| f.target) {
            self.capture.clear();
            self.capturing = true;
        }
    }

    /// Parse and emit the element accumulated in the capture buffer.
    fn flush_element(&mut self, out: &mut Vec<Value>) -> Result<(), MqError> {
        let value = serde_json::from_slice(&self.capture).map_err(|e| {
            MqError::parse(format!("invalid element ending at byte {}: {e}", self.offset))
        })?;
        out.push(value);
        self.capture.clear();
        self.capturing = false;
        Ok(())
    }

    /// Check a completed scalar literal (number, `true`, `false`, `null`).
    fn validate_scalar(&mut self) -> Result<(), MqError> {
        serde_json::from_slice::<Value>(&self.scalar_buf).map_err(|_| {
            MqError::parse(format!(
                "invalid JSON literal `{}` at byte {}",
                String::from_utf8_lossy(&self.scalar_buf),
                self.offset
            ))
        })?;
        self.scalar_buf.clear();
        Ok(())
    }

    /// Record whether the key just read matches the path at this level.
    fn note_key(&mut self) {
        let keys = self.path.keys();
        let key_buf = &self.key_buf;
        if let Some(frame) = self.stack.last_mut() {
            frame.key_matches = frame
                .path_pos
                .and_then(|i| keys.get(i))
                .is_some_and(|k| k.as_bytes() == key_buf.as_slice());
        }
    }

    /// Path disposition of a container about to be entered.
    fn child_disposition(&self, array: bool) -> (Option<usize>, bool) {
        match self.stack.last() {
            None => {
                if self.path.keys().is_empty() {
                    (None, array)
                } else if array {
                    (None, false)
                } else {
                    (Some(0), false)
                }
            }
            Some(parent) => {
                if parent.target || parent.array || !parent.key_matches {
                    return (None, false);
                }
                match parent.path_pos {
                    Some(i) => {
                        let next = i + 1;
                        if next == self.path.keys().len() {
                            (None, array)
                        } else if array {
                            (None, false)
                        } else {
                            (Some(next), false)
                        }
                    }
                    None => (None, false),
                }
            }
        }
    }

    fn unexpected(&self, c: char) -> MqError {
        if self.expect == Expect::Done {
            MqError::parse(format!(
                "trailing character `{c}` after top-level value at byte {}",
                self.offset
            ))
        } else {
            MqError::parse(format!("unexpected character `{c}` at byte {}", self.offset))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
