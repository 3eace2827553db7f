//! Response body capability and stock implementations.
//!
//! A [`Body`] is opaque to the writer: it advertises an optional default
//! content type and knows how to stream its bytes into a sink, nothing more.
//! Encoding and framing are the body's own business.

use std::fmt;
use std::io::{self, Write};

use bytes::Bytes;
use serde::Serialize;

/// A response body: a default content type plus a one-shot byte producer.
pub trait Body {
    /// The content type to apply when the response headers do not carry an
    /// explicit `Content-Type`. Pure; no side effects.
    fn default_content_type(&self) -> Option<&str> {
        None
    }

    /// Streams the body's bytes into `out`. Consumes the body; a body is
    /// written at most once.
    ///
    /// # Errors
    ///
    /// Any I/O error from `out`, propagated unmodified.
    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()>;
}

impl fmt::Debug for dyn Body + Send {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body")
    }
}

/// A zero-length body, optionally carrying a default content type.
#[derive(Debug, Clone, Default)]
pub struct EmptyBody {
    content_type: Option<String>,
}

impl EmptyBody {
    /// An empty body with no default content type.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty body that still advertises a default content type, e.g. for
    /// a `404` with `text/plain` and no payload.
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

impl Body for EmptyBody {
    fn default_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn write_to(self: Box<Self>, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// A UTF-8 text body. Defaults to `text/plain; charset=utf-8`.
#[derive(Debug, Clone)]
pub struct StringBody {
    text: String,
}

impl StringBody {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Body for StringBody {
    fn default_content_type(&self) -> Option<&str> {
        Some("text/plain; charset=utf-8")
    }

    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.text.as_bytes())
    }
}

/// A raw byte body with no default content type.
#[derive(Debug, Clone)]
pub struct BytesBody {
    bytes: Bytes,
}

impl BytesBody {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl Body for BytesBody {
    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.bytes)
    }
}

/// A body serialized from a value with serde. Defaults to
/// `application/json`.
///
/// Serialization happens at construction so that a malformed value surfaces
/// in handler logic rather than mid-stream.
#[derive(Debug, Clone)]
pub struct JsonBody {
    json: Vec<u8>,
}

impl JsonBody {
    /// Serializes `value` to JSON.
    ///
    /// # Errors
    ///
    /// Any [`serde_json::Error`] produced by serialization.
    pub fn new<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            json: serde_json::to_vec(value)?,
        })
    }
}

impl Body for JsonBody {
    fn default_content_type(&self) -> Option<&str> {
        Some("application/json")
    }

    fn write_to(self: Box<Self>, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.json)
    }
}
