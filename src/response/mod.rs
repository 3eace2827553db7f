//! Response materialization — writing a normalized response onto a live
//! runtime sink.
//!
//! [`write_response`] is a pure procedure over a [`Response`] and a
//! [`ResponseSink`]: one linear pass, no retained state, no retry.

use std::io;

use thiserror::Error;

pub mod headers;

pub use headers::Headers;

use crate::body::{Body, EmptyBody};
use crate::runtime::ResponseSink;

/// Errors raised while materializing a response onto a sink.
///
/// A failure may occur mid-write, after the status and some headers have
/// already been committed; no rollback is attempted once bytes reach the
/// sink.
#[derive(Debug, Error)]
pub enum ResponseWriteError {
    /// Setting the status code failed.
    #[error("failed to set response status")]
    Status(#[source] io::Error),

    /// Setting a header failed.
    #[error("failed to set response header `{name}`")]
    Header {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Setting the canonical content type failed.
    #[error("failed to set response content type")]
    ContentType(#[source] io::Error),

    /// Streaming the body failed.
    #[error("failed to stream response body")]
    Body(#[source] io::Error),
}

/// A normalized response: status, headers, and a body capability.
///
/// Constructed by handler logic and consumed exactly once by
/// [`write_response`].
///
/// # Examples
///
/// ```
/// use gantry::{Response, StringBody};
///
/// let response = Response::new(200)
///     .header("X-Request-Id", "abc-123")
///     .body(StringBody::new("Hello, World!"));
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Box<dyn Body + Send>,
}

impl Response {
    /// Creates a response with the given status and an empty body.
    ///
    /// `status` must be a valid HTTP status code (100–599).
    pub fn new(status: u16) -> Self {
        debug_assert!((100..=599).contains(&status), "invalid status {status}");
        Self {
            status,
            headers: Headers::new(),
            body: Box::new(EmptyBody::new()),
        }
    }

    /// Sets a response header. Names are passed through to the sink exactly
    /// as given here.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Body + Send + 'static) -> Self {
        self.body = Box::new(body);
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

/// Materializes `response` onto `sink`: status, then headers and
/// content-type, then body, in that exact order, exactly once.
///
/// Content-type resolution:
///
/// 1. Every header is set verbatim on the sink.
/// 2. If the header map contains the literal key `"Content-Type"`
///    (case-sensitive), its value is additionally applied on the sink's
///    canonical content-type channel.
/// 3. Otherwise the body's default content type is applied, if it has one.
/// 4. Otherwise no content type is set and the runtime default applies.
///
/// # Errors
///
/// [`ResponseWriteError`] identifying the phase that failed. Errors during
/// body streaming propagate unmodified inside
/// [`ResponseWriteError::Body`]; the sink may already hold the status and
/// headers at that point.
pub fn write_response<S: ResponseSink>(
    response: Response,
    sink: &mut S,
) -> Result<(), ResponseWriteError> {
    // Status must precede header and body commit on many runtimes.
    sink.set_status(response.status)
        .map_err(ResponseWriteError::Status)?;

    for (name, value) in response.headers.iter() {
        sink.set_header(name, value)
            .map_err(|source| ResponseWriteError::Header {
                name: name.to_owned(),
                source,
            })?;
    }

    match response.headers.get_exact("Content-Type") {
        Some(value) => {
            sink.set_content_type(value)
                .map_err(ResponseWriteError::ContentType)?;
        }
        None => {
            if let Some(value) = response.body.default_content_type() {
                sink.set_content_type(value)
                    .map_err(ResponseWriteError::ContentType)?;
            }
        }
    }

    let writer = sink.body_writer().map_err(ResponseWriteError::Body)?;
    response.body.write_to(writer).map_err(ResponseWriteError::Body)
}
