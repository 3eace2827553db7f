//! Dispatch glue between a runtime and handler logic.
//!
//! The runtime invokes [`DispatchBridge::dispatch`] once per inbound
//! exchange. The bridge snapshots the request, runs the handler, and
//! materializes the response — or, when the runtime is re-entering its
//! dispatch point to render an error, skips all of that so a single physical
//! exchange is never processed twice.
//!
//! The bridge performs no recovery: every failure propagates to the runtime
//! as a [`BridgeError`], and mapping it to a fallback response (without
//! re-invoking the handler) is the runtime's job.

use std::error::Error;

use thiserror::Error;
use tracing::debug;

use crate::request::{Request, RequestConstructionError, SnapshotRequest};
use crate::response::{Response, ResponseWriteError, write_response};
use crate::runtime::{ResponseSink, RuntimeRequest};

/// An opaque failure surfaced by handler logic.
///
/// The bridge does not inspect or classify handler failures; it carries them
/// through to the runtime unmodified.
#[derive(Debug, Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(#[source] Box<dyn Error + Send + Sync>);

impl HandlerError {
    /// Wraps any error value.
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

/// The union of failures that can escape a dispatch, propagated to the
/// runtime unmodified.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The request snapshot could not be built.
    #[error(transparent)]
    Request(#[from] RequestConstructionError),

    /// Handler logic failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The response could not be materialized onto the sink.
    #[error(transparent)]
    Write(#[from] ResponseWriteError),
}

/// Handler logic: one normalized request in, one normalized response out.
///
/// Implemented for closures of the matching shape.
pub trait Handler {
    /// Produces the response for `request`.
    ///
    /// # Errors
    ///
    /// Any [`HandlerError`]; the bridge does not catch it.
    fn handle(&self, request: &mut dyn Request) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut dyn Request) -> Result<Response, HandlerError>,
{
    fn handle(&self, request: &mut dyn Request) -> Result<Response, HandlerError> {
        self(request)
    }
}

/// Why the runtime is entering the dispatch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// A fresh inbound exchange.
    Inbound,
    /// The runtime's own error pipeline re-entering the same dispatch point
    /// to render an error response.
    ErrorRetry,
}

/// What the bridge did with the exchange. The runtime marks the exchange
/// handled iff this is [`Handled`](Self::Handled).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DispatchOutcome {
    /// The handler ran and the response was written.
    Handled,
    /// An error re-dispatch was suppressed; nothing was processed.
    Skipped,
}

/// Bridges a runtime's per-exchange callback to a [`Handler`].
///
/// Stateless across exchanges: each dispatch builds its own request and
/// response values, shared with nothing.
#[derive(Debug)]
pub struct DispatchBridge<H> {
    handler: H,
}

impl<H: Handler> DispatchBridge<H> {
    /// Wraps `handler`.
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Processes one exchange: snapshot, handle, write.
    ///
    /// When `kind` is [`DispatchKind::ErrorRetry`], neither the handler nor
    /// the normalizer/writer pair runs and [`DispatchOutcome::Skipped`] is
    /// returned — the runtime's error pipeline must not double-process the
    /// exchange.
    ///
    /// # Errors
    ///
    /// [`BridgeError`] from any of the three stages, unmodified. By the time
    /// a write error surfaces, the sink may already hold the status and part
    /// of the headers.
    pub fn dispatch<R, S>(
        &self,
        kind: DispatchKind,
        handle: R,
        sink: &mut S,
    ) -> Result<DispatchOutcome, BridgeError>
    where
        R: RuntimeRequest,
        S: ResponseSink,
    {
        if kind == DispatchKind::ErrorRetry {
            debug!("suppressing error re-dispatch");
            return Ok(DispatchOutcome::Skipped);
        }

        let mut request = SnapshotRequest::from_handle(handle)?;
        debug!(
            method = %request.method(),
            uri = %request.uri(),
            remote = %request.remote_addr(),
            "dispatching request"
        );
        let response = self.handler.handle(&mut request)?;
        debug!(status = response.status(), "writing response");
        write_response(response, sink)?;
        Ok(DispatchOutcome::Handled)
    }
}
