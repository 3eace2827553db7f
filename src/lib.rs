//! # gantry
//!
//! A runtime-agnostic HTTP adapter layer: handler logic is written once
//! against a small, stable request/response interface and runs unmodified
//! atop any HTTP server runtime that can supply two capability traits.
//!
//! The core is two stateless translations, invoked once per exchange:
//!
//! - **Request normalization** — [`SnapshotRequest::from_handle`] reads a
//!   live [`RuntimeRequest`] handle exactly once and freezes it into an
//!   immutable value: lower-cased method, canonical header map, split
//!   path/query, optional client certificate, and the live body stream.
//! - **Response materialization** — [`write_response`] applies a
//!   [`Response`] onto a live [`ResponseSink`]: status first, then headers
//!   and content-type precedence, then the body bytes.
//!
//! [`DispatchBridge`] glues the two to a [`Handler`] and suppresses the
//! runtime's own error re-dispatches. The [`server`] module ships a small
//! tokio-based reference runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gantry::{HandlerError, Request, Response, Server, StringBody};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server
//!         .run(|req: &mut dyn Request| {
//!             let body = StringBody::new(format!("Hello, {}!", req.uri()));
//!             Ok::<_, HandlerError>(Response::new(200).body(body))
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod bridge;
pub mod request;
pub mod response;
pub mod runtime;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use body::{Body, BytesBody, EmptyBody, JsonBody, StringBody};
pub use bridge::{
    BridgeError, DispatchBridge, DispatchKind, DispatchOutcome, Handler, HandlerError,
};
pub use request::{ProxyRequest, Request, RequestConstructionError, SnapshotRequest};
pub use response::{Headers, Response, ResponseWriteError, write_response};
pub use runtime::{BodyStream, ClientCertificate, ResponseSink, RuntimeRequest};
pub use server::{Server, ServerError};
