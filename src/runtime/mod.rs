//! Capability traits the host runtime must implement.
//!
//! The adapter core never talks to a concrete server. It consumes a
//! [`RuntimeRequest`] (the live inbound handle) and produces output through a
//! [`ResponseSink`] (the live outbound channel). Any runtime that can
//! implement these two traits can host handlers written against this crate —
//! see the [`server`](crate::server) module for a working implementation.

use std::io;

use bytes::Bytes;

#[cfg(test)]
pub(crate) mod mock;

/// A single-pass readable handle for request body bytes.
///
/// Not rewindable: once bytes are read they are gone. The stream lives as
/// long as the request that owns it.
pub type BodyStream = Box<dyn io::Read + Send>;

/// An opaque DER-encoded client certificate presented during TLS
/// mutual authentication.
///
/// The adapter does not parse or validate the certificate; it carries the
/// raw bytes through to handler logic. Compares by byte-for-byte value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    der: Bytes,
}

impl ClientCertificate {
    /// Wraps raw DER bytes.
    pub fn from_der(der: impl Into<Bytes>) -> Self {
        Self { der: der.into() }
    }

    /// Returns the DER-encoded certificate bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// The live inbound request handle a runtime hands to the adapter.
///
/// The handle is mutable and stateful on the runtime side; the adapter reads
/// it exactly once to build an immutable snapshot (or wraps it in a lazy
/// proxy). Scalar accessors return owned values so implementations are free
/// to compute them on demand.
pub trait RuntimeRequest {
    /// The local port the request arrived on.
    fn server_port(&self) -> u16;

    /// The host name the request was addressed to.
    fn server_name(&self) -> String;

    /// The peer address of the client.
    fn remote_addr(&self) -> String;

    /// The request path, without any query string.
    fn path(&self) -> String;

    /// The raw query string (without the leading `?`), if the request target
    /// carried one.
    fn query_string(&self) -> Option<String>;

    /// The URI scheme, e.g. `"http"` or `"https"`.
    fn scheme(&self) -> String;

    /// The raw method token, exactly as it appeared on the wire.
    fn method(&self) -> String;

    /// The protocol string, e.g. `"HTTP/1.1"`.
    fn protocol(&self) -> String;

    /// Header names in the order the runtime supplies them (not guaranteed
    /// sorted), with their original casing. A name may appear more than once.
    fn header_names(&self) -> Vec<String>;

    /// All values supplied under `name`, matched case-insensitively, in the
    /// order the runtime enumerates them.
    fn header_values(&self, name: &str) -> Vec<String>;

    /// The client certificate chain, if TLS mutual authentication supplied
    /// one. Empty when the client presented no certificate.
    fn client_certificates(&self) -> Vec<ClientCertificate>;

    /// Takes the request body stream.
    ///
    /// Single-pass: the stream can be taken at most once. Implementations
    /// return an error if the body is unavailable or was already taken.
    fn body(&mut self) -> io::Result<BodyStream>;
}

/// The live outbound channel a runtime hands to the adapter.
///
/// Operations are applied in a strict order by the response writer: status
/// first, then headers and content-type, then body bytes. Setting the same
/// header name twice replaces the earlier value (last write wins).
pub trait ResponseSink {
    /// Sets the numeric HTTP status code.
    fn set_status(&mut self, status: u16) -> io::Result<()>;

    /// Sets a header verbatim. Name and value are not modified.
    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()>;

    /// Sets the canonical content type. This is a distinct channel from
    /// [`set_header`](Self::set_header) on runtimes that resolve the response
    /// media type separately from the generic header table.
    fn set_content_type(&mut self, value: &str) -> io::Result<()>;

    /// Returns the writable byte channel for the response body.
    fn body_writer(&mut self) -> io::Result<&mut (dyn io::Write + Send)>;
}
