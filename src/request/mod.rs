//! Request normalization — a uniform, immutable view over a live runtime
//! request handle.
//!
//! Two implementations of the [`Request`] interface are provided:
//!
//! - [`SnapshotRequest`] captures every field eagerly at construction and is
//!   fully decoupled from the handle afterwards.
//! - [`ProxyRequest`] keeps the handle and answers reads from it on demand.
//!
//! Both canonicalize identically: header names are lower-cased and
//! multi-values comma-joined, the method token is lower-cased verbatim, and
//! only the first client certificate of a presented chain is kept.

use std::collections::HashMap;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::runtime::{BodyStream, ClientCertificate, RuntimeRequest};

/// Errors raised while building a normalized request from a runtime handle.
///
/// Construction is all-or-nothing: on error, no partial request is visible.
#[derive(Debug, Error)]
pub enum RequestConstructionError {
    /// The runtime could not supply the request body stream.
    #[error("request body unavailable")]
    BodyUnavailable(#[source] io::Error),

    /// A required field was missing or empty on the runtime handle.
    #[error("required request field `{field}` was missing or empty")]
    MissingField { field: &'static str },
}

/// The uniform, read-only request interface handler logic is written against.
///
/// Accessors return owned values so that lazy implementations may compute
/// them per call. The body is the one exception to immutability: it is a
/// live single-pass stream, valid for the lifetime of the request.
pub trait Request {
    /// The local port the request arrived on. Always non-zero.
    fn server_port(&self) -> u16;

    /// The host name the request was addressed to. Never empty.
    fn server_name(&self) -> String;

    /// The peer address of the client. Never empty.
    fn remote_addr(&self) -> String;

    /// The request path, without any query string.
    fn uri(&self) -> String;

    /// The raw query string, absent iff the request target had no `?`.
    fn query_string(&self) -> Option<String>;

    /// The URI scheme, lower-cased, e.g. `"http"` or `"https"`.
    fn scheme(&self) -> String;

    /// The method token, always lower-cased, e.g. `"get"`, `"post"`.
    ///
    /// The raw token is lower-cased verbatim with no validation against the
    /// HTTP method grammar.
    fn method(&self) -> String;

    /// The protocol string, e.g. `"HTTP/1.1"`.
    fn protocol(&self) -> String;

    /// The canonical header map: keys lower-cased and unique, values of
    /// repeated headers comma-joined in enumeration order.
    fn headers(&self) -> HashMap<String, String>;

    /// Looks up a single canonical header. `name` may use any casing.
    fn header(&self, name: &str) -> Option<String> {
        self.headers().remove(&name.to_ascii_lowercase())
    }

    /// The `content-type` header value, if present.
    fn content_type(&self) -> Option<String> {
        self.header("content-type")
    }

    /// The `content-length` header parsed as an integer, if present and
    /// well-formed.
    fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// The `charset` parameter of the `content-type` header, if any.
    fn character_encoding(&self) -> Option<String> {
        charset_of(&self.content_type()?)
    }

    /// The client TLS certificate, if mutual authentication supplied one.
    ///
    /// Only the first certificate of a presented chain is visible here; the
    /// rest of the chain is discarded from the normalized view.
    fn client_certificate(&self) -> Option<ClientCertificate>;

    /// The live request body stream. Single-pass, not rewindable.
    fn body(&mut self) -> &mut BodyStream;
}

/// Builds the canonical header map from a runtime handle.
///
/// Names are enumerated in runtime order and lower-cased; all values supplied
/// under casing variations of a name are joined with a literal `,` in
/// enumeration order. When two differently-cased raw names collapse to the
/// same key, the later write wins — a documented limitation, not an error.
fn canonicalize_headers<H: RuntimeRequest + ?Sized>(handle: &H) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for name in handle.header_names() {
        let joined = handle.header_values(&name).join(",");
        headers.insert(name.to_ascii_lowercase(), joined);
    }
    headers
}

/// First certificate of the chain, or `None`. Absence is never an error.
fn first_certificate<H: RuntimeRequest + ?Sized>(handle: &H) -> Option<ClientCertificate> {
    handle.client_certificates().into_iter().next()
}

/// Extracts the `charset` parameter from a content-type value.
fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let param = param.trim();
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_owned())
        } else {
            None
        }
    })
}

fn require(value: String, field: &'static str) -> Result<String, RequestConstructionError> {
    if value.is_empty() {
        Err(RequestConstructionError::MissingField { field })
    } else {
        Ok(value)
    }
}

/// An eager, immutable request snapshot.
///
/// Every field is captured from the runtime handle at construction; the
/// handle is consumed and dropped, so later mutation or closing of runtime
/// state cannot be observed through the snapshot. The body stream is the one
/// live part: streams cannot be eagerly materialized without unbounded
/// buffering, so it is carried as a single-pass handle instead.
///
/// # Equality
///
/// Snapshots compare by full field value, body excluded (a live stream
/// carries no value identity). Two snapshots built from handles with
/// identical field values compare equal.
pub struct SnapshotRequest {
    server_port: u16,
    server_name: String,
    remote_addr: String,
    uri: String,
    query_string: Option<String>,
    scheme: String,
    method: String,
    protocol: String,
    headers: HashMap<String, String>,
    client_certificate: Option<ClientCertificate>,
    body: BodyStream,
}

impl SnapshotRequest {
    /// Captures a complete snapshot from `handle`, consuming it.
    ///
    /// # Errors
    ///
    /// - [`RequestConstructionError::BodyUnavailable`] if the body stream
    ///   cannot be obtained.
    /// - [`RequestConstructionError::MissingField`] if the handle reports a
    ///   zero port, an empty server name, or an empty remote address.
    ///
    /// On error nothing is returned: no partial snapshot is ever visible.
    pub fn from_handle<H: RuntimeRequest>(mut handle: H) -> Result<Self, RequestConstructionError> {
        let server_port = handle.server_port();
        if server_port == 0 {
            return Err(RequestConstructionError::MissingField {
                field: "server_port",
            });
        }

        let body = handle
            .body()
            .map_err(RequestConstructionError::BodyUnavailable)?;

        Ok(Self {
            server_port,
            server_name: require(handle.server_name(), "server_name")?,
            remote_addr: require(handle.remote_addr(), "remote_addr")?,
            uri: handle.path(),
            query_string: handle.query_string(),
            scheme: handle.scheme().to_ascii_lowercase(),
            method: handle.method().to_ascii_lowercase(),
            protocol: handle.protocol(),
            headers: canonicalize_headers(&handle),
            client_certificate: first_certificate(&handle),
            body,
        })
    }
}

impl Request for SnapshotRequest {
    fn server_port(&self) -> u16 {
        self.server_port
    }

    fn server_name(&self) -> String {
        self.server_name.clone()
    }

    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }

    fn query_string(&self) -> Option<String> {
        self.query_string.clone()
    }

    fn scheme(&self) -> String {
        self.scheme.clone()
    }

    fn method(&self) -> String {
        self.method.clone()
    }

    fn protocol(&self) -> String {
        self.protocol.clone()
    }

    fn headers(&self) -> HashMap<String, String> {
        self.headers.clone()
    }

    fn client_certificate(&self) -> Option<ClientCertificate> {
        self.client_certificate.clone()
    }

    fn body(&mut self) -> &mut BodyStream {
        &mut self.body
    }
}

// The body stream is an opaque reader with no Debug impl; elide it.
impl fmt::Debug for SnapshotRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRequest")
            .field("server_port", &self.server_port)
            .field("server_name", &self.server_name)
            .field("remote_addr", &self.remote_addr)
            .field("uri", &self.uri)
            .field("query_string", &self.query_string)
            .field("scheme", &self.scheme)
            .field("method", &self.method)
            .field("protocol", &self.protocol)
            .field("headers", &self.headers)
            .field("client_certificate", &self.client_certificate)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SnapshotRequest {
    fn eq(&self, other: &Self) -> bool {
        self.server_port == other.server_port
            && self.server_name == other.server_name
            && self.remote_addr == other.remote_addr
            && self.uri == other.uri
            && self.query_string == other.query_string
            && self.scheme == other.scheme
            && self.method == other.method
            && self.protocol == other.protocol
            && self.headers == other.headers
            && self.client_certificate == other.client_certificate
    }
}

/// A lazy request view that proxies reads to the retained runtime handle.
///
/// Scalar accessors re-read (and re-canonicalize) from the handle on every
/// call, so they observe the handle's current state rather than a fixed
/// instant. The body stream is still taken eagerly at construction, since a
/// single-pass stream cannot be re-obtained later.
///
/// # Equality
///
/// Proxies compare by handle equality, not by normalized field values. Two
/// proxies are equal iff their underlying handles are.
pub struct ProxyRequest<H> {
    handle: H,
    body: BodyStream,
}

impl<H: RuntimeRequest> ProxyRequest<H> {
    /// Wraps `handle`, taking its body stream up front.
    ///
    /// # Errors
    ///
    /// [`RequestConstructionError::BodyUnavailable`] if the body stream
    /// cannot be obtained.
    pub fn new(mut handle: H) -> Result<Self, RequestConstructionError> {
        let body = handle
            .body()
            .map_err(RequestConstructionError::BodyUnavailable)?;
        Ok(Self { handle, body })
    }

    /// Returns the underlying runtime handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H: RuntimeRequest> Request for ProxyRequest<H> {
    fn server_port(&self) -> u16 {
        self.handle.server_port()
    }

    fn server_name(&self) -> String {
        self.handle.server_name()
    }

    fn remote_addr(&self) -> String {
        self.handle.remote_addr()
    }

    fn uri(&self) -> String {
        self.handle.path()
    }

    fn query_string(&self) -> Option<String> {
        self.handle.query_string()
    }

    fn scheme(&self) -> String {
        self.handle.scheme().to_ascii_lowercase()
    }

    fn method(&self) -> String {
        self.handle.method().to_ascii_lowercase()
    }

    fn protocol(&self) -> String {
        self.handle.protocol()
    }

    fn headers(&self) -> HashMap<String, String> {
        canonicalize_headers(&self.handle)
    }

    fn client_certificate(&self) -> Option<ClientCertificate> {
        first_certificate(&self.handle)
    }

    fn body(&mut self) -> &mut BodyStream {
        &mut self.body
    }
}

impl<H: fmt::Debug> fmt::Debug for ProxyRequest<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<H: PartialEq> PartialEq for ProxyRequest<H> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::runtime::mock::MockHandle;

    #[test]
    fn method_is_lowercased() {
        for (raw, normalized) in [("POST", "post"), ("GeT", "get"), ("DELETE", "delete")] {
            let handle = MockHandle {
                method: raw.to_owned(),
                ..MockHandle::default()
            };
            let req = SnapshotRequest::from_handle(handle).unwrap();
            assert_eq!(req.method(), normalized);
        }
    }

    #[test]
    fn header_names_collapse_to_lowercase() {
        let handle = MockHandle::default()
            .header("Content-Type", "text/html")
            .header("X-FORWARDED-FOR", "10.0.0.1");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        let headers = req.headers();
        assert_eq!(headers.get("content-type").map(String::as_str), Some("text/html"));
        assert_eq!(headers.get("x-forwarded-for").map(String::as_str), Some("10.0.0.1"));
        assert!(!headers.contains_key("Content-Type"));
    }

    #[test]
    fn repeated_headers_join_with_comma_in_order() {
        let handle = MockHandle::default()
            .header("Accept", "text/html")
            .header("Accept", "*/*");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.header("accept").as_deref(), Some("text/html,*/*"));
    }

    #[test]
    fn differently_cased_duplicates_collapse_to_one_joined_entry() {
        // Values are matched case-insensitively per name, so both raw
        // casings produce the same joined value under one lower-cased key.
        let handle = MockHandle::default()
            .header("Accept", "text/html")
            .header("ACCEPT", "*/*");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        let headers = req.headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept").map(String::as_str), Some("text/html,*/*"));
    }

    #[test]
    fn path_and_query_are_separate() {
        let handle = MockHandle {
            path: "/items".to_owned(),
            query: Some("a=1&b=2".to_owned()),
            ..MockHandle::default()
        };
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.uri(), "/items");
        assert_eq!(req.query_string().as_deref(), Some("a=1&b=2"));
    }

    #[test]
    fn missing_query_is_none() {
        let req = SnapshotRequest::from_handle(MockHandle::default()).unwrap();
        assert_eq!(req.query_string(), None);
    }

    #[test]
    fn absent_certificate_is_none_not_error() {
        let req = SnapshotRequest::from_handle(MockHandle::default()).unwrap();
        assert_eq!(req.client_certificate(), None);
    }

    #[test]
    fn only_first_certificate_of_chain_is_kept() {
        let leaf = ClientCertificate::from_der(&b"leaf"[..]);
        let issuer = ClientCertificate::from_der(&b"issuer"[..]);
        let handle = MockHandle {
            certs: vec![leaf.clone(), issuer],
            ..MockHandle::default()
        };
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.client_certificate(), Some(leaf));
    }

    #[test]
    fn body_failure_aborts_construction() {
        let handle = MockHandle {
            fail_body: true,
            ..MockHandle::default()
        };
        let err = SnapshotRequest::from_handle(handle).unwrap_err();
        assert!(matches!(err, RequestConstructionError::BodyUnavailable(_)));
    }

    #[test]
    fn empty_server_name_aborts_construction() {
        let handle = MockHandle {
            name: String::new(),
            ..MockHandle::default()
        };
        let err = SnapshotRequest::from_handle(handle).unwrap_err();
        assert!(matches!(
            err,
            RequestConstructionError::MissingField { field: "server_name" }
        ));
    }

    #[test]
    fn snapshot_is_independent_of_the_handle() {
        // The handle is consumed at construction; the snapshot keeps its own
        // copies of every scalar field.
        let handle = MockHandle {
            method: "PUT".to_owned(),
            ..MockHandle::default()
        }
        .header("Host", "example.com");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.method(), "put");
        assert_eq!(req.header("host").as_deref(), Some("example.com"));
    }

    #[test]
    fn equal_handles_yield_equal_snapshots() {
        let make = || {
            MockHandle {
                path: "/x".to_owned(),
                query: Some("q=1".to_owned()),
                ..MockHandle::default()
            }
            .header("Accept", "*/*")
        };
        let a = SnapshotRequest::from_handle(make()).unwrap();
        let b = SnapshotRequest::from_handle(make()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn body_reads_through() {
        let handle = MockHandle {
            body: Some(b"hello".to_vec()),
            ..MockHandle::default()
        };
        let mut req = SnapshotRequest::from_handle(handle).unwrap();
        let mut buf = String::new();
        req.body().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn derived_content_fields() {
        let handle = MockHandle::default()
            .header("Content-Type", "text/html; charset=UTF-8")
            .header("Content-Length", "42");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.content_type().as_deref(), Some("text/html; charset=UTF-8"));
        assert_eq!(req.content_length(), Some(42));
        assert_eq!(req.character_encoding().as_deref(), Some("UTF-8"));
    }

    #[test]
    fn malformed_content_length_is_none() {
        let handle = MockHandle::default().header("Content-Length", "banana");
        let req = SnapshotRequest::from_handle(handle).unwrap();
        assert_eq!(req.content_length(), None);
    }

    #[test]
    fn charset_parameter_handles_quotes_and_case() {
        assert_eq!(charset_of("text/plain; charset=\"utf-8\"").as_deref(), Some("utf-8"));
        assert_eq!(charset_of("text/plain; CHARSET=latin1").as_deref(), Some("latin1"));
        assert_eq!(charset_of("text/plain"), None);
    }

    #[test]
    fn debug_output_elides_the_body_stream() {
        let req = SnapshotRequest::from_handle(MockHandle::default()).unwrap();
        let rendered = format!("{req:?}");
        assert!(rendered.starts_with("SnapshotRequest"));
        assert!(rendered.contains("server_port: 8080"));
        assert!(rendered.ends_with(".. }"));
        assert!(!rendered.contains("body"));

        let proxy = ProxyRequest::new(MockHandle::default()).unwrap();
        let rendered = format!("{proxy:?}");
        assert!(rendered.starts_with("ProxyRequest"));
        assert!(rendered.ends_with(".. }"));
    }

    #[test]
    fn proxy_normalizes_like_the_snapshot() {
        let handle = MockHandle {
            method: "GeT".to_owned(),
            scheme: "HTTP".to_owned(),
            ..MockHandle::default()
        }
        .header("Accept", "text/html")
        .header("Accept", "*/*");
        let req = ProxyRequest::new(handle).unwrap();
        assert_eq!(req.method(), "get");
        assert_eq!(req.scheme(), "http");
        assert_eq!(req.header("accept").as_deref(), Some("text/html,*/*"));
    }

    #[test]
    fn proxy_equality_follows_the_handle() {
        // Deliberately different from SnapshotRequest's value equality: the
        // proxy's stated contract is handle equality.
        let a = ProxyRequest::new(MockHandle::default()).unwrap();
        let b = ProxyRequest::new(MockHandle::default()).unwrap();
        assert_eq!(a, b);

        let c = ProxyRequest::new(MockHandle {
            path: "/other".to_owned(),
            ..MockHandle::default()
        })
        .unwrap();
        assert_ne!(a, c);
    }
}
