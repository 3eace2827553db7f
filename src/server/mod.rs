//! Reference tokio runtime for the adapter.
//!
//! A minimal HTTP/1.1 server that exists to prove the capability traits are
//! implementable: it parses requests off a TCP stream, hands each exchange
//! to a [`DispatchBridge`], and serializes the buffered sink back onto the
//! wire. Supports HTTP/1.1 persistent connections (keep-alive).
//!
//! The adapter core is synchronous; this runtime buffers the full request
//! before dispatching and the full response after, so dispatch itself never
//! blocks on the socket.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::bridge::{DispatchBridge, DispatchKind, DispatchOutcome, Handler};
use crate::runtime::{BodyStream, ClientCertificate, ResponseSink, RuntimeRequest};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while parsing a request head.
#[derive(Debug, Error)]
enum HeadError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Maximum number of headers we support per request.
const MAX_HEADERS: usize = 64;

/// The reference HTTP server.
///
/// Binds to a TCP address and dispatches each inbound exchange through a
/// [`DispatchBridge`] to the supplied [`Handler`].
///
/// # Examples
///
/// ```rust,no_run
/// use gantry::{HandlerError, Request, Response, Server, StringBody};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server
///         .run(|_req: &mut dyn Request| {
///             Ok::<_, HandlerError>(Response::new(200).body(StringBody::new("Hello, World!")))
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching exchanges to `handler`.
    ///
    /// The handler is wrapped in a [`DispatchBridge`] shared across all
    /// spawned Tokio tasks, so it must be `Send + Sync + 'static`.
    ///
    /// This method runs until the process is terminated or an unrecoverable
    /// listener error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H>(self, handler: H) -> Result<(), ServerError>
    where
        H: Handler + Send + Sync + 'static,
    {
        let bridge = Arc::new(DispatchBridge::new(handler));
        info!(address = %self.local_addr, "gantry listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let bridge = Arc::clone(&bridge);
            let local_addr = self.local_addr;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, local_addr, bridge).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// exchange per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<H>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    bridge: Arc<DispatchBridge<H>>,
) -> Result<(), std::io::Error>
where
    H: Handler + Send + Sync + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        // Guard against excessively large requests.
        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large — sending 413");
            stream
                .write_all(&plain_response(413, "Request entity too large"))
                .await?;
            break;
        }

        // Attempt to parse the buffered data as a request head.
        let (head, body_offset) = match parse_head(&buf) {
            Ok(pair) => pair,
            Err(HeadError::Incomplete) => {
                // Headers not yet fully received — read more data.
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                stream
                    .write_all(&plain_response(400, &format!("Bad Request: {e}")))
                    .await?;
                break;
            }
        };

        // Wait for the full body to arrive if Content-Length is set.
        let content_length = head.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if buf.len() < total_needed {
            continue;
        }

        let keep_alive = head.is_keep_alive();
        let exchange_bytes = buf.split_to(total_needed).freeze();
        let body = exchange_bytes.slice(body_offset..);
        let exchange = ParsedExchange::new(head, body, peer_addr, local_addr);

        debug!(
            peer = %peer_addr,
            method = %exchange.head.method,
            path = %exchange.head.path,
            "dispatching exchange"
        );

        let mut sink = BufferedSink::new(keep_alive);
        match bridge.dispatch(DispatchKind::Inbound, exchange, &mut sink) {
            Ok(DispatchOutcome::Handled) => {
                stream.write_all(&sink.into_bytes()).await?;
                stream.flush().await?;
            }
            Ok(DispatchOutcome::Skipped) => {
                // Unreachable for Inbound dispatches; close to be safe.
                break;
            }
            Err(e) => {
                // The handler is not re-invoked; the runtime answers with a
                // generic fallback on a fresh sink and drops the connection.
                warn!(peer = %peer_addr, error = %e, "dispatch failed — sending 500");
                stream
                    .write_all(&plain_response(500, "Internal Server Error"))
                    .await?;
                break;
            }
        }

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}

/// A parsed request head with raw header names, casing, order and
/// duplicates preserved.
#[derive(Debug)]
struct RawHead {
    method: String,
    path: String,
    query: Option<String>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    minor_version: u8,
    headers: Vec<(String, String)>,
}

impl RawHead {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    fn is_keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.minor_version == 1,
        }
    }
}

/// Parses a request head from a byte slice using httparse.
///
/// Returns the head and the byte offset at which the body begins (i.e.
/// immediately after the `\r\n\r\n` header terminator). Header values that
/// are not valid UTF-8 are skipped.
fn parse_head(buf: &[u8]) -> Result<(RawHead, usize), HeadError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw_req = httparse::Request::new(&mut headers);

    let body_offset = match raw_req.parse(buf)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Err(HeadError::Incomplete),
    };

    let method = raw_req
        .method
        .ok_or(HeadError::MissingField { field: "method" })?
        .to_owned();

    let raw_path = raw_req
        .path
        .ok_or(HeadError::MissingField { field: "path" })?;

    let (path, query) = match raw_path.find('?') {
        Some(pos) => (
            raw_path[..pos].to_owned(),
            Some(raw_path[pos + 1..].to_owned()),
        ),
        None => (raw_path.to_owned(), None),
    };

    let minor_version = raw_req
        .version
        .ok_or(HeadError::MissingField { field: "version" })?;

    let mut header_list = Vec::with_capacity(raw_req.headers.len());
    for header in raw_req.headers.iter() {
        if let Ok(value) = std::str::from_utf8(header.value) {
            header_list.push((header.name.to_owned(), value.to_owned()));
        }
    }

    Ok((
        RawHead {
            method,
            path,
            query,
            minor_version,
            headers: header_list,
        },
        body_offset,
    ))
}

/// One inbound exchange as seen through the [`RuntimeRequest`] capability.
///
/// Plain TCP listener: the scheme is always `"http"` and no client
/// certificates are available. The body is fully buffered and handed out as
/// a take-once stream.
struct ParsedExchange {
    head: RawHead,
    body: Option<Bytes>,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl ParsedExchange {
    fn new(head: RawHead, body: Bytes, peer_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            head,
            body: Some(body),
            peer_addr,
            local_addr,
        }
    }
}

impl RuntimeRequest for ParsedExchange {
    fn server_port(&self) -> u16 {
        self.local_addr.port()
    }

    fn server_name(&self) -> String {
        match self.head.header("host") {
            Some(host) => strip_port(host).to_owned(),
            None => self.local_addr.ip().to_string(),
        }
    }

    fn remote_addr(&self) -> String {
        self.peer_addr.ip().to_string()
    }

    fn path(&self) -> String {
        self.head.path.clone()
    }

    fn query_string(&self) -> Option<String> {
        self.head.query.clone()
    }

    fn scheme(&self) -> String {
        "http".to_owned()
    }

    fn method(&self) -> String {
        self.head.method.clone()
    }

    fn protocol(&self) -> String {
        format!("HTTP/1.{}", self.head.minor_version)
    }

    fn header_names(&self) -> Vec<String> {
        self.head.headers.iter().map(|(n, _)| n.clone()).collect()
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.head
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn client_certificates(&self) -> Vec<ClientCertificate> {
        Vec::new()
    }

    fn body(&mut self) -> io::Result<BodyStream> {
        match self.body.take() {
            Some(bytes) => Ok(Box::new(io::Cursor::new(bytes))),
            None => Err(io::Error::other("body already taken")),
        }
    }
}

/// Strips a trailing `:port` from a Host header value, if present.
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// A [`ResponseSink`] that buffers everything and serializes to HTTP/1.1
/// wire format once the exchange is fully handled.
struct BufferedSink {
    status: u16,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Vec<u8>,
    keep_alive: bool,
}

impl BufferedSink {
    fn new(keep_alive: bool) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            content_type: None,
            body: Vec::new(),
            keep_alive,
        }
    }

    fn put_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Serializes the buffered response into HTTP/1.1 wire format.
    ///
    /// The canonical content-type channel wins over any `Content-Type` set
    /// through the generic header table, matching how runtimes with a
    /// resolved content-type treat the two.
    fn into_bytes(mut self) -> BytesMut {
        if let Some(ct) = self.content_type.take() {
            self.put_header("Content-Type", &ct);
        }

        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        self.put_header("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line; codes without a canonical phrase get none at all
        // rather than a dangling space.
        let status_line = match reason_phrase(self.status) {
            "" => format!("HTTP/1.1 {}\r\n", self.status),
            phrase => format!("HTTP/1.1 {} {}\r\n", self.status, phrase),
        };
        buf.put(status_line.as_bytes());

        // Headers
        for (name, value) in &self.headers {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl ResponseSink for BufferedSink {
    fn set_status(&mut self, status: u16) -> io::Result<()> {
        self.status = status;
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.put_header(name, value);
        Ok(())
    }

    fn set_content_type(&mut self, value: &str) -> io::Result<()> {
        self.content_type = Some(value.to_owned());
        Ok(())
    }

    fn body_writer(&mut self) -> io::Result<&mut (dyn io::Write + Send)> {
        Ok(self)
    }
}

impl Write for BufferedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a runtime-generated plain-text response, e.g. the 500 fallback
/// written when a dispatch error escapes. Always closes the connection.
fn plain_response(status: u16, message: &str) -> BytesMut {
    let mut sink = BufferedSink::new(false);
    sink.status = status;
    sink.put_header("Content-Type", "text/plain; charset=utf-8");
    sink.body.extend_from_slice(message.as_bytes());
    sink.into_bytes()
}

/// Canonical reason phrase for common status codes.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}
