//! Shared test doubles for the capability traits.

use std::io::{self, Write};

use super::{BodyStream, ClientCertificate, ResponseSink, RuntimeRequest};

/// A configurable fake runtime request handle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockHandle {
    pub port: u16,
    pub name: String,
    pub addr: String,
    pub path: String,
    pub query: Option<String>,
    pub scheme: String,
    pub method: String,
    pub protocol: String,
    /// Raw header entries in enumeration order, casing preserved.
    pub headers: Vec<(String, String)>,
    pub certs: Vec<ClientCertificate>,
    pub body: Option<Vec<u8>>,
    pub fail_body: bool,
}

impl Default for MockHandle {
    fn default() -> Self {
        Self {
            port: 8080,
            name: "localhost".to_owned(),
            addr: "127.0.0.1".to_owned(),
            path: "/".to_owned(),
            query: None,
            scheme: "http".to_owned(),
            method: "GET".to_owned(),
            protocol: "HTTP/1.1".to_owned(),
            headers: Vec::new(),
            certs: Vec::new(),
            body: Some(Vec::new()),
            fail_body: false,
        }
    }
}

impl MockHandle {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }
}

impl RuntimeRequest for MockHandle {
    fn server_port(&self) -> u16 {
        self.port
    }

    fn server_name(&self) -> String {
        self.name.clone()
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query_string(&self) -> Option<String> {
        self.query.clone()
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

    fn header_names(&self) -> Vec<String> {
        self.headers.iter().map(|(n, _)| n.clone()).collect()
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn client_certificates(&self) -> Vec<ClientCertificate> {
        self.certs.clone()
    }

    fn body(&mut self) -> io::Result<BodyStream> {
        if self.fail_body {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream failed"));
        }
        match self.body.take() {
            Some(bytes) => Ok(Box::new(io::Cursor::new(bytes))),
            None => Err(io::Error::other("body already taken")),
        }
    }
}

/// One operation applied to a [`RecordingSink`], in application order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkOp {
    Status(u16),
    Header(String, String),
    ContentType(String),
    BodyWrite(usize),
}

/// A sink that records every operation so tests can assert on ordering.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub ops: Vec<SinkOp>,
    pub body: Vec<u8>,
    /// When set, every operation after this many successful ones fails.
    /// `Some(0)` fails from the first operation on.
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    fn check(&self) -> io::Result<()> {
        match self.fail_after {
            Some(n) if self.ops.len() >= n => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "sink failure injected",
            )),
            _ => Ok(()),
        }
    }

    /// The final content type: the last `ContentType` op applied, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            SinkOp::ContentType(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn status(&self) -> Option<u16> {
        self.ops.iter().find_map(|op| match op {
            SinkOp::Status(s) => Some(*s),
            _ => None,
        })
    }
}

impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: u16) -> io::Result<()> {
        self.check()?;
        self.ops.push(SinkOp::Status(status));
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.check()?;
        self.ops.push(SinkOp::Header(name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn set_content_type(&mut self, value: &str) -> io::Result<()> {
        self.check()?;
        self.ops.push(SinkOp::ContentType(value.to_owned()));
        Ok(())
    }

    fn body_writer(&mut self) -> io::Result<&mut (dyn io::Write + Send)> {
        self.check()?;
        Ok(self)
    }
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.ops.push(SinkOp::BodyWrite(buf.len()));
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
