//! Minimal HTTP/1.1 request and response messages.
//!
//! Just enough HTTP to carry the WebSocket opening handshake: start line,
//! headers in insertion order, optional body. `Content-Length` always
//! tracks the body length; both are set in one builder step so a message
//! is immutable once constructed.

use std::fmt;

use crate::error::{Error, Result};

/// HTTP headers, preserving insertion order for formatting.
///
/// Header names are compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Look up a header value by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, val)| val.as_str())
    }

    /// Check whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a header, replacing an existing value in place or appending.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Remove a header by exact name.
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(key, _)| key != name);
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, val)| (key.as_str(), val.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

/// Split raw HTTP text into (start line, header lines, body).
fn split_message(raw: &str) -> Result<(&str, Vec<&str>, String)> {
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or(Error::MissingBodySeparator)?;
    let mut lines = head.split("\r\n");
    let start_line = lines.next().unwrap_or("");
    Ok((start_line, lines.collect(), body.to_string()))
}

/// Parse header lines, requiring `": "` exactly once per line.
fn parse_headers(lines: &[&str]) -> Result<Headers> {
    let mut headers = Headers::new();
    for line in lines {
        let mut parts = line.splitn(3, ": ");
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) if !name.is_empty() => {
                headers.set(name, value);
            }
            _ => return Err(Error::MalformedHeader((*line).to_string())),
        }
    }
    Ok(headers)
}

fn check_proto(proto: &str) -> Result<()> {
    if proto == "HTTP/1.1" || proto == "HTTP/1.0" {
        Ok(())
    } else {
        Err(Error::UnsupportedProtocol(proto.to_string()))
    }
}

/// An HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method (e.g. `GET`).
    pub method: String,
    /// Request target (path, e.g. `/chat`).
    pub target: String,
    /// Headers in insertion order.
    pub headers: Headers,
    /// Message body.
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request with no headers and an empty body.
    #[must_use]
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (builder step).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the body and recompute `Content-Length` in one step.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.headers.set("Content-Length", self.body.len().to_string());
        self
    }

    /// Parse a request from raw HTTP text.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedStartLine`] unless the first line is exactly
    ///   `METHOD SP TARGET SP PROTO`.
    /// - [`Error::UnsupportedProtocol`] unless proto is HTTP/1.1 or HTTP/1.0.
    /// - [`Error::MalformedHeader`] when a header line lacks `": "` exactly once.
    /// - [`Error::MissingBodySeparator`] when no blank line exists.
    pub fn parse(raw: &str) -> Result<Self> {
        let (start_line, header_lines, body) = split_message(raw)?;

        let parts: Vec<&str> = start_line.split(' ').collect();
        let [method, target, proto] = parts[..] else {
            return Err(Error::MalformedStartLine(start_line.to_string()));
        };
        check_proto(proto)?;

        let headers = parse_headers(&header_lines)?;
        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            headers,
            body: Vec::new(),
        }
        .with_body(body.into_bytes()))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} HTTP/1.1\r\n{}\r\n{}",
            self.method,
            self.target,
            self.headers,
            String::from_utf8_lossy(&self.body)
        )
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line remainder, e.g. `101 Switching Protocols`.
    pub status: String,
    /// Headers in insertion order.
    pub headers: Headers,
    /// Message body.
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with no headers and an empty body.
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (builder step).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the body and recompute `Content-Length` in one step.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.headers.set("Content-Length", self.body.len().to_string());
        self
    }

    /// Parse a response from raw HTTP text.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Request::parse`], with the start line
    /// parsed as `PROTO SP STATUS`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (start_line, header_lines, body) = split_message(raw)?;

        let (proto, status) = start_line
            .split_once(' ')
            .ok_or_else(|| Error::MalformedStartLine(start_line.to_string()))?;
        check_proto(proto)?;

        let headers = parse_headers(&header_lines)?;
        Ok(Self {
            status: status.to_string(),
            headers,
            body: Vec::new(),
        }
        .with_body(body.into_bytes()))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP/1.1 {}\r\n{}\r\n{}",
            self.status,
            self.headers,
            String::from_utf8_lossy(&self.body)
        )
    }
}
