//! WebSocket opening handshake (RFC 6455 §4).
//!
//! Builds and validates the HTTP Upgrade request and the `101 Switching
//! Protocols` response. The only cryptographic step is the accept digest:
//! base64(SHA-1(key + GUID)), a one-way proof the server saw the client's
//! key, not a secret.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::http::{Request, Response};
use crate::url::Url;

/// The GUID appended to the client key for the accept digest (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Status line of a successful upgrade response.
pub const SWITCHING_PROTOCOLS: &str = "101 Switching Protocols";

/// Generate a fresh base64-encoded 16-byte `Sec-WebSocket-Key`.
///
/// Falls back to system time if `getrandom` fails.
fn generate_key() -> String {
    let mut buf = [0u8; 16];
    if getrandom::getrandom(&mut buf).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0x1234_5678);
        buf[..16].copy_from_slice(&nanos.to_le_bytes());
    }
    BASE64.encode(buf)
}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
///
/// # Example
///
/// ```
/// use wsline::protocol::handshake::accept_key;
///
/// // RFC 6455 §1.3 worked example.
/// assert_eq!(
///     accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
#[must_use]
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Host header value: host, plus the port when it is not the scheme default.
fn host_header(url: &Url) -> String {
    let mut host = url.host.clone();
    let default = match url.scheme.as_str() {
        "http" | "ws" => Some("80"),
        "https" | "wss" => Some("443"),
        _ => None,
    };
    if let Some(ref port) = url.port {
        if default != Some(port.as_str()) {
            host.push(':');
            host.push_str(port);
        }
    }
    host
}

/// Build the upgrade request for a client connecting to `url`.
///
/// Carries a fresh random key; read it back from the returned request's
/// `Sec-WebSocket-Key` header to validate the response later.
#[must_use]
pub fn new_ws_request(url: &Url, protocols: &[String], extensions: &[String]) -> Request {
    let mut req = Request::new("GET", url.path.clone())
        .with_header("Host", host_header(url))
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Key", generate_key())
        .with_header("Sec-WebSocket-Version", "13");
    if !protocols.is_empty() {
        req = req.with_header("Sec-WebSocket-Protocol", protocols.join(", "));
    }
    if !extensions.is_empty() {
        req = req.with_header("Sec-WebSocket-Extensions", extensions.join(", "));
    }
    req
}

/// Check whether a request is a well-formed WebSocket upgrade.
///
/// Requires method GET plus the `Host`, `Upgrade`, `Connection`,
/// `Sec-WebSocket-Version` and `Sec-WebSocket-Key` headers. The
/// `Upgrade`/`Connection` values are compared case-insensitively; header
/// names are not.
#[must_use]
pub fn is_valid_ws_request(req: &Request) -> bool {
    req.method == "GET"
        && req.headers.contains("Host")
        && req
            .headers
            .get("Upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
        && req
            .headers
            .get("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("upgrade"))
        && req.headers.get("Sec-WebSocket-Version") == Some("13")
        && req.headers.contains("Sec-WebSocket-Key")
}

/// Build the `101 Switching Protocols` response for a client key.
#[must_use]
pub fn new_ws_response(ws_key: &str) -> Response {
    Response::new(SWITCHING_PROTOCOLS)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Accept", accept_key(ws_key))
}

/// Check a server's response against the key the client sent.
#[must_use]
pub fn is_valid_ws_response(res: &Response, ws_key: &str) -> bool {
    res.status == SWITCHING_PROTOCOLS
        && res
            .headers
            .get("Upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
        && res
            .headers
            .get("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("upgrade"))
        && res.headers.get("Sec-WebSocket-Accept") == Some(accept_key(ws_key).as_str())
}
