//! WebSocket server: a TCP listener that upgrades incoming connections.

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::{Connection, Role, read_http_message};
use crate::error::Result;
use crate::http::Request;
use crate::protocol::{is_valid_ws_request, new_ws_response};

/// A WebSocket server.
///
/// Accepts TCP connections, performs the server half of the opening
/// handshake, and hands out [`Connection`]s. The server keeps a clone of
/// every accepted connection so [`Server::close`] can shut them all down.
pub struct Server {
    listener: TcpListener,
    connections: Vec<Connection>,
    protocols: Vec<String>,
    extensions: Vec<String>,
    config: Config,
}

impl Server {
    /// Bind to `addr` and start listening.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::bind_with(addr, &[], &[]).await
    }

    /// Like [`Server::bind`], recording subprotocols and extensions the
    /// server supports. They are attached to accepted connections; no
    /// negotiation is performed.
    pub async fn bind_with(
        addr: impl ToSocketAddrs,
        protocols: &[String],
        extensions: &[String],
    ) -> Result<Self> {
        Self::bind_with_config(addr, protocols, extensions, Config::server()).await
    }

    /// Like [`Server::bind_with`], with explicit timeouts and limits.
    pub async fn bind_with_config(
        addr: impl ToSocketAddrs,
        protocols: &[String],
        extensions: &[String],
        config: Config,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            connections: Vec::new(),
            protocols: protocols.to_vec(),
            extensions: extensions.to_vec(),
            config,
        })
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket is gone.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection and perform the handshake.
    ///
    /// Returns `Ok(None)` when the peer fails the handshake: says nothing
    /// within the handshake timeout, sends something that is not a valid
    /// upgrade request, or hangs up early. The listener stays usable either
    /// way.
    ///
    /// # Errors
    ///
    /// Only listener-level I/O errors; per-connection failures are
    /// `Ok(None)`.
    pub async fn accept(&mut self) -> Result<Option<Connection>> {
        // Connections closed since the last accept are done for good.
        self.connections.retain(|conn| !conn.is_closed());

        let (mut stream, peer) = self.listener.accept().await?;
        debug!(%peer, "tcp connection accepted");

        let (raw, leftover) = match timeout(
            self.config.handshake_timeout,
            read_http_message(&mut stream, self.config.limits.max_handshake_size),
        )
        .await
        {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                debug!(%peer, error = %e, "handshake read failed");
                return Ok(None);
            }
            Err(_) => {
                debug!(%peer, "handshake timed out");
                return Ok(None);
            }
        };

        let req = match Request::parse(&raw) {
            Ok(req) => req,
            Err(e) => {
                debug!(%peer, error = %e, "malformed handshake request");
                return Ok(None);
            }
        };
        if !is_valid_ws_request(&req) {
            debug!(%peer, "not a websocket upgrade request");
            return Ok(None);
        }

        let ws_key = req.headers.get("Sec-WebSocket-Key").unwrap_or_default();
        let res = new_ws_response(ws_key);
        if let Err(e) = stream.write_all(res.to_string().as_bytes()).await {
            debug!(%peer, error = %e, "handshake response write failed");
            return Ok(None);
        }
        debug!(%peer, "handshake complete");

        let conn = Connection::from_upgraded(
            stream,
            leftover,
            Role::Server,
            self.protocols.clone(),
            self.extensions.clone(),
            self.config.clone(),
        );
        self.connections.push(conn.clone());
        Ok(Some(conn))
    }

    /// Connections accepted and not yet known to be closed.
    ///
    /// Closed connections are pruned on each `accept`.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Close every accepted connection and drop the listener.
    pub async fn close(mut self) {
        info!(count = self.connections.len(), "server shutting down");
        for conn in self.connections.drain(..) {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    async fn bind_server(config: Config) -> Server {
        Server::bind_with_config("127.0.0.1:0", &[], &[], config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_accept_valid_handshake() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            Connection::connect(&format!("ws://127.0.0.1:{}/chat", addr.port())).await
        });

        let conn = server.accept().await.unwrap();
        assert!(conn.is_some());
        assert_eq!(server.connections().len(), 1);
        assert!(client.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_accept_rejects_non_websocket_request() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            // Server gives no 101; the stream just ends.
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf).await;
        });

        let conn = server.accept().await.unwrap();
        assert!(conn.is_none());
        assert!(server.connections().is_empty());
        client.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_times_out_on_silent_peer() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();

        // Connects but never sends a byte.
        let silent = TcpStream::connect(addr).await.unwrap();

        let conn = server.accept().await.unwrap();
        assert!(conn.is_none());
        drop(silent);
    }

    #[tokio::test]
    async fn test_accept_handles_early_hangup() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        drop(stream);

        let conn = server.accept().await.unwrap();
        assert!(conn.is_none());
    }

    #[tokio::test]
    async fn test_closed_connections_pruned_on_accept() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();
        let url = format!("ws://127.0.0.1:{}/", addr.port());

        let first_url = url.clone();
        let first = tokio::spawn(async move { Connection::connect(&first_url).await });
        let first_conn = server.accept().await.unwrap().unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(server.connections().len(), 1);

        first_conn.close().await;

        let second = tokio::spawn(async move { Connection::connect(&url).await });
        server.accept().await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // The closed connection is gone; only the live one is retained.
        assert_eq!(server.connections().len(), 1);
        assert!(!server.connections()[0].is_closed());
    }

    #[tokio::test]
    async fn test_close_shuts_down_accepted_connections() {
        let mut server = bind_server(Config::server()).await;
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            Connection::connect(&format!("ws://127.0.0.1:{}/", addr.port())).await
        });
        let server_conn = server.accept().await.unwrap().unwrap();
        let client_conn = client.await.unwrap().unwrap();

        server.close().await;
        assert!(server_conn.is_closed());

        // The peer sees end-of-stream on its next blocking receive.
        let err = tokio::time::timeout(Duration::from_secs(5), client_conn.recv_text())
            .await
            .unwrap();
        assert!(err.is_err());
    }
}
