//! WebSocket connection management.
//!
//! The [`Connection`] type owns both halves of an upgraded TCP stream: the
//! read half lives in a spawned receive loop that reassembles messages and
//! answers pings, the write half is shared between callers and that loop.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsline::Connection;
//!
//! let conn = Connection::connect("ws://example.com:8080/chat").await?;
//! conn.send_text("Hello").await?;
//! let reply = conn.recv_text().await?;
//! conn.close().await;
//! ```

mod role;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
pub(crate) use connection::read_http_message;
pub use role::Role;
