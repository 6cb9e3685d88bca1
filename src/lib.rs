//! # wsline - RFC 6455 WebSocket Protocol Implementation
//!
//! `wsline` is a small WebSocket stack over TCP: URL and HTTP/1.1 message
//! models, the opening handshake, a frame codec, and message-level
//! connections for both client and server.
//!
//! ## Features
//!
//! - **Full frame codec** with masking, extended lengths, and fragmentation
//! - **Message-level API**: text and binary queues per connection, pings
//!   answered automatically
//! - **Async-first design** on tokio, with a receive loop per connection
//! - **Resource limits** on message size, fragment count, and handshakes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsline::{Connection, Server};
//!
//! // Server
//! let mut server = Server::bind("127.0.0.1:8001").await?;
//! if let Some(conn) = server.accept().await? {
//!     let msg = conn.recv_text().await?;
//!     conn.send_text(msg).await?;
//! }
//!
//! // Client
//! let conn = Connection::connect("ws://127.0.0.1:8001/chat").await?;
//! conn.send_text("Hello").await?;
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod protocol;
pub mod server;
pub mod url;

pub use codec::{FrameReader, FrameWriter};
pub use config::{Config, Limits};
pub use connection::{Connection, Role};
pub use error::{Error, Result};
pub use http::{Request, Response};
pub use protocol::{Frame, OpCode, WS_GUID, accept_key};
pub use server::Server;
pub use url::Url;
