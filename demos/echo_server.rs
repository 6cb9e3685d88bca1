//! WebSocket echo server.
//!
//! Run with: cargo run --example echo_server
//!
//! Then point `echo_client` (or any WebSocket client) at ws://127.0.0.1:8001/.

use std::error::Error;

use wsline::Server;

const ADDR: &str = "127.0.0.1:8001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wsline=debug".into()),
        )
        .init();

    let mut server = Server::bind(ADDR).await?;
    println!("Echo server listening on ws://{ADDR}/");

    loop {
        let Some(conn) = server.accept().await? else {
            continue; // peer failed the handshake, keep listening
        };

        tokio::spawn(async move {
            loop {
                match conn.recv_text().await {
                    Ok(msg) => {
                        println!("echoing: {msg}");
                        if conn.send_text(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        println!("connection ended: {e}");
                        break;
                    }
                }
            }
        });
    }
}
