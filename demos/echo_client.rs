//! WebSocket echo client: sends each line from stdin, prints the echo.
//!
//! Run with: cargo run --example echo_client [ws://host:port/path]

use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};
use wsline::Connection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8001/".to_string());

    let conn = Connection::connect(&url).await?;
    println!("connected to {url}; type a line to send, Ctrl-D to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        conn.send_text(line).await?;
        let reply = conn.recv_text().await?;
        println!("< {reply}");
    }

    conn.close().await;
    Ok(())
}
