//! End-to-end tests over real loopback sockets.
//!
//! The "raw" client side here speaks the wire protocol by hand, so the
//! server's behavior is checked against actual bytes, not against our own
//! client implementation.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use wsline::protocol::{is_valid_ws_response, new_ws_request};
use wsline::{Config, Connection, Error, Frame, OpCode, Response, Server, Url};

/// Handshake over a raw TCP stream, returning the upgraded stream.
async fn raw_client(addr: std::net::SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let url = Url::parse(&format!("ws://{}:{}{}", addr.ip(), addr.port(), path)).unwrap();
    let req = new_ws_request(&url, &[], &[]);
    let key = req.headers.get("Sec-WebSocket-Key").unwrap().to_string();
    stream.write_all(req.to_string().as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server hung up during handshake");
        buf.extend_from_slice(&chunk[..n]);
    }
    let res = Response::parse(std::str::from_utf8(&buf).unwrap()).unwrap();
    assert!(is_valid_ws_response(&res, &key));
    stream
}

/// Send one masked frame on a raw stream.
async fn send_masked(stream: &mut TcpStream, frame: &Frame) {
    let wire = frame.encode(Some([0x37, 0xfa, 0x21, 0x3d])).unwrap();
    stream.write_all(&wire).await.unwrap();
}

/// Read one (unmasked) frame off a raw stream.
async fn read_raw_frame(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Frame {
    let mut chunk = [0u8; 1024];
    loop {
        match Frame::parse(buf) {
            Ok((frame, consumed)) => {
                buf.drain(..consumed);
                return frame;
            }
            Err(Error::TruncatedFrame { .. }) => {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "stream ended mid-frame");
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) => panic!("unexpected frame error: {e}"),
        }
    }
}

#[tokio::test]
async fn test_echo_roundtrip() {
    let mut server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let conn = Connection::connect(&format!("ws://127.0.0.1:{}/echo", addr.port()))
            .await
            .unwrap();
        conn.send_text("hello").await.unwrap();
        let reply = conn.recv_text().await.unwrap();
        conn.close().await;
        reply
    });

    let conn = server.accept().await.unwrap().unwrap();
    let msg = conn.recv_text().await.unwrap();
    assert_eq!(msg, "hello");
    conn.send_text(msg).await.unwrap();

    assert_eq!(client.await.unwrap(), "hello");
    server.close().await;
}

#[tokio::test]
async fn test_fragmented_message_reassembled() {
    let mut server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = raw_client(addr, "/frag").await;
        send_masked(&mut stream, &Frame::new(false, OpCode::Text, b"one".to_vec())).await;
        send_masked(
            &mut stream,
            &Frame::new(false, OpCode::Continuation, b"two".to_vec()),
        )
        .await;
        send_masked(
            &mut stream,
            &Frame::new(true, OpCode::Continuation, b"three".to_vec()),
        )
        .await;
        stream
    });

    let conn = server.accept().await.unwrap().unwrap();
    assert_eq!(conn.recv_text().await.unwrap(), "onetwothree");
    drop(client.await.unwrap());
}

#[tokio::test]
async fn test_ping_answered_with_identical_pong() {
    let mut server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = raw_client(addr, "/ping").await;
        send_masked(&mut stream, &Frame::ping(b"are you there".to_vec())).await;

        let mut buf = Vec::new();
        let pong = read_raw_frame(&mut stream, &mut buf).await;
        assert_eq!(pong.opcode, OpCode::Pong);
        assert!(pong.fin);
        assert_eq!(pong.payload, b"are you there");
        stream
    });

    let conn = server.accept().await.unwrap().unwrap();
    let _stream = client.await.unwrap();

    // The ping never surfaces as application data.
    assert_eq!(conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_interleaved_ping_does_not_break_reassembly() {
    let mut server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = raw_client(addr, "/").await;
        send_masked(&mut stream, &Frame::new(false, OpCode::Text, b"Hel".to_vec())).await;
        send_masked(&mut stream, &Frame::ping(b"mid".to_vec())).await;
        send_masked(
            &mut stream,
            &Frame::new(true, OpCode::Continuation, b"lo".to_vec()),
        )
        .await;
        stream
    });

    let conn = server.accept().await.unwrap().unwrap();
    assert_eq!(conn.recv_text().await.unwrap(), "Hello");
    drop(client.await.unwrap());
}

#[tokio::test]
async fn test_client_rejects_non_upgrade_response() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = stream.read(&mut buf).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });

    let result = Connection::connect(&format!("ws://127.0.0.1:{}/", addr.port())).await;
    assert!(matches!(result, Err(Error::HandshakeRejected(_))));
}

#[tokio::test]
async fn test_connect_to_dead_port_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = Connection::connect(&format!("ws://127.0.0.1:{}/", addr.port())).await;
    assert!(matches!(
        result,
        Err(Error::ConnectRefused | Error::ConnectTimeout)
    ));
}

#[tokio::test]
async fn test_connect_times_out_on_silent_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accepts the TCP connection but never answers the handshake.
    let silent = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(stream);
    });

    let config = Config::client().with_connect_timeout(std::time::Duration::from_millis(200));
    let result = Connection::connect_with_config(
        &format!("ws://127.0.0.1:{}/", addr.port()),
        &[],
        &[],
        config,
    )
    .await;
    assert!(matches!(result, Err(Error::ConnectTimeout)));
    silent.abort();
}

#[tokio::test]
async fn test_binary_message_roundtrip() {
    let mut server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let payload: Vec<u8> = (0..=255).collect();
    let expected = payload.clone();

    let client = tokio::spawn(async move {
        let conn = Connection::connect(&format!("ws://127.0.0.1:{}/", addr.port()))
            .await
            .unwrap();
        conn.send(payload).await.unwrap();
        conn
    });

    let conn = server.accept().await.unwrap().unwrap();
    let msg = loop {
        if let Some(msg) = conn.recv().await.unwrap() {
            break msg;
        }
        tokio::task::yield_now().await;
    };
    assert_eq!(msg, expected);

    client.await.unwrap().close().await;
}
