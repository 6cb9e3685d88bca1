//! The `Connection` type and its background receive loop.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::{FrameReader, FrameWriter};
use crate::config::{Config, Limits};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::http::Response;
use crate::protocol::{
    Frame, MessageAssembler, OpCode, is_valid_ws_response, new_ws_request,
};
use crate::url::Url;

/// A WebSocket connection over TCP.
///
/// Cloning is cheap and shares the underlying connection; a server keeps a
/// clone of every connection it accepts so it can close them in bulk.
///
/// A spawned receive loop owns the read half of the stream. It reassembles
/// fragmented messages into per-type queues, answers pings with pongs, and
/// stops on a close frame or a protocol violation. Violations surface as an
/// error on the next operation.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    role: Role,
    protocols: Vec<String>,
    extensions: Vec<String>,
    writer: Arc<Mutex<FrameWriter<OwnedWriteHalf>>>,
    text_rx: Mutex<UnboundedReceiver<String>>,
    binary_rx: Mutex<UnboundedReceiver<Vec<u8>>>,
    /// Set once by `close()`; never cleared.
    closed: AtomicBool,
    /// Set by the receive loop when the stream ends, for any reason.
    ended: Arc<AtomicBool>,
    fault: Arc<StdMutex<Option<Error>>>,
    receive_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Connect to a WebSocket server at `url` (e.g. `ws://host:port/path`).
    ///
    /// Dials the host, performs the opening handshake, and spawns the
    /// receive loop. Both the dial and the server's handshake response are
    /// bounded by the default connect timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] / [`Error::InvalidPort`] for a bad URL.
    /// - [`Error::ConnectTimeout`] / [`Error::ConnectRefused`] from the dial.
    /// - [`Error::HandshakeRejected`] if the response is not a valid upgrade.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, &[], &[]).await
    }

    /// Like [`Connection::connect`], offering subprotocols and extensions.
    ///
    /// The lists go out on the upgrade request as `Sec-WebSocket-Protocol`
    /// and `Sec-WebSocket-Extensions`; no negotiation is performed beyond
    /// advertising them.
    pub async fn connect_with(
        url: &str,
        protocols: &[String],
        extensions: &[String],
    ) -> Result<Self> {
        Self::connect_with_config(url, protocols, extensions, Config::client()).await
    }

    /// Like [`Connection::connect_with`], with explicit timeouts and limits.
    pub async fn connect_with_config(
        url: &str,
        protocols: &[String],
        extensions: &[String],
        config: Config,
    ) -> Result<Self> {
        let url = Url::parse(url)?;
        let (host, port) = url.hostpair()?;

        let mut stream = timeout(
            config.connect_timeout,
            TcpStream::connect((host.as_str(), port)),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)??;
        debug!(%host, port, "tcp connection established");

        let req = new_ws_request(&url, protocols, extensions);
        let ws_key = req
            .headers
            .get("Sec-WebSocket-Key")
            .unwrap_or_default()
            .to_string();
        stream.write_all(req.to_string().as_bytes()).await?;

        let (raw, leftover) = timeout(
            config.connect_timeout,
            read_http_message(&mut stream, config.limits.max_handshake_size),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)??;

        let res = Response::parse(&raw)
            .map_err(|e| Error::HandshakeRejected(e.to_string()))?;
        if !is_valid_ws_response(&res, &ws_key) {
            return Err(Error::HandshakeRejected(format!(
                "not a valid upgrade response: {}",
                res.status
            )));
        }
        debug!(url = %url, "handshake complete");

        Ok(Self::from_upgraded(
            stream,
            leftover,
            Role::Client,
            protocols.to_vec(),
            extensions.to_vec(),
            config,
        ))
    }

    /// Wrap an already-upgraded stream and spawn the receive loop.
    ///
    /// Both ends use this after their half of the handshake succeeds.
    /// `buffered` carries any frame bytes that arrived with the peer's
    /// handshake message.
    pub(crate) fn from_upgraded(
        stream: TcpStream,
        buffered: Vec<u8>,
        role: Role,
        protocols: Vec<String>,
        extensions: Vec<String>,
        config: Config,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (text_tx, text_rx) = unbounded_channel();
        let (binary_tx, binary_rx) = unbounded_channel();

        let writer = Arc::new(Mutex::new(FrameWriter::new(write_half, role)));
        let ended = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(StdMutex::new(None));

        let reader = FrameReader::with_buffered(read_half, &buffered)
            .frame_size_limit(config.limits.max_frame_size)
            .expect_masked(role.expects_masked());

        let handle = tokio::spawn(receive_loop(
            reader,
            Arc::clone(&writer),
            text_tx,
            binary_tx,
            Arc::clone(&ended),
            Arc::clone(&fault),
            config.limits,
        ));

        Self {
            inner: Arc::new(Inner {
                role,
                protocols,
                extensions,
                writer,
                text_rx: Mutex::new(text_rx),
                binary_rx: Mutex::new(binary_rx),
                closed: AtomicBool::new(false),
                ended,
                fault,
                receive_loop: Mutex::new(Some(handle)),
            }),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Subprotocols advertised during the handshake.
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.inner.protocols
    }

    /// Extensions advertised during the handshake.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.inner.extensions
    }

    /// Whether the connection is done: `close()` was called or the
    /// receive loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.ended.load(Ordering::SeqCst)
    }

    /// Send `data` as a single binary message (FIN=1, no fragmentation).
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] after `close()`, a pending receive-loop
    /// fault, or an I/O error from the socket.
    pub async fn send(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(Frame::binary(data.into())).await
    }

    /// Send `text` as a single text message (FIN=1, no fragmentation).
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_frame(Frame::text(text.into())).await
    }

    async fn send_frame(&self, frame: Frame) -> Result<()> {
        self.check_writable()?;
        self.inner.writer.lock().await.write_frame(&frame).await
    }

    /// Take the next queued binary message, without waiting.
    ///
    /// Returns `Ok(None)` when nothing is queued right now.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] after `close()` or once the peer's
    /// stream has ended and the queue is drained; a receive-loop fault is
    /// returned once in place of data.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        let mut rx = self.inner.binary_rx.lock().await;
        match rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.end_of_stream()),
        }
    }

    /// Wait for the next text message.
    ///
    /// Blocks until a complete text message has been reassembled. Unblocked
    /// by `close()` (returning [`Error::ConnectionClosed`]) and by receive
    /// loop termination.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::recv`].
    pub async fn recv_text(&self) -> Result<String> {
        self.check_open()?;
        let mut rx = self.inner.text_rx.lock().await;
        match rx.recv().await {
            Some(text) => Ok(text),
            None => Err(self.end_of_stream()),
        }
    }

    /// Close the connection.
    ///
    /// Idempotent. Sends a best-effort close frame to the peer, stops the
    /// receive loop, and shuts down the stream. Any operation after this
    /// fails with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(role = %self.inner.role, "closing connection");

        {
            let mut writer = self.inner.writer.lock().await;
            let _ = writer.write_frame(&Frame::close(Some(1000), "")).await;
            let _ = writer.shutdown().await;
        }

        if let Some(handle) = self.inner.receive_loop.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        if let Some(fault) = self.take_fault() {
            return Err(fault);
        }
        Ok(())
    }

    /// Like `check_open`, but also fails once the peer's stream has ended.
    /// Receives don't use this: queued messages stay readable after the
    /// stream ends.
    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.inner.ended.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn take_fault(&self) -> Option<Error> {
        self.inner.fault.lock().ok().and_then(|mut f| f.take())
    }

    /// Error for a receive queue whose loop has stopped: the pending fault
    /// if there is one, a plain close otherwise.
    fn end_of_stream(&self) -> Error {
        self.take_fault().unwrap_or(Error::ConnectionClosed)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.inner.role)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Drive the read half: reassemble messages, answer pings, stop on close.
///
/// Dropping the senders on exit is what wakes blocked `recv_text` callers.
async fn receive_loop(
    mut reader: FrameReader<tokio::net::tcp::OwnedReadHalf>,
    writer: Arc<Mutex<FrameWriter<OwnedWriteHalf>>>,
    text_tx: UnboundedSender<String>,
    binary_tx: UnboundedSender<Vec<u8>>,
    ended: Arc<AtomicBool>,
    fault: Arc<StdMutex<Option<Error>>>,
    limits: Limits,
) {
    let mut assembler = MessageAssembler::new(limits);

    let set_fault = |err: Error| {
        warn!(error = %err, "receive loop stopping");
        if let Ok(mut slot) = fault.lock() {
            slot.get_or_insert(err);
        }
    };

    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(Error::ConnectionClosed) => {
                debug!("peer ended the stream");
                break;
            }
            // Transport failures keep their identity; everything else the
            // reader reports is a peer protocol fault.
            Err(e @ Error::Io(_)) => {
                set_fault(e);
                break;
            }
            Err(e) => {
                set_fault(Error::ProtocolViolation(e.to_string()));
                break;
            }
        };

        if let Err(e) = frame.validate() {
            set_fault(e);
            break;
        }

        match frame.opcode {
            OpCode::Ping => {
                let pong = Frame::pong(frame.payload);
                if writer.lock().await.write_frame(&pong).await.is_err() {
                    break;
                }
            }
            OpCode::Pong => {} // unsolicited, ignore
            OpCode::Close => {
                debug!("close frame received");
                break;
            }
            _ => match assembler.push(frame) {
                Ok(Some(msg)) if msg.opcode == OpCode::Text => match msg.into_text() {
                    Ok(text) => {
                        if text_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        set_fault(e);
                        break;
                    }
                },
                Ok(Some(msg)) => {
                    if binary_tx.send(msg.payload).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    set_fault(e);
                    break;
                }
            },
        }
    }

    ended.store(true, Ordering::SeqCst);
}

/// Read from `io` until the end of the HTTP header block (`\r\n\r\n`).
///
/// Returns the header block as a string, plus any bytes read past it — a
/// peer may start framing immediately after its half of the handshake, and
/// those bytes belong to the frame stream. Handshake messages carry no
/// body, so the header block is the whole message.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] if the stream ends first.
/// - [`Error::MalformedHeader`] if `max_size` is exceeded before the
///   separator appears, or the headers are not UTF-8.
pub(crate) async fn read_http_message<R: AsyncRead + Unpin>(
    io: &mut R,
    max_size: usize,
) -> Result<(String, Vec<u8>)> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = io.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let leftover = buf.split_off(pos + 4);
            let head = String::from_utf8(buf)
                .map_err(|_| Error::MalformedHeader("handshake is not UTF-8".into()))?;
            return Ok((head, leftover));
        }
        if buf.len() > max_size {
            return Err(Error::MalformedHeader(format!(
                "handshake exceeds {max_size} bytes"
            )));
        }
    }
}
