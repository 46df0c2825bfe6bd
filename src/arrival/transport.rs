//! Push transport abstraction and implementations.
//!
//! The channel adapter only sees [`PushTransport`] and [`PushConnection`], so
//! the sequencing core never depends on a concrete real-time library.

use crate::arrival::protocol::{ClientFrame, ServerFrame};
use crate::defaults;
use crate::error::{QueueCallError, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

/// Opens connections to the push server.
#[async_trait::async_trait]
pub trait PushTransport: Send + Sync {
    /// Establish a fresh connection.
    async fn connect(&self) -> Result<Box<dyn PushConnection>>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// One live connection to the push server.
#[async_trait::async_trait]
pub trait PushConnection: Send {
    /// Send the room subscription handshake.
    async fn join(&mut self, room: &str) -> Result<()>;

    /// Wait for the next room payload.
    ///
    /// Returns `Ok(None)` when the server closed the connection.
    async fn next_payload(&mut self) -> Result<Option<Value>>;
}

/// Newline-delimited JSON over TCP.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait::async_trait]
impl PushTransport for TcpTransport {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        let stream = TcpStream::connect(&self.address).await.map_err(|e| {
            QueueCallError::ChannelConnection {
                message: format!("Failed to connect to {}: {}", self.address, e),
            }
        })?;
        // Calls are small and latency matters more than throughput
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        Ok(Box::new(TcpConnection {
            reader: BufReader::new(reader),
            writer,
            room: None,
            line: Vec::new(),
        }))
    }

    fn endpoint(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

struct TcpConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    room: Option<String>,
    line: Vec<u8>,
}

/// Result of reading one newline-terminated line.
enum LineRead {
    Line,
    /// Longer than [`defaults::MAX_FRAME_BYTES`]; consumed up to the newline and discarded.
    Oversized(usize),
    Eof,
}

impl TcpConnection {
    /// Reads the next line into `self.line` as raw bytes, never buffering
    /// more than the frame limit.
    async fn read_frame_line(&mut self) -> std::io::Result<LineRead> {
        self.line.clear();
        let mut skipped = 0usize;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (skipped, self.line.is_empty()) {
                    (0, true) => LineRead::Eof,
                    (0, false) => LineRead::Line,
                    (n, _) => LineRead::Oversized(n),
                });
            }

            let (used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            };
            if skipped == 0 && self.line.len() + used <= defaults::MAX_FRAME_BYTES {
                self.line.extend_from_slice(&available[..used]);
            } else {
                skipped += self.line.len() + used;
                self.line.clear();
            }
            self.reader.consume(used);

            if complete {
                return Ok(if skipped == 0 {
                    LineRead::Line
                } else {
                    LineRead::Oversized(skipped)
                });
            }
        }
    }

    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let json = frame.to_json().map_err(|e| QueueCallError::ChannelProtocol {
            message: format!("Failed to serialize frame: {}", e),
        })?;

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| QueueCallError::ChannelConnection {
                message: format!("Failed to write frame: {}", e),
            })?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| QueueCallError::ChannelConnection {
                message: format!("Failed to write newline: {}", e),
            })?;
        self.writer
            .flush()
            .await
            .map_err(|e| QueueCallError::ChannelConnection {
                message: format!("Failed to flush writer: {}", e),
            })
    }
}

#[async_trait::async_trait]
impl PushConnection for TcpConnection {
    async fn join(&mut self, room: &str) -> Result<()> {
        self.send(&ClientFrame::Join {
            room: room.to_string(),
        })
        .await
        .map_err(|e| QueueCallError::ChannelJoin {
            room: room.to_string(),
            message: e.to_string(),
        })?;
        self.room = Some(room.to_string());
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<Option<Value>> {
        loop {
            let read = self
                .read_frame_line()
                .await
                .map_err(|e| QueueCallError::ChannelConnection {
                    message: format!("Failed to read frame: {}", e),
                })?;
            match read {
                LineRead::Eof => return Ok(None),
                LineRead::Oversized(bytes) => {
                    tracing::warn!(bytes, "dropping oversized push frame");
                    continue;
                }
                LineRead::Line => {}
            }

            let trimmed = self.line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            // Invalid UTF-8 fails here too and only costs this one line
            let frame = match serde_json::from_slice::<ServerFrame>(trimmed) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unparseable push frame");
                    continue;
                }
            };

            match frame {
                ServerFrame::Message { room, payload } => {
                    if let (Some(frame_room), Some(joined)) = (room.as_deref(), self.room.as_deref())
                        && frame_room != joined
                    {
                        tracing::debug!(room = frame_room, "ignoring message for another room");
                        continue;
                    }
                    return Ok(Some(payload));
                }
                ServerFrame::Ping => self.send(&ClientFrame::Pong).await?,
                ServerFrame::Joined { room } => {
                    tracing::debug!(room = %room, "room join acknowledged");
                }
                ServerFrame::Error { message } => {
                    tracing::warn!(message = %message, "push server reported an error");
                }
            }
        }
    }
}

#[derive(Default)]
struct MockShared {
    current: Option<mpsc::UnboundedSender<Value>>,
    joins: Vec<String>,
    connects: usize,
    refuse: bool,
}

/// In-memory transport for tests and demos.
///
/// Pair it with the [`MockPushServer`] returned by [`MockTransport::pair`] to
/// push payloads and drop connections.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
}

/// Server side of a [`MockTransport`].
#[derive(Clone)]
pub struct MockPushServer {
    shared: Arc<Mutex<MockShared>>,
}

impl MockTransport {
    pub fn pair() -> (MockTransport, MockPushServer) {
        let shared = Arc::new(Mutex::new(MockShared::default()));
        (
            MockTransport {
                shared: Arc::clone(&shared),
            },
            MockPushServer { shared },
        )
    }
}

fn lock(shared: &Mutex<MockShared>) -> std::sync::MutexGuard<'_, MockShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl PushTransport for MockTransport {
    async fn connect(&self) -> Result<Box<dyn PushConnection>> {
        let mut shared = lock(&self.shared);
        if shared.refuse {
            return Err(QueueCallError::ChannelConnection {
                message: "mock server refused connection".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.current = Some(tx);
        shared.connects += 1;
        Ok(Box::new(MockConnection {
            rx,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn endpoint(&self) -> String {
        "mock://push".to_string()
    }
}

struct MockConnection {
    rx: mpsc::UnboundedReceiver<Value>,
    shared: Arc<Mutex<MockShared>>,
}

#[async_trait::async_trait]
impl PushConnection for MockConnection {
    async fn join(&mut self, room: &str) -> Result<()> {
        lock(&self.shared).joins.push(room.to_string());
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<Option<Value>> {
        Ok(self.rx.recv().await)
    }
}

impl MockPushServer {
    /// Push a payload to the live connection. Returns false when nobody is connected.
    pub fn push(&self, payload: Value) -> bool {
        let shared = lock(&self.shared);
        match &shared.current {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Close the live connection from the server side.
    pub fn disconnect(&self) {
        lock(&self.shared).current = None;
    }

    /// Refuse (or accept again) new connections.
    pub fn set_refuse(&self, refuse: bool) {
        lock(&self.shared).refuse = refuse;
    }

    /// Rooms joined so far, one entry per handshake.
    pub fn joins(&self) -> Vec<String> {
        lock(&self.shared).joins.clone()
    }

    pub fn connects(&self) -> usize {
        lock(&self.shared).connects
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared)
            .current
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_joins_and_reads_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();

            let frames = [
                r#"{"type":"joined","room":"pharmacy-queue"}"#,
                "garbage",
                r#"{"type":"message","room":"other-room","payload":{"identifier":"X"}}"#,
                r#"{"type":"message","room":"pharmacy-queue","payload":{"identifier":"RX-1"}}"#,
            ];
            for frame in frames {
                writer.write_all(frame.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
            line
        });

        let transport = TcpTransport::new(address);
        let mut connection = transport.connect().await.unwrap();
        connection.join("pharmacy-queue").await.unwrap();

        let payload = connection.next_payload().await.unwrap();
        assert_eq!(payload, Some(json!({"identifier": "RX-1"})));

        // Server task finished and dropped its socket
        let join_line = server.await.unwrap();
        assert_eq!(join_line.trim(), r#"{"type":"join","room":"pharmacy-queue"}"#);
        assert_eq!(connection.next_payload().await.unwrap(), None);
    }

    /// Accepts one client, reads its join line, writes `chunks` verbatim, then closes.
    async fn serve_raw(chunks: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut join = String::new();
            BufReader::new(reader).read_line(&mut join).await.unwrap();
            for chunk in chunks {
                writer.write_all(&chunk).await.unwrap();
            }
        });
        address
    }

    const RX1_FRAME: &[u8] =
        b"{\"type\":\"message\",\"room\":\"pharmacy-queue\",\"payload\":{\"identifier\":\"RX-1\"}}\n";

    #[tokio::test]
    async fn test_tcp_transport_skips_non_utf8_line() {
        let address = serve_raw(vec![b"\xff\xfe garbage\n".to_vec(), RX1_FRAME.to_vec()]).await;

        let mut connection = TcpTransport::new(address).connect().await.unwrap();
        connection.join("pharmacy-queue").await.unwrap();

        assert_eq!(
            connection.next_payload().await.unwrap(),
            Some(json!({"identifier": "RX-1"}))
        );
        assert_eq!(connection.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_transport_skips_oversized_line() {
        let mut huge = vec![b'x'; defaults::MAX_FRAME_BYTES + 1024];
        huge.push(b'\n');
        // Split so the limit is crossed across several reads
        let tail = huge.split_off(huge.len() / 2);
        let address = serve_raw(vec![huge, tail, RX1_FRAME.to_vec()]).await;

        let mut connection = TcpTransport::new(address).connect().await.unwrap();
        connection.join("pharmacy-queue").await.unwrap();

        assert_eq!(
            connection.next_payload().await.unwrap(),
            Some(json!({"identifier": "RX-1"}))
        );
        assert_eq!(connection.next_payload().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_transport_answers_ping() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"{\"type\":\"ping\"}\n").await.unwrap();
            let mut buf = vec![0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let transport = TcpTransport::new(address);
        let mut connection = transport.connect().await.unwrap();

        // The server closes after reading the pong
        assert_eq!(connection.next_payload().await.unwrap(), None);
        assert_eq!(server.await.unwrap().trim(), r#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn test_tcp_transport_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpTransport::new(address).connect().await;
        assert!(matches!(
            result,
            Err(QueueCallError::ChannelConnection { .. })
        ));
    }

    #[test]
    fn test_tcp_transport_endpoint() {
        assert_eq!(
            TcpTransport::new("10.0.0.2:7070").endpoint(),
            "tcp://10.0.0.2:7070"
        );
    }

    #[tokio::test]
    async fn test_mock_transport_delivers_and_disconnects() {
        let (transport, server) = MockTransport::pair();
        assert!(!server.push(json!({})));

        let mut connection = transport.connect().await.unwrap();
        connection.join("room").await.unwrap();
        assert!(server.is_connected());
        assert!(server.push(json!({"identifier": "A"})));
        assert_eq!(
            connection.next_payload().await.unwrap(),
            Some(json!({"identifier": "A"}))
        );

        server.disconnect();
        assert_eq!(connection.next_payload().await.unwrap(), None);
        assert_eq!(server.joins(), vec!["room".to_string()]);
        assert_eq!(server.connects(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_refuses() {
        let (transport, server) = MockTransport::pair();
        server.set_refuse(true);
        assert!(transport.connect().await.is_err());
        server.set_refuse(false);
        assert!(transport.connect().await.is_ok());
    }
}
