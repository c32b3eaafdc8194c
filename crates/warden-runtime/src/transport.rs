//! Line-delimited JSON-RPC transport over a child's stdin/stdout.
//!
//! One request is written as a single newline-terminated JSON line, then
//! exactly one response line is awaited. The channel is half-duplex and does
//! no queuing of its own: `send` takes `&mut self`, so callers that share a
//! transport must wrap it in a mutex.
//!
//! Two implementations share the [`Transport`] trait:
//!
//! - [`StdioTransport`] drives async pipes (`tokio::process`) directly.
//! - [`ThreadedTransport`] wraps blocking pipes (`std::process`): a reader
//!   thread forwards lines into a channel and the caller awaits that channel
//!   with a deadline.
//!
//! The deadline covers the whole exchange, including the write. A line cut
//! short by a timeout stays buffered and is completed by the next read.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use warden_core::error::TransportError;
use warden_core::rpc::{RpcRequest, RpcResponse};

/// Request/response channel to one provider
#[async_trait]
pub trait Transport: Send {
    /// Write `request` and wait up to `timeout` for its response line.
    async fn send(
        &mut self,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError>;
}

fn encode(request: &RpcRequest) -> Result<Vec<u8>, TransportError> {
    let mut line = serde_json::to_vec(request)
        .map_err(|e| TransportError::Malformed(format!("cannot encode request: {e}")))?;
    line.push(b'\n');
    Ok(line)
}

/// Whether a response belongs to an earlier request that timed out.
///
/// Only numeric ids lower than the current one count as stale; anything else
/// is handed to the caller.
fn is_stale(response: &RpcResponse, request_id: u64) -> bool {
    matches!(&response.id, Some(Value::Number(n)) if n.as_u64().is_some_and(|id| id < request_id))
}

/// Async transport over any buffered reader / writer pair
pub struct StdioTransport<W, R> {
    writer: W,
    reader: R,
    line: Vec<u8>,
}

impl<W, R> StdioTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    pub const fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            line: Vec::new(),
        }
    }

    async fn read_response(&mut self, request_id: u64) -> Result<RpcResponse, TransportError> {
        loop {
            // `read_until` appends in place, so a cancelled read keeps its bytes
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Err(TransportError::PipeClosed);
            }
            if self.line.last() != Some(&b'\n') {
                continue;
            }
            let bytes = std::mem::take(&mut self.line);
            let line = std::str::from_utf8(&bytes)
                .map_err(|e| TransportError::Malformed(format!("response is not UTF-8: {e}")))?;
            let response = RpcResponse::parse_line(line)?;
            if is_stale(&response, request_id) {
                tracing::warn!(request_id, stale = ?response.id, "discarding late response");
                continue;
            }
            return Ok(response);
        }
    }
}

#[async_trait]
impl<W, R> Transport for StdioTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    async fn send(
        &mut self,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        let line = encode(request)?;
        tracing::trace!(id = request.id, method = %request.method, "writing request");

        let exchange = async {
            self.writer.write_all(&line).await.map_err(closed_or_io)?;
            self.writer.flush().await.map_err(closed_or_io)?;
            self.read_response(request.id).await
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

/// Blocking transport: writes run on the blocking pool and a dedicated
/// thread reads response lines.
pub struct ThreadedTransport {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    lines: mpsc::UnboundedReceiver<std::io::Result<String>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl ThreadedTransport {
    pub fn new<W, R>(writer: W, reader: R) -> Self
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        let (tx, lines) = mpsc::unbounded_channel();
        let handle = thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            lines,
            reader: Some(handle),
        }
    }

    async fn read_response(&mut self, request_id: u64) -> Result<RpcResponse, TransportError> {
        loop {
            let line = self
                .lines
                .recv()
                .await
                .ok_or(TransportError::PipeClosed)??;
            let response = RpcResponse::parse_line(&line)?;
            if is_stale(&response, request_id) {
                tracing::warn!(request_id, stale = ?response.id, "discarding late response");
                continue;
            }
            return Ok(response);
        }
    }
}

#[async_trait]
impl Transport for ThreadedTransport {
    async fn send(
        &mut self,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        let line = encode(request)?;
        tracing::trace!(id = request.id, method = %request.method, "writing request");

        let writer = Arc::clone(&self.writer);
        let exchange = async {
            tokio::task::spawn_blocking(move || {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                writer.write_all(&line)?;
                writer.flush()
            })
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?
            .map_err(closed_or_io)?;
            self.read_response(request.id).await
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

impl Drop for ThreadedTransport {
    fn drop(&mut self) {
        // The reader thread exits on EOF once the child's stdout closes.
        self.lines.close();
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn closed_or_io(err: std::io::Error) -> TransportError {
    if err.kind() == std::io::ErrorKind::BrokenPipe {
        TransportError::PipeClosed
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tokio::io::{BufReader as AsyncBufReader, duplex};

    use super::*;

    /// Echoes canned responses for every request line it reads
    async fn fake_provider(
        server: tokio::io::DuplexStream,
        replies: Vec<&'static str>,
    ) -> Vec<String> {
        let (read_half, mut write_half) = tokio::io::split(server);
        let mut reader = AsyncBufReader::new(read_half);
        let mut seen = Vec::new();
        for reply in replies {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            seen.push(line);
            write_half.write_all(reply.as_bytes()).await.unwrap();
        }
        seen
    }

    fn async_transport(
        client: tokio::io::DuplexStream,
    ) -> StdioTransport<
        tokio::io::WriteHalf<tokio::io::DuplexStream>,
        AsyncBufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    > {
        let (read_half, write_half) = tokio::io::split(client);
        StdioTransport::new(write_half, AsyncBufReader::new(read_half))
    }

    #[tokio::test]
    async fn test_request_and_response_lines() {
        let (client, server) = duplex(4096);
        let provider = tokio::spawn(fake_provider(
            server,
            vec!["{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[]}}\n"],
        ));
        let mut transport = async_transport(client);

        let response = transport
            .send(&RpcRequest::list_tools(1), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({"tools": []})));

        drop(transport);
        let seen = provider.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with('\n'));
        assert_eq!(seen[0].matches('\n').count(), 1);
        let sent: Value = serde_json::from_str(&seen[0]).unwrap();
        assert_eq!(sent["method"], "tools/list");
    }

    #[tokio::test]
    async fn test_error_response_passes_through() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_provider(
            server,
            vec!["{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}\n"],
        ));
        let mut transport = async_transport(client);

        let response = transport
            .send(&RpcRequest::new(1, "bogus", None), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_malformed_line_is_transport_error() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_provider(server, vec!["starting server...\n"]));
        let mut transport = async_transport(client);

        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_closed_pipe() {
        let (client, server) = duplex(4096);
        drop(server);
        let mut transport = async_transport(client);

        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PipeClosed));
    }

    #[tokio::test]
    async fn test_timeout_then_late_response_is_skipped() {
        let (client, server) = duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut transport = async_transport(client);

        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));

        server_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n")
            .await
            .unwrap();
        let response = transport
            .send(&RpcRequest::list_tools(2), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
        drop(server_read);
    }

    #[tokio::test]
    async fn test_line_split_across_timeout_is_reassembled() {
        let (client, server) = duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut transport = async_transport(client);

        server_write.write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,").await.unwrap();
        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));

        server_write
            .write_all(b"\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n")
            .await
            .unwrap();
        let response = transport
            .send(&RpcRequest::list_tools(2), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
        drop(server_read);
    }

    #[tokio::test]
    async fn test_stalled_write_hits_deadline() {
        // Tiny pipe that nobody drains
        let (client, server) = duplex(8);
        let mut transport = async_transport(client);

        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        drop(server);
    }

    /// Blocks every write until the paired sender is dropped
    struct StalledWriter(std::sync::mpsc::Receiver<()>);

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_threaded_stalled_write_hits_deadline() {
        let (release, stalled) = std::sync::mpsc::channel();
        let mut transport = ThreadedTransport::new(StalledWriter(stalled), Cursor::new(Vec::new()));

        let err = transport
            .send(&RpcRequest::initialize(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        drop(release);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_threaded_transport_reads_in_order() {
        let written = SharedBuf::default();
        let replies = Cursor::new(
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2024-11-05\"}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\n"
                .to_vec(),
        );
        let mut transport = ThreadedTransport::new(written.clone(), replies);

        let first = transport
            .send(&RpcRequest::initialize(1), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(first.id, Some(json!(1)));
        let second = transport
            .send(&RpcRequest::list_tools(2), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(second.id, Some(json!(2)));

        let err = transport
            .send(&RpcRequest::list_tools(3), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PipeClosed));

        let text = String::from_utf8(written.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
