//! Line-framed connections.
//!
//! A [`Session`] wraps one byte stream (normally a TCP socket) and splits it
//! into a [`LineReader`] and a cloneable [`LineWriter`]. Writes from any
//! clone are serialized through a mutex so lines never interleave. Closing
//! shuts the write half down, which the peer observes as end of stream.

use crate::protocol::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

/// How long a dial may take before giving up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from session I/O.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session is closed")]
    Closed,

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("No hosts to connect to")]
    NoHosts,
}

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================================================
// Reader
// ============================================================================

/// Read half: yields one non-empty line at a time, line ending stripped.
pub struct LineReader {
    lines: Lines<BufReader<BoxedRead>>,
}

impl LineReader {
    pub fn new(read: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let boxed: BoxedRead = Box::new(read);
        Self {
            lines: BufReader::new(boxed).lines(),
        }
    }

    /// Next non-empty line, or `None` once the peer has closed.
    pub async fn next_line(&mut self) -> Result<Option<String>, SessionError> {
        while let Some(mut line) = self.lines.next_line().await? {
            let len = line.trim_end_matches(['\r', '\n']).len();
            line.truncate(len);
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Write half. Clones share the same underlying stream.
#[derive(Clone)]
pub struct LineWriter {
    inner: Arc<Mutex<Option<BoxedWrite>>>,
}

impl LineWriter {
    pub fn new(write: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        let boxed: BoxedWrite = Box::new(write);
        Self {
            inner: Arc::new(Mutex::new(Some(boxed))),
        }
    }

    /// Write `line` followed by a newline and flush.
    pub async fn write_line(&self, line: &str) -> Result<(), SessionError> {
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::Closed)?;
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        writer.write_all(framed.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn send(&self, message: &Message) -> Result<(), SessionError> {
        self.write_line(&message.to_string()).await
    }

    /// Shut the stream down. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), SessionError> {
        let taken = self.inner.lock().await.take();
        if let Some(mut writer) = taken {
            writer.shutdown().await?;
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

// ============================================================================
// Session
// ============================================================================

/// A line-framed connection.
pub struct Session {
    reader: LineReader,
    writer: LineWriter,
    peer: Option<SocketAddr>,
}

impl Session {
    /// Wrap any pair of read/write halves.
    pub fn new(
        read: impl AsyncRead + Send + Unpin + 'static,
        write: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: LineReader::new(read),
            writer: LineWriter::new(write),
            peer: None,
        }
    }

    /// Wrap a single duplex stream such as `tokio::io::DuplexStream`.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        Self::new(read, write)
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        let (read, write) = stream.into_split();
        Self {
            peer,
            ..Self::new(read, write)
        }
    }

    /// Dial `addr` with [`CONNECT_TIMEOUT`].
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self, SessionError> {
        let label = addr.to_string();
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| SessionError::ConnectTimeout(label))??;
        Ok(Self::from_tcp(stream))
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn writer(&self) -> LineWriter {
        self.writer.clone()
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, SessionError> {
        self.reader.next_line().await
    }

    pub async fn write_line(&self, line: &str) -> Result<(), SessionError> {
        self.writer.write_line(line).await
    }

    pub async fn send(&self, message: &Message) -> Result<(), SessionError> {
        self.writer.send(message).await
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.writer.close().await
    }

    pub fn split(self) -> (LineReader, LineWriter) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Side;

    #[tokio::test]
    async fn test_lines_cross_a_duplex_pipe() {
        let (a, b) = tokio::io::duplex(1024);
        let left = Session::from_stream(a);
        let mut right = Session::from_stream(b);

        left.send(&Message::YouAre(Side::Two)).await.unwrap();
        left.write_line("").await.unwrap();
        left.write_line("  CHAT hi  \r").await.unwrap();

        assert_eq!(right.next_line().await.unwrap().as_deref(), Some("YOU_ARE 2"));
        assert_eq!(right.next_line().await.unwrap().as_deref(), Some("  CHAT hi  "));
    }

    #[tokio::test]
    async fn test_only_line_endings_are_stripped() {
        let (a, b) = tokio::io::duplex(1024);
        let left = Session::from_stream(a);
        let mut right = Session::from_stream(b);

        left.write_line("CHAT  spaced out \r").await.unwrap();
        left.write_line("\r").await.unwrap();
        left.write_line("   ").await.unwrap();

        assert_eq!(
            right.next_line().await.unwrap().as_deref(),
            Some("CHAT  spaced out ")
        );
        assert_eq!(right.next_line().await.unwrap().as_deref(), Some("   "));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = tokio::io::duplex(1024);
        let left = Session::from_stream(a);
        let mut right = Session::from_stream(b);

        left.close().await.unwrap();
        left.close().await.unwrap();
        assert!(left.writer().is_closed().await);
        assert!(matches!(
            left.write_line("STATE").await,
            Err(SessionError::Closed)
        ));
        assert_eq!(right.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_interleave() {
        let (a, b) = tokio::io::duplex(64);
        let left = Session::from_stream(a);
        let (mut reader, _) = Session::from_stream(b).split();

        let mut tasks = Vec::new();
        for n in 0..8 {
            let writer = left.writer();
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    writer.write_line(&format!("CHAT writer-{n}-padding-padding")).await.unwrap();
                }
            }));
        }

        for _ in 0..80 {
            let line = reader.next_line().await.unwrap().unwrap();
            assert!(line.starts_with("CHAT writer-"));
            assert!(line.ends_with("-padding-padding"));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
