//! Async transport to the accessibility agent.
//!
//! [`AgentClient`] writes [`Request`] frames and reads [`Response`] frames over
//! any bidirectional async stream, using the codec in [`crate::protocol`].
//! It either dials a TCP address itself or wraps a stream that is already
//! connected.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, debug_span, trace, Instrument};

use crate::protocol::{decode_response, encode_request, read_frame_length, ProtocolError, Request, Response};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on dialing the agent.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on waiting for one response frame.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// AgentStream trait
// ---------------------------------------------------------------------------

/// A bidirectional async stream the client can talk over.
pub trait AgentStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AgentStream for T {}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during agent communication.
#[derive(Error, Debug)]
pub enum AgentClientError {
    /// A request was sent while no connection is open.
    #[error("not connected to agent")]
    NotConnected,

    /// The TCP connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Reading or writing the stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A response frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The agent answered with an error response.
    #[error("agent error: {0}")]
    AgentError(String),

    /// Connecting or reading exceeded its timeout.
    #[error("operation timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// AgentClient
// ---------------------------------------------------------------------------

/// Async client holding at most one connection to the agent.
pub struct AgentClient {
    stream: Option<Box<dyn AgentStream>>,
    addr: Option<SocketAddr>,
}

impl AgentClient {
    /// Create a client targeting `addr`. Nothing is dialed until
    /// [`connect`](Self::connect).
    pub fn new(addr: SocketAddr) -> Self {
        Self { stream: None, addr: Some(addr) }
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: impl AgentStream + 'static) -> Self {
        Self { stream: Some(Box::new(stream)), addr: None }
    }

    /// Dial the configured address with a 5-second timeout.
    pub async fn connect(&mut self) -> Result<(), AgentClientError> {
        let addr = self
            .addr
            .ok_or_else(|| AgentClientError::ConnectionFailed("no address configured".into()))?;

        debug!(%addr, "connecting to agent");

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| AgentClientError::Timeout)?
            .map_err(|e| AgentClientError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(Box::new(stream));
        debug!("connected to agent");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream.take();
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send a request and wait for its response.
    ///
    /// [`Response::Error`] is turned into [`AgentClientError::AgentError`].
    pub async fn send(&mut self, request: &Request) -> Result<Response, AgentClientError> {
        let span = debug_span!("agent_send", opcode = request.opcode_name());
        async {
            let frame = encode_request(request);
            self.write_frame(&frame).await?;

            let payload = self.read_frame().await?;
            match decode_response(&payload)? {
                Response::Error { message } => Err(AgentClientError::AgentError(message)),
                other => Ok(other),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn heartbeat(&mut self) -> Result<(), AgentClientError> {
        self.send(&Request::Heartbeat).await?;
        Ok(())
    }

    async fn write_frame(&mut self, data: &[u8]) -> Result<(), AgentClientError> {
        let stream = self.stream.as_mut().ok_or(AgentClientError::NotConnected)?;
        trace!(frame_bytes = data.len(), "writing frame");
        let result = async {
            stream.write_all(data).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = result {
            self.stream.take();
            return Err(AgentClientError::Io(e));
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, AgentClientError> {
        let stream = self.stream.as_mut().ok_or(AgentClientError::NotConnected)?;

        let result = timeout(READ_TIMEOUT, async {
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await?;
            let len = read_frame_length(&header) as usize;

            let mut payload = vec![0u8; len];
            trace!(payload_bytes = len, "reading frame");
            stream.read_exact(&mut payload).await?;

            Ok::<Vec<u8>, std::io::Error>(payload)
        })
        .await;

        // On any failure the stream may hold a half-read or late frame, so it
        // is dropped rather than reused.
        match result {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(io_err)) => {
                self.stream.take();
                Err(AgentClientError::Io(io_err))
            }
            Err(_) => {
                self.stream.take();
                Err(AgentClientError::Timeout)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
