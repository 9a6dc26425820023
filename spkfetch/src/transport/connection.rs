//! Connection handle: one exclusively owned byte stream with
//! pattern-matching receive.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::config::{ConnectionOptions, Endpoint};
use crate::channel::{PatternBuffer, PatternMatch, StepTimeout, TelnetFilter, match_first};
use crate::error::{ChannelError, Error, Result};

const READ_CHUNK: usize = 4096;

/// An open byte-stream channel to one remote peer.
///
/// The handle owns its stream for the lifetime of one session and is
/// never shared. `close` is idempotent.
pub struct Connection<S = TcpStream> {
    /// Human-readable peer name for logs.
    name: String,

    /// The stream (None once closed).
    stream: Option<S>,

    /// Received text not yet consumed by a match.
    buffer: PatternBuffer,

    /// Telnet negotiation filter, when enabled.
    telnet: Option<TelnetFilter>,

    /// Line terminator for `send_line`.
    line_ending: String,
}

impl Connection<TcpStream> {
    /// Open a TCP connection to `endpoint`.
    ///
    /// Fails with [`Error::ConnectFailed`] if the name does not resolve,
    /// the peer refuses, or `connect_timeout` elapses.
    pub async fn open(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        options: ConnectionOptions,
    ) -> Result<Self> {
        debug!("connecting to {endpoint}");
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| Error::ConnectFailed {
                endpoint: endpoint.to_string(),
                source: std::io::ErrorKind::TimedOut.into(),
            })?
            .map_err(|source| Error::ConnectFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        Ok(Self::from_stream(endpoint.to_string(), stream, options))
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref()?.local_addr().ok()
    }

    /// Remote address of the underlying socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref()?.peer_addr().ok()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream.
    pub fn from_stream(name: impl Into<String>, stream: S, options: ConnectionOptions) -> Self {
        Self {
            name: name.into(),
            stream: Some(stream),
            buffer: PatternBuffer::new(options.search_depth),
            telnet: options.telnet.then(TelnetFilter::new),
            line_ending: options.line_ending,
        }
    }

    /// Peer name this handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the stream is still held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write bytes verbatim.
    pub async fn send(&mut self, bytes: &[u8]) -> std::result::Result<(), ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        trace!("{}: sent {} bytes", self.name, bytes.len());
        Ok(())
    }

    /// Write `line` followed by the configured line ending.
    pub async fn send_line(&mut self, line: &str) -> std::result::Result<(), ChannelError> {
        let mut bytes = Vec::with_capacity(line.len() + self.line_ending.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(self.line_ending.as_bytes());
        self.send(&bytes).await
    }

    /// Read until one of `patterns` matches the accumulated input.
    ///
    /// Patterns are tested in order after every received chunk; the first
    /// pattern that matches wins. Text before and including the match is
    /// consumed and returned as `raw`.
    pub async fn receive_until(
        &mut self,
        patterns: &[Regex],
        timeout: StepTimeout,
    ) -> std::result::Result<PatternMatch, ChannelError> {
        let deadline = timeout.deadline_from(Instant::now());

        loop {
            if let Some(found) = match_first(&mut self.buffer, patterns) {
                trace!("{}: pattern {} matched", self.name, found.index);
                return Ok(found);
            }

            let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
            let mut chunk = BytesMut::with_capacity(READ_CHUNK);
            let read = stream.read_buf(&mut chunk);
            let n = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, read)
                    .await
                    .map_err(|_| ChannelError::TimedOut(timeout))??,
                None => read.await?,
            };

            if n == 0 {
                return Err(ChannelError::Closed);
            }

            trace!(
                "{}: received {:?}",
                self.name,
                String::from_utf8_lossy(&chunk)
            );
            self.ingest(&chunk).await?;
        }
    }

    /// Feed received bytes through the telnet filter into the buffer.
    async fn ingest(&mut self, chunk: &[u8]) -> std::result::Result<(), ChannelError> {
        let Some(filter) = self.telnet.as_mut() else {
            self.buffer.extend(chunk);
            return Ok(());
        };

        let filtered = filter.filter(chunk);
        self.buffer.extend(&filtered.data);
        if !filtered.replies.is_empty() {
            self.send(&filtered.replies).await?;
        }
        Ok(())
    }

    /// Received text not yet consumed by a match.
    pub fn pending(&self) -> std::borrow::Cow<'_, str> {
        self.buffer.as_str_lossy()
    }

    /// Release the stream. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                trace!("{}: shutdown: {e}", self.name);
            }
            debug!("{}: closed", self.name);
        }
    }
}
