//! [`Transport`] over any tokio byte stream.
//!
//! Reads are capped at a fixed chunk size to reproduce the per-read limit of
//! RFCOMM sockets, so the framing layer sees the same chunking it would on a
//! real radio link.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::Transport;
use crate::core::constants::MAX_READ_CHUNK;

/// A duplex stream wrapped as a chunk-capped [`Transport`].
#[derive(Debug)]
pub struct StreamTransport<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    max_chunk: usize,
    closed: CancellationToken,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap `stream` with the default RFCOMM chunk cap.
    pub fn new(stream: S) -> Self {
        Self::with_chunk_size(stream, MAX_READ_CHUNK)
    }

    /// Wrap `stream`, delivering at most `max_chunk` bytes per read.
    pub fn with_chunk_size(stream: S, max_chunk: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            max_chunk: max_chunk.max(1),
            closed: CancellationToken::new(),
        }
    }

    /// Maximum bytes returned by one read.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Whether [`close`](Transport::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "transport closed")
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.is_cancelled() {
            return Err(Self::closed_error());
        }
        let limit = buf.len().min(self.max_chunk);
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(Self::closed_error()),
            n = reader.read(&mut buf[..limit]) => n,
        }
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(Self::closed_error());
        }
        let mut writer = self.writer.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(Self::closed_error()),
            res = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => res,
        }
    }

    fn close(&self) {
        // The stream itself is released when the last owner drops it; the
        // peer sees end of stream then.
        self.closed.cancel();
    }
}
