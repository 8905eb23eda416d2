//! INSTREAM wire codec.
//!
//! Wire format:
//! - Command: the configured command line, `nINSTREAM\n` by default
//! - Data: `[4B length_be][length bytes]` per chunk, repeated
//! - Terminator: `[4B zero]`
//! - Reply: one line ending in `\n`
//!
//! The reply is classified with [`Verdict::from_reply`].

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tracing::{debug, trace};

use glamscan_core::{DaemonConfig, Verdict};

use crate::error::ProtocolError;
use crate::transport::DaemonIo;

/// Longest reply line accepted from the daemon.
pub const MAX_REPLY_LEN: u64 = 4096;

/// Streams files to the daemon and classifies its reply.
#[derive(Debug, Clone)]
pub struct InstreamClient {
    command: String,
    chunk_size: usize,
    io_timeout: Option<Duration>,
}

impl InstreamClient {
    /// Create a client from the pool configuration.
    pub fn new(config: &DaemonConfig) -> Self {
        Self {
            command: config.command.clone(),
            chunk_size: config.chunk_size.max(1),
            io_timeout: config.io_timeout,
        }
    }

    /// Stream the file at `path` over `conn` and return the verdict.
    ///
    /// Never fails: every error is logged and becomes [`Verdict::Errored`].
    /// The connection is shut down before returning.
    pub async fn scan_path<S: DaemonIo>(&self, conn: S, path: &Path) -> Verdict {
        let result = match File::open(path).await {
            Ok(file) => self.scan_reader(conn, file).await,
            Err(source) => Err(ProtocolError::Open {
                path: path.to_path_buf(),
                source,
            }),
        };

        match result {
            Ok(verdict) => verdict,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "scan failed");
                Verdict::Errored
            }
        }
    }

    /// Stream everything `reader` yields over `conn` and classify the reply.
    pub async fn scan_reader<S, R>(&self, mut conn: S, reader: R) -> Result<Verdict, ProtocolError>
    where
        S: DaemonIo,
        R: AsyncRead + Unpin,
    {
        let result = self.exchange(&mut conn, reader).await;
        let _ = conn.shutdown().await;
        result
    }

    async fn exchange<S, R>(&self, conn: &mut S, mut reader: R) -> Result<Verdict, ProtocolError>
    where
        S: DaemonIo,
        R: AsyncRead + Unpin,
    {
        self.timed(conn.write_all(self.command.as_bytes()))
            .await
            .map_err(ProtocolError::Write)?;

        let mut frames = FramedWrite::new(&mut *conn, frame_codec(self.chunk_size));
        let mut buffer = vec![0u8; self.chunk_size];
        let mut sent = 0u64;

        loop {
            let filled = fill_chunk(&mut reader, &mut buffer)
                .await
                .map_err(ProtocolError::Read)?;
            if filled == 0 {
                break;
            }

            self.timed(frames.send(Bytes::copy_from_slice(&buffer[..filled])))
                .await
                .map_err(ProtocolError::Write)?;
            sent += filled as u64;

            if filled < buffer.len() {
                break;
            }
        }

        // Zero-length frame ends the stream.
        self.timed(frames.send(Bytes::new()))
            .await
            .map_err(ProtocolError::Write)?;
        drop(frames);

        let reply = self.read_reply(conn).await?;
        trace!(bytes = sent, reply = %reply, "daemon replied");
        Ok(Verdict::from_reply(&reply))
    }

    async fn read_reply<S: DaemonIo>(&self, conn: &mut S) -> Result<String, ProtocolError> {
        let mut reader = BufReader::new(conn).take(MAX_REPLY_LEN);
        let mut line = Vec::new();

        self.timed(reader.read_until(b'\n', &mut line))
            .await
            .map_err(ProtocolError::Response)?;

        if line.last() != Some(&b'\n') {
            return Err(ProtocolError::Truncated);
        }

        Ok(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Bound `op` by the session I/O deadline, if one is configured.
    async fn timed<T>(&self, op: impl Future<Output = io::Result<T>>) -> io::Result<T> {
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "daemon timed out"))?,
            None => op.await,
        }
    }
}

/// 4-byte big-endian length prefix, frames no larger than one chunk.
fn frame_codec(chunk_size: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .big_endian()
        .length_field_length(4)
        .max_frame_length(chunk_size)
        .new_codec()
}

/// Read until `buffer` is full or the reader is exhausted.
async fn fill_chunk<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
