//! NDJSON framing over the worker's standard streams.
//!
//! One frame is one newline-terminated JSON message. Page snapshots routinely
//! exceed the buffered reader's internal capacity, so inbound framing cannot
//! rely on a max-line-length codec: [`FramedChannel::receive_line`] assembles
//! a frame chunk by chunk, draining whatever the reader has buffered until
//! the delimiter shows up.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};

use crate::{AppError, Result};

/// Framed channel over the worker process's stdin/stdout.
pub type WorkerChannel = FramedChannel<ChildStdin, BufReader<ChildStdout>>;

/// Newline-delimited JSON channel over a byte stream pair.
///
/// Generic over the stream halves so tests can drive it with in-memory
/// buffers; production code uses the [`WorkerChannel`] alias.
#[derive(Debug)]
pub struct FramedChannel<W, R> {
    writer: W,
    reader: R,
}

impl<W, R> FramedChannel<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    /// Wrap a writer/reader pair.
    #[must_use]
    pub fn new(writer: W, reader: R) -> Self {
        Self { writer, reader }
    }

    /// Tear the channel down, yielding the writer half.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Write one JSON message as a `\n`-terminated line and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if serialisation fails and
    /// [`AppError::Io`] if the write or flush fails (e.g. the worker exited).
    pub async fn send(&mut self, message: &Value) -> Result<()> {
        let mut bytes = serde_json::to_vec(message)
            .map_err(|e| AppError::Protocol(format!("failed to serialise outbound message: {e}")))?;
        bytes.push(b'\n');

        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next complete newline-terminated frame, regardless of length.
    ///
    /// The returned bytes do not include the delimiter. Behaviour at the
    /// stream edges:
    ///
    /// - EOF mid-frame yields the partial bytes accumulated so far as the
    ///   final frame;
    /// - EOF with nothing accumulated yields `Ok(None)` — the caller must
    ///   treat this as a process-dead condition.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on underlying stream failures.
    pub async fn receive_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut frame: Vec<u8> = Vec::new();

        loop {
            let buffered = self.reader.fill_buf().await?;

            if buffered.is_empty() {
                // EOF. A partial frame is still delivered; otherwise signal
                // "no data" so the caller can mark the worker dead.
                if frame.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(frame));
            }

            if let Some(pos) = buffered.iter().position(|&b| b == b'\n') {
                frame.extend_from_slice(&buffered[..pos]);
                self.reader.consume(pos + 1);
                return Ok(Some(frame));
            }

            // No delimiter in the buffered chunk: drain it into the
            // accumulator and keep reading. This is what lets a single frame
            // grow past the reader's internal buffer without error.
            let len = buffered.len();
            frame.extend_from_slice(buffered);
            self.reader.consume(len);
        }
    }
}
