//! # JSON Lines Sink
//!
//! Streams every driver write as one JSON object per line, stamped with an
//! RFC 3339 time. The stream can be a file, stdout, or a pipe into an
//! external driver shim.
//!
//! ## Format
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.016Z","axis":"x","value":16383.5}
//! {"timestamp":"2024-05-01T12:00:00.016Z","button":9,"pressed":true}
//! ```

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::{ButtonId, OutputAxis, OutputSink, SinkWrite};
use crate::error::DriverError;

/// Initial capacity of the line buffer; one line is well under this.
const LINE_BUFFER_CAPACITY: usize = 128;

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    write: &'a SinkWrite,
}

/// Output sink writing JSON lines to an async writer.
pub struct JsonLinesSink<W> {
    writer: W,
    buffer: BytesMut,
    lines_written: u64,
    released: bool,
}

impl<W> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("lines_written", &self.lines_written)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl JsonLinesSink<tokio::fs::File> {
    /// Creates (or truncates) `path` and writes lines to it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] if the file cannot be created.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let file = tokio::fs::File::create(path).await?;
        info!("Writing driver output to {}", path.display());
        Ok(Self::new(file))
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    /// Writes lines to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(LINE_BUFFER_CAPACITY),
            lines_written: 0,
            released: false,
        }
    }

    #[must_use]
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_line(&mut self, write: SinkWrite) -> Result<(), DriverError> {
        if self.released {
            return Err(DriverError::Unavailable);
        }

        let line = JsonLine {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            write: &write,
        };
        let encoded = serde_json::to_vec(&line).map_err(|e| DriverError::Rejected(e.to_string()))?;

        self.buffer.clear();
        self.buffer.put_slice(&encoded);
        self.buffer.put_u8(b'\n');

        self.writer.write_all(&self.buffer).await?;
        self.writer.flush().await?;
        self.lines_written += 1;
        Ok(())
    }
}

#[async_trait]
impl<W> OutputSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn set_axis(&mut self, axis: OutputAxis, value: f32) -> Result<(), DriverError> {
        self.write_line(SinkWrite::Axis { axis, value }).await
    }

    async fn set_button(&mut self, id: ButtonId, pressed: bool) -> Result<(), DriverError> {
        self.write_line(SinkWrite::Button { button: id, pressed }).await
    }

    fn is_available(&self) -> bool {
        !self.released
    }

    async fn release(&mut self) -> Result<(), DriverError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        debug!("JSON lines sink released after {} lines", self.lines_written);
        Ok(())
    }
}
