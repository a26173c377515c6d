//! `Content-Length` framing for JSON-RPC over stdio.
//!
//! [`FrameReader`] and [`FrameWriter`] move whole JSON values across an async
//! byte stream. Artifact snapshots of large packages run to several megabytes,
//! so the frame ceiling is generous.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (32 MiB).
pub const MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error while {action}: {source}")]
    Io {
        action: &'static str,
        source: std::io::Error,
    },
    #[error("unexpected EOF while reading headers")]
    TruncatedHeaders,
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),
    #[error("Content-Length {0} exceeds maximum {MAX_FRAME_BYTES}")]
    Oversized(usize),
    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(action: &'static str) -> impl FnOnce(std::io::Error) -> CodecError {
    move |source| CodecError::Io { action, source }
}

/// Reads framed JSON values from an async reader.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Next frame, or `Ok(None)` on a clean EOF between frames.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>, CodecError> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            return Err(CodecError::Oversized(content_length));
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(io_err("reading frame body"))?;

        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>, CodecError> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(io_err("reading header line"))?;

            if bytes_read == 0 {
                // EOF is only clean before the first header byte.
                if started {
                    return Err(CodecError::TruncatedHeaders);
                }
                return Ok(None);
            }
            started = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':')
                && key.trim().eq_ignore_ascii_case("Content-Length")
            {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| CodecError::InvalidContentLength(value.to_string()))?,
                );
            }
        }

        content_length
            .map(Some)
            .ok_or(CodecError::MissingContentLength)
    }
}

/// Writes framed JSON values to an async writer.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<(), CodecError> {
        let body = serde_json::to_vec(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .map_err(io_err("writing frame header"))?;
        self.writer
            .write_all(&body)
            .await
            .map_err(io_err("writing frame body"))?;
        self.writer.flush().await.map_err(io_err("flushing frame"))
    }
}
