//! NDJSON codec for agent and responder streams.
//!
//! Splits a byte stream on `\n` with a maximum line length so a misbehaving
//! process cannot make the bridge buffer an unbounded line. Used with
//! [`tokio_util::codec::FramedRead`] on the agent's stdout and stderr and on
//! the tool responder's stdin.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One decoded unit of a line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete UTF-8 line without its terminator.
    Line(String),
    /// A complete line that is not valid UTF-8, as raw bytes.
    Invalid(Vec<u8>),
    /// A line longer than the codec limit. Its bytes are discarded up to the
    /// next newline.
    Oversized,
}

impl Frame {
    /// Lossy text of the frame for diagnostics.
    #[must_use]
    pub fn lossy_text(&self) -> String {
        match self {
            Self::Line(line) => line.clone(),
            Self::Invalid(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Oversized => String::new(),
        }
    }
}

/// Newline-delimited line codec with a [`MAX_LINE_BYTES`] limit.
///
/// Over-long and non-UTF-8 lines are reported as [`Frame::Oversized`] and
/// [`Frame::Invalid`] instead of errors, since `FramedRead` stops yielding
/// after a decoder error and the stream must survive a single bad line. Only
/// I/O failures map to [`AppError::Io`].
#[derive(Debug)]
pub struct LineCodec(AnyDelimiterCodec);

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\n".to_vec(),
            max_length,
        ))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        to_frame(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        to_frame(self.0.decode_eof(src))
    }
}

fn to_frame(decoded: std::result::Result<Option<Bytes>, AnyDelimiterCodecError>) -> Result<Option<Frame>> {
    match decoded {
        Ok(Some(chunk)) => Ok(Some(line_frame(&chunk))),
        Ok(None) => Ok(None),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Frame::Oversized)),
        Err(AnyDelimiterCodecError::Io(err)) => Err(AppError::Io(err.to_string())),
    }
}

fn line_frame(chunk: &[u8]) -> Frame {
    let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    match std::str::from_utf8(chunk) {
        Ok(line) => Frame::Line(line.to_owned()),
        Err(_) => Frame::Invalid(chunk.to_vec()),
    }
}
