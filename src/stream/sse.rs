//! Incremental Server-Sent Events frame splitter.
//!
//! HTTP chunks arrive with arbitrary boundaries, possibly splitting a frame
//! or a multi-byte character. [`SseBuffer`] holds raw bytes until a blank
//! line closes a frame, then yields the frame's `data` payload.

/// Payload that terminates an agent-service stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Byte buffer assembling SSE frames from response chunks.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the `data` payloads of every completed frame,
    /// in arrival order. Frames without `data` lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((end, sep_len)) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + sep_len).take(end).collect();
            if let Some(data) = frame_data(&String::from_utf8_lossy(&frame)) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Bytes received but not yet part of a completed frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Locate the first blank-line frame separator, returning its start index and length.
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Join the `data:` lines of one frame; comments and other fields are dropped.
fn frame_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
