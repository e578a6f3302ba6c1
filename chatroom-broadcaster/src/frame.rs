//! Newline-delimited frame reader with a hard per-line size cap.
//!
//! An oversized line is discarded up to its newline without being buffered,
//! so a peer that never sends `\n` costs at most `max_len` bytes.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Default cap on one inbound line, newline excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// One read from the peer
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Complete line without its trailing newline
    Line(String),
    /// Complete line that is not valid UTF-8
    NotUtf8,
    /// Line longer than the cap; its bytes were dropped
    Oversized,
    /// Peer closed the stream
    Eof,
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
    max_len: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max_len,
            buf: Vec::new(),
        }
    }

    /// Read the next line. Only I/O failures are errors.
    ///
    /// Bytes after the last newline at EOF are discarded.
    pub async fn next_frame(&mut self) -> std::io::Result<Frame> {
        self.buf.clear();
        let mut oversized = false;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(Frame::Eof);
            }

            let (content_len, consumed, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (pos, pos + 1, true),
                None => (available.len(), available.len(), false),
            };

            if !oversized {
                if self.buf.len() + content_len > self.max_len {
                    oversized = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(&available[..content_len]);
                }
            }

            self.inner.consume(consumed);
            if complete {
                break;
            }
        }

        if oversized {
            return Ok(Frame::Oversized);
        }

        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }

        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => Ok(Frame::Line(line)),
            Err(_) => Ok(Frame::NotUtf8),
        }
    }
}
