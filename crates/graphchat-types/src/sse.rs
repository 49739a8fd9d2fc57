//! Incremental decoding of `text/event-stream` bodies.
//!
//! Frames arrive as arbitrary byte slices from the network, so a single
//! `data:` line may be split across several reads.  [`LineBuffer`] reassembles
//! complete lines; [`FrameDecoder`] turns `data:` lines into [`StreamChunk`]s.

use thiserror::Error;

use crate::chat::StreamChunk;

/// Longest line [`LineBuffer`] holds before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024; // 1 MiB

/// Errors raised while decoding a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8")]
    Utf8,

    #[error("frame line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("invalid frame payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes already searched for a newline are not searched again, and a line
/// longer than the limit is an error rather than unbounded growth.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Prefix of `buf` known to hold no newline.
    scanned: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    /// Append `bytes` and return every line completed by them, without the
    /// trailing `\r\n` / `\n`.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, FrameError> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if end - start > self.max_line {
                return Err(self.overflow());
            }
            lines.push(decode_line(&self.buf[start..=end])?);
            start = end + 1;
            from = start;
        }

        self.buf.drain(..start);
        self.scanned = self.buf.len();
        if self.buf.len() > self.max_line {
            return Err(self.overflow());
        }
        Ok(lines)
    }

    /// Return the unterminated remainder, if any, and clear the buffer.
    pub fn finish(&mut self) -> Result<Option<String>, FrameError> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let raw = std::mem::take(&mut self.buf);
        decode_line(&raw).map(Some)
    }

    fn overflow(&mut self) -> FrameError {
        self.buf.clear();
        self.scanned = 0;
        FrameError::LineTooLong {
            limit: self.max_line,
        }
    }
}

fn decode_line(raw: &[u8]) -> Result<String, FrameError> {
    let line = std::str::from_utf8(raw).map_err(|_| FrameError::Utf8)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Return the payload of a `data:` line, or `None` for comments, other
/// fields and blank separators.
pub fn data_payload(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() { None } else { Some(payload) }
}

/// Decodes `data: <StreamChunk JSON>` frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    lines: LineBuffer,
}

impl FrameDecoder {
    /// Feed bytes read from the network; returns every chunk completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamChunk>, FrameError> {
        let mut chunks = Vec::new();
        for line in self.lines.push(bytes)? {
            if let Some(payload) = data_payload(&line) {
                chunks.push(serde_json::from_str(payload)?);
            }
        }
        Ok(chunks)
    }

    /// Decode a final frame left without a trailing newline.
    pub fn finish(&mut self) -> Result<Option<StreamChunk>, FrameError> {
        match self.lines.finish()? {
            Some(line) => match data_payload(&line) {
                Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_frames_split_across_reads() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(b"data: {\"content\":\"Hel").unwrap().is_empty());
        let chunks = decoder
            .push(b"\",\"done\":false}\n\ndata: {\"content\":\"\",\"done\":true}\n\n")
            .unwrap();
        assert_eq!(chunks, vec![StreamChunk::content("Hel"), StreamChunk::done()]);
    }

    #[test]
    fn ignores_comments_and_crlf() {
        let mut decoder = FrameDecoder::default();
        let chunks = decoder
            .push(b": keep-alive\r\n\r\nevent: message\r\ndata: {\"content\":\"a\"}\r\n\r\n")
            .unwrap();
        assert_eq!(chunks, vec![StreamChunk::content("a")]);
    }

    #[test]
    fn finish_decodes_unterminated_frame() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(b"data: {\"done\":true}").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), Some(StreamChunk::done()));
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn rejects_invalid_json() {
        let mut decoder = FrameDecoder::default();
        let err = decoder.push(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, FrameError::Payload(_)));
    }

    #[test]
    fn lines_split_across_many_reads() {
        let mut lines = LineBuffer::default();
        for part in ["da", "ta: a", "bc", "\r", "\nnext"] {
            let done = lines.push(part.as_bytes()).unwrap();
            if part == "\nnext" {
                assert_eq!(done, vec!["data: abc".to_owned()]);
            } else {
                assert!(done.is_empty());
            }
        }
        assert_eq!(lines.finish().unwrap(), Some("next".to_owned()));
    }

    #[test]
    fn several_lines_in_one_read() {
        let mut lines = LineBuffer::default();
        assert_eq!(
            lines.push(b"a\nb\n\nc").unwrap(),
            vec!["a".to_owned(), "b".to_owned(), String::new()]
        );
        assert_eq!(lines.push(b"d\n").unwrap(), vec!["cd".to_owned()]);
    }

    #[test]
    fn unterminated_line_is_capped() {
        let mut lines = LineBuffer::with_max_line(8);
        assert!(lines.push(b"12345").unwrap().is_empty());
        let err = lines.push(b"6789").unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { limit: 8 }));
    }

    #[test]
    fn long_terminated_line_is_capped() {
        let mut lines = LineBuffer::with_max_line(4);
        assert!(matches!(
            lines.push(b"ok\nmuch too long\n"),
            Err(FrameError::LineTooLong { .. })
        ));
    }

    #[test]
    fn data_payload_skips_blank_data() {
        assert_eq!(data_payload("data: [DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("data:x"), Some("x"));
        assert_eq!(data_payload("data: "), None);
        assert_eq!(data_payload("id: 3"), None);
    }
}
