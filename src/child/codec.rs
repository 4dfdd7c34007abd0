//! Inbound framing for the child protocol.
//!
//! Both ends read newline-delimited JSON. Lines are capped so a misbehaving
//! peer cannot make the reader buffer without bound, and blank lines are
//! dropped before they reach the message parser.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default cap on one protocol line: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Decoder yielding one non-blank protocol line at a time.
///
/// A line longer than the cap yields [`AppError::Protocol`]; the rest of
/// that line is discarded and decoding resumes after its newline.
#[derive(Debug)]
pub struct ChildLineCodec {
    lines: LinesCodec,
    max_line_bytes: usize,
}

impl ChildLineCodec {
    /// Codec capped at [`MAX_LINE_BYTES`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }

    /// Codec capped at `max_line_bytes`.
    #[must_use]
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_line_bytes),
            max_line_bytes,
        }
    }

    /// Longest line this codec accepts.
    #[must_use]
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    fn map_error(&self, err: LinesCodecError) -> AppError {
        match err {
            LinesCodecError::MaxLineLengthExceeded => AppError::Protocol(format!(
                "line too long: exceeded {} bytes",
                self.max_line_bytes
            )),
            LinesCodecError::Io(err) => AppError::Io(err.to_string()),
        }
    }
}

impl Default for ChildLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChildLineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            match self.lines.decode(src) {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(other) => return Ok(other),
                Err(err) => return Err(self.map_error(err)),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            match self.lines.decode_eof(src) {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(other) => return Ok(other),
                Err(err) => return Err(self.map_error(err)),
            }
        }
    }
}
