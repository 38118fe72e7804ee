//! Newline framing for commands and replies.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::protocol::MAX_COMMAND_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A command longer than the limit; its bytes are dropped up to the
    /// next newline.
    TooLong,
    /// A complete line that is not valid UTF-8; already consumed.
    Invalid,
}

/// [`LinesCodec`] that reports overlong and undecodable lines as frames
/// instead of errors, so the connection survives them.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    lines: LinesCodec,
}

impl CommandCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_COMMAND_LEN)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn frame(decoded: Result<Option<String>, LinesCodecError>) -> Result<Option<Frame>, LinesCodecError> {
    match decoded {
        Ok(line) => Ok(line.map(Frame::Line)),
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::TooLong)),
        // The decoder only reports I/O errors for bad UTF-8, after splitting the line off
        Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
            Ok(Some(Frame::Invalid))
        }
        Err(e) => Err(e),
    }
}

impl Decoder for CommandCodec {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        frame(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        frame(self.lines.decode_eof(buf))
    }
}

impl<T: AsRef<str>> Encoder<T> for CommandCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.lines.encode(line, buf)
    }
}
