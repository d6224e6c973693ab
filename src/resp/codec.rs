//! `tokio_util` codec framing a byte stream into RESP frames.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{MAX_LINE_LEN, Frame, ParseError, encode_frame, is_type_marker, parse_frame};
use crate::error::ProtocolError;

/// Default cap on bytes buffered for a single undecoded frame (512 MiB + slack).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024 + 64 * 1024;

/// Frames a byte stream into [`Frame`]s and back.
///
/// Nothing is parsed until the first line of a frame is complete, and the
/// search for its terminator resumes where the previous read left off.
/// Once it is complete, the decoder re-parses from the start of its buffer
/// whenever new bytes arrive. Blank inline lines between requests are
/// discarded.
#[derive(Debug, Clone)]
pub struct RespCodec {
    max_frame_size: usize,
    /// Leading bytes of the buffer already known to hold no `\n`.
    scanned: usize,
}

impl RespCodec {
    /// Creates a codec that rejects frames larger than `max_frame_size` bytes.
    #[must_use]
    pub const fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            scanned: 0,
        }
    }

    /// Returns the configured frame size limit.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Position of the first `\n` in `src`, scanning only bytes not seen by
    /// an earlier call.
    fn find_newline(&mut self, src: &[u8]) -> Option<usize> {
        let start = self.scanned.min(src.len());
        let found = src[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| start + i);
        self.scanned = if found.is_some() { 0 } else { src.len() };
        found
    }

    const fn too_large(&self, size: usize) -> ProtocolError {
        ProtocolError::FrameTooLarge {
            size,
            limit: self.max_frame_size,
        }
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for RespCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        loop {
            let Some(&first) = src.first() else {
                return Ok(None);
            };
            match self.find_newline(src) {
                Some(nl)
                    if !is_type_marker(first) && src[..nl].iter().all(u8::is_ascii_whitespace) =>
                {
                    src.advance(nl + 1);
                }
                Some(_) => break,
                None if src.len() > self.max_frame_size => {
                    return Err(self.too_large(src.len()));
                }
                // Over-long first line: the parser reports it.
                None if src.len() > MAX_LINE_LEN + 2 => break,
                None => return Ok(None),
            }
        }

        match parse_frame(src) {
            Ok((frame, used)) => {
                src.advance(used);
                Ok(Some(frame))
            }
            Err(ParseError::Incomplete) => {
                if src.len() > self.max_frame_size {
                    return Err(self.too_large(src.len()));
                }
                Ok(None)
            }
            Err(ParseError::Invalid(msg)) => Err(ProtocolError::Invalid(msg)),
        }
    }
}

impl Encoder<Frame> for RespCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_frame(&frame, dst);
        Ok(())
    }
}

impl Encoder<&Frame> for RespCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_frame(frame, dst);
        Ok(())
    }
}
