//! RESP2 wire protocol.
//!
//! [`Frame`] is the value model, [`parse_frame`]/[`encode_frame`] convert it
//! to and from bytes, and [`RespCodec`] adapts both to `tokio_util::codec` so
//! sockets can be driven as a `Stream`/`Sink` of frames.

pub mod codec;
pub mod frame;

pub use codec::{DEFAULT_MAX_FRAME_SIZE, RespCodec};
pub use frame::{Frame, MAX_LINE_LEN, ParseError, encode_frame, parse_frame};
