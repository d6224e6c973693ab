//! RESP2 frame type with its parser and encoder.
//!
//! The parser is incremental in the simplest sense: it either decodes one
//! whole frame from the head of a buffer or reports [`ParseError::Incomplete`]
//! so the caller can read more bytes and try again.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

/// Largest bulk string accepted from a peer (512 MiB).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest array element count accepted from a peer.
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// Longest header or inline line accepted from a peer (64 KiB), terminator
/// excluded. Bulk payloads are not lines and are bounded by [`MAX_BULK_LEN`].
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Arrays nested deeper than this are rejected instead of recursing further.
const MAX_DEPTH: usize = 128;

/// A single RESP2 value.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$3\r\nfoo\r\n`
    Bulk(Bytes),
    /// `*2\r\n...`
    Array(Vec<Frame>),
    /// Null bulk string, `$-1\r\n`
    Null,
    /// Null array, `*-1\r\n`
    NullArray,
}

impl Frame {
    /// The `+OK` status reply.
    #[must_use]
    pub fn ok() -> Self {
        Self::Simple("OK".to_string())
    }

    /// Builds a bulk frame from anything convertible to [`Bytes`].
    #[must_use]
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Self::Bulk(data.into())
    }

    /// Builds an array of bulk frames.
    #[must_use]
    pub fn bulks<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::Array(items.into_iter().map(|b| Self::Bulk(b.into())).collect())
    }

    /// Builds an integer frame from a collection length.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn count(n: usize) -> Self {
        Self::Integer(n as i64)
    }

    /// Builds a `0`/`1` integer frame from a boolean.
    #[must_use]
    pub const fn bool(b: bool) -> Self {
        Self::Integer(if b { 1 } else { 0 })
    }

    /// Returns `true` for error frames.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Serializes the frame to its wire form.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        encode_frame(self, &mut buf);
        buf.freeze()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(s) => write!(f, "{s}"),
            Self::Error(e) => write!(f, "(error) {e}"),
            Self::Integer(i) => write!(f, "(integer) {i}"),
            Self::Bulk(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Null | Self::NullArray => write!(f, "(nil)"),
        }
    }
}

/// Why a buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The buffer ends before the frame does.
    Incomplete,
    /// The buffer does not contain valid RESP.
    Invalid(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete frame"),
            Self::Invalid(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Returns `true` if `byte` starts a typed RESP frame.
#[must_use]
pub const fn is_type_marker(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b':' | b'$' | b'*')
}

/// Decodes one frame from the start of `src`.
///
/// Returns the frame and the number of bytes it occupied. Lines that do not
/// start with a type marker are treated as inline commands and split
/// shell-style into an array of bulk strings.
///
/// # Errors
///
/// Returns [`ParseError::Incomplete`] when more bytes are needed and
/// [`ParseError::Invalid`] when the bytes can never form a valid frame.
pub fn parse_frame(src: &[u8]) -> Result<(Frame, usize), ParseError> {
    match src.first() {
        None => Err(ParseError::Incomplete),
        Some(&b) if is_type_marker(b) => parse_at(src, 0, 0),
        Some(_) => parse_inline(src),
    }
}

fn parse_at(src: &[u8], pos: usize, depth: usize) -> Result<(Frame, usize), ParseError> {
    let Some(&marker) = src.get(pos) else {
        return Err(ParseError::Incomplete);
    };
    let (line, next) = read_line(src, pos + 1)?;

    match marker {
        b'+' => Ok((Frame::Simple(line_to_string(line)?), next)),
        b'-' => Ok((Frame::Error(line_to_string(line)?), next)),
        b':' => Ok((Frame::Integer(line_to_int(line, "invalid integer")?), next)),
        b'$' => {
            let len = line_to_int(line, "invalid bulk length")?;
            if len == -1 {
                return Ok((Frame::Null, next));
            }
            if !(0..=MAX_BULK_LEN).contains(&len) {
                return Err(ParseError::Invalid("invalid bulk length".into()));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let end = next + len as usize;
            if src.len() < end + 2 {
                return Err(ParseError::Incomplete);
            }
            if &src[end..end + 2] != b"\r\n" {
                return Err(ParseError::Invalid("bulk string missing CRLF".into()));
            }
            Ok((Frame::Bulk(Bytes::copy_from_slice(&src[next..end])), end + 2))
        }
        b'*' => {
            let count = line_to_int(line, "invalid multibulk length")?;
            if count == -1 {
                return Ok((Frame::NullArray, next));
            }
            if !(0..=MAX_ARRAY_LEN).contains(&count) {
                return Err(ParseError::Invalid("invalid multibulk length".into()));
            }
            if depth >= MAX_DEPTH {
                return Err(ParseError::Invalid("array nesting too deep".into()));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = count as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            let mut offset = next;
            for _ in 0..count {
                let (frame, end) = parse_at(src, offset, depth + 1)?;
                items.push(frame);
                offset = end;
            }
            Ok((Frame::Array(items), offset))
        }
        other => Err(ParseError::Invalid(format!(
            "expected type marker, got '{}'",
            other.escape_ascii()
        ))),
    }
}

/// Parses an inline command terminated by `\n` (optionally `\r\n`).
fn parse_inline(src: &[u8]) -> Result<(Frame, usize), ParseError> {
    let window = &src[..src.len().min(MAX_LINE_LEN + 1)];
    let Some(nl) = window.iter().position(|&b| b == b'\n') else {
        if src.len() > MAX_LINE_LEN {
            return Err(ParseError::Invalid("too big inline request".into()));
        }
        return Err(ParseError::Incomplete);
    };
    let line = src[..nl].strip_suffix(b"\r").unwrap_or(&src[..nl]);
    let args = shlex::bytes::split(line)
        .ok_or_else(|| ParseError::Invalid("unbalanced quotes in request".into()))?;
    let frame = Frame::Array(args.into_iter().map(|a| Frame::Bulk(a.into())).collect());
    Ok((frame, nl + 1))
}

/// Reads a CRLF-terminated line of at most [`MAX_LINE_LEN`] bytes starting
/// at `start`.
fn read_line(src: &[u8], start: usize) -> Result<(&[u8], usize), ParseError> {
    let rest = src.get(start..).ok_or(ParseError::Incomplete)?;
    let window = &rest[..rest.len().min(MAX_LINE_LEN + 2)];
    if let Some(pos) = window.windows(2).position(|w| w == b"\r\n") {
        return Ok((&rest[..pos], start + pos + 2));
    }
    if rest.len() >= MAX_LINE_LEN + 2 {
        return Err(ParseError::Invalid("too big line".into()));
    }
    Err(ParseError::Incomplete)
}

fn line_to_string(line: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(line.to_vec()).map_err(|e| ParseError::Invalid(format!("utf8: {e}")))
}

fn line_to_int(line: &[u8], what: &str) -> Result<i64, ParseError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::Invalid(what.to_string()))
}

/// Appends the wire form of `frame` to `dst`.
///
/// CR and LF inside simple strings and errors are replaced by spaces so the
/// line framing cannot be broken by a reply's content.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    match frame {
        Frame::Simple(s) => encode_line(b'+', s, dst),
        Frame::Error(s) => encode_line(b'-', s, dst),
        Frame::Integer(i) => {
            dst.put_u8(b':');
            dst.put_slice(i.to_string().as_bytes());
            dst.put_slice(b"\r\n");
        }
        Frame::Bulk(data) => {
            dst.reserve(data.len() + 16);
            dst.put_u8(b'$');
            dst.put_slice(data.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            dst.put_slice(data);
            dst.put_slice(b"\r\n");
        }
        Frame::Array(items) => {
            dst.put_u8(b'*');
            dst.put_slice(items.len().to_string().as_bytes());
            dst.put_slice(b"\r\n");
            for item in items {
                encode_frame(item, dst);
            }
        }
        Frame::Null => dst.put_slice(b"$-1\r\n"),
        Frame::NullArray => dst.put_slice(b"*-1\r\n"),
    }
}

fn encode_line(marker: u8, s: &str, dst: &mut BytesMut) {
    dst.put_u8(marker);
    for b in s.bytes() {
        dst.put_u8(if b == b'\r' || b == b'\n' { b' ' } else { b });
    }
    dst.put_slice(b"\r\n");
}
