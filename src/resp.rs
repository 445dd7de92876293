//! RESP wire protocol encoding and decoding.
//!
//! Every client command arrives as a RESP array of bulk strings. The
//! [`FrameDecoder`] accumulates raw socket bytes and yields one complete
//! value at a time, so both partial reads (a command split across several
//! reads) and pipelined input (several commands in one read) work. Each
//! decoded frame carries the exact number of bytes it consumed from the
//! wire, which replication offset accounting depends on.

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Errors raised while decoding wire bytes. All of them mean the stream
/// is desynchronized, so the connection must be closed.
#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("unexpected leading byte 0x{0:02x}")]
    UnexpectedLeadingByte(u8),
    #[error("negative {0} count in frame header")]
    NegativeCount(&'static str),
    #[error("bulk string payload is not terminated by CRLF")]
    MissingTerminator,
    #[error("invalid {0} header")]
    InvalidHeader(&'static str),
    #[error("bulk string payload is not valid UTF-8")]
    InvalidUtf8,
}

/// A single RESP value, used for both decoded requests and encoded replies.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    BulkString(String),
    NullBulkString,
    Integer(i64),
    Error(String),
    Array(Vec<RespValue>),
    /// Length-prefixed binary payload without a trailing CRLF. Only used
    /// for the snapshot transfer during a full resync.
    Raw(Vec<u8>),
}

impl RespValue {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s).into_bytes(),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s).into_bytes(),
            RespValue::NullBulkString => b"$-1\r\n".to_vec(),
            RespValue::Integer(n) => format!(":{}\r\n", n).into_bytes(),
            RespValue::Error(msg) => format!("-{}\r\n", msg).into_bytes(),
            RespValue::Array(elements) => {
                let mut out = format!("*{}\r\n", elements.len()).into_bytes();
                for element in elements {
                    out.extend_from_slice(&element.encode());
                }
                out
            }
            RespValue::Raw(bytes) => {
                let mut out = format!("${}\r\n", bytes.len()).into_bytes();
                out.extend_from_slice(bytes);
                out
            }
        }
    }

    /// Builds the RESP array for a command and its arguments.
    pub fn command<S: AsRef<str>>(parts: &[S]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(p.as_ref().to_string()))
                .collect(),
        )
    }
}

/// A decoded value plus the exact number of wire bytes it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub value: RespValue,
    pub wire_len: usize,
}

/// Incremental decoder over a growing byte buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes currently buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts the next complete frame, leaving any remainder buffered.
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, RespError> {
        match parse_value(&self.buffer, 0)? {
            Some((value, wire_len)) => {
                self.buffer.advance(wire_len);
                Ok(Some(Frame { value, wire_len }))
            }
            None => Ok(None),
        }
    }

    /// Extracts a raw `$<len>\r\n<bytes>` payload that has no trailing
    /// CRLF. This shape only appears right after a FULLRESYNC reply.
    pub fn next_raw_payload(&mut self) -> Result<Option<Vec<u8>>, RespError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        if self.buffer[0] != b'$' {
            return Err(RespError::UnexpectedLeadingByte(self.buffer[0]));
        }
        let Some((line, header_len)) = read_line(&self.buffer, 1) else {
            return Ok(None);
        };
        let declared = parse_integer(line, "raw payload")?;
        if declared < 0 {
            return Err(RespError::NegativeCount("raw payload"));
        }
        let declared = declared as usize;
        let total = header_len + declared;
        if self.buffer.len() < total {
            return Ok(None);
        }
        let payload = self.buffer[header_len..total].to_vec();
        self.buffer.advance(total);
        Ok(Some(payload))
    }
}

/// Finds the next CRLF starting at `pos`. Returns the line content (without
/// CRLF) and the absolute position just past the terminator.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let mut i = pos;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some((&buf[pos..i], i + 2));
        }
        i += 1;
    }
    None
}

fn parse_integer(line: &[u8], context: &'static str) -> Result<i64, RespError> {
    let text = std::str::from_utf8(line).map_err(|_| RespError::InvalidHeader(context))?;
    text.parse::<i64>()
        .map_err(|_| RespError::InvalidHeader(context))
}

/// Parses one complete value at `pos`. Returns the value and the number of
/// bytes it consumed, or `None` when the buffer is still incomplete.
fn parse_value(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    if pos >= buf.len() {
        return Ok(None);
    }

    match buf[pos] {
        b'*' => {
            let Some((line, mut cursor)) = read_line(buf, pos + 1) else {
                return Ok(None);
            };
            let count = parse_integer(line, "array")?;
            if count < 0 {
                return Err(RespError::NegativeCount("array"));
            }
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                match parse_value(buf, cursor)? {
                    Some((value, consumed)) => {
                        elements.push(value);
                        cursor += consumed;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(elements), cursor - pos)))
        }
        b'$' => {
            let Some((line, content_start)) = read_line(buf, pos + 1) else {
                return Ok(None);
            };
            let declared = parse_integer(line, "bulk string")?;
            if declared == -1 {
                return Ok(Some((RespValue::NullBulkString, content_start - pos)));
            }
            if declared < 0 {
                return Err(RespError::NegativeCount("bulk string"));
            }
            let declared = declared as usize;
            let end = content_start + declared;
            if buf.len() < end + 2 {
                return Ok(None);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(RespError::MissingTerminator);
            }
            let content = std::str::from_utf8(&buf[content_start..end])
                .map_err(|_| RespError::InvalidUtf8)?;
            Ok(Some((
                RespValue::BulkString(content.to_string()),
                end + 2 - pos,
            )))
        }
        b'+' => {
            let Some((line, next)) = read_line(buf, pos + 1) else {
                return Ok(None);
            };
            let content =
                std::str::from_utf8(line).map_err(|_| RespError::InvalidHeader("simple string"))?;
            Ok(Some((
                RespValue::SimpleString(content.to_string()),
                next - pos,
            )))
        }
        b'-' => {
            let Some((line, next)) = read_line(buf, pos + 1) else {
                return Ok(None);
            };
            let content =
                std::str::from_utf8(line).map_err(|_| RespError::InvalidHeader("error"))?;
            Ok(Some((RespValue::Error(content.to_string()), next - pos)))
        }
        b':' => {
            let Some((line, next)) = read_line(buf, pos + 1) else {
                return Ok(None);
            };
            let value = parse_integer(line, "integer")?;
            Ok(Some((RespValue::Integer(value), next - pos)))
        }
        other => Err(RespError::UnexpectedLeadingByte(other)),
    }
}
