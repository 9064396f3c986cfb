//! Message framing over a chunk-capped stream.
//!
//! A single read on the transport never yields more than
//! [`MAX_READ_CHUNK`](crate::core::constants::MAX_READ_CHUNK) bytes, so
//! messages that do not fit one chunk carry a size header and are
//! reassembled on the receiving side.
//!
//! Wire format of an oversized message:
//!
//! ```text
//! +---------------------------+----------------------+------------------+
//! | Marker "BU_MSG_SIZE"      | Length               | Payload          |
//! | 11 bytes ASCII            | 7 ASCII digits       | Length bytes     |
//! +---------------------------+----------------------+------------------+
//! ```
//!
//! Messages of at most [`WRITE_THRESHOLD`] bytes are sent raw. The receiver
//! treats every chunk that does not open with a header as one complete
//! message.

use crate::core::FrameError;
use crate::core::constants::{
    HEADER_LENGTH_DIGITS, HEADER_MARKER, HEADER_SIZE, MAX_PAYLOAD_SIZE, WRITE_THRESHOLD,
};

/// One outbound message in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Short payload, sent as is.
    Raw(&'a [u8]),
    /// Oversized payload preceded by a size header.
    Sized {
        /// Marker plus zero-padded length.
        header: [u8; HEADER_SIZE],
        /// The payload.
        payload: &'a [u8],
    },
}

impl Frame<'_> {
    /// Buffers to write, in order.
    pub fn buffers(&self) -> Vec<&[u8]> {
        match self {
            Frame::Raw(payload) => vec![*payload],
            Frame::Sized { header, payload } => vec![&header[..], *payload],
        }
    }

    /// Total number of bytes on the wire.
    pub fn wire_len(&self) -> usize {
        match self {
            Frame::Raw(payload) => payload.len(),
            Frame::Sized { payload, .. } => HEADER_SIZE + payload.len(),
        }
    }

    /// Concatenate the frame into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        for buf in self.buffers() {
            out.extend_from_slice(buf);
        }
        out
    }
}

/// Build the size header for a payload of `len` bytes.
pub fn encode_header(len: usize) -> Result<[u8; HEADER_SIZE], FrameError> {
    if len >= MAX_PAYLOAD_SIZE {
        return Err(FrameError::TooLarge {
            len,
            limit: MAX_PAYLOAD_SIZE,
        });
    }

    let mut header = [0u8; HEADER_SIZE];
    header[..HEADER_MARKER.len()].copy_from_slice(HEADER_MARKER);
    let digits = format!("{:0width$}", len, width = HEADER_LENGTH_DIGITS);
    header[HEADER_MARKER.len()..].copy_from_slice(digits.as_bytes());
    Ok(header)
}

/// Parse a complete header, returning the declared payload length.
///
/// Returns `None` if `bytes` does not start with a well-formed header.
pub fn parse_header(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < HEADER_SIZE || !bytes.starts_with(HEADER_MARKER) {
        return None;
    }

    let digits = &bytes[HEADER_MARKER.len()..HEADER_SIZE];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0')),
    )
}

/// Encode a payload for transmission.
pub fn encode(payload: &[u8]) -> Result<Frame<'_>, FrameError> {
    if payload.len() <= WRITE_THRESHOLD {
        return Ok(Frame::Raw(payload));
    }
    Ok(Frame::Sized {
        header: encode_header(payload.len())?,
        payload,
    })
}

/// Decoder progress.
#[derive(Debug, Default)]
enum DecodeState {
    /// Next chunk starts a new message.
    #[default]
    Idle,
    /// Marker seen, length digits still incomplete.
    Header(Vec<u8>),
    /// Collecting `target` payload bytes.
    Body { target: usize, buf: Vec<u8> },
}

/// Incremental decoder turning transport chunks back into messages.
///
/// Feed every chunk returned by one transport read to [`push`](Self::push),
/// in order. Messages come out in stream order; bytes past the declared
/// length of a sized message are treated as the start of the next one.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: DecodeState,
}

impl FrameDecoder {
    /// Upper bound on memory reserved up front for a sized message.
    const MAX_PREALLOC: usize = 64 * 1024;

    /// Create a decoder with no message in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sized message is partially received.
    pub fn is_partial(&self) -> bool {
        !matches!(self.state, DecodeState::Idle)
    }

    /// Payload bytes still missing for the message in progress, if known.
    pub fn remaining(&self) -> Option<usize> {
        match &self.state {
            DecodeState::Body { target, buf } => Some(target - buf.len()),
            _ => None,
        }
    }

    /// Feed one chunk; returns every message it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        match std::mem::take(&mut self.state) {
            DecodeState::Idle => self.start(chunk, &mut out),
            DecodeState::Header(mut pending) => {
                pending.extend_from_slice(chunk);
                self.start(&pending, &mut out);
            }
            DecodeState::Body { target, mut buf } => {
                let missing = target - buf.len();
                if chunk.len() < missing {
                    buf.extend_from_slice(chunk);
                    self.state = DecodeState::Body { target, buf };
                } else {
                    buf.extend_from_slice(&chunk[..missing]);
                    out.push(buf);
                    let surplus = &chunk[missing..];
                    if !surplus.is_empty() {
                        self.start(surplus, &mut out);
                    }
                }
            }
        }
        out
    }

    /// Inspect bytes that begin a new message.
    fn start(&mut self, mut bytes: &[u8], out: &mut Vec<Vec<u8>>) {
        loop {
            if bytes.len() < HEADER_SIZE && bytes.starts_with(HEADER_MARKER) {
                self.state = DecodeState::Header(bytes.to_vec());
                return;
            }

            let Some(target) = parse_header(bytes) else {
                out.push(bytes.to_vec());
                return;
            };

            let body = &bytes[HEADER_SIZE..];
            if body.len() < target {
                let mut buf = Vec::with_capacity(target.min(Self::MAX_PREALLOC));
                buf.extend_from_slice(body);
                self.state = DecodeState::Body { target, buf };
                return;
            }

            out.push(body[..target].to_vec());
            bytes = &body[target..];
            if bytes.is_empty() {
                return;
            }
        }
    }
}
