//! Wire frame codec.
//!
//! Every frame starts with a fixed 16-byte header; all integer fields are
//! big-endian on the wire.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Protocol version stamped on outbound frames.
const SEND_VERSION: u16 = 1;
/// Reserved header field, always 1 on send.
const SEND_PARAMETER: u32 = 1;

/// Frame operations.
pub mod op {
    /// Client keepalive.
    pub const HEARTBEAT: u32 = 2;
    /// Viewer-count pulse (4-byte big-endian payload).
    pub const POPULARITY: u32 = 3;
    /// JSON command payload.
    pub const COMMAND: u32 = 5;
    /// Authentication request (outbound only).
    pub const AUTH: u32 = 7;
    /// Authentication ack (inbound only).
    pub const AUTH_ACK: u32 = 8;
}

/// Payload encodings carried in the header version field.
pub mod version {
    pub const RAW_LEGACY: u16 = 0;
    pub const RAW: u16 = 1;
    pub const ZLIB: u16 = 2;
    pub const BROTLI: u16 = 3;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header: got {0} bytes, need {HEADER_SIZE}")]
    Malformed(usize),
}

/// Decoded 16-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame length including this header.
    pub packet_length: u32,
    /// Constant 16.
    pub header_length: u16,
    /// Payload encoding, see [`version`].
    pub version: u16,
    /// Message kind, see [`op`].
    pub operation: u32,
    /// Reserved.
    pub parameter: u32,
}

impl FrameHeader {
    /// Decode the first 16 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < HEADER_SIZE {
            return Err(HeaderError::Malformed(buf.len()));
        }
        let mut cur = &buf[..HEADER_SIZE];
        Ok(Self {
            packet_length: cur.get_u32(),
            header_length: cur.get_u16(),
            version: cur.get_u16(),
            operation: cur.get_u32(),
            parameter: cur.get_u32(),
        })
    }

    /// Body length implied by the header, `None` when `packet_length` is
    /// shorter than the header itself.
    #[must_use]
    pub fn body_length(&self) -> Option<usize> {
        (self.packet_length as usize).checked_sub(HEADER_SIZE)
    }
}

/// Encode one outbound frame: 16-byte header followed by `body`.
#[must_use]
pub fn encode_frame(operation: u32, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_u32((HEADER_SIZE + body.len()) as u32);
    buf.put_u16(HEADER_SIZE as u16);
    buf.put_u16(SEND_VERSION);
    buf.put_u32(operation);
    buf.put_u32(SEND_PARAMETER);
    buf.put_slice(body);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        for (operation, body) in [
            (op::HEARTBEAT, &b"[object Object]"[..]),
            (op::AUTH, &b"{\"roomid\":1}"[..]),
            (op::COMMAND, &[][..]),
        ] {
            let frame = encode_frame(operation, body);
            assert_eq!(frame.len(), HEADER_SIZE + body.len());

            let header = FrameHeader::decode(&frame).unwrap();
            assert_eq!(header.packet_length as usize, HEADER_SIZE + body.len());
            assert_eq!(header.header_length as usize, HEADER_SIZE);
            assert_eq!(header.version, 1);
            assert_eq!(header.operation, operation);
            assert_eq!(header.parameter, 1);
            assert_eq!(header.body_length(), Some(body.len()));
            assert_eq!(&frame[HEADER_SIZE..], body);
        }
    }

    #[test]
    fn short_buffer_is_malformed() {
        assert_eq!(
            FrameHeader::decode(&[0u8; 15]),
            Err(HeaderError::Malformed(15))
        );
        assert_eq!(FrameHeader::decode(&[]), Err(HeaderError::Malformed(0)));
    }

    #[test]
    fn body_length_underflow_is_none() {
        let mut frame = encode_frame(op::COMMAND, b"x");
        // Corrupt the packet length below the header size.
        frame[0..4].copy_from_slice(&8u32.to_be_bytes());
        let header = FrameHeader::decode(&frame).unwrap();
        assert_eq!(header.body_length(), None);
    }
}
