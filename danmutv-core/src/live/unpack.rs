//! Decompression pipeline: expands one inbound frame into its
//! `(operation, payload)` sub-frames.
//!
//! Version 2 bodies inflate to a concatenation of frames in the same
//! 16-byte-header format. Version 3 bodies decompress to a flat buffer split
//! by a 4-byte big-endian length prefix per element; the first 16 bytes of
//! each element are a header-shaped prefix that is not parsed separately, so
//! length-driven slicing is authoritative there.

use std::io::Read;

use bytes::Buf;
use thiserror::Error;
use tracing::warn;

use super::frame::{self, FrameHeader, HEADER_SIZE};

/// Bytes preceding a version-3 element payload: 4-byte length prefix plus the
/// 16-byte header-shaped prefix.
const BROTLI_ELEMENT_PREFIX: usize = 20;

/// One `(operation, payload)` unit recovered from a frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFrame {
    pub operation: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("deflate stream: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("brotli stream: {0}")]
    Brotli(#[source] std::io::Error),
}

/// Expand a decoded frame into sub-frames.
///
/// Truncated or inconsistent length fields never panic: sub-frames recovered
/// before the inconsistency are returned and the remainder of that frame's
/// sub-stream is discarded with a warning. A corrupt compressed stream is an
/// error; the caller drops the frame and keeps the connection.
pub fn unpack(header: &FrameHeader, body: &[u8]) -> Result<Vec<SubFrame>, UnpackError> {
    let Some(body_len) = header.body_length() else {
        warn!(
            packet_length = header.packet_length,
            "frame shorter than its own header, dropping"
        );
        return Ok(Vec::new());
    };
    if body_len == 0 {
        warn!(operation = header.operation, "zero-length frame body, dropping");
        return Ok(Vec::new());
    }
    if body.len() < body_len {
        warn!(
            got = body.len(),
            expected = body_len,
            "truncated frame body, dropping"
        );
        return Ok(Vec::new());
    }
    let body = &body[..body_len];

    match header.version {
        frame::version::RAW_LEGACY | frame::version::RAW => Ok(vec![SubFrame {
            operation: header.operation,
            payload: body.to_vec(),
        }]),
        frame::version::ZLIB => unpack_deflate(body),
        frame::version::BROTLI => unpack_brotli(header.operation, body),
        other => {
            warn!(version = other, "unknown payload version, ignoring frame");
            Ok(Vec::new())
        }
    }
}

/// The body's first two bytes are a codec marker; the rest is a raw deflate
/// stream holding concatenated 16-byte-header frames.
fn unpack_deflate(body: &[u8]) -> Result<Vec<SubFrame>, UnpackError> {
    if body.len() < 2 {
        warn!("compressed body shorter than its codec marker, dropping");
        return Ok(Vec::new());
    }

    let mut inflated = Vec::new();
    flate2::read::DeflateDecoder::new(&body[2..])
        .read_to_end(&mut inflated)
        .map_err(UnpackError::Inflate)?;

    let mut frames = Vec::new();
    let mut offset = 0;
    while inflated.len() - offset >= HEADER_SIZE {
        let Ok(sub) = FrameHeader::decode(&inflated[offset..]) else {
            break;
        };
        let Some(sub_len) = sub.body_length() else {
            warn!(
                packet_length = sub.packet_length,
                "sub-frame shorter than its header, discarding rest of stream"
            );
            break;
        };
        // A zero-length sub-frame signals the end of the stream.
        if sub_len == 0 {
            break;
        }
        let start = offset + HEADER_SIZE;
        let Some(end) = start.checked_add(sub_len).filter(|&end| end <= inflated.len()) else {
            warn!(
                expected = sub_len,
                remaining = inflated.len() - start,
                "truncated sub-frame, discarding rest of stream"
            );
            break;
        };
        frames.push(SubFrame {
            operation: sub.operation,
            payload: inflated[start..end].to_vec(),
        });
        offset = end;
    }
    Ok(frames)
}

/// The whole body is one brotli stream; the decompressed buffer is split by a
/// 4-byte big-endian length prefix per element.
fn unpack_brotli(operation: u32, body: &[u8]) -> Result<Vec<SubFrame>, UnpackError> {
    let mut flat = Vec::new();
    brotli::Decompressor::new(body, 4096)
        .read_to_end(&mut flat)
        .map_err(UnpackError::Brotli)?;

    let mut frames = Vec::new();
    let mut offset = 0;
    while flat.len() - offset >= 4 {
        let len = (&flat[offset..]).get_u32() as usize;
        if len < BROTLI_ELEMENT_PREFIX || offset + len > flat.len() {
            warn!(
                element_length = len,
                remaining = flat.len() - offset,
                "inconsistent element length, discarding rest of stream"
            );
            break;
        }
        frames.push(SubFrame {
            operation,
            payload: flat[offset + BROTLI_ELEMENT_PREFIX..offset + len].to_vec(),
        });
        offset += len;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::live::frame::encode_frame;

    fn header(packet_length: u32, version: u16, operation: u32) -> FrameHeader {
        FrameHeader {
            packet_length,
            header_length: HEADER_SIZE as u16,
            version,
            operation,
            parameter: 1,
        }
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn compress_brotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            writer.write_all(data).unwrap();
        }
        out
    }

    #[test]
    fn raw_versions_yield_one_sub_frame() {
        for version in [frame::version::RAW_LEGACY, frame::version::RAW] {
            let body = b"{\"cmd\":\"SEND_GIFT\"}";
            let hdr = header((HEADER_SIZE + body.len()) as u32, version, frame::op::COMMAND);
            let frames = unpack(&hdr, body).unwrap();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].operation, frame::op::COMMAND);
            assert_eq!(frames[0].payload, body);
        }
    }

    #[test]
    fn undersized_packet_length_yields_nothing() {
        let hdr = header(8, frame::version::RAW, frame::op::COMMAND);
        assert!(unpack(&hdr, b"whatever").unwrap().is_empty());
    }

    #[test]
    fn zero_length_body_yields_nothing() {
        let hdr = header(HEADER_SIZE as u32, frame::version::RAW, frame::op::COMMAND);
        assert!(unpack(&hdr, &[]).unwrap().is_empty());
    }

    #[test]
    fn unknown_version_yields_nothing() {
        let hdr = header((HEADER_SIZE + 4) as u32, 9, frame::op::COMMAND);
        assert!(unpack(&hdr, &[1, 2, 3, 4]).unwrap().is_empty());
    }

    #[test]
    fn deflate_stream_yields_sub_frames_in_order() {
        let first = encode_frame(frame::op::COMMAND, b"{\"cmd\":\"A\"}");
        let second = encode_frame(frame::op::COMMAND, b"{\"cmd\":\"B\"}");
        // Zero-length terminator frame must not be emitted.
        let terminator = encode_frame(frame::op::COMMAND, b"");

        let mut stream = Vec::new();
        stream.extend_from_slice(&first);
        stream.extend_from_slice(&second);
        stream.extend_from_slice(&terminator);

        let mut body = vec![0x78, 0x9c]; // codec marker, skipped
        body.extend_from_slice(&deflate(&stream));

        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::ZLIB,
            frame::op::COMMAND,
        );
        let frames = unpack(&hdr, &body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload, b"{\"cmd\":\"A\"}");
        assert_eq!(frames[1].payload, b"{\"cmd\":\"B\"}");
    }

    #[test]
    fn deflate_truncated_tail_keeps_recovered_frames() {
        let first = encode_frame(frame::op::COMMAND, b"{\"cmd\":\"A\"}");
        let mut stream = Vec::new();
        stream.extend_from_slice(&first);
        // A header promising more body than the stream holds.
        stream.extend_from_slice(&encode_lying_header(1000));

        let mut body = vec![0x78, 0x9c];
        body.extend_from_slice(&deflate(&stream));

        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::ZLIB,
            frame::op::COMMAND,
        );
        let frames = unpack(&hdr, &body).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"{\"cmd\":\"A\"}");
    }

    fn encode_lying_header(claimed_body: u32) -> Vec<u8> {
        let mut frame = encode_frame(frame::op::COMMAND, b"");
        frame[0..4].copy_from_slice(&(HEADER_SIZE as u32 + claimed_body).to_be_bytes());
        frame
    }

    #[test]
    fn corrupt_deflate_stream_is_an_error() {
        let mut body = vec![0x78, 0x9c];
        body.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff]);
        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::ZLIB,
            frame::op::COMMAND,
        );
        assert!(matches!(unpack(&hdr, &body), Err(UnpackError::Inflate(_))));
    }

    #[test]
    fn brotli_element_strips_twenty_byte_prefix() {
        let payload = b"{\"cmd\":\"DANMU_MSG\"}";
        let element_len = BROTLI_ELEMENT_PREFIX + payload.len();

        let mut flat = Vec::new();
        flat.extend_from_slice(&(element_len as u32).to_be_bytes());
        flat.extend_from_slice(&[0u8; 16]); // header-shaped prefix, unparsed
        flat.extend_from_slice(payload);

        let body = compress_brotli(&flat);
        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::BROTLI,
            frame::op::COMMAND,
        );
        let frames = unpack(&hdr, &body).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].operation, frame::op::COMMAND);
        assert_eq!(frames[0].payload.len(), element_len - 20);
        assert_eq!(frames[0].payload, payload);
    }

    #[test]
    fn brotli_two_elements_in_order_with_trailing_junk() {
        let mut flat = Vec::new();
        for payload in [&b"first"[..], &b"second"[..]] {
            let element_len = BROTLI_ELEMENT_PREFIX + payload.len();
            flat.extend_from_slice(&(element_len as u32).to_be_bytes());
            flat.extend_from_slice(&[0u8; 16]);
            flat.extend_from_slice(payload);
        }
        // An element claiming to run past the buffer stops the split.
        flat.extend_from_slice(&1000u32.to_be_bytes());

        let body = compress_brotli(&flat);
        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::BROTLI,
            frame::op::COMMAND,
        );
        let frames = unpack(&hdr, &body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload, b"first");
        assert_eq!(frames[1].payload, b"second");
    }

    #[test]
    fn truncated_brotli_stream_is_an_error() {
        let full = compress_brotli(&[0x42; 4096]);
        let body = &full[..full.len() / 2];
        let hdr = header(
            (HEADER_SIZE + body.len()) as u32,
            frame::version::BROTLI,
            frame::op::COMMAND,
        );
        assert!(matches!(unpack(&hdr, body), Err(UnpackError::Brotli(_))));
    }
}
