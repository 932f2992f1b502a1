//! Framing for codec payloads on pipes, sockets and files.
//!
//! The codec itself carries no whole-message length; a frame adds one,
//! together with a magic and flags, and optionally LZ4-compresses the
//! payload.

use std::borrow::Cow;
use std::path::Path;

use tracing::debug;

use crate::codec;
use crate::envelope::TransmissionEnvelope;
use crate::error::ProtocolError;
use crate::messages::Message;

/// First two bytes of every frame, ASCII "PC".
pub const MAGIC: [u8; 2] = [0x50, 0x43];

/// Largest payload a frame may carry, compressed or decompressed.
pub const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// Magic, flags byte, `u32` stream id and `u32` payload length.
pub const HEADER_SIZE: usize = 11;

/// Payloads up to this many bytes are always stored raw.
const COMPRESSION_THRESHOLD: usize = 512;

bitflags::bitflags! {
    /// Header flags. `ENVELOPE` or `MESSAGE` names the payload kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        const COMPRESSED = 0b0000_0001;
        const ENVELOPE   = 0b0000_0010;
        const MESSAGE    = 0b0000_0100;
    }
}

/// Wrap an encoded payload in a frame, compressing it when that helps.
pub fn encode_frame(
    payload: &[u8],
    kind: FrameFlags,
    stream_id: u32,
    compress: bool,
) -> Result<Vec<u8>, WireError> {
    let (final_payload, compression_flag) = if compress && payload.len() > COMPRESSION_THRESHOLD {
        let compressed = lz4_flex::compress_prepend_size(payload);
        if compressed.len() < payload.len() {
            (Cow::Owned(compressed), FrameFlags::COMPRESSED)
        } else {
            // LZ4 output would be larger; keep the raw bytes.
            (Cow::Borrowed(payload), FrameFlags::empty())
        }
    } else {
        (Cow::Borrowed(payload), FrameFlags::empty())
    };

    let payload_len = u32::try_from(final_payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(WireError::FrameTooLarge(final_payload.len() as u64))?;

    let flags = compression_flag | kind;
    let mut frame = Vec::with_capacity(HEADER_SIZE + final_payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.push(flags.bits());
    frame.extend_from_slice(&stream_id.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(&final_payload);

    Ok(frame)
}

/// Parse the fixed header into flags, stream id and payload length. Unknown
/// flag bits are dropped.
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<(FrameFlags, u32, u32), WireError> {
    let (magic, fields) = header.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(WireError::InvalidMagic);
    }
    let flags = FrameFlags::from_bits_truncate(fields[0]);
    let stream_id = le_u32(&fields[1..5]);
    let length = le_u32(&fields[5..9]);
    check_frame_size(length)?;
    Ok((flags, stream_id, length))
}

/// Undo payload compression according to the frame flags.
///
/// The decompressed size recorded in an LZ4 payload is checked against
/// [`MAX_FRAME_SIZE`] before anything is allocated for it.
pub fn decode_payload(payload: &[u8], flags: FrameFlags) -> Result<Cow<'_, [u8]>, WireError> {
    if !flags.contains(FrameFlags::COMPRESSED) {
        return Ok(Cow::Borrowed(payload));
    }
    let size = payload
        .get(..4)
        .map(le_u32)
        .ok_or_else(|| WireError::Decompression("missing decompressed size".to_string()))?;
    check_frame_size(size)?;
    let data = lz4_flex::decompress_size_prepended(payload)
        .map_err(|e| WireError::Decompression(e.to_string()))?;
    Ok(Cow::Owned(data))
}

fn check_frame_size(len: u32) -> Result<(), WireError> {
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(u64::from(len)));
    }
    Ok(())
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

/// Split one complete frame into its flags, stream id and decompressed payload.
pub fn decode_frame(frame: &[u8]) -> Result<(FrameFlags, u32, Vec<u8>), WireError> {
    let header: &[u8; HEADER_SIZE] = frame
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(WireError::Truncated {
            expected: HEADER_SIZE,
            found: frame.len(),
        })?;
    let (flags, stream_id, length) = decode_header(header)?;
    let body = &frame[HEADER_SIZE..];
    if body.len() != length as usize {
        return Err(WireError::Truncated {
            expected: HEADER_SIZE + length as usize,
            found: frame.len(),
        });
    }
    let payload = decode_payload(body, flags)?.into_owned();
    Ok((flags, stream_id, payload))
}

/// Frame a service message.
pub fn encode_message(msg: &Message, stream_id: u32, compress: bool) -> Result<Vec<u8>, WireError> {
    let payload = codec::encode(msg)?;
    encode_frame(&payload, FrameFlags::MESSAGE, stream_id, compress)
}

/// Decode a message from a frame body, given the flags from its header.
pub fn decode_message(payload: &[u8], flags: FrameFlags) -> Result<Message, WireError> {
    let data = decode_payload(payload, flags)?;
    Ok(codec::decode(&data)?)
}

/// Write an envelope to a file as a single frame.
pub fn write_envelope_file(
    path: impl AsRef<Path>,
    envelope: TransmissionEnvelope,
    compress: bool,
) -> Result<(), WireError> {
    let payload = envelope.into_bytes()?;
    let frame = encode_frame(&payload, FrameFlags::ENVELOPE, 0, compress)?;
    std::fs::write(path.as_ref(), &frame)?;
    debug!(
        path = %path.as_ref().display(),
        payload = payload.len(),
        frame = frame.len(),
        "wrote envelope file"
    );
    Ok(())
}

/// Read an envelope file written by [`write_envelope_file`].
pub fn read_envelope_file(path: impl AsRef<Path>) -> Result<TransmissionEnvelope, WireError> {
    let frame = std::fs::read(path.as_ref())?;
    let (flags, _, payload) = decode_frame(&frame)?;
    if !flags.contains(FrameFlags::ENVELOPE) {
        return Err(WireError::UnexpectedFrame(flags));
    }
    Ok(TransmissionEnvelope::decode(&payload)?)
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u64),
    #[error("truncated frame: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("unexpected frame kind: {0:?}")]
    UnexpectedFrame(FrameFlags),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error(transparent)]
    Codec(#[from] ProtocolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
