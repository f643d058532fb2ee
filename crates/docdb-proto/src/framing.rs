//! Message framing for the transport layer.
//!
//! Command documents travel over the wire as a 4-byte big-endian length
//! prefix followed by the serialized payload.

use crate::Error;

/// Maximum message size (16 MB). Oversized frames are rejected before
/// any allocation happens.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Frame a payload as `[length (4 bytes BE)][payload]`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::FrameTooLarge {
            size: payload.len(),
            limit: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read the declared payload length from the start of a buffer.
///
/// Fails if the buffer is shorter than the prefix or the declared
/// length exceeds [`MAX_MESSAGE_SIZE`].
pub fn decode_frame_length(buffer: &[u8]) -> Result<usize, Error> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buffer
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::InvalidMessage("buffer shorter than length prefix".to_string()))?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::FrameTooLarge {
            size: len,
            limit: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

/// Borrow the payload of a complete frame.
pub fn extract_payload(frame: &[u8]) -> Result<&[u8], Error> {
    let len = decode_frame_length(frame)?;
    frame
        .get(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len)
        .ok_or_else(|| {
            Error::InvalidMessage(format!(
                "frame truncated: declared {} payload bytes, have {}",
                len,
                frame.len().saturating_sub(LENGTH_PREFIX_SIZE)
            ))
        })
}
