//! WebSocket frame codec.
//!
//! Pure byte-level encoding and decoding of RFC6455 base frames; no I/O,
//! no connection state. The server feeds received buffers in and writes
//! the produced frames out.
//!
//! # Wire format
//!
//! ```text
//! [1 byte : FIN(1) RSV(3) OPCODE(4)]
//! [1 byte : MASK(1) LEN(7)]
//!   LEN <= 125 -> literal payload length
//!   LEN == 126 -> [2 bytes BE: payload length]
//!   LEN == 127 -> [8 bytes BE: payload length, high 32 bits zero]
//! [4 bytes : mask key]        client->server frames only
//! [payload : XOR-masked with the key when one is present]
//! ```
//!
//! Inbound frames are taken to be masked (clients must mask); outbound
//! frames never are. One buffer is treated as one complete frame:
//! fragmented inbound messages are not reassembled.

/// Largest payload length the 7-bit field carries literally.
const LEN_LITERAL_MAX: usize = 125;

/// Length-field selector for the 16-bit extended form.
const LEN_EXTENDED_16: u8 = 126;

/// Length-field selector for the 64-bit extended form.
const LEN_EXTENDED_64: u8 = 127;

/// FIN flag in the first header byte.
const FIN_BIT: u8 = 0x80;

/// Frame opcodes this codec produces.
///
/// Every outbound message starts with a [`Opcode::Text`] frame; chunked
/// messages continue with [`Opcode::Continuation`] frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
}

impl Opcode {
    /// Looks up an opcode from the low nibble of a header byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            _ => None,
        }
    }
}

/// Errors from the frame codec.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {len} bytes is shorter than its own header")]
    Truncated { len: usize },
}

/// XOR-masks (or unmasks) a payload in place with a 4-byte key.
///
/// Masking is its own inverse: applying the same key twice restores the
/// original bytes.
pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Decodes a single masked client frame, returning the unmasked payload.
///
/// The 7-bit length field only selects the header layout; the payload is
/// whatever the buffer holds past the mask key. A buffer too short to
/// contain its own header layout is an error.
pub fn decode_frame(raw: &[u8]) -> Result<Vec<u8>, FrameError> {
    if raw.len() < 2 {
        return Err(FrameError::Truncated { len: raw.len() });
    }

    let mask_offset = match raw[1] & 0x7f {
        LEN_EXTENDED_16 => 4,
        LEN_EXTENDED_64 => 10,
        _ => 2,
    };
    let payload_offset = mask_offset + 4;
    if raw.len() < payload_offset {
        return Err(FrameError::Truncated { len: raw.len() });
    }

    let mut mask = [0u8; 4];
    mask.copy_from_slice(&raw[mask_offset..payload_offset]);

    let mut payload = raw[payload_offset..].to_vec();
    apply_mask(&mut payload, mask);
    Ok(payload)
}

/// Builds one unmasked frame around a payload chunk.
pub fn encode_frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 10);

    let mut head = opcode as u8;
    if fin {
        head |= FIN_BIT;
    }
    frame.push(head);

    match payload.len() {
        len if len <= LEN_LITERAL_MAX => frame.push(len as u8),
        len if len <= u16::MAX as usize => {
            frame.push(LEN_EXTENDED_16);
            frame.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            // High half left zero: chunk sizes stay far below 4 GiB.
            frame.push(LEN_EXTENDED_64);
            frame.extend_from_slice(&[0, 0, 0, 0]);
            frame.extend_from_slice(&(len as u32).to_be_bytes());
        }
    }

    frame.extend_from_slice(payload);
    frame
}

/// Splits a payload into frames of at most `buffer_size` payload bytes.
///
/// The first frame carries [`Opcode::Text`], the rest
/// [`Opcode::Continuation`]; only the last has FIN set. A zero-length
/// payload still produces one empty final text frame.
pub fn encode_frames(payload: &[u8], buffer_size: usize) -> Vec<Vec<u8>> {
    let buffer_size = buffer_size.max(1);
    let count = payload.len().div_ceil(buffer_size).max(1);

    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * buffer_size;
        let end = (start + buffer_size).min(payload.len());
        let opcode = if i == 0 {
            Opcode::Text
        } else {
            Opcode::Continuation
        };
        frames.push(encode_frame(i == count - 1, opcode, &payload[start..end]));
    }
    frames
}
