//! Wire protocol for the wavesock server.
//!
//! Everything byte-level lives here, free of I/O and connection state:
//! the RFC6455 base frame codec, the opening handshake, and the
//! `[target, action, params]` application envelope carried in text
//! frames.

pub mod envelope;
pub mod frame;
pub mod handshake;

pub use envelope::Envelope;
pub use frame::{FrameError, Opcode, apply_mask, decode_frame, encode_frame, encode_frames};
pub use handshake::{HandshakeError, accept_key, parse_headers, upgrade_response};
