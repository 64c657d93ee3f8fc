//! WebSocket server core.
//!
//! A from-scratch WebSocket server on raw TCP sockets: the accept loop,
//! the opening handshake, per-connection lifecycle state, and the
//! `[target, action, params]` dispatch protocol. Applications implement
//! [`Handler`] for lifecycle callbacks and register [`Router`] actions
//! for decoded messages; both call back into the event loop through
//! [`Context`] to send, broadcast, or disconnect.
//!
//! All byte-level work (framing, handshake, envelope) lives in
//! `wavesock-wire`.

mod client;
mod context;
mod error;
mod handler;
mod registry;
mod router;
mod server;

pub use client::{Client, ClientId, ClientState};
pub use context::Context;
pub use error::{SendError, ServerError};
pub use handler::{Handler, HandlerFuture};
pub use registry::Registry;
pub use router::{Action, ActionFuture, Request, Router};
pub use server::{Server, ServerConfig};

/// Default receive buffer size and frame payload chunk size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default accept backlog for the listening socket.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Capacity of the connection-event channel feeding the loop.
///
/// Read tasks block on a full channel, so this only bounds how far any
/// connection can run ahead of the loop, not correctness.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
