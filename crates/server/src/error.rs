//! Error types for the server core.

use std::io;
use std::net::SocketAddr;

use crate::client::ClientId;

/// Errors that abort server startup or the run loop.
///
/// Everything per-connection (accept, receive, send, handshake failures)
/// is logged inside the loop, isolated to that connection, and never
/// surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not resolve listen address {0}")]
    Resolve(String),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("socket setup failed: {0}")]
    Socket(#[from] io::Error),

    #[error("connection event channel closed")]
    EventChannelClosed,
}

/// Errors from sending to a single client.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no client {0} in the registry")]
    UnknownClient(ClientId),

    #[error("write to client {id} failed: {source}")]
    Io { id: ClientId, source: io::Error },
}
