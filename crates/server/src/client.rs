//! Per-connection state.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::sync::CancellationToken;

/// Connection identifier.
///
/// Assigned at acceptance from a monotonic counter, unique for the
/// process lifetime, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw integer value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection lifecycle.
///
/// `Connecting` until the handshake response has been sent, `Open`
/// afterwards, `Closed` once the client has left the registry. A client
/// dropped before its handshake goes straight from `Connecting` to
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Open,
    Closed,
}

/// One tracked connection.
///
/// Owned by the registry. Handlers see borrows through the loop context
/// and must not hold on to them across calls; the disconnected callback
/// gets the last look at a detached entity before it is dropped.
pub struct Client {
    id: ClientId,
    state: ClientState,
    addr: SocketAddr,
    writer: OwnedWriteHalf,
    cancel: CancellationToken,
    last_receive: Option<Instant>,
    last_send: Option<Instant>,
    data: HashMap<String, Value>,
}

impl Client {
    pub(crate) fn new(
        id: ClientId,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            state: ClientState::Connecting,
            addr,
            writer,
            cancel,
            last_receive: None,
            last_send: None,
            data: HashMap::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Remote peer address captured at acceptance.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// When the last successful read from this connection happened.
    pub fn last_receive(&self) -> Option<Instant> {
        self.last_receive
    }

    /// When the last successful write to this connection happened.
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// Looks up application data attached to this connection.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Attaches application data to this connection.
    ///
    /// The store is an open-ended string-to-JSON map so applications can
    /// hang state (a display name, say) off a connection without
    /// extending the type.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub(crate) fn set_state(&mut self, state: ClientState) {
        self.state = state;
    }

    pub(crate) fn touch_receive(&mut self) {
        self.last_receive = Some(Instant::now());
    }

    /// Writes pre-encoded frames in order, advancing past partial writes
    /// until everything is flushed or the write fails.
    pub(crate) async fn write_frames(&mut self, frames: &[Vec<u8>]) -> io::Result<()> {
        for frame in frames {
            self.writer.write_all(frame).await?;
        }
        self.last_send = Some(Instant::now());
        Ok(())
    }

    /// Writes raw bytes (the handshake response takes this path).
    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await
    }

    /// Stops the connection's read task; the socket closes when the
    /// entity is dropped.
    pub(crate) fn stop(&mut self) {
        self.cancel.cancel();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
