//! Loop context handed to callbacks and actions.

use wavesock_wire::encode_frames;

use crate::client::{Client, ClientId, ClientState};
use crate::error::SendError;
use crate::registry::Registry;

/// Borrowed view over the server loop's state, valid for one callback.
///
/// All sending and registry access goes through here. Disconnecting a
/// client detaches it immediately, but its disconnected callback runs
/// only after the current callback returns, so handlers never re-enter
/// themselves.
pub struct Context<'s> {
    pub(crate) registry: &'s mut Registry,
    pub(crate) departed: &'s mut Vec<Client>,
    pub(crate) buffer_size: usize,
    pub(crate) sender: Option<ClientId>,
}

impl Context<'_> {
    /// The client whose activity triggered the current callback, if any.
    pub fn sender(&self) -> Option<ClientId> {
        self.sender
    }

    /// Iterates live clients in connection order.
    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.registry.iter()
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.registry.get(id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.registry.get_mut(id)
    }

    /// Sends a text payload to one client, chunked to the configured
    /// buffer size.
    pub async fn send(&mut self, id: ClientId, text: &str) -> Result<(), SendError> {
        let frames = encode_frames(text.as_bytes(), self.buffer_size);
        self.write_to(id, &frames).await
    }

    /// Sends a text payload to every open client, oldest connection
    /// first. Clients still in their handshake are skipped; a client
    /// that fails mid-broadcast is disconnected and the walk continues.
    pub async fn broadcast(&mut self, text: &str) {
        self.broadcast_except(text, None).await;
    }

    /// Like [`broadcast`](Self::broadcast), but skips the client that
    /// triggered the current callback.
    pub async fn broadcast_excluding_sender(&mut self, text: &str) {
        self.broadcast_except(text, self.sender).await;
    }

    async fn broadcast_except(&mut self, text: &str, skip: Option<ClientId>) {
        let frames = encode_frames(text.as_bytes(), self.buffer_size);
        for id in self.registry.ids() {
            if skip == Some(id) {
                continue;
            }
            match self.registry.get(id) {
                Some(client) if client.state() == ClientState::Open => {}
                _ => continue,
            }
            let _ = self.write_to(id, &frames).await;
        }
    }

    async fn write_to(&mut self, id: ClientId, frames: &[Vec<u8>]) -> Result<(), SendError> {
        let client = match self.registry.get_mut(id) {
            Some(client) => client,
            None => return Err(SendError::UnknownClient(id)),
        };
        match client.write_frames(frames).await {
            Ok(()) => Ok(()),
            Err(source) => {
                tracing::warn!(client = %id, "send failed, disconnecting: {source}");
                self.disconnect(id);
                Err(SendError::Io { id, source })
            }
        }
    }

    /// Detaches a client from the registry. Safe to call for an id that
    /// has already left. The disconnected callback fires once the
    /// current callback returns.
    pub fn disconnect(&mut self, id: ClientId) {
        detach(self.registry, self.departed, id);
    }
}

/// Removes a client, stops its read task and queues it for the
/// disconnected callback.
pub(crate) fn detach(registry: &mut Registry, departed: &mut Vec<Client>, id: ClientId) {
    if let Some(mut client) = registry.remove(id) {
        client.stop();
        departed.push(client);
    }
}
