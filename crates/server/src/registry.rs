//! Connection registry.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientId};

/// All live connections, keyed by id.
///
/// Ids come from a monotonic counter starting at 1, so map order is
/// insertion order and broadcast walks connections oldest first. A
/// departed client's id is never handed out again.
pub struct Registry {
    clients: BTreeMap<ClientId, Client>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Tracks a freshly accepted connection and returns its id.
    pub(crate) fn insert(
        &mut self,
        addr: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> ClientId {
        let id = ClientId::new(self.next_id);
        self.next_id += 1;
        self.clients.insert(id, Client::new(id, addr, writer, cancel));
        id
    }

    pub(crate) fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterates clients in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Snapshot of ids in insertion order.
    ///
    /// Send loops iterate over this instead of the map itself so a
    /// client that fails mid-broadcast can be removed on the spot.
    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
