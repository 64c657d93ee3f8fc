//! Server event loop.
//!
//! One task owns everything: listener, registry, handler and router
//! state. Per-connection read tasks forward whatever they read over a
//! bounded channel, and the loop applies those events one at a time, so
//! callbacks run with full mutable access to the registry and never
//! concurrently with each other.
//!
//! Each received buffer is treated as one complete frame; fragmented
//! inbound messages are not reassembled.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wavesock_wire::{decode_frame, upgrade_response};

use crate::client::{Client, ClientId, ClientState};
use crate::context::{Context, detach};
use crate::error::ServerError;
use crate::handler::Handler;
use crate::registry::Registry;
use crate::{DEFAULT_BACKLOG, DEFAULT_BUFFER_SIZE, EVENT_CHANNEL_CAPACITY};

/// Listener and buffer settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or address to bind.
    pub host: String,
    /// Port to bind; 0 asks the OS for a free one.
    pub port: u16,
    /// Listen backlog handed to the OS.
    pub backlog: u32,
    /// Receive buffer size. Outbound messages are chunked to this many
    /// payload bytes per frame.
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            backlog: DEFAULT_BACKLOG,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// What read tasks report back to the loop.
enum Event {
    Data(ClientId, Vec<u8>),
    Closed(ClientId),
    ReadError(ClientId, io::Error),
}

/// The WebSocket server.
///
/// Owns the listener, the connection registry and the application
/// [`Handler`]. Create it, optionally [`bind`](Self::bind) to learn the
/// port, then drive it with [`run`](Self::run) until the cancellation
/// token fires.
pub struct Server<H: Handler> {
    config: ServerConfig,
    handler: H,
    registry: Registry,
    departed: Vec<Client>,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

impl<H: Handler> Server<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            handler,
            registry: Registry::new(),
            departed: Vec::new(),
            listener: None,
            local_addr: None,
            cancel: CancellationToken::new(),
            events_tx,
            events_rx,
        }
    }

    /// Token that stops the loop when cancelled. Clone it into whatever
    /// watches for shutdown signals.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The bound address, once a listener exists.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the listener without accepting anything yet.
    pub async fn bind(&mut self) -> Result<SocketAddr, ServerError> {
        let (listener, addr) = self.bind_listener().await?;
        self.listener = Some(listener);
        Ok(addr)
    }

    async fn bind_listener(&mut self) -> Result<(TcpListener, SocketAddr), ServerError> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let addr = lookup_host(&target)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ServerError::Resolve(target))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .map_err(|source| ServerError::Bind { addr, source })?;
        let listener = socket.listen(self.config.backlog)?;

        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "listening");
        self.local_addr = Some(local);
        Ok((listener, local))
    }

    /// Accepts connections and applies read-task events until the
    /// cancellation token fires, then disconnects every client and
    /// returns.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => self.bind_listener().await?.0,
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("shutting down");
                    self.disconnect_all().await;
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept_connection(stream, peer).await,
                    Err(err) => tracing::warn!("accept failed: {err}"),
                },
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    // The loop keeps its own sender alive.
                    None => return Err(ServerError::EventChannelClosed),
                },
            }
        }
    }

    async fn accept_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        let (read_half, write_half) = stream.into_split();
        let conn_cancel = self.cancel.child_token();
        let id = self.registry.insert(peer, write_half, conn_cancel.clone());
        tracing::debug!(client = %id, peer = %peer, "connection accepted");

        spawn_read_task(
            id,
            read_half,
            self.events_tx.clone(),
            conn_cancel,
            self.config.buffer_size,
        );

        // Read-task events queue behind this callback: the handler sees
        // every connection before its handshake can complete.
        let mut ctx = Context {
            registry: &mut self.registry,
            departed: &mut self.departed,
            buffer_size: self.config.buffer_size,
            sender: Some(id),
        };
        self.handler.on_client_connected(&mut ctx, id).await;
        self.drain_departed().await;
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Data(id, bytes) => self.handle_data(id, bytes).await,
            Event::Closed(id) => {
                tracing::debug!(client = %id, "connection closed by peer");
                self.remove_client(id);
            }
            Event::ReadError(id, err) => {
                tracing::warn!(client = %id, "read failed: {err}");
                self.remove_client(id);
            }
        }
        self.drain_departed().await;
    }

    async fn handle_data(&mut self, id: ClientId, bytes: Vec<u8>) {
        let state = match self.registry.get_mut(id) {
            Some(client) => {
                client.touch_receive();
                client.state()
            }
            None => return,
        };

        match state {
            ClientState::Connecting => self.complete_handshake(id, &bytes).await,
            ClientState::Open => match decode_frame(&bytes) {
                Ok(payload) => {
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    let mut ctx = Context {
                        registry: &mut self.registry,
                        departed: &mut self.departed,
                        buffer_size: self.config.buffer_size,
                        sender: Some(id),
                    };
                    self.handler.on_message_received(&mut ctx, id, &text).await;
                }
                Err(err) => {
                    tracing::warn!(client = %id, "undecodable frame: {err}");
                    self.remove_client(id);
                }
            },
            // Closed clients are out of the registry already.
            ClientState::Closed => {}
        }
    }

    async fn complete_handshake(&mut self, id: ClientId, bytes: &[u8]) {
        let request = String::from_utf8_lossy(bytes);
        let response = match upgrade_response(&request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(client = %id, "handshake rejected: {err}");
                self.remove_client(id);
                return;
            }
        };

        let written = match self.registry.get_mut(id) {
            Some(client) => client.write_raw(response.as_bytes()).await,
            None => return,
        };
        match written {
            Ok(()) => {
                if let Some(client) = self.registry.get_mut(id) {
                    client.set_state(ClientState::Open);
                    tracing::debug!(client = %id, "handshake complete");
                }
            }
            Err(err) => {
                tracing::warn!(client = %id, "handshake send failed: {err}");
                self.remove_client(id);
            }
        }
    }

    fn remove_client(&mut self, id: ClientId) {
        detach(&mut self.registry, &mut self.departed, id);
    }

    /// Runs the disconnected callback for every queued departure, one
    /// at a time. A callback may disconnect further clients; those are
    /// picked up in the same pass.
    async fn drain_departed(&mut self) {
        while !self.departed.is_empty() {
            for mut client in std::mem::take(&mut self.departed) {
                let mut ctx = Context {
                    registry: &mut self.registry,
                    departed: &mut self.departed,
                    buffer_size: self.config.buffer_size,
                    sender: Some(client.id()),
                };
                self.handler.on_client_disconnected(&mut ctx, &client).await;
                client.set_state(ClientState::Closed);
                tracing::debug!(client = %client.id(), "disconnected");
            }
        }
    }

    async fn disconnect_all(&mut self) {
        for id in self.registry.ids() {
            detach(&mut self.registry, &mut self.departed, id);
        }
        self.drain_departed().await;
    }
}

/// Reads from one connection until EOF, error or cancellation, and
/// reports everything to the loop.
fn spawn_read_task(
    id: ClientId,
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    buffer_size: usize,
) {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; buffer_size.max(1)];
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                read = reader.read(&mut buffer) => match read {
                    Ok(0) => Event::Closed(id),
                    Ok(n) => Event::Data(id, buffer[..n].to_vec()),
                    Err(err) => Event::ReadError(id, err),
                },
            };
            let terminal = !matches!(event, Event::Data(..));
            if events.send(event).await.is_err() || terminal {
                break;
            }
        }
    });
}
