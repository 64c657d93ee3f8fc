//! Message routing.
//!
//! Applications register one async action per `(target, action)` pair;
//! the router decodes incoming envelopes and dispatches to the matching
//! entry. Messages that decode to nothing, or that name an unregistered
//! pair, are dropped without an error reply.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use wavesock_wire::Envelope;

use crate::client::ClientId;
use crate::context::Context;
use crate::error::SendError;

/// Boxed future returned by routed actions.
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A routed action: shared application state plus the request that
/// triggered it. Written as plain functions returning a pinned future:
///
/// ```ignore
/// fn rename<'a>(state: &'a mut ChatState, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
///     Box::pin(async move { /* ... */ })
/// }
/// ```
pub type Action<S> = for<'a, 'r, 'c> fn(&'a mut S, &'a mut Request<'r, 'c>) -> ActionFuture<'a>;

/// One dispatched message: who sent it, its parameters, and the loop
/// context for replying.
pub struct Request<'r, 'c> {
    ctx: &'r mut Context<'c>,
    sender: ClientId,
    params: Map<String, Value>,
}

impl<'r, 'c> Request<'r, 'c> {
    /// The client this message came from.
    pub fn sender(&self) -> ClientId {
        self.sender
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// String parameter, `None` when absent or not a string.
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Direct access to the loop context for anything the shorthand
    /// methods below do not cover.
    pub fn context(&mut self) -> &mut Context<'c> {
        self.ctx
    }

    /// Sends an envelope back to the requesting client.
    pub async fn reply(
        &mut self,
        target: &str,
        action: &str,
        params: Value,
    ) -> Result<(), SendError> {
        let text = Envelope::from_parts(target, action, params).encode();
        let sender = self.sender;
        self.ctx.send(sender, &text).await
    }

    /// Sends an envelope to every open client.
    pub async fn broadcast(&mut self, target: &str, action: &str, params: Value) {
        let text = Envelope::from_parts(target, action, params).encode();
        self.ctx.broadcast(&text).await;
    }

    /// Sends an envelope to every open client except the requester.
    pub async fn broadcast_excluding_sender(&mut self, target: &str, action: &str, params: Value) {
        let text = Envelope::from_parts(target, action, params).encode();
        self.ctx.broadcast_excluding_sender(&text).await;
    }
}

/// Dispatch table from `(target, action)` pairs to actions.
pub struct Router<S> {
    routes: HashMap<(String, String), Action<S>>,
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Registers an action for a `(target, action)` pair, replacing any
    /// previous registration. Lookup is exact and case-sensitive.
    pub fn on(&mut self, target: &str, action: &str, handler: Action<S>) {
        self.routes
            .insert((target.to_string(), action.to_string()), handler);
    }

    /// Decodes a raw text message and runs the matching action.
    ///
    /// Malformed messages and unrouted pairs are logged at debug level
    /// and dropped; the sender never hears about them.
    pub async fn dispatch(
        &self,
        state: &mut S,
        ctx: &mut Context<'_>,
        sender: ClientId,
        raw: &str,
    ) {
        let envelope = match Envelope::decode(raw) {
            Some(envelope) => envelope,
            None => {
                tracing::debug!(client = %sender, "dropping malformed message");
                return;
            }
        };

        let key = (envelope.target, envelope.action);
        let action = match self.routes.get(&key) {
            Some(action) => action,
            None => {
                tracing::debug!(
                    client = %sender,
                    target = %key.0,
                    action = %key.1,
                    "no action registered"
                );
                return;
            }
        };

        let mut request = Request {
            ctx,
            sender,
            params: envelope.params,
        };
        action(state, &mut request).await;
    }
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    use crate::client::ClientState;
    use crate::registry::Registry;

    struct Call {
        label: &'static str,
        sender: ClientId,
        params: Map<String, Value>,
    }

    #[derive(Default)]
    struct Recorded {
        calls: Vec<Call>,
    }

    fn record_a<'a>(state: &'a mut Recorded, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
        Box::pin(async move {
            state.calls.push(Call {
                label: "a",
                sender: req.sender(),
                params: req.params().clone(),
            });
        })
    }

    fn record_b<'a>(state: &'a mut Recorded, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
        Box::pin(async move {
            state.calls.push(Call {
                label: "b",
                sender: req.sender(),
                params: req.params().clone(),
            });
        })
    }

    fn pong<'a>(_state: &'a mut Recorded, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
        Box::pin(async move {
            let _ = req.reply("game", "pong", json!({"ok": true})).await;
        })
    }

    async fn dispatch_to(
        router: &Router<Recorded>,
        state: &mut Recorded,
        registry: &mut Registry,
        sender: ClientId,
        raw: &str,
    ) {
        let mut departed = Vec::new();
        let mut ctx = Context {
            registry,
            departed: &mut departed,
            buffer_size: 4096,
            sender: Some(sender),
        };
        router.dispatch(state, &mut ctx, sender, raw).await;
    }

    #[tokio::test]
    async fn dispatches_to_the_matching_action() {
        let mut router = Router::new();
        router.on("user", "rename", record_a);
        let mut state = Recorded::default();
        let mut registry = Registry::new();

        let sender = ClientId::new(9);
        dispatch_to(
            &router,
            &mut state,
            &mut registry,
            sender,
            r#"["user","rename",{"name":"Capy"}]"#,
        )
        .await;

        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.calls[0].sender, sender);
        assert_eq!(state.calls[0].params.get("name"), Some(&json!("Capy")));
    }

    #[tokio::test]
    async fn two_element_message_dispatches_with_empty_params() {
        let mut router = Router::new();
        router.on("user", "setup", record_a);
        let mut state = Recorded::default();
        let mut registry = Registry::new();

        dispatch_to(
            &router,
            &mut state,
            &mut registry,
            ClientId::new(1),
            r#"["user","setup"]"#,
        )
        .await;

        assert_eq!(state.calls.len(), 1);
        assert!(state.calls[0].params.is_empty());
    }

    #[tokio::test]
    async fn unrouted_and_malformed_messages_are_dropped() {
        let mut router = Router::new();
        router.on("user", "rename", record_a);
        let mut state = Recorded::default();
        let mut registry = Registry::new();
        let sender = ClientId::new(1);

        for raw in [
            r#"["chat","rename"]"#,
            r#"["user","other"]"#,
            r#"["User","rename"]"#,
            r#"["user","Rename"]"#,
            "not json",
            r#"["user"]"#,
            r#"["user","rename",7]"#,
        ] {
            dispatch_to(&router, &mut state, &mut registry, sender, raw).await;
        }

        assert!(state.calls.is_empty());
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier() {
        let mut router = Router::new();
        router.on("user", "setup", record_a);
        router.on("user", "setup", record_b);
        let mut state = Recorded::default();
        let mut registry = Registry::new();

        dispatch_to(
            &router,
            &mut state,
            &mut registry,
            ClientId::new(1),
            r#"["user","setup"]"#,
        )
        .await;

        assert_eq!(state.calls.len(), 1);
        assert_eq!(state.calls[0].label, "b");
    }

    #[tokio::test]
    async fn reply_reaches_the_sender_as_a_text_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (mut peer, _) = accepted.unwrap();
        let (_read, write) = connected.unwrap().into_split();

        let mut registry = Registry::new();
        let sender = registry.insert(addr, write, CancellationToken::new());
        registry
            .get_mut(sender)
            .unwrap()
            .set_state(ClientState::Open);

        let mut router = Router::new();
        router.on("game", "ping", pong);
        let mut state = Recorded::default();
        dispatch_to(
            &router,
            &mut state,
            &mut registry,
            sender,
            r#"["game","ping"]"#,
        )
        .await;

        let mut buf = [0u8; 256];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(buf[0], 0x81);
        let len = buf[1] as usize;
        assert_eq!(n, 2 + len);
        let text = std::str::from_utf8(&buf[2..n]).unwrap();
        assert_eq!(text, r#"["game","pong",{"ok":true}]"#);
    }
}
