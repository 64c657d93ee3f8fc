//! Application callbacks.

use std::future::Future;
use std::pin::Pin;

use crate::client::{Client, ClientId};
use crate::context::Context;

/// Boxed future returned by handler callbacks.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Application hooks driven by the server loop.
///
/// Every callback receives the loop context, which is the only path to
/// the registry and to sending. Callbacks run on the loop task, one at
/// a time; a slow handler stalls the whole server. All three default to
/// doing nothing.
pub trait Handler: Send + 'static {
    /// Called as soon as a connection is accepted, before its handshake
    /// completes. The client is tracked and addressable but cannot be
    /// written to meaningfully until it reaches `Open`.
    fn on_client_connected<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        id: ClientId,
    ) -> HandlerFuture<'a> {
        let _ = (ctx, id);
        Box::pin(async {})
    }

    /// Called exactly once after a connection leaves the registry. The
    /// entity is already detached; this is the last look at its state
    /// before it is dropped.
    fn on_client_disconnected<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        client: &'a Client,
    ) -> HandlerFuture<'a> {
        let _ = (ctx, client);
        Box::pin(async {})
    }

    /// Called for every decoded text payload from an open connection.
    fn on_message_received<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        id: ClientId,
        text: &'a str,
    ) -> HandlerFuture<'a> {
        let _ = (ctx, id, text);
        Box::pin(async {})
    }
}
