//! The chat application: lifecycle handler, routed actions and state.

use serde_json::json;
use wavesock_server::{Client, ClientId, Context, Handler, HandlerFuture, Router};
use wavesock_wire::Envelope;

use crate::actions;
use crate::config::ChatConfig;
use crate::history::History;
use crate::names;

/// Shared state threaded through routed actions.
pub struct ChatState {
    pub history: History,
}

/// Chat server behavior on top of the wavesock event loop.
///
/// Fresh connections get a random display name and are announced to the
/// room; decoded messages go through the router to the actions in
/// [`crate::actions`].
pub struct ChatServer {
    router: Router<ChatState>,
    state: ChatState,
}

impl ChatServer {
    pub fn new(config: &ChatConfig) -> Self {
        let mut router = Router::new();
        router.on("user", "setup", actions::setup);
        router.on("user", "rename", actions::rename);
        router.on("message", "submit", actions::submit);
        router.on("command", "run", actions::run_command);

        Self {
            router,
            state: ChatState {
                history: History::new(config.history_limit),
            },
        }
    }
}

impl Handler for ChatServer {
    fn on_client_connected<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        id: ClientId,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let name = names::full_name();
            if let Some(client) = ctx.client_mut(id) {
                client.set("name", json!(name.clone()));
            }
            tracing::info!(client = %id, name = %name, "user joined");

            let notice = Envelope::from_parts(
                "user",
                "connected",
                json!({ "id": id.value(), "name": name }),
            )
            .encode();
            ctx.broadcast_excluding_sender(&notice).await;
        })
    }

    fn on_client_disconnected<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        client: &'a Client,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let name = display_name(client);
            tracing::info!(client = %client.id(), name = %name, "user left");

            let notice = Envelope::from_parts(
                "user",
                "disconnected",
                json!({ "id": client.id().value(), "name": name }),
            )
            .encode();
            ctx.broadcast_excluding_sender(&notice).await;
        })
    }

    fn on_message_received<'a>(
        &'a mut self,
        ctx: &'a mut Context<'_>,
        id: ClientId,
        text: &'a str,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.router.dispatch(&mut self.state, ctx, id, text).await;
        })
    }
}

/// A client's display name, or a placeholder when none was assigned.
pub fn display_name(client: &Client) -> String {
    client
        .get("name")
        .and_then(|value| value.as_str())
        .unwrap_or("Anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::Value;
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_util::sync::CancellationToken;
    use wavesock_server::{Server, ServerConfig, ServerError};

    type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

    struct ChatHarness {
        addr: SocketAddr,
        cancel: CancellationToken,
        handle: JoinHandle<Result<(), ServerError>>,
    }

    impl ChatHarness {
        async fn shutdown(self) {
            self.cancel.cancel();
            self.handle.await.unwrap().unwrap();
        }
    }

    async fn start_chat() -> ChatHarness {
        let chat_config = ChatConfig::default();
        let server_config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let mut server = Server::new(server_config, ChatServer::new(&chat_config));
        let addr = server.bind().await.unwrap();
        let cancel = server.cancel_token();
        let handle = tokio::spawn(async move { server.run().await });
        ChatHarness {
            addr,
            cancel,
            handle,
        }
    }

    async fn connect(addr: SocketAddr) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client failed to connect");
        ws
    }

    async fn next_envelope(ws: &mut Ws) -> Envelope {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for an envelope")
            .expect("stream ended")
            .expect("stream errored");
        let text = message.into_text().expect("expected a text frame");
        Envelope::decode(text.as_str()).expect("expected a well-formed envelope")
    }

    async fn send_raw(ws: &mut Ws, text: &str) {
        ws.send(Message::text(text)).await.expect("send failed");
    }

    #[tokio::test]
    async fn setup_returns_welcome_roster_and_history() {
        let harness = start_chat().await;
        let mut ws = connect(harness.addr).await;
        send_raw(&mut ws, r#"["user","setup"]"#).await;

        let welcome = next_envelope(&mut ws).await;
        assert_eq!(
            (welcome.target.as_str(), welcome.action.as_str()),
            ("user", "welcome")
        );
        assert_eq!(welcome.params.get("id"), Some(&Value::from(1)));
        let name = welcome.params.get("name").and_then(Value::as_str).unwrap();
        assert!(!name.is_empty());

        let roster = next_envelope(&mut ws).await;
        assert_eq!(roster.action, "load-user-list");
        assert_eq!(roster.params.get("users"), Some(&Value::Array(vec![])));

        let history = next_envelope(&mut ws).await;
        assert_eq!(
            (history.target.as_str(), history.action.as_str()),
            ("message", "load-history")
        );
        assert_eq!(history.params.get("messages"), Some(&Value::Array(vec![])));

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn messages_renames_and_roster_flow_between_clients() {
        let harness = start_chat().await;

        let mut alice = connect(harness.addr).await;
        // Rename first so later assertions are deterministic.
        send_raw(&mut alice, r#"["command","run",{"message":"/nick Capy"}]"#).await;
        let renamed = next_envelope(&mut alice).await;
        assert_eq!(
            (renamed.target.as_str(), renamed.action.as_str()),
            ("user", "renamed")
        );
        assert_eq!(renamed.params.get("id"), Some(&Value::from(1)));
        assert_eq!(renamed.params.get("name"), Some(&Value::from("Capy")));

        send_raw(
            &mut alice,
            r#"["message","submit",{"message":"hello there"}]"#,
        )
        .await;
        let added = next_envelope(&mut alice).await;
        assert_eq!(
            (added.target.as_str(), added.action.as_str()),
            ("message", "add")
        );
        assert_eq!(added.params.get("author"), Some(&Value::from("Capy")));
        assert_eq!(added.params.get("text"), Some(&Value::from("hello there")));
        assert!(added.params.get("datetime").and_then(Value::as_str).is_some());

        let mut bob = connect(harness.addr).await;
        let joined = next_envelope(&mut alice).await;
        assert_eq!(
            (joined.target.as_str(), joined.action.as_str()),
            ("user", "connected")
        );
        assert_eq!(joined.params.get("id"), Some(&Value::from(2)));

        send_raw(&mut bob, r#"["user","setup"]"#).await;
        let welcome = next_envelope(&mut bob).await;
        assert_eq!(welcome.params.get("id"), Some(&Value::from(2)));

        let roster = next_envelope(&mut bob).await;
        let users = roster.params.get("users").and_then(Value::as_array).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].get("id"), Some(&Value::from(1)));
        assert_eq!(users[0].get("name"), Some(&Value::from("Capy")));

        let history = next_envelope(&mut bob).await;
        let messages = history
            .params
            .get("messages")
            .and_then(Value::as_array)
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("author"), Some(&Value::from("Capy")));
        assert_eq!(messages[0].get("text"), Some(&Value::from("hello there")));

        drop(bob);
        let left = next_envelope(&mut alice).await;
        assert_eq!(
            (left.target.as_str(), left.action.as_str()),
            ("user", "disconnected")
        );
        assert_eq!(left.params.get("id"), Some(&Value::from(2)));

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_commands_alert_only_the_sender() {
        let harness = start_chat().await;
        let mut alice = connect(harness.addr).await;
        let mut bob = connect(harness.addr).await;
        let joined = next_envelope(&mut alice).await;
        assert_eq!(joined.action, "connected");

        send_raw(&mut alice, r#"["command","run",{"message":"/dance"}]"#).await;
        let alert = next_envelope(&mut alice).await;
        assert_eq!(
            (alert.target.as_str(), alert.action.as_str()),
            ("user", "alert-unknown-command")
        );
        assert_eq!(alert.params.get("command"), Some(&Value::from("dance")));

        let silence = timeout(Duration::from_millis(200), bob.next()).await;
        assert!(silence.is_err(), "bystanders should hear nothing");

        harness.shutdown().await;
    }
}
