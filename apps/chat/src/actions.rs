//! Routed chat actions.

use serde_json::json;
use wavesock_server::{ActionFuture, Request};

use crate::chat::{ChatState, display_name};
use crate::history::HistoryEntry;

/// `["user","setup"]`: welcome the sender, then send the roster and the
/// message history.
pub fn setup<'a>(state: &'a mut ChatState, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
    Box::pin(async move {
        let sender = req.sender();
        let own_name = req
            .context()
            .client(sender)
            .map(display_name)
            .unwrap_or_else(|| "Anonymous".to_string());
        let _ = req
            .reply(
                "user",
                "welcome",
                json!({ "id": sender.value(), "name": own_name }),
            )
            .await;

        let users: Vec<_> = req
            .context()
            .clients()
            .filter(|client| client.id() != sender)
            .map(|client| json!({ "id": client.id().value(), "name": display_name(client) }))
            .collect();
        let _ = req
            .reply("user", "load-user-list", json!({ "users": users }))
            .await;

        let messages: Vec<&HistoryEntry> = state.history.iter().collect();
        let _ = req
            .reply("message", "load-history", json!({ "messages": messages }))
            .await;
    })
}

/// `["user","rename",{"name"}]`: rename the sender and tell everyone.
pub fn rename<'a>(_state: &'a mut ChatState, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
    Box::pin(async move {
        let Some(name) = req.param_str("name").map(str::trim) else {
            return;
        };
        if name.is_empty() {
            return;
        }
        let name = name.to_string();
        rename_sender(req, &name).await;
    })
}

/// `["message","submit",{"message"}]`: record the message and broadcast
/// it to everyone, sender included.
pub fn submit<'a>(state: &'a mut ChatState, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
    Box::pin(async move {
        let Some(text) = req.param_str("message") else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let text = text.to_string();

        let sender = req.sender();
        let author = req
            .context()
            .client(sender)
            .map(display_name)
            .unwrap_or_else(|| "Anonymous".to_string());

        let entry = state.history.add(author, text);
        req.broadcast("message", "add", json!(entry)).await;
    })
}

/// `["command","run",{"message"}]`: parse a `/command` message typed
/// into the chat box.
pub fn run_command<'a>(_state: &'a mut ChatState, req: &'a mut Request<'_, '_>) -> ActionFuture<'a> {
    Box::pin(async move {
        let Some(raw) = req.param_str("message") else {
            return;
        };
        match parse_command(raw) {
            Some(Command::Nick(name)) => rename_sender(req, &name).await,
            Some(Command::Unknown(command)) => {
                let _ = req
                    .reply("user", "alert-unknown-command", json!({ "command": command }))
                    .await;
            }
            None => {}
        }
    })
}

async fn rename_sender(req: &mut Request<'_, '_>, name: &str) {
    let sender = req.sender();
    if let Some(client) = req.context().client_mut(sender) {
        client.set("name", json!(name));
    }
    tracing::info!(client = %sender, name = %name, "user renamed");
    req.broadcast("user", "renamed", json!({ "id": sender.value(), "name": name }))
        .await;
}

/// A parsed slash command.
#[derive(Debug, PartialEq)]
enum Command {
    Nick(String),
    Unknown(String),
}

/// Parses `/command argument` text.
///
/// Returns `None` for anything that asks for nothing: text without a
/// leading slash, a bare `/`, or `/nick` with a blank name. A command
/// without any argument reads as its own name, so a lone `/nick` is an
/// unknown command rather than a blank rename.
fn parse_command(raw: &str) -> Option<Command> {
    let body = raw.strip_prefix('/')?;
    if body.is_empty() {
        return None;
    }
    let Some((command, argument)) = body.split_once(' ') else {
        return Some(Command::Unknown(body.to_string()));
    };
    match command {
        "nick" => {
            let name = argument.trim();
            (!name.is_empty()).then(|| Command::Nick(name.to_string()))
        }
        _ => Some(Command::Unknown(command.to_string())),
    }
}
