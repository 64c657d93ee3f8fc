//! Wires the chat application to the server loop.

use wavesock_server::{Server, ServerConfig};

use crate::chat::ChatServer;
use crate::config::ChatConfig;

/// Runs the chat server until ctrl-c.
pub async fn run(config: ChatConfig) -> anyhow::Result<()> {
    let server_config = ServerConfig {
        host: config.host.clone(),
        port: config.port,
        buffer_size: config.buffer_size,
        ..ServerConfig::default()
    };

    let mut server = Server::new(server_config, ChatServer::new(&config));
    let addr = server.bind().await?;
    tracing::info!(addr = %addr, "chat server ready");

    let cancel = server.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("SIGINT received, shutting down"),
            Err(err) => tracing::warn!("ctrl-c watcher failed: {err}"),
        }
        cancel.cancel();
    });

    server.run().await?;
    Ok(())
}
