//! Opening handshake.
//!
//! Parses the client's HTTP upgrade request and produces the
//! `101 Switching Protocols` response that promotes the TCP connection to
//! the WebSocket protocol. The accept key is the base64-encoded SHA-1 of
//! the client's `Sec-WebSocket-Key` concatenated with the protocol GUID.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

/// Fixed GUID appended to the client key, from RFC6455.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Errors from handshake processing.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("upgrade request carries no Sec-WebSocket-Key header")]
    MissingKey,
}

/// Parses a raw HTTP request into a header map.
///
/// Lines without a `:` separator (the request line included) are
/// skipped. Names are trimmed and lowercased so lookups are
/// case-insensitive; values are trimmed of surrounding whitespace.
pub fn parse_headers(request: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in request.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    headers
}

/// Computes the `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WS_GUID.as_bytes());
    STANDARD.encode(sha1.finalize())
}

/// Builds the complete upgrade response for a client request.
///
/// The response is byte-exact:
///
/// ```text
/// HTTP/1.1 101 Switching Protocols\r\n
/// Upgrade: websocket\r\n
/// Connection: Upgrade\r\n
/// Sec-WebSocket-Accept: <accept>\r\n
/// \r\n
/// ```
pub fn upgrade_response(request: &str) -> Result<String, HandshakeError> {
    let headers = parse_headers(request);
    let key = headers
        .get("sec-websocket-key")
        .ok_or(HandshakeError::MissingKey)?;
    let accept = accept_key(key);

    Ok(format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    ))
}
