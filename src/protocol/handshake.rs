//! WebSocket upgrade handshake: one-shot validation of the upgrade request
//! and computation of the accept token (RFC 6455 §4.2.2).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};

/// Protocol-defined GUID appended to the client key before hashing.
/// Fixed by RFC 6455; not a secret.
pub const WS_MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Result of inspecting an upgrade request.
///
/// Rejection is a value, not an error: the transport-facing caller is
/// responsible for sending a non-101 response and closing the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Accepted { accept_key: String },
    Rejected,
}

/// Validate the raw request header lines (already split by the caller).
///
/// The request is accepted only if some line contains the
/// `Upgrade: websocket` token and a non-empty `Sec-WebSocket-Key` header
/// is present. Header order is irrelevant; the first key found wins.
pub fn inspect(lines: &[String]) -> HandshakeOutcome {
    let mut upgrade_requested = false;
    let mut websocket_key: Option<&str> = None;

    for line in lines {
        if line.contains("Upgrade: websocket") {
            upgrade_requested = true;
        }
        if websocket_key.is_none()
            && let Some(rest) = line.strip_prefix("Sec-WebSocket-Key:")
        {
            let value = rest.trim();
            if !value.is_empty() {
                websocket_key = Some(value);
            }
        }
    }

    match (upgrade_requested, websocket_key) {
        (true, Some(key)) => HandshakeOutcome::Accepted {
            accept_key: accept_key(key),
        },
        _ => HandshakeOutcome::Rejected,
    }
}

/// Compute `Sec-WebSocket-Accept` = base64(sha1(key + GUID)).
pub fn accept_key(websocket_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(websocket_key.as_bytes());
    hasher.update(WS_MAGIC_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Build the 101 Switching Protocols response for an accepted handshake.
pub fn switching_protocols_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\
         \r\n"
    )
}

/// Build the rejection response sent when the upgrade request is invalid.
pub fn bad_request_response() -> &'static str {
    "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accept_key_matches_rfc6455_vector() {
        // テスト項目: RFC 6455 のテストベクタ通りの accept トークンが計算される
        // given (前提条件):
        let key = "dGhlIHNhbXBsZSBub25jZQ==";

        // when (操作):
        let accept = accept_key(key);

        // then (期待する結果):
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_inspect_accepts_valid_request() {
        // テスト項目: Upgrade ヘッダとキーが揃った正しいリクエストが受理される
        // given (前提条件):
        let request = lines(&[
            "GET /chat HTTP/1.1",
            "Host: localhost:8081",
            "Upgrade: websocket",
            "Connection: Upgrade",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
            "Sec-WebSocket-Version: 13",
        ]);

        // when (操作):
        let outcome = inspect(&request);

        // then (期待する結果):
        assert_eq!(
            outcome,
            HandshakeOutcome::Accepted {
                accept_key: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".to_string()
            }
        );
    }

    #[test]
    fn test_inspect_is_order_insensitive() {
        // テスト項目: ヘッダの順序が違っても受理される
        // given (前提条件): キーが Upgrade より先に来るリクエスト
        let request = lines(&[
            "GET /chat HTTP/1.1",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
            "Upgrade: websocket",
        ]);

        // when (操作):
        let outcome = inspect(&request);

        // then (期待する結果):
        assert!(matches!(outcome, HandshakeOutcome::Accepted { .. }));
    }

    #[test]
    fn test_inspect_first_key_wins() {
        // テスト項目: キーが複数ある場合は最初のものが使われる
        // given (前提条件):
        let request = lines(&[
            "Upgrade: websocket",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
            "Sec-WebSocket-Key: c2Vjb25kLWtleS1pZ25vcmVk",
        ]);

        // when (操作):
        let outcome = inspect(&request);

        // then (期待する結果):
        assert_eq!(
            outcome,
            HandshakeOutcome::Accepted {
                accept_key: accept_key("dGhlIHNhbXBsZSBub25jZQ==")
            }
        );
    }

    #[test]
    fn test_inspect_rejects_without_upgrade_header() {
        // テスト項目: Upgrade ヘッダがないリクエストは拒否される
        // given (前提条件):
        let request = lines(&[
            "GET / HTTP/1.1",
            "Host: localhost:8081",
            "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==",
        ]);

        // when (操作):
        let outcome = inspect(&request);

        // then (期待する結果):
        assert_eq!(outcome, HandshakeOutcome::Rejected);
    }

    #[test]
    fn test_inspect_rejects_without_key() {
        // テスト項目: キーがない、または空のリクエストは拒否される
        // given (前提条件):
        let missing = lines(&["Upgrade: websocket", "Connection: Upgrade"]);
        let empty = lines(&["Upgrade: websocket", "Sec-WebSocket-Key:   "]);

        // when (操作):

        // then (期待する結果):
        assert_eq!(inspect(&missing), HandshakeOutcome::Rejected);
        assert_eq!(inspect(&empty), HandshakeOutcome::Rejected);
    }

    #[test]
    fn test_switching_protocols_response_contains_accept() {
        // テスト項目: 101 レスポンスに必要なヘッダがすべて含まれる
        // given (前提条件):
        let accept = accept_key("dGhlIHNhbXBsZSBub25jZQ==");

        // when (操作):
        let response = switching_protocols_response(&accept);

        // then (期待する結果):
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Upgrade: websocket\r\n"));
        assert!(response.contains("Connection: Upgrade\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }
}
