//! 接続レジストリ（MessagePusher の実装)
//!
//! ## 責務
//!
//! - 接続中のクライアントの送信チャネルを接続 ID で管理
//! - ブロードキャスト配送（broadcast / broadcast_except）
//!
//! ## 設計ノート
//!
//! 実体は lock-striped な並行マップ（DashMap）です。broadcast の反復中に
//! 登録・削除が並行して行われても安全で、削除済みエントリへの送信は
//! 警告ログとともにスキップされます（重複配送は起きません）。
//!
//! 送信チャネルの先には接続ごとの単一 writer タスクがいるため、ここでの
//! send がブロックすることはなく、遅いピアが他の接続のブロードキャストを
//! 妨げることもありません。

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{MessagePushError, MessagePusher, OutboundMessage, PusherChannel};

/// 接続中のクライアントへの送信ハンドル
struct ConnectionHandle {
    sender: PusherChannel,
}

/// 接続レジストリ
#[derive(Default)]
pub struct ConnectionRegistry {
    /// Key: connection_id, Value: その接続の writer タスクへのチャネル
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// 新しい ConnectionRegistry を作成
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// 登録されている接続数
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// 全接続の writer タスクへ Close を送り、レジストリを空にする
    /// （サーバーのシャットダウン時に呼ばれる）
    pub fn close_all(&self) {
        for entry in self.connections.iter() {
            let _ = entry.value().sender.send(OutboundMessage::Close);
        }
        self.connections.clear();
        tracing::info!("all connections closed");
    }
}

#[async_trait]
impl MessagePusher for ConnectionRegistry {
    async fn register_connection(&self, connection_id: String, sender: PusherChannel) {
        tracing::debug!(connection_id = %connection_id, "connection registered");
        self.connections
            .insert(connection_id, ConnectionHandle { sender });
    }

    async fn unregister_connection(&self, connection_id: &str) {
        self.connections.remove(connection_id);
        tracing::debug!(connection_id = %connection_id, "connection unregistered");
    }

    async fn push_to(&self, connection_id: &str, content: &str) -> Result<(), MessagePushError> {
        match self.connections.get(connection_id) {
            Some(handle) => handle
                .sender
                .send(OutboundMessage::Text(content.to_string()))
                .map_err(|_| MessagePushError::PushFailed(connection_id.to_string())),
            None => Err(MessagePushError::ConnectionNotFound(
                connection_id.to_string(),
            )),
        }
    }

    async fn broadcast(&self, content: &str) {
        for entry in self.connections.iter() {
            let sent = entry
                .value()
                .sender
                .send(OutboundMessage::Text(content.to_string()));
            if sent.is_err() {
                // writer タスクが終了済み。その接続の leave 経路に任せる
                tracing::warn!(
                    connection_id = %entry.key(),
                    "failed to push broadcast; connection writer is gone"
                );
            }
        }
    }

    async fn broadcast_except(&self, exclude_connection_id: &str, content: &str) {
        for entry in self.connections.iter() {
            if entry.key() == exclude_connection_id {
                continue;
            }
            let sent = entry
                .value()
                .sender
                .send(OutboundMessage::Text(content.to_string()));
            if sent.is_err() {
                tracing::warn!(
                    connection_id = %entry.key(),
                    "failed to push broadcast; connection writer is gone"
                );
            }
        }
    }
}
