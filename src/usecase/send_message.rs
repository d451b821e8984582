//! UseCase: メッセージ送信処理

use std::sync::Arc;

use crate::common::time::{Clock, timestamp_to_rfc3339};
use crate::domain::{ChatMessage, ChatRoom, ChatUser, MessagePusher};
use crate::protocol::ServerMessage;

/// メッセージ送信のユースケース
///
/// メッセージを履歴に追加し、送信者以外の全接続へブロードキャストします。
pub struct SendMessageUseCase {
    /// 送信先のルーム
    room: Arc<ChatRoom>,
    /// MessagePusher（メッセージ配送の抽象化）
    pusher: Arc<dyn MessagePusher>,
    /// Clock（時刻の抽象化）
    clock: Arc<dyn Clock>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(room: Arc<ChatRoom>, pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self { room, pusher, clock }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `user` - 送信者（join 済みのユーザー）
    /// * `content` - メッセージ本文（前後の空白は除去される）
    ///
    /// # Returns
    ///
    /// * `true` - 履歴に追加され、ブロードキャストされた
    /// * `false` - 本文が空のため無視された
    pub async fn execute(&self, user: &ChatUser, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() {
            return false;
        }

        let now = self.clock.now_utc_millis();
        self.room
            .add_message(ChatMessage::text(user.clone(), content, now));

        let broadcast = ServerMessage::Message {
            username: user.username().to_string(),
            content: content.to_string(),
            timestamp: timestamp_to_rfc3339(now),
        };
        self.pusher
            .broadcast_except(user.id(), &broadcast.to_json())
            .await;

        tracing::debug!(
            username = %user.username(),
            chars = content.len(),
            "chat message broadcast"
        );
        true
    }
}
