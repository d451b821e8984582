//! チャットメッセージのドメインモデル

use std::sync::atomic::{AtomicU64, Ordering};

use super::ChatUser;

/// Process-wide sequence for message id generation.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// メッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// ユーザーが送信した通常のチャットメッセージ
    Text,
    /// サーバーからクライアントへの通知
    Notification,
    /// 参加・退出などのシステムメッセージ（履歴に残る）
    System,
}

/// ルームの履歴に保存されるメッセージ
///
/// 作成後は不変。`user` が `None` の場合はシステムメッセージです。
#[derive(Debug, Clone)]
pub struct ChatMessage {
    id: String,
    user: Option<ChatUser>,
    content: String,
    timestamp: i64,
    message_type: MessageType,
}

impl ChatMessage {
    /// 新しいメッセージを作成
    pub fn new(
        user: Option<ChatUser>,
        content: impl Into<String>,
        message_type: MessageType,
        now_millis: i64,
    ) -> Self {
        Self {
            id: generate_id(now_millis),
            user,
            content: content.into(),
            timestamp: now_millis,
            message_type,
        }
    }

    /// ユーザーのチャットメッセージを作成
    pub fn text(user: ChatUser, content: impl Into<String>, now_millis: i64) -> Self {
        Self::new(Some(user), content, MessageType::Text, now_millis)
    }

    /// システムメッセージを作成（author なし）
    pub fn system(content: impl Into<String>, now_millis: i64) -> Self {
        Self::new(None, content, MessageType::System, now_millis)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user(&self) -> Option<&ChatUser> {
        self.user.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }
}

/// "<millis>-<seq>" 形式の ID を生成（プロセス内で単調増加）
fn generate_id(now_millis: i64) -> String {
    format!("{}-{}", now_millis, MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed))
}
