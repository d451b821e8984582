//! メッセージ送信の抽象化（MessagePusher trait）
//!
//! ドメイン層が必要とする「接続へメッセージを届ける」インターフェースを
//! 定義します。具体的な実装（接続レジストリ）は server 層が提供します
//! （依存性の逆転）。

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// 接続の writer タスクへ送る送信ペイロード
///
/// `Text` はアプリケーションの JSON メッセージ、`Pong` は Ping への応答、
/// `Close` は writer タスクの終了指示です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Pong(Vec<u8>),
    Close,
}

/// 接続ごとの送信チャネル
///
/// 各接続はこのチャネルの受信側を専有する単一の writer タスクを持つため、
/// 同一接続への書き込みは常に直列化されます。
pub type PusherChannel = mpsc::UnboundedSender<OutboundMessage>;

/// メッセージ送信時のエラー
#[derive(Debug, Error)]
pub enum MessagePushError {
    /// 指定された接続が登録されていない
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),
    /// 接続は存在するが送信に失敗した（writer タスクが終了済みなど）
    #[error("failed to push message to connection '{0}'")]
    PushFailed(String),
}

/// MessagePusher trait
///
/// 接続へのメッセージ配送の抽象化。ユースケース層はこの trait に依存し、
/// 具体的なレジストリ実装には依存しません。
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続を登録する
    async fn register_connection(&self, connection_id: String, sender: PusherChannel);

    /// 接続の登録を解除する
    async fn unregister_connection(&self, connection_id: &str);

    /// 特定の接続へメッセージを送信する
    async fn push_to(&self, connection_id: &str, content: &str) -> Result<(), MessagePushError>;

    /// 登録済みの全接続へメッセージを送信する（部分失敗を許容）
    async fn broadcast(&self, content: &str);

    /// 指定した接続を除く全接続へメッセージを送信する（部分失敗を許容）
    async fn broadcast_except(&self, exclude_connection_id: &str, content: &str);
}
