//! UseCase: ルームからの退出処理

use std::sync::Arc;

use crate::domain::{ChatRoom, ChatUser, MessagePusher};
use crate::protocol::ServerMessage;

/// ルーム退出のユースケース
///
/// 接続のクローズ時に Connection Supervisor から一度だけ呼ばれます。
/// 退出者をレジストリから外してからブロードキャストするため、退出通知が
/// 本人へ送られることはありません。
pub struct LeaveRoomUseCase {
    /// 退出元のルーム
    room: Arc<ChatRoom>,
    /// MessagePusher（メッセージ配送の抽象化）
    pusher: Arc<dyn MessagePusher>,
}

impl LeaveRoomUseCase {
    /// 新しい LeaveRoomUseCase を作成
    pub fn new(room: Arc<ChatRoom>, pusher: Arc<dyn MessagePusher>) -> Self {
        Self { room, pusher }
    }

    /// 退出処理を実行
    ///
    /// # Returns
    ///
    /// * `true` - ユーザーが退出し、通知がブロードキャストされた
    /// * `false` - ユーザーは既にルームにいなかった（何もしない）
    pub async fn execute(&self, user: &ChatUser) -> bool {
        self.pusher.unregister_connection(user.id()).await;

        if !self.room.leave(user.id()) {
            return false;
        }

        let notification = ServerMessage::Notification {
            message: format!("{} left the chat", user.username()),
        };
        self.pusher.broadcast(&notification.to_json()).await;

        tracing::info!(
            username = %user.username(),
            connection_id = %user.id(),
            "user left the chat"
        );
        true
    }
}
