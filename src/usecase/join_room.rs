//! UseCase: ルームへの参加処理

use std::sync::Arc;

use crate::common::time::Clock;
use crate::domain::{ChatRoom, ChatUser, MessagePusher, PusherChannel};
use crate::protocol::ServerMessage;

/// ルーム参加のユースケース
///
/// 参加チェック（満員・ユーザー名重複）はルーム側でアトミックに行われます。
/// 拒否された場合、クライアントには何も送られません（join 通知の不在から
/// 失敗を推測する、という既知の設計上の制約をそのまま保持しています）。
pub struct JoinRoomUseCase {
    /// 参加先のルーム
    room: Arc<ChatRoom>,
    /// MessagePusher（メッセージ配送の抽象化）
    pusher: Arc<dyn MessagePusher>,
    /// Clock（時刻の抽象化）
    clock: Arc<dyn Clock>,
}

impl JoinRoomUseCase {
    /// 新しい JoinRoomUseCase を作成
    pub fn new(room: Arc<ChatRoom>, pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self { room, pusher, clock }
    }

    /// 参加処理を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 接続 ID（そのままユーザー ID になる）
    /// * `username` - 希望するユーザー名（前後の空白は除去される）
    /// * `sender` - この接続の送信チャネル（成功時にレジストリへ登録される)
    ///
    /// # Returns
    ///
    /// * `Some(ChatUser)` - 参加に成功した場合、作成されたユーザー
    /// * `None` - ユーザー名が空、満員、または名前が重複している場合
    pub async fn execute(
        &self,
        connection_id: &str,
        username: &str,
        sender: PusherChannel,
    ) -> Option<ChatUser> {
        let username = username.trim();
        if username.is_empty() {
            tracing::warn!(connection_id, "join rejected: empty username");
            return None;
        }

        let user = ChatUser::new(connection_id, username, self.clock.now_utc_millis());
        if !self.room.join(user.clone()) {
            // 拒否された join は状態を変更せず、クライアントへの応答もない
            return None;
        }

        // 参加者自身にも join 通知が届くよう、broadcast の前に登録する
        self.pusher
            .register_connection(connection_id.to_string(), sender)
            .await;

        let notification = ServerMessage::Notification {
            message: format!("{username} joined the chat"),
        };
        self.pusher.broadcast(&notification.to_json()).await;

        tracing::info!(username, connection_id, "user joined the chat");
        Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;
    use crate::usecase::tests::RecordingPusher;
    use tokio::sync::mpsc;

    fn create_test_room() -> Arc<ChatRoom> {
        Arc::new(ChatRoom::new(
            "test",
            "Test Room",
            Arc::new(FixedClock::new(1000)),
        ))
    }

    #[tokio::test]
    async fn test_join_success_registers_and_notifies() {
        // テスト項目: 参加に成功すると接続が登録され、通知がブロードキャストされる
        // given (前提条件):
        let room = create_test_room();
        let pusher = Arc::new(RecordingPusher::default());
        let usecase = JoinRoomUseCase::new(
            Arc::clone(&room),
            pusher.clone(),
            Arc::new(FixedClock::new(1000)),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        // when (操作):
        let user = usecase.execute("1", "alice", tx).await;

        // then (期待する結果):
        let user = user.expect("join should succeed");
        assert_eq!(user.username(), "alice");
        assert_eq!(room.active_user_count(), 1);
        assert_eq!(pusher.registered(), vec!["1".to_string()]);
        let broadcasts = pusher.broadcasts();
        assert_eq!(broadcasts.len(), 1);
        assert!(broadcasts[0].1.contains("alice joined the chat"));
        assert_eq!(broadcasts[0].0, None, "join notification goes to everyone");
    }

    #[tokio::test]
    async fn test_join_trims_username() {
        // テスト項目: ユーザー名の前後の空白が除去される
        // given (前提条件):
        let room = create_test_room();
        let pusher = Arc::new(RecordingPusher::default());
        let usecase =
            JoinRoomUseCase::new(room, pusher.clone(), Arc::new(FixedClock::new(1000)));
        let (tx, _rx) = mpsc::unbounded_channel();

        // when (操作):
        let user = usecase.execute("1", "  alice  ", tx).await;

        // then (期待する結果):
        assert_eq!(user.unwrap().username(), "alice");
    }

    #[tokio::test]
    async fn test_join_rejects_empty_username() {
        // テスト項目: 空のユーザー名は拒否され、何も起きない
        // given (前提条件):
        let room = create_test_room();
        let pusher = Arc::new(RecordingPusher::default());
        let usecase = JoinRoomUseCase::new(
            Arc::clone(&room),
            pusher.clone(),
            Arc::new(FixedClock::new(1000)),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        // when (操作):
        let user = usecase.execute("1", "   ", tx).await;

        // then (期待する結果):
        assert!(user.is_none());
        assert_eq!(room.active_user_count(), 0);
        assert!(pusher.registered().is_empty());
        assert!(pusher.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_join_duplicate_username_is_silent() {
        // テスト項目: 重複ユーザー名の join は拒否され、クライアントへの応答はない
        // given (前提条件): alice が既に参加している
        let room = create_test_room();
        let pusher = Arc::new(RecordingPusher::default());
        let usecase = JoinRoomUseCase::new(
            Arc::clone(&room),
            pusher.clone(),
            Arc::new(FixedClock::new(1000)),
        );
        let (tx1, _rx1) = mpsc::unbounded_channel();
        usecase.execute("1", "alice", tx1).await.unwrap();
        let broadcasts_before = pusher.broadcasts().len();

        // when (操作): 別の接続が同じ名前で join する
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let user = usecase.execute("2", "ALICE", tx2).await;

        // then (期待する結果): 拒否され、登録も追加のブロードキャストもない
        assert!(user.is_none());
        assert_eq!(room.active_user_count(), 1);
        assert_eq!(pusher.registered(), vec!["1".to_string()]);
        assert_eq!(pusher.broadcasts().len(), broadcasts_before);
    }
}
