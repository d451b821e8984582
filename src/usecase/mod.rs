//! ユースケース層
//!
//! Connection Supervisor のフレームディスパッチから呼ばれる複合操作を
//! 1 操作 = 1 struct で定義します。各ユースケースはドメイン層
//! （`ChatRoom` と `MessagePusher` trait）にのみ依存します。

mod join_room;
mod leave_room;
mod send_message;

pub use join_room::JoinRoomUseCase;
pub use leave_room::LeaveRoomUseCase;
pub use send_message::SendMessageUseCase;

#[cfg(test)]
pub(crate) mod tests {
    //! ユースケーステスト用の手書きモック

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::{MessagePushError, MessagePusher, PusherChannel};

    /// 呼び出しを記録する MessagePusher モック
    ///
    /// broadcasts は (除外された接続 ID, 送信内容) のペアを記録する。
    /// broadcast は除外なし（None）として記録される。
    #[derive(Default)]
    pub struct RecordingPusher {
        registered: Mutex<Vec<String>>,
        unregistered: Mutex<Vec<String>>,
        broadcasts: Mutex<Vec<(Option<String>, String)>>,
    }

    impl RecordingPusher {
        pub fn registered(&self) -> Vec<String> {
            self.registered.lock().unwrap().clone()
        }

        pub fn unregistered(&self) -> Vec<String> {
            self.unregistered.lock().unwrap().clone()
        }

        pub fn broadcasts(&self) -> Vec<(Option<String>, String)> {
            self.broadcasts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagePusher for RecordingPusher {
        async fn register_connection(&self, connection_id: String, _sender: PusherChannel) {
            self.registered.lock().unwrap().push(connection_id);
        }

        async fn unregister_connection(&self, connection_id: &str) {
            self.unregistered
                .lock()
                .unwrap()
                .push(connection_id.to_string());
        }

        async fn push_to(
            &self,
            _connection_id: &str,
            _content: &str,
        ) -> Result<(), MessagePushError> {
            Ok(())
        }

        async fn broadcast(&self, content: &str) {
            self.broadcasts
                .lock()
                .unwrap()
                .push((None, content.to_string()));
        }

        async fn broadcast_except(&self, exclude_connection_id: &str, content: &str) {
            self.broadcasts
                .lock()
                .unwrap()
                .push((Some(exclude_connection_id.to_string()), content.to_string()));
        }
    }
}
