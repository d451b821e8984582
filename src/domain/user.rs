//! チャットユーザーのドメインモデル

use std::hash::{Hash, Hasher};

/// チャットルームに参加しているユーザー
///
/// `id` は接続ごとに割り当てられる安定した識別子。同値性は `id` のみで
/// 判定されます。再接続したクライアントは新しい `id` を受け取ります。
#[derive(Debug, Clone)]
pub struct ChatUser {
    id: String,
    username: String,
    joined_at: i64,
    last_activity: i64,
    online: bool,
}

impl ChatUser {
    /// 新しい ChatUser を作成（online 状態で開始）
    pub fn new(id: impl Into<String>, username: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            joined_at: now_millis,
            last_activity: now_millis,
            online: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn joined_at(&self) -> i64 {
        self.joined_at
    }

    pub fn last_activity(&self) -> i64 {
        self.last_activity
    }

    pub fn online(&self) -> bool {
        self.online
    }

    /// 最終アクティビティを更新する
    ///
    /// `last_activity` is monotonically non-decreasing: a stale caller
    /// can never move it backwards.
    pub(crate) fn touch(&mut self, now_millis: i64) {
        self.last_activity = self.last_activity.max(now_millis);
    }

    pub(crate) fn set_online(&mut self, online: bool) {
        self.online = online;
    }
}

impl PartialEq for ChatUser {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatUser {}

impl Hash for ChatUser {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_online() {
        // テスト項目: 新規ユーザーは online 状態で作成される
        // given (前提条件):

        // when (操作):
        let user = ChatUser::new("1", "alice", 1000);

        // then (期待する結果):
        assert!(user.online());
        assert_eq!(user.joined_at(), 1000);
        assert_eq!(user.last_activity(), 1000);
    }

    #[test]
    fn test_touch_updates_last_activity() {
        // テスト項目: touch で last_activity が更新される
        // given (前提条件):
        let mut user = ChatUser::new("1", "alice", 1000);

        // when (操作):
        user.touch(2000);

        // then (期待する結果):
        assert_eq!(user.last_activity(), 2000);
    }

    #[test]
    fn test_touch_is_monotonic() {
        // テスト項目: touch は last_activity を過去に戻さない（単調非減少）
        // given (前提条件):
        let mut user = ChatUser::new("1", "alice", 1000);
        user.touch(5000);

        // when (操作): 古いタイムスタンプで touch する
        user.touch(3000);

        // then (期待する結果):
        assert_eq!(user.last_activity(), 5000);
    }

    #[test]
    fn test_equality_is_by_id_only() {
        // テスト項目: 同値性は id のみで判定される
        // given (前提条件):
        let user1 = ChatUser::new("1", "alice", 1000);
        let user2 = ChatUser::new("1", "totally-different-name", 9999);
        let user3 = ChatUser::new("2", "alice", 1000);

        // when (操作):

        // then (期待する結果):
        assert_eq!(user1, user2);
        assert_ne!(user1, user3);
    }
}
