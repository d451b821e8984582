//! チャットルームのドメインモデル
//!
//! メンバーシップとメッセージ履歴の、並行アクセスに対する唯一の情報源。
//! すべての変更操作は内部で同期されるため、呼び出し側のロックは不要です。
//!
//! ## ロック規約
//!
//! `users` → `messages` の順でのみロックを取得する（逆順は禁止）。
//! 各操作は複合的な不変条件（check-and-insert、append-and-evict）を
//! 1 つのクリティカルセクション内で守ります。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::time::Clock;

use super::{ChatMessage, ChatUser};

/// ルームの設定
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 同時に参加できるユーザー数の上限
    pub max_users: usize,
    /// 保持するメッセージ数の上限（超過時は最古の 1 件を削除）
    pub max_messages: usize,
    /// この時間アクティビティがないユーザーは sweep で offline になる
    pub inactivity_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_users: 100,
            max_messages: 1000,
            inactivity_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// ルームの統計情報のスナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStats {
    /// これまでに join に成功したユーザーの累計
    pub total_users_seen: u64,
    /// 現在 online のユーザー数
    pub active_user_count: usize,
    /// 現在保持しているメッセージ数
    pub total_message_count: usize,
    /// ルームの作成時刻（UTC ミリ秒）
    pub created_at: i64,
}

/// チャットルーム
pub struct ChatRoom {
    id: String,
    name: String,
    users: Mutex<HashMap<String, ChatUser>>,
    messages: Mutex<VecDeque<ChatMessage>>,
    created_at: i64,
    total_users_seen: AtomicU64,
    config: RoomConfig,
    clock: Arc<dyn Clock>,
}

impl ChatRoom {
    /// デフォルト設定で新しい ChatRoom を作成
    pub fn new(id: impl Into<String>, name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(id, name, RoomConfig::default(), clock)
    }

    /// 設定を指定して新しい ChatRoom を作成
    pub fn with_config(
        id: impl Into<String>,
        name: impl Into<String>,
        config: RoomConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        tracing::info!(room_id = %id, room_name = %name, "chat room created");
        Self {
            id,
            name,
            users: Mutex::new(HashMap::new()),
            messages: Mutex::new(VecDeque::new()),
            created_at: clock.now_utc_millis(),
            total_users_seen: AtomicU64::new(0),
            config,
            clock,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// ユーザーをルームに参加させる
    ///
    /// 以下の場合は `false` を返し、状態は一切変更されません:
    /// - ルームが満員（`max_users` 超過）
    /// - 同じユーザー名（大文字小文字を区別しない）の online ユーザーが存在
    ///
    /// 重複チェックと挿入は 1 つのロック区間内で行われるため、同名での
    /// 同時 join が両方成功することはありません。
    pub fn join(&self, user: ChatUser) -> bool {
        let username = user.username().to_string();
        {
            let mut users = self.users.lock().unwrap();

            if users.len() >= self.config.max_users {
                tracing::warn!(
                    username = %username,
                    "cannot add user: room is full"
                );
                return false;
            }

            let lowered = username.to_lowercase();
            let username_taken = users
                .values()
                .any(|u| u.online() && u.username().to_lowercase() == lowered);
            if username_taken {
                tracing::warn!(
                    username = %username,
                    "cannot add user: username already taken"
                );
                return false;
            }

            self.total_users_seen.fetch_add(1, Ordering::Relaxed);
            users.insert(user.id().to_string(), user);
            tracing::info!(
                username = %username,
                room_name = %self.name,
                total = users.len(),
                "user added to room"
            );
        }

        self.add_system_message(format!("{username} joined the chat"));
        true
    }

    /// ユーザーをルームから退出させる
    ///
    /// 退出したユーザーは offline になり、メンバーシップから取り除かれます。
    /// 同じ id が復活することはありません。ユーザーが存在しない場合は
    /// 何もせず `false` を返します。
    pub fn leave(&self, user_id: &str) -> bool {
        let removed = { self.users.lock().unwrap().remove(user_id) };

        match removed {
            Some(mut user) => {
                user.set_online(false);
                tracing::info!(
                    username = %user.username(),
                    room_name = %self.name,
                    "user removed from room"
                );
                self.add_system_message(format!("{} left the chat", user.username()));
                true
            }
            None => false,
        }
    }

    /// メッセージを履歴に追加する
    ///
    /// 履歴が上限を超えた場合は最古の 1 件だけを削除します（strict FIFO）。
    /// author がいる場合はその `last_activity` を更新します。
    pub fn add_message(&self, message: ChatMessage) {
        if let Some(author) = message.user() {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.get_mut(author.id()) {
                user.touch(self.clock.now_utc_millis());
            }
        }

        let mut messages = self.messages.lock().unwrap();
        messages.push_back(message);
        if messages.len() > self.config.max_messages {
            messages.pop_front();
        }
    }

    /// システムメッセージを履歴に追加する
    pub fn add_system_message(&self, content: impl Into<String>) {
        self.add_message(ChatMessage::system(content, self.clock.now_utc_millis()));
    }

    /// ユーザーのスナップショットを id で取得
    pub fn get_user(&self, user_id: &str) -> Option<ChatUser> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    /// online のユーザー一覧（ユーザー名の大文字小文字を区別しない昇順）
    pub fn active_users(&self) -> Vec<ChatUser> {
        let mut users: Vec<ChatUser> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.online())
            .cloned()
            .collect();
        users.sort_by_key(|u| u.username().to_lowercase());
        users
    }

    /// online のユーザー数
    pub fn active_user_count(&self) -> usize {
        self.users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.online())
            .count()
    }

    /// 直近 `limit` 件のメッセージを挿入順で返す
    ///
    /// `limit <= 0` の場合は保持している履歴全体を返します。
    pub fn recent_messages(&self, limit: isize) -> Vec<ChatMessage> {
        let messages = self.messages.lock().unwrap();
        if limit <= 0 {
            return messages.iter().cloned().collect();
        }
        let skip = messages.len().saturating_sub(limit as usize);
        messages.iter().skip(skip).cloned().collect()
    }

    /// 保持している全メッセージを挿入順で返す
    pub fn all_messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().iter().cloned().collect()
    }

    /// 本文に `query` を含むメッセージを検索（大文字小文字を区別しない）
    pub fn search_messages(&self, query: &str) -> Vec<ChatMessage> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.content().to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// 非アクティブなユーザーを offline にする（定期ジョブから呼ばれる）
    ///
    /// `last_activity` が `now - inactivity_timeout` より古い online ユーザーを
    /// offline に降格します。`leave` とは異なり、メンバーシップからの削除や
    /// 退出メッセージの追加は行いません（silent downgrade）。
    ///
    /// offline にしたユーザー数を返します。何も変化がなければ 0 です。
    pub fn sweep_inactive(&self) -> usize {
        let cutoff = self.clock.now_utc_millis() - self.config.inactivity_timeout.as_millis() as i64;

        let mut swept = 0;
        {
            let mut users = self.users.lock().unwrap();
            for user in users.values_mut() {
                if user.online() && user.last_activity() < cutoff {
                    user.set_online(false);
                    swept += 1;
                    tracing::debug!(username = %user.username(), "user marked inactive");
                }
            }
        }

        if swept > 0 {
            tracing::info!(
                room_name = %self.name,
                swept,
                "inactivity sweep completed"
            );
        }
        swept
    }

    /// ルームの統計情報のスナップショットを返す
    pub fn stats(&self) -> RoomStats {
        RoomStats {
            total_users_seen: self.total_users_seen.load(Ordering::Relaxed),
            active_user_count: self.active_user_count(),
            total_message_count: self.messages.lock().unwrap().len(),
            created_at: self.created_at,
        }
    }
}
