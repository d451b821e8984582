//! ドメイン層
//!
//! チャットルームのエンティティと、配送の抽象化（MessagePusher）を
//! 定義します。トランスポートやスレッドプールには依存しません。

mod message;
mod pusher;
mod room;
mod user;

pub use message::{ChatMessage, MessageType};
pub use pusher::{MessagePushError, MessagePusher, OutboundMessage, PusherChannel};
pub use room::{ChatRoom, RoomConfig, RoomStats};
pub use user::ChatUser;
