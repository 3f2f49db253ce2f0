//! WebSocket 线上协议
//!
//! 双向 JSON 帧的标签联合定义。入站帧在连接边界解码，
//! 无法识别的形状在进入业务逻辑之前就会被拒绝。

use serde::{Deserialize, Serialize};

use crate::entities::{DirectMessage, MessageKind, PresenceEntry, PublicMessage};
use crate::value_objects::{Timestamp, UserId, Username};

/// 客户端发往服务器的帧。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// 认证握手，仅在未认证状态下接受
    #[serde(rename = "auth")]
    Auth { username: String, password: String },

    /// 发送公共消息
    #[serde(rename = "send-message")]
    SendMessage { content: String },

    /// 发送私信
    #[serde(rename = "send-direct")]
    #[serde(rename_all = "camelCase")]
    SendDirect { receiver_id: i64, content: String },

    /// 将来自指定发送者的私信全部标记为已读
    #[serde(rename = "mark-read")]
    #[serde(rename_all = "camelCase")]
    MarkRead { sender_id: i64 },
}

/// 用户列表中的单个条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListEntry {
    pub id: UserId,
    pub username: Username,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<Timestamp>,
}

impl From<PresenceEntry> for UserListEntry {
    fn from(entry: PresenceEntry) -> Self {
        Self {
            id: entry.user_id,
            username: entry.username,
            is_online: entry.is_online,
            last_seen_at: entry.last_seen_at,
        }
    }
}

/// 连接状态通告。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// 服务器发往客户端的帧。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "auth-success")]
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: UserId, username: Username },

    #[serde(rename = "auth-error")]
    AuthError { message: String },

    /// 公共聊天消息
    #[serde(rename = "message")]
    #[serde(rename_all = "camelCase")]
    Message {
        id: i64,
        author_user_id: Option<UserId>,
        author_username: Username,
        content: String,
        created_at: Timestamp,
    },

    /// 系统通知（加入/离开）
    #[serde(rename = "system")]
    #[serde(rename_all = "camelCase")]
    System {
        id: i64,
        content: String,
        created_at: Timestamp,
    },

    #[serde(rename = "direct-message")]
    #[serde(rename_all = "camelCase")]
    DirectMessage {
        id: i64,
        sender_id: UserId,
        sender_username: Username,
        receiver_id: UserId,
        receiver_username: Username,
        content: String,
        created_at: Timestamp,
        read: bool,
    },

    /// 在线状态快照
    #[serde(rename = "userList")]
    UserList { users: Vec<UserListEntry> },

    /// 已读回执：receiver 已读来自 sender 的全部私信
    #[serde(rename = "messages-read")]
    #[serde(rename_all = "camelCase")]
    MessagesRead { sender_id: UserId, receiver_id: UserId },

    /// 某用户上线/下线的连接通告
    #[serde(rename = "connection")]
    #[serde(rename_all = "camelCase")]
    Connection {
        status: ConnectionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<Username>,
    },

    /// 通用失败通告，不携带内部细节
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerFrame {
    /// 按消息类别转换为 `message` 或 `system` 帧。
    pub fn from_public_message(message: &PublicMessage) -> Self {
        match message.kind {
            MessageKind::Message => ServerFrame::Message {
                id: message.id.0,
                author_user_id: message.author_user_id,
                author_username: message.author_username.clone(),
                content: message.content.as_str().to_owned(),
                created_at: message.created_at,
            },
            MessageKind::System => ServerFrame::System {
                id: message.id.0,
                content: message.content.as_str().to_owned(),
                created_at: message.created_at,
            },
        }
    }

    pub fn from_direct_message(message: &DirectMessage) -> Self {
        ServerFrame::DirectMessage {
            id: message.id.0,
            sender_id: message.sender_id,
            sender_username: message.sender_username.clone(),
            receiver_id: message.receiver_id,
            receiver_username: message.receiver_username.clone(),
            content: message.content.as_str().to_owned(),
            created_at: message.created_at,
            read: message.read,
        }
    }

    pub fn user_list(entries: Vec<PresenceEntry>) -> Self {
        ServerFrame::UserList {
            users: entries.into_iter().map(UserListEntry::from).collect(),
        }
    }

    pub fn connected(user_id: UserId, username: Username) -> Self {
        ServerFrame::Connection {
            status: ConnectionStatus::Connected,
            user_id: Some(user_id),
            username: Some(username),
        }
    }

    pub fn disconnected(user_id: UserId, username: Username) -> Self {
        ServerFrame::Connection {
            status: ConnectionStatus::Disconnected,
            user_id: Some(user_id),
            username: Some(username),
        }
    }
}
