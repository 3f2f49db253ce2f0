use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId, Username};

/// 公共消息类别：普通聊天消息或服务器生成的系统通知。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    System,
}

/// 公共聊天室消息。创建后不可变，`id` 给出全序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMessage {
    pub id: MessageId,
    /// 系统消息没有作者。
    pub author_user_id: Option<UserId>,
    pub author_username: Username,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub kind: MessageKind,
}

impl PublicMessage {
    pub fn chat(
        id: MessageId,
        author_user_id: UserId,
        author_username: Username,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            author_user_id: Some(author_user_id),
            author_username,
            content,
            created_at,
            kind: MessageKind::Message,
        }
    }

    pub fn system(
        id: MessageId,
        system_username: Username,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            author_user_id: None,
            author_username: system_username,
            content,
            created_at,
            kind: MessageKind::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}
