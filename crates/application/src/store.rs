//! 持久化存储接口
//!
//! 实时核心消费的外部协作者。存储自身提供并发控制，
//! 核心只负责发出格式良好、尽可能幂等的调用。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{
    DirectMessage, MessageContent, PublicMessage, User, UserId, Username,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// 下游存储不可用；操作视为失败，连接保持存活
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// 用户名已被占用
    #[error("username already taken: {0}")]
    DuplicateUsername(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// 新建用户的输入。
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub password: domain::PasswordHash,
    pub email: Option<String>,
}

/// 新建公共消息的输入；id 和时间戳由存储层分配。
#[derive(Debug, Clone)]
pub struct NewPublicMessage {
    pub author_user_id: UserId,
    pub author_username: Username,
    pub content: MessageContent,
}

/// 新建私信的输入。
#[derive(Debug, Clone)]
pub struct NewDirectMessage {
    pub sender_id: UserId,
    pub sender_username: Username,
    pub receiver_id: UserId,
    pub receiver_username: Username,
    pub content: MessageContent,
}

/// Users / PublicMessages / DirectMessages 的 CRUD 接口。
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), StoreError>;
    async fn touch_last_seen(&self, user_id: UserId) -> Result<(), StoreError>;

    async fn append_public_message(
        &self,
        message: NewPublicMessage,
    ) -> Result<PublicMessage, StoreError>;
    async fn append_system_message(&self, content: String) -> Result<PublicMessage, StoreError>;
    /// 按 id 升序返回全部公共消息
    async fn list_public_messages(&self) -> Result<Vec<PublicMessage>, StoreError>;

    async fn append_direct_message(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, StoreError>;
    /// 两个用户之间的全部私信，按 id 升序，不区分方向
    async fn list_direct_messages(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError>;
    /// 某个用户收发的全部私信，按 id 升序
    async fn list_direct_messages_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError>;
    /// 将 sender -> receiver 的全部未读私信标记为已读
    async fn mark_read(&self, sender_id: UserId, receiver_id: UserId) -> Result<(), StoreError>;
    /// receiver 的未读计数，按发送者分组
    async fn unread_counts(&self, user_id: UserId) -> Result<HashMap<UserId, u64>, StoreError>;
}
