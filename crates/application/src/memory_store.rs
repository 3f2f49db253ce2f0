//! 内存实现的持久化存储
//!
//! 单进程部署使用的默认存储，也用于测试。所有集合放在同一把
//! 读写锁后面，保证 id 分配与插入是一个原子步骤。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use domain::{
    DirectMessage, DirectMessageId, MessageContent, MessageId, PublicMessage, User, UserId,
    Username,
};
use tokio::sync::RwLock;

use crate::store::{
    MessageStore, NewDirectMessage, NewPublicMessage, NewUser, StoreError,
};

#[derive(Default)]
struct StoreInner {
    users: HashMap<UserId, User>,
    messages: Vec<PublicMessage>,
    direct_messages: Vec<DirectMessage>,
    next_user_id: i64,
    next_message_id: i64,
    next_direct_message_id: i64,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            next_user_id: 1,
            next_message_id: 1,
            next_direct_message_id: 1,
            ..Default::default()
        }
    }
}

pub struct InMemoryMessageStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::new()),
        }
    }

    fn system_username() -> Username {
        // 不可能失败：常量满足长度约束
        Username::parse("system").expect("valid system username")
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username.as_str() == username)
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|user| user.username == new_user.username)
        {
            return Err(StoreError::DuplicateUsername(
                new_user.username.as_str().to_owned(),
            ));
        }

        let id = UserId(inner.next_user_id);
        inner.next_user_id += 1;
        let user = User::register(id, new_user.username, new_user.password, new_user.email);
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.set_online(online);
        }
        Ok(())
    }

    async fn touch_last_seen(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.touch_last_seen(Utc::now());
        }
        Ok(())
    }

    async fn append_public_message(
        &self,
        message: NewPublicMessage,
    ) -> Result<PublicMessage, StoreError> {
        let mut inner = self.inner.write().await;
        let id = MessageId(inner.next_message_id);
        inner.next_message_id += 1;
        let stored = PublicMessage::chat(
            id,
            message.author_user_id,
            message.author_username,
            message.content,
            Utc::now(),
        );
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn append_system_message(&self, content: String) -> Result<PublicMessage, StoreError> {
        let content = MessageContent::new(content)
            .map_err(|err| StoreError::unavailable(err.to_string()))?;
        let mut inner = self.inner.write().await;
        let id = MessageId(inner.next_message_id);
        inner.next_message_id += 1;
        let stored = PublicMessage::system(id, Self::system_username(), content, Utc::now());
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_public_messages(&self) -> Result<Vec<PublicMessage>, StoreError> {
        let inner = self.inner.read().await;
        // 追加顺序即 id 顺序
        Ok(inner.messages.clone())
    }

    async fn append_direct_message(
        &self,
        message: NewDirectMessage,
    ) -> Result<DirectMessage, StoreError> {
        let mut inner = self.inner.write().await;
        let id = DirectMessageId(inner.next_direct_message_id);
        inner.next_direct_message_id += 1;
        let stored = DirectMessage::new(
            id,
            message.sender_id,
            message.sender_username,
            message.receiver_id,
            message.receiver_username,
            message.content,
            Utc::now(),
        );
        inner.direct_messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_direct_messages(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .direct_messages
            .iter()
            .filter(|dm| dm.is_between(user_a, user_b))
            .cloned()
            .collect())
    }

    async fn list_direct_messages_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<DirectMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .direct_messages
            .iter()
            .filter(|dm| dm.involves(user_id))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, sender_id: UserId, receiver_id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for dm in inner
            .direct_messages
            .iter_mut()
            .filter(|dm| dm.sender_id == sender_id && dm.receiver_id == receiver_id && !dm.read)
        {
            dm.mark_read();
        }
        Ok(())
    }

    async fn unread_counts(&self, user_id: UserId) -> Result<HashMap<UserId, u64>, StoreError> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<UserId, u64> = HashMap::new();
        for dm in inner
            .direct_messages
            .iter()
            .filter(|dm| dm.receiver_id == user_id && !dm.read)
        {
            *counts.entry(dm.sender_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
