//! 凭证校验
//!
//! 连接处理器在认证握手时调用。失败不区分"用户不存在"和
//! "密码错误"，统一返回 `InvalidCredentials`。

use std::sync::Arc;

use async_trait::async_trait;
use domain::User;
use thiserror::Error;
use tracing::warn;

use crate::password::{PasswordHasher, PasswordHasherError};
use crate::store::{MessageStore, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    /// 用户名或密码不正确
    #[error("invalid username or password")]
    InvalidCredentials,
    /// 校验过程中下游失败，与凭证错误区分开
    #[error("credential check unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

impl From<PasswordHasherError> for AuthError {
    fn from(err: PasswordHasherError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<User, AuthError>;
}

/// 用存储中的密码哈希做校验的默认实现。
pub struct StoreCredentialVerifier {
    store: Arc<dyn MessageStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl StoreCredentialVerifier {
    pub fn new(store: Arc<dyn MessageStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }
}

#[async_trait]
impl CredentialVerifier for StoreCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = match self.store.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                warn!(username, "authentication failed: unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if self.hasher.verify(password, &user.password).await? {
            Ok(user)
        } else {
            warn!(username, "authentication failed: bad password");
            Err(AuthError::InvalidCredentials)
        }
    }
}
