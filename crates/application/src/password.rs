//! 密码哈希服务
//!
//! bcrypt 是 CPU 密集操作，放到阻塞线程池上执行，
//! 避免卡住异步运行时。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("failed to verify password: {0}")]
    Verify(String),
    #[error("hashing task was cancelled")]
    TaskCancelled,
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plain: &str) -> Result<PasswordHash, PasswordHasherError>;
    async fn verify(&self, plain: &str, hash: &PasswordHash)
        -> Result<bool, PasswordHasherError>;
}

/// 基于 bcrypt 的默认实现。
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(bcrypt::DEFAULT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plain: &str) -> Result<PasswordHash, PasswordHasherError> {
        let plain = plain.to_owned();
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
            .await
            .map_err(|_| PasswordHasherError::TaskCancelled)?
            .map_err(|err| PasswordHasherError::Hash(err.to_string()))?;
        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::Hash(err.to_string()))
    }

    async fn verify(
        &self,
        plain: &str,
        hash: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plain = plain.to_owned();
        let hash = hash.as_str().to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
            .await
            .map_err(|_| PasswordHasherError::TaskCancelled)?
            .map_err(|err| PasswordHasherError::Verify(err.to_string()))
    }
}
