//! 应用层实现。
//!
//! 这里提供实时核心的三个组件（会话注册表、广播器、凭证校验），
//! 以及对外部协作者（持久化存储、密码哈希、时钟）的抽象。

pub mod auth;
pub mod broadcaster;
pub mod clock;
pub mod memory_store;
pub mod password;
pub mod registry;
pub mod store;

pub use auth::{AuthError, CredentialVerifier, StoreCredentialVerifier};
pub use broadcaster::Broadcaster;
pub use clock::{Clock, SystemClock};
pub use memory_store::InMemoryMessageStore;
pub use password::{BcryptPasswordHasher, PasswordHasher, PasswordHasherError};
pub use registry::{SessionCommand, SessionHandle, SessionRegistry, OUTBOUND_BUFFER};
pub use store::{MessageStore, NewDirectMessage, NewPublicMessage, NewUser, StoreError};
