pub mod direct_message;
pub mod message;
pub mod presence;
pub mod user;

pub use direct_message::DirectMessage;
pub use message::{MessageKind, PublicMessage};
pub use presence::PresenceEntry;
pub use user::User;
