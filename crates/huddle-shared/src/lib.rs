//! # huddle-shared
//!
//! Domain types shared by the store and client crates: users, channels,
//! chat messages with their reactions, and the fixed constants every
//! workspace starts from.

pub mod constants;
pub mod message;
pub mod types;

pub use message::{ChatMessage, MessageId, MessageIdGenerator, Reaction};
pub use types::{Channel, ConversationKey, ExternalIdentity, User, UserId};
