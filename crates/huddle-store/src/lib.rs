//! # huddle-store
//!
//! In-memory state for the huddle chat client.
//!
//! Three service objects, wired by hand in dependency order:
//! [`CurrentUserStore`] (who is signed in, who else exists),
//! [`ChannelStore`] (channels, the active conversation, every message) and
//! [`ThreadStore`] (the open thread, kept in step with its root message).
//! Each owns its state behind a mutex and publishes it through
//! [`Observable`]s. Only the user's display name and avatar are persisted,
//! through a [`Preferences`] backend.

pub mod channels;
pub mod current_user;
pub mod database;
pub mod migrations;
pub mod observable;
pub mod preferences;
pub mod seed;
pub mod thread;
pub mod timeline;

mod error;

pub use channels::{is_system_channel, ChannelStore};
pub use current_user::{CurrentUserStore, ProfileEvent};
pub use database::Database;
pub use error::StoreError;
pub use observable::Observable;
pub use preferences::{MemoryPreferences, Preferences, SqlitePreferences};
pub use thread::{ReplySync, ThreadState, ThreadStore};
