//! # huddle-client
//!
//! Collaborators and wiring for the huddle chat core: authentication,
//! attachment storage, configuration and the [`Session`] that ties the
//! stores from `huddle-store` to them.

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod mentions;
pub mod session;

use tracing_subscriber::{fmt, EnvFilter};

pub use auth::{AuthProvider, IdentityToolkitAuth, MemoryAuth};
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, UploadError};
pub use files::{FileStorage, LocalFileStorage, UploadTask};
pub use session::Session;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("huddle_client=debug,huddle_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(app = huddle_shared::constants::APP_NAME, "tracing initialized");
    }
}
