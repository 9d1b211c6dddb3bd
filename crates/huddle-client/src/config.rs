//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a headless session starts with zero
//! configuration.

use std::path::PathBuf;

use huddle_shared::constants::{DEFAULT_USER_ID, MAX_UPLOAD_SIZE};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding `huddle.db`.
    /// Env: `HUDDLE_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Root directory uploaded files are written under.
    /// Env: `HUDDLE_UPLOAD_DIR`
    /// Default: `./storage`
    pub upload_dir: PathBuf,

    /// Base URL uploaded files are served from.
    /// Env: `HUDDLE_PUBLIC_URL`
    /// Default: `http://localhost:8080/files`
    pub public_url: String,

    /// Maximum upload size in bytes.
    /// Env: `HUDDLE_MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,

    /// Identity toolkit REST endpoint.
    /// Env: `HUDDLE_AUTH_ENDPOINT`
    pub auth_endpoint: String,

    /// API key for the identity toolkit. Without one, accounts are kept in
    /// memory.
    /// Env: `HUDDLE_AUTH_API_KEY`
    pub auth_api_key: Option<String>,

    /// Roster id of the user this client acts as.
    /// Env: `HUDDLE_USER_ID`
    /// Default: `frederik`
    pub user_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            upload_dir: PathBuf::from("./storage"),
            public_url: "http://localhost:8080/files".to_string(),
            max_upload_size: MAX_UPLOAD_SIZE,
            auth_endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            auth_api_key: None,
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = var("HUDDLE_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = var("HUDDLE_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(url) = var("HUDDLE_PUBLIC_URL") {
            config.public_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = var("HUDDLE_MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid HUDDLE_MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(url) = var("HUDDLE_AUTH_ENDPOINT") {
            config.auth_endpoint = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = var("HUDDLE_AUTH_API_KEY") {
            if !key.is_empty() {
                config.auth_api_key = Some(key);
            }
        }

        if let Some(id) = var("HUDDLE_USER_ID") {
            let id = id.trim();
            if id.is_empty() {
                tracing::warn!("Empty HUDDLE_USER_ID, using default");
            } else {
                config.user_id = id.to_string();
            }
        }

        config
    }

    /// Location of the preferences database.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("huddle.db"))
    }
}
