use thiserror::Error;

use huddle_store::StoreError;

/// Failures reported by an [`AuthProvider`](crate::auth::AuthProvider).
///
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailInUse,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("No account found for {0}")]
    UnknownAccount(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth service error: {0}")]
    Service(String),
}

/// Failures of a [`FileStorage`](crate::files::FileStorage) upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid upload path: {0}")]
    InvalidPath(String),

    #[error("Upload IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload was interrupted")]
    Interrupted,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
