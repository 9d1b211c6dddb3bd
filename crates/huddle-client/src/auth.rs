//! Account sign-in, sign-up and password reset.
//!
//! The stores never talk to an identity service directly. A [`Session`]
//! calls an [`AuthProvider`] and feeds the resulting [`ExternalIdentity`]
//! into the current-user store.
//!
//! [`Session`]: crate::session::Session

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use huddle_shared::ExternalIdentity;

use crate::error::AuthError;

/// Shortest password either provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ExternalIdentity, AuthError>;

    /// Create an account and give it `name` as its display name.
    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<ExternalIdentity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Ask the service to send a password reset mail.
    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;

    /// The signed-in account, if any.
    fn current_identity(&self) -> Option<ExternalIdentity>;
}

// ----------------------------------------------------------------------------
// In-process accounts
// ----------------------------------------------------------------------------

struct Account {
    uid: String,
    display_name: String,
    password: String,
}

/// Accounts kept in memory. Used for headless sessions and tests.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<ExternalIdentity>>,
    reset_requests: Mutex<Vec<String>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an account.
    pub fn with_account(self, name: &str, email: &str, password: &str) -> Self {
        lock(&self.accounts).insert(
            normalize_email(email),
            Account {
                uid: Uuid::new_v4().to_string(),
                display_name: name.to_string(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Addresses a reset mail was requested for, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        lock(&self.reset_requests).clone()
    }

    fn identity(email: &str, account: &Account) -> ExternalIdentity {
        ExternalIdentity {
            uid: account.uid.clone(),
            display_name: Some(account.display_name.clone()),
            email: Some(email.to_string()),
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ExternalIdentity, AuthError> {
        let email = normalize_email(email);
        let identity = {
            let accounts = lock(&self.accounts);
            match accounts.get(&email) {
                Some(account) if account.password == password => Self::identity(&email, account),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        info!(uid = %identity.uid, "signed in");
        *lock(&self.current) = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<ExternalIdentity, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let email = normalize_email(email);
        let identity = {
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse);
            }
            let account = Account {
                uid: Uuid::new_v4().to_string(),
                display_name: name.trim().to_string(),
                password: password.to_string(),
            };
            let identity = Self::identity(&email, &account);
            accounts.insert(email, account);
            identity
        };

        info!(uid = %identity.uid, "account created");
        *lock(&self.current) = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match lock(&self.current).take() {
            Some(identity) => {
                info!(uid = %identity.uid, "signed out");
                Ok(())
            }
            None => Err(AuthError::NotSignedIn),
        }
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !lock(&self.accounts).contains_key(&email) {
            return Err(AuthError::UnknownAccount(email));
        }
        debug!(email = %email, "password reset requested");
        lock(&self.reset_requests).push(email);
        Ok(())
    }

    fn current_identity(&self) -> Option<ExternalIdentity> {
        lock(&self.current).clone()
    }
}

// ----------------------------------------------------------------------------
// Identity toolkit REST API
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

struct SignedIn {
    id_token: String,
    identity: ExternalIdentity,
}

/// Accounts managed by an identity toolkit compatible REST service.
pub struct IdentityToolkitAuth {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    session: Mutex<Option<SignedIn>>,
}

impl IdentityToolkitAuth {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            session: Mutex::new(None),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/accounts:{method}", self.endpoint);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let status = response.status();
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error.message,
            Err(_) => status.to_string(),
        };
        warn!(method, %status, %message, "identity toolkit call failed");
        Err(map_service_error(&message))
    }

    fn remember(&self, account: AccountResponse) -> ExternalIdentity {
        let identity = ExternalIdentity {
            uid: account.local_id,
            display_name: account.display_name.filter(|n| !n.is_empty()),
            email: account.email,
        };
        if let Some(id_token) = account.id_token {
            *lock(&self.session) = Some(SignedIn {
                id_token,
                identity: identity.clone(),
            });
        }
        identity
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ExternalIdentity, AuthError> {
        let account: AccountResponse = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = self.remember(account);
        info!(uid = %identity.uid, "signed in");
        Ok(identity)
    }

    async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<ExternalIdentity, AuthError> {
        let created: AccountResponse = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let id_token = created.id_token.clone().ok_or_else(|| {
            AuthError::Service("sign-up response carried no id token".to_string())
        })?;

        let updated: AccountResponse = self
            .call(
                "update",
                json!({ "idToken": id_token, "displayName": name.trim(), "returnSecureToken": true }),
            )
            .await?;

        let identity = self.remember(AccountResponse {
            id_token: updated.id_token.or(Some(id_token)),
            ..updated
        });
        info!(uid = %identity.uid, "account created");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match lock(&self.session).take() {
            Some(signed_in) => {
                info!(uid = %signed_in.identity.uid, "signed out");
                Ok(())
            }
            None => Err(AuthError::NotSignedIn),
        }
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        debug!(email, "password reset requested");
        Ok(())
    }

    fn current_identity(&self) -> Option<ExternalIdentity> {
        lock(&self.session).as_ref().map(|s| s.identity.clone())
    }
}

/// Translate an identity toolkit error code into an [`AuthError`].
fn map_service_error(message: &str) -> AuthError {
    let code = message.split([' ', ':']).next().unwrap_or(message);
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        },
        _ => AuthError::Service(message.to_string()),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
