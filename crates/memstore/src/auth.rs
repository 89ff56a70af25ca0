//! [`AuthProvider`] implementation.
//!
//! Accounts are keyed by normalised e-mail. Passwords are stored as salted
//! SHA-256 digests; tokens are random UUIDs. Refreshing rotates both tokens.

use async_trait::async_trait;
use marketplace::{
    AuthError, AuthProvider, AuthSession, AuthUser, EmailAddress, ProfileId, Timestamp,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{MemoryBackend, State};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UserAccount {
    pub(crate) id: ProfileId,
    pub(crate) email: EmailAddress,
    pub(crate) salt: String,
    pub(crate) password_hash: String,
}

/// A session as remembered by the backend, keyed by access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IssuedSession {
    pub(crate) user_id: ProfileId,
    pub(crate) refresh_token: String,
    pub(crate) expires_at: Timestamp,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// How long after its access token expires a session can still be refreshed.
pub(crate) const REFRESH_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl State {
    fn issue_session(&mut self, account: &UserAccount, ttl_secs: i64) -> AuthSession {
        let now = Timestamp::now();
        self.sessions
            .retain(|_, issued| issued.expires_at.plus_seconds(REFRESH_WINDOW_SECS) > now);
        let access_token = random_token();
        let refresh_token = random_token();
        let expires_at = now.plus_seconds(ttl_secs);
        self.sessions.insert(
            access_token.clone(),
            IssuedSession {
                user_id: account.id,
                refresh_token: refresh_token.clone(),
                expires_at,
            },
        );
        AuthSession {
            user_id: account.id,
            email: account.email.clone(),
            access_token,
            refresh_token,
            expires_at,
        }
    }

    fn account_by_id(&self, id: ProfileId) -> Option<&UserAccount> {
        self.users.values().find(|account| account.id == id)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(email.as_str()) {
            warn!("Sign-up refused, address already registered");
            return Err(AuthError::EmailTaken {
                email: email.to_string(),
            });
        }
        let salt = random_token();
        let account = UserAccount {
            id: ProfileId::new_random(),
            email: email.clone(),
            password_hash: hash_password(&salt, password),
            salt,
        };
        state.users.insert(email.as_str().to_owned(), account.clone());
        info!(user_id = %account.id, "Account created");
        Ok(state.issue_session(&account, self.session_ttl_secs))
    }

    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let mut state = self.state.lock().await;
        let account = state
            .users
            .get(email.as_str())
            .filter(|account| hash_password(&account.salt, password) == account.password_hash)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        Ok(state.issue_session(&account, self.session_ttl_secs))
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        state.sessions.remove(&session.access_token);
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let mut state = self.state.lock().await;
        let access_token = state
            .sessions
            .iter()
            .find(|(_, issued)| issued.refresh_token == refresh_token)
            .map(|(token, _)| token.clone())
            .ok_or(AuthError::SessionExpired)?;
        let issued = state
            .sessions
            .remove(&access_token)
            .ok_or(AuthError::SessionExpired)?;
        if issued.expires_at.plus_seconds(REFRESH_WINDOW_SECS) <= Timestamp::now() {
            return Err(AuthError::SessionExpired);
        }
        let account = state
            .account_by_id(issued.user_id)
            .cloned()
            .ok_or(AuthError::SessionExpired)?;
        Ok(state.issue_session(&account, self.session_ttl_secs))
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let state = self.state.lock().await;
        let issued = state
            .sessions
            .get(access_token)
            .ok_or(AuthError::SessionExpired)?;
        if issued.expires_at <= Timestamp::now() {
            return Err(AuthError::SessionExpired);
        }
        let account = state
            .account_by_id(issued.user_id)
            .ok_or(AuthError::SessionExpired)?;
        Ok(AuthUser {
            id: account.id,
            email: account.email.clone(),
        })
    }
}
