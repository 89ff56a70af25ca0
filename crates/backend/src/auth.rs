//! [`AuthProvider`] over the hosted auth API (`/auth/v1`).

use async_trait::async_trait;
use marketplace::{
    AuthError, AuthProvider, AuthSession, AuthUser, EmailAddress, ProfileId, Timestamp,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::client::{Failure, RestClient};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse};

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: ProfileId,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserPayload,
}

/// Auth adapter. Successful sign-in, sign-up, refresh and token checks store
/// the access token in the shared session so the data-store and storage
/// adapters act as that user.
#[derive(Clone)]
pub struct RestAuth {
    client: RestClient,
}

impl std::fmt::Debug for RestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestAuth")
            .field("session", self.client.session())
            .finish_non_exhaustive()
    }
}

impl RestAuth {
    pub(crate) fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn session_from(&self, response: &HttpResponse) -> Result<AuthSession, AuthError> {
        let payload: TokenPayload = serde_json::from_slice(&response.body).map_err(|err| {
            AuthError::Unavailable {
                message: format!("unexpected auth response: {err}"),
            }
        })?;
        let email = EmailAddress::new(&payload.user.email).ok_or_else(|| AuthError::Unavailable {
            message: format!("auth provider returned invalid e-mail '{}'", payload.user.email),
        })?;
        self.client.session().set(payload.access_token.as_str());
        Ok(AuthSession {
            user_id: payload.user.id,
            email,
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expires_at: Timestamp::now().plus_seconds(payload.expires_in),
        })
    }
}

fn unavailable(context: &str, failure: Failure) -> AuthError {
    AuthError::Unavailable {
        message: match failure {
            Failure::Transport(err) => format!("{context}: {err}"),
            Failure::Status { status, body } => format!("{context}: HTTP {status}: {body}"),
        },
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let request = self.client.anonymous(
            HttpRequest::new(HttpMethod::Post, "/auth/v1/signup")
                .json(json!({ "email": email.as_str(), "password": password })),
        );
        let response = match self.client.send(request).await {
            Ok(response) => response,
            Err(Failure::Status {
                status: 400 | 422,
                body,
            }) if body.to_lowercase().contains("already") => {
                return Err(AuthError::EmailTaken {
                    email: email.to_string(),
                });
            }
            Err(failure) => return Err(unavailable("sign-up", failure)),
        };

        // Projects that require e-mail confirmation return the user without
        // a session.
        let has_session = serde_json::from_slice::<serde_json::Value>(&response.body)
            .ok()
            .is_some_and(|body| body.get("access_token").is_some());
        if !has_session {
            return Err(AuthError::Unavailable {
                message: "account created; confirm the e-mail address, then sign in".into(),
            });
        }
        let session = self.session_from(&response)?;
        info!(user_id = %session.user_id, "Signed up");
        Ok(session)
    }

    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let request = self.client.anonymous(
            HttpRequest::new(HttpMethod::Post, "/auth/v1/token")
                .query("grant_type", "password")
                .json(json!({ "email": email.as_str(), "password": password })),
        );
        match self.client.send(request).await {
            Ok(response) => self.session_from(&response),
            Err(failure) if matches!(failure.status(), Some(400 | 401)) => {
                Err(AuthError::InvalidCredentials)
            }
            Err(failure) => Err(unavailable("sign-in", failure)),
        }
    }

    #[instrument(skip_all, fields(user_id = %session.user_id))]
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let request = self.client.authorize_with(
            HttpRequest::new(HttpMethod::Post, "/auth/v1/logout"),
            &session.access_token,
        );
        let result = self.client.send(request).await;
        self.client.session().clear();
        match result {
            Ok(_) => Ok(()),
            // Already expired or revoked on the server: the local session is
            // gone either way.
            Err(failure) if matches!(failure.status(), Some(401 | 403 | 404)) => {
                warn!("Session was already invalid at sign-out");
                Ok(())
            }
            Err(failure) => Err(unavailable("sign-out", failure)),
        }
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let request = self.client.anonymous(
            HttpRequest::new(HttpMethod::Post, "/auth/v1/token")
                .query("grant_type", "refresh_token")
                .json(json!({ "refresh_token": refresh_token })),
        );
        match self.client.send(request).await {
            Ok(response) => self.session_from(&response),
            Err(failure) if matches!(failure.status(), Some(400 | 401 | 403)) => {
                self.client.session().clear();
                Err(AuthError::SessionExpired)
            }
            Err(failure) => Err(unavailable("token refresh", failure)),
        }
    }

    #[instrument(skip_all)]
    async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let request = self.client.authorize_with(
            HttpRequest::new(HttpMethod::Get, "/auth/v1/user"),
            access_token,
        );
        let response = match self.client.send(request).await {
            Ok(response) => response,
            Err(failure) if matches!(failure.status(), Some(401 | 403)) => {
                return Err(AuthError::SessionExpired)
            }
            Err(failure) => return Err(unavailable("user lookup", failure)),
        };
        let user: UserPayload = serde_json::from_slice(&response.body).map_err(|err| {
            AuthError::Unavailable {
                message: format!("unexpected user response: {err}"),
            }
        })?;
        let email = EmailAddress::new(&user.email).ok_or_else(|| AuthError::Unavailable {
            message: format!("auth provider returned invalid e-mail '{}'", user.email),
        })?;
        self.client.session().set(access_token);
        Ok(AuthUser { id: user.id, email })
    }
}
