//! Request authentication, status classification and retries shared by the
//! three REST adapters.

use std::sync::Arc;
use std::time::Duration;

use marketplace::{RetryPolicy, StorageError, StoreError};
use tracing::warn;

use crate::transport::{
    truncate_for_error, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use crate::SessionToken;

/// First back-off delay; doubled on every further attempt.
const RETRY_BASE: Duration = Duration::from_millis(200);

/// Upper bound on a single back-off delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Error code raised by the `accept_rental_request` procedure on a full
/// property.
const NO_ROOMS_CODE: &str = "no_rooms_available";

/// Why a request did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Failure {
    Transport(TransportError),
    Status { status: u16, body: String },
}

impl Failure {
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Failure::Status { status, .. } => Some(*status),
            Failure::Transport(_) => None,
        }
    }

    fn body(&self) -> &str {
        match self {
            Failure::Status { body, .. } => body,
            Failure::Transport(err) => &err.message,
        }
    }

    /// Maps the failure onto the data-store error vocabulary.
    pub(crate) fn into_store_error(self, context: &str) -> StoreError {
        if self.body().contains(NO_ROOMS_CODE) {
            return StoreError::NoRoomsAvailable;
        }
        match self {
            Failure::Transport(err) => StoreError::transient(format!("{context}: {err}")),
            Failure::Status { status, body } => {
                let message = format!("{context}: HTTP {status}: {body}");
                match status {
                    401 | 403 => StoreError::PermissionDenied { message },
                    404 => StoreError::NotFound { message },
                    409 => StoreError::Conflict { message },
                    429 | 500..=599 => StoreError::transient(message),
                    _ => StoreError::unavailable(message),
                }
            }
        }
    }

    /// Maps the failure onto the blob-storage error vocabulary.
    pub(crate) fn into_storage_error(self, context: &str) -> StorageError {
        match self {
            Failure::Transport(err) => StorageError::Unavailable {
                message: format!("{context}: {err}"),
            },
            Failure::Status { status, body } => {
                let message = format!("{context}: HTTP {status}: {body}");
                match status {
                    429 | 500..=599 => StorageError::Unavailable { message },
                    _ => StorageError::Rejected { message },
                }
            }
        }
    }
}

/// Transport plus credentials. Cheap to clone; clones share the session.
#[derive(Clone)]
pub(crate) struct RestClient {
    anon_key: String,
    transport: Arc<dyn HttpTransport>,
    session: SessionToken,
    max_retries: u32,
    retry_base: Duration,
}

impl RestClient {
    pub(crate) fn new(
        anon_key: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        session: SessionToken,
        max_retries: u32,
    ) -> Self {
        Self {
            anon_key: anon_key.into(),
            transport,
            session,
            max_retries,
            retry_base: RETRY_BASE,
        }
    }

    #[cfg(test)]
    pub(crate) fn without_backoff(mut self) -> Self {
        self.retry_base = Duration::ZERO;
        self
    }

    pub(crate) fn session(&self) -> &SessionToken {
        &self.session
    }

    /// Adds the API key and the signed-in user's bearer token (or the
    /// anonymous key when nobody is signed in).
    pub(crate) fn authorize(&self, request: HttpRequest) -> HttpRequest {
        let token = self
            .session
            .current()
            .unwrap_or_else(|| self.anon_key.clone());
        self.authorize_with(request, &token)
    }

    /// Authenticates as the anonymous role whatever the session holds.
    pub(crate) fn anonymous(&self, request: HttpRequest) -> HttpRequest {
        let key = self.anon_key.clone();
        self.authorize_with(request, &key)
    }

    /// Like [`RestClient::authorize`] with an explicit bearer token.
    pub(crate) fn authorize_with(&self, request: HttpRequest, token: &str) -> HttpRequest {
        request
            .header("apikey", self.anon_key.as_str())
            .header("Authorization", format!("Bearer {token}"))
    }

    /// Sends `request` once. Non-2xx responses become [`Failure::Status`].
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Failure> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(Failure::Transport)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(Failure::Status {
                status: response.status,
                body: truncate_for_error(&response.text()),
            })
        }
    }

    /// Sends an idempotent request, re-issuing it with exponential back-off
    /// while the failure is retryable and attempts remain.
    pub(crate) async fn send_idempotent(
        &self,
        request: HttpRequest,
        context: &str,
    ) -> Result<HttpResponse, StoreError> {
        let mut attempt = 0;
        loop {
            let error = match self.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure.into_store_error(context),
            };
            let delay = match error.retry_policy() {
                RetryPolicy::Retryable { after } if attempt < self.max_retries => {
                    after.unwrap_or_else(|| self.backoff(attempt))
                }
                _ => return Err(error),
            };
            attempt += 1;
            warn!(%error, attempt, delay_ms = delay.as_millis() as u64, "Retrying {context}");
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before re-attempt number `attempt + 1`, capped at
    /// [`MAX_RETRY_DELAY`].
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTransport;
    use crate::transport::HttpMethod;

    fn status(status: u16, body: &str) -> Failure {
        Failure::Status {
            status,
            body: body.to_owned(),
        }
    }

    #[test]
    fn statuses_map_to_store_errors() {
        assert!(matches!(
            status(401, "jwt expired").into_store_error("select"),
            StoreError::PermissionDenied { .. }
        ));
        assert!(matches!(
            status(404, "").into_store_error("rpc"),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            status(409, "duplicate key").into_store_error("insert"),
            StoreError::Conflict { .. }
        ));
        assert!(status(503, "").into_store_error("select").retry_policy().is_retryable());
        assert!(status(429, "").into_store_error("select").retry_policy().is_retryable());
        assert!(!status(400, "bad filter")
            .into_store_error("select")
            .retry_policy()
            .is_retryable());
        assert!(Failure::Transport(TransportError::new("reset"))
            .into_store_error("select")
            .retry_policy()
            .is_retryable());
    }

    fn client(stub: &StubTransport, max_retries: u32) -> RestClient {
        RestClient::new("anon-key", Arc::new(stub.clone()), SessionToken::new(), max_retries)
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let client = client(&StubTransport::new(), 2);
        assert_eq!(client.backoff(0), RETRY_BASE);
        assert_eq!(client.backoff(1), RETRY_BASE * 2);
        assert_eq!(client.backoff(5), MAX_RETRY_DELAY);
        assert_eq!(client.backoff(32), MAX_RETRY_DELAY);
        assert_eq!(client.backoff(u32::MAX), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn long_retry_runs_do_not_overflow() {
        let stub = StubTransport::new();
        for _ in 0..41 {
            stub.push(HttpResponse::new(503, "busy"));
        }
        let client = client(&stub, 40).without_backoff();
        let request = HttpRequest::new(HttpMethod::Get, "/rest/v1/messages");

        let err = client.send_idempotent(request, "select").await.unwrap_err();
        assert!(err.retry_policy().is_retryable());
        assert_eq!(stub.requests().len(), 41);
    }

    #[test]
    fn procedure_refusal_is_recognised() {
        let body = r#"{"code":"P0001","message":"no_rooms_available"}"#;
        assert_eq!(
            status(400, body).into_store_error("rpc"),
            StoreError::NoRoomsAvailable
        );
    }

    #[test]
    fn storage_errors_distinguish_outages_from_refusals() {
        assert!(matches!(
            status(413, "too large").into_storage_error("upload"),
            StorageError::Rejected { .. }
        ));
        assert!(matches!(
            status(502, "").into_storage_error("upload"),
            StorageError::Unavailable { .. }
        ));
    }
}
