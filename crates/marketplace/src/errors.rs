//! Error and retry-policy types for the Linkier marketplace domain.
//!
//! Each port has its own error type ([`StoreError`], [`AuthError`],
//! [`StorageError`]) produced by infrastructure adapters. Workflows return
//! [`LinkierError`], which wraps the port errors and adds the domain-level
//! refusals (validation, ownership, lifecycle).
//!
//! [`RetryPolicy`] is a cross-cutting concern: adapters consult it to decide
//! whether an idempotent call may be re-issued.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: timeouts, connection failures, HTTP 429 and 5xx.
/// - `NonRetryable` errors: permission denied, conflicts, malformed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::DataStore`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The data store could not be reached or failed internally.
    #[error("Data store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// Whether the call may be re-issued.
        retryable: bool,
    },

    /// The addressed row or procedure does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// The write conflicts with the current state (unique key, stale status).
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Row-level security or authentication refused the call.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Description of the refusal.
        message: String,
    },

    /// A row could not be converted to or from its record type.
    #[error("Malformed row in '{table}': {message}")]
    Decode {
        /// Table the row came from.
        table: String,
        /// Serde error text.
        message: String,
    },

    /// `accept_rental_request` found no free room on the property.
    #[error("No rooms available on the property")]
    NoRoomsAvailable,
}

impl StoreError {
    /// Shorthand for a non-retryable [`StoreError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            retryable: false,
        }
    }

    /// Shorthand for a retryable [`StoreError::Unavailable`].
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            retryable: true,
        }
    }

    /// Returns the retry policy for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            StoreError::Unavailable {
                retryable: true, ..
            } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Failures reported by an [`crate::AuthProvider`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// E-mail and password do not match an account.
    #[error("Invalid e-mail or password")]
    InvalidCredentials,

    /// Sign-up was attempted for an address that already has an account.
    #[error("An account already exists for {email}")]
    EmailTaken {
        /// The address in use.
        email: String,
    },

    /// The session token expired or was revoked; sign in again.
    #[error("Session expired")]
    SessionExpired,

    /// The authentication provider could not be reached or rejected the call.
    #[error("Authentication provider unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// Failures reported by a [`crate::BlobStorage`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// The storage service could not be reached.
    #[error("Blob storage unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The storage service refused the object (size, type, permissions).
    #[error("Blob storage rejected the request: {message}")]
    Rejected {
        /// Description of the refusal.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Workflow-level errors
// ---------------------------------------------------------------------------

/// Errors returned by every marketplace workflow.
#[derive(Debug, Error)]
pub enum LinkierError {
    /// User input failed validation. Nothing was written.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Name of the offending input.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The addressed entity does not exist (or is not visible to the actor).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind (e.g. `"property"`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The acting user's role or ownership does not permit the operation.
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Why the actor may not do this.
        reason: String,
    },

    /// The entity's current status does not allow the requested change.
    #[error("Cannot move {entity} from '{from}' to '{to}'")]
    InvalidTransition {
        /// Entity kind.
        entity: &'static str,
        /// Current status wire value.
        from: &'static str,
        /// Requested status wire value.
        to: &'static str,
    },

    /// A rental request cannot be accepted because the property is full.
    #[error("No rooms available on this property")]
    NoRoomsAvailable,

    /// The account exists but its profile could not be stored. Signing up
    /// again with the same password finishes the registration.
    #[error("Sign-up incomplete for {email}: {reason}")]
    IncompleteSignUp {
        /// The registered address.
        email: String,
        /// Why the profile was not stored.
        reason: String,
    },

    /// The configuration or runtime configuration is invalid.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// Data store failure.
    #[error(transparent)]
    Store(StoreError),

    /// Authentication failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Blob storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LinkierError {
    /// Shorthand for [`LinkierError::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for [`LinkierError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`LinkierError::Forbidden`].
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for LinkierError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoRoomsAvailable => LinkierError::NoRoomsAvailable,
            other => LinkierError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_unavailability_is_retryable() {
        assert!(StoreError::transient("timeout").retry_policy().is_retryable());
        assert!(!StoreError::unavailable("bad request").retry_policy().is_retryable());
        assert_eq!(
            StoreError::Conflict { message: "dup".into() }.retry_policy(),
            RetryPolicy::NonRetryable
        );
    }

    #[test]
    fn no_rooms_is_lifted_to_domain_error() {
        let err: LinkierError = StoreError::NoRoomsAvailable.into();
        assert!(matches!(err, LinkierError::NoRoomsAvailable));

        let err: LinkierError = StoreError::NotFound { message: "x".into() }.into();
        assert!(matches!(err, LinkierError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn messages_name_the_entity() {
        let err = LinkierError::InvalidTransition {
            entity: "viewing",
            from: "declined",
            to: "confirmed",
        };
        assert_eq!(err.to_string(), "Cannot move viewing from 'declined' to 'confirmed'");
        assert_eq!(
            LinkierError::not_found("property", "abc").to_string(),
            "property abc not found"
        );
    }
}
