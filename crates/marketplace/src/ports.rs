//! Port traits for the three external collaborators.
//!
//! The marketplace never talks to a network or a database directly. It asks
//! an [`AuthProvider`] who the user is, a [`DataStore`] for rows, and a
//! [`BlobStorage`] for images. Infrastructure crates supply the
//! implementations; workflows hold them as `Arc<dyn Trait>`.
//!
//! The data-store port is deliberately untyped (JSON rows keyed by
//! [`Table`]) so that adapters stay thin. The free functions at the bottom of
//! this module bridge to the typed [`Record`] world.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AuthError, BlobPath, BucketName, EmailAddress, Filter, ProfileId, Query, Record, StorageError,
    StoreError, Table, Timestamp,
};

/// Name of the stored procedure that accepts a rental request.
///
/// Arguments: `{ "request_id": "<uuid>" }`. Returns the created `rentals` row.
///
/// Executed atomically by the data store:
///
/// 1. the request must exist and be `pending` (else [`StoreError::Conflict`]);
/// 2. the property must have `available_rooms > 0`
///    (else [`StoreError::NoRoomsAvailable`]);
/// 3. the assigned room number is `total_rooms - available_rooms + 1`;
/// 4. `available_rooms` is decremented and `is_available` cleared at zero;
/// 5. the request becomes `accepted` with `responded_at = now`;
/// 6. an `active` rental starting on `desired_move_in` at the property's
///    current rent is inserted and returned.
pub const ACCEPT_RENTAL_REQUEST: &str = "accept_rental_request";

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// An authenticated session issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: ProfileId,
    pub email: EmailAddress,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
}

impl AuthSession {
    /// Returns `true` if the access token is no longer valid at `now`.
    ///
    /// Sessions are treated as expired a little early so that a request
    /// issued right before expiry does not fail in flight.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.plus_seconds(30) >= self.expires_at
    }
}

/// The account behind an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: ProfileId,
    pub email: EmailAddress,
}

/// Sign-up, sign-in and session management.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates an account and returns a signed-in session.
    async fn sign_up(&self, email: &EmailAddress, password: &str)
        -> Result<AuthSession, AuthError>;

    /// Exchanges credentials for a session.
    async fn sign_in(&self, email: &EmailAddress, password: &str)
        -> Result<AuthSession, AuthError>;

    /// Revokes the session.
    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;

    /// Exchanges a refresh token for a fresh session.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;

    /// Resolves an access token to its account.
    async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;
}

// ---------------------------------------------------------------------------
// Relational data
// ---------------------------------------------------------------------------

/// Query / insert / update / delete over the marketplace tables.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns the rows of `table` matching `query`.
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Inserts one row and returns it as stored (with `id` and `created_at`).
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError>;

    /// Merges `patch` into every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Deletes every row matching `filters`; returns how many were removed.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Counts the rows matching `filters`.
    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Invokes a stored procedure.
    async fn rpc(&self, name: &str, args: Value) -> Result<Value, StoreError>;
}

// ---------------------------------------------------------------------------
// Blob storage
// ---------------------------------------------------------------------------

/// Object storage for property images.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores `bytes` at `path`, replacing any existing object, and returns
    /// its public URL.
    async fn upload(
        &self,
        bucket: &BucketName,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Removes the object at `path`. Removing a missing object is not an error.
    async fn remove(&self, bucket: &BucketName, path: &BlobPath) -> Result<(), StorageError>;

    /// Returns the public URL an object at `path` is (or would be) served from.
    fn public_url(&self, bucket: &BucketName, path: &BlobPath) -> String;

    /// Recovers the object path from a URL produced by [`BlobStorage::public_url`].
    fn path_from_url(&self, bucket: &BucketName, url: &str) -> Option<BlobPath> {
        let marker = format!("/{}/", bucket.as_str());
        let start = url.find(&marker)? + marker.len();
        BlobPath::new(&url[start..])
    }
}

// ---------------------------------------------------------------------------
// Typed helpers
// ---------------------------------------------------------------------------

fn decode<R: Record>(row: Value) -> Result<R, StoreError> {
    serde_json::from_value(row).map_err(|err| StoreError::Decode {
        table: R::TABLE.to_string(),
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(table: Table, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Decode {
        table: table.to_string(),
        message: err.to_string(),
    })
}

/// Filter matching a row's primary key.
pub fn id_filter(id: impl std::fmt::Display) -> Filter {
    Filter::Eq("id".to_owned(), Value::String(id.to_string()))
}

/// Selects and decodes every row of `R` matching `query`.
pub async fn fetch_all<R: Record>(
    store: &dyn DataStore,
    query: &Query,
) -> Result<Vec<R>, StoreError> {
    store
        .select(R::TABLE, query)
        .await?
        .into_iter()
        .map(decode::<R>)
        .collect()
}

/// Fetches one row of `R` by primary key.
pub async fn fetch_one<R: Record>(
    store: &dyn DataStore,
    id: R::Id,
) -> Result<Option<R>, StoreError> {
    let query = Query::new().filter(id_filter(id)).limit(1);
    let mut rows = store.select(R::TABLE, &query).await?;
    if rows.is_empty() {
        Ok(None)
    } else {
        decode(rows.swap_remove(0)).map(Some)
    }
}

/// Inserts `row` into `R`'s table and decodes the stored row.
pub async fn insert_record<R: Record, N: Serialize + Sync>(
    store: &dyn DataStore,
    row: &N,
) -> Result<R, StoreError> {
    let stored = store.insert(R::TABLE, encode(R::TABLE, row)?).await?;
    decode(stored)
}

/// Applies `patch` to the row of `R` with primary key `id`.
///
/// Returns `None` if no such row exists.
pub async fn update_record<R: Record>(
    store: &dyn DataStore,
    id: R::Id,
    patch: Value,
) -> Result<Option<R>, StoreError> {
    let mut rows = store.update(R::TABLE, &[id_filter(id)], patch).await?;
    if rows.is_empty() {
        Ok(None)
    } else {
        decode(rows.swap_remove(0)).map(Some)
    }
}

/// Applies `patch` to every row of `R` matching `filters`.
pub async fn update_where<R: Record>(
    store: &dyn DataStore,
    filters: &[Filter],
    patch: Value,
) -> Result<Vec<R>, StoreError> {
    store
        .update(R::TABLE, filters, patch)
        .await?
        .into_iter()
        .map(decode::<R>)
        .collect()
}

/// Invokes a stored procedure whose result is a row of `R`.
pub async fn call_procedure<R: Record>(
    store: &dyn DataStore,
    name: &str,
    args: Value,
) -> Result<R, StoreError> {
    decode(store.rpc(name, args).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedUrlStorage;

    #[async_trait]
    impl BlobStorage for FixedUrlStorage {
        async fn upload(
            &self,
            bucket: &BucketName,
            path: &BlobPath,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<String, StorageError> {
            Ok(self.public_url(bucket, path))
        }

        async fn remove(&self, _: &BucketName, _: &BlobPath) -> Result<(), StorageError> {
            Ok(())
        }

        fn public_url(&self, bucket: &BucketName, path: &BlobPath) -> String {
            format!("https://cdn.example/object/public/{bucket}/{path}")
        }
    }

    #[test]
    fn path_is_recovered_from_public_url() {
        let storage = FixedUrlStorage;
        let bucket = BucketName::new("images").unwrap();
        let path = BlobPath::new("properties/1/a.jpg").unwrap();
        let url = storage.public_url(&bucket, &path);
        assert_eq!(storage.path_from_url(&bucket, &url), Some(path));
        assert_eq!(storage.path_from_url(&bucket, "https://elsewhere/x.jpg"), None);
    }

    #[test]
    fn session_expires_slightly_early() {
        let now = Timestamp::now();
        let session = AuthSession {
            user_id: ProfileId::new_random(),
            email: EmailAddress::new("a@b.be").unwrap(),
            access_token: "t".into(),
            refresh_token: "r".into(),
            expires_at: now.plus_seconds(10),
        };
        assert!(session.is_expired(now));
        assert!(!AuthSession {
            expires_at: now.plus_seconds(3600),
            ..session
        }
        .is_expired(now));
    }
}
