//! Linkier hosted-backend adapter.
//!
//! Implements the three marketplace ports over a hosted
//! backend-as-a-service reached through its REST APIs:
//!
//! | Port | Adapter | API |
//! |------|---------|-----|
//! | [`marketplace::AuthProvider`] | [`RestAuth`] | `/auth/v1` (password grant, refresh, logout) |
//! | [`marketplace::DataStore`] | [`RestDataStore`] | `/rest/v1/{table}`, `/rest/v1/rpc/{name}` |
//! | [`marketplace::BlobStorage`] | [`RestStorage`] | `/storage/v1/object/{bucket}/{path}` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All three adapters share one [`SessionToken`]: once a
//! user signs in, table and storage calls carry that user's bearer token so
//! the backend's row-level security applies. Signed out, calls carry the
//! anonymous key.
//!
//! HTTP goes through the [`HttpTransport`] trait; [`ReqwestTransport`] is the
//! production implementation. Idempotent reads (`select`, `count`) are
//! retried on transient failures with exponential back-off; writes never
//! are.

use std::sync::Arc;

use marketplace::{BucketName, LinkierError};
use tracing::info;

mod auth;
mod client;
pub mod config;
mod session;
mod storage;
mod store;
pub mod transport;

pub use auth::RestAuth;
pub use config::BackendConfig;
pub use session::SessionToken;
pub use storage::RestStorage;
pub use store::RestDataStore;
pub use transport::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    TransportError,
};

use client::RestClient;

/// The three adapters of one hosted project, sharing a session.
#[derive(Debug, Clone)]
pub struct HostedBackend {
    pub auth: Arc<RestAuth>,
    pub store: Arc<RestDataStore>,
    pub storage: Arc<RestStorage>,
    session: SessionToken,
    bucket: BucketName,
}

impl HostedBackend {
    /// Builds the adapters over a reqwest transport.
    pub fn connect(config: &BackendConfig) -> Result<Self, LinkierError> {
        let transport = ReqwestTransport::new(config.url.as_str(), config.timeout).map_err(|err| {
            LinkierError::ConfigurationError {
                message: err.to_string(),
            }
        })?;
        info!(url = %config.url, "Connecting to hosted backend");
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Builds the adapters over a caller-supplied transport.
    pub fn with_transport(config: &BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let session = SessionToken::new();
        let client = RestClient::new(
            config.anon_key.as_str(),
            transport,
            session.clone(),
            config.max_retries,
        );
        Self::from_client(config, client, session)
    }

    fn from_client(config: &BackendConfig, client: RestClient, session: SessionToken) -> Self {
        Self {
            auth: Arc::new(RestAuth::new(client.clone())),
            store: Arc::new(RestDataStore::new(client.clone())),
            storage: Arc::new(RestStorage::new(config.url.as_str(), client)),
            session,
            bucket: config.storage_bucket.clone(),
        }
    }

    /// The token shared by all three adapters.
    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    /// Bucket property images are stored in.
    pub fn image_bucket(&self) -> &BucketName {
        &self.bucket
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{stub_backend, StubTransport};
    use super::*;
    use marketplace::{AuthProvider, DataStore, EmailAddress, Query, Table};
    use serde_json::json;

    #[tokio::test]
    async fn signing_in_switches_table_calls_to_the_user_token() {
        let stub = StubTransport::new();
        stub.push(HttpResponse::json(200, &json!([])));
        stub.push(HttpResponse::json(
            200,
            &json!({
                "access_token": "user-token",
                "refresh_token": "r",
                "expires_in": 3600,
                "user": { "id": "6a2f41a3-c54c-4b2c-9c5f-3c1c2f1d0b77", "email": "ana@uni.be" }
            }),
        ));
        stub.push(HttpResponse::json(200, &json!([])));
        let backend = stub_backend(&stub);

        backend.store.select(Table::Properties, &Query::new()).await.unwrap();
        let email = EmailAddress::new("ana@uni.be").unwrap();
        backend.auth.sign_in(&email, "password123").await.unwrap();
        backend.store.select(Table::Properties, &Query::new()).await.unwrap();

        let sent = stub.requests();
        assert_eq!(sent[0].header_value("Authorization"), Some("Bearer anon-key"));
        assert_eq!(sent[2].header_value("Authorization"), Some("Bearer user-token"));
        assert_eq!(sent[2].header_value("apikey"), Some("anon-key"));
    }

    #[test]
    fn connect_uses_the_configured_bucket() {
        let config = BackendConfig::new("https://abc.example.co/", "key")
            .unwrap()
            .with_storage_bucket(BucketName::new("photos").unwrap());
        let backend = HostedBackend::connect(&config).unwrap();
        assert_eq!(backend.image_bucket().as_str(), "photos");
        assert!(format!("{backend:?}").contains("anonymous"));
    }
}
