//! [`BlobStorage`] over the hosted object storage API (`/storage/v1`).

use async_trait::async_trait;
use marketplace::{BlobPath, BlobStorage, BucketName, StorageError};
use tracing::{info, instrument};

use crate::client::RestClient;
use crate::transport::{HttpMethod, HttpRequest};

#[derive(Clone)]
pub struct RestStorage {
    base_url: String,
    client: RestClient,
}

impl std::fmt::Debug for RestStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStorage")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestStorage {
    pub(crate) fn new(base_url: impl Into<String>, client: RestClient) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

fn object_path(bucket: &BucketName, path: &BlobPath) -> String {
    format!("/storage/v1/object/{bucket}/{path}")
}

#[async_trait]
impl BlobStorage for RestStorage {
    #[instrument(skip(self, bytes), fields(%bucket, %path, size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &BucketName,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let request = self.client.authorize(
            HttpRequest::new(HttpMethod::Post, object_path(bucket, path))
                .header("x-upsert", "true")
                .bytes(content_type, bytes),
        );
        self.client
            .send(request)
            .await
            .map_err(|failure| failure.into_storage_error("upload"))?;
        info!("Object uploaded");
        Ok(self.public_url(bucket, path))
    }

    #[instrument(skip(self), fields(%bucket, %path))]
    async fn remove(&self, bucket: &BucketName, path: &BlobPath) -> Result<(), StorageError> {
        let request = self
            .client
            .authorize(HttpRequest::new(HttpMethod::Delete, object_path(bucket, path)));
        match self.client.send(request).await {
            Ok(_) => Ok(()),
            Err(failure) if failure.status() == Some(404) => Ok(()),
            Err(failure) => Err(failure.into_storage_error("remove")),
        }
    }

    fn public_url(&self, bucket: &BucketName, path: &BlobPath) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }
}
