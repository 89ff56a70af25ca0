//! [`BlobStorage`] implementation.

use async_trait::async_trait;
use marketplace::{BlobPath, BlobStorage, BucketName, StorageError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::MemoryBackend;

/// Upper bound on a single object, mirroring the hosted bucket limit.
pub const MAX_OBJECT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredBlob {
    pub(crate) content_type: String,
    pub(crate) bytes: Vec<u8>,
}

fn blob_key(bucket: &BucketName, path: &BlobPath) -> String {
    format!("{bucket}/{path}")
}

impl MemoryBackend {
    /// Returns the stored bytes and content type of an object, if present.
    pub async fn blob(&self, bucket: &BucketName, path: &BlobPath) -> Option<(String, Vec<u8>)> {
        let state = self.state.lock().await;
        state
            .blobs
            .get(&blob_key(bucket, path))
            .map(|blob| (blob.content_type.clone(), blob.bytes.clone()))
    }
}

#[async_trait]
impl BlobStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &BucketName,
        path: &BlobPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if bytes.len() > MAX_OBJECT_BYTES {
            return Err(StorageError::Rejected {
                message: format!("object of {} bytes exceeds the bucket limit", bytes.len()),
            });
        }
        let mut state = self.state.lock().await;
        debug!(%bucket, %path, size = bytes.len(), "Stored object");
        state.blobs.insert(
            blob_key(bucket, path),
            StoredBlob {
                content_type: content_type.to_owned(),
                bytes,
            },
        );
        Ok(self.public_url(bucket, path))
    }

    async fn remove(&self, bucket: &BucketName, path: &BlobPath) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.blobs.remove(&blob_key(bucket, path));
        Ok(())
    }

    fn public_url(&self, bucket: &BucketName, path: &BlobPath) -> String {
        format!("memory://{bucket}/{path}")
    }
}
