//! Linkier in-process backend.
//!
//! [`MemoryBackend`] implements all three marketplace ports
//! ([`marketplace::AuthProvider`], [`marketplace::DataStore`],
//! [`marketplace::BlobStorage`]) against state held in memory, including the
//! `accept_rental_request` stored procedure. It backs the workflow test
//! suites and the CLI's offline mode, where the state is persisted between
//! invocations as a JSON snapshot ([`MemoryBackend::load`] /
//! [`MemoryBackend::save`]).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Filter semantics come from [`marketplace::Query`];
//! this crate adds storage, unique keys and the procedure, nothing else.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use marketplace::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod auth;
mod blobs;
mod store;

/// Default lifetime of an access token, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Failures loading or saving a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot '{path}' is malformed: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the backend holds. Serialised as-is into snapshots.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct State {
    #[serde(default)]
    pub(crate) tables: BTreeMap<Table, Vec<Value>>,
    #[serde(default)]
    pub(crate) users: BTreeMap<String, auth::UserAccount>,
    #[serde(default)]
    pub(crate) sessions: BTreeMap<String, auth::IssuedSession>,
    #[serde(default)]
    pub(crate) blobs: BTreeMap<String, blobs::StoredBlob>,
}

impl State {
    pub(crate) fn rows(&self, table: Table) -> &[Value] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn rows_mut(&mut self, table: Table) -> &mut Vec<Value> {
        self.tables.entry(table).or_default()
    }
}

/// In-memory implementation of every marketplace port.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    session_ttl_secs: i64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }

    /// Overrides the access-token lifetime.
    pub fn with_session_ttl(mut self, seconds: i64) -> Self {
        self.session_ttl_secs = seconds;
        self
    }

    /// Loads a snapshot written by [`MemoryBackend::save`].
    ///
    /// A missing file yields an empty backend so the first run needs no setup.
    pub async fn load(path: &Path) -> Result<Self, SnapshotError> {
        let shown = path.display().to_string();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %shown, "No snapshot found, starting with an empty store");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: shown,
                    source,
                })
            }
        };
        let state: State = serde_json::from_str(&text).map_err(|source| SnapshotError::Format {
            path: shown.clone(),
            source,
        })?;
        debug!(
            path = %shown,
            tables = state.tables.len(),
            users = state.users.len(),
            "Loaded snapshot"
        );
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        })
    }

    /// Writes the full state to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let shown = path.display().to_string();
        let text = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&*state).map_err(|source| SnapshotError::Format {
                path: shown.clone(),
                source,
            })?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SnapshotError::Io {
                    path: shown.clone(),
                    source,
                })?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|source| SnapshotError::Io {
                path: shown.clone(),
                source,
            })?;
        restrict_permissions(path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: shown.clone(),
                source,
            })?;
        debug!(path = %shown, "Saved snapshot");
        Ok(())
    }

    /// Returns a copy of every row in `table`, in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.state.lock().await.rows(table).to_vec()
    }
}

/// Limits the snapshot to owner read and write.
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace::{DataStore, Query};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_PATH_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_snapshot_path() -> std::path::PathBuf {
        let n = TEST_PATH_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "linkier-memstore-{}-{n}/snapshot.json",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn snapshot_round_trips_rows() {
        let path = unique_snapshot_path();
        let backend = MemoryBackend::new();
        backend
            .insert(Table::Messages, json!({ "body": "hello" }))
            .await
            .unwrap();
        backend.save(&path).await.unwrap();

        let restored = MemoryBackend::load(&path).await.unwrap();
        let rows = restored
            .select(Table::Messages, &Query::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["body"], "hello");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn snapshot_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let path = unique_snapshot_path();
        MemoryBackend::new().save(&path).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn missing_snapshot_loads_empty() {
        let path = unique_snapshot_path();
        let backend = MemoryBackend::load(&path).await.unwrap();
        assert!(backend.rows(Table::Properties).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_snapshot_is_reported() {
        let path = unique_snapshot_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let err = MemoryBackend::load(&path).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Format { .. }));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
