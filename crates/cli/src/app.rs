//! Wires the marketplace to the configured backend and the stored session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use backend::HostedBackend;
use marketplace::{AuthError, AuthSession, BucketName, LinkierError, Profile};
use memstore::MemoryBackend;
use tracing::{debug, info};
use workflows::Marketplace;

use crate::config::{BackendKind, CliConfig};
use crate::session::SessionFile;

enum Backend {
    Hosted(HostedBackend),
    Memory {
        backend: MemoryBackend,
        snapshot: PathBuf,
    },
}

pub struct App {
    market: Marketplace,
    backend: Backend,
    sessions: SessionFile,
}

impl App {
    pub async fn from_config(config: &CliConfig) -> anyhow::Result<Self> {
        let sessions = SessionFile::new(config.session_path()?);
        match config.backend.kind {
            BackendKind::Rest => {
                let hosted = HostedBackend::connect(&config.backend_config()?)?;
                let market = Marketplace::new(
                    hosted.auth.clone(),
                    hosted.store.clone(),
                    hosted.storage.clone(),
                    hosted.image_bucket().clone(),
                );
                Ok(Self {
                    market,
                    backend: Backend::Hosted(hosted),
                    sessions,
                })
            }
            BackendKind::Memory => {
                let snapshot = config.memory.snapshot_path.clone();
                let backend = MemoryBackend::load(&snapshot)
                    .await
                    .context("failed to open the offline data file")?;
                info!(snapshot = %snapshot.display(), "Running offline");
                Ok(Self::in_memory(backend, snapshot, config.image_bucket()?, sessions))
            }
        }
    }

    pub fn in_memory(
        backend: MemoryBackend,
        snapshot: PathBuf,
        bucket: BucketName,
        sessions: SessionFile,
    ) -> Self {
        let shared = Arc::new(backend.clone());
        let market = Marketplace::new(shared.clone(), shared.clone(), shared, bucket);
        Self {
            market,
            backend: Backend::Memory { backend, snapshot },
            sessions,
        }
    }

    pub fn market(&self) -> &Marketplace {
        &self.market
    }

    pub fn sessions(&self) -> &SessionFile {
        &self.sessions
    }

    /// Restores the stored session, refreshing it when needed, and persists
    /// whatever session the auth provider hands back.
    pub async fn signed_in(&self) -> anyhow::Result<(AuthSession, Profile)> {
        let Some(stored) = self.sessions.load().await? else {
            bail!("not signed in; run `linkier login` first");
        };
        match self.market.accounts().restore(stored.clone()).await {
            Ok((session, profile)) => {
                if session != stored {
                    debug!("Session refreshed");
                    self.sessions.save(&session).await?;
                }
                Ok((session, profile))
            }
            Err(LinkierError::Auth(AuthError::SessionExpired)) => {
                self.sessions.clear().await?;
                bail!("session expired; run `linkier login` again")
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The signed-in user's profile.
    pub async fn actor(&self) -> anyhow::Result<Profile> {
        Ok(self.signed_in().await?.1)
    }

    /// Writes the offline snapshot back to disk. A no-op for the hosted
    /// backend.
    pub async fn persist(&self) -> anyhow::Result<()> {
        match &self.backend {
            Backend::Hosted(_) => Ok(()),
            Backend::Memory { backend, snapshot } => backend
                .save(snapshot)
                .await
                .context("failed to save the offline data file"),
        }
    }
}
