use std::path::{Path, PathBuf};

use anyhow::Context;
use marketplace::AuthSession;
use tracing::debug;

/// The signed-in session, persisted as JSON between invocations.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `None` when nobody is signed in.
    pub async fn load(&self) -> anyhow::Result<Option<AuthSession>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read session '{}'", self.path.display()))
            }
        };
        let session = serde_json::from_str(&text)
            .with_context(|| format!("session file '{}' is malformed", self.path.display()))?;
        Ok(Some(session))
    }

    pub async fn save(&self, session: &AuthSession) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(session).context("failed to encode session")?;
        tokio::fs::write(&self.path, text)
            .await
            .with_context(|| format!("failed to write session '{}'", self.path.display()))?;
        restrict_permissions(&self.path).await?;
        debug!(path = %self.path.display(), "Saved session");
        Ok(())
    }

    /// Forgets the session. Clearing an absent file is not an error.
    pub async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session '{}'", self.path.display())),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .with_context(|| format!("failed to restrict permissions of '{}'", path.display()))
}

#[cfg(not(unix))]
async fn restrict_permissions(_: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace::{EmailAddress, ProfileId, Timestamp};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("linkier-test-{}", std::process::id()))
            .join(name)
    }

    #[tokio::test]
    async fn save_load_clear() {
        let file = SessionFile::new(scratch("session.json"));
        assert_eq!(file.load().await.unwrap(), None);

        let session = AuthSession {
            user_id: ProfileId::new_random(),
            email: EmailAddress::new("ana@uni.be").unwrap(),
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Timestamp::now(),
        };
        file.save(&session).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(session));

        file.clear().await.unwrap();
        file.clear().await.unwrap();
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let path = scratch("broken.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let err = SessionFile::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
