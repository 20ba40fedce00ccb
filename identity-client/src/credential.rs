use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::SECRET_FILE;
use crate::error::ClientError;
use crate::token_endpoint::TokenResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No credential is held.
    Unauthenticated,
    Valid,
    /// Access token expired, refresh token still usable.
    AccessExpired,
    /// Both tokens expired; only a new login helps.
    RefreshExpired,
}

impl CredentialState {
    pub fn of(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        credential
            .map(|c| c.state_at(now))
            .unwrap_or(CredentialState::Unauthenticated)
    }
}

/// Token pair held for one subject within one project.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub subject: String,
    pub project: String,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn from_response(
        subject: impl Into<String>,
        project: impl Into<String>,
        response: TokenResponse,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let access_expires_at = issued_at + seconds(response.access_expires_in);
        let refresh_expires_at =
            (issued_at + seconds(response.refresh_expires_in)).max(access_expires_at);

        Self {
            subject: subject.into(),
            project: project.into(),
            access_token: response.access_token,
            access_expires_at,
            refresh_token: response.refresh_token,
            refresh_expires_at,
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if now >= self.refresh_expires_at {
            CredentialState::RefreshExpired
        } else if now >= self.access_expires_at {
            CredentialState::AccessExpired
        } else {
            CredentialState::Valid
        }
    }
}

// Lifespans beyond a century are clamped to keep timestamp arithmetic in range.
const MAX_LIFESPAN_SECS: u64 = 100 * 365 * 24 * 3600;

fn seconds(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_LIFESPAN_SECS) as i64)
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &self.subject)
            .field("project", &self.project)
            .field("access_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Persists the credential as JSON in a single owner-only file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SECRET_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing, unreadable or corrupt file reads as no credential.
    pub async fn load(&self) -> Option<Credential> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Credential file unreadable");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Credential file corrupt");
                None
            }
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    pub async fn save(&self, credential: &Credential) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(credential)
            .map_err(|e| ClientError::Unexpected(anyhow::Error::new(e)))?;
        let temp = self.path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));

        let written = write_private(&temp, &body).await;
        let result = match written {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(body).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(access: u64, refresh: u64) -> TokenResponse {
        TokenResponse {
            access_token: "access".into(),
            access_expires_in: access,
            refresh_token: "refresh".into(),
            refresh_expires_in: refresh,
        }
    }

    #[test]
    fn test_state_transitions() {
        let issued = Utc::now();
        let cred = Credential::from_response("alice", "acme", response(300, 3600), issued);

        assert_eq!(cred.state_at(issued), CredentialState::Valid);
        assert_eq!(
            cred.state_at(issued + Duration::seconds(300)),
            CredentialState::AccessExpired
        );
        assert_eq!(
            cred.state_at(issued + Duration::seconds(3600)),
            CredentialState::RefreshExpired
        );
        assert_eq!(
            CredentialState::of(None, issued),
            CredentialState::Unauthenticated
        );
    }

    #[test]
    fn test_refresh_never_expires_before_access() {
        let issued = Utc::now();
        let cred = Credential::from_response("alice", "acme", response(600, 60), issued);
        assert_eq!(cred.refresh_expires_at, cred.access_expires_at);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = Credential::from_response("alice", "acme", response(60, 60), Utc::now());
        let printed = format!("{cred:?}");
        assert!(printed.contains("alice"));
        assert!(!printed.contains("\"access\""));
        assert!(!printed.contains("\"refresh\""));
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(&dir.path().join("nested"));
        assert!(store.load().await.is_none());

        let cred = Credential::from_response("alice", "acme", response(60, 120), Utc::now());
        store.save(&cred).await.unwrap();
        assert_eq!(store.load().await, Some(cred));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("secret")]);

        store.delete().await.unwrap();
        assert!(store.load().await.is_none());
        store.delete().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        let cred = Credential::from_response("alice", "acme", response(60, 120), Utc::now());
        store.save(&cred).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        std::fs::write(store.path(), b"{not json").unwrap();

        assert!(store.load().await.is_none());
    }
}
