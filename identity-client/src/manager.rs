use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::credential::{Credential, CredentialState, CredentialStore};
use crate::error::ClientError;
use crate::token_endpoint::{AuthType, TokenEndpoint};

/// Owns the cached credential for one caller.
///
/// All reads and refreshes go through a single lock, so concurrent callers
/// that find the access token expired trigger one refresh exchange between
/// them. The secret file always mirrors the in-memory credential.
pub struct CredentialLifecycleManager {
    endpoint: Arc<dyn TokenEndpoint>,
    store: CredentialStore,
    project: String,
    current: Mutex<Option<Credential>>,
}

impl CredentialLifecycleManager {
    /// Loads any credential already on disk.
    pub async fn open(
        endpoint: Arc<dyn TokenEndpoint>,
        store: CredentialStore,
        project: impl Into<String>,
    ) -> Self {
        let current = store.load().await;
        Self {
            endpoint,
            store,
            project: project.into(),
            current: Mutex::new(current),
        }
    }

    /// Project used for the next login.
    pub fn project(&self) -> &str {
        &self.project
    }

    pub async fn state(&self) -> CredentialState {
        let current = self.current.lock().await;
        CredentialState::of(current.as_ref(), Utc::now())
    }

    /// Name and project of the held credential, if any.
    pub async fn identity(&self) -> Option<(String, String)> {
        let current = self.current.lock().await;
        current
            .as_ref()
            .map(|c| (c.subject.clone(), c.project.clone()))
    }

    pub async fn login(&self, name: &str, password: SecretString) -> Result<(), ClientError> {
        let mut current = self.current.lock().await;
        let issued_at = Utc::now();
        let response = self
            .endpoint
            .exchange(&self.project, name, &password, AuthType::Password)
            .await?;

        let credential = Credential::from_response(name, &self.project, response, issued_at);
        self.store.save(&credential).await?;
        tracing::info!(project = %self.project, subject = %name, "Logged in");
        *current = Some(credential);
        Ok(())
    }

    /// Returns a usable access token, refreshing it first when expired.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        let mut current = self.current.lock().await;
        let now = Utc::now();

        let held = match current.as_ref() {
            None => return Err(ClientError::ReauthenticationRequired),
            Some(credential) => credential,
        };

        match held.state_at(now) {
            CredentialState::Valid => return Ok(held.access_token.clone()),
            CredentialState::RefreshExpired => {
                tracing::info!(subject = %held.subject, "Refresh token expired");
                self.discard(&mut current).await;
                return Err(ClientError::ReauthenticationRequired);
            }
            CredentialState::AccessExpired | CredentialState::Unauthenticated => {}
        }

        let subject = held.subject.clone();
        let project = held.project.clone();
        let refresh = SecretString::new(held.refresh_token.clone());

        let response = match self
            .endpoint
            .exchange(&project, &subject, &refresh, AuthType::Refresh)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Refresh exchange failed");
                self.discard(&mut current).await;
                return Err(ClientError::ReauthenticationRequired);
            }
        };

        let credential = Credential::from_response(subject, project, response, now);
        let token = credential.access_token.clone();
        let saved = self.store.save(&credential).await;
        *current = Some(credential);
        saved?;

        tracing::debug!("Access token refreshed");
        Ok(token)
    }

    /// Revokes the refresh token, then deletes the local credential.
    ///
    /// The local credential is removed even when revocation fails; a server
    /// failure is reported afterwards.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let mut current = self.current.lock().await;
        let Some(credential) = current.take() else {
            return self.store.delete().await;
        };

        let revoked = self
            .endpoint
            .revoke(&credential.project, &credential.refresh_token)
            .await;
        self.store.delete().await?;

        if let Err(e) = &revoked {
            tracing::warn!(error = %e, "Revocation failed; local credential removed");
        }
        revoked
    }

    async fn discard(&self, current: &mut Option<Credential>) {
        *current = None;
        if let Err(e) = self.store.delete().await {
            tracing::warn!(error = %e, "Failed to delete credential file");
        }
    }
}
