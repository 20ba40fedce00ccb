use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Password,
    Refresh,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub access_expires_in: u64,
    pub refresh_token: String,
    pub refresh_expires_in: u64,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    name: &'a str,
    secret: &'a str,
    auth_type: AuthType,
}

#[derive(Serialize)]
struct RevokeForm<'a> {
    token: &'a str,
    token_type_hint: &'a str,
}

/// Server side of the credential exchange.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges a password or refresh token for a new pair.
    async fn exchange(
        &self,
        project: &str,
        name: &str,
        secret: &SecretString,
        auth_type: AuthType,
    ) -> Result<TokenResponse, ClientError>;

    /// Invalidates a refresh token. Only transport and 5xx failures are errors.
    async fn revoke(&self, project: &str, refresh_token: &str) -> Result<(), ClientError>;
}

#[derive(Clone)]
pub struct HttpTokenEndpoint {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTokenEndpoint {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Unexpected(anyhow::Error::new(e)))?;

        Ok(Self::with_client(http, &config.server))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange(
        &self,
        project: &str,
        name: &str,
        secret: &SecretString,
        auth_type: AuthType,
    ) -> Result<TokenResponse, ClientError> {
        let url = format!("{}/api/v1/project/{}/token", self.base_url, project);
        let body = TokenRequest {
            name,
            secret: secret.expose_secret(),
            auth_type,
        };

        tracing::debug!(project = %project, subject = %name, ?auth_type, "Requesting token pair");

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<TokenResponse>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status, &text))
    }

    async fn revoke(&self, project: &str, refresh_token: &str) -> Result<(), ClientError> {
        let url = format!(
            "{}/api/v1/project/{}/openid-connect/revoke",
            self.base_url, project
        );
        let form = RevokeForm {
            token: refresh_token,
            token_type_hint: "refresh_token",
        };

        let response = self.http.post(&url).form(&form).send().await?;
        let status = response.status();
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &text));
        }

        if !status.is_success() {
            tracing::debug!(%status, "Revoke rejected; treating token as already invalid");
        }
        Ok(())
    }
}
