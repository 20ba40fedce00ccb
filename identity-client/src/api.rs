use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::manager::CredentialLifecycleManager;

/// Kinds managed under a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Client,
    User,
    Role,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Client => "client",
            ResourceKind::User => "user",
            ResourceKind::Role => "role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated calls against the resource API.
#[derive(Clone)]
pub struct ResourceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialLifecycleManager>,
}

impl ResourceClient {
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<CredentialLifecycleManager>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Unexpected(anyhow::Error::new(e)))?;

        Ok(Self::with_client(http, &config.server, credentials))
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        credentials: Arc<CredentialLifecycleManager>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub async fn list_projects(&self) -> Result<Vec<Value>, ClientError> {
        let body = self.call(Method::GET, "/api/v1/project", None::<&()>).await?;
        into_list(body)
    }

    pub async fn get_project(&self, project: &str) -> Result<Value, ClientError> {
        self.call(Method::GET, &project_path(project), None::<&()>)
            .await
    }

    pub async fn create_project<B: Serialize>(&self, body: &B) -> Result<Value, ClientError> {
        self.call(Method::POST, "/api/v1/project", Some(body)).await
    }

    pub async fn update_project<B: Serialize>(
        &self,
        project: &str,
        body: &B,
    ) -> Result<Value, ClientError> {
        self.call(Method::PUT, &project_path(project), Some(body))
            .await
    }

    pub async fn delete_project(&self, project: &str) -> Result<(), ClientError> {
        self.call(Method::DELETE, &project_path(project), None::<&()>)
            .await
            .map(|_| ())
    }

    pub async fn list(&self, project: &str, kind: ResourceKind) -> Result<Vec<Value>, ClientError> {
        let body = self
            .call(Method::GET, &kind_path(project, kind), None::<&()>)
            .await?;
        into_list(body)
    }

    pub async fn get(
        &self,
        project: &str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Value, ClientError> {
        self.call(Method::GET, &item_path(project, kind, id), None::<&()>)
            .await
    }

    pub async fn create<B: Serialize>(
        &self,
        project: &str,
        kind: ResourceKind,
        body: &B,
    ) -> Result<Value, ClientError> {
        self.call(Method::POST, &kind_path(project, kind), Some(body))
            .await
    }

    pub async fn update<B: Serialize>(
        &self,
        project: &str,
        kind: ResourceKind,
        id: &str,
        body: &B,
    ) -> Result<Value, ClientError> {
        self.call(Method::PUT, &item_path(project, kind, id), Some(body))
            .await
    }

    pub async fn delete(
        &self,
        project: &str,
        kind: ResourceKind,
        id: &str,
    ) -> Result<(), ClientError> {
        self.call(Method::DELETE, &item_path(project, kind, id), None::<&()>)
            .await
            .map(|_| ())
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ClientError> {
        let token = self.credentials.access_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_status(status, &text));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Unexpected(anyhow::Error::new(e)))
    }
}

fn project_path(project: &str) -> String {
    format!("/api/v1/project/{}", project)
}

fn kind_path(project: &str, kind: ResourceKind) -> String {
    format!("/api/v1/project/{}/{}", project, kind)
}

fn item_path(project: &str, kind: ResourceKind, id: &str) -> String {
    format!("/api/v1/project/{}/{}/{}", project, kind, id)
}

fn into_list(body: Value) -> Result<Vec<Value>, ClientError> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(ClientError::Unexpected(anyhow::anyhow!(
            "expected a JSON array, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(project_path("acme"), "/api/v1/project/acme");
        assert_eq!(
            kind_path("acme", ResourceKind::Client),
            "/api/v1/project/acme/client"
        );
        assert_eq!(
            item_path("acme", ResourceKind::Role, "auditor"),
            "/api/v1/project/acme/role/auditor"
        );
    }

    #[test]
    fn test_list_requires_array() {
        assert_eq!(into_list(serde_json::json!([1, 2])).unwrap().len(), 2);
        assert!(into_list(serde_json::json!({"id": 1})).is_err());
    }
}
