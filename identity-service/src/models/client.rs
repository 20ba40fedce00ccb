use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::store::Collection;
use crate::services::{ManagedResource, ServiceError};
use crate::utils::RESOURCE_NAME;

use super::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Public,
    Confidential,
}

/// An OAuth client registered in a project.
///
/// A confidential client always has a non-empty secret; a public client
/// never stores one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub access_type: AccessType,
    pub allowed_callback_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ClientSpec {
    #[validate(regex(
        path = *RESOURCE_NAME,
        message = "must start with a lowercase letter and contain 4 to 64 of [a-z0-9._-]"
    ))]
    pub id: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be shorter than 256 bytes"))]
    pub secret: String,
    pub access_type: AccessType,
    #[serde(default)]
    pub allowed_callback_urls: Vec<String>,
}

/// Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ClientDelta {
    #[validate(length(max = 255, message = "must be shorter than 256 bytes"))]
    pub secret: Option<String>,
    pub access_type: Option<AccessType>,
    pub allowed_callback_urls: Option<Vec<String>>,
}

impl Client {
    fn normalize_secret(&mut self) -> Result<(), ServiceError> {
        match self.access_type {
            AccessType::Public => {
                self.secret.clear();
                Ok(())
            }
            AccessType::Confidential if self.secret.is_empty() => Err(ServiceError::validation(
                "secret",
                "must not be empty for a confidential client",
            )),
            AccessType::Confidential => Ok(()),
        }
    }
}

impl ManagedResource for Client {
    const KIND: ResourceKind = ResourceKind::Client;
    const COLLECTION: Collection = Collection::Clients;
    type Spec = ClientSpec;
    type Delta = ClientDelta;

    fn id(&self) -> &str {
        &self.id
    }

    fn build(spec: ClientSpec, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        spec.validate()?;

        let mut client = Client {
            id: spec.id,
            secret: spec.secret,
            access_type: spec.access_type,
            allowed_callback_urls: spec.allowed_callback_urls,
            created_at: now,
        };
        client.normalize_secret()?;
        Ok(client)
    }

    fn apply(&mut self, delta: ClientDelta) -> Result<(), ServiceError> {
        delta.validate()?;

        if let Some(secret) = delta.secret {
            self.secret = secret;
        }
        if let Some(access_type) = delta.access_type {
            self.access_type = access_type;
        }
        if let Some(urls) = delta.allowed_callback_urls {
            self.allowed_callback_urls = urls;
        }
        self.normalize_secret()
    }
}

/// Wire representation. The secret is only present in the response to the
/// request that created the client.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientView {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub access_type: AccessType,
    pub allowed_callback_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ClientView {
    pub fn revealed(client: Client) -> Self {
        let mut view = Self::from(client.clone());
        view.secret = Some(client.secret);
        view
    }
}

impl From<Client> for ClientView {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            secret: None,
            access_type: client.access_type,
            allowed_callback_urls: client.allowed_callback_urls,
            created_at: client.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(access_type: AccessType, secret: &str) -> ClientSpec {
        ClientSpec {
            id: "cli1".to_string(),
            secret: secret.to_string(),
            access_type,
            allowed_callback_urls: vec!["http://localhost/callback".to_string()],
        }
    }

    #[test]
    fn test_confidential_requires_secret() {
        let err = Client::build(spec(AccessType::Confidential, ""), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { ref field, .. } if field == "secret"));

        let client = Client::build(spec(AccessType::Confidential, "s3cret"), Utc::now()).unwrap();
        assert_eq!(client.secret, "s3cret");
    }

    #[test]
    fn test_public_client_drops_secret() {
        let client = Client::build(spec(AccessType::Public, "ignored"), Utc::now()).unwrap();
        assert_eq!(client.secret, "");
        assert_eq!(client.access_type, AccessType::Public);
    }

    #[test]
    fn test_secret_length_limit() {
        let long = "x".repeat(256);
        let err = Client::build(spec(AccessType::Confidential, &long), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { ref field, .. } if field == "secret"));
    }

    #[test]
    fn test_partial_delta_keeps_other_fields() {
        let mut client =
            Client::build(spec(AccessType::Confidential, "s3cret"), Utc::now()).unwrap();
        let created_at = client.created_at;

        client
            .apply(ClientDelta {
                allowed_callback_urls: Some(vec![]),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(client.secret, "s3cret");
        assert_eq!(client.access_type, AccessType::Confidential);
        assert!(client.allowed_callback_urls.is_empty());
        assert_eq!(client.created_at, created_at);
    }

    #[test]
    fn test_switching_to_confidential_needs_secret() {
        let mut client = Client::build(spec(AccessType::Public, ""), Utc::now()).unwrap();
        let err = client
            .apply(ClientDelta {
                access_type: Some(AccessType::Confidential),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed { .. }));
    }

    #[test]
    fn test_unknown_access_type_is_rejected() {
        let parsed = serde_json::from_str::<ClientSpec>(r#"{"id":"cli1","access_type":"open"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_view_redaction() {
        let client = Client::build(spec(AccessType::Confidential, "s3cret"), Utc::now()).unwrap();

        let redacted = serde_json::to_value(ClientView::from(client.clone())).unwrap();
        assert!(redacted.get("secret").is_none());

        let revealed = serde_json::to_value(ClientView::revealed(client)).unwrap();
        assert_eq!(revealed["secret"], "s3cret");
    }
}
