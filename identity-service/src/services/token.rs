//! Credential exchange: password or refresh token in, token pair out.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::ServiceError;
use super::jwt::{AccessClaims, JwtService, RefreshClaims, TokenUse};
use super::store::{decode, encode, Collection, ResourceStore, StoreError};
use crate::models::{
    Grant, GrantScope, Project, RefreshSession, ResourceKind, Role, RoleType, User,
};
use crate::utils::{verify_password, Password, PasswordHashString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Password,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    /// Seconds until the access token expires
    pub access_expires_in: u64,
    pub refresh_token: String,
    pub refresh_expires_in: u64,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn ResourceStore>,
    jwt: JwtService,
    admin_project: String,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        jwt: JwtService,
        admin_project: impl Into<String>,
    ) -> Self {
        Self {
            store,
            jwt,
            admin_project: admin_project.into(),
        }
    }

    /// For `AuthType::Refresh` the secret is the refresh token. The refresh
    /// session it names is consumed, so each refresh token works once.
    pub async fn issue(
        &self,
        tenant: &str,
        name: &str,
        secret: Password,
        auth_type: AuthType,
    ) -> Result<TokenPair, ServiceError> {
        let project = self.load_project(tenant).await?;

        let user = match auth_type {
            AuthType::Password => {
                let user = self.load_user(tenant, name).await?;
                verify_password(&secret, &PasswordHashString::new(user.password_hash.clone()))
                    .map_err(|_| {
                        tracing::warn!(project = %tenant, user = %name, "Password rejected");
                        ServiceError::InvalidCredentials
                    })?;
                user
            }
            AuthType::Refresh => {
                let claims = self
                    .jwt
                    .verify_refresh(secret.as_str())
                    .map_err(|_| ServiceError::InvalidCredentials)?;
                if claims.project != tenant || claims.sub != name {
                    return Err(ServiceError::InvalidCredentials);
                }
                self.consume_session(tenant, &claims.sid).await?;

                let user = self.load_user(tenant, name).await?;
                // Issued before this account existed: belongs to a deleted namesake.
                if claims.iat < user.created_at.timestamp() {
                    tracing::warn!(project = %tenant, user = %name, "Refresh token predates account");
                    return Err(ServiceError::InvalidCredentials);
                }
                user
            }
        };

        let grants = self.derive_grants(tenant, &user).await?;
        let pair = self.sign_pair(&project, &user, grants).await?;

        tracing::info!(project = %tenant, user = %name, auth_type = ?auth_type, "Tokens issued");
        Ok(pair)
    }

    /// Ends the refresh session behind `token`. Unknown, foreign, expired or
    /// already revoked tokens are accepted silently.
    pub async fn revoke(&self, tenant: &str, token: &str) -> Result<(), ServiceError> {
        let claims = match self.jwt.verify_refresh(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(project = %tenant, error = %e, "Ignoring unusable token on revoke");
                return Ok(());
            }
        };
        if claims.project != tenant {
            return Ok(());
        }

        match self.store.remove(tenant, Collection::Sessions, &claims.sid).await {
            Ok(()) => {
                tracing::info!(project = %tenant, user = %claims.sub, "Refresh session revoked");
                Ok(())
            }
            Err(StoreError::NotFound(_)) | Err(StoreError::NoSuchTenant(_)) => Ok(()),
            Err(e) => Err(ServiceError::from_store(ResourceKind::User, &claims.sub, e)),
        }
    }

    async fn load_project(&self, tenant: &str) -> Result<Project, ServiceError> {
        let record = self
            .store
            .get_tenant(tenant)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => ServiceError::NoSuchTenant(tenant.to_string()),
                other => ServiceError::from_store(ResourceKind::Project, tenant, other),
            })?;
        decode(record).map_err(|e| ServiceError::from_store(ResourceKind::Project, tenant, e))
    }

    async fn load_user(&self, tenant: &str, name: &str) -> Result<User, ServiceError> {
        let record = self
            .store
            .get(tenant, Collection::Users, name)
            .await
            .map_err(|e| ServiceError::from_store_collapsed(ResourceKind::User, name, e))?;
        decode(record).map_err(|e| ServiceError::from_store(ResourceKind::User, name, e))
    }

    async fn consume_session(&self, tenant: &str, sid: &str) -> Result<(), ServiceError> {
        match self.store.remove(tenant, Collection::Sessions, sid).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) | Err(StoreError::NoSuchTenant(_)) => {
                tracing::warn!(project = %tenant, session = %sid, "Refresh token reused or revoked");
                Err(ServiceError::InvalidCredentials)
            }
            Err(e) => Err(ServiceError::from_store(ResourceKind::User, sid, e)),
        }
    }

    /// System roles held in the admin project grant globally; everything
    /// else is confined to the project the user authenticated against.
    async fn derive_grants(&self, tenant: &str, user: &User) -> Result<Vec<Grant>, ServiceError> {
        let mut grants: Vec<Grant> = Vec::new();

        for role_name in &user.roles {
            let role: Role = match self.store.get(tenant, Collection::Roles, role_name).await {
                Ok(record) => decode(record)
                    .map_err(|e| ServiceError::from_store(ResourceKind::Role, role_name, e))?,
                Err(StoreError::NotFound(_)) => {
                    tracing::warn!(project = %tenant, role = %role_name, "Skipping missing role");
                    continue;
                }
                Err(e) => return Err(ServiceError::from_store(ResourceKind::Role, role_name, e)),
            };

            let scope = if tenant == self.admin_project && role.role_type == RoleType::System {
                GrantScope::Global
            } else {
                GrantScope::Tenant(tenant.to_string())
            };

            for target in &role.target_resources {
                for action in &role.actions {
                    let grant = Grant::new(target.clone(), *action, scope.clone());
                    if !grants.contains(&grant) {
                        grants.push(grant);
                    }
                }
            }
        }

        Ok(grants)
    }

    async fn sign_pair(
        &self,
        project: &Project,
        user: &User,
        grants: Vec<Grant>,
    ) -> Result<TokenPair, ServiceError> {
        let policy = &project.token_policy;
        let now = Utc::now();
        let access_expires_at = now + Duration::seconds(policy.access_token_lifespan as i64);
        let refresh_expires_at = now + Duration::seconds(policy.refresh_token_lifespan as i64);

        match drop_sessions(self.store.as_ref(), &project.name, |s| {
            s.subject == user.name && s.expires_at <= now
        })
        .await
        {
            Ok(0) => {}
            Ok(pruned) => {
                tracing::debug!(project = %project.name, user = %user.name, pruned, "Expired refresh sessions pruned");
            }
            Err(e) => {
                tracing::warn!(project = %project.name, user = %user.name, error = %e, "Failed to prune refresh sessions");
            }
        }

        let session = RefreshSession {
            id: Uuid::new_v4().to_string(),
            subject: user.name.clone(),
            created_at: now,
            expires_at: refresh_expires_at,
        };
        let record = encode(&session)
            .map_err(|e| ServiceError::from_store(ResourceKind::User, &user.name, e))?;
        self.store
            .insert(&project.name, Collection::Sessions, &session.id, record)
            .await
            .map_err(|e| ServiceError::from_store(ResourceKind::User, &user.name, e))?;

        let access = AccessClaims {
            sub: user.name.clone(),
            project: project.name.clone(),
            grants,
            iss: self.jwt.issuer().to_string(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TokenUse::Access,
        };
        let refresh = RefreshClaims {
            sub: user.name.clone(),
            project: project.name.clone(),
            sid: session.id,
            iss: self.jwt.issuer().to_string(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
            typ: TokenUse::Refresh,
        };

        let sign_err = |e| ServiceError::Internal(anyhow::Error::new(e));
        Ok(TokenPair {
            access_token: self
                .jwt
                .sign(&access, policy.signing_algorithm)
                .map_err(sign_err)?,
            access_expires_in: policy.access_token_lifespan,
            refresh_token: self
                .jwt
                .sign(&refresh, policy.signing_algorithm)
                .map_err(sign_err)?,
            refresh_expires_in: policy.refresh_token_lifespan,
        })
    }
}

/// Removes the tenant's refresh sessions matching `filter` and returns how
/// many were removed.
pub(crate) async fn drop_sessions<F>(
    store: &dyn ResourceStore,
    tenant: &str,
    filter: F,
) -> Result<usize, StoreError>
where
    F: Fn(&RefreshSession) -> bool,
{
    let mut removed = 0;
    for record in store.list(tenant, Collection::Sessions).await? {
        let session: RefreshSession = decode(record)?;
        if !filter(&session) {
            continue;
        }
        match store.remove(tenant, Collection::Sessions, &session.id).await {
            Ok(()) => removed += 1,
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
