use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side record backing one refresh token. Exchanging or revoking the
/// token removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSession {
    pub id: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
