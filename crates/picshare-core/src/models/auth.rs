use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access/refresh token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`.
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}
