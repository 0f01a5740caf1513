//! JWT access/refresh tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use picshare_core::models::{Role, TokenPair, User};
use picshare_core::AppError;
use serde::{Deserialize, Serialize};

use super::users::UserService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(users: UserService, secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Check credentials and issue a token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self.users.get_by_credentials(username, password).await?;
        tracing::info!(user_id = user.id, "User logged in");
        self.issue(&user)
    }

    /// Exchange a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        let user = self.active_user(&claims).await?;
        self.issue(&user)
    }

    /// Resolve an access token to the current, enabled user.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self.verify(access_token, TokenType::Access)?;
        self.active_user(&claims).await
    }

    pub fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        Ok(TokenPair::bearer(
            self.sign(user, TokenType::Access, self.access_ttl)?,
            self.sign(user, TokenType::Refresh, self.refresh_ttl)?,
        ))
    }

    fn sign(&self, user: &User, token_type: TokenType, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decode and validate a token of the expected type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })?;

        if data.claims.token_type != expected {
            return Err(AppError::Unauthorized("Wrong token type".to_string()));
        }
        Ok(data.claims)
    }

    async fn active_user(&self, claims: &Claims) -> Result<User, AppError> {
        let user = match self.users.get_user(claims.user_id()?).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Unauthorized("User no longer exists".to_string()))
            }
            Err(e) => return Err(e),
        };
        if user.disabled {
            return Err(AppError::Forbidden("User is disabled".to_string()));
        }
        Ok(user)
    }
}
