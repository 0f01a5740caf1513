use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use picshare_core::models::{Credentials, Role, User, UserUpdate};
use picshare_core::AppError;
use picshare_db::UserRepository;
use rand_core::OsRng;
use validator::Validate;

const BAD_CREDENTIALS: &str = "Incorrect username or password";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Account management on top of [`UserRepository`].
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Register a regular user.
    pub async fn create_user(&self, credentials: &Credentials) -> Result<User, AppError> {
        self.create_with_role(credentials, Role::User).await
    }

    pub async fn create_with_role(
        &self,
        credentials: &Credentials,
        role: Role,
    ) -> Result<User, AppError> {
        credentials.validate()?;
        let password_hash = hash_password(&credentials.password)?;
        let user = self
            .users
            .create(&credentials.username, &password_hash, role)
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Create an admin account unless the username is already taken.
    pub async fn ensure_admin(&self, credentials: &Credentials) -> Result<User, AppError> {
        if let Some(existing) = self.users.get_by_username(&credentials.username).await? {
            return Ok(existing);
        }
        self.create_with_role(credentials, Role::Admin).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User, AppError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Look up a user by username and check the password.
    ///
    /// Unknown usernames and wrong passwords fail the same way.
    pub async fn get_by_credentials(&self, username: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.users.get_by_username(username).await? else {
            return Err(AppError::InvalidInput(BAD_CREDENTIALS.to_string()));
        };
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::InvalidInput(BAD_CREDENTIALS.to_string()));
        }
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.users.list().await
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User, AppError> {
        update.validate()?;
        let password_hash = match &update.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        self.users
            .update(id, update.role, update.disabled, password_hash.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        if !self.users.delete(id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
