//! Configuration module
//!
//! Settings are read from the environment (optionally seeded from a `.env`
//! file) with constant fallbacks for everything except secrets.

use std::env;

use crate::constants::DEFAULT_PALETTE_SIZE;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_ACCESS_TTL_MINUTES: i64 = 30;
const JWT_REFRESH_TTL_DAYS: i64 = 7;
const MAX_FILE_SIZE_MB: usize = 10;
const SPOOL_MAX_MEMORY_BYTES: usize = 1024 * 1024;
const TASK_QUEUE_MAX_WORKERS: usize = 4;
const TASK_QUEUE_CAPACITY: usize = 256;
const LOCAL_STORAGE_PATH: &str = "./storage";
const ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png,image/gif,image/webp";

/// Server, database and authentication settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_access_ttl_minutes: i64,
    pub jwt_refresh_ttl_days: i64,
    pub environment: String,
    /// Admin account created at startup when both are set.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Full application configuration
#[derive(Clone, Debug)]
pub struct PicshareConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Upload and extraction
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub palette_size: usize,
    pub spool_max_memory_bytes: usize,
    // Background tasks
    pub task_queue_max_workers: usize,
    pub task_queue_capacity: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PicshareConfig>);

impl Config {
    fn inner(&self) -> &PicshareConfig {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.inner().base.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PicshareConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn jwt_access_ttl_minutes(&self) -> i64 {
        self.inner().base.jwt_access_ttl_minutes
    }

    pub fn jwt_refresh_ttl_days(&self) -> i64 {
        self.inner().base.jwt_refresh_ttl_days
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    /// Username and password of the startup admin account, if configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        let base = &self.inner().base;
        match (&base.admin_username, &base.admin_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().local_storage_path
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn palette_size(&self) -> usize {
        self.inner().palette_size
    }

    pub fn spool_max_memory_bytes(&self) -> usize {
        self.inner().spool_max_memory_bytes
    }

    pub fn task_queue_max_workers(&self) -> usize {
        self.inner().task_queue_max_workers
    }

    pub fn task_queue_capacity(&self) -> usize {
        self.inner().task_queue_capacity
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl PicshareConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_access_ttl_minutes: env::var("JWT_ACCESS_TTL_MINUTES")
                .unwrap_or_else(|_| JWT_ACCESS_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(JWT_ACCESS_TTL_MINUTES),
            jwt_refresh_ttl_days: env::var("JWT_REFRESH_TTL_DAYS")
                .unwrap_or_else(|_| JWT_REFRESH_TTL_DAYS.to_string())
                .parse()
                .unwrap_or(JWT_REFRESH_TTL_DAYS),
            environment,
            admin_username: env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = PicshareConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_content_types: parse_list(
                &env::var("ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| ALLOWED_CONTENT_TYPES.to_string()),
            ),
            palette_size: env::var("PALETTE_SIZE")
                .unwrap_or_else(|_| DEFAULT_PALETTE_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_PALETTE_SIZE),
            spool_max_memory_bytes: env::var("SPOOL_MAX_MEMORY_BYTES")
                .unwrap_or_else(|_| SPOOL_MAX_MEMORY_BYTES.to_string())
                .parse()
                .unwrap_or(SPOOL_MAX_MEMORY_BYTES),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_capacity: env::var("TASK_QUEUE_CAPACITY")
                .unwrap_or_else(|_| TASK_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_CAPACITY),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a SQLite connection string (sqlite://...)"
            ));
        }

        let is_production = matches!(
            self.base.environment.to_lowercase().as_str(),
            "production" | "prod"
        );
        if is_production && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.base.admin_username.is_some() != self.base.admin_password.is_some() {
            return Err(anyhow::anyhow!(
                "ADMIN_USERNAME and ADMIN_PASSWORD must be set together"
            ));
        }

        if self.palette_size == 0 {
            return Err(anyhow::anyhow!("PALETTE_SIZE must be at least 1"));
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_CONTENT_TYPES must not be empty"));
        }

        if self.task_queue_max_workers == 0 || self.task_queue_capacity == 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_MAX_WORKERS and TASK_QUEUE_CAPACITY must be positive"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must not be empty when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Configuration for tests and embedding: local storage under `storage_path`,
    /// defaults everywhere else.
    pub fn for_local(database_url: &str, storage_path: &str, jwt_secret: &str) -> Self {
        PicshareConfig {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                jwt_secret: jwt_secret.to_string(),
                jwt_access_ttl_minutes: JWT_ACCESS_TTL_MINUTES,
                jwt_refresh_ttl_days: JWT_REFRESH_TTL_DAYS,
                environment: "development".to_string(),
                admin_username: None,
                admin_password: None,
            },
            database_url: database_url.to_string(),
            storage_backend: StorageBackend::Local,
            local_storage_path: storage_path.to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_content_types: parse_list(ALLOWED_CONTENT_TYPES),
            palette_size: DEFAULT_PALETTE_SIZE,
            spool_max_memory_bytes: SPOOL_MAX_MEMORY_BYTES,
            task_queue_max_workers: TASK_QUEUE_MAX_WORKERS,
            task_queue_capacity: TASK_QUEUE_CAPACITY,
        }
    }
}
