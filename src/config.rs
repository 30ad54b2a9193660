use serde::Deserialize;
use thiserror::Error;

/// Minimum byte length accepted for the HS256 signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Startup configuration failures. All of these are fatal: the service
/// refuses to boot rather than fall back to a guessable default key.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,
    #[error("JWT_SECRET must be set; there is no default signing key")]
    MissingJwtSecret,
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes, got {0}")]
    WeakJwtSecret(usize),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;
        let secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingJwtSecret)?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret(secret.len()));
        }
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "signet".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "signet-users".into()),
        };
        Ok(Self { database_url, jwt })
    }
}
