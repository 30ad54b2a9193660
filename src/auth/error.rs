use thiserror::Error;

use crate::auth::repo::StoreError;

/// Failure kinds produced by the auth core. Unknown email and wrong
/// password are intentionally collapsed into one `InvalidCredentials`
/// variant so the caller cannot tell which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("user not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}
