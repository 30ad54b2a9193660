use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::config::JwtConfig;

/// Access tokens expire exactly one hour after issuance.
pub const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);

/// Identity claims carried in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

/// A signed access token together with its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Stateless HS256 signer/verifier. Built once from explicit configuration;
/// holds no ambient state.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenSigner {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
        role: &str,
    ) -> anyhow::Result<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + ACCESS_TOKEN_TTL;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            given_name: first_name.to_string(),
            family_name: last_name.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp() as usize,
            exp: expires_at.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "access token issued");
        Ok(IssuedToken { token, expires_at })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        // the jsonwebtoken default tolerates 60s of clock skew; expiry
        // checks here allow none
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    /// Strict verification: signature, issuer, audience and expiry, with
    /// zero leeway.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            debug!(error = %e, "access token rejected");
            AuthError::InvalidToken
        })?;
        Ok(data.claims)
    }

    /// Verification that ignores the expiry but nothing else. Only the
    /// refresh-token exchange may accept an expired access token, so this
    /// stays crate-private.
    pub(crate) fn verify_expired(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "expired-token decode rejected");
            AuthError::InvalidToken
        })?;
        Ok(data.claims)
    }
}
