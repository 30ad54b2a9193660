use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::{
    AuthResponse, LoginRequest, ProfilePatch, RefreshRequest, RegisterRequest, UserProfile,
};
use crate::auth::error::AuthError;
use crate::auth::jwt::TokenSigner;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh::generate_refresh_token;
use crate::auth::repo::{CredentialStore, NewUser, SessionState, User};

/// Refresh tokens are valid for seven days from each rotation.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(7);

const MAX_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are stored and compared in trimmed lowercase form. Applied before
/// every store read or write, so uniqueness is case-insensitive.
fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Orchestrates the credential and session-token lifecycle. Owns all
/// business rules; the store, hasher, signer and token generator never call
/// back into it.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("invalid email address".into()));
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if req.password != req.confirm_password {
            return Err(AuthError::Validation("passwords do not match".into()));
        }
        for (field, value) in [("first name", &req.first_name), ("last name", &req.last_name)] {
            if value.trim().is_empty() || value.len() > MAX_NAME_LEN {
                return Err(AuthError::Validation(format!(
                    "{field} must be 1-{MAX_NAME_LEN} characters"
                )));
            }
        }

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "registration with existing email");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(&req.password)?;
        let refresh_token = generate_refresh_token();
        // the unique index on users.email backstops the pre-check race:
        // a concurrent insert surfaces as StoreError::DuplicateEmail
        let user = self
            .store
            .insert(NewUser {
                email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role: req.role.unwrap_or_else(|| "user".into()),
                phone_number: req.phone_number,
                refresh_token: refresh_token.clone(),
                refresh_token_expiry: OffsetDateTime::now_utc() + REFRESH_TOKEN_TTL,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        self.auth_response(user, refresh_token)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&req.email);

        // Unknown email and wrong password yield the same error on purpose:
        // the caller must not learn which accounts exist.
        let Some(mut user) = self.store.find_by_email(&email).await? else {
            warn!("login with unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&req.password, &user.password_hash) {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = OffsetDateTime::now_utc();
        let refresh_token = generate_refresh_token();
        user.last_login = Some(now);
        user.set_session(refresh_token.clone(), now + REFRESH_TOKEN_TTL);
        self.store.save(&user).await?;

        info!(user_id = %user.id, "user logged in");
        self.auth_response(user, refresh_token)
    }

    pub async fn refresh(&self, req: RefreshRequest) -> Result<AuthResponse, AuthError> {
        // The access token may be past its expiry; its signature must still
        // check out before the subject is trusted.
        let claims = self.signer.verify_expired(&req.token)?;

        let Some(mut user) = self.store.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh for unknown user");
            return Err(AuthError::InvalidRefreshToken);
        };

        let now = OffsetDateTime::now_utc();
        let matches_stored = user.refresh_token.as_deref() == Some(req.refresh_token.as_str());
        if user.session_state(now) != SessionState::Authenticated || !matches_stored {
            warn!(user_id = %user.id, "refresh token mismatch or expired");
            return Err(AuthError::InvalidRefreshToken);
        }

        // Single-use rotation: the stored value changes before the new pair
        // is handed out, so replaying the old token can never succeed.
        let refresh_token = generate_refresh_token();
        user.set_session(refresh_token.clone(), now + REFRESH_TOKEN_TTL);
        self.store.save(&user).await?;

        info!(user_id = %user.id, "refresh token rotated");
        self.auth_response(user, refresh_token)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserProfile, AuthError> {
        let user = self.store.find_by_id(id).await?.ok_or(AuthError::NotFound)?;
        Ok(user.into())
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        patch: ProfilePatch,
    ) -> Result<UserProfile, AuthError> {
        let Some(mut user) = self.store.find_by_id(id).await? else {
            return Err(AuthError::NotFound);
        };

        apply(&mut user.first_name, patch.first_name);
        apply(&mut user.last_name, patch.last_name);
        apply_opt(&mut user.phone_number, patch.phone_number);
        apply_opt(&mut user.profile_picture, patch.profile_picture);
        apply_opt(&mut user.department, patch.department);
        apply_opt(&mut user.student_id, patch.student_id);
        user.updated_at = Some(OffsetDateTime::now_utc());

        self.store.save(&user).await?;
        info!(user_id = %user.id, "profile updated");
        Ok(user.into())
    }

    pub async fn logout(&self, id: Uuid) -> Result<(), AuthError> {
        let Some(mut user) = self.store.find_by_id(id).await? else {
            return Err(AuthError::NotFound);
        };
        // idempotent: clearing an absent session is still a success
        user.clear_session();
        self.store.save(&user).await?;
        info!(user_id = %user.id, "user logged out");
        Ok(())
    }

    fn auth_response(&self, user: User, refresh_token: String) -> Result<AuthResponse, AuthError> {
        let issued = self.signer.issue(
            user.id,
            &user.email,
            &user.first_name,
            &user.last_name,
            &user.role,
        )?;
        Ok(AuthResponse {
            access_token: issued.token,
            refresh_token,
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            expires_at: issued.expires_at,
        })
    }
}

/// Absent and empty both mean "leave unchanged"; see DESIGN.md.
fn apply(dst: &mut String, src: Option<String>) {
    if let Some(value) = src {
        if !value.is_empty() {
            *dst = value;
        }
    }
}

fn apply_opt(dst: &mut Option<String>, src: Option<String>) {
    if let Some(value) = src {
        if !value.is_empty() {
            *dst = Some(value);
        }
    }
}
