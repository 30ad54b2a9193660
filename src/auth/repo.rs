use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// One credential record per user, owned by the store. The secret-bearing
/// columns never serialize out of the store/orchestrator boundary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_expiry: Option<OffsetDateTime>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
}

/// Session state derived from the refresh-token pair. `Authenticated`
/// requires a stored token whose expiry is strictly in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

impl User {
    /// The single place the "is there a live session" rule lives.
    pub fn session_state(&self, now: OffsetDateTime) -> SessionState {
        match (&self.refresh_token, self.refresh_token_expiry) {
            (Some(_), Some(expiry)) if expiry > now => SessionState::Authenticated,
            _ => SessionState::Anonymous,
        }
    }

    /// Install a rotated refresh token. Token and expiry move together.
    pub fn set_session(&mut self, token: String, expiry: OffsetDateTime) {
        self.refresh_token = Some(token);
        self.refresh_token_expiry = Some(expiry);
    }

    /// Drop the live session. Token and expiry are cleared together.
    pub fn clear_session(&mut self) {
        self.refresh_token = None;
        self.refresh_token_expiry = None;
    }
}

/// Insert payload. `id`, `created_at` and `is_active` are assigned by the
/// store at creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub phone_number: Option<String>,
    pub refresh_token: String,
    pub refresh_token_expiry: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Backend(err.into())
    }
}

/// Persistence seam for credential records. All operations are atomic with
/// respect to a single record; email uniqueness is enforced here.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;
    /// Persist a mutated record: the whole row is written by primary key in
    /// one statement. Last-writer-wins per record; optimistic versioning is
    /// an open hardening item (DESIGN.md).
    async fn save(&self, user: &User) -> Result<(), StoreError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, role, is_active,
                   refresh_token, refresh_token_expiry, phone_number, profile_picture,
                   department, student_id, created_at, updated_at, last_login
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, role, is_active,
                   refresh_token, refresh_token_expiry, phone_number, profile_picture,
                   department, student_id, created_at, updated_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role,
                               phone_number, refresh_token, refresh_token_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, email, password_hash, first_name, last_name, role, is_active,
                      refresh_token, refresh_token_expiry, phone_number, profile_picture,
                      department, student_id, created_at, updated_at, last_login
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.role)
        .bind(&new_user.phone_number)
        .bind(&new_user.refresh_token)
        .bind(new_user.refresh_token_expiry)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        // email and created_at are immutable after creation and stay out of
        // the SET list
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                first_name = $3,
                last_name = $4,
                role = $5,
                is_active = $6,
                refresh_token = $7,
                refresh_token_expiry = $8,
                phone_number = $9,
                profile_picture = $10,
                department = $11,
                student_id = $12,
                updated_at = $13,
                last_login = $14
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(&user.refresh_token)
        .bind(user.refresh_token_expiry)
        .bind(&user.phone_number)
        .bind(&user.profile_picture)
        .bind(&user.department)
        .bind(&user.student_id)
        .bind(user.updated_at)
        .bind(user.last_login)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mem {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store for orchestrator tests. Honors the same contract as
    /// the Postgres store, including duplicate-email rejection on insert.
    #[derive(Default)]
    pub struct MemCredentialStore {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl MemCredentialStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, id: Uuid) -> Option<User> {
            self.users.lock().unwrap().get(&id).cloned()
        }

        pub fn update<F: FnOnce(&mut User)>(&self, id: Uuid, f: F) {
            if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
                f(user);
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemCredentialStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.email == email).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
            let mut users = self.users.lock().unwrap();
            if users.values().any(|u| u.email == new_user.email) {
                return Err(StoreError::DuplicateEmail);
            }
            let user = User {
                id: Uuid::new_v4(),
                email: new_user.email,
                password_hash: new_user.password_hash,
                first_name: new_user.first_name,
                last_name: new_user.last_name,
                role: new_user.role,
                is_active: true,
                refresh_token: Some(new_user.refresh_token),
                refresh_token_expiry: Some(new_user.refresh_token_expiry),
                phone_number: new_user.phone_number,
                profile_picture: None,
                department: None,
                student_id: None,
                created_at: OffsetDateTime::now_utc(),
                updated_at: None,
                last_login: None,
            };
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn save(&self, user: &User) -> Result<(), StoreError> {
            self.users.lock().unwrap().insert(user.id, user.clone());
            Ok(())
        }
    }
}
