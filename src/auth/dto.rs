use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Option<String>,
    pub phone_number: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh: the (possibly expired) access token plus
/// the opaque refresh token it was issued alongside.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
    pub refresh_token: String,
}

/// Partial profile update. An absent field or an empty string both mean
/// "leave unchanged"; see DESIGN.md.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
}

/// Response returned after register, login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Public projection of a user record. Never carries the password hash or
/// the refresh-token pair.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
            phone_number: user.phone_number,
            profile_picture: user.profile_picture,
            department: user.department,
            student_id: user.student_id,
        }
    }
}
