use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use crate::auth::dto::{
    AuthResponse, LoginRequest, ProfilePatch, RefreshRequest, RegisterRequest, UserProfile,
};
use crate::auth::error::AuthError;
use crate::auth::extractors::AuthUser;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route("/auth/logout", post(logout))
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self {
            AuthError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    state.auth.register(payload).await.map(Json)
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    state.auth.login(payload).await.map(Json)
}

#[instrument(skip(state, payload))]
async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    state.auth.refresh(payload).await.map(Json)
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AuthError> {
    state.auth.get_user(user_id).await.map(Json)
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ProfilePatch>,
) -> Result<Json<UserProfile>, AuthError> {
    state.auth.update_profile(user_id, payload).await.map(Json)
}

#[instrument(skip(state))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.auth.logout(user_id).await?;
    Ok(Json(json!({ "message": "logged out" })))
}
