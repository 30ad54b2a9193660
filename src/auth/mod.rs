use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod repo;
pub mod service;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
