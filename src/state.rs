use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::jwt::TokenSigner;
use crate::auth::repo::PgCredentialStore;
use crate::auth::service::AuthService;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub signer: TokenSigner,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let signer = TokenSigner::new(&config.jwt);
        let store = Arc::new(PgCredentialStore::new(db.clone()));
        let auth = AuthService::new(store, signer.clone());

        Ok(Self { db, signer, auth })
    }
}
