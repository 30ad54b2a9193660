use anyhow::Context;

mod app;
mod auth;
mod config;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "signet=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    // this store holds credentials; a half-migrated schema is not something
    // to limp along with
    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run database migrations")?;

    let app = app::build_app(app_state);
    app::serve(app).await
}
