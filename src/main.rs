use anyhow::Context;
use mini_cms::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    oauth::{GitHubProvider, IdentityProviderState},
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the repository and the
/// identity provider, then serves the API until the process is stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail fast before binding anything)
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;

    // 2. Logging: RUST_LOG wins, otherwise our defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mini_cms=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Persistence
    let repo: RepositoryState = if config.use_in_memory_store {
        tracing::warn!("using the in-memory store; data is lost on exit");
        Arc::new(InMemoryRepository::seeded())
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.db_url)
            .await
            .context("failed to connect to Postgres, check DATABASE_URL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        Arc::new(PostgresRepository::new(pool))
    };

    // 4. GitHub sign-in (optional outside production)
    let oauth = config
        .github
        .clone()
        .map(|github| Arc::new(GitHubProvider::new(github)) as IdentityProviderState);
    if oauth.is_none() {
        tracing::info!("GitHub sign-in disabled: AUTH_GITHUB_ID/AUTH_GITHUB_SECRET not set");
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        oauth,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
