use anyhow::Context;
use clap::Parser;
use maestro::auth::jwt::AuthService;
use maestro::db::Store;
use maestro::events::UpdateBus;
use maestro::missions::{ContextManager, MissionService};
use maestro::{AppState, Config};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "maestro-server", version, about = "Self-hosted AI research server")]
struct Args {
    /// Bind address, overrides HOST from the environment
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides PORT from the environment
    #[arg(long)]
    port: Option<u16>,

    /// Database path, overrides MAESTRO_DB_PATH from the environment
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.database.path = db_path;
    }

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }
    }

    let store = Arc::new(
        Store::new_local(&config.database.path)
            .await
            .context("Failed to initialize database")?,
    );
    let auth_service = Arc::new(AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.jwt_access_expiry,
        config.auth.jwt_refresh_expiry,
    ));
    seed_admin_user(&store, &auth_service, &config).await?;

    let bus = UpdateBus::new();
    let manager = Arc::new(ContextManager::new(
        store.clone(),
        bus.clone(),
        config.research.clone(),
        config.database.data_dir.clone(),
    ));
    manager
        .load_all()
        .await
        .context("Failed to hydrate missions")?;

    let config = Arc::new(config);
    let mission_service = Arc::new(MissionService::new(
        store.clone(),
        manager.clone(),
        (*config).clone(),
    ));

    let state = AppState {
        config: config.clone(),
        store,
        manager,
        mission_service,
        bus,
        auth_service: auth_service.clone(),
    };

    let app = axum::Router::new()
        .nest("/api", maestro::api::routes::create_router(auth_service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "MAESTRO server listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Creates the configured admin user on first startup.
async fn seed_admin_user(store: &Store, auth: &AuthService, config: &Config) -> anyhow::Result<()> {
    if store
        .get_user_by_username(&config.auth.admin_username)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let password_hash = auth
        .hash_password(&config.auth.admin_password)
        .context("Failed to hash admin password")?;
    store
        .create_user(
            &Uuid::new_v4().to_string(),
            &config.auth.admin_username,
            &password_hash,
        )
        .await?;
    tracing::info!(username = %config.auth.admin_username, "Created admin user");
    Ok(())
}
