//! PMO Dashboard backend server
//!
//! Wires the auth subsystem to PostgreSQL storage and serves the HTTP API.
//! Falls back to in-memory storage when the database is unreachable, so the
//! API stays explorable in local development.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmo_api::extractors::AppState;
use pmo_auth::directory::{DirectoryService, LdapDirectory};
use pmo_auth::memory::{MemoryDepartmentStore, MemorySessionStore, MemoryUserStore};
use pmo_auth::session::{CookieConfig, SessionManager, SessionStore};
use pmo_auth::store::{DepartmentStore, UserStore};
use pmo_auth::{password, AuthService};
use pmo_core::config::AppConfig;
use pmo_core::types::{Role, UserStatus};
use pmo_db::{Database, DatabaseConfig, PgDepartmentStore, PgSessionStore, PgUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        directory_enabled = config.directory.enabled,
        "Starting PMO Dashboard backend"
    );

    let stores = build_stores(&config).await?;
    let db = stores.database.clone();
    let state = build_state(&config, stores);
    spawn_session_sweeper(state.auth.sessions().clone());

    let app = build_router(state, db.clone());

    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }
    info!("Server shutdown complete");
    Ok(())
}

struct Stores {
    users: Arc<dyn UserStore>,
    departments: Arc<dyn DepartmentStore>,
    sessions: Arc<dyn SessionStore>,
    /// Present when PostgreSQL-backed; the health endpoint pings through it.
    database: Option<Database>,
}

/// Connect to PostgreSQL, or fall back to in-memory stores with a seeded
/// administrator so the API stays usable without a database.
async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    let db_config = DatabaseConfig::with_url(&config.database.url);
    match Database::connect(&db_config).await {
        Ok(db) => {
            db.migrate().await?;
            info!("Connected to database");
            Ok(Stores {
                users: Arc::new(PgUserStore::new(db.pool().clone())),
                departments: Arc::new(PgDepartmentStore::new(db.pool().clone())),
                sessions: Arc::new(PgSessionStore::new(db.pool().clone())),
                database: Some(db),
            })
        }
        Err(e) => {
            warn!(
                "Failed to connect to database: {}. Running with in-memory storage.",
                e
            );
            let users = Arc::new(MemoryUserStore::new());
            seed_dev_admin(&users)?;
            Ok(Stores {
                users,
                departments: Arc::new(MemoryDepartmentStore::new()),
                sessions: Arc::new(MemorySessionStore::new()),
                database: None,
            })
        }
    }
}

/// In-memory mode starts empty, which would make every login fail. Seed one
/// administrator with a fresh random password and print it once.
fn seed_dev_admin(users: &MemoryUserStore) -> anyhow::Result<()> {
    let generated = password::generate_password();
    let hash = password::hash_password(&generated)
        .map_err(|e| anyhow::anyhow!("failed to hash seed password: {}", e))?;
    users.insert(
        "admin",
        "admin@localhost",
        "Administrator",
        &hash,
        Role::Administrator,
        UserStatus::Active,
        None,
    );
    warn!("Seeded in-memory administrator 'admin' with password {generated}");
    Ok(())
}

fn build_state(config: &AppConfig, stores: Stores) -> AppState {
    let database_backed = stores.database.is_some();
    let directory: Option<Arc<dyn DirectoryService>> = if config.directory.enabled {
        info!(url = %config.directory.url, "Directory authentication enabled");
        Some(Arc::new(LdapDirectory::new(config.directory.clone())))
    } else {
        None
    };

    let sessions = SessionManager::new(stores.sessions, &config.session);

    // The directory leg makes up to four bounded round trips; the overall
    // deadline must exceed their sum plus the local verification.
    let login_deadline = Duration::from_secs(config.directory.timeout_secs * 4 + 5);

    let auth = AuthService::new(stores.users, stores.departments, directory, sessions)
        .with_login_deadline(login_deadline);

    if !database_backed {
        warn!("Sessions and users are not durable in in-memory mode");
    }

    AppState {
        auth: Arc::new(auth),
        cookies: CookieConfig::from_config(&config.session),
    }
}

/// Periodically delete expired sessions from the store.
fn spawn_session_sweeper(sessions: SessionManager) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match sessions.sweep().await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "expired sessions removed"),
                Err(e) => warn!("session sweep failed: {}", e),
            }
        }
    });
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,pmo_server=debug,pmo_api=debug,pmo_auth=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Build the application router
fn build_router(state: AppState, db: Option<Database>) -> Router {
    Router::new()
        .route("/health", get(health).with_state(db))
        .merge(pmo_api::router().with_state(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// Liveness, plus database reachability when PostgreSQL-backed.
async fn health(State(db): State<Option<Database>>) -> Json<serde_json::Value> {
    let database = match &db {
        Some(db) => match db.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("database ping failed: {}", e);
                "unavailable"
            }
        },
        None => "disabled",
    };

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
