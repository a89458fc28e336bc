//! Chatis Server: two-party real-time chat
//!
//! Main entry point that wires all crates together and starts the server.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use chatis_api::{AppState, build_router};
use chatis_auth::jwt::JwtEncoder;
use chatis_core::config::{AppConfig, DatabaseBackend};
use chatis_core::error::AppError;
use chatis_database::memory::{MemoryMessageStore, MemoryUserStore};
use chatis_database::repositories::{MessageRepository, UserRepository};
use chatis_database::store::{MessageStore, UserStore};
use chatis_database::{DatabasePool, migration};
use chatis_entity::user::User;

#[tokio::main]
async fn main() {
    let env = std::env::var("CHATIS_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Store backends selected by `database.backend`.
struct Stores {
    users: Arc<dyn UserStore>,
    messages: Arc<dyn MessageStore>,
    pool: Option<DatabasePool>,
}

async fn open_stores(config: &AppConfig) -> Result<Stores, AppError> {
    match config.database.backend {
        DatabaseBackend::Postgres => {
            let pool = DatabasePool::connect(&config.database).await?;
            migration::run_migrations(pool.pool()).await?;

            let users = UserRepository::new(pool.pool().clone());
            let reset = users.reset_presence().await?;
            info!(reset, "Cleared presence left over from the previous run");

            let encoder = JwtEncoder::new(&config.auth);
            for name in &config.database.seed_users {
                let user = match users.find_by_username(name).await? {
                    Some(user) => user,
                    None => users.create(name, None, None).await?,
                };
                log_seeded(&encoder, &user)?;
            }

            Ok(Stores {
                users: Arc::new(users),
                messages: Arc::new(MessageRepository::new(pool.pool().clone())),
                pool: Some(pool),
            })
        }
        DatabaseBackend::Memory => {
            warn!("Using in-memory stores; all data is lost on exit");

            let users = MemoryUserStore::new();
            let encoder = JwtEncoder::new(&config.auth);
            for name in &config.database.seed_users {
                log_seeded(&encoder, &users.create(name))?;
            }

            Ok(Stores {
                users: Arc::new(users),
                messages: Arc::new(MemoryMessageStore::new()),
                pool: None,
            })
        }
    }
}

/// Seeded users get a ready-made token so a client can connect right away.
fn log_seeded(encoder: &JwtEncoder, user: &User) -> Result<(), AppError> {
    let token = encoder.issue(user.id, &user.username)?;
    info!(user_id = %user.id, username = %user.username, %token, "Seeded user");
    Ok(())
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    info!("Starting Chatis v{}", env!("CARGO_PKG_VERSION"));

    let Stores {
        users,
        messages,
        pool,
    } = open_stores(&config).await?;

    tokio::fs::create_dir_all(&config.uploads.directory).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let state = AppState::new(config, users, messages);
    let engine = state.realtime.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "Chatis server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, starting graceful shutdown...");
        engine.shutdown();
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let mut deadline_rx = shutdown_rx;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|e| AppError::internal(format!("Server error: {e}")))?;
        }
        _ = async {
            let _ = deadline_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "Grace period elapsed, forcing shutdown");
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }

    info!("Chatis server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
