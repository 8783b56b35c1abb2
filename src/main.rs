// src/main.rs

use std::time::Duration;

use chrono::Utc;
use dotenvy::dotenv;
use nucleus::{
    config::Config,
    db,
    error::{AppError, is_unique_violation},
    routes,
    state::AppState,
    utils::{jwt::ROLE_ADMIN, password::hash_password},
};
use sqlx::SqlitePool;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "nucleus.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match db::connect(&config.database_url, 5).await {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to open database after 5 retries: {}", e);
                    std::process::exit(1);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected, running migrations...");
    if let Err(e) = db::migrate(&pool).await {
        tracing::error!("Failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    let state = match AppState::new(pool, config.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to build LLM clients: {:?}", e);
            std::process::exit(1);
        }
    };

    let app = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let hashed_password = hash_password(password)?;
    let inserted = sqlx::query(
        "INSERT INTO users (username, password, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(&hashed_password)
    .bind(ROLE_ADMIN)
    .bind(Utc::now())
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => tracing::info!("Seeded admin user: {}", username),
        Err(e) if is_unique_violation(&e) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
