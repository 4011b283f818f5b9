//! # turnstile-rs
//!
//! Small HTTP gatekeeper: issues and verifies bearer tokens, guards an admin
//! console with HTTP Basic credentials, and keeps a persistent visit counter.
//!
//! ## Architecture
//!
//! - **Store**: SQLite credential store and append-only visit log (sqlx)
//! - **Tokens**: HS256 JWTs with a username claim, 24h lifetime by default
//! - **Gateways**: bearer-token and basic-auth middlewares over separate
//!   route groups
//! - **HTTP**: Axum router with request IDs, tracing, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod config;
mod http;
mod password;
mod store;
mod token;

use std::net::SocketAddr;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::password::PasswordHasher;
use crate::store::Store;
use crate::token::TokenService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        database_url = %config.database_url,
        token_ttl_hours = config.token_ttl_hours,
        bcrypt_cost = config.bcrypt_cost,
        "configuration loaded"
    );

    // fail fast: there is no degraded mode without storage
    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let state = AppState {
        store,
        tokens: TokenService::new(&config.secret, config.token_ttl_hours),
        hasher: PasswordHasher::new(config.bcrypt_cost),
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "turnstile-rs listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
