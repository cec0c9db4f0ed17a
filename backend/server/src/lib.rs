//! Documentation of the hospital operations backend.
//!
//! Staff accounts, daily ward census entry, surge capacity and the ETU shift planner,
//! served as JSON over HTTP to the React dashboard.
//!
//!
//!
//! # General Infrastructure
//! - The dashboard talks to this server only, every route answers JSON
//! - Documents live in Redis under one key prefix, see [`census::store`]
//! - The `import` binary seeds ETU history from the dataset export
//! - Mail leaves through an HTTP relay when `MAIL_RELAY_URL` is set
//!
//!
//!
//! # Routes
//!
//! | Prefix | Module | Purpose |
//! |---|---|---|
//! | `/api/HospitalUsers` | [`routes::users`] | user CRUD for the admin screens |
//! | `/api/auth`, `/api` | [`routes::auth`] | register, login, OTP recovery, own profile |
//! | `/api` | [`routes::records`] | census and surge entry, history, trend chart |
//! | `/api` | [`routes::beds`] | bed inventory and ward status |
//! | `/predict`, `/api/optimization` | [`routes::forecast`] | next shift forecast and allocation |
//!
//! Every error answers `{"message": ...}`, see [`error::AppError`].
//!
//!
//!
//! # Notes
//!
//! ## Roles
//! The role is stored on the user and returned at login. The frontend picks the
//! dashboard from it, the server does not gate routes on it.
//!
//! ## Password Recovery
//! 1. `generateOTP` mails a six digit code
//! 2. `verifyOTP` consumes the code and opens a short reset session
//! 3. `createResetSession` lets the frontend check the session is still open
//! 4. `resetPassword` consumes the session and stores the new hash
//!
//! ## Legacy ETU Rows
//! The first ETU form sent no `Ward_ID` and `ETU_` prefixed counts. Those rows are
//! read as ETU census entries, see [`census::events`].
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally without Redis.
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=info cargo run -p server
//! ```
//!
//! Seed ETU history.
//! ```sh
//! cargo run -p import -- data/etu_history.csv
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod mail;
pub mod planner;
pub mod routes;
pub mod state;
pub mod utils;

use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await?;

    info!("Starting server...");

    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

pub fn build_router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    routes::api_routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
