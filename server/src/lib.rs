use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, classify::ServerErrorsFailureClass, services::ServeDir,
    trace::TraceLayer,
};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod error;
pub mod gate;
mod handlers;
pub mod openapi;

#[cfg(test)] // <-- not needed in integration tests
extern crate rstest;

use crate::config::Config;
use crate::gate::UploadGate;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "imgup=debug,server=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Serves until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> io::Result<()> {
    init_tracing();

    tokio::fs::create_dir_all(&config.gate.uploads_dir).await?;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        "listening on {} serving {} uploads into {}",
        listener.local_addr()?,
        config.public_dir.display(),
        config.gate.uploads_dir.display()
    );

    let app = create_routes(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub fn create_routes(config: &Config) -> Router {
    let gate = Arc::new(UploadGate::new(config.gate.clone()));
    let body_limit = usize::try_from(gate.max_request_size()).unwrap_or(usize::MAX);
    let assets = ServeDir::new(&config.public_dir);

    Router::new()
        .route("/", get(handlers::upload_form))
        .route("/upload", post(handlers::upload))
        .route("/api-docs/openapi.json", get(openapi::serve))
        .fallback(move |request: Request| handlers::static_asset(assets.clone(), request))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Server error: {error}");
                    },
                ))
                .layer(CatchPanicLayer::custom(error::handle_panic))
                .layer(DefaultBodyLimit::max(body_limit))
                .into_inner(),
        )
        .with_state(gate)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
