// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the event management backend.
use anyhow::Context;
use backend_lib::{
    config::{load_settings, LogFormat, Settings},
    create_router, AppState,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often per-IP limiter state is pruned
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Parser)]
#[command(name = "eventmgmt-server", version, about = "Event management backend")]
struct Args {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// Start the background sweeps for expiring state
fn spawn_maintenance(state: &AppState) {
    let settings = &state.settings;
    state
        .reset_tokens()
        .spawn_cleanup_task(settings.reset.sweep_interval());
    state
        .sessions
        .spawn_cleanup_task(settings.session.cleanup_interval());

    let login_limiter = state.login_limiter.clone();
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LIMITER_CLEANUP_INTERVAL).await;
            login_limiter.cleanup();
            rate_limiter.cleanup();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings =
        load_settings(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let addr = settings.bind_addr;
    tracing::info!(
        storage = ?settings.storage,
        password_scheme = ?settings.password.scheme,
        smtp = settings.mail.smtp_host.is_some(),
        "starting event management backend"
    );

    let state = Arc::new(AppState::from_settings(settings).context("failed to build application state")?);
    spawn_maintenance(&state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(state).layer(cors);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
