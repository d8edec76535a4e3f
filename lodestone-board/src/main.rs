use anyhow::Context;
use lodestone_api::StatusClient;
use lodestone_board::avatars::AvatarCache;
use lodestone_board::copy::SystemClipboard;
use lodestone_board::{AppState, Board, RateLimitConfig, create_app, validation};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Lodestone status board...");

    // Load configuration from environment variables or use defaults
    let config = lodestone_board::config::Config::from_env();
    tracing::info!(
        "Configuration: bind={}:{}, api={}, address={}, poll={}s, fetch_timeout={}s",
        config.bind_address,
        config.port,
        config.status_api_url,
        config.server_address,
        config.poll_interval.as_secs(),
        config.fetch_timeout.as_secs()
    );
    tracing::info!(
        "Rate limits: action={}/sec (burst {}), general={}/sec (burst {})",
        config.rate_limit_action_per_sec,
        config.rate_limit_action_burst,
        config.rate_limit_general_per_sec,
        config.rate_limit_general_burst
    );

    validation::validate_api_url(&config.status_api_url)?;
    validation::validate_server_address(&config.server_address)?;
    validation::validate_avatar_template(&config.avatar_url)?;
    validation::validate_poll_interval(config.poll_interval)?;

    let client = StatusClient::new(&config.status_api_url, config.fetch_timeout)
        .context("failed to build status api client")?;
    let avatars = AvatarCache::new(config.avatar_url.clone(), config.fetch_timeout)
        .context("failed to build avatar client")?;

    let board = Board::with_interval(client, config.poll_interval);
    board.start();

    let rate_limit = RateLimitConfig {
        action_per_sec: config.rate_limit_action_per_sec,
        action_burst: config.rate_limit_action_burst,
        general_per_sec: config.rate_limit_general_per_sec,
        general_burst: config.rate_limit_general_burst,
    };
    let state = AppState::new(
        board.clone(),
        SystemClipboard,
        avatars,
        config.server_address.clone(),
    );
    let app = create_app(
        state,
        config.request_body_limit,
        config.request_timeout,
        rate_limit,
    )?;

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Board listening on {}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    board.stop();
    if let Err(e) = &served {
        tracing::error!("Axum server error: {}", e);
    }
    served.context("board server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
