pub mod avatars;
pub mod board;
pub mod config;
pub mod copy;
mod error;
pub mod render;
mod routes;
pub mod validation;

pub use board::{Board, BoardState, DisplayState};

use anyhow::Context;
use axum::{
    Router,
    http::{Method, StatusCode},
    routing::{get, post},
};
use lodestone_api::StatusSource;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::avatars::AvatarCache;
use crate::copy::Clipboard;
use crate::render::RenderConfig;

pub struct AppState<S, C> {
    pub board: Board<S>,
    pub clipboard: C,
    pub avatars: AvatarCache,
    /// Server address handed to the clipboard
    pub address: String,
    pub render: RenderConfig,
}

impl<S, C> AppState<S, C> {
    pub fn new(board: Board<S>, clipboard: C, avatars: AvatarCache, address: impl Into<String>) -> Self {
        Self {
            board,
            clipboard,
            avatars,
            address: address.into(),
            render: RenderConfig::default(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for the action endpoints (/retry, /copy)
    pub action_per_sec: u64,
    /// Burst size for the action endpoints
    pub action_burst: u32,
    /// Requests per second for status and avatar reads
    pub general_per_sec: u64,
    /// Burst size for status and avatar reads
    pub general_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            action_per_sec: 2,
            action_burst: 5,
            general_per_sec: 20,
            general_burst: 50,
        }
    }
}

/// Create the board router around the given state
pub fn create_app<S: StatusSource, C: Clipboard>(
    state: AppState<S, C>,
    request_body_limit: usize,
    request_timeout: Duration,
    rate_limit: RateLimitConfig,
) -> anyhow::Result<Router> {
    let state = Arc::new(state);

    // Actions hit the status API or the host clipboard, keep them scarce
    let action_governor = GovernorConfigBuilder::default()
        .per_millisecond(replenish_interval_ms(rate_limit.action_per_sec))
        .burst_size(rate_limit.action_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .context("invalid action rate limit")?;

    let general_governor = GovernorConfigBuilder::default()
        .per_millisecond(replenish_interval_ms(rate_limit.general_per_sec))
        .burst_size(rate_limit.general_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .context("invalid general rate limit")?;

    let action_routes = Router::new()
        .route("/retry", post(routes::retry::<S, C>))
        .route("/copy", post(routes::copy::<S, C>))
        .layer(GovernorLayer::new(action_governor));

    let general_routes = Router::new()
        .route("/status", get(routes::status::<S, C>))
        .route("/status.png", get(routes::status_png::<S, C>))
        .route("/avatar/{name}", get(routes::avatar::<S, C>))
        .layer(GovernorLayer::new(general_governor))
        // Pages hosted elsewhere may read the board
        .layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]));

    Ok(Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(action_routes)
        .merge(general_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Governor quotas are expressed as the interval between replenished requests
fn replenish_interval_ms(per_sec: u64) -> u64 {
    (1000 / per_sec.max(1)).max(1)
}
