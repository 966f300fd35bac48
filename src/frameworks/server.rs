// Framework bootstrap for the game server runtime.

use crate::domain::{Color, Layout, MonotonicClock, SetupError};
use crate::frameworks::config;
use crate::interface_adapters::net::{Hub, attach_feed, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{GameHandle, GameOptions, launch_game};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

/// Everything needed to host one game.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub layout: Layout,
    pub options: GameOptions,
    pub acks: bool,
}

impl ServerConfig {
    pub fn from_env() -> std::result::Result<Self, SetupError> {
        Ok(Self {
            layout: Layout::standard()?,
            options: GameOptions {
                tick_interval: config::tick_interval(),
                command_capacity: config::COMMAND_CHANNEL_CAPACITY,
                ..GameOptions::default()
            },
            acks: config::acks_enabled(),
        })
    }
}

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let settings = ServerConfig::from_env().map_err(std::io::Error::other)?;
    run_with(listener, settings).await
}

pub async fn run_with(listener: tokio::net::TcpListener, settings: ServerConfig) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings)?;
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::host(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(settings: ServerConfig) -> Result<Arc<AppState>> {
    // Game and hub share one epoch so event timestamps line up.
    let clock = MonotonicClock::new();
    let tick_interval_ms = settings.options.tick_interval.as_millis() as u64;
    let (handle, feed) = launch_game(
        settings.layout,
        settings.options,
        Box::new(clock.clone()),
        |bus| attach_feed(bus, config::EVENT_FEED_CAPACITY),
    )
    .inspect_err(|e| tracing::error!(error = %e, "invalid initial layout"))
    .map_err(std::io::Error::other)?;

    let hub = Hub::new(
        handle.commands.clone(),
        handle.snapshots.clone(),
        clock,
        config::BROADCAST_CAPACITY,
        settings.acks,
    );
    hub.spawn_fanout(feed);
    tracing::debug!(
        tick_interval_ms,
        acks = settings.acks,
        "game launched"
    );
    spawn_final_score_logger(handle);

    Ok(Arc::new(AppState { hub }))
}

fn spawn_final_score_logger(handle: GameHandle) {
    let GameHandle {
        score,
        history,
        ticker,
        ..
    } = handle;
    tokio::spawn(async move {
        let Some(game) = ticker.join().await else {
            return;
        };
        let totals = score.totals();
        tracing::info!(
            finished = game.is_finished(),
            white = totals.white,
            black = totals.black,
            moves = history.len(),
            white_moves = history.entries(Color::White).len(),
            "final score"
        );
    });
}
