use axum::{
  extract::{State, WebSocketUpgrade},
  http::Method,
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

mod config;
mod game;
mod protocol;
mod server;
mod shared;
mod transport;

use config::ServerConfig;
use server::GameServer;

#[derive(Clone)]
struct AppState {
  server: Arc<GameServer>,
  read_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OkResponse {
  ok: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = ServerConfig::from_env()?;
  tracing::info!(?config, "starting snake arena server");

  let server = Arc::new(GameServer::new(config.world_settings()));
  tokio::spawn(Arc::clone(&server).run_simulation(config.tick_interval()));
  tokio::spawn(Arc::clone(&server).run_reaper(config.reap_interval()));

  let state = AppState {
    server,
    read_timeout: config.read_timeout(),
  };

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::GET])
    .allow_headers(Any);

  let app: Router = Router::new()
    .route("/api/health", get(health))
    .route("/ws", get(ws_handler))
    .layer(cors)
    .with_state(state);

  let address = format!("0.0.0.0:{}", config.port);
  let listener = tokio::net::TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("listening on ws://{address}/ws");
  axum::serve(listener, app).await.context("server stopped")?;

  Ok(())
}

async fn health() -> impl IntoResponse {
  Json(OkResponse { ok: true })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
  ws.on_upgrade(move |socket| {
    transport::ws_session::handle_socket(socket, state.server, state.read_timeout)
  })
}
