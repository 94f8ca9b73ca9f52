use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sentry_proto::action::ActionCommand;
use sentry_proto::api::{CommandReply, CommandRequest, StatusReport};
use tracing::info;

use crate::dispatch::{CommandDispatcher, DispatchError};
use crate::state::TurretState;

#[derive(Clone)]
pub struct Api {
    pub state: Arc<TurretState>,
    pub dispatcher: Arc<CommandDispatcher>,
}

pub fn router(api: Api) -> Router {
    Router::new()
        .route("/command", post(command))
        .route("/status", get(status))
        .with_state(api)
}

/// Binds and serves until the shutdown future resolves.
pub async fn serve(
    listen_addr: &str,
    api: Api,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("bind {}", listen_addr))?;
    info!("turret: listening on {}", listen_addr);
    axum::serve(listener, router(api))
        .with_graceful_shutdown(shutdown)
        .await
        .context("turret http server")
}

async fn command(
    State(api): State<Api>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<CommandReply>) {
    let action = ActionCommand::parse(&req.action);
    match api.dispatcher.handle(action).await {
        Ok(()) => (StatusCode::OK, Json(CommandReply::ok())),
        Err(e) => (status_for(&e), Json(CommandReply::error(e.to_string()))),
    }
}

fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Sabotaged => StatusCode::FORBIDDEN,
        DispatchError::UnknownAction => StatusCode::BAD_REQUEST,
        DispatchError::Link(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn status(State(api): State<Api>) -> Json<StatusReport> {
    Json(api.state.report())
}
