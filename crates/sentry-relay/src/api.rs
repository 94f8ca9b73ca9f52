use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sentry_audio::{Cue, CueManager};
use sentry_proto::action::ActionCommand;
use sentry_proto::api::{CommandReply, CommandRequest, StatusReport};
use tracing::{info, warn};

use crate::client::RelayClient;

#[derive(Clone)]
pub struct Api {
    pub client: RelayClient,
    pub cues: Arc<CueManager>,
}

pub fn router(api: Api) -> Router {
    Router::new()
        .route("/api/command", post(command))
        .route("/api/status/turret", get(status))
        .route("/api/notify", post(notify))
        .with_state(api)
}

pub async fn serve(
    listen_addr: &str,
    api: Api,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("bind {}", listen_addr))?;
    info!("relay: listening on {}", listen_addr);
    axum::serve(listener, router(api))
        .with_graceful_shutdown(shutdown)
        .await
        .context("relay http server")
}

/// Forwards browser commands to the turret, mirroring the turret's own
/// status code. Unknown actions are rejected here, before the network.
async fn command(
    State(api): State<Api>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<CommandReply>) {
    if matches!(ActionCommand::parse(&req.action), ActionCommand::Unknown) {
        return (StatusCode::BAD_REQUEST, Json(CommandReply::error("unknown action")));
    }
    match api.client.send_command(&req.action).await {
        Ok(fwd) => {
            let code = StatusCode::from_u16(fwd.code).unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(fwd.body))
        }
        Err(e) => {
            warn!("relay: command forward failed: {:#}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(CommandReply::error("turret offline")))
        }
    }
}

/// Proxies the turret status for the browser and keeps the local alarm in
/// step with it, exactly like the background mirror does.
async fn status(State(api): State<Api>) -> (StatusCode, Json<StatusReport>) {
    match api.client.fetch_status().await {
        Ok(report) => {
            api.cues.set_alert_loop(report.sabotaged).await;
            (StatusCode::OK, Json(report))
        }
        Err(e) => {
            warn!("relay: status fetch failed: {:#}", e);
            api.cues.set_alert_loop(false).await;
            (StatusCode::SERVICE_UNAVAILABLE, Json(StatusReport::offline()))
        }
    }
}

async fn notify(State(api): State<Api>) -> (StatusCode, Json<CommandReply>) {
    api.cues.play_one_shot(Cue::Notification);
    (StatusCode::OK, Json(CommandReply::ok()))
}
