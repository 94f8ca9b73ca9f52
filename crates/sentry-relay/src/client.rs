use std::time::Duration;

use anyhow::{Context, Result};
use sentry_proto::api::{CommandReply, CommandRequest, StatusReport};

/// Command forwards stay snappy so a held trigger never queues behind a
/// dead network.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);
const STATUS_TIMEOUT: Duration = Duration::from_secs(1);

/// What the turret answered to a forwarded command, status code included so
/// the browser sees the turret's own verdict (403 on sabotage, etc).
#[derive(Debug)]
pub struct ForwardReply {
    pub code: u16,
    pub body: CommandReply,
}

/// HTTP client for the turret node. A connection failure or non-2xx status
/// reads as "turret offline" to callers.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base: String,
}

impl RelayClient {
    pub fn new(turret_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(COMMAND_TIMEOUT)
            .build()
            .context("build relay http client")?;
        Ok(Self { http, base: turret_url.trim_end_matches('/').to_string() })
    }

    pub async fn send_command(&self, action: &str) -> Result<ForwardReply> {
        let resp = self
            .http
            .post(format!("{}/command", self.base))
            .timeout(COMMAND_TIMEOUT)
            .json(&CommandRequest { action: action.to_string() })
            .send()
            .await
            .context("turret unreachable")?;
        let code = resp.status().as_u16();
        let body = resp
            .json()
            .await
            .unwrap_or_else(|_| CommandReply::error("unparseable reply from turret"));
        Ok(ForwardReply { code, body })
    }

    pub async fn fetch_status(&self) -> Result<StatusReport> {
        let resp = self
            .http
            .get(format!("{}/status", self.base))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .context("turret unreachable")?;
        anyhow::ensure!(resp.status().is_success(), "turret status: HTTP {}", resp.status());
        resp.json().await.context("decode turret status")
    }
}
