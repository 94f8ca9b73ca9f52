use std::sync::Arc;
use std::time::Duration;

use sentry_audio::CueManager;
use tracing::debug;

use crate::client::RelayClient;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls the turret and rings the local alarm while it reports sabotage.
///
/// Offline means silence: a dead link must not leave the alarm wailing, so
/// any fetch failure or non-2xx stops the loop. Never returns.
pub async fn run(client: RelayClient, cues: Arc<CueManager>) {
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    loop {
        tick.tick().await;
        match client.fetch_status().await {
            Ok(status) => cues.set_alert_loop(status.sabotaged).await,
            Err(e) => {
                debug!("mirror: {:#}; alarm off", e);
                cues.set_alert_loop(false).await;
            }
        }
    }
}
