use std::sync::Arc;
use std::time::Duration;

use sentry_audio::CueManager;
use sentry_link::SerialLink;
use sentry_proto::action::KEEP_ALIVE;
use sentry_proto::telemetry::TelemetryFrame;
use tracing::{debug, warn};

use crate::state::TurretState;

/// Fast enough that a sabotage frame interlocks within a human-imperceptible
/// delay.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Background loop: refreshes telemetry, drives the alert/idle cues, and
/// feeds the actuator keep-alives. Sole writer of the telemetry fields.
pub struct TelemetryPoller {
    state: Arc<TurretState>,
    link: Arc<SerialLink>,
    cues: Arc<CueManager>,
}

impl TelemetryPoller {
    pub fn new(state: Arc<TurretState>, link: Arc<SerialLink>, cues: Arc<CueManager>) -> Self {
        Self { state, link, cues }
    }

    /// Never returns.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(POLL_INTERVAL);
        loop {
            tick.tick().await;
            self.tick().await;
        }
    }

    /// One poll cycle, split out so tests can drive it directly.
    pub async fn tick(&self) {
        if let Some(line) = self.link.try_read_line().await {
            match TelemetryFrame::parse(&line) {
                Some(frame) => {
                    if frame.sabotaged && !self.state.sabotaged() {
                        warn!("telemetry: sabotage reported, interlocking");
                    }
                    self.state.apply_frame(&frame);
                }
                None => debug!("telemetry: discarded line {:?}", line),
            }
        }

        let sabotaged = self.state.sabotaged();
        self.cues.set_alert_loop(sabotaged).await;
        self.cues.maybe_play_idle(sabotaged, self.state.firing()).await;

        // Sabotage silences the link entirely, keep-alive included.
        if !sabotaged {
            if let Err(e) = self.link.write_line(KEEP_ALIVE).await {
                debug!("keep-alive: {}", e);
            }
        }
    }
}
