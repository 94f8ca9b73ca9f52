use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

/// Minimum quiet gap before the idle beep repeats.
const IDLE_GAP: Duration = Duration::from_secs(10);

/// How long to back off when the player binary refuses to spawn, so a
/// missing `aplay` does not turn the alert loop into a busy loop.
const RESPAWN_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Directory holding the wav samples.
    #[serde(default = "default_sound_dir")]
    pub sound_dir: String,
    /// Player binary; anything that takes `-q <file>` works.
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default = "default_buildup")]
    pub buildup: String,
    #[serde(default = "default_idle")]
    pub idle: String,
    #[serde(default = "default_alert")]
    pub alert: String,
    #[serde(default = "default_spot")]
    pub spot: String,
    #[serde(default = "default_taunt")]
    pub taunt: String,
    #[serde(default = "default_notification")]
    pub notification: String,
}

fn default_sound_dir() -> String { "./sounds".into() }
fn default_player() -> String { "aplay".into() }
fn default_buildup() -> String { "sentry_buildup.wav".into() }
fn default_idle() -> String { "sentry_idle.wav".into() }
fn default_alert() -> String { "sentry_sap.wav".into() }
fn default_spot() -> String { "sentry_spot.wav".into() }
fn default_taunt() -> String { "tf_domination.wav".into() }
fn default_notification() -> String { "tf_notification.wav".into() }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sound_dir: default_sound_dir(),
            player: default_player(),
            buildup: default_buildup(),
            idle: default_idle(),
            alert: default_alert(),
            spot: default_spot(),
            taunt: default_taunt(),
            notification: default_notification(),
        }
    }
}

/// Short fire-and-forget samples. The looping alert is not a `Cue`: it has
/// its own tracked lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Buildup,
    Idle,
    Spot,
    Taunt,
    Notification,
}

/// Starts and stops OS-level playback processes.
///
/// One-shots are untracked and may overlap. The looping alert is tracked as
/// a single handle: zero or one live at any instant, so repeated sabotage
/// frames can never stack playback processes.
pub struct CueManager {
    cfg: AudioConfig,
    alert: Mutex<Option<watch::Sender<bool>>>,
    last_idle: Mutex<Instant>,
}

impl CueManager {
    pub fn new(cfg: AudioConfig) -> Self {
        Self {
            cfg,
            alert: Mutex::new(None),
            last_idle: Mutex::new(Instant::now()),
        }
    }

    fn sample(&self, file: &str) -> PathBuf {
        Path::new(&self.cfg.sound_dir).join(file)
    }

    /// Launches an untracked playback of a short sample. Overlapping
    /// one-shots are fine; a spawn failure is logged and swallowed.
    pub fn play_one_shot(&self, cue: Cue) {
        let file = match cue {
            Cue::Buildup => &self.cfg.buildup,
            Cue::Idle => &self.cfg.idle,
            Cue::Spot => &self.cfg.spot,
            Cue::Taunt => &self.cfg.taunt,
            Cue::Notification => &self.cfg.notification,
        };
        spawn_player(&self.cfg.player, &self.sample(file));
    }

    /// Idempotent alert-loop control. false→true spawns the looping task,
    /// true→false cancels it (killing the live player child); calls that
    /// match the current state do nothing.
    pub async fn set_alert_loop(&self, active: bool) {
        let mut slot = self.alert.lock().await;
        if active {
            if slot.is_none() {
                let (stop, stopped) = watch::channel(false);
                let player = self.cfg.player.clone();
                let sample = self.sample(&self.cfg.alert);
                tokio::spawn(alert_loop(player, sample, stopped));
                *slot = Some(stop);
                warn!("audio: alert loop started");
            }
        } else if let Some(stop) = slot.take() {
            let _ = stop.send(true);
            warn!("audio: alert loop stopped");
        }
    }

    pub async fn alert_active(&self) -> bool {
        self.alert.lock().await.is_some()
    }

    /// Idle beep bookkeeping. Any sabotage or actuator activity resets the
    /// timer (no beep right after the action stops); otherwise the idle cue
    /// plays once per elapsed gap. Returns whether a cue fired.
    pub async fn maybe_play_idle(&self, is_sabotaged: bool, is_active: bool) -> bool {
        let now = Instant::now();
        let mut last = self.last_idle.lock().await;
        if is_sabotaged || is_active {
            *last = now;
            return false;
        }
        if now.duration_since(*last) >= IDLE_GAP {
            self.play_one_shot(Cue::Idle);
            *last = now;
            return true;
        }
        false
    }
}

/// Repeats the alert sample until cancelled. Cancellation kills the live
/// player child, so stopping the loop silences playback promptly instead of
/// letting the current 12-second sample run out.
async fn alert_loop(player: String, sample: PathBuf, mut stopped: watch::Receiver<bool>) {
    loop {
        if *stopped.borrow() {
            return;
        }
        let mut child = match Command::new(&player)
            .arg("-q")
            .arg(&sample)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("audio: alert spawn failed: {}", e);
                tokio::select! {
                    _ = stopped.changed() => return,
                    _ = tokio::time::sleep(RESPAWN_BACKOFF) => continue,
                }
            }
        };
        tokio::select! {
            _ = stopped.changed() => {
                if let Err(e) = child.kill().await {
                    debug!("audio: alert child kill: {}", e);
                }
                return;
            }
            status = child.wait() => {
                match status {
                    // sample finished; loop and play it again
                    Ok(s) if s.success() => {}
                    Ok(s) => {
                        warn!("audio: alert player exited {}", s);
                        tokio::select! {
                            _ = stopped.changed() => return,
                            _ = tokio::time::sleep(RESPAWN_BACKOFF) => {}
                        }
                    }
                    Err(e) => {
                        warn!("audio: alert playback wait: {}", e);
                        return;
                    }
                }
            }
        }
    }
}

fn spawn_player(player: &str, sample: &Path) {
    let spawned = Command::new(player)
        .arg("-q")
        .arg(sample)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(_) => debug!("audio: one-shot {}", sample.display()),
        Err(e) => warn!("audio: one-shot {} failed: {}", sample.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CueManager {
        // player that does not exist: spawn failures are logged and
        // swallowed, which is exactly the contract under test
        let cfg = AudioConfig { player: "/nonexistent/player".into(), ..AudioConfig::default() };
        CueManager::new(cfg)
    }

    #[tokio::test]
    async fn alert_loop_is_idempotent_on_start() {
        let cues = manager();
        assert!(!cues.alert_active().await);
        cues.set_alert_loop(true).await;
        assert!(cues.alert_active().await);
        // second start is a no-op, still exactly one handle
        cues.set_alert_loop(true).await;
        assert!(cues.alert_active().await);

        cues.set_alert_loop(false).await;
        assert!(!cues.alert_active().await);
        // second stop is a no-op
        cues.set_alert_loop(false).await;
        assert!(!cues.alert_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_cue_respects_the_gap() {
        let cues = manager();
        // fresh manager: timer starts now, nothing fires early
        assert!(!cues.maybe_play_idle(false, false).await);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cues.maybe_play_idle(false, false).await);
        // fired once; the gap restarts
        assert!(!cues.maybe_play_idle(false, false).await);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!cues.maybe_play_idle(false, false).await);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cues.maybe_play_idle(false, false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sabotage_and_activity_suppress_and_reset_idle() {
        let cues = manager();
        tokio::time::advance(Duration::from_secs(60)).await;
        // long overdue, but sabotage wins and resets the timer
        assert!(!cues.maybe_play_idle(true, false).await);
        assert!(!cues.maybe_play_idle(false, false).await);

        tokio::time::advance(Duration::from_secs(60)).await;
        // same for firing activity
        assert!(!cues.maybe_play_idle(false, true).await);
        assert!(!cues.maybe_play_idle(false, false).await);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cues.maybe_play_idle(false, false).await);
    }
}
