use std::sync::Arc;

use sentry_audio::{Cue, CueManager};
use sentry_link::{LinkError, SerialLink};
use sentry_proto::action::ActionCommand;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::TurretState;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Hard interlock: the hardware reported sabotage. The message doubles
    /// as the HTTP error body, so it stays in the operators' language.
    #[error("SABOTAGE EN COURS")]
    Sabotaged,
    #[error("unknown action")]
    UnknownAction,
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Validates actuation requests against the interlock and turns them into
/// serial writes and one-shot cues.
pub struct CommandDispatcher {
    state: Arc<TurretState>,
    link: Arc<SerialLink>,
    cues: Arc<CueManager>,
}

impl CommandDispatcher {
    pub fn new(state: Arc<TurretState>, link: Arc<SerialLink>, cues: Arc<CueManager>) -> Self {
        Self { state, link, cues }
    }

    /// Executes one action, at most once: a failed serial write is surfaced
    /// to the caller and never retried.
    pub async fn handle(&self, action: ActionCommand) -> Result<(), DispatchError> {
        // Interlock first: while sabotaged, nothing reaches the wire.
        if self.state.sabotaged() {
            warn!("dispatch: {:?} blocked, turret sabotaged", action);
            return Err(DispatchError::Sabotaged);
        }

        match action {
            ActionCommand::Unknown => return Err(DispatchError::UnknownAction),
            ActionCommand::Taunt => {
                self.cues.play_one_shot(Cue::Taunt);
                return Ok(());
            }
            // the spot sound announces the shot before the dart leaves
            ActionCommand::FireStart => self.cues.play_one_shot(Cue::Spot),
            _ => {}
        }

        if let Some(token) = action.serial_token() {
            self.link.write_line(token).await?;
            match action {
                ActionCommand::FireStart => self.state.set_firing(true),
                ActionCommand::FireStop => self.state.set_firing(false),
                _ => {}
            }
            info!("dispatch: {:?} -> {}", action, token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_audio::AudioConfig;
    use sentry_proto::telemetry::TelemetryFrame;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn rig() -> (CommandDispatcher, Arc<TurretState>, tokio::io::DuplexStream) {
        let (link, hw) = SerialLink::in_memory();
        let state = Arc::new(TurretState::default());
        let cues = Arc::new(CueManager::new(AudioConfig {
            player: "/nonexistent/player".into(),
            ..AudioConfig::default()
        }));
        let dispatcher = CommandDispatcher::new(state.clone(), Arc::new(link), cues);
        (dispatcher, state, hw)
    }

    async fn read_wire(hw: &mut tokio::io::DuplexStream) -> String {
        let mut buf = [0u8; 64];
        let n = hw.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    async fn assert_wire_silent(hw: &mut tokio::io::DuplexStream) {
        let mut buf = [0u8; 64];
        let res = tokio::time::timeout(Duration::from_millis(50), hw.read(&mut buf)).await;
        assert!(res.is_err(), "expected no serial traffic, got {:?}", res);
    }

    #[tokio::test]
    async fn fire_start_writes_token_and_sets_firing() {
        let (dispatcher, state, mut hw) = rig();
        dispatcher.handle(ActionCommand::FireStart).await.unwrap();
        assert_eq!(read_wire(&mut hw).await, "F:1\n");
        assert!(state.firing());

        dispatcher.handle(ActionCommand::FireStop).await.unwrap();
        assert_eq!(read_wire(&mut hw).await, "F:0\n");
        assert!(!state.firing());
    }

    #[tokio::test]
    async fn movement_does_not_touch_firing() {
        let (dispatcher, state, mut hw) = rig();
        dispatcher.handle(ActionCommand::PanLeft).await.unwrap();
        assert_eq!(read_wire(&mut hw).await, "P:L\n");
        dispatcher.handle(ActionCommand::TiltUp).await.unwrap();
        assert_eq!(read_wire(&mut hw).await, "T:U\n");
        assert!(!state.firing());
    }

    #[tokio::test]
    async fn sabotage_vetoes_everything() {
        let (dispatcher, state, mut hw) = rig();
        state.apply_frame(&TelemetryFrame { gearbox_voltage: 3.3, ammo_ok: true, sabotaged: true });

        for action in [
            ActionCommand::FireStart,
            ActionCommand::PanRight,
            ActionCommand::TiltDown,
            ActionCommand::Taunt,
        ] {
            let err = dispatcher.handle(action).await.unwrap_err();
            assert!(matches!(err, DispatchError::Sabotaged));
        }
        assert!(!state.firing());
        assert_wire_silent(&mut hw).await;

        // a clearing frame lifts the veto
        state.apply_frame(&TelemetryFrame { gearbox_voltage: 3.3, ammo_ok: true, sabotaged: false });
        dispatcher.handle(ActionCommand::PanStop).await.unwrap();
        assert_eq!(read_wire(&mut hw).await, "P:S\n");
    }

    #[tokio::test]
    async fn unknown_action_is_rejected_without_hardware_access() {
        let (dispatcher, state, mut hw) = rig();
        let err = dispatcher.handle(ActionCommand::Unknown).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction));
        assert!(!state.firing());
        assert_wire_silent(&mut hw).await;
    }

    #[tokio::test]
    async fn taunt_skips_the_wire() {
        let (dispatcher, _state, mut hw) = rig();
        dispatcher.handle(ActionCommand::Taunt).await.unwrap();
        assert_wire_silent(&mut hw).await;
    }

    #[tokio::test]
    async fn dead_link_surfaces_to_the_caller() {
        let state = Arc::new(TurretState::default());
        let cues = Arc::new(CueManager::new(AudioConfig {
            player: "/nonexistent/player".into(),
            ..AudioConfig::default()
        }));
        let dispatcher =
            CommandDispatcher::new(state.clone(), Arc::new(SerialLink::disabled()), cues);
        let err = dispatcher.handle(ActionCommand::PanLeft).await.unwrap_err();
        assert!(matches!(err, DispatchError::Link(LinkError::Unavailable)));
    }
}
