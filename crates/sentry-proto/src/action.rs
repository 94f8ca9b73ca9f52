/// Keep-alive token written to the actuator every poll cycle (unless the
/// sabotage interlock has silenced the link).
pub const KEEP_ALIVE: &str = "K:0";

/// Discrete open-loop action requested over the HTTP boundary.
///
/// `Unknown` absorbs any unrecognized request string; it never reaches the
/// hardware and is always reported back as a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCommand {
    FireStart,
    FireStop,
    PanLeft,
    PanRight,
    PanStop,
    TiltUp,
    TiltDown,
    TiltStop,
    Taunt,
    Unknown,
}

impl ActionCommand {
    pub fn parse(s: &str) -> Self {
        match s {
            "FIRE_START" => Self::FireStart,
            "FIRE_STOP" => Self::FireStop,
            "PAN_LEFT" => Self::PanLeft,
            "PAN_RIGHT" => Self::PanRight,
            "PAN_STOP" => Self::PanStop,
            "TILT_UP" => Self::TiltUp,
            "TILT_DOWN" => Self::TiltDown,
            "TILT_STOP" => Self::TiltStop,
            "TAUNT" => Self::Taunt,
            _ => Self::Unknown,
        }
    }

    /// Serial token for actions that drive the actuator. `Taunt` is
    /// audio-only and `Unknown` never touches the wire.
    pub fn serial_token(self) -> Option<&'static str> {
        match self {
            Self::FireStart => Some("F:1"),
            Self::FireStop => Some("F:0"),
            Self::PanLeft => Some("P:L"),
            Self::PanRight => Some("P:R"),
            Self::PanStop => Some("P:S"),
            Self::TiltUp => Some("T:U"),
            Self::TiltDown => Some("T:D"),
            Self::TiltStop => Some("T:S"),
            Self::Taunt | Self::Unknown => None,
        }
    }
}
