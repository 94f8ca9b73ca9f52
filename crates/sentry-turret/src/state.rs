use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use sentry_proto::api::StatusReport;
use sentry_proto::telemetry::TelemetryFrame;

/// Authoritative safety/telemetry record for the turret process.
///
/// Telemetry fields (voltage, ammo, sabotage) are written only by the
/// poller; `firing` only by the dispatcher. Everyone reads. The dispatcher's
/// interlock check is a single atomic load, which may lag the hardware by up
/// to one poll cycle.
#[derive(Debug)]
pub struct TurretState {
    voltage: Mutex<f32>,
    ammo_ok: AtomicBool,
    sabotaged: AtomicBool,
    firing: AtomicBool,
}

impl Default for TurretState {
    fn default() -> Self {
        Self {
            voltage: Mutex::new(0.0),
            ammo_ok: AtomicBool::new(true),
            sabotaged: AtomicBool::new(false),
            firing: AtomicBool::new(false),
        }
    }
}

impl TurretState {
    /// Overwrites the poller-owned fields from a freshly parsed frame.
    pub fn apply_frame(&self, frame: &TelemetryFrame) {
        *self.voltage.lock().unwrap() = frame.gearbox_voltage;
        self.ammo_ok.store(frame.ammo_ok, Ordering::Relaxed);
        self.sabotaged.store(frame.sabotaged, Ordering::Relaxed);
    }

    pub fn sabotaged(&self) -> bool {
        self.sabotaged.load(Ordering::Relaxed)
    }

    pub fn firing(&self) -> bool {
        self.firing.load(Ordering::Relaxed)
    }

    pub fn set_firing(&self, firing: bool) {
        self.firing.store(firing, Ordering::Relaxed);
    }

    pub fn report(&self) -> StatusReport {
        let ammo_status = if self.ammo_ok.load(Ordering::Relaxed) { "OK" } else { "AMMO_LOW" };
        StatusReport {
            voltage: *self.voltage.lock().unwrap(),
            ammo_status: ammo_status.into(),
            sabotaged: self.sabotaged(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_overwrites_telemetry_but_not_firing() {
        let state = TurretState::default();
        state.set_firing(true);

        state.apply_frame(&TelemetryFrame { gearbox_voltage: 3.3, ammo_ok: false, sabotaged: true });
        let rep = state.report();
        assert_eq!(rep.voltage, 3.3);
        assert_eq!(rep.ammo_status, "AMMO_LOW");
        assert!(rep.sabotaged);
        assert!(state.firing());
    }

    #[test]
    fn default_report_is_clean() {
        let rep = TurretState::default().report();
        assert_eq!(rep.voltage, 0.0);
        assert_eq!(rep.ammo_status, "OK");
        assert!(!rep.sabotaged);
    }
}
