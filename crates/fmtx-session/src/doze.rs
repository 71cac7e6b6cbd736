use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum time the display must have been off before a hand wave can pulse
/// the ambient display.  Suppresses the wave the user makes while putting
/// the device down.
pub const SCREEN_OFF_WAKE_COOLDOWN: Duration = Duration::from_millis(2500);

/// Hand-wave wake gesture: pulses the ambient display when the proximity
/// sensor reports a near event while the screen has been off for longer
/// than the cooldown.
///
/// Pure decision logic; the caller wires up the real sensor and display
/// notifications and fires the pulse when
/// [`on_proximity_near`](Self::on_proximity_near) says so.
#[derive(Debug)]
pub struct DozeWakeController {
    handwave_enabled: bool,
    interactive: bool,
    last_display_off: Option<Instant>,
}

impl DozeWakeController {
    pub fn new(handwave_enabled: bool) -> Self {
        Self {
            handwave_enabled,
            interactive: true,
            last_display_off: None,
        }
    }

    pub fn set_handwave_enabled(&mut self, enabled: bool) {
        self.handwave_enabled = enabled;
    }

    /// Whether the proximity sensor should be listening at all: only while
    /// the gesture is enabled and the device is non-interactive.
    pub fn sensor_active(&self) -> bool {
        self.handwave_enabled && !self.interactive
    }

    pub fn on_display_on(&mut self) {
        self.interactive = true;
    }

    pub fn on_display_off(&mut self, now: Instant) {
        self.interactive = false;
        self.last_display_off = Some(now);
    }

    /// A proximity-near event arrived.  Returns `true` when a doze pulse
    /// should be broadcast.
    pub fn on_proximity_near(&mut self, now: Instant) -> bool {
        if !self.sensor_active() {
            return false;
        }
        let Some(off_since) = self.last_display_off else {
            return false;
        };
        if now.duration_since(off_since) <= SCREEN_OFF_WAKE_COOLDOWN {
            debug!("hand wave within screen-off cooldown, ignoring");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_after_cooldown_pulses() {
        let mut doze = DozeWakeController::new(true);
        let t0 = Instant::now();
        doze.on_display_off(t0);
        assert!(doze.sensor_active());
        assert!(doze.on_proximity_near(t0 + SCREEN_OFF_WAKE_COOLDOWN + Duration::from_millis(1)));
    }

    #[test]
    fn test_wave_within_cooldown_is_ignored() {
        let mut doze = DozeWakeController::new(true);
        let t0 = Instant::now();
        doze.on_display_off(t0);
        assert!(!doze.on_proximity_near(t0 + Duration::from_millis(1000)));
        assert!(!doze.on_proximity_near(t0 + SCREEN_OFF_WAKE_COOLDOWN));
    }

    #[test]
    fn test_interactive_or_disabled_never_pulses() {
        let t0 = Instant::now();
        let late = t0 + Duration::from_secs(60);

        let mut doze = DozeWakeController::new(true);
        doze.on_display_off(t0);
        doze.on_display_on();
        assert!(!doze.sensor_active());
        assert!(!doze.on_proximity_near(late));

        let mut doze = DozeWakeController::new(false);
        doze.on_display_off(t0);
        assert!(!doze.sensor_active());
        assert!(!doze.on_proximity_near(late));
    }
}
