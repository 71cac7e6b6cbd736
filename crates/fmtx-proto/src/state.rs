use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::presets::MAX_PRESETS;

/// Power state of the transmitter session.  Owned exclusively by the session
/// controller; everything else only reads it through `SessionSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    #[default]
    Off,
    Enabling,
    On,
    Disabling,
}

impl SessionState {
    /// True while a power transition is in flight.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, SessionState::Enabling | SessionState::Disabling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
}

/// A hardware condition that blocks powering on.  Not an error; surfaced to
/// the UI as an explanatory message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    HeadsetPlugged,
    CallActive,
}

impl BlockReason {
    pub fn user_message(&self) -> &'static str {
        match self {
            BlockReason::HeadsetPlugged => {
                "Headset plugged in, FM transmission is unavailable"
            }
            BlockReason::CallActive => "Call in progress, FM transmission is unavailable",
        }
    }
}

/// Read-only view of the session published to UI clients.  `rev` is a
/// monotonically increasing counter incremented on every change; clients can
/// use it to detect missed updates and request a resync.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub rev: u64,
    pub power: SessionState,
    pub search: SearchState,
    /// Currently tuned frequency in kHz.
    pub tuned_khz: u32,
    /// Preset slots; always `MAX_PRESETS` entries, 0 = empty.
    pub presets: Vec<u32>,
    /// Full radio text / metadata line.
    pub radio_text: String,
    /// What the scroller currently displays (a suffix of `radio_text`).
    pub scroll_text: String,
    pub station_id: Option<String>,
    pub blocked: Option<BlockReason>,
    /// Whether the UI should accept power/tune input right now.
    pub controls_enabled: bool,
    pub antenna_available: bool,
    pub connected: bool,
}

impl SessionSnapshot {
    pub fn new(tuned_khz: u32, presets: [u32; MAX_PRESETS]) -> Self {
        Self {
            rev: 1,
            tuned_khz,
            presets: presets.to_vec(),
            ..Self::default()
        }
    }
}

/// Shared holder for the snapshot.  The session controller is the single
/// writer; the socket server and tests read concurrently.
pub struct SessionStateManager {
    state: Arc<RwLock<SessionSnapshot>>,
}

impl SessionStateManager {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.clone()
    }

    /// Apply a mutation and bump the revision counter.
    pub async fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        let mut state = self.state.write().await;
        f(&mut state);
        state.rev += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_bumps_rev() {
        let manager = SessionStateManager::new(SessionSnapshot::new(98_100, [0; MAX_PRESETS]));
        let before = manager.snapshot().await.rev;
        manager
            .update(|s| {
                s.power = SessionState::Enabling;
                s.controls_enabled = false;
            })
            .await;
        let after = manager.snapshot().await;
        assert_eq!(after.rev, before + 1);
        assert_eq!(after.power, SessionState::Enabling);
    }
}
