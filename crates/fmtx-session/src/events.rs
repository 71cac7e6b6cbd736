use fmtx_proto::protocol::Command;

use crate::connection::ConnectionOutcome;
use crate::scroller::ScrollerMsg;
use crate::service::ServiceHandle;

/// A user-facing request, as delivered by the socket server (or tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    PowerOn,
    PowerOff,
    Tune(u32),
    TunePreset(usize),
    StorePreset(usize),
    ClearPreset(usize),
    StepUp,
    StepDown,
    StartScan,
    CancelScan,
    RestoreDefaults,
}

/// Maps a wire command to a session intent.  `GetState` is answered inline
/// by the socket server and never reaches the session loop.
pub fn intent_for(cmd: &Command) -> Option<SessionIntent> {
    match cmd {
        Command::PowerOn => Some(SessionIntent::PowerOn),
        Command::PowerOff => Some(SessionIntent::PowerOff),
        Command::Tune { khz } => Some(SessionIntent::Tune(*khz)),
        Command::TunePreset { index } => Some(SessionIntent::TunePreset(*index)),
        Command::StorePreset { index } => Some(SessionIntent::StorePreset(*index)),
        Command::ClearPreset { index } => Some(SessionIntent::ClearPreset(*index)),
        Command::StepUp => Some(SessionIntent::StepUp),
        Command::StepDown => Some(SessionIntent::StepDown),
        Command::StartScan => Some(SessionIntent::StartScan),
        Command::CancelScan => Some(SessionIntent::CancelScan),
        Command::RestoreDefaults => Some(SessionIntent::RestoreDefaults),
        Command::GetState => None,
    }
}

/// Asynchronous completion notification from the hardware service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCallback {
    Enabled(bool),
    Disabled,
    TuneStatusChanged(u32),
    SearchListComplete(bool),
    /// The hardware was reconfigured (e.g. a regional band change); stored
    /// presets are no longer meaningful.
    Reconfigured,
    /// The hardware reset itself; the transmitter is off.
    RadioReset,
    MetaDataChanged(String),
    StationIdChanged(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRequest {
    Enable,
    Disable,
}

/// Display / proximity input feeding the hand-wave wake gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DozeEvent {
    DisplayOn,
    DisplayOff,
    ProximityNear,
}

/// Everything the session loop reacts to, funnelled through one queue so the
/// controller never needs internal locking.
#[derive(Debug)]
pub enum SessionEvent {
    Intent(SessionIntent),
    Callback(ServiceCallback),
    /// Internal: the connector's spawned connect attempt finished.
    ConnectFinished(Result<ServiceHandle, String>),
    /// Connection lifecycle notification fanned out by the connector.
    Connection(ConnectionOutcome),
    /// A debounced power task fired.  `gen` identifies the scheduling
    /// generation; stale generations are discarded.
    PowerFired { request: PowerRequest, gen: u64 },
    /// The scan watchdog fired.
    SearchTimeout { gen: u64 },
    /// A radio-text scroller timer fired.
    Scroller { msg: ScrollerMsg, gen: u64 },
    /// Display or proximity sensor input for the wake gesture.
    Doze(DozeEvent),
    /// Flush persistent state and stop UI timers; the session stays alive.
    Suspend,
    Shutdown,
}

/// Out-of-band notifications broadcast to every connected UI client.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    /// The snapshot changed; clients should re-read it.
    StateUpdated,
    /// A hand wave was recognised; the ambient display should pulse.
    WakePulse,
    Log(String),
    /// The hardware service is unreachable and the session cannot start.
    Degraded(String),
}
