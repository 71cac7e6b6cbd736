use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::events::{ServiceCallback, SessionEvent};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service process went away; the handle is dead and a new connection
    /// must be established before further calls.
    #[error("transmitter service connection lost")]
    ConnectionLost,
    #[error("transmitter service error: {0}")]
    Remote(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Control surface of the FM transmitter hardware service.
///
/// Calls are synchronous request/response; completion of long operations
/// (power transitions, scans, tune confirmations) is reported later through
/// the registered [`CallbackSender`].  Implementations must be callable from
/// any thread.
pub trait TransmitterService: Send + Sync {
    /// Begin powering the transmitter on.  `Ok(true)` means the transition
    /// was accepted; `on_enabled` follows when it completes.
    fn enable(&self) -> ServiceResult<bool>;

    /// Begin powering the transmitter off.  `on_disabled` follows.
    fn disable(&self) -> ServiceResult<bool>;

    /// Request a tune.  Confirmation arrives via `on_tune_status_changed`.
    fn tune(&self, khz: u32) -> ServiceResult<()>;

    /// Start a scan for up to `max_stations` weak (unoccupied) frequencies.
    /// `Ok(true)` means the scan was accepted; `on_search_list_complete`
    /// follows when it finishes or is cancelled.
    fn search_weak_stations(&self, max_stations: usize) -> ServiceResult<bool>;

    /// Abort an in-flight scan.
    fn cancel_search(&self) -> ServiceResult<bool>;

    /// Frequencies found by the last completed scan, in kHz.  Entries may be
    /// zero when fewer stations were found than requested.
    fn search_results(&self) -> ServiceResult<Vec<u32>>;

    /// Restart transmission after a scan without a full power cycle.
    fn restart(&self) -> ServiceResult<()>;

    /// Apply a changed band configuration.  `on_reconfigured` follows, after
    /// which stored presets are no longer meaningful.
    fn reconfigure(&self) -> ServiceResult<()>;

    fn radio_text(&self) -> ServiceResult<String>;

    fn station_id(&self) -> ServiceResult<String>;

    fn is_on(&self) -> ServiceResult<bool>;

    fn is_headset_plugged(&self) -> ServiceResult<bool>;

    fn is_call_active(&self) -> ServiceResult<bool>;

    fn is_internal_antenna_available(&self) -> ServiceResult<bool>;

    /// Register the callback channel.  Registration does not survive a
    /// reconnect and must be repeated on every new connection.
    fn register_callbacks(&self, callbacks: CallbackSender) -> ServiceResult<()>;
}

/// Shared, cloneable handle to a live service connection.
#[derive(Clone)]
pub struct ServiceHandle(Arc<dyn TransmitterService>);

impl ServiceHandle {
    pub fn new(service: Arc<dyn TransmitterService>) -> Self {
        Self(service)
    }
}

impl Deref for ServiceHandle {
    type Target = dyn TransmitterService;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceHandle")
    }
}

/// Posts hardware callbacks onto the session event queue.
///
/// The service may invoke these from any thread; each method is a plain
/// non-blocking channel send, so none of them can deadlock against the
/// session loop.  Sends after session shutdown are silently dropped.
#[derive(Debug, Clone)]
pub struct CallbackSender {
    tx: UnboundedSender<SessionEvent>,
}

impl CallbackSender {
    pub fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    fn post(&self, callback: ServiceCallback) {
        if self.tx.send(SessionEvent::Callback(callback)).is_err() {
            debug!("callback dropped: session event queue closed");
        }
    }

    pub fn on_enabled(&self, success: bool) {
        self.post(ServiceCallback::Enabled(success));
    }

    pub fn on_disabled(&self) {
        self.post(ServiceCallback::Disabled);
    }

    pub fn on_tune_status_changed(&self, khz: u32) {
        self.post(ServiceCallback::TuneStatusChanged(khz));
    }

    pub fn on_search_list_complete(&self, success: bool) {
        self.post(ServiceCallback::SearchListComplete(success));
    }

    pub fn on_reconfigured(&self) {
        self.post(ServiceCallback::Reconfigured);
    }

    pub fn on_radio_reset(&self) {
        self.post(ServiceCallback::RadioReset);
    }

    pub fn on_meta_data_changed(&self, text: String) {
        self.post(ServiceCallback::MetaDataChanged(text));
    }

    pub fn on_station_id_changed(&self, text: String) {
        self.post(ServiceCallback::StationIdChanged(text));
    }
}
