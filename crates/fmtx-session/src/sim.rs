use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::BoxFuture;

use crate::connection::ServiceLauncher;
use crate::service::{
    CallbackSender, ServiceError, ServiceHandle, ServiceResult, TransmitterService,
};

#[derive(Debug)]
struct SimInner {
    connected: bool,
    on: bool,
    tuned_khz: u32,
    headset_plugged: bool,
    call_active: bool,
    antenna_available: bool,
    searching: bool,
    /// When set, scans stay in flight until `complete_search` is called
    /// instead of finishing inside `search_weak_stations`.
    manual_search: bool,
    /// When set, power transitions are accepted but never complete: no
    /// state change and no completion callback.
    manual_power: bool,
    fail_cancel: bool,
    scan_results: Vec<u32>,
    radio_text: String,
    station_id: String,
    callbacks: Option<CallbackSender>,
    enable_calls: usize,
    disable_calls: usize,
    tune_calls: usize,
    search_calls: usize,
    cancel_calls: usize,
    restart_calls: usize,
    reconfigure_calls: usize,
}

impl Default for SimInner {
    fn default() -> Self {
        Self {
            connected: true,
            on: false,
            tuned_khz: 0,
            headset_plugged: false,
            call_active: false,
            antenna_available: true,
            searching: false,
            manual_search: false,
            manual_power: false,
            fail_cancel: false,
            scan_results: Vec::new(),
            radio_text: String::new(),
            station_id: String::new(),
            callbacks: None,
            enable_calls: 0,
            disable_calls: 0,
            tune_calls: 0,
            search_calls: 0,
            cancel_calls: 0,
            restart_calls: 0,
            reconfigure_calls: 0,
        }
    }
}

/// In-process stand-in for the transmitter hardware service.
///
/// Power and scan completions are reported through the registered callback
/// channel just like the real service would, which lets the session loop be
/// exercised end to end.  Test hooks flip hardware conditions (headset,
/// call, disconnect) between calls.
#[derive(Debug, Default)]
pub struct SimTransmitter {
    inner: Mutex<SimInner>,
}

impl SimTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn checked(&self) -> ServiceResult<MutexGuard<'_, SimInner>> {
        let inner = self.lock();
        if !inner.connected {
            return Err(ServiceError::ConnectionLost);
        }
        Ok(inner)
    }

    /// Sever the connection; every subsequent call fails with
    /// `ConnectionLost`.
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    /// Restore a severed connection so a fresh connect attempt can succeed.
    pub fn reconnect(&self) {
        self.lock().connected = true;
    }

    pub fn set_headset_plugged(&self, plugged: bool) {
        self.lock().headset_plugged = plugged;
    }

    pub fn set_call_active(&self, active: bool) {
        self.lock().call_active = active;
    }

    pub fn set_antenna_available(&self, available: bool) {
        self.lock().antenna_available = available;
    }

    pub fn set_manual_search(&self, manual: bool) {
        self.lock().manual_search = manual;
    }

    pub fn set_manual_power(&self, manual: bool) {
        self.lock().manual_power = manual;
    }

    pub fn set_fail_cancel(&self, fail: bool) {
        self.lock().fail_cancel = fail;
    }

    pub fn set_scan_results(&self, results: Vec<u32>) {
        self.lock().scan_results = results;
    }

    pub fn set_radio_text(&self, text: &str) {
        self.lock().radio_text = text.to_string();
    }

    pub fn is_on_now(&self) -> bool {
        self.lock().on
    }

    pub fn tuned_now(&self) -> u32 {
        self.lock().tuned_khz
    }

    pub fn is_searching_now(&self) -> bool {
        self.lock().searching
    }

    pub fn enable_calls(&self) -> usize {
        self.lock().enable_calls
    }

    pub fn disable_calls(&self) -> usize {
        self.lock().disable_calls
    }

    pub fn tune_calls(&self) -> usize {
        self.lock().tune_calls
    }

    pub fn search_calls(&self) -> usize {
        self.lock().search_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }

    pub fn restart_calls(&self) -> usize {
        self.lock().restart_calls
    }

    pub fn reconfigure_calls(&self) -> usize {
        self.lock().reconfigure_calls
    }

    fn callbacks(&self) -> Option<CallbackSender> {
        self.lock().callbacks.clone()
    }

    /// Finish a manual-mode scan and report it through the callback channel.
    pub fn complete_search(&self, ok: bool) {
        self.lock().searching = false;
        if let Some(cb) = self.callbacks() {
            cb.on_search_list_complete(ok);
        }
    }

    /// Push an unsolicited tune confirmation, as the hardware does after a
    /// retune it initiated itself.
    pub fn emit_tune_status(&self, khz: u32) {
        self.lock().tuned_khz = khz;
        if let Some(cb) = self.callbacks() {
            cb.on_tune_status_changed(khz);
        }
    }

    pub fn emit_meta_data(&self, text: &str) {
        if let Some(cb) = self.callbacks() {
            cb.on_meta_data_changed(text.to_string());
        }
    }

    pub fn emit_station_id(&self, text: &str) {
        self.lock().station_id = text.to_string();
        if let Some(cb) = self.callbacks() {
            cb.on_station_id_changed(text.to_string());
        }
    }

    pub fn emit_radio_reset(&self) {
        self.lock().on = false;
        if let Some(cb) = self.callbacks() {
            cb.on_radio_reset();
        }
    }
}

impl TransmitterService for SimTransmitter {
    fn enable(&self) -> ServiceResult<bool> {
        let cb = {
            let mut inner = self.checked()?;
            inner.enable_calls += 1;
            if inner.manual_power {
                return Ok(true);
            }
            inner.on = true;
            inner.callbacks.clone()
        };
        if let Some(cb) = cb {
            cb.on_enabled(true);
        }
        Ok(true)
    }

    fn disable(&self) -> ServiceResult<bool> {
        let cb = {
            let mut inner = self.checked()?;
            inner.disable_calls += 1;
            if inner.manual_power {
                return Ok(true);
            }
            inner.on = false;
            inner.searching = false;
            inner.callbacks.clone()
        };
        if let Some(cb) = cb {
            cb.on_disabled();
        }
        Ok(true)
    }

    fn tune(&self, khz: u32) -> ServiceResult<()> {
        let mut inner = self.checked()?;
        inner.tune_calls += 1;
        inner.tuned_khz = khz;
        Ok(())
    }

    fn search_weak_stations(&self, _max_stations: usize) -> ServiceResult<bool> {
        let cb = {
            let mut inner = self.checked()?;
            inner.search_calls += 1;
            if inner.searching {
                return Ok(false);
            }
            inner.searching = true;
            if inner.manual_search {
                return Ok(true);
            }
            inner.searching = false;
            inner.callbacks.clone()
        };
        if let Some(cb) = cb {
            cb.on_search_list_complete(true);
        }
        Ok(true)
    }

    fn cancel_search(&self) -> ServiceResult<bool> {
        let mut inner = self.checked()?;
        inner.cancel_calls += 1;
        if inner.fail_cancel {
            return Err(ServiceError::Remote("cancel refused".to_string()));
        }
        inner.searching = false;
        Ok(true)
    }

    fn search_results(&self) -> ServiceResult<Vec<u32>> {
        Ok(self.checked()?.scan_results.clone())
    }

    fn restart(&self) -> ServiceResult<()> {
        self.checked()?.restart_calls += 1;
        Ok(())
    }

    fn reconfigure(&self) -> ServiceResult<()> {
        let cb = {
            let mut inner = self.checked()?;
            inner.reconfigure_calls += 1;
            inner.callbacks.clone()
        };
        if let Some(cb) = cb {
            cb.on_reconfigured();
        }
        Ok(())
    }

    fn radio_text(&self) -> ServiceResult<String> {
        Ok(self.checked()?.radio_text.clone())
    }

    fn station_id(&self) -> ServiceResult<String> {
        Ok(self.checked()?.station_id.clone())
    }

    fn is_on(&self) -> ServiceResult<bool> {
        Ok(self.checked()?.on)
    }

    fn is_headset_plugged(&self) -> ServiceResult<bool> {
        Ok(self.checked()?.headset_plugged)
    }

    fn is_call_active(&self) -> ServiceResult<bool> {
        Ok(self.checked()?.call_active)
    }

    fn is_internal_antenna_available(&self) -> ServiceResult<bool> {
        Ok(self.checked()?.antenna_available)
    }

    fn register_callbacks(&self, callbacks: CallbackSender) -> ServiceResult<()> {
        self.checked()?.callbacks = Some(callbacks);
        Ok(())
    }
}

/// Launcher that hands out handles to a shared [`SimTransmitter`].
pub struct SimLauncher {
    service: Arc<SimTransmitter>,
    accept_bind: bool,
    fail_connect: bool,
}

impl SimLauncher {
    pub fn new(service: Arc<SimTransmitter>) -> Self {
        Self {
            service,
            accept_bind: true,
            fail_connect: false,
        }
    }

    /// Refuse bind requests, as the platform does when the service is
    /// unavailable.
    pub fn reject_bind(mut self) -> Self {
        self.accept_bind = false;
        self
    }

    /// Accept binds but fail every connect attempt.
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }
}

impl ServiceLauncher for SimLauncher {
    fn request_bind(&self) -> bool {
        self.accept_bind
    }

    fn connect(&self) -> BoxFuture<'static, anyhow::Result<ServiceHandle>> {
        let fail = self.fail_connect;
        let service = self.service.clone();
        Box::pin(async move {
            if fail {
                anyhow::bail!("transmitter service did not answer");
            }
            Ok(ServiceHandle::new(service))
        })
    }
}
