use std::sync::Arc;
use std::time::Duration;

use fmtx_proto::config::Config;
use fmtx_proto::prefs::PrefStore;
use fmtx_proto::presets::{PresetStore, EMPTY_SLOT, MAX_PRESETS};
use fmtx_proto::state::{BlockReason, SearchState, SessionSnapshot, SessionState, SessionStateManager};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionOutcome, OwnerId, ServiceConnector, ServiceLauncher};
use crate::doze::DozeWakeController;
use crate::events::{
    DozeEvent, PowerRequest, ServiceCallback, SessionEvent, SessionIntent, SessionMessage,
};
use crate::scroller::{RadioTextScroller, ScrollerArm, ScrollerMsg};
use crate::search::{SearchWorkflow, SEARCH_TIMEOUT};
use crate::service::{CallbackSender, ServiceError, ServiceHandle, TransmitterService};

/// Delay before a debounced power request is dispatched.  Zero: coalescing
/// comes from the queue hop, not from waiting.
pub const POWER_DISPATCH_DELAY: Duration = Duration::ZERO;
/// Re-queue delay for a power request that arrived mid-transition.
pub const POWER_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Placeholder appended to the radio text while no metadata has arrived.
const METADATA_PENDING: &str = "...";

/// Coalesces rapid power toggles: only the most recently scheduled request
/// survives, everything earlier is either aborted or rejected as stale when
/// it fires.
#[derive(Debug, Default)]
struct PowerDebouncer {
    gen: u64,
    pending: Option<AbortHandle>,
}

impl PowerDebouncer {
    /// Cancel whatever is pending and claim the next generation.
    fn schedule(&mut self) -> u64 {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.gen += 1;
        self.gen
    }

    fn arm(&mut self, abort: AbortHandle) {
        self.pending = Some(abort);
    }

    /// True when a fired task carries the latest generation.
    fn accept(&mut self, gen: u64) -> bool {
        if gen != self.gen {
            return false;
        }
        self.pending = None;
        true
    }
}

/// Owns the transmitter session: power state machine, presets, scan
/// workflow, radio-text scroller and the service connection.
///
/// Single-threaded by construction; every input (user intents, hardware
/// callbacks, timer expirations, connection outcomes) arrives through one
/// event queue and is handled in order, so no internal locking is needed.
/// State changes are published through the shared [`SessionStateManager`]
/// and announced on the broadcast channel.
pub struct SessionController {
    config: Config,
    presets: PresetStore,
    states: Arc<SessionStateManager>,
    connector: ServiceConnector,
    owner: OwnerId,
    service: Option<ServiceHandle>,
    power: SessionState,
    /// Power state carried over from a previous UI incarnation.  `None` on a
    /// cold start, which auto-enables once the service connects.
    resumed_power: Option<bool>,
    debouncer: PowerDebouncer,
    search: SearchWorkflow,
    scroller: RadioTextScroller,
    scroller_task: Option<AbortHandle>,
    doze: DozeWakeController,
    radio_text: String,
    meta_data: Option<String>,
    event_tx: UnboundedSender<SessionEvent>,
    broadcast_tx: broadcast::Sender<SessionMessage>,
}

impl SessionController {
    pub fn new(
        config: Config,
        launcher: Arc<dyn ServiceLauncher>,
        broadcast_tx: broadcast::Sender<SessionMessage>,
        event_tx: UnboundedSender<SessionEvent>,
        resumed_power: Option<bool>,
    ) -> Self {
        let prefs = PrefStore::load(config.session.prefs_file.clone());
        let presets = PresetStore::load(prefs, config.band.clone());
        let states = Arc::new(SessionStateManager::new(SessionSnapshot::new(
            presets.tuned(),
            *presets.slots(),
        )));
        let connector = ServiceConnector::new(launcher, event_tx.clone());
        let doze = DozeWakeController::new(config.doze.handwave_gesture);
        Self {
            config,
            presets,
            states,
            connector,
            owner: OwnerId::new(),
            service: None,
            power: SessionState::Off,
            resumed_power,
            debouncer: PowerDebouncer::default(),
            search: SearchWorkflow::new(),
            scroller: RadioTextScroller::new(),
            scroller_task: None,
            doze,
            radio_text: String::new(),
            meta_data: None,
            event_tx,
            broadcast_tx,
        }
    }

    pub fn states(&self) -> Arc<SessionStateManager> {
        self.states.clone()
    }

    /// Run the session until the event queue closes or a `Shutdown` arrives.
    pub async fn run(mut self, mut event_rx: UnboundedReceiver<SessionEvent>) -> anyhow::Result<()> {
        info!("session starting");
        if !self.connector.bind(self.owner, self.event_tx.clone()) {
            if self.resumed_power.is_none() {
                self.degrade("transmitter service refused the bind request")
                    .await;
                return Ok(());
            }
            // A previous session existed; stay up so the UI can show the
            // last known state and the user can retry.
            warn!("bind rejected, continuing with last known state");
            self.publish(|s| s.controls_enabled = true).await;
        }
        while let Some(event) = event_rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        info!("session shutting down");
        self.suspend().await;
        self.connector.unbind(self.owner);
        Ok(())
    }

    /// Returns `false` when the loop should exit.
    async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Intent(intent) => self.handle_intent(intent).await,
            SessionEvent::Callback(callback) => self.handle_callback(callback).await,
            SessionEvent::ConnectFinished(result) => self.connector.complete(result),
            SessionEvent::Connection(outcome) => return self.handle_connection(outcome).await,
            SessionEvent::PowerFired { request, gen } => {
                self.handle_power_fired(request, gen).await
            }
            SessionEvent::SearchTimeout { gen } => {
                if self.search.watchdog_is_current(gen) {
                    warn!("weak-station scan timed out, forcing cancel");
                    self.cancel_search().await;
                }
            }
            SessionEvent::Scroller { msg, gen } => self.handle_scroller(msg, gen).await,
            SessionEvent::Doze(event) => self.handle_doze(event),
            SessionEvent::Suspend => self.suspend().await,
            SessionEvent::Shutdown => return false,
        }
        true
    }

    async fn handle_connection(&mut self, outcome: ConnectionOutcome) -> bool {
        match outcome {
            ConnectionOutcome::Connected(handle) => {
                // Callback registration does not survive a reconnect.
                if let Err(e) = handle.register_callbacks(CallbackSender::new(self.event_tx.clone()))
                {
                    warn!("failed to register service callbacks: {}", e);
                }
                self.service = Some(handle);
                self.publish(|s| s.connected = true).await;
                match self.call(|svc| svc.is_headset_plugged()).await {
                    Some(true) => {
                        self.publish(|s| {
                            s.blocked = Some(BlockReason::HeadsetPlugged);
                            s.controls_enabled = true;
                        })
                        .await;
                    }
                    Some(false) => match self.resumed_power {
                        // Cold start: power on as soon as we are connected.
                        None => self.schedule_power(PowerRequest::Enable, POWER_DISPATCH_DELAY),
                        // Resume: trust the hardware, not the remembered flag.
                        Some(_) => self.radio_state_updated().await,
                    },
                    None => {}
                }
                true
            }
            ConnectionOutcome::Failed => {
                if self.resumed_power.is_none() {
                    self.degrade("could not connect to the transmitter service")
                        .await;
                    return false;
                }
                self.publish(|s| {
                    s.connected = false;
                    s.controls_enabled = true;
                })
                .await;
                true
            }
            ConnectionOutcome::Lost => {
                self.service_lost().await;
                true
            }
        }
    }

    async fn handle_intent(&mut self, intent: SessionIntent) {
        debug!("intent: {:?}", intent);
        match intent {
            SessionIntent::PowerOn => self.schedule_power(PowerRequest::Enable, POWER_DISPATCH_DELAY),
            SessionIntent::PowerOff => {
                self.schedule_power(PowerRequest::Disable, POWER_DISPATCH_DELAY)
            }
            SessionIntent::Tune(khz) => self.tune(khz).await,
            SessionIntent::TunePreset(index) => match self.presets.get(index) {
                Ok(khz) if khz != EMPTY_SLOT => self.tune(khz).await,
                Ok(_) => debug!("preset {} is empty", index),
                Err(e) => warn!("tune from preset rejected: {}", e),
            },
            SessionIntent::StorePreset(index) => {
                let current = self.presets.tuned();
                match self.presets.replace_with_current(index, current) {
                    Ok(()) => self.publish_presets().await,
                    Err(e) => warn!("store preset rejected: {}", e),
                }
            }
            SessionIntent::ClearPreset(index) => match self.presets.clear(index) {
                Ok(()) => self.publish_presets().await,
                Err(e) => warn!("clear preset rejected: {}", e),
            },
            SessionIntent::StepUp => {
                let khz = self.config.band.step_up(self.presets.tuned());
                self.tune(khz).await;
            }
            SessionIntent::StepDown => {
                let khz = self.config.band.step_down(self.presets.tuned());
                self.tune(khz).await;
            }
            SessionIntent::StartScan => self.start_search().await,
            SessionIntent::CancelScan => self.cancel_search().await,
            SessionIntent::RestoreDefaults => {
                self.presets.restore_defaults();
                let khz = self.presets.tuned();
                self.publish_presets().await;
                self.tune(khz).await;
            }
        }
    }

    async fn handle_callback(&mut self, callback: ServiceCallback) {
        debug!("service callback: {:?}", callback);
        match callback {
            // Both completions re-derive the session state from the
            // hardware instead of trusting which transition was pending.
            ServiceCallback::Enabled(_) | ServiceCallback::Disabled => {
                self.radio_state_updated().await;
            }
            ServiceCallback::TuneStatusChanged(khz) => {
                self.presets.set_tuned(khz);
                let tuned = self.presets.tuned();
                self.publish(move |s| s.tuned_khz = tuned).await;
            }
            ServiceCallback::SearchListComplete(ok) => self.search_list_complete(ok).await,
            ServiceCallback::Reconfigured => {
                info!("hardware reconfigured, restoring default presets");
                self.presets.restore_defaults();
                self.publish_presets().await;
            }
            ServiceCallback::RadioReset => {
                warn!("hardware reset, transmitter is off");
                self.search.finish(false);
                self.power = SessionState::Off;
                self.presets.persist();
                self.stop_scroller().await;
                self.publish(|s| {
                    s.power = SessionState::Off;
                    s.search = SearchState::Idle;
                    s.controls_enabled = true;
                })
                .await;
            }
            ServiceCallback::MetaDataChanged(text) => {
                self.meta_data = Some(text);
                self.update_radio_text().await;
            }
            ServiceCallback::StationIdChanged(text) => {
                self.publish(move |s| s.station_id = Some(text)).await;
                self.update_radio_text().await;
            }
        }
    }

    fn schedule_power(&mut self, request: PowerRequest, delay: Duration) {
        let gen = self.debouncer.schedule();
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(SessionEvent::PowerFired { request, gen });
        });
        self.debouncer.arm(task.abort_handle());
    }

    async fn handle_power_fired(&mut self, request: PowerRequest, gen: u64) {
        if !self.debouncer.accept(gen) {
            debug!("stale power request {:?} superseded", request);
            return;
        }
        if self.power.is_transitioning() {
            // Never interleave with an in-flight transition; try again once
            // it settles.
            debug!("power request {:?} during transition, re-queueing", request);
            self.schedule_power(request, POWER_RETRY_DELAY);
            return;
        }
        match request {
            PowerRequest::Enable => self.execute_enable().await,
            PowerRequest::Disable => self.execute_disable().await,
        }
    }

    async fn execute_enable(&mut self) {
        self.publish(|s| s.controls_enabled = false).await;
        if self.service.is_none() {
            self.connector.ensure_connecting();
            self.publish(|s| s.controls_enabled = true).await;
            return;
        }
        match self.call(|svc| svc.is_headset_plugged()).await {
            Some(false) => {}
            Some(true) => {
                info!("enable blocked: headset plugged");
                self.publish(|s| {
                    s.blocked = Some(BlockReason::HeadsetPlugged);
                    s.controls_enabled = true;
                })
                .await;
                return;
            }
            None => {
                self.publish(|s| s.controls_enabled = true).await;
                return;
            }
        }
        match self.call(|svc| svc.is_call_active()).await {
            Some(false) => {}
            Some(true) => {
                info!("enable blocked: call in progress");
                self.publish(|s| {
                    s.blocked = Some(BlockReason::CallActive);
                    s.controls_enabled = true;
                })
                .await;
                return;
            }
            None => {
                self.publish(|s| s.controls_enabled = true).await;
                return;
            }
        }
        self.publish(|s| s.blocked = None).await;
        match self.call(|svc| svc.enable()).await {
            Some(true) => {
                self.power = SessionState::Enabling;
                self.publish(|s| s.power = SessionState::Enabling).await;
            }
            Some(false) | None => {
                warn!("enable request not accepted");
                self.publish(|s| s.controls_enabled = true).await;
            }
        }
    }

    async fn execute_disable(&mut self) {
        self.publish(|s| s.controls_enabled = false).await;
        // A scan must never outlive the transmitter being switched off.
        self.cancel_search().await;
        if self.service.is_none() {
            self.connector.ensure_connecting();
            self.publish(|s| s.controls_enabled = true).await;
            return;
        }
        match self.call(|svc| svc.disable()).await {
            Some(true) => {
                self.power = SessionState::Disabling;
                self.publish(|s| s.power = SessionState::Disabling).await;
            }
            Some(false) | None => {
                warn!("disable request not accepted");
                self.publish(|s| s.controls_enabled = true).await;
            }
        }
    }

    /// Re-derive the session state from the hardware after a power
    /// transition completed (in either direction).
    async fn radio_state_updated(&mut self) {
        let on = self.call(|svc| svc.is_on()).await.unwrap_or(false);
        let antenna = self
            .call(|svc| svc.is_internal_antenna_available())
            .await
            .unwrap_or(false);
        if on {
            info!("transmitter is on");
            self.power = SessionState::On;
            self.publish(move |s| {
                s.power = SessionState::On;
                s.blocked = None;
                s.controls_enabled = true;
                s.antenna_available = antenna;
            })
            .await;
            let khz = self.presets.tuned();
            self.tune(khz).await;
            self.update_radio_text().await;
        } else {
            info!("transmitter is off");
            self.power = SessionState::Off;
            self.presets.persist();
            self.stop_scroller().await;
            self.publish(move |s| {
                s.power = SessionState::Off;
                s.controls_enabled = true;
                s.antenna_available = antenna;
            })
            .await;
        }
    }

    async fn tune(&mut self, khz: u32) {
        if !self.config.band.contains(khz) {
            warn!("tune rejected: {} kHz outside band", khz);
            return;
        }
        if self.service.is_none() {
            debug!("tune ignored: not connected");
            return;
        }
        match self.call(|svc| svc.tune(khz)).await {
            Some(()) => {
                // Optimistic local echo; the tune-status callback remains
                // authoritative.
                self.presets.set_tuned(khz);
                let tuned = self.presets.tuned();
                self.publish(move |s| s.tuned_khz = tuned).await;
            }
            None => {
                self.publish(|s| s.controls_enabled = true).await;
            }
        }
    }

    async fn start_search(&mut self) {
        let Some(gen) = self.search.begin() else {
            debug!("scan already active, ignoring");
            return;
        };
        let accepted = self
            .call(|svc| svc.search_weak_stations(MAX_PRESETS))
            .await
            .unwrap_or(false);
        if !accepted {
            warn!("weak-station scan not accepted");
            self.search.finish(false);
            self.publish(|s| s.search = SearchState::Idle).await;
            return;
        }
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(SEARCH_TIMEOUT).await;
            let _ = tx.send(SessionEvent::SearchTimeout { gen });
        });
        self.search.arm_watchdog(task.abort_handle());
        self.publish(|s| {
            s.search = SearchState::Searching;
            s.controls_enabled = false;
        })
        .await;
    }

    /// Cancel an in-flight scan.  Best effort: the workflow returns to idle
    /// even when the hardware refuses, so the UI can never get stuck.
    async fn cancel_search(&mut self) {
        if !self.search.is_searching() {
            return;
        }
        let _ = self.call(|svc| svc.cancel_search()).await;
        self.search.finish(false);
        self.publish(|s| {
            s.search = SearchState::Idle;
            s.controls_enabled = true;
        })
        .await;
    }

    async fn search_list_complete(&mut self, ok: bool) {
        info!("weak-station scan complete, ok={}", ok);
        self.search.finish(ok);
        self.publish(|s| s.search = SearchState::Idle).await;
        if ok {
            if let Some(results) = self.call(|svc| svc.search_results()).await {
                self.presets.apply_scan_results(&results);
                self.publish_presets().await;
            }
        }
        // Scanning mutes transmission; resume it, unless a headset was
        // plugged in meanwhile (transmission and wired audio are mutually
        // exclusive).
        match self.call(|svc| svc.is_headset_plugged()).await {
            Some(true) => {
                info!("headset plugged during scan, powering off");
                self.schedule_power(PowerRequest::Disable, POWER_DISPATCH_DELAY);
            }
            Some(false) => {
                if self.call(|svc| svc.restart()).await.is_some() {
                    let khz = self.presets.tuned();
                    self.tune(khz).await;
                }
                self.publish(|s| s.controls_enabled = true).await;
            }
            None => {}
        }
    }

    /// Rebuild the scrolled line: hardware radio text plus metadata (or a
    /// pending marker), dropped entirely if anything non-printable slipped
    /// in.
    async fn update_radio_text(&mut self) {
        if self.service.is_none() {
            return;
        }
        if !self.call(|svc| svc.is_on()).await.unwrap_or(false) {
            return;
        }
        let mut text = self
            .call(|svc| svc.radio_text())
            .await
            .unwrap_or_default();
        match &self.meta_data {
            Some(meta) => text.push_str(meta),
            None => text.push_str(METADATA_PENDING),
        }
        if text.chars().any(|c| c.is_control()) {
            text.clear();
        }
        self.radio_text = text.clone();
        self.publish(move |s| {
            s.radio_text = text.clone();
            s.scroll_text = text;
        })
        .await;
        let arm = self.scroller.start(&self.radio_text);
        self.arm_scroller(arm);
    }

    fn arm_scroller(&mut self, arm: Option<ScrollerArm>) {
        if let Some(task) = self.scroller_task.take() {
            task.abort();
        }
        let Some(arm) = arm else { return };
        let tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(arm.delay).await;
            let _ = tx.send(SessionEvent::Scroller {
                msg: arm.msg,
                gen: arm.gen,
            });
        });
        self.scroller_task = Some(task.abort_handle());
    }

    async fn handle_scroller(&mut self, msg: ScrollerMsg, gen: u64) {
        let step = self.scroller.handle(msg, gen);
        if step.recapture {
            let arm = self.scroller.start(&self.radio_text);
            self.arm_scroller(arm);
            return;
        }
        if let Some(display) = step.display {
            self.publish(move |s| s.scroll_text = display).await;
        }
        self.arm_scroller(step.arm);
    }

    async fn stop_scroller(&mut self) {
        if let Some(task) = self.scroller_task.take() {
            task.abort();
        }
        let full = self.scroller.stop();
        self.publish(move |s| s.scroll_text = full).await;
    }

    /// Flush persistent state and stop UI timers.  The session stays alive
    /// and keeps reacting to hardware callbacks.
    async fn suspend(&mut self) {
        debug!("suspending: persisting presets, stopping scroller");
        self.stop_scroller().await;
        self.presets.persist();
    }

    async fn publish_presets(&mut self) {
        let slots = self.presets.slots().to_vec();
        let tuned = self.presets.tuned();
        self.publish(move |s| {
            s.presets = slots;
            s.tuned_khz = tuned;
        })
        .await;
    }

    /// Call into the service, downgrading errors to `None`.  A lost
    /// connection additionally drops the handle and notifies every owner.
    async fn call<T>(
        &mut self,
        f: impl FnOnce(&dyn TransmitterService) -> Result<T, ServiceError>,
    ) -> Option<T> {
        let svc = self.service.clone()?;
        match f(&*svc) {
            Ok(value) => Some(value),
            Err(ServiceError::ConnectionLost) => {
                warn!("transmitter service connection lost");
                self.connector.connection_lost();
                self.service_lost().await;
                None
            }
            Err(e) => {
                warn!("transmitter call failed: {}", e);
                None
            }
        }
    }

    /// Drop the dead handle and settle any state that depended on it.  An
    /// unconfirmed power transition can never complete once the link is
    /// gone, so it falls back to Off; settled states stay as the last known
    /// truth.  The next power request attempts a fresh connection.
    async fn service_lost(&mut self) {
        self.service = None;
        if self.power.is_transitioning() {
            self.power = SessionState::Off;
        }
        self.search.finish(false);
        let power = self.power;
        self.publish(move |s| {
            s.connected = false;
            s.controls_enabled = true;
            s.power = power;
            s.search = SearchState::Idle;
        })
        .await;
    }

    fn handle_doze(&mut self, event: DozeEvent) {
        let now = tokio::time::Instant::now().into_std();
        match event {
            DozeEvent::DisplayOn => self.doze.on_display_on(),
            DozeEvent::DisplayOff => self.doze.on_display_off(now),
            DozeEvent::ProximityNear => {
                if self.doze.on_proximity_near(now) {
                    info!("hand wave detected, pulsing ambient display");
                    let _ = self.broadcast_tx.send(SessionMessage::WakePulse);
                }
            }
        }
    }

    async fn publish(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.states.update(f).await;
        let _ = self.broadcast_tx.send(SessionMessage::StateUpdated);
    }

    async fn degrade(&self, message: &str) {
        warn!("session degraded: {}", message);
        self.publish(|s| {
            s.connected = false;
            s.controls_enabled = false;
        })
        .await;
        let _ = self
            .broadcast_tx
            .send(SessionMessage::Degraded(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_keeps_only_latest() {
        let mut debouncer = PowerDebouncer::default();
        let first = debouncer.schedule();
        let second = debouncer.schedule();
        assert!(!debouncer.accept(first));
        assert!(debouncer.accept(second));
    }

    #[test]
    fn test_debouncer_rejects_after_reschedule() {
        let mut debouncer = PowerDebouncer::default();
        let gen = debouncer.schedule();
        assert!(debouncer.accept(gen));
        let next = debouncer.schedule();
        assert!(!debouncer.accept(gen));
        assert!(debouncer.accept(next));
    }
}
