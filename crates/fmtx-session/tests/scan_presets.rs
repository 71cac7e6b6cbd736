mod common;

use std::sync::Arc;

use std::time::Duration;

use fmtx_proto::prefs::{preset_key, PrefStore};
use fmtx_proto::state::{SearchState, SessionState};
use fmtx_session::events::SessionIntent;
use fmtx_session::search::SEARCH_TIMEOUT;
use fmtx_session::sim::SimTransmitter;

use common::{settle, start_session, wait_for};

async fn powered_session(sim: Arc<SimTransmitter>) -> common::TestSession {
    let session = start_session(sim.clone(), Some(false)).await;
    wait_for(&session.states, "service connect", |s| s.connected).await;
    session.send(SessionIntent::PowerOn);
    wait_for(&session.states, "power on", |s| s.power == SessionState::On).await;
    session
}

#[tokio::test]
async fn test_scan_fills_presets_and_resumes_transmission() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    sim.set_scan_results(vec![88_500, 91_100, 94_700, 0, 0, 0]);
    let session = powered_session(sim.clone()).await;
    let tuned_before = session.states.snapshot().await.tuned_khz;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;
    assert!(sim.is_searching_now());

    sim.complete_search(true);
    let snap = wait_for(&session.states, "scan results applied", |s| {
        s.search == SearchState::Idle && s.presets == [88_500, 91_100, 94_700, 0, 0, 0]
    })
    .await;

    // Transmission resumed on the frequency from before the scan.
    assert_eq!(sim.restart_calls(), 1);
    assert_eq!(snap.tuned_khz, tuned_before);
    assert!(snap.controls_enabled);

    // Scan results hit the preference store in the same batch.
    let prefs = PrefStore::load(session.prefs_path.clone());
    assert_eq!(prefs.get_int(&preset_key(0), 0), 88_500);
    assert_eq!(prefs.get_int(&preset_key(2), 0), 94_700);
    assert_eq!(prefs.get_int(&preset_key(3), -1), 0);
}

#[tokio::test]
async fn test_second_scan_request_is_ignored() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;

    session.send(SessionIntent::StartScan);
    settle().await;
    assert_eq!(sim.search_calls(), 1);

    sim.complete_search(false);
    wait_for(&session.states, "scan finished", |s| {
        s.search == SearchState::Idle
    })
    .await;
}

#[tokio::test]
async fn test_cancel_returns_to_idle_even_when_hardware_refuses() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;

    sim.set_fail_cancel(true);
    session.send(SessionIntent::CancelScan);
    let snap = wait_for(&session.states, "scan cancelled", |s| {
        s.search == SearchState::Idle && s.controls_enabled
    })
    .await;

    assert_eq!(sim.cancel_calls(), 1);
    assert_eq!(snap.power, SessionState::On);
}

#[tokio::test]
async fn test_power_off_cancels_scan_first() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;

    session.send(SessionIntent::PowerOff);
    let snap = wait_for(&session.states, "power off", |s| {
        s.power == SessionState::Off && s.controls_enabled
    })
    .await;

    assert_eq!(snap.search, SearchState::Idle);
    assert_eq!(sim.cancel_calls(), 1);
    assert!(!sim.is_searching_now());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_scan_is_cancelled_by_watchdog() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;

    // Nothing ever reports completion; the watchdog forces a cancel.
    tokio::time::sleep(SEARCH_TIMEOUT + Duration::from_millis(100)).await;

    let snap = wait_for(&session.states, "forced cancel", |s| {
        s.search == SearchState::Idle && s.controls_enabled
    })
    .await;
    assert_eq!(sim.cancel_calls(), 1);
    assert!(!sim.is_searching_now());
    assert_eq!(snap.power, SessionState::On);
}

#[tokio::test]
async fn test_headset_during_scan_powers_off_after_completion() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;

    sim.set_headset_plugged(true);
    sim.complete_search(true);

    wait_for(&session.states, "powered off", |s| {
        s.power == SessionState::Off && s.controls_enabled
    })
    .await;
    assert_eq!(sim.restart_calls(), 0);
    assert_eq!(sim.disable_calls(), 1);
}

#[tokio::test]
async fn test_failed_scan_keeps_existing_presets() {
    let sim = Arc::new(SimTransmitter::new());
    sim.set_manual_search(true);
    sim.set_scan_results(vec![88_500]);
    let session = powered_session(sim.clone()).await;

    session.send(SessionIntent::Tune(99_500));
    wait_for(&session.states, "tuned", |s| s.tuned_khz == 99_500).await;
    session.send(SessionIntent::StorePreset(0));
    wait_for(&session.states, "preset stored", |s| s.presets[0] == 99_500).await;

    session.send(SessionIntent::StartScan);
    wait_for(&session.states, "scan started", |s| {
        s.search == SearchState::Searching
    })
    .await;
    sim.complete_search(false);

    let snap = wait_for(&session.states, "scan finished", |s| {
        s.search == SearchState::Idle && s.controls_enabled
    })
    .await;
    assert_eq!(snap.presets[0], 99_500);
}
