#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fmtx_proto::config::Config;
use fmtx_proto::state::{SessionSnapshot, SessionStateManager};
use fmtx_session::connection::ServiceLauncher;
use fmtx_session::controller::SessionController;
use fmtx_session::events::{SessionEvent, SessionIntent, SessionMessage};
use fmtx_session::sim::{SimLauncher, SimTransmitter};
use tokio::sync::{broadcast, mpsc};

pub struct TestSession {
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub states: Arc<SessionStateManager>,
    pub messages: broadcast::Receiver<SessionMessage>,
    pub prefs_path: PathBuf,
    pub task: tokio::task::JoinHandle<anyhow::Result<()>>,
    _dir: tempfile::TempDir,
}

impl TestSession {
    pub fn send(&self, intent: SessionIntent) {
        self.events
            .send(SessionEvent::Intent(intent))
            .expect("session event queue closed");
    }
}

pub fn test_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.session.prefs_file = dir.path().join("prefs.json");
    config
}

/// Spin up a full session loop against the given launcher.
pub async fn start_with(
    launcher: Arc<dyn ServiceLauncher>,
    resumed_power: Option<bool>,
) -> TestSession {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(&dir);
    let prefs_path = config.session.prefs_file.clone();
    let (broadcast_tx, messages) = broadcast::channel(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(
        config,
        launcher,
        broadcast_tx,
        event_tx.clone(),
        resumed_power,
    );
    let states = controller.states();
    let task = tokio::spawn(controller.run(event_rx));
    TestSession {
        events: event_tx,
        states,
        messages,
        prefs_path,
        task,
        _dir: dir,
    }
}

pub async fn start_session(sim: Arc<SimTransmitter>, resumed_power: Option<bool>) -> TestSession {
    start_with(Arc::new(SimLauncher::new(sim)), resumed_power).await
}

/// Poll the snapshot until the predicate holds; panics with the last
/// snapshot after five seconds.
pub async fn wait_for(
    states: &SessionStateManager,
    what: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snap = states.snapshot().await;
        if pred(&snap) {
            return snap;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}; last snapshot: {snap:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Let queued events drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
