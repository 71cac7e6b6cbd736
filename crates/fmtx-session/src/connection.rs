use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::events::SessionEvent;
use crate::service::ServiceHandle;

/// Identifies one consumer of the shared service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a connection attempt, fanned out to every bound owner.
#[derive(Debug, Clone)]
pub enum ConnectionOutcome {
    Connected(ServiceHandle),
    Failed,
    /// A previously live connection went away.
    Lost,
}

/// Platform hook for reaching the transmitter service process.
pub trait ServiceLauncher: Send + Sync + 'static {
    /// Ask the platform to start the service and accept a binding.  A `false`
    /// return means the service refused outright and no connection attempt
    /// will follow.
    fn request_bind(&self) -> bool;

    /// Establish a connection to the (already launched) service.
    fn connect(&self) -> BoxFuture<'static, anyhow::Result<ServiceHandle>>;
}

/// Tracks which owners are bound to the service and shares one live handle
/// among them.  At most one connect attempt is in flight at a time; its
/// completion comes back through the session event queue, so all mutation
/// happens on the session loop.
pub struct ServiceConnector {
    launcher: Arc<dyn ServiceLauncher>,
    completion_tx: UnboundedSender<SessionEvent>,
    bindings: HashMap<OwnerId, UnboundedSender<SessionEvent>>,
    shared: Option<ServiceHandle>,
    connecting: bool,
}

impl ServiceConnector {
    pub fn new(
        launcher: Arc<dyn ServiceLauncher>,
        completion_tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            launcher,
            completion_tx,
            bindings: HashMap::new(),
            shared: None,
            connecting: false,
        }
    }

    pub fn handle(&self) -> Option<ServiceHandle> {
        self.shared.clone()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Bind an owner.  Returns `false` when the platform rejects the bind
    /// request; otherwise the owner is registered and will receive a
    /// `Connection` event once an attempt resolves.  If a live handle already
    /// exists it is delivered immediately.
    pub fn bind(&mut self, owner: OwnerId, notify: UnboundedSender<SessionEvent>) -> bool {
        if !self.launcher.request_bind() {
            warn!("service bind request rejected");
            return false;
        }
        self.bindings.insert(owner, notify.clone());
        if let Some(handle) = &self.shared {
            let _ = notify.send(SessionEvent::Connection(ConnectionOutcome::Connected(
                handle.clone(),
            )));
        } else {
            self.ensure_connecting();
        }
        true
    }

    /// Drop an owner's binding.  The shared handle is released once the last
    /// owner unbinds.
    pub fn unbind(&mut self, owner: OwnerId) {
        self.bindings.remove(&owner);
        if self.bindings.is_empty() {
            debug!("last owner unbound, releasing service handle");
            self.shared = None;
        }
    }

    /// Spawn a connect attempt unless one is already in flight or a live
    /// handle exists.
    pub fn ensure_connecting(&mut self) {
        if self.connecting || self.shared.is_some() || self.bindings.is_empty() {
            return;
        }
        self.connecting = true;
        let fut = self.launcher.connect();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let outcome = fut.await.map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::ConnectFinished(outcome));
        });
    }

    /// Record the result of a connect attempt and fan it out to every bound
    /// owner.  Session-loop only.
    pub fn complete(&mut self, result: Result<ServiceHandle, String>) {
        self.connecting = false;
        let outcome = match result {
            Ok(handle) => {
                debug!("service connection established");
                self.shared = Some(handle.clone());
                ConnectionOutcome::Connected(handle)
            }
            Err(e) => {
                warn!("service connection failed: {}", e);
                ConnectionOutcome::Failed
            }
        };
        for notify in self.bindings.values() {
            let _ = notify.send(SessionEvent::Connection(outcome.clone()));
        }
    }

    /// Forget a handle that turned out to be dead and tell every owner.
    /// Does not reconnect on its own; owners decide when to retry via
    /// [`ensure_connecting`](Self::ensure_connecting).
    pub fn connection_lost(&mut self) {
        if self.shared.take().is_none() {
            return;
        }
        for notify in self.bindings.values() {
            let _ = notify.send(SessionEvent::Connection(ConnectionOutcome::Lost));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimLauncher, SimTransmitter};
    use tokio::sync::mpsc;

    fn connector_with(
        launcher: SimLauncher,
    ) -> (ServiceConnector, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ServiceConnector::new(Arc::new(launcher), tx), rx)
    }

    #[tokio::test]
    async fn test_bind_connect_and_fan_out() {
        let sim = Arc::new(SimTransmitter::new());
        let (mut connector, mut rx) = connector_with(SimLauncher::new(sim));

        let owner = OwnerId::new();
        assert!(connector.bind(owner, connector.completion_tx.clone()));
        assert!(connector.is_connecting());

        let finished = rx.recv().await.unwrap();
        match finished {
            SessionEvent::ConnectFinished(result) => connector.complete(result),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(connector.handle().is_some());

        match rx.recv().await.unwrap() {
            SessionEvent::Connection(ConnectionOutcome::Connected(_)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_bind_registers_nothing() {
        let sim = Arc::new(SimTransmitter::new());
        let (mut connector, _rx) = connector_with(SimLauncher::new(sim).reject_bind());

        assert!(!connector.bind(OwnerId::new(), connector.completion_tx.clone()));
        assert!(!connector.is_connecting());
        assert!(connector.bindings.is_empty());
    }

    #[tokio::test]
    async fn test_last_unbind_releases_handle() {
        let sim = Arc::new(SimTransmitter::new());
        let (mut connector, mut rx) = connector_with(SimLauncher::new(sim));

        let owner = OwnerId::new();
        assert!(connector.bind(owner, connector.completion_tx.clone()));
        match rx.recv().await.unwrap() {
            SessionEvent::ConnectFinished(result) => connector.complete(result),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(connector.handle().is_some());

        connector.unbind(owner);
        assert!(connector.handle().is_none());
    }
}
