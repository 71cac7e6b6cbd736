use std::time::Duration;

use fmtx_proto::state::SearchState;
use tokio::task::AbortHandle;

/// Hard ceiling on a weak-station scan; if the hardware never reports
/// completion the session force-cancels and returns to idle.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Tracks the single in-flight weak-station scan.
///
/// A second start while searching is a no-op, and completion, cancellation
/// and the watchdog all funnel through [`finish`](Self::finish) so the
/// session can never get stuck in `Searching`.  The generation counter
/// orphans watchdog timers from scans that already ended.
#[derive(Debug, Default)]
pub struct SearchWorkflow {
    state: SearchState,
    last_result_ok: bool,
    gen: u64,
    watchdog: Option<AbortHandle>,
}

impl SearchWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_searching(&self) -> bool {
        self.state == SearchState::Searching
    }

    pub fn last_result_ok(&self) -> bool {
        self.last_result_ok
    }

    /// Begin a scan.  Returns the watchdog generation, or `None` when a scan
    /// is already active.
    pub fn begin(&mut self) -> Option<u64> {
        if self.is_searching() {
            return None;
        }
        self.state = SearchState::Searching;
        self.last_result_ok = false;
        self.gen += 1;
        Some(self.gen)
    }

    pub fn arm_watchdog(&mut self, abort: AbortHandle) {
        if let Some(old) = self.watchdog.replace(abort) {
            old.abort();
        }
    }

    /// True when a fired watchdog belongs to the scan still in flight.
    pub fn watchdog_is_current(&self, gen: u64) -> bool {
        self.is_searching() && gen == self.gen
    }

    /// Return to idle, recording whether the scan produced results.  Safe to
    /// call when no scan is active.
    pub fn finish(&mut self, ok: bool) {
        self.state = SearchState::Idle;
        self.last_result_ok = ok;
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }
}
