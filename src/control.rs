use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use serde_derive::{Deserialize, Serialize};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Idle,
    Running,
    Checkpointing,
    Suspended,
    Cancelled,
    Completed,
    /// Stopped on an internal inconsistency.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Cancelled | RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug)]
struct Signals {
    pause: bool,
    cancel: bool,
    status: RunStatus,
}

/// What the engine should do after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Continue,
    Stop,
}

/// Shared handle through which another thread may pause, resume or cancel a
/// run. The engine only looks at it between checkpoints.
#[derive(Debug, Clone)]
pub struct RunController {
    inner: Arc<(Mutex<Signals>, Condvar)>,
}

impl Default for RunController {
    fn default() -> Self {
        RunController {
            inner: Arc::new((
                Mutex::new(Signals {
                    pause: false,
                    cancel: false,
                    status: RunStatus::Idle,
                }),
                Condvar::new(),
            )),
        }
    }
}

impl RunController {
    pub fn new() -> RunController {
        RunController::default()
    }

    fn signals(&self) -> MutexGuard<'_, Signals> {
        // A panic elsewhere while holding the lock leaves plain flags behind,
        // which are still meaningful.
        self.inner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pause(&self) {
        self.signals().pause = true;
    }

    pub fn resume(&self) {
        self.signals().pause = false;
        self.inner.1.notify_all();
    }

    pub fn cancel(&self) {
        self.signals().cancel = true;
        self.inner.1.notify_all();
    }

    pub fn status(&self) -> RunStatus {
        self.signals().status
    }

    pub(crate) fn set_status(&self, status: RunStatus) {
        self.signals().status = status;
    }

    /// Block while paused; report whether the run may go on.
    pub(crate) fn gate(&self) -> Gate {
        let mut signals = self.signals();
        while signals.pause && !signals.cancel {
            signals.status = RunStatus::Suspended;
            signals = self
                .inner
                .1
                .wait(signals)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if signals.cancel {
            signals.status = RunStatus::Cancelled;
            Gate::Stop
        } else {
            signals.status = RunStatus::Running;
            Gate::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_releases_a_paused_gate() {
        let c = RunController::new();
        c.pause();
        let remote = c.clone();
        let waiter = std::thread::spawn(move || remote.gate());
        while c.status() != RunStatus::Suspended {
            std::thread::sleep(Duration::from_millis(1));
        }
        c.cancel();
        assert_eq!(waiter.join().unwrap(), Gate::Stop);
        assert_eq!(c.status(), RunStatus::Cancelled);
    }

    #[test]
    fn resume_continues() {
        let c = RunController::new();
        c.pause();
        let remote = c.clone();
        let waiter = std::thread::spawn(move || remote.gate());
        while c.status() != RunStatus::Suspended {
            std::thread::sleep(Duration::from_millis(1));
        }
        c.resume();
        assert_eq!(waiter.join().unwrap(), Gate::Continue);
        assert_eq!(c.status(), RunStatus::Running);
    }
}
