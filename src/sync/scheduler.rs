//! Run scheduling and coalescing
//!
//! The notification listener's core: a three-state machine with a single
//! pending flag that bounds sync execution to one run at a time and
//! collapses notification bursts into one trailing run.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Listener state. `Scheduled` means a run will start as soon as the worker
/// wakes; requests arriving then are already covered by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    Idle,
    Scheduled,
    Running,
}

#[derive(Debug)]
struct State {
    phase: ListenerPhase,
    pending: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Notify,
}

/// Handle for requesting sync runs.
///
/// All triggers (webhooks, the periodic job, manual requests) funnel through
/// `request_run`; a single worker task owns actual execution.
#[derive(Clone)]
pub struct SyncScheduler {
    shared: Arc<Shared>,
}

impl SyncScheduler {
    /// Spawn the worker task around the given runner.
    pub fn spawn<F, Fut>(runner: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                phase: ListenerPhase::Idle,
                pending: false,
            }),
            wake: Notify::new(),
        });

        let worker = shared.clone();
        tokio::spawn(async move {
            loop {
                worker.wake.notified().await;
                loop {
                    {
                        let mut state = worker.state.lock();
                        if state.phase != ListenerPhase::Scheduled {
                            break;
                        }
                        state.phase = ListenerPhase::Running;
                    }

                    runner().await;

                    let mut state = worker.state.lock();
                    if state.pending {
                        // Requests arrived mid-run; exactly one more run
                        // absorbs them all.
                        state.pending = false;
                        state.phase = ListenerPhase::Scheduled;
                        debug!("running coalesced trailing sync");
                    } else {
                        state.phase = ListenerPhase::Idle;
                        break;
                    }
                }
            }
        });

        Self { shared }
    }

    /// Request a sync run.
    ///
    /// Returns `true` if this request scheduled a new run, `false` if it was
    /// coalesced into one already scheduled or in flight.
    pub fn request_run(&self) -> bool {
        let mut state = self.shared.state.lock();
        match state.phase {
            ListenerPhase::Idle => {
                state.phase = ListenerPhase::Scheduled;
                self.shared.wake.notify_one();
                true
            }
            ListenerPhase::Scheduled => false,
            ListenerPhase::Running => {
                state.pending = true;
                false
            }
        }
    }

    pub fn phase(&self) -> ListenerPhase {
        self.shared.state.lock().phase
    }
}
