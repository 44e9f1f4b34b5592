//! Update coalescer
//!
//! Trailing-edge debounce in front of the preview channel. Through `schedule`
//! at most one message is dispatched per window, and the one dispatched is
//! always the latest one scheduled. `flush` is the one deliberate bypass of the
//! window. The timer belongs to this instance; dropping the coalescer stops it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::message::{BridgeMessage, BridgePort};

/// What `schedule` did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// Sent right away; the window had already elapsed
    Dispatched,
    /// Held until the given instant, superseding anything held before
    Deferred(Instant),
}

struct Pending {
    message: Option<BridgeMessage>,
    last_dispatch: Instant,
    dispatched: u64,
}

impl Pending {
    fn dispatch(&mut self, port: &BridgePort, now: Instant) -> bool {
        let Some(message) = self.message.take() else {
            return false;
        };
        self.last_dispatch = now;
        self.dispatched += 1;
        trace!("Dispatching {} (#{})", message.type_name(), self.dispatched);
        if !port.post(&message) {
            debug!("Preview channel closed; dropped {}", message.type_name());
        }
        true
    }
}

pub struct UpdateCoalescer {
    window: Duration,
    port: BridgePort,
    state: Arc<Mutex<Pending>>,
    timer: Option<JoinHandle<()>>,
}

impl UpdateCoalescer {
    /// The dispatch clock starts now, so an edit right after creation is deferred
    pub fn new(port: BridgePort, window: Duration) -> Self {
        Self {
            window,
            port,
            state: Arc::new(Mutex::new(Pending {
                message: None,
                last_dispatch: Instant::now(),
                dispatched: 0,
            })),
            timer: None,
        }
    }

    /// Schedule a message, replacing any message still waiting
    pub fn schedule(&mut self, message: BridgeMessage) -> Scheduled {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.message = Some(message);

        if now.saturating_duration_since(state.last_dispatch) >= self.window {
            abort_timer(&mut self.timer);
            state.dispatch(&self.port, now);
            return Scheduled::Dispatched;
        }

        let fire_at = state.last_dispatch + self.window;
        drop(state);

        abort_timer(&mut self.timer);
        let state = Arc::clone(&self.state);
        let port = self.port.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            state.lock().dispatch(&port, Instant::now());
        }));
        Scheduled::Deferred(fire_at)
    }

    /// Dispatch a waiting message immediately, ignoring the window.
    ///
    /// For callers that must order a direct post after the pending render.
    /// The flush counts as a dispatch, so the next `schedule` waits a full
    /// window from here. Returns false if nothing was waiting.
    pub fn flush(&mut self) -> bool {
        abort_timer(&mut self.timer);
        self.state.lock().dispatch(&self.port, Instant::now())
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().message.is_some()
    }

    /// Messages dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.state.lock().dispatched
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Drop for UpdateCoalescer {
    fn drop(&mut self) {
        abort_timer(&mut self.timer);
    }
}

fn abort_timer(timer: &mut Option<JoinHandle<()>>) {
    if let Some(timer) = timer.take() {
        timer.abort();
    }
}
