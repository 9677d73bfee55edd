//! The fixed-rate driver that pulses participants' lifecycle state machines.
//! One worker thread per context; ticks are strictly serialized within it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rtcomp_core::{next_id, Result, RtcError};

use crate::lifecycle::{ComponentLifecycle, RtcHooks};

struct Participant {
    id: String,
    lifecycle: Arc<ComponentLifecycle>,
}

/// A worker loop that pulses its participants at a configurable rate.
/// Construct with [`PeriodicExecutionContext::new`] (kept in an `Arc` since
/// `start` spawns a thread that holds its own clone).
pub struct PeriodicExecutionContext {
    id: String,
    participants: Mutex<Vec<Participant>>,
    rate_hz: Mutex<f64>,
    pending_rate_hz: Mutex<Option<f64>>,
    running: Mutex<bool>,
    wake: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Disables the inter-tick sleep; ticks run back-to-back. Used for
    /// deterministic tests and CPU-bound rates.
    nowait: bool,
}

impl PeriodicExecutionContext {
    pub fn new(rate_hz: f64) -> Result<Arc<Self>> {
        Self::with_mode(rate_hz, false)
    }

    /// As [`Self::new`], but the worker never sleeps between ticks.
    pub fn new_nowait(rate_hz: f64) -> Result<Arc<Self>> {
        Self::with_mode(rate_hz, true)
    }

    fn with_mode(rate_hz: f64, nowait: bool) -> Result<Arc<Self>> {
        if rate_hz <= 0.0 {
            return Err(RtcError::bad_parameter("execution context rate must be positive"));
        }
        Ok(Arc::new(Self {
            id: next_id("ec"),
            participants: Mutex::new(Vec::new()),
            rate_hz: Mutex::new(rate_hz),
            pending_rate_hz: Mutex::new(None),
            running: Mutex::new(false),
            wake: Condvar::new(),
            worker: Mutex::new(None),
            nowait,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rate_hz(&self) -> f64 {
        *self.rate_hz.lock()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.lock().len()
    }

    /// Attach a component to this context, returning the lifecycle handle
    /// used to drive `activate`/`deactivate`/`reset` requests directly.
    pub fn add_participant(&self, component_id: impl Into<String>, hooks: Arc<dyn RtcHooks>) -> Arc<ComponentLifecycle> {
        let lifecycle = Arc::new(ComponentLifecycle::new(hooks));
        self.participants.lock().push(Participant {
            id: component_id.into(),
            lifecycle: lifecycle.clone(),
        });
        lifecycle
    }

    fn find(&self, component_id: &str) -> Option<Arc<ComponentLifecycle>> {
        self.participants.lock().iter().find(|p| p.id == component_id).map(|p| p.lifecycle.clone())
    }

    pub fn activate_component(&self, component_id: &str) -> Result<()> {
        self.find(component_id)
            .ok_or_else(|| RtcError::bad_parameter("no such participant"))?
            .request_activate()
    }

    pub fn deactivate_component(&self, component_id: &str) -> Result<()> {
        self.find(component_id)
            .ok_or_else(|| RtcError::bad_parameter("no such participant"))?
            .request_deactivate()
    }

    pub fn reset_component(&self, component_id: &str) -> Result<()> {
        self.find(component_id)
            .ok_or_else(|| RtcError::bad_parameter("no such participant"))?
            .request_reset()
    }

    /// The current per-`(component, ec)` state, or `None` if no such
    /// participant is attached. Used by callers (e.g. the Manager's
    /// shutdown teardown) that need to observe a requested transition land
    /// without ticking the context themselves.
    pub fn participant_state(&self, component_id: &str) -> Option<crate::lifecycle::EcState> {
        self.find(component_id).map(|lifecycle| lifecycle.state())
    }

    /// Honored at the next tick boundary: every participant
    /// receives `on_rate_changed` exactly once for the change.
    pub fn set_rate(&self, rate_hz: f64) -> Result<()> {
        if rate_hz <= 0.0 {
            return Err(RtcError::bad_parameter("execution context rate must be positive"));
        }
        *self.pending_rate_hz.lock() = Some(rate_hz);
        Ok(())
    }

    /// Idempotent: calling `start` on an already-running context is a no-op.
    pub fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.lock();
            if *running {
                return;
            }
            *running = true;
        }

        for participant in self.participants.lock().iter() {
            if let Err(err) = participant.lifecycle.on_startup(&self.id) {
                tracing::warn!(ec = %self.id, component = %participant.id, error = %err, "on_startup hook failed");
            }
        }

        let context = Arc::clone(self);
        *self.worker.lock() = Some(thread::spawn(move || context.run_loop()));
    }

    fn run_loop(self: Arc<Self>) {
        let mut deadline = Instant::now();
        loop {
            if !*self.running.lock() {
                break;
            }

            if let Some(new_rate) = self.pending_rate_hz.lock().take() {
                *self.rate_hz.lock() = new_rate;
                for participant in self.participants.lock().iter() {
                    if let Err(err) = participant.lifecycle.on_rate_changed(&self.id) {
                        tracing::warn!(ec = %self.id, component = %participant.id, error = %err, "on_rate_changed hook failed");
                    }
                }
            }

            let snapshot: Vec<Arc<ComponentLifecycle>> =
                self.participants.lock().iter().map(|p| p.lifecycle.clone()).collect();
            for lifecycle in &snapshot {
                let ec_id = self.id.clone();
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| lifecycle.tick(&ec_id)));
                if outcome.is_err() {
                    tracing::warn!(ec = %self.id, "participant tick panicked; isolated from its siblings");
                }
            }

            let period = Duration::from_secs_f64(1.0 / *self.rate_hz.lock());
            deadline += period;

            if self.nowait {
                if !*self.running.lock() {
                    break;
                }
                continue;
            }

            let mut running = self.running.lock();
            if !*running {
                break;
            }
            let now = Instant::now();
            if now < deadline {
                self.wake.wait_for(&mut running, deadline - now);
            }
            if !*running {
                break;
            }
        }

        for participant in self.participants.lock().iter() {
            if let Err(err) = participant.lifecycle.on_shutdown(&self.id) {
                tracing::warn!(ec = %self.id, component = %participant.id, error = %err, "on_shutdown hook failed");
            }
        }
    }

    /// Idempotent: calling `stop` on an already-stopped context is a no-op.
    pub fn stop(&self) {
        {
            let mut running = self.running.lock();
            if !*running {
                return;
            }
            *running = false;
        }
        self.wake.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Stop the loop and detach every participant.
    pub fn destroy(&self) {
        self.stop();
        let participants = std::mem::take(&mut *self.participants.lock());
        for participant in participants {
            if let Err(err) = participant.lifecycle.detach_context(&self.id) {
                tracing::warn!(ec = %self.id, component = %participant.id, error = %err, "detach_context hook failed");
            }
        }
    }
}
