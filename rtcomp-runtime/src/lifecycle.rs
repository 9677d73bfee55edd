//! Per-`(component, execution context)` lifecycle state machine. A component implements [`RtcHooks`]; a [`ComponentLifecycle`] wraps
//! one hooks instance with the guarded `Inactive/Active/Error` state and the
//! pending-request queue a [`crate::execution_context::PeriodicExecutionContext`]
//! drains one entry per tick.

use parking_lot::Mutex;
use rtcomp_core::{ErrorCategory, Result, RtcError};

/// The three per-`(component, ec)` states. `Created`/`Alive`/
/// `Exited` are process-wide (not per-EC) and are tracked by the component's
/// owner (`rtcomp-manager`), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcState {
    Inactive,
    Active,
    Error,
}

/// The hook set a component implements. Every method defaults to `Ok(())` so
/// a component only overrides what it cares about — most only implement
/// `on_execute`.
pub trait RtcHooks: Send + Sync {
    fn on_initialize(&self) -> Result<()> {
        Ok(())
    }

    fn on_finalize(&self) -> Result<()> {
        Ok(())
    }

    fn on_startup(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_shutdown(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_activated(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_execute(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_state_update(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_deactivated(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    /// Pre-hook for the automatic `Active -> Error` transition triggered by a
    /// failing `on_execute`/`on_state_update`").
    fn on_aborting(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_error(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_reset(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn on_rate_changed(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }

    fn detach_context(&self, _ec_id: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRequest {
    None,
    Activate,
    Deactivate,
    Reset,
}

/// Guards a single component's state for one execution context. `tick`
/// consumes at most one pending request (submitted by `activate`/
/// `deactivate`/`reset`) per call: a `*_component` request lands on the
/// next tick, never mid-tick.
pub struct ComponentLifecycle {
    hooks: std::sync::Arc<dyn RtcHooks>,
    state: Mutex<EcState>,
    pending: Mutex<PendingRequest>,
}

impl ComponentLifecycle {
    pub fn new(hooks: std::sync::Arc<dyn RtcHooks>) -> Self {
        Self {
            hooks,
            state: Mutex::new(EcState::Inactive),
            pending: Mutex::new(PendingRequest::None),
        }
    }

    pub fn state(&self) -> EcState {
        *self.state.lock()
    }

    /// Passthroughs for the hooks the owning execution context calls
    /// directly rather than through the tick-consumed request queue.
    pub fn on_startup(&self, ec_id: &str) -> Result<()> {
        self.hooks.on_startup(ec_id)
    }

    pub fn on_shutdown(&self, ec_id: &str) -> Result<()> {
        self.hooks.on_shutdown(ec_id)
    }

    pub fn on_rate_changed(&self, ec_id: &str) -> Result<()> {
        self.hooks.on_rate_changed(ec_id)
    }

    pub fn detach_context(&self, ec_id: &str) -> Result<()> {
        self.hooks.detach_context(ec_id)
    }

    /// Submit an activate request. Rejected immediately if the component is
    /// not currently `Inactive`.
    pub fn request_activate(&self) -> Result<()> {
        if *self.state.lock() != EcState::Inactive {
            return Err(RtcError::precondition_not_met("activate requires Inactive state"));
        }
        *self.pending.lock() = PendingRequest::Activate;
        Ok(())
    }

    /// Submit a deactivate request. Rejected immediately unless `Active`.
    pub fn request_deactivate(&self) -> Result<()> {
        if *self.state.lock() != EcState::Active {
            return Err(RtcError::precondition_not_met("deactivate requires Active state"));
        }
        *self.pending.lock() = PendingRequest::Deactivate;
        Ok(())
    }

    /// Submit a reset request. Rejected immediately unless `Error`.
    pub fn request_reset(&self) -> Result<()> {
        if *self.state.lock() != EcState::Error {
            return Err(RtcError::precondition_not_met("reset requires Error state"));
        }
        *self.pending.lock() = PendingRequest::Reset;
        Ok(())
    }

    /// Run one scheduling tick for this participant. If a request is
    /// pending, this tick applies exactly that transition (no `on_execute`
    /// fires this tick); otherwise it performs the per-state periodic action.
    pub fn tick(&self, ec_id: &str) {
        let pending = std::mem::replace(&mut *self.pending.lock(), PendingRequest::None);
        match pending {
            PendingRequest::Activate => {
                self.apply_activate(ec_id);
                return;
            }
            PendingRequest::Deactivate => {
                self.apply_deactivate(ec_id);
                return;
            }
            PendingRequest::Reset => {
                self.apply_reset(ec_id);
                return;
            }
            PendingRequest::None => {}
        }

        match self.state() {
            EcState::Active => self.run_active_tick(ec_id),
            EcState::Error => {
                if let Err(err) = self.hooks.on_error(ec_id) {
                    tracing::warn!(ec = ec_id, error = %err, "on_error hook failed");
                }
            }
            EcState::Inactive => {}
        }
    }

    fn apply_activate(&self, ec_id: &str) {
        if *self.state.lock() != EcState::Inactive {
            return;
        }
        *self.state.lock() = EcState::Active;
        if let Err(err) = self.hooks.on_activated(ec_id) {
            tracing::warn!(ec = ec_id, error = %err, "on_activated hook failed");
        }
    }

    fn apply_deactivate(&self, ec_id: &str) {
        if *self.state.lock() != EcState::Active {
            return;
        }
        *self.state.lock() = EcState::Inactive;
        if let Err(err) = self.hooks.on_deactivated(ec_id) {
            tracing::warn!(ec = ec_id, error = %err, "on_deactivated hook failed");
        }
    }

    fn apply_reset(&self, ec_id: &str) {
        if *self.state.lock() != EcState::Error {
            return;
        }
        match self.hooks.on_reset(ec_id) {
            Ok(()) => *self.state.lock() = EcState::Inactive,
            Err(err) => {
                tracing::warn!(ec = ec_id, error = %err, category = ?ErrorCategory::HookFailure, "on_reset kept component in Error");
            }
        }
    }

    fn run_active_tick(&self, ec_id: &str) {
        if let Err(err) = self.hooks.on_execute(ec_id) {
            self.abort(ec_id, err);
            return;
        }
        if let Err(err) = self.hooks.on_state_update(ec_id) {
            self.abort(ec_id, err);
        }
    }

    fn abort(&self, ec_id: &str, cause: RtcError) {
        tracing::warn!(ec = ec_id, error = %cause, "hook failed; aborting to Error");
        if let Err(err) = self.hooks.on_aborting(ec_id) {
            tracing::warn!(ec = ec_id, error = %err, "on_aborting hook itself failed");
        }
        *self.state.lock() = EcState::Error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHooks {
        executes: AtomicUsize,
        fail_on_nth_execute: Option<usize>,
        aborts: AtomicUsize,
    }

    impl RtcHooks for CountingHooks {
        fn on_execute(&self, _ec_id: &str) -> Result<()> {
            let n = self.executes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_nth_execute == Some(n) {
                return Err(RtcError::internal("boom"));
            }
            Ok(())
        }

        fn on_aborting(&self, _ec_id: &str) -> Result<()> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn activate_is_rejected_unless_inactive() {
        let hooks = Arc::new(CountingHooks {
            executes: AtomicUsize::new(0),
            fail_on_nth_execute: None,
            aborts: AtomicUsize::new(0),
        });
        let lifecycle = ComponentLifecycle::new(hooks);
        lifecycle.request_activate().unwrap();
        lifecycle.tick("ec-1");
        assert_eq!(lifecycle.state(), EcState::Active);
        assert!(lifecycle.request_activate().is_err());
    }

    #[test]
    fn failing_execute_transitions_to_error_and_stops_executing() {
        let hooks = Arc::new(CountingHooks {
            executes: AtomicUsize::new(0),
            fail_on_nth_execute: Some(2),
            aborts: AtomicUsize::new(0),
        });
        let lifecycle = ComponentLifecycle::new(hooks.clone());
        lifecycle.request_activate().unwrap();
        lifecycle.tick("ec-1"); // consumes activate
        lifecycle.tick("ec-1"); // execute #1, ok
        assert_eq!(lifecycle.state(), EcState::Active);
        lifecycle.tick("ec-1"); // execute #2, fails -> Error
        assert_eq!(lifecycle.state(), EcState::Error);
        assert_eq!(hooks.aborts.load(Ordering::SeqCst), 1);

        lifecycle.tick("ec-1"); // Error tick: on_error, not on_execute
        assert_eq!(hooks.executes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_returns_to_inactive_only_on_hook_success() {
        struct FlakyReset {
            succeed: std::sync::atomic::AtomicBool,
        }
        impl RtcHooks for FlakyReset {
            fn on_reset(&self, _ec_id: &str) -> Result<()> {
                if self.succeed.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(RtcError::internal("still broken"))
                }
            }
        }

        let hooks = Arc::new(FlakyReset {
            succeed: std::sync::atomic::AtomicBool::new(false),
        });
        let lifecycle = ComponentLifecycle::new(hooks.clone());
        lifecycle.request_activate().unwrap();
        lifecycle.tick("ec-1");
        *lifecycle.state.lock() = EcState::Error; // simulate prior failure

        lifecycle.request_reset().unwrap();
        lifecycle.tick("ec-1");
        assert_eq!(lifecycle.state(), EcState::Error, "failed reset keeps Error");

        hooks.succeed.store(true, Ordering::SeqCst);
        lifecycle.request_reset().unwrap();
        lifecycle.tick("ec-1");
        assert_eq!(lifecycle.state(), EcState::Inactive);
    }
}
