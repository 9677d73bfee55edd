//! End-to-end scenarios against a real worker thread: happy-path tick,
//! error isolation, and a live rate change.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rtcomp_runtime::{PeriodicExecutionContext, RtcHooks};

#[derive(Default)]
struct Trace(Mutex<Vec<&'static str>>);

impl Trace {
    fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }
    fn events(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

struct EchoHooks {
    trace: Arc<Trace>,
    executes: AtomicUsize,
}

impl RtcHooks for EchoHooks {
    fn on_startup(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.trace.push("on_startup");
        Ok(())
    }
    fn on_activated(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.trace.push("on_activated");
        Ok(())
    }
    fn on_execute(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn on_deactivated(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.trace.push("on_deactivated");
        Ok(())
    }
    fn on_shutdown(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.trace.push("on_shutdown");
        Ok(())
    }
}

#[test]
fn happy_path_tick_fires_the_full_hook_sequence() {
    let trace = Arc::new(Trace::default());
    trace.push("on_initialize"); // called by the component's owner before attach, not the EC
    let hooks = Arc::new(EchoHooks {
        trace: trace.clone(),
        executes: AtomicUsize::new(0),
    });

    let ec = PeriodicExecutionContext::new(100.0).unwrap();
    ec.add_participant("echo", hooks.clone());
    ec.start();
    ec.activate_component("echo").unwrap();

    thread::sleep(Duration::from_millis(500));

    ec.deactivate_component("echo").unwrap();
    thread::sleep(Duration::from_millis(20));
    ec.stop();

    let count = hooks.executes.load(Ordering::SeqCst);
    assert!((45..=55).contains(&count), "expected ~50 executes, got {count}");

    let events = trace.events();
    assert_eq!(events.first(), Some(&"on_initialize"));
    assert!(events.contains(&"on_startup"));
    assert!(events.contains(&"on_activated"));
    assert!(events.contains(&"on_deactivated"));
    assert_eq!(events.last(), Some(&"on_shutdown"));
}

struct FlakyHooks {
    executes: AtomicUsize,
    fail_at: usize,
    aborted: AtomicUsize,
    errors: AtomicUsize,
}

impl RtcHooks for FlakyHooks {
    fn on_execute(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        let n = self.executes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at {
            return Err(rtcomp_core::RtcError::internal("injected failure"));
        }
        Ok(())
    }
    fn on_aborting(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn on_error(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.errors.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct PlainCounter(AtomicUsize);
impl RtcHooks for PlainCounter {
    fn on_execute(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn a_failing_component_does_not_affect_its_sibling() {
    let a = Arc::new(FlakyHooks {
        executes: AtomicUsize::new(0),
        fail_at: 5,
        aborted: AtomicUsize::new(0),
        errors: AtomicUsize::new(0),
    });
    let b = Arc::new(PlainCounter(AtomicUsize::new(0)));

    let ec = PeriodicExecutionContext::new(50.0).unwrap();
    ec.add_participant("a", a.clone());
    ec.add_participant("b", b.clone());
    ec.start();
    ec.activate_component("a").unwrap();
    ec.activate_component("b").unwrap();

    thread::sleep(Duration::from_millis(400));
    ec.stop();

    assert_eq!(a.aborted.load(Ordering::SeqCst), 1);
    assert!(a.errors.load(Ordering::SeqCst) > 0, "a should keep receiving on_error once in Error");
    assert!(b.0.load(Ordering::SeqCst) > 5, "b should be unaffected by a's failure");
}

#[test]
fn set_rate_takes_effect_on_a_live_execution_context() {
    let hooks = Arc::new(PlainCounter(AtomicUsize::new(0)));
    let ec = PeriodicExecutionContext::new(10.0).unwrap();
    ec.add_participant("comp", hooks.clone());
    ec.start();
    ec.activate_component("comp").unwrap();

    thread::sleep(Duration::from_millis(500));
    let before = hooks.0.load(Ordering::SeqCst);

    ec.set_rate(50.0).unwrap();
    thread::sleep(Duration::from_millis(400));
    ec.stop();

    let after = hooks.0.load(Ordering::SeqCst);
    assert!(before <= 8, "should be ~5 executes at 10Hz before the change, got {before}");
    assert!(after - before > 10, "should speed up sharply after set_rate(50), got {}", after - before);
    assert_eq!(ec.rate_hz(), 50.0);
}
