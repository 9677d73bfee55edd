//! End-to-end: shutting down the Manager while components are actively
//! ticking on the default execution context.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rtcomp_manager::{Component, FactoryRecord, Manager, NumberingPolicy, Profile};
use rtcomp_runtime::RtcHooks;

struct TrackingHooks {
    executes: AtomicUsize,
    deactivated: AtomicBool,
    finalized: AtomicBool,
    deactivated_before_finalized: AtomicBool,
}

impl Default for TrackingHooks {
    fn default() -> Self {
        Self {
            executes: AtomicUsize::new(0),
            deactivated: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            deactivated_before_finalized: AtomicBool::new(false),
        }
    }
}

impl RtcHooks for TrackingHooks {
    fn on_execute(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn on_deactivated(&self, _ec_id: &str) -> rtcomp_core::Result<()> {
        self.deactivated.store(true, Ordering::SeqCst);
        Ok(())
    }
    fn on_finalize(&self) -> rtcomp_core::Result<()> {
        self.finalized.store(true, Ordering::SeqCst);
        if self.deactivated.load(Ordering::SeqCst) {
            self.deactivated_before_finalized.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct TrackedComponent {
    name: String,
    hooks: Arc<TrackingHooks>,
}

impl Component for TrackedComponent {
    fn instance_name(&self) -> &str {
        &self.name
    }
    fn hooks(&self) -> Arc<dyn RtcHooks> {
        self.hooks.clone()
    }
}

struct PassthroughNumbering(AtomicUsize);
impl NumberingPolicy for PassthroughNumbering {
    fn acquire(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) as u32
    }
    fn release(&self, _n: u32) {}
}

#[test]
fn shutdown_deactivates_then_finalizes_every_live_component() {
    let manager = Manager::new_for_test();

    let tracked: Arc<Vec<Arc<TrackingHooks>>> = Arc::new((0..3).map(|_| Arc::new(TrackingHooks::default())).collect());
    let tracked_for_factory = tracked.clone();

    manager.factories().register(FactoryRecord::new(
        Profile {
            type_name: "Worker".into(),
            version: "1.0.0".into(),
            vendor: "Acme".into(),
            category: "example".into(),
        },
        Arc::new(move |name| {
            let index: usize = name.trim_start_matches("Worker").parse().unwrap_or(0);
            Arc::new(TrackedComponent {
                name: name.to_string(),
                hooks: tracked_for_factory[index].clone(),
            }) as Arc<dyn Component>
        }),
        Arc::new(|_| {}),
        Arc::new(PassthroughNumbering(AtomicUsize::new(0))),
    ));

    let mut names = Vec::new();
    for _ in 0..3 {
        let component = manager.create_component("Worker").unwrap();
        names.push(component.instance_name().to_string());
    }

    let ec = manager.default_execution_context().unwrap();
    ec.start();
    for name in &names {
        ec.activate_component(name).unwrap();
    }

    assert_eq!(manager.naming().binding_count(), 3);

    let shutdown_manager = manager.clone();
    let shutdown_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        shutdown_manager.shutdown();
    });

    shutdown_thread.join().unwrap();

    for hooks in tracked.iter() {
        assert!(hooks.executes.load(Ordering::SeqCst) > 0, "component should have run before shutdown");
        assert!(hooks.deactivated.load(Ordering::SeqCst), "every Active component must be deactivated on shutdown");
        assert!(hooks.finalized.load(Ordering::SeqCst), "every component must be finalized on shutdown");
        assert!(hooks.deactivated_before_finalized.load(Ordering::SeqCst), "deactivate must happen before finalize");
    }

    assert_eq!(manager.naming().binding_count(), 0, "shutdown must unbind every naming entry");
    assert!(manager.default_execution_context().is_none(), "shutdown must tear down the default execution context");

    manager.shutdown(); // idempotence: a second call from the test's own thread must not hang
}
