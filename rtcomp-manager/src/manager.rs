//! The Manager: process-wide singleton orchestration.
//!
//! The singleton itself is an explicit `Arc<Manager>` behind a `OnceLock`,
//! guarded by a process-wide mutex for double-checked init, rather than a
//! bare mutable global.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rtcomp_core::{Result, RtcError};
use rtcomp_naming::{NamingManager, ObjectRef};
use rtcomp_runtime::{EcState, PeriodicExecutionContext};

use crate::config_file::ManagerConfig;
use crate::factory::{Component, FactoryRegistry};
use crate::module_loader::ModuleLoader;

struct LiveComponent {
    type_name: String,
    component: Arc<dyn Component>,
    number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    ShuttingDown,
    Done,
}

static SINGLETON: OnceLock<Arc<Manager>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Process-wide orchestrator: owns the factory registry, the module loader,
/// the naming manager, the default execution context, and the set of live
/// components.
pub struct Manager {
    factories: FactoryRegistry,
    naming: NamingManager,
    module_loader: ModuleLoader,
    components: Mutex<Vec<LiveComponent>>,
    default_ec: Mutex<Option<Arc<PeriodicExecutionContext>>>,
    shutdown_state: Mutex<ShutdownState>,
    shutdown_done: Condvar,
}

impl Manager {
    fn build(config: &ManagerConfig) -> Result<Self> {
        let naming = NamingManager::new();
        for scheme in &config.naming_schemes {
            naming.register_name_server(scheme.clone(), "local", Arc::new(rtcomp_naming::InMemoryBackend::new()));
        }

        let default_ec = PeriodicExecutionContext::new(config.exec_context_rate_hz)?;

        Ok(Self {
            factories: FactoryRegistry::new(),
            naming,
            module_loader: ModuleLoader::with_search_path(config.module_load_path.clone()),
            components: Mutex::new(Vec::new()),
            default_ec: Mutex::new(Some(default_ec)),
            shutdown_state: Mutex::new(ShutdownState::Running),
            shutdown_done: Condvar::new(),
        })
    }

    /// Double-checked singleton init. `argv` is parsed into a config path by
    /// `rtcomp_manager::config_file`; `<MANAGER>_CONFIG` overrides it.
    pub fn init(argv: &[String]) -> Result<Arc<Manager>> {
        if let Some(existing) = SINGLETON.get() {
            return Ok(existing.clone());
        }
        let _guard = INIT_LOCK.lock();
        if let Some(existing) = SINGLETON.get() {
            return Ok(existing.clone());
        }

        let config = crate::config_file::load_config(argv)?;
        crate::config_file::install_logging(&config);

        let manager = Arc::new(Self::build(&config)?);
        for module_name in &config.preload_modules {
            manager.module_loader.load(&manager, module_name)?;
        }

        SINGLETON
            .set(manager.clone())
            .map_err(|_| RtcError::internal("Manager::init raced with a concurrent init"))?;
        Ok(manager)
    }

    /// Build a standalone Manager outside the process singleton, for tests
    /// that exercise the module loader / factory registry in isolation.
    #[doc(hidden)]
    pub fn new_for_test() -> Arc<Manager> {
        Arc::new(Self::build(&ManagerConfig::default()).expect("default config is always valid"))
    }

    pub fn instance() -> Option<Arc<Manager>> {
        SINGLETON.get().cloned()
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn naming(&self) -> &NamingManager {
        &self.naming
    }

    pub fn module_loader(&self) -> &ModuleLoader {
        &self.module_loader
    }

    pub fn default_execution_context(&self) -> Option<Arc<PeriodicExecutionContext>> {
        self.default_ec.lock().clone()
    }

    /// Publish the Manager's own reference and run the caller-provided init
    /// procedure.
    pub fn activate(self: &Arc<Self>, user_init: impl FnOnce(&Arc<Manager>) -> Result<()>) -> Result<()> {
        self.naming.bind("Manager", ObjectRef::new("manager"), true)?;
        if let Some(ec) = self.default_execution_context() {
            ec.start();
        }
        user_init(self)
    }

    /// Enter the (stand-in) broker event loop. `block=false` spawns a worker
    /// thread and returns immediately; `block=true` parks the caller until
    /// `shutdown` completes.
    pub fn run(self: &Arc<Self>, block: bool) -> Result<()> {
        if !block {
            let manager = Arc::clone(self);
            thread::spawn(move || {
                let _ = manager.run(true);
            });
            return Ok(());
        }
        let mut state = self.shutdown_state.lock();
        while !matches!(*state, ShutdownState::Done) {
            self.shutdown_done.wait(&mut state);
        }
        Ok(())
    }

    /// Resolve `type_name` against the factory registry, instantiate,
    /// attach it to the default execution context, and bind it in the
    /// naming manager.
    pub fn create_component(self: &Arc<Self>, type_name: &str) -> Result<Arc<dyn Component>> {
        let (component, number) = self.factories.create(type_name)?;

        if let Some(ec) = self.default_execution_context() {
            ec.add_participant(component.instance_name().to_string(), component.hooks());
        }
        self.naming.bind(component.instance_name(), ObjectRef::new(component.instance_name()), true)?;

        self.components.lock().push(LiveComponent {
            type_name: type_name.to_string(),
            component: component.clone(),
            number,
        });
        Ok(component)
    }

    /// Idempotent and safe to call re-entrantly from any thread: a
    /// dedicated thread performs the actual teardown so a caller already
    /// running on, say, the default EC's own worker thread never joins
    /// itself. Every caller blocks until that thread reaches `Done`.
    pub fn shutdown(self: &Arc<Self>) {
        {
            let mut state = self.shutdown_state.lock();
            if *state == ShutdownState::Running {
                *state = ShutdownState::ShuttingDown;
                let manager = Arc::clone(self);
                thread::spawn(move || manager.run_teardown());
            }
        }

        let mut state = self.shutdown_state.lock();
        while *state != ShutdownState::Done {
            self.shutdown_done.wait(&mut state);
        }
    }

    fn run_teardown(self: Arc<Self>) {
        if let Some(ec) = self.default_execution_context() {
            let names: Vec<String> = self.components.lock().iter().map(|c| c.component.instance_name().to_string()).collect();
            for name in &names {
                // Only an Active component can be asked to deactivate; a
                // component already Inactive or Error is left as-is.
                let _ = ec.deactivate_component(name);
            }

            let deadline = Instant::now() + Duration::from_secs(1);
            while Instant::now() < deadline {
                let all_settled = names.iter().all(|name| ec.participant_state(name) != Some(EcState::Active));
                if all_settled {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        self.naming.unbind_all();

        for live in self.components.lock().drain(..) {
            if let Err(err) = live.component.hooks().on_finalize() {
                tracing::warn!(component = %live.component.instance_name(), error = %err, "on_finalize hook failed during shutdown");
            }
            if let Err(err) = self.factories.destroy(&live.type_name, &live.component, live.number) {
                tracing::warn!(component = %live.component.instance_name(), error = %err, "factory destroy failed during shutdown");
            }
        }

        if let Some(ec) = self.default_ec.lock().take() {
            ec.destroy();
        }

        let mut state = self.shutdown_state.lock();
        *state = ShutdownState::Done;
        self.shutdown_done.notify_all();
    }
}
