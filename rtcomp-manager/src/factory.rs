//! Component factories: `(profile, create_fn, destroy_fn,
//! policy, count)`. `create` asks the policy for an instance number, composes
//! `instance_name = type_name + number`, and hands back a live component;
//! `destroy` releases the number.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rtcomp_core::{Result, RtcError};
use rtcomp_runtime::RtcHooks;

use crate::numbering::NumberingPolicy;

/// The identifying metadata carried alongside every component instance.
#[derive(Debug, Clone)]
pub struct Profile {
    pub type_name: String,
    pub version: String,
    pub vendor: String,
    pub category: String,
}

/// A live component instance: enough to drive its lifecycle and identify it
/// in logs, naming, and the Manager's registry.
pub trait Component: Send + Sync {
    fn instance_name(&self) -> &str;
    fn hooks(&self) -> Arc<dyn RtcHooks>;
}

pub type CreateFn = dyn Fn(&str) -> Arc<dyn Component> + Send + Sync;
pub type DestroyFn = dyn Fn(&Arc<dyn Component>) + Send + Sync;

/// One registered component type: its profile, its constructor/destructor
/// pair, and the numbering policy that names its instances.
pub struct FactoryRecord {
    profile: Profile,
    create_fn: Arc<CreateFn>,
    destroy_fn: Arc<DestroyFn>,
    policy: Arc<dyn NumberingPolicy>,
    count: AtomicUsize,
}

impl FactoryRecord {
    pub fn new(profile: Profile, create_fn: Arc<CreateFn>, destroy_fn: Arc<DestroyFn>, policy: Arc<dyn NumberingPolicy>) -> Self {
        Self {
            profile,
            create_fn,
            destroy_fn,
            policy,
            count: AtomicUsize::new(0),
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn live_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Instantiate a new component. Returns the component plus the instance
    /// number the caller must pass back to [`Self::destroy`].
    pub fn create(&self) -> (Arc<dyn Component>, u32) {
        let number = self.policy.acquire();
        let instance_name = format!("{}{number}", self.profile.type_name);
        let component = (self.create_fn)(&instance_name);
        self.count.fetch_add(1, Ordering::SeqCst);
        (component, number)
    }

    pub fn destroy(&self, component: &Arc<dyn Component>, number: u32) {
        (self.destroy_fn)(component);
        self.policy.release(number);
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The process-wide table of registered component types, keyed by
/// `type_name`.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: DashMap<String, FactoryRecord>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record: FactoryRecord) {
        self.factories.insert(record.profile.type_name.clone(), record);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn create(&self, type_name: &str) -> Result<(Arc<dyn Component>, u32)> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            tracing::warn!(type_name, "no factory registered for type_name");
            RtcError::not_available(format!("no factory registered for {type_name}"))
        })?;
        Ok(factory.create())
    }

    pub fn destroy(&self, type_name: &str, component: &Arc<dyn Component>, number: u32) -> Result<()> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| RtcError::not_available(format!("no factory registered for {type_name}")))?;
        factory.destroy(component, number);
        Ok(())
    }

    pub fn type_names(&self) -> Vec<String> {
        self.factories.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn live_count(&self, type_name: &str) -> usize {
        self.factories.get(type_name).map(|f| f.live_count()).unwrap_or(0)
    }

    /// Drop a registered type entirely. Callers (the module loader) must
    /// confirm no instances are alive first.
    pub fn unregister(&self, type_name: &str) {
        self.factories.remove(type_name);
    }
}
