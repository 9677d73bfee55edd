//! The pluggable half of the Naming Manager: a `NamingBackend` talks to one
//! concrete broker-naming service. `InMemoryBackend` is the default used when nothing else is
//! registered, and doubles as the one exercised in tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rtcomp_core::{Result, RtcError};

/// An opaque handle to whatever a bound component resolves to. The Naming
/// Manager never inspects this — it only stores and republishes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One external naming service. A `name_path` such as `a/b/c` addresses a
/// hierarchy of contexts; a backend is responsible for creating any missing
/// intermediate context on `bind`.
pub trait NamingBackend: Send + Sync {
    fn bind(&self, name_path: &str, obj: &ObjectRef) -> Result<()>;
    fn unbind(&self, name_path: &str) -> Result<()>;
    fn resolve(&self, name_path: &str) -> Result<ObjectRef>;
}

/// A naming service backed by an in-process tree, used as the default
/// backend and in tests. Every `bind` silently creates intermediate
/// contexts; there is no separate "create context" step to fail on.
#[derive(Default)]
pub struct InMemoryBackend {
    bindings: Mutex<BTreeMap<String, ObjectRef>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NamingBackend for InMemoryBackend {
    fn bind(&self, name_path: &str, obj: &ObjectRef) -> Result<()> {
        self.bindings.lock().insert(name_path.to_string(), obj.clone());
        Ok(())
    }

    fn unbind(&self, name_path: &str) -> Result<()> {
        self.bindings
            .lock()
            .remove(name_path)
            .map(|_| ())
            .ok_or_else(|| RtcError::not_available(format!("no binding at {name_path}")))
    }

    fn resolve(&self, name_path: &str) -> Result<ObjectRef> {
        self.bindings
            .lock()
            .get(name_path)
            .cloned()
            .ok_or_else(|| RtcError::not_available(format!("no binding at {name_path}")))
    }
}
