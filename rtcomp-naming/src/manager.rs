//! The Naming Manager itself: a process-wide registry of
//! external naming backends plus the bindings pushed to them. The two lists
//! are independently locked so a slow backend push never blocks a concurrent
//! bind against a different path.

use parking_lot::Mutex;
use rtcomp_core::{Result, RtcError};

use crate::backend::{NamingBackend, ObjectRef};

struct Server {
    scheme: String,
    address: String,
    backend: std::sync::Arc<dyn NamingBackend>,
}

#[derive(Clone)]
struct Binding {
    name_path: String,
    object: ObjectRef,
}

/// Best-effort fan-out over every registered backend: logs a warning per
/// failing backend and only fails the whole call if none accepted it. An
/// empty `servers` iterator has zero successes by definition, so a call with
/// no registered naming servers at all also fails here.
fn fan_out<'a>(servers: impl Iterator<Item = &'a Server>, op_name: &str, mut op: impl FnMut(&dyn NamingBackend) -> Result<()>) -> Result<()> {
    let mut succeeded = 0usize;
    for server in servers {
        match op(server.backend.as_ref()) {
            Ok(()) => succeeded += 1,
            Err(err) => {
                tracing::warn!(scheme = %server.scheme, address = %server.address, op = op_name, error = %err, "naming backend call failed");
            }
        }
    }
    if succeeded == 0 {
        return Err(RtcError::not_available(format!("{op_name} failed against every registered naming server")));
    }
    Ok(())
}

/// Wraps one or more external broker-naming services behind a single
/// bind/unbind/resolve surface.
#[derive(Default)]
pub struct NamingManager {
    servers: Mutex<Vec<Server>>,
    bindings: Mutex<Vec<Binding>>,
}

impl NamingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_name_server(&self, scheme: impl Into<String>, address: impl Into<String>, backend: std::sync::Arc<dyn NamingBackend>) {
        self.servers.lock().push(Server {
            scheme: scheme.into(),
            address: address.into(),
            backend,
        });
    }

    pub fn server_count(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Bind `obj` at `name_path` in every registered server. If the path is
    /// already bound, `force` decides whether the call silently rebinds
    /// (`force=true`) or fails with `PreconditionNotMet` (`force=false`).
    pub fn bind(&self, name_path: &str, obj: ObjectRef, force: bool) -> Result<()> {
        let mut bindings = self.bindings.lock();
        let existing = bindings.iter().position(|b| b.name_path == name_path);
        if existing.is_some() && !force {
            return Err(RtcError::precondition_not_met(format!("{name_path} is already bound")));
        }

        let servers = self.servers.lock();
        fan_out(servers.iter(), "bind", |backend| backend.bind(name_path, &obj))?;
        drop(servers);

        match existing {
            Some(index) => bindings[index].object = obj,
            None => bindings.push(Binding {
                name_path: name_path.to_string(),
                object: obj,
            }),
        }
        Ok(())
    }

    pub fn unbind(&self, name_path: &str) -> Result<()> {
        let mut bindings = self.bindings.lock();
        let index = bindings
            .iter()
            .position(|b| b.name_path == name_path)
            .ok_or_else(|| RtcError::not_available(format!("{name_path} is not bound")))?;

        let servers = self.servers.lock();
        fan_out(servers.iter(), "unbind", |backend| backend.unbind(name_path))?;
        drop(servers);

        bindings.remove(index);
        Ok(())
    }

    /// Unbind every known binding. Best-effort per path: a path whose
    /// backends all fail stays logged but the sweep continues, and the
    /// binding is dropped from local bookkeeping regardless so a caller
    /// tearing the process down never gets stuck retrying a dead server.
    pub fn unbind_all(&self) {
        let paths: Vec<String> = self.bindings.lock().iter().map(|b| b.name_path.clone()).collect();
        for path in paths {
            if let Err(err) = self.unbind(&path) {
                tracing::warn!(name_path = %path, error = %err, "unbind_all: failed to unbind, dropping locally anyway");
                self.bindings.lock().retain(|b| b.name_path != path);
            }
        }
    }

    /// Re-push every known binding to every registered server (used after a
    /// server restart).
    pub fn update(&self) -> Result<()> {
        let bindings = self.bindings.lock().clone();
        let servers = self.servers.lock();
        for binding in &bindings {
            fan_out(servers.iter(), "update", |backend| backend.bind(&binding.name_path, &binding.object))?;
        }
        Ok(())
    }

    /// Resolve a bound path against this manager's own bookkeeping (not a
    /// round trip to any backend).
    pub fn resolve(&self, name_path: &str) -> Result<ObjectRef> {
        self.bindings
            .lock()
            .iter()
            .find(|b| b.name_path == name_path)
            .map(|b| b.object.clone())
            .ok_or_else(|| RtcError::not_available(format!("{name_path} is not bound")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use std::sync::Arc;

    fn manager_with_one_backend() -> NamingManager {
        let manager = NamingManager::new();
        manager.register_name_server("mem", "local", Arc::new(InMemoryBackend::new()));
        manager
    }

    #[test]
    fn bind_then_resolve() {
        let manager = manager_with_one_backend();
        manager.bind("a/b/c", ObjectRef::new("comp-1"), false).unwrap();
        assert_eq!(manager.resolve("a/b/c").unwrap(), ObjectRef::new("comp-1"));
    }

    #[test]
    fn rebind_without_force_is_rejected_but_with_force_replaces_the_binding() {
        let manager = manager_with_one_backend();
        manager.bind("a/b/c", ObjectRef::new("comp-1"), false).unwrap();
        manager.unbind("a/b/c").unwrap();
        manager.bind("a/b/c", ObjectRef::new("comp-1"), false).unwrap();
        assert_eq!(manager.resolve("a/b/c").unwrap(), ObjectRef::new("comp-1"));

        manager.bind("a/b/c", ObjectRef::new("comp-2"), true).unwrap();
        assert_eq!(manager.resolve("a/b/c").unwrap(), ObjectRef::new("comp-2"));

        let err = manager.bind("a/b/c", ObjectRef::new("comp-3"), false).unwrap_err();
        assert_eq!(err.code(), rtcomp_core::ReturnCode::PreconditionNotMet);
        assert_eq!(manager.resolve("a/b/c").unwrap(), ObjectRef::new("comp-2"));
    }

    #[test]
    fn unbind_unknown_path_is_not_available() {
        let manager = manager_with_one_backend();
        assert_eq!(manager.unbind("ghost").unwrap_err().code(), rtcomp_core::ReturnCode::NotAvailable);
    }

    #[test]
    fn unbind_all_clears_every_binding() {
        let manager = manager_with_one_backend();
        manager.bind("a", ObjectRef::new("1"), false).unwrap();
        manager.bind("b", ObjectRef::new("2"), false).unwrap();
        manager.unbind_all();
        assert_eq!(manager.binding_count(), 0);
    }

    #[test]
    fn bind_with_no_registered_servers_fails() {
        let manager = NamingManager::new();
        let err = manager.bind("a", ObjectRef::new("1"), false).unwrap_err();
        assert_eq!(err.code(), rtcomp_core::ReturnCode::NotAvailable);
    }

    #[test]
    fn update_republishes_every_binding() {
        let manager = manager_with_one_backend();
        manager.bind("a/b", ObjectRef::new("comp"), false).unwrap();
        manager.update().unwrap();
        assert_eq!(manager.resolve("a/b").unwrap(), ObjectRef::new("comp"));
    }
}
