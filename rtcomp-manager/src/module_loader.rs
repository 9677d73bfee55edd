//! Dynamic module loading: load a file from a search path,
//! call its `<ModuleName>Init` symbol with a reference to the Manager, and
//! track what it registered so `unload` can refuse while instances survive.
//!
//! The init symbol takes a `-> i32` return (`0` success) rather than no
//! return value at all, so an init failure is representable as a status
//! code instead of a panic or exception crossing the FFI boundary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rtcomp_core::RtcError;

use crate::manager::Manager;

#[derive(Debug, thiserror::Error)]
pub enum ModuleLoaderError {
    #[error("module file not found at {path}: {source}")]
    FileNotFound { path: String, source: libloading::Error },
    #[error("module {module_name} is already loaded")]
    AlreadyLoaded { module_name: String },
    #[error("module {module_name} is not loaded")]
    NotLoaded { module_name: String },
    #[error("symbol {symbol} not found in module")]
    SymbolMissing { symbol: String },
    #[error("module init function returned non-zero status {status}")]
    InitFailed { status: i32 },
    #[error("module {module_name} still has {live} live instance(s); unload refused")]
    InstancesStillAlive { module_name: String, live: usize },
}

impl From<ModuleLoaderError> for RtcError {
    fn from(err: ModuleLoaderError) -> Self {
        match &err {
            ModuleLoaderError::FileNotFound { .. } | ModuleLoaderError::SymbolMissing { .. } => {
                RtcError::not_available(err.to_string())
            }
            ModuleLoaderError::AlreadyLoaded { .. } | ModuleLoaderError::InstancesStillAlive { .. } => {
                RtcError::precondition_not_met(err.to_string())
            }
            ModuleLoaderError::NotLoaded { .. } => RtcError::not_available(err.to_string()),
            ModuleLoaderError::InitFailed { .. } => RtcError::internal(err.to_string()),
        }
    }
}

/// A module's exported init function: C linkage, takes a raw pointer to the
/// Manager it should register factories against, returns `0` on success.
pub type ModuleInitFn = unsafe extern "C" fn(*mut Manager) -> i32;

struct LoadedModule {
    _library: libloading::Library,
    type_names: Vec<String>,
}

/// Tracks every module currently loaded into this process, keyed by module
/// name, so `unload` can be refused while any of its factories still have
/// live instances.
#[derive(Default)]
pub struct ModuleLoader {
    search_path: Vec<PathBuf>,
    loaded: DashMap<String, LoadedModule>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `manager.modules.load_path` is colon-separated.
    pub fn with_search_path(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_path: paths.into_iter().collect(),
            loaded: DashMap::new(),
        }
    }

    pub fn is_loaded(&self, module_name: &str) -> bool {
        self.loaded.contains_key(module_name)
    }

    fn resolve(&self, module_name: &str) -> PathBuf {
        let file_name = libloading::library_filename(module_name);
        for dir in &self.search_path {
            let candidate = dir.join(&file_name);
            if candidate.exists() {
                return candidate;
            }
        }
        PathBuf::from(file_name)
    }

    /// Load `module_name` from the configured search path and invoke
    /// `<module_name>Init(manager)`. Any factories registered during the
    /// call become attributable to this module for `unload`'s purposes.
    pub fn load(&self, manager: &Arc<Manager>, module_name: &str) -> Result<(), RtcError> {
        if self.loaded.contains_key(module_name) {
            return Err(ModuleLoaderError::AlreadyLoaded {
                module_name: module_name.to_string(),
            }
            .into());
        }

        let path = self.resolve(module_name);
        let library = unsafe { libloading::Library::new(&path) }.map_err(|source| ModuleLoaderError::FileNotFound {
            path: path.display().to_string(),
            source,
        })?;

        let symbol_name = format!("{module_name}Init");
        let init: libloading::Symbol<ModuleInitFn> = unsafe { library.get(symbol_name.as_bytes()) }
            .map_err(|_| ModuleLoaderError::SymbolMissing { symbol: symbol_name.clone() })?;

        let before: HashSet<String> = manager.factories().type_names().into_iter().collect();
        let status = unsafe { init(Arc::as_ptr(manager) as *mut Manager) };
        if status != 0 {
            return Err(ModuleLoaderError::InitFailed { status }.into());
        }
        let after: HashSet<String> = manager.factories().type_names().into_iter().collect();
        let type_names: Vec<String> = after.difference(&before).cloned().collect();

        self.loaded.insert(module_name.to_string(), LoadedModule { _library: library, type_names });
        Ok(())
    }

    /// Best-effort: refused if any factory this module registered still has
    /// a live instance.
    pub fn unload(&self, manager: &Arc<Manager>, module_name: &str) -> Result<(), RtcError> {
        let entry = self
            .loaded
            .get(module_name)
            .ok_or_else(|| ModuleLoaderError::NotLoaded {
                module_name: module_name.to_string(),
            })?;

        let live: usize = entry.type_names.iter().map(|t| manager.factories().live_count(t)).sum();
        if live > 0 {
            return Err(ModuleLoaderError::InstancesStillAlive {
                module_name: module_name.to_string(),
                live,
            }
            .into());
        }

        for type_name in &entry.type_names {
            manager.factories().unregister(type_name);
        }
        drop(entry);
        self.loaded.remove(module_name);
        Ok(())
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        self.loaded.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_the_bare_platform_file_name_outside_any_search_dir() {
        let loader = ModuleLoader::new();
        let resolved = loader.resolve("Echo");
        assert_eq!(resolved, PathBuf::from(libloading::library_filename("Echo")));
    }

    #[test]
    fn unload_unknown_module_is_not_available() {
        let loader = ModuleLoader::new();
        let manager = Manager::new_for_test();
        assert!(loader.unload(&manager, "Ghost").is_err());
    }
}
