use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ports::{CallbackInvocation, TaskCallback};

/// 回调注册表: 名称 <-> 回调句柄
///
/// Tasks carry callback handles; the state file carries names. The registry
/// maps between the two. Handles are compared by identity, so two closures
/// with identical bodies registered separately are different callbacks.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, Arc<dyn TaskCallback>>,
    by_handle: HashMap<usize, String>,
}

fn handle_key(callback: &Arc<dyn TaskCallback>) -> usize {
    Arc::as_ptr(callback) as *const () as usize
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`. Reusing a name replaces the previous
    /// entry.
    pub fn register<S: Into<String>>(&self, name: S, callback: Arc<dyn TaskCallback>) {
        let name = name.into();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = inner.by_name.insert(name.clone(), Arc::clone(&callback)) {
            let key = handle_key(&previous);
            if inner.by_handle.get(&key) == Some(&name) {
                inner.by_handle.remove(&key);
            }
        }
        inner.by_handle.insert(handle_key(&callback), name);
    }

    /// Wrap a plain function or closure and register it. The returned handle
    /// is what tasks should carry.
    pub fn register_fn<S, F>(&self, name: S, callback: F) -> Arc<dyn TaskCallback>
    where
        S: Into<String>,
        F: Fn(&CallbackInvocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handle: Arc<dyn TaskCallback> = Arc::new(callback);
        self.register(name, Arc::clone(&handle));
        handle
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TaskCallback>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_name.get(name).cloned()
    }

    pub fn reverse_lookup(&self, callback: &Arc<dyn TaskCallback>) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_handle.get(&handle_key(callback)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_name.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = inner.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &CallbackInvocation) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = CallbackRegistry::new();
        let handle = registry.register_fn("print_result", noop);

        let resolved = registry.resolve("print_result").unwrap();
        assert!(Arc::ptr_eq(&resolved, &handle));
        assert!(registry.resolve("missing").is_none());
        assert!(registry.contains("print_result"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reverse_lookup_uses_identity() {
        let registry = CallbackRegistry::new();
        let first = registry.register_fn("first", noop);
        let second = registry.register_fn("second", noop);

        assert_eq!(registry.reverse_lookup(&first).as_deref(), Some("first"));
        assert_eq!(registry.reverse_lookup(&second).as_deref(), Some("second"));

        // same body, never registered
        let stranger: Arc<dyn TaskCallback> = Arc::new(noop);
        assert_eq!(registry.reverse_lookup(&stranger), None);
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = CallbackRegistry::new();
        let old = registry.register_fn("on_write_done", noop);
        let new = registry.register_fn("on_write_done", |_: &CallbackInvocation| Ok(()));

        assert!(Arc::ptr_eq(&registry.resolve("on_write_done").unwrap(), &new));
        assert_eq!(registry.reverse_lookup(&old), None);
        assert_eq!(registry.reverse_lookup(&new).as_deref(), Some("on_write_done"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = CallbackRegistry::new();
        registry.register_fn("record_and_log", noop);
        registry.register_fn("log_value", noop);
        assert_eq!(registry.names(), vec!["log_value", "record_and_log"]);
        assert!(!registry.is_empty());
    }
}
