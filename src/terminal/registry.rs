//! Deduplication store for terminal connections, keyed by session name

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::session::{PendingConnection, TerminalSession};

/// Maps session names to their in-flight or completed connection.
///
/// Cloning shares the same store. Holds at most one entry per name.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<Mutex<HashMap<String, PendingConnection>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection registered under `name`, if any
    pub fn get(&self, name: &str) -> Option<PendingConnection> {
        self.entries.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Return the entry for `name`, or insert the one produced by `start`.
    ///
    /// `start` runs under the registry lock and must not touch the registry.
    pub(crate) fn claim(
        &self,
        name: &str,
        start: impl FnOnce() -> PendingConnection,
    ) -> PendingConnection {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(name) {
            debug!("Terminal {} already has a connection", name);
            return existing.clone();
        }
        let pending = start();
        entries.insert(name.to_string(), pending.clone());
        pending
    }

    /// Insert an entry, returning the one it replaced
    pub(crate) fn register(
        &self,
        name: &str,
        pending: PendingConnection,
    ) -> Option<PendingConnection> {
        self.entries.lock().insert(name.to_string(), pending)
    }

    /// Remove the entry for `name` if it belongs to `session`
    pub(crate) fn remove(&self, name: &str, session: &TerminalSession) -> bool {
        let mut entries = self.entries.lock();
        let owned = entries
            .get(name)
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry.session()), session));
        if owned {
            entries.remove(name);
            debug!("Removed terminal {} from registry", name);
        }
        owned
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::types::SessionOptions;

    fn session(registry: &SessionRegistry, name: &str) -> Arc<TerminalSession> {
        TerminalSession::new(SessionOptions::new().with_name(name), registry.clone())
    }

    #[test]
    fn test_claim_keeps_first_entry() {
        let registry = SessionRegistry::new();
        let first = session(&registry, "1");
        let second = session(&registry, "1");

        let claimed = registry.claim("1", || first.pending());
        let again = registry.claim("1", || second.pending());

        assert!(Arc::ptr_eq(claimed.session(), &first));
        assert!(Arc::ptr_eq(again.session(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_checks_ownership() {
        let registry = SessionRegistry::new();
        let owner = session(&registry, "1");
        let other = session(&registry, "1");
        registry.claim("1", || owner.pending());

        assert!(!registry.remove("1", &other));
        assert!(registry.contains("1"));
        assert!(registry.remove("1", &owner));
        assert!(registry.is_empty());
        assert!(!registry.remove("1", &owner));
    }

    #[test]
    fn test_register_replaces() {
        let registry = SessionRegistry::new();
        let stale = session(&registry, "2");
        let fresh = session(&registry, "2");

        assert!(registry.register("2", stale.pending()).is_none());
        let replaced = registry.register("2", fresh.pending()).unwrap();
        assert!(Arc::ptr_eq(replaced.session(), &stale));
        assert!(Arc::ptr_eq(registry.get("2").unwrap().session(), &fresh));
        assert_eq!(registry.names(), vec!["2".to_string()]);
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = SessionRegistry::new();
        let shared = registry.clone();
        let owner = session(&registry, "9");
        registry.claim("9", || owner.pending());

        assert!(shared.contains("9"));
        assert_eq!(shared.names(), vec!["9".to_string()]);
    }
}
