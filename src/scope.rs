//! Scope stores
//!
//! A scope store caches live instances by [`InstanceKey`] for the lifetime its
//! strategy defines: the registry (application), the worker thread, or the
//! session bound to the calling thread. `Local` scope has no store at all.

use crate::binding::Scope;
use crate::{Instance, IocError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Stable key of one cached instance slot.
///
/// The default key is the descriptor id (`#7`), or the binding's explicit name
/// (`n:cube`). An explicit name passed at retrieval is combined with the
/// descriptor id (`7:blue`) so names given for different contracts never share a
/// slot. The three forms never overlap, whatever the names contain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey(Arc<str>);

impl InstanceKey {
    /// Key derived from a descriptor id
    #[inline]
    pub fn for_descriptor(id: u64) -> Self {
        Self(Arc::from(format!("#{id}")))
    }

    /// Key from a binding name
    #[inline]
    pub fn named(name: &str) -> Self {
        Self(Arc::from(format!("n:{name}")))
    }

    /// Slot for an explicit retrieval name under this descriptor
    pub fn qualified(id: u64, name: &str) -> Self {
        Self(Arc::from(format!("{id}:{name}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-scope cache of live instances.
///
/// Stores are internally synchronized; the registry additionally serializes
/// lookup-or-create so one key is constructed at most once.
pub trait ScopeFactory: Send + Sync {
    fn scope(&self) -> Scope;

    fn get(&self, key: &InstanceKey) -> Result<Option<Instance>>;

    /// Persist `instance` unless the slot is taken; returns the instance that owns the slot
    fn put(&self, key: InstanceKey, instance: Instance) -> Result<Instance>;

    /// Drop every cached instance
    fn clear(&self);

    /// Drop the instances of one context (e.g. a session); no-op by default
    fn end_context(&self, _context: &str) {}
}

// =============================================================================
// Application
// =============================================================================

/// One instance per key for the whole registry, visible to every thread
pub struct ApplicationScopeFactory {
    instances: DashMap<InstanceKey, Instance, RandomState>,
}

impl ApplicationScopeFactory {
    pub fn new() -> Self {
        Self {
            instances: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for ApplicationScopeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeFactory for ApplicationScopeFactory {
    fn scope(&self) -> Scope {
        Scope::Application
    }

    #[inline]
    fn get(&self, key: &InstanceKey) -> Result<Option<Instance>> {
        Ok(self.instances.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: InstanceKey, instance: Instance) -> Result<Instance> {
        Ok(self.instances.entry(key).or_insert(instance).value().clone())
    }

    fn clear(&self) {
        self.instances.clear();
    }
}

// =============================================================================
// Thread
// =============================================================================

thread_local! {
    /// Thread-scoped instances of every store, keyed by (store id, generation, key)
    static THREAD_INSTANCES: RefCell<HashMap<(u64, u64, InstanceKey), Instance, RandomState>> =
        RefCell::new(HashMap::with_hasher(RandomState::new()));
}

/// One instance per key and worker thread.
///
/// Each thread starts with an empty view; nothing is inherited by spawned threads.
pub struct ThreadScopeFactory {
    id: u64,
    generation: AtomicU64,
}

impl ThreadScopeFactory {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    fn slot(&self, key: InstanceKey) -> (u64, u64, InstanceKey) {
        (self.id, self.generation.load(Ordering::Acquire), key)
    }
}

impl Default for ThreadScopeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeFactory for ThreadScopeFactory {
    fn scope(&self) -> Scope {
        Scope::Thread
    }

    fn get(&self, key: &InstanceKey) -> Result<Option<Instance>> {
        let slot = self.slot(key.clone());
        Ok(THREAD_INSTANCES.with(|map| map.borrow().get(&slot).cloned()))
    }

    fn put(&self, key: InstanceKey, instance: Instance) -> Result<Instance> {
        let slot = self.slot(key);
        Ok(THREAD_INSTANCES.with(|map| map.borrow_mut().entry(slot).or_insert(instance).clone()))
    }

    /// Invalidates every thread's view; the calling thread's entries are dropped now,
    /// other threads release theirs when they exit
    fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let id = self.id;
        // try_with: the thread-local may already be gone during thread teardown
        let _ = THREAD_INSTANCES.try_with(|map| map.borrow_mut().retain(|(store, _, _), _| *store != id));

        #[cfg(feature = "logging")]
        debug!(target: "ioc_runtime", store = id, "Thread scope cleared");
    }
}

// =============================================================================
// Session
// =============================================================================

thread_local! {
    static CURRENT_SESSION: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
}

/// Binds a session to the calling thread until dropped.
///
/// # Examples
///
/// ```rust
/// use ioc_runtime::scope::{current_session, enter_session};
///
/// {
///     let _session = enter_session("user-42");
///     assert_eq!(current_session().as_deref(), Some("user-42"));
/// }
/// assert!(current_session().is_none());
/// ```
#[must_use = "the session is unbound when the guard is dropped"]
pub struct SessionGuard {
    previous: Option<Arc<str>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_SESSION.with(|current| *current.borrow_mut() = previous);
    }
}

/// Make `session` the current session of this thread
pub fn enter_session(session: impl Into<Arc<str>>) -> SessionGuard {
    let session = session.into();

    #[cfg(feature = "logging")]
    trace!(target: "ioc_runtime", session = %session, "Entering session");

    let previous = CURRENT_SESSION.with(|current| current.borrow_mut().replace(session));
    SessionGuard { previous }
}

/// Session bound to this thread, if any
pub fn current_session() -> Option<Arc<str>> {
    CURRENT_SESSION.with(|current| current.borrow().clone())
}

type SessionMap = Arc<DashMap<InstanceKey, Instance, RandomState>>;

/// One instance per key and session
pub struct SessionScopeFactory {
    sessions: DashMap<Arc<str>, SessionMap, RandomState>,
}

impl SessionScopeFactory {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::with_hasher(RandomState::new()),
        }
    }

    fn current(&self) -> Result<Arc<str>> {
        current_session().ok_or(IocError::InactiveScope { scope: "session" })
    }

    fn session_map(&self, session: Arc<str>) -> SessionMap {
        Arc::clone(self.sessions.entry(session).or_default().value())
    }

    /// Number of sessions holding instances
    #[inline]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionScopeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeFactory for SessionScopeFactory {
    fn scope(&self) -> Scope {
        Scope::Session
    }

    fn get(&self, key: &InstanceKey) -> Result<Option<Instance>> {
        let session = self.current()?;
        Ok(self
            .sessions
            .get(&session)
            .and_then(|map| map.get(key).map(|entry| entry.value().clone())))
    }

    fn put(&self, key: InstanceKey, instance: Instance) -> Result<Instance> {
        let map = self.session_map(self.current()?);
        let winner = map.entry(key).or_insert(instance).value().clone();
        Ok(winner)
    }

    fn clear(&self) {
        self.sessions.clear();
    }

    fn end_context(&self, session: &str) {
        let removed = self.sessions.remove(session);

        #[cfg(feature = "logging")]
        debug!(
            target: "ioc_runtime",
            session = session,
            instances = removed.as_ref().map_or(0, |(_, map)| map.len()),
            "Session ended"
        );

        drop(removed);
    }
}
