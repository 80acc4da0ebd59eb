//! Dependency lifecycle scopes.
//!
//! A scope decides how long a value built by a factory is reused:
//! - [`Singleton`]: one value for every thread and task
//! - [`ThreadLocal`]: one value per OS thread
//! - [`ContextLocal`]: one value per execution [`Context`](crate::context::Context),
//!   inherited by contexts forked from it
//! - [`NoScope`]: never reused, the factory runs on every lookup
//!
//! Containers create one scope instance per [`ScopeKind`], so two containers
//! never see each other's cached values.

use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use sanduq_support::rendering::short_type_name;
use tracing::debug;

use crate::context::{self, next_owner_id};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::value::Value;

/// Storage for values in "the current execution context".
///
/// `get` must fail with [`Error::MissingKey`] when nothing is bound to the
/// key in the caller's context; containers rely on that to decide when to
/// run a factory. Any other error is passed on to the caller.
///
/// # Examples
/// ```
/// use sanduq_container::scope::{Scope, Singleton};
/// use sanduq_container::{Key, Value};
///
/// let scope = Singleton::default();
/// let key = Key::from("answer");
/// assert!(scope.get(&key).is_err());
///
/// scope.set(&key, Value::new(42));
/// assert_eq!(scope.get(&key).unwrap().downcast_ref::<i32>(), Some(&42));
/// ```
pub trait Scope: Send + Sync + 'static {
    /// Binds `value` to `key` in the current context.
    fn set(&self, key: &Key, value: Value);

    /// Returns the value bound to `key` in the current context.
    fn get(&self, key: &Key) -> Result<Value>;
}

/// A kind of scope, passed to `put` to choose how a factory's values are
/// reused.
#[derive(Clone, Copy)]
pub struct ScopeKind {
    id: TypeId,
    name: &'static str,
    make: fn() -> Arc<dyn Scope>,
}

impl ScopeKind {
    /// The kind of scope `S`.
    pub fn of<S: Scope + Default>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: type_name::<S>(),
            make: instantiate::<S>,
        }
    }

    /// Creates a fresh, empty instance of this kind.
    pub fn instantiate(&self) -> Arc<dyn Scope> {
        (self.make)()
    }

    pub(crate) fn id(&self) -> TypeId {
        self.id
    }

    /// Short name of the scope type.
    pub fn name(&self) -> String {
        short_type_name(self.name)
    }
}

fn instantiate<S: Scope + Default>() -> Arc<dyn Scope> {
    Arc::new(S::default())
}

impl PartialEq for ScopeKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScopeKind {}

impl fmt::Debug for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKind({})", self.name())
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ── Singleton ──

/// One value per key, shared by every thread and task.
#[derive(Default)]
pub struct Singleton {
    store: DashMap<Key, Value>,
}

impl Scope for Singleton {
    fn set(&self, key: &Key, value: Value) {
        self.store.insert(key.clone(), value);
    }

    fn get(&self, key: &Key) -> Result<Value> {
        self.store
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::missing(key))
    }
}

impl fmt::Debug for Singleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton")
            .field("cached", &self.store.len())
            .finish()
    }
}

// ── ThreadLocal ──

type Slices = DashMap<ThreadId, HashMap<Key, Value>>;

thread_local! {
    static THREAD_EXIT: ThreadExit = const { ThreadExit(RefCell::new(Vec::new())) };
}

/// Frees this thread's slice of every live [`ThreadLocal`] it wrote to when
/// the thread exits.
struct ThreadExit(RefCell<Vec<(ThreadId, Weak<Slices>)>>);

impl ThreadExit {
    fn register(&self, thread: ThreadId, slices: &Arc<Slices>) {
        let mut registered = self.0.borrow_mut();
        registered.retain(|(_, weak)| weak.strong_count() > 0);
        registered.push((thread, Arc::downgrade(slices)));
    }
}

impl Drop for ThreadExit {
    fn drop(&mut self) {
        for (thread, weak) in self.0.get_mut().drain(..) {
            if let Some(slices) = weak.upgrade() {
                slices.remove(&thread);
            }
        }
    }
}

/// One value per key per OS thread.
///
/// The scope owns every thread's values. A thread's values are dropped when
/// it exits, and all of them when the scope is dropped.
pub struct ThreadLocal {
    slices: Arc<Slices>,
}

impl Default for ThreadLocal {
    fn default() -> Self {
        Self {
            slices: Arc::new(DashMap::new()),
        }
    }
}

impl Scope for ThreadLocal {
    fn set(&self, key: &Key, value: Value) {
        let thread = thread::current().id();
        if !self.slices.contains_key(&thread)
            && THREAD_EXIT.try_with(|exit| exit.register(thread, &self.slices)).is_err()
        {
            debug!(key = %key, "Thread is shutting down, value dropped");
            return;
        }
        let replaced = self
            .slices
            .entry(thread)
            .or_default()
            .insert(key.clone(), value);
        drop(replaced);
    }

    fn get(&self, key: &Key) -> Result<Value> {
        self.slices
            .get(&thread::current().id())
            .and_then(|slice| slice.get(key).cloned())
            .ok_or_else(|| Error::missing(key))
    }
}

impl fmt::Debug for ThreadLocal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocal")
            .field("threads", &self.slices.len())
            .finish()
    }
}

// ── ContextLocal ──

/// One value per key per execution context.
///
/// A value set in a context is visible in contexts forked from it later,
/// never in its parent or in siblings. Outside of any active context
/// nothing is stored and every lookup misses.
pub struct ContextLocal {
    id: u64,
}

impl Default for ContextLocal {
    fn default() -> Self {
        Self { id: next_owner_id() }
    }
}

impl Scope for ContextLocal {
    fn set(&self, key: &Key, value: Value) {
        if !context::insert((self.id, key.clone()), value) {
            debug!(key = %key, "No active context, value not cached");
        }
    }

    fn get(&self, key: &Key) -> Result<Value> {
        context::lookup(&(self.id, key.clone())).ok_or_else(|| Error::missing(key))
    }
}

impl fmt::Debug for ContextLocal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLocal").field("id", &self.id).finish()
    }
}

// ── NoScope ──

/// Stores nothing: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScope;

impl Scope for NoScope {
    fn set(&self, _key: &Key, _value: Value) {}

    fn get(&self, key: &Key) -> Result<Value> {
        Err(Error::missing(key))
    }
}
