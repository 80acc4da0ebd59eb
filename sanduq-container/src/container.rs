//! # The Container, heart of Sanduq
//!
//! A keyed store of factories. Each key maps to a factory and a scope; on
//! lookup the scope is asked first and the factory only runs on a miss.
//!
//! # Architecture
//! ```text
//! put(key, Put)  ──validate()──>  Entry { scope, factory }
//!                                        │
//!                                      get(key)
//!                                        │
//!                      scope.get ── hit ─┴─ miss ──> lock, re-check,
//!                                                    factory(), scope.set
//! ```
//!
//! # Examples
//! ```rust
//! use sanduq_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! let container = Container::new();
//! container
//!     .put_scoped::<Singleton, _, _>(Key::of::<dyn Logger>(), || {
//!         Arc::new(ConsoleLogger) as Arc<dyn Logger>
//!     })
//!     .expect("Failed to register");
//!
//! let logger = container
//!     .get_as::<Arc<dyn Logger>>(Key::of::<dyn Logger>())
//!     .expect("Failed to resolve");
//! logger.log("ready");
//! ```

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use crate::error::{Error, MissingKeyError, Result};
use crate::key::Key;
use crate::provider::Provider;
use crate::registry::{Entry, Put};
use crate::scope::{Scope, ScopeKind};
use crate::value::Value;

// ── Container ──

/// Thread-safe dependency container.
///
/// Cloning a container clones a handle: clones share registrations and
/// cached values.
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: DashMap<Key, Entry>,
    /// Guards registration and first-time construction. Reentrant so a
    /// factory can resolve other keys of the same container.
    lock: ReentrantMutex<RefCell<HashMap<TypeId, Arc<dyn Scope>>>>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns `true` if `key` is registered.
    pub fn contains(&self, key: &Key) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Returns the scope instance of `kind`, creating it on first use.
    fn scope_for(scopes: &RefCell<HashMap<TypeId, Arc<dyn Scope>>>, kind: ScopeKind) -> Arc<dyn Scope> {
        scopes
            .borrow_mut()
            .entry(kind.id())
            .or_insert_with(|| kind.instantiate())
            .clone()
    }

    fn build(&self, key: &Key, entry: &Entry) -> Result<Value> {
        let _guard = self.inner.lock.lock();

        match entry.scope.get(key) {
            Err(e) if e.is_missing_key() => {}
            cached => return cached,
        }

        debug!(key = %key, scope = %entry.kind, "Invoking factory");
        let value = (entry.factory)()?;
        entry.scope.set(key, value.clone());
        Ok(value)
    }
}

impl Provider for Container {
    fn insert(&self, key: Key, put: Put) -> Result<()> {
        let (kind, factory) = put.validate()?;

        let guard = self.inner.lock.lock();
        let scope = Self::scope_for(&guard, kind);
        debug!(key = %key, scope = %kind, "Registered dependency");
        self.inner.entries.insert(key, Entry { kind, scope, factory });
        Ok(())
    }

    fn lookup(&self, key: &Key) -> Result<Value> {
        // Cloned out so no map shard stays locked while a factory runs.
        let entry = self
            .inner
            .entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::MissingKey(MissingKeyError::with_suggestions(key, &self.keys()))
            })?;

        match entry.scope.get(key) {
            Err(e) if e.is_missing_key() => self.build(key, &entry),
            cached => {
                trace!(key = %key, "Cache hit");
                cached
            }
        }
    }

    fn keys(&self) -> Vec<Key> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl From<Container> for Arc<dyn Provider> {
    fn from(container: Container) -> Self {
        Arc::new(container)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.len())
            .finish()
    }
}

// ── Prelude ──

pub mod prelude {
    pub use super::Container;
    pub use crate::chain::ChainContainer;
    pub use crate::error::{Error, Result};
    pub use crate::function::{AsyncFunction, Function, Injectable, Pass};
    pub use crate::key::Key;
    pub use crate::provider::Provider;
    pub use crate::registry::Put;
    pub use crate::scope::{ContextLocal, NoScope, Scope, ScopeKind, Singleton, ThreadLocal};
    pub use crate::signature::{Args, Bound, Signature};
    pub use crate::stack::{PushGuard, Stack};
    pub use crate::value::Value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{ContextLocal, NoScope, Singleton, ThreadLocal};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: &Arc<AtomicU32>) -> impl Fn() -> u32 + Send + Sync + 'static {
        let counter = counter.clone();
        move || counter.fetch_add(1, Ordering::SeqCst)
    }

    #[test]
    fn put_value_roundtrip_keeps_identity() {
        let container = Container::new();
        let value = Value::new(vec![String::from("mutable")]);
        container.put("a", Put::from_value(value.clone())).unwrap();

        let got = container.get("a").unwrap();
        assert!(Value::ptr_eq(&got, &value));
        assert!(Value::ptr_eq(&container.get("a").unwrap(), &got));
    }

    #[test]
    fn falsy_and_unit_values() {
        let container = Container::new();
        container.put_value(0_u8, ()).unwrap();
        container.put_value(false, 0_i32).unwrap();
        container.put_value("empty", String::new()).unwrap();

        assert!(container.get(0_u8).unwrap().is::<()>());
        assert_eq!(*container.get_as::<i32>(false).unwrap(), 0);
        assert_eq!(*container.get_as::<String>("empty").unwrap(), "");
    }

    #[test]
    fn noscope_factory_runs_every_time() {
        let counter = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container.put_factory("n", counting(&counter)).unwrap();

        let a = container.get_as::<u32>("n").unwrap();
        let b = container.get_as::<u32>("n").unwrap();
        let c = container.get_as::<u32>("n").unwrap();

        assert_eq!((*a, *b, *c), (0, 1, 2));
    }

    #[test]
    fn singleton_factory_called_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container
            .put_scoped::<Singleton, _, _>("n", counting(&counter))
            .unwrap();

        let first = container.get("n").unwrap();
        let second = container.get("n").unwrap();

        assert!(Value::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn threadlocal_factory_called_once_per_thread() {
        let counter = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container
            .put_scoped::<ThreadLocal, _, _>("n", counting(&counter))
            .unwrap();

        let main = container.get("n").unwrap();
        assert!(Value::ptr_eq(&main, &container.get("n").unwrap()));

        let other = container.clone();
        let worker = std::thread::spawn(move || {
            let a = other.get("n").unwrap();
            let b = other.get("n").unwrap();
            assert!(Value::ptr_eq(&a, &b));
            a
        })
        .join()
        .unwrap();

        assert!(!Value::ptr_eq(&main, &worker));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn scope_instances_shared_per_kind() {
        let container = Container::new();
        container.put_scoped::<Singleton, _, _>("a", || 1).unwrap();
        container.put_scoped::<Singleton, _, _>("b", || 2).unwrap();
        container.put_factory("c", || 3).unwrap();

        let a = container.inner.entries.get(&Key::from("a")).unwrap().scope.clone();
        let b = container.inner.entries.get(&Key::from("b")).unwrap().scope.clone();
        let c = container.inner.entries.get(&Key::from("c")).unwrap().scope.clone();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn containers_do_not_share_scopes() {
        let first = Container::new();
        let second = Container::new();
        first.put_scoped::<ThreadLocal, _, _>("k", || String::from("first")).unwrap();
        second.put_scoped::<ThreadLocal, _, _>("k", || String::from("second")).unwrap();

        assert_eq!(*first.get_as::<String>("k").unwrap(), "first");
        assert_eq!(*second.get_as::<String>("k").unwrap(), "second");
    }

    #[test]
    fn put_overwrites() {
        let container = Container::new();
        container.put_value("a", 1_i32).unwrap();
        container.put_value("a", 2_i32).unwrap();
        assert_eq!(*container.get_as::<i32>("a").unwrap(), 2);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn missing_key_and_default() {
        let container = Container::new();
        container.put_value("magic", 42).unwrap();

        let err = container.get("magik").unwrap_err();
        assert!(err.is_missing(&Key::from("magik")));
        assert!(err.to_string().contains("Did you mean"));

        let value = container.get_or("missing", 99).unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&99));
    }

    #[test]
    fn invalid_put_leaves_container_untouched() {
        let container = Container::new();
        let err = container.put("a", Put::value(1).scope::<Singleton>()).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
        assert!(container.is_empty());
    }

    #[test]
    fn factory_errors_propagate_and_are_not_cached() {
        let attempts = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container
            .put(
                "flaky",
                Put::try_factory({
                    let attempts = attempts.clone();
                    move || {
                        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(std::io::Error::other("first call fails"))
                        } else {
                            Ok("ok")
                        }
                    }
                })
                .scope::<Singleton>(),
            )
            .unwrap();

        let err = container.get("flaky").unwrap_err();
        assert_eq!(err.to_string(), "first call fails");
        assert!(container.get("flaky").is_ok());
        assert!(container.get("flaky").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factory_can_resolve_other_keys() {
        let container = Container::new();
        container.put_value("url", String::from("postgres://localhost")).unwrap();
        container
            .put(
                "bytes",
                Put::try_factory({
                    let container = container.clone();
                    move || -> Result<Vec<u8>> {
                        let url = container.get_as::<String>("url")?;
                        Ok(url.as_bytes().to_vec())
                    }
                })
                .scope::<Singleton>(),
            )
            .unwrap();

        assert_eq!(*container.get_as::<Vec<u8>>("bytes").unwrap(), b"postgres://localhost");
    }

    #[test]
    fn missing_dependency_inside_factory_propagates() {
        let container = Container::new();
        container
            .put(
                "service",
                Put::try_factory({
                    let container = container.clone();
                    move || container.get("config")
                }),
            )
            .unwrap();

        let err = container.get("service").unwrap_err();
        assert!(err.is_missing(&Key::from("config")));
        // A default for "service" does not hide the missing "config".
        assert!(container.get_or("service", 0).is_err());
    }

    #[test]
    fn contextlocal_outside_context_rebuilds() {
        let counter = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        container
            .put_scoped::<ContextLocal, _, _>("n", counting(&counter))
            .unwrap();

        container.get("n").unwrap();
        container.get("n").unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn explicit_noscope_kind() {
        let container = Container::new();
        container.put("n", Put::factory(|| 1).scope::<NoScope>()).unwrap();
        assert!(container.get("n").is_ok());
    }

    #[test]
    fn debug_display() {
        let container = Container::new();
        container.put_value(1_i32, 1).unwrap();
        container.put_value("x", String::from("x")).unwrap();

        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains('2'));
    }
}
