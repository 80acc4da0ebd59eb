//! Request and application scopes for server-style hosts.
//!
//! A [`ScopeMiddleware`] wraps every unit of work a host runs, typically
//! one request. Inside it, the [`Request`] scope caches values per unit of
//! work and the [`Application`] scope caches them for every unit of work
//! run through the same middleware.
//!
//! Both scopes fail with [`Error::OutsideContext`] when used outside a
//! middleware, instead of silently rebuilding.
//!
//! # Examples
//! ```
//! use sanduq_container::prelude::*;
//! use sanduq_container::web::{Request, ScopeMiddleware};
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! static NEXT_ID: AtomicU32 = AtomicU32::new(0);
//!
//! let container = Container::new();
//! container
//!     .put_scoped::<Request, _, _>("request-id", || NEXT_ID.fetch_add(1, Ordering::SeqCst))
//!     .unwrap();
//!
//! let middleware = ScopeMiddleware::new();
//! let (a, b) = middleware.run(|| {
//!     (container.get_as::<u32>("request-id").unwrap(), container.get_as::<u32>("request-id").unwrap())
//! });
//! assert_eq!(a, b);
//!
//! let c = middleware.run(|| container.get_as::<u32>("request-id").unwrap());
//! assert_ne!(a, c);
//!
//! assert!(container.get("request-id").is_err());
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::warn;

use crate::context::{self, Context, ContextFuture, Slot, next_owner_id};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::scope::Scope;
use crate::value::Value;

/// The values one scope instance cached in one store.
type Partition = DashMap<Key, Value>;

/// Partitions by scope instance.
type Store = DashMap<u64, Arc<Partition>>;

const HOST: &str = "ScopeMiddleware";

/// Slot owner reserved for the stores themselves. Scope ids start at 1.
const RESERVED: u64 = 0;

fn application_slot() -> Slot {
    (RESERVED, Key::from("sanduq.web.application"))
}

fn request_slot() -> Slot {
    (RESERVED, Key::from("sanduq.web.request"))
}

/// Runs units of work with application and request storage in place.
///
/// Each middleware owns one application store, so two middlewares (two
/// applications) never share application-scoped values.
#[derive(Clone, Default)]
pub struct ScopeMiddleware {
    application: Arc<Store>,
}

impl ScopeMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    fn unit_of_work(&self) -> Context {
        let mut ctx = Context::fork();
        ctx.insert(application_slot(), Value::from_arc(self.application.clone()));
        ctx.insert(request_slot(), Value::new(Store::new()));
        ctx
    }

    /// Runs `f` as one unit of work.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        self.unit_of_work().run(f)
    }

    /// Runs `future` as one unit of work.
    ///
    /// Tasks spawned with [`context::spawn`] from inside it belong to the
    /// same unit of work.
    pub fn scope<F: Future>(&self, future: F) -> ContextFuture<F> {
        self.unit_of_work().scope(future)
    }
}

impl std::fmt::Debug for ScopeMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: usize = self.application.iter().map(|partition| partition.len()).sum();
        f.debug_struct("ScopeMiddleware")
            .field("application_values", &values)
            .finish()
    }
}

fn current_store(slot: &Slot) -> Option<Arc<Store>> {
    context::lookup(slot).and_then(|value| value.downcast::<Store>())
}

/// A scope instance's share of the stores it wrote to.
///
/// Request stores go away with their unit of work. Dropping the scope
/// removes its partition from every store still alive.
#[derive(Debug)]
struct Partitions {
    id: u64,
    stores: Mutex<Vec<Weak<Store>>>,
}

impl Partitions {
    fn new() -> Self {
        Self {
            id: next_owner_id(),
            stores: Mutex::new(Vec::new()),
        }
    }

    fn get(&self, slot: &Slot, key: &Key) -> Result<Value> {
        let store = current_store(slot).ok_or(Error::OutsideContext(HOST))?;
        let Some(partition) = store.get(&self.id).map(|entry| Arc::clone(entry.value())) else {
            return Err(Error::missing(key));
        };
        let value = partition.get(key).map(|entry| entry.value().clone());
        value.ok_or_else(|| Error::missing(key))
    }

    fn set(&self, slot: &Slot, key: &Key, value: Value) {
        let Some(store) = current_store(slot) else {
            warn!(key = %key, "{}", Error::OutsideContext(HOST));
            return;
        };
        let (partition, created) = match store.entry(self.id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (Arc::clone(entry.insert(Arc::default()).value()), true),
        };
        if created {
            let mut stores = self.stores.lock();
            stores.retain(|weak| weak.strong_count() > 0);
            stores.push(Arc::downgrade(&store));
        }
        partition.insert(key.clone(), value);
    }
}

impl Drop for Partitions {
    fn drop(&mut self) {
        for store in self.stores.get_mut().drain(..).filter_map(|weak| weak.upgrade()) {
            store.remove(&self.id);
        }
    }
}

/// Shares values across every unit of work of one [`ScopeMiddleware`].
#[derive(Debug)]
pub struct Application {
    partitions: Partitions,
}

impl Default for Application {
    fn default() -> Self {
        Self {
            partitions: Partitions::new(),
        }
    }
}

impl Scope for Application {
    fn set(&self, key: &Key, value: Value) {
        self.partitions.set(&application_slot(), key, value);
    }

    fn get(&self, key: &Key) -> Result<Value> {
        self.partitions.get(&application_slot(), key)
    }
}

/// Shares values within one unit of work (one request).
#[derive(Debug)]
pub struct Request {
    partitions: Partitions,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            partitions: Partitions::new(),
        }
    }
}

impl Scope for Request {
    fn set(&self, key: &Key, value: Value) {
        self.partitions.set(&request_slot(), key, value);
    }

    fn get(&self, key: &Key) -> Result<Value> {
        self.partitions.get(&request_slot(), key)
    }
}
