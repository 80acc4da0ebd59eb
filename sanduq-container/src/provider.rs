//! The interface shared by everything that can provide dependencies.
//!
//! [`Container`](crate::Container), [`ChainContainer`](crate::ChainContainer)
//! and [`Stack`](crate::Stack) all implement [`Provider`], so any of them
//! can stand in for another: a chain can hold stacks, a stack can hold
//! chains, and `pass_` works the same on all of them.
//!
//! # Examples
//! ```
//! use sanduq_container::prelude::*;
//!
//! fn configure(provider: &impl Provider) -> Result<()> {
//!     provider.put_value("dsn", String::from("postgres://localhost"))?;
//!     provider.put_factory("retries", || 3_u32)
//! }
//!
//! let container = Container::new();
//! configure(&container).unwrap();
//! assert_eq!(*container.get_as::<u32>("retries").unwrap(), 3);
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::function::Pass;
use crate::key::Key;
use crate::registry::Put;
use crate::scope::Scope;
use crate::value::Value;

/// Something that stores and resolves dependencies.
///
/// Only [`insert`](Provider::insert), [`lookup`](Provider::lookup) and
/// [`keys`](Provider::keys) need implementing; everything else is built on
/// top of them. The trait is object safe: `Arc<dyn Provider>` is how
/// chains, stacks and injections hold providers.
pub trait Provider: Send + Sync + 'static {
    /// Registers `put` under `key`, replacing any previous registration.
    fn insert(&self, key: Key, put: Put) -> Result<()>;

    /// Resolves `key`, failing with [`Error::MissingKey`](crate::Error::MissingKey)
    /// if nothing is registered under it.
    fn lookup(&self, key: &Key) -> Result<Value>;

    /// Keys visible through this provider.
    fn keys(&self) -> Vec<Key>;

    /// Resolves `key`, returning `default` if nothing is registered under
    /// it. Other errors, including a missing key deeper down inside a
    /// factory, are returned as is.
    fn lookup_or(&self, key: &Key, default: Value) -> Result<Value> {
        match self.lookup(key) {
            Err(e) if e.is_missing(key) => Ok(default),
            other => other,
        }
    }

    // ── Ergonomic wrappers ──

    /// Registers `put` under `key`.
    fn put(&self, key: impl Into<Key>, put: Put) -> Result<()>
    where
        Self: Sized,
    {
        self.insert(key.into(), put)
    }

    /// Registers a constant. It is returned as the very same allocation on
    /// every lookup.
    fn put_value<T: Any + Send + Sync>(&self, key: impl Into<Key>, value: T) -> Result<()>
    where
        Self: Sized,
    {
        self.insert(key.into(), Put::value(value))
    }

    /// Registers a factory called on every lookup.
    fn put_factory<T, F>(&self, key: impl Into<Key>, factory: F) -> Result<()>
    where
        Self: Sized,
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(key.into(), Put::factory(factory))
    }

    /// Registers a factory whose values are cached in scope `S`.
    fn put_scoped<S, T, F>(&self, key: impl Into<Key>, factory: F) -> Result<()>
    where
        Self: Sized,
        S: Scope + Default,
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(key.into(), Put::factory(factory).scope::<S>())
    }

    /// Resolves `key`.
    fn get(&self, key: impl Into<Key>) -> Result<Value>
    where
        Self: Sized,
    {
        self.lookup(&key.into())
    }

    /// Resolves `key`, or returns `default` if it is not registered.
    fn get_or<T: Any + Send + Sync>(&self, key: impl Into<Key>, default: T) -> Result<Value>
    where
        Self: Sized,
    {
        self.lookup_or(&key.into(), Value::new(default))
    }

    /// Resolves `key` and downcasts the result to `T`.
    ///
    /// # Errors
    /// [`Error::TypeMismatch`](crate::Error::TypeMismatch) if the value has
    /// another type.
    fn get_as<T: Any + Send + Sync>(&self, key: impl Into<Key>) -> Result<Arc<T>>
    where
        Self: Sized,
    {
        let key = key.into();
        self.lookup(&key)?.expect_type::<T>(&key)
    }

    /// Returns a decorator injecting `key` into functions at call time.
    ///
    /// The lookup happens on every call, through this provider.
    fn pass_(&self, key: impl Into<Key>) -> Pass
    where
        Self: Sized + Clone,
    {
        Pass::new(key.into(), Arc::new(self.clone()))
    }
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn insert(&self, key: Key, put: Put) -> Result<()> {
        (**self).insert(key, put)
    }

    fn lookup(&self, key: &Key) -> Result<Value> {
        (**self).lookup(key)
    }

    fn keys(&self) -> Vec<Key> {
        (**self).keys()
    }

    fn lookup_or(&self, key: &Key, default: Value) -> Result<Value> {
        (**self).lookup_or(key, default)
    }
}
