//! Registration requests and the entries containers keep for them.
//!
//! A [`Put`] describes one registration: either a constant value or a
//! factory, plus an optional [`ScopeKind`]. Containers validate it and turn
//! it into an [`Entry`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};
use crate::function::Function;
use crate::scope::{NoScope, Scope, ScopeKind, Singleton};
use crate::signature::Args;
use crate::value::Value;

/// A factory producing a dependency's value.
///
/// Factories are shared between threads and may be called more than once
/// (once per scope context), so they are `Fn` behind an `Arc`.
pub type Factory = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Arguments of a `put` call.
///
/// Exactly one of a value or a factory must be set. A value is cached as a
/// singleton; a factory without a scope is called on every lookup.
///
/// # Examples
/// ```
/// use sanduq_container::registry::Put;
/// use sanduq_container::scope::ThreadLocal;
///
/// let constant = Put::value(42);
/// let per_thread = Put::factory(|| String::from("buffer")).scope::<ThreadLocal>();
/// let broken = Put::value(1).scope::<ThreadLocal>();
///
/// assert!(constant.validate().is_ok());
/// assert!(per_thread.validate().is_ok());
/// assert!(broken.validate().is_err());
/// ```
#[derive(Clone, Default)]
#[must_use]
pub struct Put {
    value: Option<Value>,
    factory: Option<Factory>,
    scope: Option<ScopeKind>,
}

impl Put {
    /// An empty request; fails validation until a value or factory is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constant.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::new().with_value(Value::new(value))
    }

    /// Registers an existing [`Value`], keeping its identity.
    pub fn from_value(value: Value) -> Self {
        Self::new().with_value(value)
    }

    /// Registers an infallible factory.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new().with_factory(Arc::new(move || Ok(Value::new(factory()))))
    }

    /// Registers a fallible factory. Its errors reach the caller of `get`
    /// untouched and are never cached.
    pub fn try_factory<T, E, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        E: Into<BoxError>,
        F: Fn() -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        Self::new().with_factory(Arc::new(move || {
            factory().map(Value::new).map_err(Error::failed)
        }))
    }

    /// Registers an injectable function as factory.
    ///
    /// It is called without arguments, so every parameter it needs comes
    /// from its injections or its defaults.
    pub fn function(function: Function) -> Self {
        Self::new().with_factory(Arc::new(move || function.call(Args::new())))
    }

    /// Sets the constant.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the factory.
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the scope kind.
    pub fn with_scope(mut self, scope: ScopeKind) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sets the scope kind to `S`.
    pub fn scope<S: Scope + Default>(self) -> Self {
        self.with_scope(ScopeKind::of::<S>())
    }

    /// Checks the request and resolves it into a scope kind and a factory.
    ///
    /// # Errors
    /// [`Error::InvalidArguments`] when neither or both of value and factory
    /// are set, or when a scope accompanies a value.
    pub fn validate(self) -> Result<(ScopeKind, Factory)> {
        match (self.value, self.factory, self.scope) {
            (None, None, _) => Err(Error::InvalidArguments(
                "put() missing 1 required argument: either 'value' or 'factory'",
            )),
            (Some(_), Some(_), _) => Err(Error::InvalidArguments(
                "put() takes either 'value' or 'factory', not both",
            )),
            (Some(_), None, Some(_)) => Err(Error::InvalidArguments(
                "put() takes 'scope' only when 'factory' provided",
            )),
            (Some(value), None, None) => Ok((
                ScopeKind::of::<Singleton>(),
                Arc::new(move || Ok(value.clone())),
            )),
            (None, Some(factory), scope) => {
                Ok((scope.unwrap_or_else(ScopeKind::of::<NoScope>), factory))
            }
        }
    }
}

impl fmt::Debug for Put {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Put")
            .field("value", &self.value)
            .field("factory", &self.factory.is_some())
            .field("scope", &self.scope)
            .finish()
    }
}

/// What a container stores per key.
#[derive(Clone)]
pub(crate) struct Entry {
    pub kind: ScopeKind,
    pub scope: Arc<dyn Scope>,
    pub factory: Factory,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("scope", &self.kind)
            .finish_non_exhaustive()
    }
}
