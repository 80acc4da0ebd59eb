//! A stack of providers, the top one being "the" active provider.
//!
//! [`Stack`] forwards `put`, `get` and `pass_` to whatever provider is on
//! top at the moment of the call. That makes it possible to decorate
//! functions once, at startup, and swap what they receive later, e.g. in
//! tests or per request.
//!
//! A process-wide stack is available through [`shared()`] and the free
//! functions of this module.
//!
//! # Examples
//! ```
//! use sanduq_container::prelude::*;
//!
//! let stack = Stack::named("app");
//! let magic = Function::new("magic", Signature::new().param("magic"), |args| {
//!     Ok(Value::new(*args.get::<i32>("magic")? + 1))
//! });
//! let magic = stack.pass_("magic").apply(magic);
//!
//! let production = Container::new();
//! production.put_value("magic", 42).unwrap();
//! let _outer = stack.push(production);
//! assert_eq!(magic.call(Args::new()).unwrap().downcast_ref::<i32>(), Some(&43));
//!
//! {
//!     let testing = Container::new();
//!     testing.put_value("magic", 13).unwrap();
//!     let _inner = stack.push_chained(testing);
//!     assert_eq!(magic.call(Args::new()).unwrap().downcast_ref::<i32>(), Some(&14));
//! }
//!
//! assert_eq!(magic.call(Args::new()).unwrap().downcast_ref::<i32>(), Some(&43));
//! ```

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::chain::ChainContainer;
use crate::error::{Error, Result};
use crate::function::Pass;
use crate::key::Key;
use crate::provider::Provider;
use crate::registry::Put;
use crate::value::Value;

/// A thread-safe stack of providers.
///
/// Cheap to clone; clones share the same stack. Independent stacks never
/// affect each other.
#[derive(Clone)]
pub struct Stack {
    inner: Arc<StackInner>,
}

struct StackInner {
    name: String,
    providers: Mutex<Vec<Arc<dyn Provider>>>,
}

impl Stack {
    /// Creates an empty stack named after its address.
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|weak| StackInner {
            name: format!("0x{:x}", weak.as_ptr() as usize),
            providers: Mutex::new(Vec::new()),
        });
        Self { inner }
    }

    /// Creates an empty stack with a name used in logs and `Debug`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StackInner {
                name: name.into(),
                providers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of pushed providers.
    pub fn depth(&self) -> usize {
        self.inner.providers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.providers.lock().is_empty()
    }

    /// Makes `provider` the active provider until the returned guard is
    /// dropped.
    pub fn push(&self, provider: impl Into<Arc<dyn Provider>>) -> PushGuard {
        self.push_with(provider, false)
    }

    /// Like [`Stack::push`], with keys missing from `provider` falling back
    /// to the provider that was on top before.
    pub fn push_chained(&self, provider: impl Into<Arc<dyn Provider>>) -> PushGuard {
        self.push_with(provider, true)
    }

    /// Pushes `provider`, chained to the previous top if `chain` is set and
    /// the stack is not empty.
    pub fn push_with(&self, provider: impl Into<Arc<dyn Provider>>, chain: bool) -> PushGuard {
        let mut provider = provider.into();

        let depth = {
            let mut providers = self.inner.providers.lock();
            if chain && let Some(top) = providers.last() {
                provider = ChainContainer::new([provider, top.clone()]).into();
            }
            providers.push(provider.clone());
            providers.len()
        };

        debug!(stack = %self.inner.name, depth, chain, "Pushed provider");
        PushGuard {
            stack: self.clone(),
            provider,
            armed: true,
        }
    }

    /// Removes and returns the top provider.
    ///
    /// # Errors
    /// [`Error::EmptyStack`] if nothing is pushed.
    pub fn pop(&self) -> Result<Arc<dyn Provider>> {
        let (provider, depth) = {
            let mut providers = self.inner.providers.lock();
            let provider = providers.pop().ok_or(Error::EmptyStack)?;
            (provider, providers.len())
        };
        debug!(stack = %self.inner.name, depth, "Popped provider");
        Ok(provider)
    }

    /// The provider currently on top.
    ///
    /// # Errors
    /// [`Error::NoActiveContainer`] if nothing is pushed.
    pub fn top(&self) -> Result<Arc<dyn Provider>> {
        self.inner
            .providers
            .lock()
            .last()
            .cloned()
            .ok_or(Error::NoActiveContainer)
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

// The top is looked up afresh on every call and used outside the lock, so
// factories may push, pop or resolve through the same stack.
impl Provider for Stack {
    fn insert(&self, key: Key, put: Put) -> Result<()> {
        self.top()?.insert(key, put)
    }

    fn lookup(&self, key: &Key) -> Result<Value> {
        self.top()?.lookup(key)
    }

    fn keys(&self) -> Vec<Key> {
        self.top().map(|top| top.keys()).unwrap_or_default()
    }

    fn lookup_or(&self, key: &Key, default: Value) -> Result<Value> {
        self.top()?.lookup_or(key, default)
    }
}

impl From<Stack> for Arc<dyn Provider> {
    fn from(stack: Stack) -> Self {
        Arc::new(stack)
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stack({})", self.inner.name)
    }
}

// ── PushGuard ──

/// Keeps a pushed provider on the stack. Pops it when dropped.
///
/// If the provider popped on drop is not the one this guard pushed, the
/// stack was popped by hand in between. That is a programming error and
/// the drop panics; use [`PushGuard::close`] to get it as an error instead.
#[must_use = "the provider is popped as soon as the guard is dropped"]
pub struct PushGuard {
    stack: Stack,
    provider: Arc<dyn Provider>,
    armed: bool,
}

impl PushGuard {
    /// The pushed provider; a [`ChainContainer`] when pushed chained.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Pops the provider now.
    ///
    /// # Errors
    /// [`Error::PopMismatch`] if the top of the stack was not this guard's
    /// provider, [`Error::EmptyStack`] if the stack was emptied by hand.
    pub fn close(mut self) -> Result<Arc<dyn Provider>> {
        self.armed = false;
        self.release()
    }

    /// Leaves the provider on the stack. It must then be popped by hand.
    pub fn detach(mut self) -> Arc<dyn Provider> {
        self.armed = false;
        self.provider.clone()
    }

    fn release(&self) -> Result<Arc<dyn Provider>> {
        let popped = self.stack.pop()?;
        if !std::ptr::addr_eq(Arc::as_ptr(&popped), Arc::as_ptr(&self.provider)) {
            return Err(Error::PopMismatch);
        }
        Ok(popped)
    }
}

impl Drop for PushGuard {
    fn drop(&mut self) {
        if !std::mem::take(&mut self.armed) {
            return;
        }
        if let Err(e) = self.release() {
            if std::thread::panicking() {
                error!(stack = %self.stack.inner.name, error = %e, "Failed to pop provider");
            } else {
                panic!("{e}");
            }
        }
    }
}

impl fmt::Debug for PushGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushGuard")
            .field("stack", &self.stack)
            .field("armed", &self.armed)
            .finish()
    }
}

// ── Shared stack ──

static SHARED: Lazy<Stack> = Lazy::new(|| Stack::named("shared"));

/// The process-wide stack. Created on first use, never reset.
pub fn shared() -> &'static Stack {
    &SHARED
}

/// Pushes `provider` onto the shared stack.
pub fn push(provider: impl Into<Arc<dyn Provider>>) -> PushGuard {
    shared().push(provider)
}

/// Pushes `provider` onto the shared stack, chained to the previous top.
pub fn push_chained(provider: impl Into<Arc<dyn Provider>>) -> PushGuard {
    shared().push_chained(provider)
}

/// Pops the top of the shared stack.
pub fn pop() -> Result<Arc<dyn Provider>> {
    shared().pop()
}

/// Registers `put` under `key` in the top of the shared stack.
pub fn put(key: impl Into<Key>, put: Put) -> Result<()> {
    shared().insert(key.into(), put)
}

/// Resolves `key` through the top of the shared stack.
pub fn get(key: impl Into<Key>) -> Result<Value> {
    shared().lookup(&key.into())
}

/// Resolves `key` through the top of the shared stack, or returns
/// `default` if it is missing.
pub fn get_or<T: std::any::Any + Send + Sync>(key: impl Into<Key>, default: T) -> Result<Value> {
    shared().lookup_or(&key.into(), Value::new(default))
}

/// Injects `key` from whatever is on top of the shared stack at call time.
pub fn pass_(key: impl Into<Key>) -> Pass {
    shared().pass_(key)
}
