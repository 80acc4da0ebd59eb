//! Execution contexts for context-local storage.
//!
//! A [`Context`] is a map of slots that follows a logical unit of work
//! rather than an OS thread. Contexts are forked, never shared: a fork
//! starts with a snapshot of its parent, and writes made on either side
//! after the fork stay on that side.
//!
//! A context becomes *active* in two ways:
//! - [`Context::run`] activates it for a synchronous closure
//! - [`Context::scope`] activates it around every poll of a future
//!
//! With the `async` feature, [`spawn`] starts a tokio task running in a fork
//! of the caller's context, which is how values flow from a parent task to
//! the tasks it spawns. Code that runs outside any active context (a fresh
//! thread, a task spawned with plain `tokio::spawn`) has no context at all.
//!
//! # Examples
//! ```
//! use sanduq_container::context::Context;
//! use sanduq_container::scope::{ContextLocal, Scope};
//! use sanduq_container::{Key, Value};
//!
//! let scope = ContextLocal::default();
//! let key = Key::from("request-id");
//!
//! let mut parent = Context::new();
//! parent.run(|| scope.set(&key, Value::new(7_u32)));
//!
//! let mut child = parent.clone();
//! child.run(|| {
//!     assert!(scope.get(&key).is_ok());
//!     scope.set(&key, Value::new(8_u32));
//! });
//!
//! parent.run(|| {
//!     let value = scope.get(&key).unwrap();
//!     assert_eq!(value.downcast_ref::<u32>(), Some(&7));
//! });
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context as TaskContext, Poll};

use crate::key::Key;
use crate::value::Value;

/// Identifies a slot: the owner (a scope instance) and the key within it.
pub(crate) type Slot = (u64, Key);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique owner id for slots.
pub(crate) fn next_owner_id() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

thread_local! {
    /// Active contexts on this thread, innermost last.
    static ACTIVE: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// A forkable map of context-local values.
///
/// Cloning a context forks it. Forks share storage until one of them is
/// written to.
#[derive(Clone, Default)]
pub struct Context {
    slots: Arc<HashMap<Slot, Value>>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the active context, if any.
    pub fn current() -> Option<Context> {
        with_active(|ctx| ctx.clone())
    }

    /// Returns a snapshot of the active context, or an empty context when
    /// none is active.
    pub fn fork() -> Context {
        Self::current().unwrap_or_default()
    }

    /// Runs `f` with this context active.
    ///
    /// Writes made by `f` are kept in `self`, so running the same context
    /// again observes them.
    pub fn run<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _active = Activation::enter(self);
        f()
    }

    /// Wraps `future` so that this context is active whenever it is polled.
    pub fn scope<F: Future>(self, future: F) -> ContextFuture<F> {
        ContextFuture {
            context: self,
            future: Box::pin(future),
        }
    }

    /// Number of values stored in this context.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is stored in this context.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn lookup(&self, slot: &Slot) -> Option<Value> {
        self.slots.get(slot).cloned()
    }

    /// Stores `value`, returning the value it replaced.
    pub(crate) fn insert(&mut self, slot: Slot, value: Value) -> Option<Value> {
        Arc::make_mut(&mut self.slots).insert(slot, value)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("values", &self.len()).finish()
    }
}

/// Runs `f` against the innermost active context.
///
/// Returns `None` when no context is active on this thread.
pub(crate) fn with_active<R>(f: impl FnOnce(&mut Context) -> R) -> Option<R> {
    ACTIVE
        .try_with(|active| active.borrow_mut().last_mut().map(f))
        .ok()
        .flatten()
}

/// Looks a slot up in the active context.
pub(crate) fn lookup(slot: &Slot) -> Option<Value> {
    with_active(|ctx| ctx.lookup(slot)).flatten()
}

/// Stores a value in the active context.
///
/// Returns `false` if no context is active. Values are dropped after the
/// active list is released, so their destructors may use contexts too.
pub(crate) fn insert(slot: Slot, value: Value) -> bool {
    let mut pending = Some(value);
    let replaced = with_active(|ctx| pending.take().and_then(|value| ctx.insert(slot, value)));
    drop(replaced);
    pending.is_none()
}

/// Marks a context active for as long as it lives.
///
/// The context is moved onto the thread's active list and written back to
/// its owner on drop, panics included.
struct Activation<'a> {
    owner: &'a mut Context,
}

impl<'a> Activation<'a> {
    fn enter(owner: &'a mut Context) -> Self {
        let context = std::mem::take(owner);
        ACTIVE.with(|active| active.borrow_mut().push(context));
        Activation { owner }
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        let context = ACTIVE
            .try_with(|active| active.borrow_mut().pop())
            .ok()
            .flatten();
        if let Some(context) = context {
            *self.owner = context;
        }
    }
}

/// A future running inside a [`Context`]. Created by [`Context::scope`].
pub struct ContextFuture<F> {
    context: Context,
    future: Pin<Box<F>>,
}

impl<F: Future> Future for ContextFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _active = Activation::enter(&mut this.context);
        this.future.as_mut().poll(cx)
    }
}

impl<F> fmt::Debug for ContextFuture<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFuture")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Spawns a tokio task running in a fork of the caller's context.
///
/// The task sees every context-local value the caller could see at the
/// time of the call. Values it sets are invisible to the caller and to
/// other tasks.
#[cfg(feature = "async")]
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(Context::fork().scope(future))
}
