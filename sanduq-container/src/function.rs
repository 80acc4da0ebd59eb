//! Injectable functions and the `pass_` decorator.
//!
//! A [`Function`] (or [`AsyncFunction`]) is a callable with a declared
//! [`Signature`]. Decorating it with a [`Pass`] adds a late-binding
//! injection: on every call, if the caller did not supply the target
//! parameter, the key is looked up in the provider and passed by keyword.
//!
//! Stacked `pass_` decorators share one injection layer; any other
//! decorator in between starts a new one.
//!
//! # Examples
//! ```
//! use sanduq_container::prelude::*;
//!
//! let container = Container::new();
//! let add = Function::new(
//!     "add",
//!     Signature::new().param("a").param("b").param("c"),
//!     |args| {
//!         let sum = args.take::<i32>("a")? + args.take::<i32>("b")? + args.take::<i32>("c")?;
//!         Ok(Value::new(sum))
//!     },
//! );
//! let add = container.pass_("a").apply(add);
//!
//! // Registered after decorating: the lookup happens at call time.
//! container.put_value("a", 10).unwrap();
//!
//! let result = add.call(Args::new().kwarg("b", 2).kwarg("c", 3)).unwrap();
//! assert_eq!(result.downcast_ref::<i32>(), Some(&15));
//!
//! let result = add.call(Args::new().arg(1).arg(2).arg(3)).unwrap();
//! assert_eq!(result.downcast_ref::<i32>(), Some(&6));
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::key::Key;
use crate::provider::Provider;
use crate::signature::{Args, Bound, Signature};
use crate::value::Value;

/// A boxed future, as returned by [`AsyncFunction::call`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Body = Arc<dyn Fn(Bound) -> Result<Value> + Send + Sync>;
type Wrapper = Arc<dyn Fn(&Function, Args) -> Result<Value> + Send + Sync>;
type AsyncBody = Arc<dyn Fn(Bound) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
type AsyncWrapper =
    Arc<dyn Fn(&AsyncFunction, Args) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Name, doc and signature of a function. Decorators keep them.
#[derive(Debug, Clone)]
pub struct Meta {
    name: String,
    doc: Option<String>,
    signature: Signature,
}

impl Meta {
    fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            doc: None,
            signature,
        }
    }
}

// ── Injection ──

/// One injected parameter: where the value comes from and which parameter
/// receives it.
#[derive(Clone)]
pub struct Injection {
    key: Key,
    target: String,
    source: Arc<dyn Provider>,
}

impl Injection {
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Name of the parameter the value is passed as.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Debug for Injection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injection")
            .field("key", &self.key)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Adds the missing injected arguments to `args`.
///
/// Parameters the caller supplied are left alone and their keys are never
/// looked up.
fn inject(meta: &Meta, injections: &[Injection], mut args: Args) -> Result<Args> {
    let supplied = meta.signature.bind_partial(&meta.name, &args)?;

    for injection in injections {
        let target = injection.target.as_str();
        if supplied.contains(target) || args.has_keyword(target) {
            trace!(function = %meta.name, param = target, "Argument supplied, not injecting");
            continue;
        }

        let value = injection.source.lookup(&injection.key)?;
        trace!(function = %meta.name, key = %injection.key, param = target, "Injecting");
        args.insert_keyword(target, value);
    }

    Ok(args)
}

/// Something a [`Pass`] can decorate.
pub trait Injectable: Sized {
    /// Adds `injection`, merging it into an outermost injection layer if
    /// there is one.
    fn inject(self, injection: Injection) -> Self;
}

/// The `pass_` decorator. Created by
/// [`Provider::pass_`](crate::Provider::pass_).
///
/// The target parameter defaults to the key itself: a string key names the
/// parameter directly, any other key by its display form.
#[derive(Debug, Clone)]
#[must_use = "a Pass does nothing until applied to a function"]
pub struct Pass {
    injection: Injection,
}

impl Pass {
    /// Injects `key` from `source`.
    pub fn new(key: Key, source: Arc<dyn Provider>) -> Self {
        let target = key
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| key.to_string());
        Self {
            injection: Injection {
                key,
                target,
                source,
            },
        }
    }

    /// Passes the value as parameter `name` instead.
    pub fn as_(mut self, name: impl Into<String>) -> Self {
        self.injection.target = name.into();
        self
    }

    /// Decorates `function`.
    pub fn apply<F: Injectable>(self, function: F) -> F {
        function.inject(self.injection)
    }
}

// ── Function ──

/// A synchronous injectable function.
///
/// Cheap to clone. Every layer shares the undecorated function's name, doc
/// and signature.
#[derive(Clone)]
pub struct Function {
    meta: Arc<Meta>,
    layer: Layer,
}

#[derive(Clone)]
enum Layer {
    Body(Body),
    Inject {
        inner: Arc<Function>,
        injections: Vec<Injection>,
    },
    Wrap {
        inner: Arc<Function>,
        wrapper: Wrapper,
    },
}

impl Function {
    /// Creates a function. `body` receives the arguments bound to
    /// `signature`.
    pub fn new<F>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Bound) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            meta: Arc::new(Meta::new(name, signature)),
            layer: Layer::Body(Arc::new(body)),
        }
    }

    /// Attaches documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.meta).doc = Some(doc.into());
        self
    }

    /// Calls the function.
    ///
    /// # Errors
    /// [`Error::Call`](crate::Error::Call) if `args` do not fit the
    /// signature, [`Error::MissingKey`](crate::Error::MissingKey) if an
    /// injected key is not available, and whatever the body returns.
    pub fn call(&self, args: Args) -> Result<Value> {
        match &self.layer {
            Layer::Body(body) => body(self.meta.signature.bind(&self.meta.name, args)?),
            Layer::Inject { inner, injections } => {
                inner.call(inject(&self.meta, injections, args)?)
            }
            Layer::Wrap { inner, wrapper } => wrapper(&**inner, args),
        }
    }

    /// Decorates the function with a plain (non-injecting) layer.
    ///
    /// `wrapper` receives the inner function and the call's arguments.
    pub fn wrap<W>(self, wrapper: W) -> Self
    where
        W: Fn(&Function, Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            meta: self.meta.clone(),
            layer: Layer::Wrap {
                inner: Arc::new(self),
                wrapper: Arc::new(wrapper),
            },
        }
    }

    /// Number of call layers, the undecorated body included.
    pub fn depth(&self) -> usize {
        match &self.layer {
            Layer::Body(_) => 1,
            Layer::Inject { inner, .. } | Layer::Wrap { inner, .. } => 1 + inner.depth(),
        }
    }

    /// Injections of the outermost layer.
    pub fn injections(&self) -> &[Injection] {
        match &self.layer {
            Layer::Inject { injections, .. } => injections,
            _ => &[],
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.meta.doc.as_deref()
    }

    pub fn signature(&self) -> &Signature {
        &self.meta.signature
    }
}

impl Injectable for Function {
    fn inject(self, injection: Injection) -> Self {
        let Function { meta, layer } = self;
        match layer {
            Layer::Inject {
                inner,
                mut injections,
            } => {
                injections.push(injection);
                Function {
                    meta,
                    layer: Layer::Inject { inner, injections },
                }
            }
            layer => Function {
                meta: meta.clone(),
                layer: Layer::Inject {
                    inner: Arc::new(Function { meta, layer }),
                    injections: vec![injection],
                },
            },
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.meta.name)
            .field("depth", &self.depth())
            .field("injections", &self.injections())
            .finish()
    }
}

// ── AsyncFunction ──

/// An asynchronous injectable function.
///
/// Binding and injection run synchronously inside [`AsyncFunction::call`];
/// only the body suspends.
#[derive(Clone)]
pub struct AsyncFunction {
    meta: Arc<Meta>,
    layer: AsyncLayer,
}

#[derive(Clone)]
enum AsyncLayer {
    Body(AsyncBody),
    Inject {
        inner: Arc<AsyncFunction>,
        injections: Vec<Injection>,
    },
    Wrap {
        inner: Arc<AsyncFunction>,
        wrapper: AsyncWrapper,
    },
}

impl AsyncFunction {
    /// Creates an async function. `body` receives the arguments bound to
    /// `signature`.
    pub fn new<F, Fut>(name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(Bound) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let body: AsyncBody =
            Arc::new(move |bound: Bound| -> BoxFuture<'static, Result<Value>> {
                Box::pin(body(bound))
            });
        Self {
            meta: Arc::new(Meta::new(name, signature)),
            layer: AsyncLayer::Body(body),
        }
    }

    /// Attaches documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.meta).doc = Some(doc.into());
        self
    }

    /// Calls the function.
    ///
    /// Arguments are bound and injected before this returns; errors from
    /// that step are reported when the future is awaited.
    pub fn call(&self, args: Args) -> BoxFuture<'static, Result<Value>> {
        match &self.layer {
            AsyncLayer::Body(body) => match self.meta.signature.bind(&self.meta.name, args) {
                Ok(bound) => body(bound),
                Err(e) => Box::pin(std::future::ready(Err(e))),
            },
            AsyncLayer::Inject { inner, injections } => {
                match inject(&self.meta, injections, args) {
                    Ok(args) => inner.call(args),
                    Err(e) => Box::pin(std::future::ready(Err(e))),
                }
            }
            AsyncLayer::Wrap { inner, wrapper } => wrapper(&**inner, args),
        }
    }

    /// Decorates the function with a plain (non-injecting) layer.
    pub fn wrap<W>(self, wrapper: W) -> Self
    where
        W: Fn(&AsyncFunction, Args) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        Self {
            meta: self.meta.clone(),
            layer: AsyncLayer::Wrap {
                inner: Arc::new(self),
                wrapper: Arc::new(wrapper),
            },
        }
    }

    /// Number of call layers, the undecorated body included.
    pub fn depth(&self) -> usize {
        match &self.layer {
            AsyncLayer::Body(_) => 1,
            AsyncLayer::Inject { inner, .. } | AsyncLayer::Wrap { inner, .. } => {
                1 + inner.depth()
            }
        }
    }

    /// Injections of the outermost layer.
    pub fn injections(&self) -> &[Injection] {
        match &self.layer {
            AsyncLayer::Inject { injections, .. } => injections,
            _ => &[],
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.meta.doc.as_deref()
    }

    pub fn signature(&self) -> &Signature {
        &self.meta.signature
    }
}

impl Injectable for AsyncFunction {
    fn inject(self, injection: Injection) -> Self {
        let AsyncFunction { meta, layer } = self;
        match layer {
            AsyncLayer::Inject {
                inner,
                mut injections,
            } => {
                injections.push(injection);
                AsyncFunction {
                    meta,
                    layer: AsyncLayer::Inject { inner, injections },
                }
            }
            layer => AsyncFunction {
                meta: meta.clone(),
                layer: AsyncLayer::Inject {
                    inner: Arc::new(AsyncFunction { meta, layer }),
                    injections: vec![injection],
                },
            },
        }
    }
}

impl fmt::Debug for AsyncFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFunction")
            .field("name", &self.meta.name)
            .field("depth", &self.depth())
            .field("injections", &self.injections())
            .finish()
    }
}
