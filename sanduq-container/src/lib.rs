//! Core container implementation for Sanduq DI.

pub mod chain;
pub mod container;
pub mod context;
pub mod error;
pub mod function;
pub mod key;
pub mod provider;
pub mod registry;
pub mod scope;
pub mod signature;
pub mod stack;
pub mod value;
pub mod web;

pub use chain::ChainContainer;
pub use container::{Container, prelude};
pub use error::{CallError, Error, MissingKeyError, Result};
pub use function::{AsyncFunction, BoxFuture, Function, Injectable, Injection, Pass};
pub use key::Key;
pub use provider::Provider;
pub use registry::{Factory, Put};
pub use scope::{ContextLocal, NoScope, Scope, ScopeKind, Singleton, ThreadLocal};
pub use signature::{Args, Bound, Signature};
pub use stack::{PushGuard, Stack, get, get_or, pass_, pop, push, push_chained, put, shared};
pub use value::Value;
