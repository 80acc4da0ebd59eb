//! # Sanduq Macros
//!
//! Procedural macros for the Sanduq DI crates.
//!
//! ## `#[function]`
//!
//! Turns a plain Rust function into an injectable
//! [`Function`](../sanduq/struct.Function.html) (or `AsyncFunction` for an
//! `async fn`). The annotated item becomes a constructor with the same name
//! and visibility that returns the injectable function:
//!
//! ```ignore
//! use std::sync::Arc;
//! use sanduq::prelude::*;
//!
//! struct Config {
//!     greeting: String,
//! }
//!
//! /// Greets someone.
//! #[sanduq::function]
//! fn greet(config: Arc<Config>, name: String, #[default(1)] times: usize) -> String {
//!     vec![format!("{} {name}", config.greeting); times].join(" ")
//! }
//!
//! let container = Container::new();
//! container.put_value("config", Config { greeting: "hi".into() })?;
//!
//! let greet = container.pass_("config").apply(greet());
//! let out = greet.call(Args::new().kwarg("name", String::from("bob")))?;
//! assert_eq!(out.downcast_ref::<String>().unwrap(), "hi bob");
//! ```
//!
//! ## Parameters
//!
//! | Parameter type | Read from the bound arguments as |
//! |----------------|----------------------------------|
//! | `Arc<T>`       | the shared value, without cloning `T` |
//! | `&T`           | a borrow of the shared value |
//! | `Value`        | the raw value |
//! | `T`            | a clone of the value (`T: Clone`) |
//!
//! `#[default(expr)]` on a parameter gives it a default. The expression is
//! evaluated once, when the constructor runs.
//!
//! ## Return types
//!
//! `Result<T, E>` returns are fallible: `E` is reported through
//! `Error::failed`. Any other return type is wrapped into a `Value`
//! (`Arc<T>` without an extra allocation, `Value` as is).
//!
//! ## Attribute arguments
//!
//! - `name = "..."`: the name used in call errors (defaults to the
//!   function's identifier)
//! - `crate = "..."`: path to the `sanduq` crate (defaults to `::sanduq`)

use proc_macro::TokenStream;

mod expand;
mod parse;

/// Turns a function into an injectable `Function` constructor.
///
/// See the [crate-level documentation](crate) for details.
#[proc_macro_attribute]
pub fn function(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand::expand_function(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
