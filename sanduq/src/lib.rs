//! # Sanduq
//!
//! A small dependency injection box.
//!
//! Register values and factories under keys in a [`Container`], choose how
//! long produced values live with a [`Scope`], and inject them into
//! functions at call time with [`Provider::pass_`]. A [`Stack`] of
//! containers lets code resolve against whichever container is on top,
//! which is how tests swap dependencies without touching the code under
//! test.
//!
//! ```
//! use sanduq::prelude::*;
//!
//! #[sanduq::function]
//! fn connect(dsn: String, #[default(5_u64)] timeout: u64) -> String {
//!     format!("{dsn}?timeout={timeout}")
//! }
//!
//! let stack = Stack::named("app");
//! let connect = stack.pass_("dsn").apply(connect());
//!
//! let production = Container::new();
//! production.put_value("dsn", String::from("postgres://db"))?;
//! let _guard = stack.push(production);
//!
//! let url = connect.call(Args::new())?;
//! assert_eq!(url.downcast_ref::<String>().map(String::as_str), Some("postgres://db?timeout=5"));
//! # Ok::<(), sanduq::Error>(())
//! ```
//!
//! ## Crates
//!
//! - `sanduq-container`: containers, scopes, stacks and injectable functions
//! - `sanduq-macros`: the [`function`] attribute
//! - `sanduq-support`: rendering helpers shared by the crates

extern crate self as sanduq;

pub use sanduq_container::*;
pub use sanduq_macros::function;
pub use sanduq_support as support;

/// Everything needed to register, resolve and inject.
pub mod prelude {
    pub use sanduq_container::prelude::*;
    pub use sanduq_macros::function;
}
