//! Call arguments and declared parameter lists.
//!
//! Rust functions carry no runtime parameter names, so injectable
//! functions declare theirs as a [`Signature`]. Calls pass [`Args`]
//! (positional and keyword values), which the signature binds by name and
//! position the same way for every caller.
//!
//! # Examples
//! ```
//! use sanduq_container::signature::{Args, Signature};
//!
//! let signature = Signature::new().param("a").param("b").param_default("c", 0_i32);
//! let args = Args::new().arg(1_i32).kwarg("b", 2_i32);
//!
//! let supplied = signature.bind_partial("f", &args).unwrap();
//! assert!(supplied.contains("a") && supplied.contains("b"));
//!
//! let bound = signature.bind("f", args).unwrap();
//! assert_eq!(*bound.get::<i32>("c").unwrap(), 0);
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, Result};
use crate::value::Value;

// ── Args ──

/// Arguments of one call: positional values, then keyword values.
#[derive(Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Any + Send + Sync>(self, value: T) -> Self {
        self.arg_value(Value::new(value))
    }

    /// Appends an existing value as positional argument.
    pub fn arg_value(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Adds a keyword argument.
    pub fn kwarg<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.kwarg_value(name, Value::new(value))
    }

    /// Adds an existing value as keyword argument.
    pub fn kwarg_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keywords.push((name.into(), value));
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }

    /// Returns `true` if a keyword argument `name` is present.
    pub fn has_keyword(&self, name: &str) -> bool {
        self.keywords.iter().any(|(n, _)| n == name)
    }

    /// Sets keyword argument `name`, replacing an existing one.
    pub fn insert_keyword(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.keywords.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.keywords.push((name, value)),
        }
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("positional", &self.positional)
            .field("keywords", &self.keywords)
            .finish()
    }
}

// ── Signature ──

/// How a parameter may be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// By position or by name.
    PositionalOrKeyword,
    /// By name only.
    KeywordOnly,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

/// The declared parameter list of an injectable function.
///
/// Positional-or-keyword parameters come first, in declaration order,
/// followed by keyword-only ones.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Signature {
    params: Vec<Param>,
    var_keywords: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required positional-or-keyword parameter.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, None)
    }

    /// Adds a positional-or-keyword parameter with a default.
    pub fn param_default<T: Any + Send + Sync>(self, name: impl Into<String>, default: T) -> Self {
        self.param_default_value(name, Value::new(default))
    }

    pub fn param_default_value(self, name: impl Into<String>, default: Value) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, Some(default))
    }

    /// Adds a required keyword-only parameter.
    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::KeywordOnly, None)
    }

    /// Adds a keyword-only parameter with a default.
    pub fn keyword_only_default<T: Any + Send + Sync>(
        self,
        name: impl Into<String>,
        default: T,
    ) -> Self {
        self.push(name, ParamKind::KeywordOnly, Some(Value::new(default)))
    }

    /// Accepts keyword arguments that match no parameter. They are kept in
    /// [`Bound::extra`].
    pub fn var_keywords(mut self) -> Self {
        self.var_keywords = true;
        self
    }

    fn push(mut self, name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        let param = Param {
            name: name.into(),
            kind,
            default,
        };
        match kind {
            ParamKind::KeywordOnly => self.params.push(param),
            ParamKind::PositionalOrKeyword => {
                let at = self
                    .params
                    .iter()
                    .position(|p| p.kind == ParamKind::KeywordOnly)
                    .unwrap_or(self.params.len());
                self.params.insert(at, param);
            }
        }
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Returns `true` if extra keyword arguments are accepted.
    pub fn accepts_var_keywords(&self) -> bool {
        self.var_keywords
    }

    fn positional_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| p.kind == ParamKind::PositionalOrKeyword)
            .count()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Matches `args` against the parameters without requiring all of them.
    ///
    /// Returns the names of the parameters `args` supplies.
    ///
    /// # Errors
    /// [`CallError`] when `args` could not be passed to `function` even with
    /// more arguments added: too many positionals, a parameter supplied
    /// twice, or an unknown keyword without [`Signature::var_keywords`].
    pub fn bind_partial<'s>(&'s self, function: &str, args: &Args) -> Result<HashSet<&'s str>> {
        let positional = self.positional_count();
        if args.positional.len() > positional {
            return Err(CallError::TooManyPositional {
                function: function.to_string(),
                expected: positional,
                given: args.positional.len(),
            }
            .into());
        }

        let mut supplied: HashSet<&str> = self.params[..args.positional.len()]
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let mut extra: HashSet<&str> = HashSet::new();

        for (name, _) in &args.keywords {
            match self.find(name) {
                Some(index) => {
                    if !supplied.insert(self.params[index].name.as_str()) {
                        return Err(CallError::MultipleValues {
                            function: function.to_string(),
                            name: name.clone(),
                        }
                        .into());
                    }
                }
                None if self.var_keywords => {
                    if !extra.insert(name.as_str()) {
                        return Err(CallError::MultipleValues {
                            function: function.to_string(),
                            name: name.clone(),
                        }
                        .into());
                    }
                }
                None => {
                    return Err(CallError::UnexpectedKeyword {
                        function: function.to_string(),
                        name: name.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(supplied)
    }

    /// Binds `args` to every parameter, filling in defaults.
    ///
    /// # Errors
    /// Everything [`Signature::bind_partial`] reports, plus
    /// [`CallError::MissingArgument`] for the first parameter left without
    /// a value.
    pub fn bind(&self, function: &str, args: Args) -> Result<Bound> {
        self.bind_partial(function, &args)?;

        let Args {
            positional,
            keywords,
        } = args;

        let mut slots: Vec<Option<Value>> = positional.into_iter().map(Some).collect();
        slots.resize(self.params.len(), None);

        let mut extra = Vec::new();
        for (name, value) in keywords {
            match self.find(&name) {
                Some(index) => slots[index] = Some(value),
                None => extra.push((name, value)),
            }
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = slot.or_else(|| param.default.clone()).ok_or_else(|| {
                CallError::MissingArgument {
                    function: function.to_string(),
                    name: param.name.clone(),
                }
            })?;
            values.push((param.name.clone(), value));
        }

        Ok(Bound {
            function: function.to_string(),
            values,
            extra,
        })
    }
}

// ── Bound ──

/// Arguments bound to parameter names, defaults applied.
#[derive(Clone)]
pub struct Bound {
    function: String,
    values: Vec<(String, Value)>,
    extra: Vec<(String, Value)>,
}

impl Bound {
    /// The value bound to parameter `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// The value bound to `name`, downcast to `T`.
    ///
    /// # Errors
    /// [`Error::TypeMismatch`](crate::Error::TypeMismatch) if the value has
    /// another type, [`CallError::MissingArgument`] if `name` is not a
    /// parameter.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self.value(name).ok_or_else(|| CallError::MissingArgument {
            function: self.function.clone(),
            name: name.to_string(),
        })?;
        value.expect_type::<T>(format_args!("argument '{name}' of {}()", self.function))
    }

    /// Like [`Bound::get`], returning an owned clone.
    pub fn take<T: Any + Send + Sync + Clone>(&self, name: &str) -> Result<T> {
        self.get::<T>(name).map(|value| T::clone(&value))
    }

    /// Extra keyword arguments accepted through
    /// [`Signature::var_keywords`].
    pub fn extra(&self) -> &[(String, Value)] {
        &self.extra
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("function", &self.function)
            .field("values", &self.values)
            .field("extra", &self.extra)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn abc() -> Signature {
        Signature::new().param("a").param("b").param("c")
    }

    fn call_error(result: Result<impl fmt::Debug>) -> CallError {
        match result {
            Err(Error::Call(e)) => e,
            other => panic!("Expected Call error, got: {other:?}"),
        }
    }

    #[test]
    fn partial_reports_positional_and_keyword_names() {
        let sig = abc();
        let supplied = sig
            .bind_partial("f", &Args::new().arg(1).kwarg("c", 3))
            .unwrap();
        assert_eq!(supplied, HashSet::from(["a", "c"]));
    }

    #[test]
    fn partial_rejects_too_many_positional() {
        let err = call_error(abc().bind_partial("f", &Args::new().arg(1).arg(2).arg(3).arg(4)));
        assert_eq!(
            err.to_string(),
            "f() takes 3 positional arguments but 4 were given"
        );
    }

    #[test]
    fn partial_rejects_duplicates() {
        let err = call_error(abc().bind_partial("f", &Args::new().arg(1).kwarg("a", 2)));
        assert_eq!(err.to_string(), "f() got multiple values for argument 'a'");
    }

    #[test]
    fn partial_rejects_unknown_keyword() {
        let err = call_error(abc().bind_partial("f", &Args::new().kwarg("d", 1)));
        assert_eq!(err.to_string(), "f() got an unexpected keyword argument 'd'");
    }

    #[test]
    fn var_keywords_accept_unknown() {
        let sig = abc().var_keywords();
        let supplied = sig.bind_partial("f", &Args::new().kwarg("d", 1)).unwrap();
        assert!(supplied.is_empty());

        let bound = sig
            .bind("f", Args::new().arg(1).arg(2).arg(3).kwarg("d", 4))
            .unwrap();
        assert_eq!(bound.extra().len(), 1);
        assert_eq!(bound.extra()[0].0, "d");
    }

    #[test]
    fn bind_applies_defaults_and_reports_missing() {
        let sig = Signature::new().param("a").param_default("b", 10_i32);
        let bound = sig.bind("f", Args::new().arg(1_i32)).unwrap();
        assert_eq!(bound.take::<i32>("a").unwrap(), 1);
        assert_eq!(bound.take::<i32>("b").unwrap(), 10);

        let err = call_error(sig.bind("f", Args::new()));
        assert_eq!(err.to_string(), "f() missing required argument: 'a'");
    }

    #[test]
    fn keyword_only_params_stay_last() {
        let sig = Signature::new().keyword_only("k").param("a").param("b");
        let names: Vec<_> = sig.params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "k"]);

        let err = call_error(sig.bind_partial("f", &Args::new().arg(1).arg(2).arg(3)));
        assert!(matches!(err, CallError::TooManyPositional { expected: 2, .. }));
    }

    #[test]
    fn keyword_only_default() {
        let sig = Signature::new().keyword_only_default("verbose", false);
        let bound = sig.bind("f", Args::new()).unwrap();
        assert!(!bound.take::<bool>("verbose").unwrap());
    }

    #[test]
    fn bound_type_mismatch() {
        let bound = Signature::new()
            .param("a")
            .bind("f", Args::new().arg("text"))
            .unwrap();
        assert!(matches!(bound.get::<i32>("a"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(bound.get::<i32>("zzz"), Err(Error::Call(_))));
    }

    #[test]
    fn insert_keyword_replaces() {
        let mut args = Args::new().kwarg("a", 1);
        args.insert_keyword("a", Value::new(2));
        args.insert_keyword("b", Value::new(3));
        assert_eq!(args.keywords().len(), 2);
        assert_eq!(args.keywords()[0].1.downcast_ref::<i32>(), Some(&2));
        assert!(args.has_keyword("b"));
    }
}
