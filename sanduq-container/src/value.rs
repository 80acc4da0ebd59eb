//! Type-erased dependency values.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use sanduq_support::rendering::short_type_name;

use crate::error::{Error, Result};

/// A shared, type-erased value produced by a factory or passed as an argument.
///
/// Cloning a `Value` clones a handle, not the underlying data, so a value
/// that was put into a container comes back out as the very same
/// allocation.
///
/// # Examples
/// ```
/// use sanduq_container::value::Value;
///
/// let value = Value::new(vec![1, 2, 3]);
/// let copy = value.clone();
/// assert!(Value::ptr_eq(&value, &copy));
/// assert_eq!(copy.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
/// ```
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an existing shared value without reallocating it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: type_name::<T>(),
        }
    }

    /// Returns `true` if the wrapped value has type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Returns a shared handle to the wrapped value if it has type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// Borrows the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Like [`Value::downcast`], reporting a mismatch for `subject`.
    pub fn expect_type<T: Any + Send + Sync>(&self, subject: impl fmt::Display) -> Result<Arc<T>> {
        self.downcast::<T>().ok_or_else(|| Error::TypeMismatch {
            subject: subject.to_string(),
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both values share the same allocation.
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.inner), Arc::as_ptr(&b.inner))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", short_type_name(self.type_name))
    }
}
